//! Property entity - A listed property open for fractional investment.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Property database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "properties")]
pub struct Model {
    /// Unique identifier for the property
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name
    pub name: String,
    /// Smallest accepted investment
    pub min_investment: Decimal,
    /// Lock-in period applied to new holdings
    pub lock_in_months: i32,
    /// Monthly return as a percentage of principal
    pub monthly_return_rate: Decimal,
    /// Capacity still open to investors
    pub available_to_invest: Decimal,
    /// Principal raised so far
    pub total_invested: Decimal,
    /// Number of holdings created against this property
    pub investor_count: i32,
    /// `"active"`, `"inactive"` or `"closed"`
    pub status: String,
    /// Optimistic concurrency revision for the capacity counters
    pub revision: i64,
    /// When the property was listed
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Property and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One property has many holdings
    #[sea_orm(has_many = "super::holding::Entity")]
    Holdings,
}

impl Related<super::holding::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Holdings.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
