//! Investment request entity - Manual proof-of-payment awaiting admin review.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Investment request database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "investment_requests")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Investor
    pub user_id: String,
    /// Target property
    pub property_id: i64,
    /// Amount the investor paid
    pub amount_invested: Decimal,
    /// Months the investor intends to stay invested
    pub time_period: i32,
    /// Reference to the uploaded payment proof
    pub transaction_proof: String,
    /// `"pending"`, `"approved"` or `"rejected"`
    pub status: String,
    /// Notes from the reviewing admin (rejection reason when rejected)
    pub admin_notes: Option<String>,
    /// Holding created on approval
    pub holding_id: Option<i64>,
    /// When the request was submitted
    pub created_at: DateTimeUtc,
    /// When the request was last reviewed
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between `InvestmentRequest` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each request targets one property
    #[sea_orm(
        belongs_to = "super::property::Entity",
        from = "Column::PropertyId",
        to = "super::property::Column::Id"
    )]
    Property,
}

impl Related<super::property::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Property.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
