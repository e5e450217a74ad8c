//! Payout entity - One row per paid (holding, month).
//!
//! The table carries a UNIQUE index on `(holding_id, period)` created in
//! `config::database::create_tables`; that index is what makes payout runs idempotent.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Payout database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payouts")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Holding that was paid
    pub holding_id: i64,
    /// Calendar month index (`year * 12 + month0`)
    pub period: i32,
    /// The `earning` transaction posted for this payout
    pub transaction_id: i64,
    /// Amount paid
    pub amount: Decimal,
    /// When the payout was recorded
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Payout and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each payout belongs to one holding
    #[sea_orm(
        belongs_to = "super::holding::Entity",
        from = "Column::HoldingId",
        to = "super::holding::Column::Id"
    )]
    Holding,
}

impl Related<super::holding::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Holding.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
