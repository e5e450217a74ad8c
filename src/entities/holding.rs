//! Holding entity - One investor's position in one property.
//!
//! Rate and lock-in are snapshotted from the property at purchase so later edits to the
//! listing never change an existing position. Eligibility flags are not stored; see
//! `core::holding` for the functions that derive them.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Holding database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "holdings")]
pub struct Model {
    /// Unique identifier for the holding
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Current owner
    pub user_id: String,
    /// Property the holding belongs to
    pub property_id: i64,
    /// Principal
    pub amount_invested: Decimal,
    /// When the position was opened
    pub purchase_date: DateTimeUtc,
    /// `purchase_date + lock_in_months`
    pub maturity_date: DateTimeUtc,
    /// Lock-in at purchase time
    pub lock_in_months: i32,
    /// Monthly return percentage at purchase time
    pub monthly_return_rate: Decimal,
    /// `amount_invested * monthly_return_rate / 100`
    pub monthly_earning: Decimal,
    /// Running sum of posted payouts
    pub total_earnings_received: Decimal,
    /// `"lock-in"`, `"matured"` or `"withdrawn"`
    pub status: String,
    /// Holding this one was resold from, if any
    pub transferred_from: Option<i64>,
    /// When the holding was withdrawn or sold
    pub closed_at: Option<DateTimeUtc>,
}

/// Defines relationships between Holding and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each holding belongs to one property
    #[sea_orm(
        belongs_to = "super::property::Entity",
        from = "Column::PropertyId",
        to = "super::property::Column::Id"
    )]
    Property,
    /// One holding has many payouts
    #[sea_orm(has_many = "super::payout::Entity")]
    Payouts,
}

impl Related<super::property::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Property.def()
    }
}

impl Related<super::payout::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payouts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
