//! Wallet entity - The per-user monetary aggregate.
//!
//! One row per user. Every field is derived from the user's completed transactions and is
//! only ever written by `core::wallet`. The `version` column is bumped on every write and
//! checked in the UPDATE's WHERE clause to detect lost updates.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Wallet database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "wallets")]
pub struct Model {
    /// Owning user id
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: String,
    /// Cash credited to the wallet (resale proceeds)
    pub balance: Decimal,
    /// Principal currently invested across all open holdings
    pub total_investments: Decimal,
    /// Principal of holdings still in lock-in
    pub locked_amount: Decimal,
    /// Earnings paid out and not yet withdrawn
    pub earnings_received: Decimal,
    /// Cached amount that could be withdrawn right now
    pub withdrawable_balance: Decimal,
    /// Optimistic concurrency revision
    pub version: i64,
    /// When the wallet was last written
    pub updated_at: DateTimeUtc,
}

/// `Wallet` relationships are navigated through `user_id` lookups, not foreign keys
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
