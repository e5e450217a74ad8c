//! Withdrawal request entity - Investor request to move funds to a bank account.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Withdrawal request database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "withdrawal_requests")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Requesting investor
    pub user_id: String,
    /// Amount to pay out
    pub amount: Decimal,
    /// `"investment"`, `"earnings"` or `"balance"`
    pub kind: String,
    /// Holding whose principal is withdrawn (`investment` only)
    pub holding_id: Option<i64>,
    /// Bank account holder name
    pub account_holder: String,
    /// Bank account number
    pub account_number: String,
    /// Bank branch IFSC code
    pub ifsc_code: String,
    /// `"pending"`, `"processing"`, `"completed"` or `"rejected"`
    pub status: String,
    /// Why the request was rejected
    pub rejection_reason: Option<String>,
    /// Ledger entry posted when processing started
    pub transaction_id: Option<i64>,
    /// When the request was made
    pub created_at: DateTimeUtc,
    /// When the request last changed status
    pub updated_at: DateTimeUtc,
}

/// Withdrawal requests are looked up by user and status only
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
