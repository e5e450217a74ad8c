//! Transaction entity - The append-only ledger.
//!
//! Each row is one wallet movement for `user_id`. Only `completed` rows affect the wallet;
//! `pending` rows may later be settled, `completed` and `failed` rows never change again.
//! `payment_id` is unique so a gateway payment can fund at most one holding.
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Transaction database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    /// Unique identifier for the transaction
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Wallet owner
    pub user_id: String,
    /// `"investment"`, `"release"`, `"earning"`, `"withdrawal"`, `"transfer_out"`,
    /// `"credit"` or `"debit"`
    pub transaction_type: String,
    /// Always positive; direction comes from the type
    pub amount: Decimal,
    /// `"pending"`, `"completed"` or `"failed"`
    pub status: String,
    /// Holding the movement relates to
    pub holding_id: Option<i64>,
    /// Property the movement relates to
    pub property_id: Option<i64>,
    /// Gateway payment id for gateway-funded investments
    #[sea_orm(unique)]
    pub payment_id: Option<String>,
    /// Human-readable description
    pub description: String,
    /// When the entry was appended
    pub created_at: DateTimeUtc,
    /// When the entry reached a terminal status
    pub settled_at: Option<DateTimeUtc>,
}

/// Transactions reference holdings loosely; a withdrawn holding keeps its history
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
