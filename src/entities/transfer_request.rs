//! Transfer request entity - Resale of a holding from seller to buyer.
//!
//! `open_holding_id` mirrors `holding_id` while the request is still moving through the
//! workflow and is cleared when it reaches a terminal status. It is UNIQUE, so the database
//! refuses a second open request for the same holding.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Transfer request database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transfer_requests")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Holding being sold
    pub holding_id: i64,
    /// Current owner of the holding
    pub seller_id: String,
    /// Prospective owner
    pub buyer_id: String,
    /// Agreed price
    pub sale_price: Decimal,
    /// `"pending"`, `"accepted"` or `"declined"`
    pub buyer_response: String,
    /// Workflow status
    pub status: String,
    /// Notes from the approving admin
    pub admin_notes: Option<String>,
    /// Reason given by the admin on rejection
    pub rejection_reason: Option<String>,
    /// Holding created for the buyer on approval
    pub new_holding_id: Option<i64>,
    /// Set to `holding_id` while the request is open
    #[sea_orm(unique)]
    pub open_holding_id: Option<i64>,
    /// When the request was created
    pub created_at: DateTimeUtc,
    /// When the request last changed status
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between `TransferRequest` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each request sells one holding
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
