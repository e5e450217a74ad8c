//! Investment requests - offline payments reviewed by an admin before a holding is opened.
//!
//! ```text
//! pending --approve--> approved
//! pending --reject--> rejected
//! ```
//!
//! Approval and holding creation share one database transaction: if the holding cannot be
//! created (property full, below minimum) the request stays pending.

use crate::{
    core::{
        concurrency::retry_on_conflict,
        holding::{self, NewHolding},
        property::{check_investable, get_property},
        workflow::{StateMachine, require_reason},
    },
    entities::{InvestmentRequest, investment_request},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr};
use std::fmt;
use tracing::{info, instrument};

/// Status of an investment request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvestmentRequestStatus {
    /// Waiting for review
    Pending,
    /// Holding opened
    Approved,
    /// Refused
    Rejected,
}

/// Admin actions on an investment request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvestmentRequestAction {
    /// Accept the payment and open the holding
    Approve,
    /// Refuse the request
    Reject,
}

impl fmt::Display for InvestmentRequestAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
        })
    }
}

impl fmt::Display for InvestmentRequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl StateMachine for InvestmentRequestStatus {
    type Action = InvestmentRequestAction;

    const WORKFLOW: &'static str = "investment request";

    fn next(self, action: InvestmentRequestAction) -> Option<Self> {
        match (self, action) {
            (Self::Pending, InvestmentRequestAction::Approve) => Some(Self::Approved),
            (Self::Pending, InvestmentRequestAction::Reject) => Some(Self::Rejected),
            _ => None,
        }
    }

    fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// An investment request to file.
#[derive(Debug, Clone)]
pub struct NewInvestmentRequest {
    /// Investor
    pub user_id: String,
    /// Target property
    pub property_id: i64,
    /// Amount paid
    pub amount: Decimal,
    /// Months the investor intends to hold
    pub time_period: i32,
    /// Payment reference or receipt link
    pub transaction_proof: String,
}

/// Files a request after checking it against the property as it is now.
///
/// # Errors
/// - `Error::PropertyUnavailable`, `Error::BelowMinimum`, `Error::InvalidAmount` from the
///   property checks
/// - `Error::Validation` for a missing proof or a holding period shorter than the lock-in
#[instrument(skip(db, new), fields(user_id = %new.user_id, property_id = new.property_id))]
pub async fn submit(
    db: &DatabaseConnection,
    new: NewInvestmentRequest,
) -> Result<investment_request::Model> {
    let property = get_property(db, new.property_id)
        .await?
        .ok_or_else(|| Error::PropertyUnavailable {
            property_id: new.property_id,
            reason: "property does not exist".to_string(),
        })?;
    check_investable(&property, new.amount)?;

    let proof = new.transaction_proof.trim();
    if proof.is_empty() {
        return Err(Error::validation("a transaction proof is required"));
    }
    if new.time_period < property.lock_in_months {
        return Err(Error::validation(format!(
            "holding period of {} months is shorter than the {} month lock-in",
            new.time_period, property.lock_in_months
        )));
    }

    let now = Utc::now();
    let request = investment_request::ActiveModel {
        user_id: Set(new.user_id),
        property_id: Set(new.property_id),
        amount_invested: Set(new.amount),
        time_period: Set(new.time_period),
        transaction_proof: Set(proof.to_string()),
        status: Set(InvestmentRequestStatus::Pending.as_str().to_string()),
        admin_notes: Set(None),
        holding_id: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(request_id = request.id, "Investment request submitted");
    Ok(request)
}

async fn load<C>(db: &C, request_id: i64) -> Result<(investment_request::Model, InvestmentRequestStatus)>
where
    C: ConnectionTrait,
{
    let request = get_request(db, request_id)
        .await?
        .ok_or_else(|| Error::not_found("investment request", request_id))?;
    let status = InvestmentRequestStatus::from_stored(&request.status)?;
    if status.is_terminal() {
        return Err(Error::AlreadyProcessed {
            entity: "investment request",
            id: request_id.to_string(),
        });
    }
    Ok((request, status))
}

async fn transition<C>(
    db: &C,
    request_id: i64,
    to: InvestmentRequestStatus,
    admin_notes: Option<String>,
) -> Result<()>
where
    C: ConnectionTrait,
{
    let mut update = InvestmentRequest::update_many()
        .col_expr(investment_request::Column::Status, Expr::value(to.as_str()))
        .col_expr(
            investment_request::Column::UpdatedAt,
            Expr::value(Utc::now()),
        );
    if let Some(notes) = admin_notes {
        update = update.col_expr(
            investment_request::Column::AdminNotes,
            Expr::value(Some(notes)),
        );
    }

    let result = update
        .filter(investment_request::Column::Id.eq(request_id))
        .filter(
            investment_request::Column::Status.eq(InvestmentRequestStatus::Pending.as_str()),
        )
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        return Err(Error::AlreadyProcessed {
            entity: "investment request",
            id: request_id.to_string(),
        });
    }
    Ok(())
}

/// Approves a pending request and opens the holding, purchased at `now`.
///
/// # Errors
/// `Error::AlreadyProcessed` if the request was already approved or rejected; any
/// `holding::create` error, in which case the request stays pending.
#[instrument(skip(db, admin_notes))]
pub async fn approve(
    db: &DatabaseConnection,
    request_id: i64,
    admin_notes: Option<&str>,
    now: DateTime<Utc>,
) -> Result<investment_request::Model> {
    retry_on_conflict(|| approve_once(db, request_id, admin_notes, now)).await
}

async fn approve_once(
    db: &DatabaseConnection,
    request_id: i64,
    admin_notes: Option<&str>,
    now: DateTime<Utc>,
) -> Result<investment_request::Model> {
    let txn = db.begin().await?;
    let (request, status) = load(&txn, request_id).await?;
    let approved = status.apply(InvestmentRequestAction::Approve)?;

    // Status-guarded flip before any money moves.
    transition(&txn, request_id, approved, admin_notes.map(str::to_string)).await?;

    let holding = holding::open_holding(
        &txn,
        NewHolding {
            user_id: request.user_id.clone(),
            property_id: request.property_id,
            amount: request.amount_invested,
            payment_id: None,
            purchased_at: now,
        },
    )
    .await?;

    InvestmentRequest::update_many()
        .col_expr(
            investment_request::Column::HoldingId,
            Expr::value(Some(holding.id)),
        )
        .filter(investment_request::Column::Id.eq(request_id))
        .exec(&txn)
        .await?;

    txn.commit().await?;
    info!(request_id, holding_id = holding.id, "Investment request approved");
    require_request(db, request_id).await
}

/// Rejects a pending request with a reason. No wallet or property change.
#[instrument(skip(db, reason))]
pub async fn reject(
    db: &DatabaseConnection,
    request_id: i64,
    reason: &str,
) -> Result<investment_request::Model> {
    let reason = require_reason(reason)?;
    let (_, status) = load(db, request_id).await?;
    let rejected = status.apply(InvestmentRequestAction::Reject)?;
    transition(db, request_id, rejected, Some(reason)).await?;
    require_request(db, request_id).await
}

/// Finds a request by id.
pub async fn get_request<C>(db: &C, request_id: i64) -> Result<Option<investment_request::Model>>
where
    C: ConnectionTrait,
{
    InvestmentRequest::find_by_id(request_id)
        .one(db)
        .await
        .map_err(Into::into)
}

async fn require_request(
    db: &DatabaseConnection,
    request_id: i64,
) -> Result<investment_request::Model> {
    get_request(db, request_id)
        .await?
        .ok_or_else(|| Error::not_found("investment request", request_id))
}

/// Requests waiting for review, oldest first.
pub async fn pending_requests(db: &DatabaseConnection) -> Result<Vec<investment_request::Model>> {
    InvestmentRequest::find()
        .filter(investment_request::Column::Status.eq(InvestmentRequestStatus::Pending.as_str()))
        .order_by_asc(investment_request::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::{core::wallet, test_utils::*};
    use rust_decimal_macros::dec;

    fn request_for(property_id: i64, amount: Decimal) -> NewInvestmentRequest {
        NewInvestmentRequest {
            user_id: "alice".to_string(),
            property_id,
            amount,
            time_period: 12,
            transaction_proof: "UTR 4451 2231".to_string(),
        }
    }

    #[tokio::test]
    async fn test_submit_validates() -> Result<()> {
        let db = setup_test_db().await?;
        let property = create_test_property(&db, "Harbour View").await?;

        let short = submit(
            &db,
            NewInvestmentRequest {
                time_period: 2,
                ..request_for(property.id, dec!(500000))
            },
        )
        .await;
        assert!(matches!(short, Err(Error::Validation { .. })));

        let no_proof = submit(
            &db,
            NewInvestmentRequest {
                transaction_proof: " ".to_string(),
                ..request_for(property.id, dec!(500000))
            },
        )
        .await;
        assert!(matches!(no_proof, Err(Error::Validation { .. })));

        let small = submit(&db, request_for(property.id, dec!(1000))).await;
        assert!(matches!(small, Err(Error::BelowMinimum { .. })));

        let missing = submit(&db, request_for(999, dec!(500000))).await;
        assert!(matches!(missing, Err(Error::PropertyUnavailable { .. })));

        assert!(pending_requests(&db).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_approve_opens_holding_once() -> Result<()> {
        let db = setup_test_db().await?;
        let property = create_test_property(&db, "Harbour View").await?;
        let request = submit(&db, request_for(property.id, dec!(500000))).await?;
        assert_eq!(pending_requests(&db).await?.len(), 1);

        let approved = approve(&db, request.id, Some("Receipt verified"), date(2025, 1, 15)).await?;
        assert_eq!(approved.status, "approved");
        assert_eq!(approved.admin_notes.as_deref(), Some("Receipt verified"));
        let holding_id = approved.holding_id.unwrap();
        let holding = holding::get_holding(&db, holding_id).await?.unwrap();
        assert_eq!(holding.amount_invested, dec!(500000));

        let again = approve(&db, request.id, None, date(2025, 1, 16)).await;
        assert!(matches!(again, Err(Error::AlreadyProcessed { .. })));
        assert_eq!(holding::holdings_for_user(&db, "alice").await?.len(), 1);
        assert_eq!(
            wallet::balance(&db, "alice").await?.total_investments,
            dec!(500000)
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_holding_creation_leaves_request_pending() -> Result<()> {
        let db = setup_test_db().await?;
        let property = create_test_property(&db, "Harbour View").await?;
        let request = submit(&db, request_for(property.id, dec!(500000))).await?;

        crate::core::property::set_property_status(
            &db,
            property.id,
            crate::core::property::PropertyStatus::Closed,
        )
        .await?;

        let result = approve(&db, request.id, None, date(2025, 1, 15)).await;
        assert!(matches!(result, Err(Error::PropertyUnavailable { .. })));
        assert_eq!(get_request(&db, request.id).await?.unwrap().status, "pending");
        Ok(())
    }

    #[tokio::test]
    async fn test_reject() -> Result<()> {
        let db = setup_test_db().await?;
        let property = create_test_property(&db, "Harbour View").await?;
        let request = submit(&db, request_for(property.id, dec!(500000))).await?;

        let blank = reject(&db, request.id, "").await;
        assert!(matches!(blank, Err(Error::Validation { .. })));

        let rejected = reject(&db, request.id, "Payment not received").await?;
        assert_eq!(rejected.status, "rejected");
        assert_eq!(
            rejected.admin_notes.as_deref(),
            Some("Payment not received")
        );
        assert!(holding::holdings_for_user(&db, "alice").await?.is_empty());

        let after = approve(&db, request.id, None, date(2025, 1, 15)).await;
        assert!(matches!(after, Err(Error::AlreadyProcessed { .. })));
        Ok(())
    }
}
