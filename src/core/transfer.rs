//! Transfer/resale workflow - selling a holding to another investor.
//!
//! ```text
//! pending --accept--> accepted --submit--> admin_pending --approve--> admin_approved --complete--> completed
//! pending --decline--> rejected
//! admin_pending --reject--> admin_rejected
//! pending | accepted --cancel--> cancelled
//! ```
//!
//! Admin approval is the only step that moves money. The seller's holding is closed and
//! replaced by a new holding for the buyer with the same property, principal and dates, so
//! property totals do not change. While a request is open its `open_holding_id` column holds
//! the holding id; the column is UNIQUE, so storage refuses a second open request.

use crate::{
    core::{
        concurrency::{is_unique_violation, retry_on_conflict},
        holding::{self, HoldingStatus, Position},
        wallet::{self, NewTransaction, TransactionType},
        withdrawal,
        workflow::{StateMachine, require_reason},
    },
    entities::{TransferRequest, transfer_request},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{Condition, QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr};
use std::fmt;
use tracing::{info, instrument};

/// Lowest accepted sale price as a fraction of the principal.
pub const MIN_RESALE_RATIO: Decimal = dec!(0.8);

/// Status of a transfer request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    /// Waiting for the buyer
    Pending,
    /// Buyer agreed
    Accepted,
    /// Submitted to an admin
    AdminPending,
    /// Admin approved; ownership has moved
    AdminApproved,
    /// Admin refused
    AdminRejected,
    /// Buyer declined
    Rejected,
    /// Seller withdrew the offer
    Cancelled,
    /// Closed out
    Completed,
}

/// Actions on a transfer request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferAction {
    /// Buyer accepts
    Accept,
    /// Buyer declines
    Decline,
    /// Seller submits for review
    Submit,
    /// Admin approves
    Approve,
    /// Admin rejects
    Reject,
    /// Seller cancels
    Cancel,
    /// Admin closes an approved transfer
    Complete,
}

impl fmt::Display for TransferAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Accept => "accept",
            Self::Decline => "decline",
            Self::Submit => "submit",
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Cancel => "cancel",
            Self::Complete => "complete",
        })
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl StateMachine for TransferStatus {
    type Action = TransferAction;

    const WORKFLOW: &'static str = "transfer";

    fn next(self, action: TransferAction) -> Option<Self> {
        use TransferAction as A;
        match (self, action) {
            (Self::Pending, A::Accept) => Some(Self::Accepted),
            (Self::Pending, A::Decline) => Some(Self::Rejected),
            (Self::Accepted, A::Submit) => Some(Self::AdminPending),
            (Self::AdminPending, A::Approve) => Some(Self::AdminApproved),
            (Self::AdminPending, A::Reject) => Some(Self::AdminRejected),
            (Self::Pending | Self::Accepted, A::Cancel) => Some(Self::Cancelled),
            (Self::AdminApproved, A::Complete) => Some(Self::Completed),
            _ => None,
        }
    }

    fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::AdminRejected | Self::Rejected | Self::Cancelled | Self::Completed
        )
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::AdminPending => "admin_pending",
            Self::AdminApproved => "admin_approved",
            Self::AdminRejected => "admin_rejected",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "accepted" => Some(Self::Accepted),
            "admin_pending" => Some(Self::AdminPending),
            "admin_approved" => Some(Self::AdminApproved),
            "admin_rejected" => Some(Self::AdminRejected),
            "rejected" => Some(Self::Rejected),
            "cancelled" => Some(Self::Cancelled),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

/// The buyer's answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuyerResponse {
    /// Not answered yet
    Pending,
    /// Agreed to buy
    Accepted,
    /// Refused
    Declined,
}

impl BuyerResponse {
    /// Stored string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Declined => "declined",
        }
    }
}

/// Lowest sale price accepted for a principal.
#[must_use]
pub fn minimum_sale_price(amount_invested: Decimal) -> Decimal {
    amount_invested * MIN_RESALE_RATIO
}

/// Columns written alongside a status change.
#[derive(Debug, Default)]
struct Changes {
    buyer_response: Option<BuyerResponse>,
    admin_notes: Option<String>,
    rejection_reason: Option<String>,
    new_holding_id: Option<i64>,
}

async fn transition<C>(
    db: &C,
    request: &transfer_request::Model,
    from: TransferStatus,
    to: TransferStatus,
    changes: Changes,
) -> Result<()>
where
    C: ConnectionTrait,
{
    let mut update = TransferRequest::update_many()
        .col_expr(transfer_request::Column::Status, Expr::value(to.as_str()))
        .col_expr(transfer_request::Column::UpdatedAt, Expr::value(Utc::now()));
    if to.is_terminal() {
        update = update.col_expr(
            transfer_request::Column::OpenHoldingId,
            Expr::value(Option::<i64>::None),
        );
    }
    if let Some(response) = changes.buyer_response {
        update = update.col_expr(
            transfer_request::Column::BuyerResponse,
            Expr::value(response.as_str()),
        );
    }
    if let Some(notes) = changes.admin_notes {
        update = update.col_expr(
            transfer_request::Column::AdminNotes,
            Expr::value(Some(notes)),
        );
    }
    if let Some(reason) = changes.rejection_reason {
        update = update.col_expr(
            transfer_request::Column::RejectionReason,
            Expr::value(Some(reason)),
        );
    }
    if let Some(new_holding_id) = changes.new_holding_id {
        update = update.col_expr(
            transfer_request::Column::NewHoldingId,
            Expr::value(Some(new_holding_id)),
        );
    }

    let result = update
        .filter(transfer_request::Column::Id.eq(request.id))
        .filter(transfer_request::Column::Status.eq(from.as_str()))
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        return Err(Error::AlreadyProcessed {
            entity: "transfer request",
            id: request.id.to_string(),
        });
    }
    Ok(())
}

/// Whether the holding has a transfer request that has not reached a final status.
pub(crate) async fn has_open_transfer<C>(db: &C, holding_id: i64) -> Result<bool>
where
    C: ConnectionTrait,
{
    Ok(TransferRequest::find()
        .filter(transfer_request::Column::OpenHoldingId.eq(holding_id))
        .one(db)
        .await?
        .is_some())
}

async fn load<C>(db: &C, transfer_id: i64) -> Result<(transfer_request::Model, TransferStatus)>
where
    C: ConnectionTrait,
{
    let request = get_transfer(db, transfer_id)
        .await?
        .ok_or_else(|| Error::not_found("transfer request", transfer_id))?;
    let status = TransferStatus::from_stored(&request.status)?;
    if status.is_terminal() {
        return Err(Error::AlreadyProcessed {
            entity: "transfer request",
            id: transfer_id.to_string(),
        });
    }
    Ok((request, status))
}

/// Offers a holding to `buyer_id` for `sale_price`.
///
/// # Errors
/// - `Error::NotOwner` if the seller does not own the holding
/// - `Error::HoldingWithdrawn` if the holding is closed
/// - `Error::SalePriceTooLow` below 80% of the principal
/// - `Error::TransferAlreadyOpen` if another request for the holding is open
/// - `Error::WithdrawalAlreadyOpen` if the principal is being withdrawn
#[instrument(skip(db))]
pub async fn create(
    db: &DatabaseConnection,
    seller_id: &str,
    holding_id: i64,
    buyer_id: &str,
    sale_price: Decimal,
) -> Result<transfer_request::Model> {
    let buyer_id = buyer_id.trim();
    if buyer_id.is_empty() || buyer_id == seller_id {
        return Err(Error::validation("the buyer must be another investor"));
    }

    let txn = db.begin().await?;
    let holding = holding::require_holding(&txn, holding_id).await?;
    if holding.user_id != seller_id {
        return Err(Error::NotOwner {
            holding_id,
            user_id: seller_id.to_string(),
        });
    }
    if holding.status == HoldingStatus::Withdrawn.as_str() {
        return Err(Error::HoldingWithdrawn { holding_id });
    }
    let minimum = minimum_sale_price(holding.amount_invested);
    if sale_price < minimum {
        return Err(Error::SalePriceTooLow {
            sale_price,
            minimum: minimum.normalize(),
        });
    }
    if withdrawal::open_principal_request(&txn, holding_id).await? {
        return Err(Error::WithdrawalAlreadyOpen { holding_id });
    }

    let now = Utc::now();
    let request = transfer_request::ActiveModel {
        holding_id: Set(holding_id),
        seller_id: Set(seller_id.to_string()),
        buyer_id: Set(buyer_id.to_string()),
        sale_price: Set(sale_price),
        buyer_response: Set(BuyerResponse::Pending.as_str().to_string()),
        status: Set(TransferStatus::Pending.as_str().to_string()),
        admin_notes: Set(None),
        rejection_reason: Set(None),
        new_holding_id: Set(None),
        open_holding_id: Set(Some(holding_id)),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    let model = match request.insert(&txn).await {
        Ok(model) => model,
        Err(e) if is_unique_violation(&e) => {
            return Err(Error::TransferAlreadyOpen { holding_id });
        }
        Err(e) => return Err(e.into()),
    };
    txn.commit().await?;

    info!(transfer_id = model.id, "Transfer offered");
    Ok(model)
}

/// The named buyer accepts or declines the offer.
#[instrument(skip(db))]
pub async fn respond(
    db: &DatabaseConnection,
    transfer_id: i64,
    buyer_id: &str,
    accept: bool,
) -> Result<transfer_request::Model> {
    let (request, status) = load(db, transfer_id).await?;
    if request.buyer_id != buyer_id {
        return Err(Error::Unauthorized {
            user_id: buyer_id.to_string(),
            action: format!("respond to transfer {transfer_id}"),
        });
    }

    let (action, response) = if accept {
        (TransferAction::Accept, BuyerResponse::Accepted)
    } else {
        (TransferAction::Decline, BuyerResponse::Declined)
    };
    let next = status.apply(action)?;
    transition(
        db,
        &request,
        status,
        next,
        Changes {
            buyer_response: Some(response),
            ..Changes::default()
        },
    )
    .await?;

    require_transfer(db, transfer_id).await
}

async fn seller_action(
    db: &DatabaseConnection,
    transfer_id: i64,
    seller_id: &str,
    action: TransferAction,
) -> Result<transfer_request::Model> {
    let (request, status) = load(db, transfer_id).await?;
    if request.seller_id != seller_id {
        return Err(Error::Unauthorized {
            user_id: seller_id.to_string(),
            action: format!("{action} transfer {transfer_id}"),
        });
    }

    let next = status.apply(action)?;
    transition(db, &request, status, next, Changes::default()).await?;
    require_transfer(db, transfer_id).await
}

/// The seller submits an accepted offer for admin review.
pub async fn submit_for_review(
    db: &DatabaseConnection,
    transfer_id: i64,
    seller_id: &str,
) -> Result<transfer_request::Model> {
    seller_action(db, transfer_id, seller_id, TransferAction::Submit).await
}

/// The seller withdraws an offer that has not reached review.
pub async fn cancel(
    db: &DatabaseConnection,
    transfer_id: i64,
    seller_id: &str,
) -> Result<transfer_request::Model> {
    seller_action(db, transfer_id, seller_id, TransferAction::Cancel).await
}

/// Approves a reviewed transfer and moves ownership.
///
/// Seller: the principal leaves `total_investments` (released first if still locked), and
/// the sale price is credited to their balance. Buyer: a new holding with the original
/// property, principal and dates, plus its investment entry. The old holding is closed.
#[instrument(skip(db, admin_notes))]
pub async fn admin_approve(
    db: &DatabaseConnection,
    transfer_id: i64,
    admin_notes: Option<&str>,
    now: DateTime<Utc>,
) -> Result<transfer_request::Model> {
    retry_on_conflict(|| approve_once(db, transfer_id, admin_notes, now)).await
}

async fn approve_once(
    db: &DatabaseConnection,
    transfer_id: i64,
    admin_notes: Option<&str>,
    now: DateTime<Utc>,
) -> Result<transfer_request::Model> {
    let txn = db.begin().await?;
    let (request, status) = load(&txn, transfer_id).await?;
    let next = status.apply(TransferAction::Approve)?;

    let sold = holding::require_holding(&txn, request.holding_id).await?;
    if sold.status == HoldingStatus::Withdrawn.as_str() {
        return Err(Error::HoldingWithdrawn {
            holding_id: sold.id,
        });
    }
    if sold.user_id != request.seller_id {
        return Err(Error::NotOwner {
            holding_id: sold.id,
            user_id: request.seller_id.clone(),
        });
    }

    if sold.status == HoldingStatus::LockIn.as_str() {
        wallet::post(
            &txn,
            NewTransaction::completed(
                request.seller_id.clone(),
                TransactionType::Release,
                sold.amount_invested,
                format!("Holding {} sold during lock-in", sold.id),
            )
            .with_holding(sold.id)
            .with_property(sold.property_id),
        )
        .await?;
    }
    wallet::post(
        &txn,
        NewTransaction::completed(
            request.seller_id.clone(),
            TransactionType::TransferOut,
            sold.amount_invested,
            format!("Holding {} sold to {}", sold.id, request.buyer_id),
        )
        .with_holding(sold.id)
        .with_property(sold.property_id),
    )
    .await?;
    wallet::post(
        &txn,
        NewTransaction::completed(
            request.seller_id.clone(),
            TransactionType::Credit,
            request.sale_price,
            format!("Sale proceeds for holding {}", sold.id),
        )
        .with_property(sold.property_id),
    )
    .await?;
    holding::mark_withdrawn(&txn, sold.id, now).await?;

    let acquired = holding::open_position(
        &txn,
        Position {
            user_id: request.buyer_id.clone(),
            property_id: sold.property_id,
            amount: sold.amount_invested,
            purchase_date: sold.purchase_date,
            maturity_date: sold.maturity_date,
            lock_in_months: sold.lock_in_months,
            monthly_return_rate: sold.monthly_return_rate,
            transferred_from: Some(sold.id),
            payment_id: None,
        },
        now,
    )
    .await?;

    transition(
        &txn,
        &request,
        status,
        next,
        Changes {
            admin_notes: admin_notes.map(str::to_string),
            new_holding_id: Some(acquired.id),
            ..Changes::default()
        },
    )
    .await?;
    txn.commit().await?;

    info!(
        transfer_id,
        old_holding_id = sold.id,
        new_holding_id = acquired.id,
        "Transfer approved"
    );
    require_transfer(db, transfer_id).await
}

/// Rejects a transfer under review. Nothing moves.
#[instrument(skip(db, reason))]
pub async fn admin_reject(
    db: &DatabaseConnection,
    transfer_id: i64,
    reason: &str,
) -> Result<transfer_request::Model> {
    let reason = require_reason(reason)?;
    let (request, status) = load(db, transfer_id).await?;
    let next = status.apply(TransferAction::Reject)?;
    transition(
        db,
        &request,
        status,
        next,
        Changes {
            rejection_reason: Some(reason),
            ..Changes::default()
        },
    )
    .await?;
    require_transfer(db, transfer_id).await
}

/// Closes an approved transfer.
pub async fn complete(
    db: &DatabaseConnection,
    transfer_id: i64,
) -> Result<transfer_request::Model> {
    let (request, status) = load(db, transfer_id).await?;
    let next = status.apply(TransferAction::Complete)?;
    transition(db, &request, status, next, Changes::default()).await?;
    require_transfer(db, transfer_id).await
}

/// Finds a transfer request by id.
pub async fn get_transfer<C>(db: &C, transfer_id: i64) -> Result<Option<transfer_request::Model>>
where
    C: ConnectionTrait,
{
    TransferRequest::find_by_id(transfer_id)
        .one(db)
        .await
        .map_err(Into::into)
}

async fn require_transfer(
    db: &DatabaseConnection,
    transfer_id: i64,
) -> Result<transfer_request::Model> {
    get_transfer(db, transfer_id)
        .await?
        .ok_or_else(|| Error::not_found("transfer request", transfer_id))
}

/// Transfers where the user is seller or buyer, newest first.
pub async fn transfers_for_user(
    db: &DatabaseConnection,
    user_id: &str,
) -> Result<Vec<transfer_request::Model>> {
    TransferRequest::find()
        .filter(
            Condition::any()
                .add(transfer_request::Column::SellerId.eq(user_id))
                .add(transfer_request::Column::BuyerId.eq(user_id)),
        )
        .order_by_desc(transfer_request::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::{
        core::{payout::generate_monthly_payouts, property::get_property},
        test_utils::*,
    };

    async fn offer_accepted_and_submitted(
        db: &DatabaseConnection,
        holding_id: i64,
        price: Decimal,
    ) -> Result<transfer_request::Model> {
        let offer = create(db, "alice", holding_id, "bob", price).await?;
        respond(db, offer.id, "bob", true).await?;
        submit_for_review(db, offer.id, "alice").await
    }

    #[test]
    fn test_transition_table() {
        use TransferAction::{Accept, Approve, Cancel, Complete, Decline, Reject, Submit};
        use TransferStatus::{
            Accepted, AdminApproved, AdminPending, AdminRejected, Cancelled, Completed, Pending,
            Rejected,
        };

        assert_eq!(Pending.next(Accept), Some(Accepted));
        assert_eq!(Pending.next(Decline), Some(Rejected));
        assert_eq!(Accepted.next(Submit), Some(AdminPending));
        assert_eq!(AdminPending.next(Approve), Some(AdminApproved));
        assert_eq!(AdminPending.next(Reject), Some(AdminRejected));
        assert_eq!(Accepted.next(Cancel), Some(Cancelled));
        assert_eq!(AdminApproved.next(Complete), Some(Completed));

        assert_eq!(Pending.next(Approve), None);
        assert_eq!(AdminPending.next(Cancel), None);
        assert_eq!(Completed.next(Complete), None);
        assert!(Cancelled.is_terminal());
        assert!(!AdminApproved.is_terminal());
    }

    #[tokio::test]
    async fn test_sale_below_floor_is_rejected() -> Result<()> {
        let db = setup_test_db().await?;
        let holding = invest(&db, "alice", dec!(500000), date(2025, 1, 15)).await?;

        let result = create(&db, "alice", holding.id, "bob", dec!(350000)).await;
        match result {
            Err(Error::SalePriceTooLow {
                sale_price,
                minimum,
            }) => {
                assert_eq!(sale_price, dec!(350000));
                assert_eq!(minimum, dec!(400000));
            }
            other => panic!("expected SalePriceTooLow, got {other:?}"),
        }
        assert!(transfers_for_user(&db, "alice").await?.is_empty());

        create(&db, "alice", holding.id, "bob", dec!(400000)).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_create_checks_owner_and_open_requests() -> Result<()> {
        let db = setup_test_db().await?;
        let holding = invest(&db, "alice", dec!(500000), date(2025, 1, 15)).await?;

        let stranger = create(&db, "mallory", holding.id, "bob", dec!(450000)).await;
        assert!(matches!(stranger, Err(Error::NotOwner { .. })));

        let to_self = create(&db, "alice", holding.id, "alice", dec!(450000)).await;
        assert!(matches!(to_self, Err(Error::Validation { .. })));

        let first = create(&db, "alice", holding.id, "bob", dec!(450000)).await?;
        let second = create(&db, "alice", holding.id, "carol", dec!(450000)).await;
        assert!(matches!(second, Err(Error::TransferAlreadyOpen { .. })));

        // Cancelling frees the holding for a new offer.
        cancel(&db, first.id, "alice").await?;
        create(&db, "alice", holding.id, "carol", dec!(450000)).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_only_named_parties_can_act() -> Result<()> {
        let db = setup_test_db().await?;
        let holding = invest(&db, "alice", dec!(500000), date(2025, 1, 15)).await?;
        let offer = create(&db, "alice", holding.id, "bob", dec!(450000)).await?;

        let wrong_buyer = respond(&db, offer.id, "carol", true).await;
        assert!(matches!(wrong_buyer, Err(Error::Unauthorized { .. })));

        let wrong_seller = cancel(&db, offer.id, "bob").await;
        assert!(matches!(wrong_seller, Err(Error::Unauthorized { .. })));

        let early_submit = submit_for_review(&db, offer.id, "alice").await;
        assert!(matches!(early_submit, Err(Error::InvalidTransition { .. })));

        let declined = respond(&db, offer.id, "bob", false).await?;
        assert_eq!(declined.status, "rejected");
        assert_eq!(declined.buyer_response, "declined");
        assert!(declined.open_holding_id.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_approved_resale_moves_the_position() -> Result<()> {
        let db = setup_test_db().await?;
        let holding = invest(&db, "alice", dec!(500000), date(2025, 1, 15)).await?;
        let property_before = get_property(&db, holding.property_id).await?.unwrap();

        let offer = offer_accepted_and_submitted(&db, holding.id, dec!(450000)).await?;
        assert_eq!(offer.status, "admin_pending");

        // Sold during lock-in.
        let approved = admin_approve(&db, offer.id, Some("KYC ok"), date(2025, 2, 1)).await?;
        assert_eq!(approved.status, "admin_approved");
        assert_eq!(approved.admin_notes.as_deref(), Some("KYC ok"));
        let new_holding_id = approved.new_holding_id.unwrap();

        let old = holding::require_holding(&db, holding.id).await?;
        assert_eq!(old.status, "withdrawn");
        let acquired = holding::require_holding(&db, new_holding_id).await?;
        assert_eq!(acquired.user_id, "bob");
        assert_eq!(acquired.status, "lock-in");
        assert_eq!(acquired.transferred_from, Some(holding.id));
        assert_eq!(acquired.maturity_date, holding.maturity_date);
        assert_eq!(acquired.amount_invested, dec!(500000));

        let seller = wallet::balance(&db, "alice").await?;
        assert_eq!(seller.total_investments, dec!(0));
        assert_eq!(seller.locked_amount, dec!(0));
        assert_eq!(seller.balance, dec!(450000));
        assert_eq!(seller.withdrawable_balance, dec!(450000));

        let buyer = wallet::balance(&db, "bob").await?;
        assert_eq!(buyer.total_investments, dec!(500000));
        assert_eq!(buyer.locked_amount, dec!(500000));

        let property_after = get_property(&db, holding.property_id).await?.unwrap();
        assert_eq!(property_after.total_invested, property_before.total_invested);
        assert_eq!(property_after.investor_count, property_before.investor_count);

        assert!(wallet::verify(&db, "alice").await?);
        assert!(wallet::verify(&db, "bob").await?);

        let completed = complete(&db, offer.id).await?;
        assert_eq!(completed.status, "completed");
        assert!(completed.open_holding_id.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_resale_after_payout_does_not_pay_the_month_twice() -> Result<()> {
        let db = setup_test_db().await?;
        let holding = invest(&db, "alice", dec!(500000), date(2025, 1, 15)).await?;
        generate_monthly_payouts(&db, date(2025, 5, 15)).await?;

        let offer = offer_accepted_and_submitted(&db, holding.id, dec!(500000)).await?;
        let approved = admin_approve(&db, offer.id, None, date(2025, 5, 20)).await?;
        let acquired = holding::require_holding(&db, approved.new_holding_id.unwrap()).await?;
        // Bought after maturity: principal is not locked for the buyer.
        assert_eq!(acquired.status, "matured");
        assert_eq!(wallet::balance(&db, "bob").await?.locked_amount, dec!(0));

        let may_again = generate_monthly_payouts(&db, date(2025, 5, 28)).await?;
        assert_eq!(may_again.created, 0);

        let june = generate_monthly_payouts(&db, date(2025, 6, 15)).await?;
        assert_eq!(june.created, 1);
        assert_eq!(june.payouts[0].user_id, "bob");
        assert!(wallet::verify(&db, "bob").await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_resale_chain_does_not_pay_the_month_twice() -> Result<()> {
        let db = setup_test_db().await?;
        let holding = invest(&db, "alice", dec!(500000), date(2025, 1, 15)).await?;
        let may = generate_monthly_payouts(&db, date(2025, 5, 15)).await?;
        assert_eq!(may.created, 1);

        let first = offer_accepted_and_submitted(&db, holding.id, dec!(500000)).await?;
        let first = admin_approve(&db, first.id, None, date(2025, 5, 16)).await?;
        let bobs = first.new_holding_id.unwrap();

        let second = create(&db, "bob", bobs, "carol", dec!(500000)).await?;
        respond(&db, second.id, "carol", true).await?;
        submit_for_review(&db, second.id, "bob").await?;
        let second = admin_approve(&db, second.id, None, date(2025, 5, 17)).await?;
        let carols = holding::require_holding(&db, second.new_holding_id.unwrap()).await?;
        assert_eq!(carols.transferred_from, Some(bobs));

        let may_again = generate_monthly_payouts(&db, date(2025, 5, 28)).await?;
        assert_eq!(may_again.created, 0);
        assert_eq!(
            wallet::balance(&db, "carol").await?.earnings_received,
            dec!(0)
        );

        let june = generate_monthly_payouts(&db, date(2025, 6, 15)).await?;
        assert_eq!(june.created, 1);
        assert_eq!(june.payouts[0].user_id, "carol");
        assert!(wallet::verify(&db, "carol").await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_admin_reject_requires_reason() -> Result<()> {
        let db = setup_test_db().await?;
        let holding = invest(&db, "alice", dec!(500000), date(2025, 1, 15)).await?;
        let offer = offer_accepted_and_submitted(&db, holding.id, dec!(450000)).await?;

        let blank = admin_reject(&db, offer.id, "").await;
        assert!(matches!(blank, Err(Error::Validation { .. })));

        let rejected = admin_reject(&db, offer.id, "Buyer failed KYC").await?;
        assert_eq!(rejected.status, "admin_rejected");
        assert_eq!(wallet::balance(&db, "bob").await?.total_investments, dec!(0));

        let again = admin_approve(&db, offer.id, None, date(2025, 2, 1)).await;
        assert!(matches!(again, Err(Error::AlreadyProcessed { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_offer_refused_while_principal_withdrawal_is_open() -> Result<()> {
        let db = setup_test_db().await?;
        let holding = invest(&db, "alice", dec!(500000), date(2025, 1, 15)).await?;
        let request = withdrawal::create(
            &db,
            withdrawal::NewWithdrawal {
                user_id: "alice".to_string(),
                amount: dec!(500000),
                kind: withdrawal::WithdrawalKind::Investment,
                holding_id: Some(holding.id),
                bank: test_bank_details(),
            },
            date(2025, 5, 1),
        )
        .await?;

        let blocked = create(&db, "alice", holding.id, "bob", dec!(450000)).await;
        assert!(matches!(
            blocked,
            Err(Error::WithdrawalAlreadyOpen { holding_id }) if holding_id == holding.id
        ));
        assert!(transfers_for_user(&db, "alice").await?.is_empty());

        withdrawal::reject(&db, request.id, "Seller changed their mind").await?;
        create(&db, "alice", holding.id, "bob", dec!(450000)).await?;
        Ok(())
    }
}
