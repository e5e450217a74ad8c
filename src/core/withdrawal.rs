//! Withdrawal workflow - investor requests to take money off the platform.
//!
//! ```text
//! pending --start_processing--> processing --complete--> completed
//! pending | processing --reject--> rejected
//! ```
//!
//! Open requests (pending or processing) reserve their amount: a new earnings or balance
//! request is checked against the wallet minus what is already reserved. The ledger entry is
//! posted as `pending` when processing starts and settled on completion or rejection, so the
//! wallet only moves when money actually leaves.

use crate::{
    core::{
        concurrency::retry_on_conflict,
        holding::{self, HoldingStatus},
        transfer,
        wallet::{self, NewTransaction, TransactionStatus, TransactionType},
        workflow::{BulkOutcome, StateMachine, require_reason},
    },
    entities::{WithdrawalRequest, withdrawal_request},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr};
use std::fmt;
use tracing::{info, instrument};

/// What the withdrawal draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WithdrawalKind {
    /// The full principal of one matured holding
    Investment,
    /// Accumulated payouts
    Earnings,
    /// Credited cash such as resale proceeds
    Balance,
}

impl WithdrawalKind {
    /// Stored string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Investment => "investment",
            Self::Earnings => "earnings",
            Self::Balance => "balance",
        }
    }

    /// Parses the stored string form.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "investment" => Some(Self::Investment),
            "earnings" => Some(Self::Earnings),
            "balance" => Some(Self::Balance),
            _ => None,
        }
    }
}

impl fmt::Display for WithdrawalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a withdrawal request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WithdrawalStatus {
    /// Waiting for an admin
    Pending,
    /// Payout in progress
    Processing,
    /// Money sent
    Completed,
    /// Refused
    Rejected,
}

/// Admin actions on a withdrawal request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WithdrawalAction {
    /// Begin paying out
    StartProcessing,
    /// Payout confirmed
    Complete,
    /// Refuse the request
    Reject,
}

impl fmt::Display for WithdrawalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::StartProcessing => "start processing",
            Self::Complete => "complete",
            Self::Reject => "reject",
        })
    }
}

impl fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl StateMachine for WithdrawalStatus {
    type Action = WithdrawalAction;

    const WORKFLOW: &'static str = "withdrawal";

    fn next(self, action: WithdrawalAction) -> Option<Self> {
        match (self, action) {
            (Self::Pending, WithdrawalAction::StartProcessing) => Some(Self::Processing),
            (Self::Processing, WithdrawalAction::Complete) => Some(Self::Completed),
            (Self::Pending | Self::Processing, WithdrawalAction::Reject) => Some(Self::Rejected),
            _ => None,
        }
    }

    fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Rejected)
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// Destination bank account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankDetails {
    /// Name on the account
    pub account_holder: String,
    /// 9 to 18 digits
    pub account_number: String,
    /// Four letters, a zero, then six alphanumerics
    pub ifsc_code: String,
}

impl BankDetails {
    /// Returns the details trimmed and normalised, or a validation error.
    pub fn validate(&self) -> Result<Self> {
        let account_holder = self.account_holder.trim();
        if account_holder.is_empty() {
            return Err(Error::validation("account holder name is required"));
        }

        let account_number = self.account_number.trim();
        if !(9..=18).contains(&account_number.len())
            || !account_number.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(Error::validation("account number must be 9 to 18 digits"));
        }

        let ifsc_code = self.ifsc_code.trim().to_ascii_uppercase();
        if !is_valid_ifsc(&ifsc_code) {
            return Err(Error::validation(format!(
                "'{ifsc_code}' is not a valid IFSC code"
            )));
        }

        Ok(Self {
            account_holder: account_holder.to_string(),
            account_number: account_number.to_string(),
            ifsc_code,
        })
    }
}

fn is_valid_ifsc(code: &str) -> bool {
    let bytes = code.as_bytes();
    bytes.len() == 11
        && bytes[..4].iter().all(u8::is_ascii_uppercase)
        && bytes[4] == b'0'
        && bytes[5..].iter().all(u8::is_ascii_alphanumeric)
}

/// A withdrawal request to file.
#[derive(Debug, Clone)]
pub struct NewWithdrawal {
    /// Requesting investor
    pub user_id: String,
    /// Amount to withdraw
    pub amount: Decimal,
    /// Source of the money
    pub kind: WithdrawalKind,
    /// Holding whose principal is withdrawn; only for `Investment`
    pub holding_id: Option<i64>,
    /// Destination account
    pub bank: BankDetails,
}

const OPEN_STATUSES: [WithdrawalStatus; 2] =
    [WithdrawalStatus::Pending, WithdrawalStatus::Processing];

/// Files a withdrawal request after checking it against what the investor can withdraw.
///
/// # Errors
/// - `Error::InvalidAmount`, `Error::Validation` for malformed input
/// - `Error::ExceedsWithdrawable` if earnings or balance (minus open requests) is too small
/// - `Error::NotOwner`, `Error::HoldingWithdrawn`, `Error::HoldingNotMatured` for principal
///   withdrawals the holding does not allow
/// - `Error::TransferAlreadyOpen` if the holding is on offer to another investor
#[instrument(skip(db, new), fields(user_id = %new.user_id, kind = %new.kind, amount = %new.amount))]
pub async fn create(
    db: &DatabaseConnection,
    new: NewWithdrawal,
    now: DateTime<Utc>,
) -> Result<withdrawal_request::Model> {
    if new.amount <= Decimal::ZERO {
        return Err(Error::InvalidAmount { amount: new.amount });
    }
    let bank = new.bank.validate()?;

    let txn = db.begin().await?;

    match new.kind {
        WithdrawalKind::Earnings | WithdrawalKind::Balance => {
            if new.holding_id.is_some() {
                return Err(Error::validation(
                    "only principal withdrawals reference a holding",
                ));
            }
            let wallet = wallet::balance(&txn, &new.user_id).await?;
            let source = if new.kind == WithdrawalKind::Earnings {
                wallet.earnings_received
            } else {
                wallet.balance
            };
            let reserved = reserved_amount(&txn, &new.user_id, new.kind).await?;
            let available = (source - reserved).max(Decimal::ZERO);
            if new.amount > available {
                return Err(Error::ExceedsWithdrawable {
                    requested: new.amount,
                    available,
                });
            }
        }
        WithdrawalKind::Investment => {
            let holding_id = new.holding_id.ok_or_else(|| {
                Error::validation("a principal withdrawal must name the holding")
            })?;
            let holding = holding::require_holding(&txn, holding_id).await?;
            if holding.user_id != new.user_id {
                return Err(Error::NotOwner {
                    holding_id,
                    user_id: new.user_id,
                });
            }
            if holding.status == HoldingStatus::Withdrawn.as_str() {
                return Err(Error::HoldingWithdrawn { holding_id });
            }
            if !holding::is_matured(&holding, now) {
                return Err(Error::HoldingNotMatured {
                    holding_id,
                    maturity_date: holding.maturity_date,
                });
            }
            if new.amount != holding.amount_invested {
                return Err(Error::validation(format!(
                    "principal withdrawals must be for the full {}",
                    holding.amount_invested.normalize()
                )));
            }
            if open_principal_request(&txn, holding_id).await? {
                return Err(Error::validation(format!(
                    "holding {holding_id} already has an open withdrawal request"
                )));
            }
            if transfer::has_open_transfer(&txn, holding_id).await? {
                return Err(Error::TransferAlreadyOpen { holding_id });
            }
        }
    }

    let request = withdrawal_request::ActiveModel {
        user_id: Set(new.user_id),
        amount: Set(new.amount),
        kind: Set(new.kind.as_str().to_string()),
        holding_id: Set(new.holding_id),
        account_holder: Set(bank.account_holder),
        account_number: Set(bank.account_number),
        ifsc_code: Set(bank.ifsc_code),
        status: Set(WithdrawalStatus::Pending.as_str().to_string()),
        rejection_reason: Set(None),
        transaction_id: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;
    info!(withdrawal_id = request.id, "Withdrawal requested");
    Ok(request)
}

fn open_status_strings() -> Vec<&'static str> {
    OPEN_STATUSES.iter().map(|s| s.as_str()).collect()
}

async fn reserved_amount<C>(db: &C, user_id: &str, kind: WithdrawalKind) -> Result<Decimal>
where
    C: ConnectionTrait,
{
    let open = WithdrawalRequest::find()
        .filter(withdrawal_request::Column::UserId.eq(user_id))
        .filter(withdrawal_request::Column::Kind.eq(kind.as_str()))
        .filter(withdrawal_request::Column::Status.is_in(open_status_strings()))
        .all(db)
        .await?;
    Ok(open.iter().map(|r| r.amount).sum())
}

pub(crate) async fn open_principal_request<C>(db: &C, holding_id: i64) -> Result<bool>
where
    C: ConnectionTrait,
{
    Ok(WithdrawalRequest::find()
        .filter(withdrawal_request::Column::HoldingId.eq(holding_id))
        .filter(withdrawal_request::Column::Status.is_in(open_status_strings()))
        .one(db)
        .await?
        .is_some())
}

async fn load<C>(db: &C, withdrawal_id: i64) -> Result<(withdrawal_request::Model, WithdrawalStatus)>
where
    C: ConnectionTrait,
{
    let request = get_withdrawal(db, withdrawal_id)
        .await?
        .ok_or_else(|| Error::not_found("withdrawal request", withdrawal_id))?;
    let status = WithdrawalStatus::from_stored(&request.status)?;
    if status.is_terminal() {
        return Err(Error::AlreadyProcessed {
            entity: "withdrawal request",
            id: withdrawal_id.to_string(),
        });
    }
    Ok((request, status))
}

fn kind_of(request: &withdrawal_request::Model) -> Result<WithdrawalKind> {
    WithdrawalKind::parse(&request.kind).ok_or_else(|| {
        Error::Database(DbErr::Custom(format!(
            "unknown withdrawal kind '{}'",
            request.kind
        )))
    })
}

/// `UPDATE ... SET status = to WHERE id = ? AND status = from`. Losing the race means
/// someone else already moved the request.
async fn transition<C>(
    db: &C,
    request: &withdrawal_request::Model,
    from: WithdrawalStatus,
    to: WithdrawalStatus,
    transaction_id: Option<i64>,
    rejection_reason: Option<String>,
) -> Result<()>
where
    C: ConnectionTrait,
{
    let mut update = WithdrawalRequest::update_many()
        .col_expr(withdrawal_request::Column::Status, Expr::value(to.as_str()))
        .col_expr(withdrawal_request::Column::UpdatedAt, Expr::value(Utc::now()));
    if let Some(transaction_id) = transaction_id {
        update = update.col_expr(
            withdrawal_request::Column::TransactionId,
            Expr::value(Some(transaction_id)),
        );
    }
    if let Some(reason) = rejection_reason {
        update = update.col_expr(
            withdrawal_request::Column::RejectionReason,
            Expr::value(Some(reason)),
        );
    }

    let result = update
        .filter(withdrawal_request::Column::Id.eq(request.id))
        .filter(withdrawal_request::Column::Status.eq(from.as_str()))
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        return Err(Error::AlreadyProcessed {
            entity: "withdrawal request",
            id: request.id.to_string(),
        });
    }
    Ok(())
}

/// Posts the pending ledger entry and moves the request to processing.
async fn begin_processing<C>(db: &C, request: &withdrawal_request::Model) -> Result<i64>
where
    C: ConnectionTrait + TransactionTrait,
{
    let kind = kind_of(request)?;
    let entry = match kind {
        WithdrawalKind::Investment => {
            let holding_id = request.holding_id.ok_or_else(|| {
                Error::Database(DbErr::Custom(format!(
                    "principal withdrawal {} has no holding",
                    request.id
                )))
            })?;
            NewTransaction::completed(
                request.user_id.clone(),
                TransactionType::Withdrawal,
                request.amount,
                format!("Principal withdrawal {} for holding {holding_id}", request.id),
            )
            .with_holding(holding_id)
        }
        WithdrawalKind::Earnings => NewTransaction::completed(
            request.user_id.clone(),
            TransactionType::Withdrawal,
            request.amount,
            format!("Earnings withdrawal {}", request.id),
        ),
        WithdrawalKind::Balance => NewTransaction::completed(
            request.user_id.clone(),
            TransactionType::Debit,
            request.amount,
            format!("Balance withdrawal {}", request.id),
        ),
    };

    let posted = wallet::post(db, entry.pending()).await?;
    transition(
        db,
        request,
        WithdrawalStatus::Pending,
        WithdrawalStatus::Processing,
        Some(posted.transaction.id),
        None,
    )
    .await?;
    Ok(posted.transaction.id)
}

/// Settles the ledger entry, closes the holding for principal withdrawals, and marks the
/// request completed.
async fn finish<C>(
    db: &C,
    request: &withdrawal_request::Model,
    transaction_id: i64,
    now: DateTime<Utc>,
) -> Result<()>
where
    C: ConnectionTrait + TransactionTrait,
{
    if let Some(holding_id) = request.holding_id {
        // A holding past maturity may not have been synced yet.
        holding::mature_holding(db, holding_id, now).await?;
    }

    wallet::settle(db, transaction_id, TransactionStatus::Completed).await?;

    if let Some(holding_id) = request.holding_id {
        holding::mark_withdrawn(db, holding_id, now).await?;
    }

    transition(
        db,
        request,
        WithdrawalStatus::Processing,
        WithdrawalStatus::Completed,
        None,
        None,
    )
    .await
}

/// Moves a pending request to processing and posts its pending ledger entry.
#[instrument(skip(db))]
pub async fn start_processing(
    db: &DatabaseConnection,
    withdrawal_id: i64,
) -> Result<withdrawal_request::Model> {
    retry_on_conflict(|| start_processing_once(db, withdrawal_id)).await
}

async fn start_processing_once(
    db: &DatabaseConnection,
    withdrawal_id: i64,
) -> Result<withdrawal_request::Model> {
    let txn = db.begin().await?;
    let (request, status) = load(&txn, withdrawal_id).await?;
    status.apply(WithdrawalAction::StartProcessing)?;

    begin_processing(&txn, &request).await?;
    txn.commit().await?;

    require_withdrawal(db, withdrawal_id).await
}

/// Completes a processing request: the wallet is debited and, for principal withdrawals, the
/// holding is closed.
#[instrument(skip(db))]
pub async fn complete(
    db: &DatabaseConnection,
    withdrawal_id: i64,
    now: DateTime<Utc>,
) -> Result<withdrawal_request::Model> {
    retry_on_conflict(|| complete_once(db, withdrawal_id, now)).await
}

async fn complete_once(
    db: &DatabaseConnection,
    withdrawal_id: i64,
    now: DateTime<Utc>,
) -> Result<withdrawal_request::Model> {
    let txn = db.begin().await?;
    let (request, status) = load(&txn, withdrawal_id).await?;
    status.apply(WithdrawalAction::Complete)?;

    let transaction_id = request.transaction_id.ok_or_else(|| {
        Error::Database(DbErr::Custom(format!(
            "withdrawal {withdrawal_id} is processing without a ledger entry"
        )))
    })?;
    finish(&txn, &request, transaction_id, now).await?;
    txn.commit().await?;

    info!(withdrawal_id, "Withdrawal completed");
    require_withdrawal(db, withdrawal_id).await
}

/// Approves a pending or processing request in one step.
#[instrument(skip(db))]
pub async fn approve(
    db: &DatabaseConnection,
    withdrawal_id: i64,
    now: DateTime<Utc>,
) -> Result<withdrawal_request::Model> {
    retry_on_conflict(|| approve_once(db, withdrawal_id, now)).await
}

async fn approve_once(
    db: &DatabaseConnection,
    withdrawal_id: i64,
    now: DateTime<Utc>,
) -> Result<withdrawal_request::Model> {
    let txn = db.begin().await?;
    let (request, status) = load(&txn, withdrawal_id).await?;

    let transaction_id = match (status, request.transaction_id) {
        (WithdrawalStatus::Processing, Some(transaction_id)) => transaction_id,
        _ => {
            status.apply(WithdrawalAction::StartProcessing)?;
            begin_processing(&txn, &request).await?
        }
    };
    finish(&txn, &request, transaction_id, now).await?;
    txn.commit().await?;

    info!(withdrawal_id, "Withdrawal approved");
    require_withdrawal(db, withdrawal_id).await
}

/// Rejects a request with a reason. Any pending ledger entry is failed, which releases the
/// reservation without touching the wallet.
#[instrument(skip(db, reason))]
pub async fn reject(
    db: &DatabaseConnection,
    withdrawal_id: i64,
    reason: &str,
) -> Result<withdrawal_request::Model> {
    let reason = require_reason(reason)?;
    retry_on_conflict(|| reject_once(db, withdrawal_id, &reason)).await
}

async fn reject_once(
    db: &DatabaseConnection,
    withdrawal_id: i64,
    reason: &str,
) -> Result<withdrawal_request::Model> {
    let txn = db.begin().await?;
    let (request, status) = load(&txn, withdrawal_id).await?;
    let rejected = status.apply(WithdrawalAction::Reject)?;

    if let Some(transaction_id) = request.transaction_id {
        wallet::settle(&txn, transaction_id, TransactionStatus::Failed).await?;
    }
    transition(&txn, &request, status, rejected, None, Some(reason.to_string())).await?;
    txn.commit().await?;

    info!(withdrawal_id, "Withdrawal rejected");
    require_withdrawal(db, withdrawal_id).await
}

/// Approves each request independently; one failure does not affect the others.
pub async fn bulk_approve(
    db: &DatabaseConnection,
    withdrawal_ids: &[i64],
    now: DateTime<Utc>,
) -> BulkOutcome {
    let mut outcome = BulkOutcome::default();
    for &id in withdrawal_ids {
        let result = approve(db, id, now).await;
        outcome.record(id, &result);
    }
    outcome
}

/// Rejects each request independently with the same reason.
pub async fn bulk_reject(
    db: &DatabaseConnection,
    withdrawal_ids: &[i64],
    reason: &str,
) -> BulkOutcome {
    let mut outcome = BulkOutcome::default();
    for &id in withdrawal_ids {
        let result = reject(db, id, reason).await;
        outcome.record(id, &result);
    }
    outcome
}

/// Finds a withdrawal request by id.
pub async fn get_withdrawal<C>(
    db: &C,
    withdrawal_id: i64,
) -> Result<Option<withdrawal_request::Model>>
where
    C: ConnectionTrait,
{
    WithdrawalRequest::find_by_id(withdrawal_id)
        .one(db)
        .await
        .map_err(Into::into)
}

async fn require_withdrawal(
    db: &DatabaseConnection,
    withdrawal_id: i64,
) -> Result<withdrawal_request::Model> {
    get_withdrawal(db, withdrawal_id)
        .await?
        .ok_or_else(|| Error::not_found("withdrawal request", withdrawal_id))
}

/// A user's withdrawal requests, newest first.
pub async fn withdrawals_for_user(
    db: &DatabaseConnection,
    user_id: &str,
) -> Result<Vec<withdrawal_request::Model>> {
    WithdrawalRequest::find()
        .filter(withdrawal_request::Column::UserId.eq(user_id))
        .order_by_desc(withdrawal_request::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Requests waiting for an admin, oldest first.
pub async fn pending_withdrawals(
    db: &DatabaseConnection,
) -> Result<Vec<withdrawal_request::Model>> {
    WithdrawalRequest::find()
        .filter(withdrawal_request::Column::Status.is_in(open_status_strings()))
        .order_by_asc(withdrawal_request::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}
