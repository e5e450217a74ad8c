//! Wallet ledger - the only writer of wallet rows.
//!
//! Every change to a user's wallet is an appended [`transaction`] row plus, for completed
//! entries, the matching update of the wallet aggregate, both inside one database
//! transaction. The aggregate can always be rebuilt with [`replay`]. Wallet rows are updated
//! with `WHERE version = <read version>` so a concurrent writer surfaces as
//! [`Error::Conflict`] instead of a lost update.

use crate::{
    core::concurrency::{conflict, is_unique_violation, retry_on_conflict},
    entities::{Transaction, Wallet, transaction, wallet},
    errors::{Error, Result},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    QueryOrder, Set, TransactionTrait, prelude::*,
    sea_query::Expr,
};
use std::fmt;
use tracing::{debug, instrument};

/// Kind of ledger entry. The kind alone (plus whether a holding is referenced) decides
/// which wallet fields move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionType {
    /// Principal committed to a holding: `total_investments` and `locked_amount` grow
    Investment,
    /// A holding left lock-in: `locked_amount` shrinks
    Release,
    /// Monthly payout: `earnings_received` grows
    Earning,
    /// Money leaving the platform: principal when a holding is referenced, earnings otherwise
    Withdrawal,
    /// A holding was sold: `total_investments` shrinks
    TransferOut,
    /// Cash credited to `balance`
    Credit,
    /// Cash debited from `balance`
    Debit,
}

impl TransactionType {
    /// Stored string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Investment => "investment",
            Self::Release => "release",
            Self::Earning => "earning",
            Self::Withdrawal => "withdrawal",
            Self::TransferOut => "transfer_out",
            Self::Credit => "credit",
            Self::Debit => "debit",
        }
    }

    /// Parses the stored string form.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "investment" => Some(Self::Investment),
            "release" => Some(Self::Release),
            "earning" => Some(Self::Earning),
            "withdrawal" => Some(Self::Withdrawal),
            "transfer_out" => Some(Self::TransferOut),
            "credit" => Some(Self::Credit),
            "debit" => Some(Self::Debit),
            _ => None,
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a ledger entry. Only `Pending` entries may change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Appended, no wallet effect yet
    Pending,
    /// Applied to the wallet
    Completed,
    /// Abandoned, never applied
    Failed,
}

impl TransactionStatus {
    /// Stored string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parses the stored string form.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Whether the entry can no longer change.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A ledger entry to append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    /// Wallet owner
    pub user_id: String,
    /// Entry kind
    pub transaction_type: TransactionType,
    /// Positive amount
    pub amount: Decimal,
    /// Initial status
    pub status: TransactionStatus,
    /// Related holding
    pub holding_id: Option<i64>,
    /// Related property
    pub property_id: Option<i64>,
    /// Gateway payment id
    pub payment_id: Option<String>,
    /// Human-readable description
    pub description: String,
}

impl NewTransaction {
    /// A completed entry with no references.
    pub fn completed(
        user_id: impl Into<String>,
        transaction_type: TransactionType,
        amount: Decimal,
        description: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            transaction_type,
            amount,
            status: TransactionStatus::Completed,
            holding_id: None,
            property_id: None,
            payment_id: None,
            description: description.into(),
        }
    }

    /// Marks the entry as pending; it affects the wallet only once settled.
    #[must_use]
    pub const fn pending(mut self) -> Self {
        self.status = TransactionStatus::Pending;
        self
    }

    /// References a holding.
    #[must_use]
    pub const fn with_holding(mut self, holding_id: i64) -> Self {
        self.holding_id = Some(holding_id);
        self
    }

    /// References a property.
    #[must_use]
    pub const fn with_property(mut self, property_id: i64) -> Self {
        self.property_id = Some(property_id);
        self
    }

    /// Records the gateway payment that funded the entry.
    #[must_use]
    pub fn with_payment(mut self, payment_id: Option<String>) -> Self {
        self.payment_id = payment_id;
        self
    }
}

/// The four monetary fields of a wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Balances {
    /// Credited cash
    pub balance: Decimal,
    /// Open principal
    pub total_investments: Decimal,
    /// Principal still in lock-in
    pub locked_amount: Decimal,
    /// Unwithdrawn earnings
    pub earnings_received: Decimal,
}

impl From<&wallet::Model> for Balances {
    fn from(wallet: &wallet::Model) -> Self {
        Self {
            balance: wallet.balance,
            total_investments: wallet.total_investments,
            locked_amount: wallet.locked_amount,
            earnings_received: wallet.earnings_received,
        }
    }
}

impl Balances {
    /// Matured principal plus unwithdrawn earnings plus credited cash.
    #[must_use]
    pub fn withdrawable(&self) -> Decimal {
        (self.total_investments - self.locked_amount) + self.earnings_received + self.balance
    }

    /// Returns the balances after applying one completed entry.
    ///
    /// `holding_scoped` distinguishes principal withdrawals from earnings withdrawals.
    ///
    /// # Errors
    /// Returns `Error::InsufficientFunds` if any field would become negative.
    pub fn apply(
        &self,
        transaction_type: TransactionType,
        amount: Decimal,
        holding_scoped: bool,
    ) -> Result<Self> {
        let mut next = *self;
        match transaction_type {
            TransactionType::Investment => {
                next.total_investments += amount;
                next.locked_amount += amount;
            }
            TransactionType::Release => {
                next.locked_amount = debit("locked_amount", self.locked_amount, amount)?;
            }
            TransactionType::Earning => next.earnings_received += amount,
            TransactionType::Withdrawal if holding_scoped => {
                next.total_investments =
                    debit("total_investments", self.total_investments, amount)?;
            }
            TransactionType::Withdrawal => {
                next.earnings_received =
                    debit("earnings_received", self.earnings_received, amount)?;
            }
            TransactionType::TransferOut => {
                next.total_investments =
                    debit("total_investments", self.total_investments, amount)?;
            }
            TransactionType::Credit => next.balance += amount,
            TransactionType::Debit => {
                next.balance = debit("balance", self.balance, amount)?;
            }
        }

        // Principal cannot be both withdrawn and locked.
        if next.locked_amount > next.total_investments {
            return Err(Error::InsufficientFunds {
                field: "total_investments",
                current: next.total_investments,
                required: next.locked_amount,
            });
        }

        Ok(next)
    }
}

fn debit(field: &'static str, current: Decimal, amount: Decimal) -> Result<Decimal> {
    if amount > current {
        return Err(Error::InsufficientFunds {
            field,
            current,
            required: amount,
        });
    }
    Ok(current - amount)
}

/// A posted entry together with the wallet state after it.
#[derive(Debug, Clone)]
pub struct Posted {
    /// The appended ledger row
    pub transaction: transaction::Model,
    /// Wallet after the entry
    pub wallet: wallet::Model,
}

fn empty_wallet(user_id: &str) -> wallet::Model {
    wallet::Model {
        user_id: user_id.to_string(),
        balance: Decimal::ZERO,
        total_investments: Decimal::ZERO,
        locked_amount: Decimal::ZERO,
        earnings_received: Decimal::ZERO,
        withdrawable_balance: Decimal::ZERO,
        version: 0,
        updated_at: Utc::now(),
    }
}

/// Returns a consistent snapshot of the user's wallet.
///
/// Users without a wallet row get an all-zero wallet; nothing is written.
pub async fn balance<C>(db: &C, user_id: &str) -> Result<wallet::Model>
where
    C: ConnectionTrait,
{
    Ok(Wallet::find_by_id(user_id.to_string())
        .one(db)
        .await?
        .unwrap_or_else(|| empty_wallet(user_id)))
}

async fn find_or_create_wallet<C>(db: &C, user_id: &str) -> Result<wallet::Model>
where
    C: ConnectionTrait,
{
    if let Some(existing) = Wallet::find_by_id(user_id.to_string()).one(db).await? {
        return Ok(existing);
    }

    let fresh = empty_wallet(user_id);
    let active: wallet::ActiveModel = fresh.clone().into();
    match Wallet::insert(active).exec_without_returning(db).await {
        Ok(_) => Ok(fresh),
        Err(e) if is_unique_violation(&e) => Err(conflict(format!("wallet {user_id}"))),
        Err(e) => Err(e.into()),
    }
}

/// Applies one completed entry to the wallet row under the version check.
async fn apply_to_wallet<C>(
    db: &C,
    user_id: &str,
    transaction_type: TransactionType,
    amount: Decimal,
    holding_scoped: bool,
) -> Result<wallet::Model>
where
    C: ConnectionTrait,
{
    let current = find_or_create_wallet(db, user_id).await?;
    let next = Balances::from(&current).apply(transaction_type, amount, holding_scoped)?;
    let updated = write_balances(db, &current, next).await?;

    debug!(
        user_id,
        %transaction_type,
        %amount,
        version = updated.version,
        "Applied ledger entry to wallet"
    );
    Ok(updated)
}

/// Writes `next` over the wallet row, only if its version still matches `current`.
async fn write_balances<C>(db: &C, current: &wallet::Model, next: Balances) -> Result<wallet::Model>
where
    C: ConnectionTrait,
{
    let withdrawable = next.withdrawable();
    let version = current.version + 1;
    let now = Utc::now();

    let result = Wallet::update_many()
        .col_expr(wallet::Column::Balance, Expr::value(next.balance))
        .col_expr(
            wallet::Column::TotalInvestments,
            Expr::value(next.total_investments),
        )
        .col_expr(wallet::Column::LockedAmount, Expr::value(next.locked_amount))
        .col_expr(
            wallet::Column::EarningsReceived,
            Expr::value(next.earnings_received),
        )
        .col_expr(
            wallet::Column::WithdrawableBalance,
            Expr::value(withdrawable),
        )
        .col_expr(wallet::Column::Version, Expr::value(version))
        .col_expr(wallet::Column::UpdatedAt, Expr::value(now))
        .filter(wallet::Column::UserId.eq(current.user_id.as_str()))
        .filter(wallet::Column::Version.eq(current.version))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(conflict(format!("wallet {}", current.user_id)));
    }

    Ok(wallet::Model {
        user_id: current.user_id.clone(),
        balance: next.balance,
        total_investments: next.total_investments,
        locked_amount: next.locked_amount,
        earnings_received: next.earnings_received,
        withdrawable_balance: withdrawable,
        version,
        updated_at: now,
    })
}

/// Appends a ledger entry and, if it is completed, applies it to the wallet.
///
/// Both halves run in one database transaction (a savepoint when `db` is already a
/// transaction), so either both happen or neither does.
///
/// # Errors
/// - `Error::InvalidAmount` if the amount is not positive
/// - `Error::InsufficientFunds` if a wallet field would go negative
/// - `Error::Conflict` if the wallet changed concurrently
/// - `Error::AlreadyProcessed` if the payment id was already used
#[instrument(skip(db, entry), fields(user_id = %entry.user_id, kind = %entry.transaction_type, amount = %entry.amount))]
pub async fn post<C>(db: &C, entry: NewTransaction) -> Result<Posted>
where
    C: ConnectionTrait + TransactionTrait,
{
    if entry.amount <= Decimal::ZERO {
        return Err(Error::InvalidAmount {
            amount: entry.amount,
        });
    }

    let txn = db.begin().await?;
    let now = Utc::now();

    let wallet = if entry.status == TransactionStatus::Completed {
        apply_to_wallet(
            &txn,
            &entry.user_id,
            entry.transaction_type,
            entry.amount,
            entry.holding_id.is_some(),
        )
        .await?
    } else {
        balance(&txn, &entry.user_id).await?
    };

    let payment_id = entry.payment_id.clone();
    let row = transaction::ActiveModel {
        user_id: Set(entry.user_id),
        transaction_type: Set(entry.transaction_type.as_str().to_string()),
        amount: Set(entry.amount),
        status: Set(entry.status.as_str().to_string()),
        holding_id: Set(entry.holding_id),
        property_id: Set(entry.property_id),
        payment_id: Set(entry.payment_id),
        description: Set(entry.description),
        created_at: Set(now),
        settled_at: Set(entry.status.is_terminal().then_some(now)),
        ..Default::default()
    };

    let transaction = match row.insert(&txn).await {
        Ok(model) => model,
        Err(e) if is_unique_violation(&e) => {
            return Err(Error::AlreadyProcessed {
                entity: "payment",
                id: payment_id.unwrap_or_default(),
            });
        }
        Err(e) => return Err(e.into()),
    };

    txn.commit().await?;
    Ok(Posted {
        transaction,
        wallet,
    })
}

/// Posts a standalone entry, retrying once on a concurrent wallet update.
pub async fn post_with_retry(db: &DatabaseConnection, entry: NewTransaction) -> Result<Posted> {
    retry_on_conflict(|| post(db, entry.clone())).await
}

/// Moves a pending entry to `Completed` (applying it) or `Failed`.
///
/// # Errors
/// - `Error::Validation` if `outcome` is `Pending`
/// - `Error::AlreadyProcessed` if the entry is already terminal
/// - `Error::InsufficientFunds` if completing it would overdraw the wallet
#[instrument(skip(db))]
pub async fn settle<C>(db: &C, transaction_id: i64, outcome: TransactionStatus) -> Result<Posted>
where
    C: ConnectionTrait + TransactionTrait,
{
    if !outcome.is_terminal() {
        return Err(Error::validation("a ledger entry can only settle to completed or failed"));
    }

    let txn = db.begin().await?;

    let entry = Transaction::find_by_id(transaction_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("transaction", transaction_id))?;
    let status = TransactionStatus::parse(&entry.status).ok_or_else(|| {
        Error::Database(DbErr::Custom(format!(
            "unknown transaction status '{}'",
            entry.status
        )))
    })?;
    if status.is_terminal() {
        return Err(Error::AlreadyProcessed {
            entity: "transaction",
            id: transaction_id.to_string(),
        });
    }

    let now = Utc::now();
    let updated = Transaction::update_many()
        .col_expr(transaction::Column::Status, Expr::value(outcome.as_str()))
        .col_expr(transaction::Column::SettledAt, Expr::value(Some(now)))
        .filter(transaction::Column::Id.eq(transaction_id))
        .filter(transaction::Column::Status.eq(TransactionStatus::Pending.as_str()))
        .exec(&txn)
        .await?;
    if updated.rows_affected == 0 {
        return Err(Error::AlreadyProcessed {
            entity: "transaction",
            id: transaction_id.to_string(),
        });
    }

    let wallet = if outcome == TransactionStatus::Completed {
        let transaction_type = parse_type(&entry.transaction_type)?;
        apply_to_wallet(
            &txn,
            &entry.user_id,
            transaction_type,
            entry.amount,
            entry.holding_id.is_some(),
        )
        .await?
    } else {
        balance(&txn, &entry.user_id).await?
    };

    let transaction = transaction::Model {
        status: outcome.as_str().to_string(),
        settled_at: Some(now),
        ..entry
    };

    txn.commit().await?;
    Ok(Posted {
        transaction,
        wallet,
    })
}

fn parse_type(value: &str) -> Result<TransactionType> {
    TransactionType::parse(value).ok_or_else(|| {
        Error::Database(DbErr::Custom(format!("unknown transaction type '{value}'")))
    })
}

/// All ledger entries for a user, newest first.
pub async fn transactions_for_user<C>(db: &C, user_id: &str) -> Result<Vec<transaction::Model>>
where
    C: ConnectionTrait,
{
    Transaction::find()
        .filter(transaction::Column::UserId.eq(user_id))
        .order_by_desc(transaction::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Rebuilds the wallet fields from the user's completed entries.
///
/// # Errors
/// Returns `Error::InsufficientFunds` if the log itself is inconsistent.
pub async fn replay<C>(db: &C, user_id: &str) -> Result<Balances>
where
    C: ConnectionTrait,
{
    let entries = Transaction::find()
        .filter(transaction::Column::UserId.eq(user_id))
        .filter(transaction::Column::Status.eq(TransactionStatus::Completed.as_str()))
        .order_by_asc(transaction::Column::Id)
        .all(db)
        .await?;

    entries.iter().try_fold(Balances::default(), |acc, entry| {
        acc.apply(
            parse_type(&entry.transaction_type)?,
            entry.amount,
            entry.holding_id.is_some(),
        )
    })
}

/// Whether the stored wallet matches a replay of the log.
pub async fn verify<C>(db: &C, user_id: &str) -> Result<bool>
where
    C: ConnectionTrait,
{
    let stored = balance(db, user_id).await?;
    let replayed = replay(db, user_id).await?;
    Ok(Balances::from(&stored) == replayed
        && stored.withdrawable_balance == replayed.withdrawable())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_apply_investment_then_release() {
        let start = Balances::default();
        let invested = start
            .apply(TransactionType::Investment, dec!(1000), true)
            .unwrap();
        assert_eq!(invested.total_investments, dec!(1000));
        assert_eq!(invested.locked_amount, dec!(1000));
        assert_eq!(invested.withdrawable(), dec!(0));

        let released = invested
            .apply(TransactionType::Release, dec!(1000), true)
            .unwrap();
        assert_eq!(released.locked_amount, dec!(0));
        assert_eq!(released.withdrawable(), dec!(1000));
    }

    #[test]
    fn test_withdrawal_target_depends_on_holding() {
        let start = Balances {
            total_investments: dec!(500),
            earnings_received: dec!(40),
            ..Balances::default()
        };

        let earnings_out = start
            .apply(TransactionType::Withdrawal, dec!(40), false)
            .unwrap();
        assert_eq!(earnings_out.earnings_received, dec!(0));
        assert_eq!(earnings_out.total_investments, dec!(500));

        let principal_out = start
            .apply(TransactionType::Withdrawal, dec!(500), true)
            .unwrap();
        assert_eq!(principal_out.total_investments, dec!(0));
        assert_eq!(principal_out.earnings_received, dec!(40));
    }

    #[test]
    fn test_apply_rejects_negative_fields() {
        let start = Balances {
            earnings_received: dec!(10),
            ..Balances::default()
        };
        let result = start.apply(TransactionType::Withdrawal, dec!(10.01), false);
        assert!(matches!(
            result,
            Err(Error::InsufficientFunds {
                field: "earnings_received",
                ..
            })
        ));

        let result = Balances::default().apply(TransactionType::Debit, dec!(1), false);
        assert!(matches!(
            result,
            Err(Error::InsufficientFunds { field: "balance", .. })
        ));
    }

    #[test]
    fn test_cannot_withdraw_locked_principal() {
        let locked = Balances {
            total_investments: dec!(100),
            locked_amount: dec!(100),
            ..Balances::default()
        };
        let result = locked.apply(TransactionType::Withdrawal, dec!(100), true);
        assert!(matches!(result, Err(Error::InsufficientFunds { .. })));
    }

    #[tokio::test]
    async fn test_balance_of_unknown_user_is_zero() -> Result<()> {
        let db = setup_test_db().await?;
        let wallet = balance(&db, "nobody").await?;
        assert_eq!(wallet.balance, dec!(0));
        assert_eq!(wallet.version, 0);
        assert!(Wallet::find_by_id("nobody".to_string()).one(&db).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_post_appends_and_applies() -> Result<()> {
        let db = setup_test_db().await?;

        let posted = post(
            &db,
            NewTransaction::completed("alice", TransactionType::Earning, dec!(250), "Payout"),
        )
        .await?;
        assert_eq!(posted.transaction.status, "completed");
        assert!(posted.transaction.settled_at.is_some());
        assert_eq!(posted.wallet.earnings_received, dec!(250));
        assert_eq!(posted.wallet.withdrawable_balance, dec!(250));
        assert_eq!(posted.wallet.version, 1);

        let stored = balance(&db, "alice").await?;
        assert_eq!(stored.earnings_received, dec!(250));
        assert_eq!(stored.version, 1);
        assert!(verify(&db, "alice").await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_post_rejects_non_positive_amount() -> Result<()> {
        let db = setup_test_db().await?;
        let result = post(
            &db,
            NewTransaction::completed("alice", TransactionType::Credit, dec!(0), "nothing"),
        )
        .await;
        assert!(matches!(result, Err(Error::InvalidAmount { .. })));
        assert!(transactions_for_user(&db, "alice").await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_debit_leaves_no_trace() -> Result<()> {
        let db = setup_test_db().await?;
        credit_wallet(&db, "alice", dec!(100)).await?;

        let result = post(
            &db,
            NewTransaction::completed("alice", TransactionType::Debit, dec!(150), "Too much"),
        )
        .await;
        assert!(matches!(result, Err(Error::InsufficientFunds { .. })));

        // Neither the entry nor the wallet change survived.
        assert_eq!(transactions_for_user(&db, "alice").await?.len(), 1);
        assert_eq!(balance(&db, "alice").await?.balance, dec!(100));
        Ok(())
    }

    #[tokio::test]
    async fn test_pending_entry_applies_on_settle() -> Result<()> {
        let db = setup_test_db().await?;
        credit_wallet(&db, "alice", dec!(100)).await?;

        let pending = post(
            &db,
            NewTransaction::completed("alice", TransactionType::Debit, dec!(60), "Payout")
                .pending(),
        )
        .await?;
        assert_eq!(pending.wallet.balance, dec!(100));
        assert!(pending.transaction.settled_at.is_none());

        let settled = settle(&db, pending.transaction.id, TransactionStatus::Completed).await?;
        assert_eq!(settled.transaction.status, "completed");
        assert_eq!(settled.wallet.balance, dec!(40));

        // Terminal entries never change again.
        let again = settle(&db, pending.transaction.id, TransactionStatus::Failed).await;
        assert!(matches!(again, Err(Error::AlreadyProcessed { .. })));
        assert!(verify(&db, "alice").await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_settlement_has_no_effect() -> Result<()> {
        let db = setup_test_db().await?;
        credit_wallet(&db, "alice", dec!(100)).await?;

        let pending = post(
            &db,
            NewTransaction::completed("alice", TransactionType::Debit, dec!(60), "Payout")
                .pending(),
        )
        .await?;
        let failed = settle(&db, pending.transaction.id, TransactionStatus::Failed).await?;
        assert_eq!(failed.transaction.status, "failed");
        assert_eq!(failed.wallet.balance, dec!(100));
        Ok(())
    }

    #[tokio::test]
    async fn test_settle_to_pending_is_rejected() -> Result<()> {
        let db = setup_test_db().await?;
        let result = settle(&db, 1, TransactionStatus::Pending).await;
        assert!(matches!(result, Err(Error::Validation { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_stale_version_is_a_conflict() -> Result<()> {
        let db = setup_test_db().await?;
        credit_wallet(&db, "alice", dec!(100)).await?;
        let stale = balance(&db, "alice").await?;
        credit_wallet(&db, "alice", dec!(5)).await?;
        let entries_before = transactions_for_user(&db, "alice").await?.len();

        let next = Balances::from(&stale).apply(TransactionType::Debit, dec!(100), false)?;
        let txn = db.begin().await?;
        let result = write_balances(&txn, &stale, next).await;
        assert!(matches!(result, Err(Error::Conflict { .. })));
        drop(txn);

        let wallet = balance(&db, "alice").await?;
        assert_eq!(wallet.balance, dec!(105));
        assert_eq!(wallet.version, stale.version + 1);
        assert_eq!(transactions_for_user(&db, "alice").await?.len(), entries_before);
        assert!(verify(&db, "alice").await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_duplicate_payment_id_is_already_processed() -> Result<()> {
        let db = setup_test_db().await?;
        let entry = NewTransaction::completed("alice", TransactionType::Credit, dec!(10), "x")
            .with_payment(Some("pay_1".to_string()));
        post(&db, entry.clone()).await?;

        let result = post(&db, entry).await;
        assert!(matches!(result, Err(Error::AlreadyProcessed { .. })));
        assert_eq!(balance(&db, "alice").await?.balance, dec!(10));
        Ok(())
    }

    #[tokio::test]
    async fn test_replay_matches_stored_wallet() -> Result<()> {
        let db = setup_test_db().await?;
        post_with_retry(
            &db,
            NewTransaction::completed("bob", TransactionType::Investment, dec!(1000), "Buy")
                .with_holding(1),
        )
        .await?;
        post_with_retry(
            &db,
            NewTransaction::completed("bob", TransactionType::Release, dec!(1000), "Matured")
                .with_holding(1),
        )
        .await?;
        post_with_retry(
            &db,
            NewTransaction::completed("bob", TransactionType::Earning, dec!(15), "Payout")
                .with_holding(1),
        )
        .await?;

        let replayed = replay(&db, "bob").await?;
        assert_eq!(replayed.total_investments, dec!(1000));
        assert_eq!(replayed.locked_amount, dec!(0));
        assert_eq!(replayed.earnings_received, dec!(15));
        assert_eq!(replayed.withdrawable(), dec!(1015));
        assert!(verify(&db, "bob").await?);
        Ok(())
    }
}
