//! Holding lifecycle - opening positions, maturity, and the derived eligibility flags.
//!
//! A holding is created in `lock-in`, flips to `matured` once `maturity_date` passes, and
//! ends as `withdrawn` when the principal is paid out or the position is sold. The flags
//! shown to investors (`can_withdraw_investment`, `can_withdraw_earnings`, the label) are
//! never stored; they are computed from the row and the current time.
//!
//! Every status flip is an `UPDATE ... WHERE status = <expected>` so a holding matures or
//! closes at most once even when two callers race.

use crate::{
    core::{
        concurrency::retry_on_conflict,
        property::reserve_capacity,
        wallet::{self, NewTransaction, TransactionType},
    },
    entities::{Holding, holding},
    errors::{Error, Result},
};
use chrono::{DateTime, Months, Utc};
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr};
use std::fmt;
use tracing::{debug, info, instrument, warn};

/// Stored status of a holding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldingStatus {
    /// Principal is locked
    LockIn,
    /// Lock-in has ended
    Matured,
    /// Principal paid out or position sold
    Withdrawn,
}

impl HoldingStatus {
    /// Stored string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LockIn => "lock-in",
            Self::Matured => "matured",
            Self::Withdrawn => "withdrawn",
        }
    }

    /// Parses the stored string form.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "lock-in" => Some(Self::LockIn),
            "matured" => Some(Self::Matured),
            "withdrawn" => Some(Self::Withdrawn),
            _ => None,
        }
    }
}

impl fmt::Display for HoldingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Display label for a holding at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldingLabel {
    /// Still inside the lock-in
    Locked,
    /// Lock-in over, principal withdrawable
    Matured,
    /// Closed
    Withdrawn,
}

impl fmt::Display for HoldingLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Locked => "Locked",
            Self::Matured => "Matured",
            Self::Withdrawn => "Withdrawn",
        })
    }
}

/// Calendar-month addition, clamping to the end of shorter months.
///
/// # Errors
/// Returns `Error::TryFromInt` for negative month counts and `Error::InvalidDate` on overflow.
pub fn add_months(date: DateTime<Utc>, months: i32) -> Result<DateTime<Utc>> {
    let months = u32::try_from(months)?;
    date.checked_add_months(Months::new(months))
        .ok_or_else(|| Error::InvalidDate {
            message: format!("{date} + {months} months is out of range"),
        })
}

/// `amount × rate / 100`, unrounded.
#[must_use]
pub fn monthly_earning(amount_invested: Decimal, monthly_return_rate: Decimal) -> Decimal {
    amount_invested * monthly_return_rate / Decimal::ONE_HUNDRED
}

/// The single maturity check: `now >= maturity_date`.
#[must_use]
pub fn is_matured(holding: &holding::Model, now: DateTime<Utc>) -> bool {
    now >= holding.maturity_date
}

fn is_withdrawn(holding: &holding::Model) -> bool {
    holding.status == HoldingStatus::Withdrawn.as_str()
}

/// Date of the first payout: one month after the lock-in ends.
pub fn first_payout_date(holding: &holding::Model) -> Result<DateTime<Utc>> {
    add_months(holding.purchase_date, holding.lock_in_months.saturating_add(1))
}

/// Whether a payout may be generated for the holding at `now`.
///
/// A holding bought with a 3 month lock-in first earns in month 4.
#[must_use]
pub fn eligible_for_payout(holding: &holding::Model, now: DateTime<Utc>) -> bool {
    !is_withdrawn(holding)
        && first_payout_date(holding).is_ok_and(|first_payout| now >= first_payout)
}

/// Whether the principal may be withdrawn at `now`.
#[must_use]
pub fn can_withdraw_investment(holding: &holding::Model, now: DateTime<Utc>) -> bool {
    !is_withdrawn(holding) && is_matured(holding, now)
}

/// Whether the holding has produced earnings that can be withdrawn.
#[must_use]
pub fn can_withdraw_earnings(holding: &holding::Model) -> bool {
    !is_withdrawn(holding) && holding.total_earnings_received > Decimal::ZERO
}

/// Label shown to the investor.
#[must_use]
pub fn label(holding: &holding::Model, now: DateTime<Utc>) -> HoldingLabel {
    if is_withdrawn(holding) {
        HoldingLabel::Withdrawn
    } else if is_matured(holding, now) {
        HoldingLabel::Matured
    } else {
        HoldingLabel::Locked
    }
}

/// Parameters for buying into a property.
#[derive(Debug, Clone)]
pub struct NewHolding {
    /// Investor
    pub user_id: String,
    /// Property to invest in
    pub property_id: i64,
    /// Principal
    pub amount: Decimal,
    /// Gateway payment that funded the purchase
    pub payment_id: Option<String>,
    /// Purchase time
    pub purchased_at: DateTime<Utc>,
}

/// A position to insert, with rate and dates already fixed.
#[derive(Debug, Clone)]
pub(crate) struct Position {
    pub user_id: String,
    pub property_id: i64,
    pub amount: Decimal,
    pub purchase_date: DateTime<Utc>,
    pub maturity_date: DateTime<Utc>,
    pub lock_in_months: i32,
    pub monthly_return_rate: Decimal,
    pub transferred_from: Option<i64>,
    pub payment_id: Option<String>,
}

/// Buys into a property: reserves capacity, opens the holding and posts the investment.
///
/// # Errors
/// - `Error::InvalidAmount`, `Error::BelowMinimum`, `Error::PropertyUnavailable` from the
///   property checks
/// - `Error::AlreadyProcessed` if `payment_id` was already used
/// - `Error::Conflict` if the property or wallet changed concurrently on both attempts
#[instrument(skip(db, new), fields(user_id = %new.user_id, property_id = new.property_id, amount = %new.amount))]
pub async fn create(db: &DatabaseConnection, new: NewHolding) -> Result<holding::Model> {
    retry_on_conflict(|| open_holding(db, new.clone())).await
}

/// One attempt at [`create`], inside the caller's transaction if `db` is one.
pub(crate) async fn open_holding<C>(db: &C, new: NewHolding) -> Result<holding::Model>
where
    C: ConnectionTrait + TransactionTrait,
{
    let txn = db.begin().await?;

    let property = reserve_capacity(&txn, new.property_id, new.amount).await?;
    let position = Position {
        user_id: new.user_id,
        property_id: property.id,
        amount: new.amount,
        purchase_date: new.purchased_at,
        maturity_date: add_months(new.purchased_at, property.lock_in_months)?,
        lock_in_months: property.lock_in_months,
        monthly_return_rate: property.monthly_return_rate,
        transferred_from: None,
        payment_id: new.payment_id,
    };
    let holding = open_position(&txn, position, new.purchased_at).await?;

    txn.commit().await?;
    info!(holding_id = holding.id, "Opened holding");
    Ok(holding)
}

/// Inserts a holding in `lock-in`, posts its investment entry and, if the maturity date has
/// already passed at `now`, matures it straight away.
pub(crate) async fn open_position<C>(
    db: &C,
    position: Position,
    now: DateTime<Utc>,
) -> Result<holding::Model>
where
    C: ConnectionTrait + TransactionTrait,
{
    let model = holding::ActiveModel {
        user_id: Set(position.user_id.clone()),
        property_id: Set(position.property_id),
        amount_invested: Set(position.amount),
        purchase_date: Set(position.purchase_date),
        maturity_date: Set(position.maturity_date),
        lock_in_months: Set(position.lock_in_months),
        monthly_return_rate: Set(position.monthly_return_rate),
        monthly_earning: Set(monthly_earning(
            position.amount,
            position.monthly_return_rate,
        )),
        total_earnings_received: Set(Decimal::ZERO),
        status: Set(HoldingStatus::LockIn.as_str().to_string()),
        transferred_from: Set(position.transferred_from),
        closed_at: Set(None),
        ..Default::default()
    }
    .insert(db)
    .await?;

    let description = match position.transferred_from {
        Some(previous) => format!("Acquired holding {previous} by resale"),
        None => format!("Investment in property {}", position.property_id),
    };
    wallet::post(
        db,
        NewTransaction::completed(
            position.user_id,
            TransactionType::Investment,
            position.amount,
            description,
        )
        .with_holding(model.id)
        .with_property(position.property_id)
        .with_payment(position.payment_id),
    )
    .await?;

    if is_matured(&model, now) {
        mature_row(db, &model).await?;
        return Ok(holding::Model {
            status: HoldingStatus::Matured.as_str().to_string(),
            ..model
        });
    }

    Ok(model)
}

/// Flips one lock-in row to matured and releases its principal. Returns false if another
/// caller already did.
async fn mature_row<C>(db: &C, holding: &holding::Model) -> Result<bool>
where
    C: ConnectionTrait + TransactionTrait,
{
    let result = Holding::update_many()
        .col_expr(
            holding::Column::Status,
            Expr::value(HoldingStatus::Matured.as_str()),
        )
        .filter(holding::Column::Id.eq(holding.id))
        .filter(holding::Column::Status.eq(HoldingStatus::LockIn.as_str()))
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        return Ok(false);
    }

    wallet::post(
        db,
        NewTransaction::completed(
            holding.user_id.clone(),
            TransactionType::Release,
            holding.amount_invested,
            format!("Lock-in ended for holding {}", holding.id),
        )
        .with_holding(holding.id)
        .with_property(holding.property_id),
    )
    .await?;

    debug!(holding_id = holding.id, "Holding matured");
    Ok(true)
}

/// Matures one holding if its lock-in has ended at `now`.
///
/// Returns `true` only for the call that performed the flip.
pub async fn mature_holding<C>(db: &C, holding_id: i64, now: DateTime<Utc>) -> Result<bool>
where
    C: ConnectionTrait + TransactionTrait,
{
    let txn = db.begin().await?;
    let holding = require_holding(&txn, holding_id).await?;
    if holding.status != HoldingStatus::LockIn.as_str() || !is_matured(&holding, now) {
        return Ok(false);
    }

    let flipped = mature_row(&txn, &holding).await?;
    txn.commit().await?;
    Ok(flipped)
}

/// Matures every lock-in holding whose maturity date has passed. Per-holding failures are
/// logged and skipped. Returns how many holdings were matured.
#[instrument(skip(db))]
pub async fn sync_maturity(db: &DatabaseConnection, now: DateTime<Utc>) -> Result<usize> {
    let due: Vec<holding::Model> = Holding::find()
        .filter(holding::Column::Status.eq(HoldingStatus::LockIn.as_str()))
        .order_by_asc(holding::Column::Id)
        .all(db)
        .await?
        .into_iter()
        .filter(|h| is_matured(h, now))
        .collect();

    let mut matured = 0;
    for holding in due {
        match retry_on_conflict(|| mature_holding(db, holding.id, now)).await {
            Ok(true) => matured += 1,
            Ok(false) => {}
            Err(e) => warn!(holding_id = holding.id, error = %e, "Failed to mature holding"),
        }
    }

    if matured > 0 {
        info!(matured, "Maturity sync complete");
    }
    Ok(matured)
}

/// Closes a holding. Fails with `HoldingWithdrawn` if it was already closed.
pub(crate) async fn mark_withdrawn<C>(db: &C, holding_id: i64, now: DateTime<Utc>) -> Result<()>
where
    C: ConnectionTrait,
{
    let result = Holding::update_many()
        .col_expr(
            holding::Column::Status,
            Expr::value(HoldingStatus::Withdrawn.as_str()),
        )
        .col_expr(holding::Column::ClosedAt, Expr::value(Some(now)))
        .filter(holding::Column::Id.eq(holding_id))
        .filter(holding::Column::Status.ne(HoldingStatus::Withdrawn.as_str()))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(Error::HoldingWithdrawn { holding_id });
    }
    Ok(())
}

/// Adds a posted payout to the holding's running earnings total.
pub(crate) async fn add_earnings<C>(db: &C, holding_id: i64, amount: Decimal) -> Result<()>
where
    C: ConnectionTrait,
{
    Holding::update_many()
        .col_expr(
            holding::Column::TotalEarningsReceived,
            Expr::col(holding::Column::TotalEarningsReceived).add(amount),
        )
        .filter(holding::Column::Id.eq(holding_id))
        .exec(db)
        .await?;
    Ok(())
}

/// Finds a holding by id.
pub async fn get_holding<C>(db: &C, holding_id: i64) -> Result<Option<holding::Model>>
where
    C: ConnectionTrait,
{
    Holding::find_by_id(holding_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds a holding by id or fails with `NotFound`.
pub(crate) async fn require_holding<C>(db: &C, holding_id: i64) -> Result<holding::Model>
where
    C: ConnectionTrait,
{
    get_holding(db, holding_id)
        .await?
        .ok_or_else(|| Error::not_found("holding", holding_id))
}

/// All holdings owned by a user, oldest first.
pub async fn holdings_for_user<C>(db: &C, user_id: &str) -> Result<Vec<holding::Model>>
where
    C: ConnectionTrait,
{
    Holding::find()
        .filter(holding::Column::UserId.eq(user_id))
        .order_by_asc(holding::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::{core::property::get_property, test_utils::*};
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[rstest]
    #[case(dec!(500000), dec!(0.5), dec!(2500))]
    #[case(dec!(100000), dec!(1.25), dec!(1250))]
    #[case(dec!(150000), dec!(0), dec!(0))]
    fn test_monthly_earning(#[case] amount: Decimal, #[case] rate: Decimal, #[case] expected: Decimal) {
        assert_eq!(monthly_earning(amount, rate), expected);
    }

    #[test]
    fn test_add_months_clamps_to_month_end() {
        let jan_31 = date(2025, 1, 31);
        assert_eq!(add_months(jan_31, 1).unwrap(), date(2025, 2, 28));
        assert_eq!(add_months(jan_31, 0).unwrap(), jan_31);
        assert!(add_months(jan_31, -1).is_err());
    }

    #[tokio::test]
    async fn test_create_holding_snapshots_property() -> Result<()> {
        let db = setup_test_db().await?;
        let property = create_test_property(&db, "Harbour View").await?;
        let purchased = date(2025, 1, 15);

        let holding = create(
            &db,
            NewHolding {
                user_id: "alice".to_string(),
                property_id: property.id,
                amount: dec!(500000),
                payment_id: None,
                purchased_at: purchased,
            },
        )
        .await?;

        assert_eq!(holding.status, "lock-in");
        assert_eq!(holding.lock_in_months, 3);
        assert_eq!(holding.monthly_earning, dec!(2500));
        assert_eq!(holding.maturity_date, date(2025, 4, 15));

        let property = get_property(&db, property.id).await?.unwrap();
        assert_eq!(property.total_invested, dec!(500000));
        assert_eq!(property.investor_count, 1);

        let wallet = wallet::balance(&db, "alice").await?;
        assert_eq!(wallet.total_investments, dec!(500000));
        assert_eq!(wallet.locked_amount, dec!(500000));
        assert_eq!(wallet.withdrawable_balance, dec!(0));
        Ok(())
    }

    #[tokio::test]
    async fn test_create_rejects_below_minimum_without_side_effects() -> Result<()> {
        let db = setup_test_db().await?;
        let property = create_test_property(&db, "Harbour View").await?;

        let result = create(
            &db,
            NewHolding {
                user_id: "alice".to_string(),
                property_id: property.id,
                amount: dec!(50000),
                payment_id: None,
                purchased_at: date(2025, 1, 15),
            },
        )
        .await;
        assert!(matches!(result, Err(Error::BelowMinimum { .. })));
        assert!(holdings_for_user(&db, "alice").await?.is_empty());
        assert_eq!(
            get_property(&db, property.id).await?.unwrap().investor_count,
            0
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_create_rejects_missing_property() -> Result<()> {
        let db = setup_test_db().await?;
        let result = create(
            &db,
            NewHolding {
                user_id: "alice".to_string(),
                property_id: 42,
                amount: dec!(500000),
                payment_id: None,
                purchased_at: date(2025, 1, 15),
            },
        )
        .await;
        assert!(matches!(result, Err(Error::PropertyUnavailable { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_payout_eligibility_starts_after_lock_in_month() -> Result<()> {
        let db = setup_test_db().await?;
        let holding = invest(&db, "alice", dec!(500000), date(2025, 1, 15)).await?;

        // Month 3 ends the lock-in; the first payout falls in month 4.
        assert!(!eligible_for_payout(&holding, date(2025, 4, 15)));
        assert!(is_matured(&holding, date(2025, 4, 15)));
        assert!(eligible_for_payout(&holding, date(2025, 5, 15)));
        assert_eq!(first_payout_date(&holding)?, date(2025, 5, 15));
        Ok(())
    }

    #[tokio::test]
    async fn test_derived_flags_and_labels() -> Result<()> {
        let db = setup_test_db().await?;
        let holding = invest(&db, "alice", dec!(500000), date(2025, 1, 15)).await?;

        assert_eq!(label(&holding, date(2025, 2, 1)), HoldingLabel::Locked);
        assert!(!can_withdraw_investment(&holding, date(2025, 2, 1)));
        assert!(!can_withdraw_earnings(&holding));

        assert_eq!(label(&holding, date(2025, 4, 15)), HoldingLabel::Matured);
        assert!(can_withdraw_investment(&holding, date(2025, 4, 15)));

        let withdrawn = holding::Model {
            status: "withdrawn".to_string(),
            total_earnings_received: dec!(2500),
            ..holding
        };
        assert_eq!(label(&withdrawn, date(2025, 6, 1)), HoldingLabel::Withdrawn);
        assert!(!can_withdraw_investment(&withdrawn, date(2025, 6, 1)));
        assert!(!can_withdraw_earnings(&withdrawn));
        assert!(!eligible_for_payout(&withdrawn, date(2025, 6, 1)));
        Ok(())
    }

    #[tokio::test]
    async fn test_sync_maturity_releases_once() -> Result<()> {
        let db = setup_test_db().await?;
        let early = invest(&db, "alice", dec!(500000), date(2025, 1, 15)).await?;
        let late = invest(&db, "alice", dec!(200000), date(2025, 3, 1)).await?;

        let matured = sync_maturity(&db, date(2025, 5, 1)).await?;
        assert_eq!(matured, 1);
        assert_eq!(sync_maturity(&db, date(2025, 5, 1)).await?, 0);

        assert_eq!(require_holding(&db, early.id).await?.status, "matured");
        assert_eq!(require_holding(&db, late.id).await?.status, "lock-in");

        // Locked amount equals the principal of the holdings still in lock-in.
        let wallet = wallet::balance(&db, "alice").await?;
        assert_eq!(wallet.locked_amount, dec!(200000));
        assert_eq!(wallet.withdrawable_balance, dec!(500000));
        assert!(wallet::verify(&db, "alice").await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_mature_holding_before_maturity_is_noop() -> Result<()> {
        let db = setup_test_db().await?;
        let holding = invest(&db, "alice", dec!(500000), date(2025, 1, 15)).await?;
        assert!(!mature_holding(&db, holding.id, date(2025, 3, 1)).await?);
        assert!(mature_holding(&db, holding.id, date(2025, 4, 15)).await?);
        assert!(!mature_holding(&db, holding.id, date(2025, 4, 16)).await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_mark_withdrawn_only_once() -> Result<()> {
        let db = setup_test_db().await?;
        let holding = invest(&db, "alice", dec!(500000), date(2025, 1, 15)).await?;
        mark_withdrawn(&db, holding.id, date(2025, 6, 1)).await?;

        let closed = require_holding(&db, holding.id).await?;
        assert_eq!(closed.status, "withdrawn");
        assert!(closed.closed_at.is_some());

        let again = mark_withdrawn(&db, holding.id, date(2025, 6, 2)).await;
        assert!(matches!(again, Err(Error::HoldingWithdrawn { .. })));
        Ok(())
    }
}
