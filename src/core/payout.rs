//! Monthly payout generation.
//!
//! A payout run first matures any holdings whose lock-in has ended, then credits one month
//! of earnings to every holding eligible at `now`. Each holding is paid in its own database
//! transaction: the earning entry, the `payouts` row and the holding's running total commit
//! together or not at all.
//!
//! The `payouts` table has a UNIQUE `(holding_id, period)` index, so a second run for the same
//! month (or two schedulers racing) cannot pay a holding twice. A holding acquired by resale
//! also skips a month already paid to the holding it replaced.

use crate::{
    core::{
        concurrency::{is_unique_violation, retry_on_conflict},
        holding::{self, HoldingStatus},
        wallet::{self, NewTransaction, TransactionType},
    },
    entities::{Holding, Payout, holding as holding_entity, payout},
    errors::Result,
};
use chrono::{DateTime, Datelike, Utc};
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// Calendar month index used as the payout idempotency key: `year * 12 + month0`.
#[must_use]
#[allow(clippy::cast_possible_wrap)] // month0 is at most 11
pub fn period_index(now: DateTime<Utc>) -> i32 {
    now.year() * 12 + now.month0() as i32
}

/// Renders a period index as `YYYY-MM`.
#[must_use]
pub fn period_label(period: i32) -> String {
    format!("{}-{:02}", period.div_euclid(12), period.rem_euclid(12) + 1)
}

/// A payout created by a run.
#[derive(Debug, Clone)]
pub struct PayoutRecord {
    /// Holding that was paid
    pub holding_id: i64,
    /// Owner credited
    pub user_id: String,
    /// Amount credited
    pub amount: Decimal,
    /// Ledger entry id
    pub transaction_id: i64,
}

/// Outcome of one payout run.
#[derive(Debug, Clone)]
pub struct PayoutRunSummary {
    /// Period the run paid
    pub period: i32,
    /// Holdings matured by the maturity sync at the start of the run
    pub matured: usize,
    /// Payouts created
    pub created: usize,
    /// Eligible holdings already paid for this period
    pub skipped: usize,
    /// Holdings that failed and were left for the next run
    pub failed: usize,
    /// Sum of created payouts
    pub total_paid: Decimal,
    /// Details of each created payout
    pub payouts: Vec<PayoutRecord>,
}

/// Pays one holding for `period`. Returns `None` if the period was already paid, or if the
/// holding was closed or changed hands after `listed` was read.
async fn pay_holding(
    db: &DatabaseConnection,
    listed: &holding_entity::Model,
    period: i32,
    now: DateTime<Utc>,
) -> Result<Option<PayoutRecord>> {
    let txn = db.begin().await?;

    let holding = holding::require_holding(&txn, listed.id).await?;
    if holding.status == HoldingStatus::Withdrawn.as_str() || holding.user_id != listed.user_id {
        debug!(holding_id = holding.id, "Holding closed since the run started");
        return Ok(None);
    }

    if already_paid(&txn, holding.id, period).await? {
        return Ok(None);
    }
    if let Some(predecessor) = paid_predecessor(&txn, &holding, period).await? {
        debug!(holding_id = holding.id, predecessor, "Period already paid before resale");
        return Ok(None);
    }

    let posted = wallet::post(
        &txn,
        NewTransaction::completed(
            holding.user_id.clone(),
            TransactionType::Earning,
            holding.monthly_earning,
            format!("Payout {} for holding {}", period_label(period), holding.id),
        )
        .with_holding(holding.id)
        .with_property(holding.property_id),
    )
    .await?;

    let row = payout::ActiveModel {
        holding_id: Set(holding.id),
        period: Set(period),
        transaction_id: Set(posted.transaction.id),
        amount: Set(holding.monthly_earning),
        created_at: Set(now),
        ..Default::default()
    };
    match row.insert(&txn).await {
        Ok(_) => {}
        // Another run paid this period first; dropping `txn` rolls the earning back.
        Err(e) if is_unique_violation(&e) => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    holding::add_earnings(&txn, holding.id, holding.monthly_earning).await?;
    txn.commit().await?;

    Ok(Some(PayoutRecord {
        holding_id: holding.id,
        user_id: holding.user_id.clone(),
        amount: holding.monthly_earning,
        transaction_id: posted.transaction.id,
    }))
}

async fn already_paid<C>(db: &C, holding_id: i64, period: i32) -> Result<bool>
where
    C: ConnectionTrait,
{
    Ok(Payout::find()
        .filter(payout::Column::HoldingId.eq(holding_id))
        .filter(payout::Column::Period.eq(period))
        .one(db)
        .await?
        .is_some())
}

/// Walks the resale chain back from `holding` and returns the first earlier holding that
/// was already paid for `period`.
async fn paid_predecessor<C>(
    db: &C,
    holding: &holding_entity::Model,
    period: i32,
) -> Result<Option<i64>>
where
    C: ConnectionTrait,
{
    let mut previous = holding.transferred_from;
    while let Some(id) = previous {
        if already_paid(db, id, period).await? {
            return Ok(Some(id));
        }
        // A resale always points at an older row, so the walk ends at the first purchase.
        previous = holding::require_holding(db, id).await?.transferred_from;
    }
    Ok(None)
}

/// Generates this month's payouts for every eligible holding.
///
/// Safe to run any number of times per month. Failures on individual holdings are logged
/// and counted in `failed`; they never abort the run.
#[instrument(skip(db))]
pub async fn generate_monthly_payouts(
    db: &DatabaseConnection,
    now: DateTime<Utc>,
) -> Result<PayoutRunSummary> {
    let matured = holding::sync_maturity(db, now).await?;
    let period = period_index(now);

    let candidates = Holding::find()
        .filter(holding_entity::Column::Status.ne(HoldingStatus::Withdrawn.as_str()))
        .order_by_asc(holding_entity::Column::Id)
        .all(db)
        .await?;

    let mut summary = PayoutRunSummary {
        period,
        matured,
        created: 0,
        skipped: 0,
        failed: 0,
        total_paid: Decimal::ZERO,
        payouts: Vec::new(),
    };

    for candidate in candidates
        .iter()
        .filter(|h| holding::eligible_for_payout(h, now))
    {
        if candidate.monthly_earning <= Decimal::ZERO {
            summary.skipped += 1;
            continue;
        }

        match retry_on_conflict(|| pay_holding(db, candidate, period, now)).await {
            Ok(Some(record)) => {
                summary.created += 1;
                summary.total_paid += record.amount;
                summary.payouts.push(record);
            }
            Ok(None) => summary.skipped += 1,
            Err(e) => {
                summary.failed += 1;
                warn!(holding_id = candidate.id, error = %e, "Payout failed");
            }
        }
    }

    info!(
        period = %period_label(period),
        created = summary.created,
        skipped = summary.skipped,
        failed = summary.failed,
        "Payout run complete"
    );
    Ok(summary)
}

/// Payout rows for one holding, oldest period first.
pub async fn payouts_for_holding(
    db: &DatabaseConnection,
    holding_id: i64,
) -> Result<Vec<payout::Model>> {
    Payout::find()
        .filter(payout::Column::HoldingId.eq(holding_id))
        .order_by_asc(payout::Column::Period)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Formats a payout run for display.
#[must_use]
pub fn format_payout_summary(summary: &PayoutRunSummary) -> String {
    use std::fmt::Write;

    let mut text = format!(
        "Payout run - {} - {} created, {} skipped, {} failed\n",
        period_label(summary.period),
        summary.created,
        summary.skipped,
        summary.failed
    );
    let _ = writeln!(
        text,
        "  Matured holdings: {} | Total paid: {}",
        summary.matured,
        summary.total_paid.round_dp(2).normalize()
    );

    for record in &summary.payouts {
        let _ = writeln!(
            text,
            "  Holding {} ({}) +{}",
            record.holding_id,
            record.user_id,
            record.amount.round_dp(2).normalize()
        );
    }

    text
}

/// Runs [`generate_monthly_payouts`] every `interval` until the task is dropped.
pub async fn run_payout_schedule(db: DatabaseConnection, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        match generate_monthly_payouts(&db, Utc::now()).await {
            Ok(summary) => debug!(created = summary.created, "Scheduled payout run finished"),
            Err(e) => error!(error = %e, "Scheduled payout run failed"),
        }
    }
}
