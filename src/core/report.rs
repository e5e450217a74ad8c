//! Report generation business logic.
//!
//! Builds the investor's portfolio view: the wallet snapshot plus one entry per holding with
//! its computed label and eligibility flags. All functions return structured data or plain
//! text that the bot layer can send as is.

use crate::{
    core::{
        holding::{self, HoldingLabel},
        property::get_property,
        wallet,
    },
    entities::{holding as holding_entity, transaction, wallet as wallet_entity},
    errors::Result,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;

/// One holding as the investor sees it at a point in time.
#[derive(Debug, Clone)]
pub struct HoldingView {
    /// The stored holding
    pub holding: holding_entity::Model,
    /// Property display name
    pub property_name: String,
    /// Locked, Matured or Withdrawn
    pub label: HoldingLabel,
    /// Principal can be withdrawn now
    pub can_withdraw_investment: bool,
    /// Earnings have been received on this holding
    pub can_withdraw_earnings: bool,
    /// When the next payout falls due, if any
    pub next_payout_date: Option<DateTime<Utc>>,
    /// Share of the lock-in already elapsed (0-100)
    pub lock_in_progress: f64,
}

/// Everything the portfolio command shows.
#[derive(Debug, Clone)]
pub struct PortfolioSummary {
    /// Investor
    pub user_id: String,
    /// Wallet snapshot
    pub wallet: wallet_entity::Model,
    /// Holdings, oldest first
    pub holdings: Vec<HoldingView>,
    /// Principal in open holdings
    pub active_principal: Decimal,
    /// Sum of monthly earnings of open holdings
    pub monthly_income: Decimal,
}

/// Builds the portfolio summary for `user_id` at `now`.
pub async fn portfolio_summary(
    db: &DatabaseConnection,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<PortfolioSummary> {
    let wallet = wallet::balance(db, user_id).await?;
    let holdings = holding::holdings_for_user(db, user_id).await?;

    let mut views = Vec::with_capacity(holdings.len());
    let mut active_principal = Decimal::ZERO;
    let mut monthly_income = Decimal::ZERO;

    for holding in holdings {
        let label = holding::label(&holding, now);
        if label != HoldingLabel::Withdrawn {
            active_principal += holding.amount_invested;
            monthly_income += holding.monthly_earning;
        }

        let property_name = get_property(db, holding.property_id)
            .await?
            .map_or_else(|| format!("Property {}", holding.property_id), |p| p.name);

        views.push(HoldingView {
            property_name,
            label,
            can_withdraw_investment: holding::can_withdraw_investment(&holding, now),
            can_withdraw_earnings: holding::can_withdraw_earnings(&holding),
            next_payout_date: next_payout_date(&holding, now),
            lock_in_progress: lock_in_progress(&holding, now),
            holding,
        });
    }

    Ok(PortfolioSummary {
        user_id: user_id.to_string(),
        wallet,
        holdings: views,
        active_principal,
        monthly_income,
    })
}

/// First payout date strictly after `now`, or `None` for closed holdings.
#[must_use]
pub fn next_payout_date(
    holding: &holding_entity::Model,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    if holding::label(holding, now) == HoldingLabel::Withdrawn {
        return None;
    }

    let first = holding::first_payout_date(holding).ok()?;
    let mut months = 0;
    let mut next = first;
    while next <= now {
        months += 1;
        next = holding::add_months(first, months).ok()?;
    }
    Some(next)
}

/// Percentage of the lock-in elapsed at `now`, clamped to 0-100.
#[must_use]
pub fn lock_in_progress(holding: &holding_entity::Model, now: DateTime<Utc>) -> f64 {
    let total = (holding.maturity_date - holding.purchase_date).num_seconds();
    if total <= 0 {
        return 100.0;
    }
    let elapsed = (now - holding.purchase_date).num_seconds().clamp(0, total);

    // Cast safety: both values are seconds within a lock-in, far below 2^52.
    #[allow(clippy::cast_precision_loss)]
    let progress = elapsed as f64 / total as f64 * 100.0;
    progress
}

/// Generates a progress bar string like `[████████░░] 80.0%`.
#[must_use]
pub fn format_progress_bar(progress_percent: f64, bar_length: Option<usize>) -> String {
    let length = bar_length.unwrap_or(10);
    let clamped_progress = progress_percent.clamp(0.0, 100.0);

    // Cast safety: clamped_progress ∈ [0, 100] and length is small.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    let filled = ((clamped_progress / 100.0) * length as f64).round() as usize;
    let empty = length.saturating_sub(filled);

    format!(
        "[{}{}] {progress_percent:.1}%",
        "█".repeat(filled),
        "░".repeat(empty)
    )
}

/// Formats money with two decimals.
#[must_use]
pub fn format_money(amount: Decimal) -> String {
    format!("{:.2}", amount.round_dp(2))
}

/// Signed amount for a ledger entry: `+` for money arriving, `-` for money leaving.
#[must_use]
pub fn format_transaction_amount(transaction: &transaction::Model) -> String {
    let amount = format_money(transaction.amount);
    match transaction.transaction_type.as_str() {
        "earning" | "credit" => format!("+{amount}"),
        "withdrawal" | "debit" | "transfer_out" => format!("-{amount}"),
        _ => amount,
    }
}

/// One line per ledger entry.
#[must_use]
pub fn format_transaction_summary(transaction: &transaction::Model) -> String {
    format!(
        "#{} | {} | {} | {} | {}",
        transaction.id,
        format_transaction_amount(transaction),
        transaction.transaction_type,
        transaction.status,
        transaction.description
    )
}

/// Renders the portfolio for the bot.
#[must_use]
pub fn format_portfolio_summary(summary: &PortfolioSummary) -> String {
    use std::fmt::Write;

    let wallet = &summary.wallet;
    let mut text = format!("📊 **Portfolio for <@{}>**\n", summary.user_id);
    let _ = writeln!(
        text,
        "Invested: {} | Locked: {} | Earnings: {} | Balance: {}",
        format_money(wallet.total_investments),
        format_money(wallet.locked_amount),
        format_money(wallet.earnings_received),
        format_money(wallet.balance),
    );
    let _ = writeln!(
        text,
        "Withdrawable: **{}** | Monthly income: {}",
        format_money(wallet.withdrawable_balance),
        format_money(summary.monthly_income),
    );

    if summary.holdings.is_empty() {
        text.push_str("\nNo holdings yet.");
        return text;
    }

    text.push('\n');
    for view in &summary.holdings {
        let _ = writeln!(
            text,
            "**#{}** {} - {} - {} @ {}%/month",
            view.holding.id,
            view.property_name,
            view.label,
            format_money(view.holding.amount_invested),
            view.holding.monthly_return_rate.normalize(),
        );
        match view.label {
            HoldingLabel::Locked => {
                let _ = writeln!(
                    text,
                    "  Lock-in {} until {}",
                    format_progress_bar(view.lock_in_progress, None),
                    view.holding.maturity_date.format("%Y-%m-%d"),
                );
            }
            HoldingLabel::Matured => {
                let _ = writeln!(
                    text,
                    "  Earned {} | Principal withdrawable",
                    format_money(view.holding.total_earnings_received),
                );
            }
            HoldingLabel::Withdrawn => {}
        }
        if let Some(next) = view.next_payout_date {
            let _ = writeln!(text, "  Next payout: {}", next.format("%Y-%m-%d"));
        }
    }

    text
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::test_utils::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_format_progress_bar() {
        assert_eq!(format_progress_bar(100.0, Some(10)), "[██████████] 100.0%");
        assert_eq!(format_progress_bar(50.0, Some(10)), "[█████░░░░░] 50.0%");
        assert_eq!(format_progress_bar(0.0, Some(10)), "[░░░░░░░░░░] 0.0%");
    }

    #[test]
    fn test_format_money() {
        assert_eq!(format_money(dec!(2500)), "2500.00");
        assert_eq!(format_money(dec!(0.125)), "0.12");
        assert_eq!(format_money(dec!(1234.5)), "1234.50");
    }

    #[tokio::test]
    async fn test_next_payout_and_progress() -> Result<()> {
        let db = setup_test_db().await?;
        let holding = invest(&db, "alice", dec!(500000), date(2025, 1, 15)).await?;

        assert_eq!(
            next_payout_date(&holding, date(2025, 2, 1)),
            Some(date(2025, 5, 15))
        );
        assert_eq!(
            next_payout_date(&holding, date(2025, 5, 15)),
            Some(date(2025, 6, 15))
        );
        assert_eq!(lock_in_progress(&holding, date(2025, 1, 15)), 0.0);
        assert_eq!(lock_in_progress(&holding, date(2025, 9, 1)), 100.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_portfolio_summary() -> Result<()> {
        let db = setup_test_db().await?;
        invest(&db, "alice", dec!(500000), date(2025, 1, 15)).await?;
        crate::core::payout::generate_monthly_payouts(&db, date(2025, 5, 15)).await?;

        let summary = portfolio_summary(&db, "alice", date(2025, 5, 20)).await?;
        assert_eq!(summary.holdings.len(), 1);
        assert_eq!(summary.active_principal, dec!(500000));
        assert_eq!(summary.monthly_income, dec!(2500));

        let view = &summary.holdings[0];
        assert_eq!(view.label, HoldingLabel::Matured);
        assert!(view.can_withdraw_investment);
        assert!(view.can_withdraw_earnings);
        assert_eq!(view.property_name, "Test Property");

        let text = format_portfolio_summary(&summary);
        assert!(text.contains("Withdrawable: **502500.00**"));
        assert!(text.contains("Matured"));
        assert!(text.contains("Next payout: 2025-06-15"));
        Ok(())
    }
}
