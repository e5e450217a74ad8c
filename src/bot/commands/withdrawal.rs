//! Withdrawal Discord commands.
//!
//! Investors request withdrawals of earnings, cash balance, or a matured holding's
//! principal. Admins approve or reject them, one at a time or as a comma-separated batch.

use crate::core::workflow::BulkOutcome;
use std::fmt::Write;

/// Renders a bulk result as one summary line plus one line per failure.
#[must_use]
pub fn format_bulk_outcome(action: &str, outcome: &BulkOutcome) -> String {
    let mut text = format!(
        "✅ {action}: {} succeeded, {} failed",
        outcome.success_count, outcome.failure_count
    );
    for item in outcome.results.iter().filter(|item| !item.success) {
        let _ = write!(
            text,
            "\n❌ #{}: {}",
            item.id,
            item.error.as_deref().unwrap_or("unknown error")
        );
    }
    text
}

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use super::format_bulk_outcome;
    use crate::{
        bot::{BotData, handlers::admin::ensure_admin, parse_amount, parse_id_list},
        core::{
            report::format_money,
            withdrawal::{self, BankDetails, NewWithdrawal, WithdrawalKind},
        },
        entities::withdrawal_request,
        errors::{Error, Result},
    };
    use chrono::Utc;

    fn describe(request: &withdrawal_request::Model) -> String {
        let holding = request
            .holding_id
            .map_or_else(String::new, |id| format!(" (holding #{id})"));
        format!(
            "**#{}** <@{}> - {} {}{} | {}",
            request.id,
            request.user_id,
            format_money(request.amount),
            request.kind,
            holding,
            request.status
        )
    }

    /// Requests a withdrawal to a bank account.
    #[poise::command(slash_command, prefix_command)]
    pub async fn withdraw(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "investment, earnings or balance"] kind: String,
        #[description = "Amount to withdraw"] amount: String,
        #[description = "Account holder name"] account_holder: String,
        #[description = "Account number"] account_number: String,
        #[description = "IFSC code"] ifsc_code: String,
        #[description = "Holding ID (investment withdrawals only)"] holding_id: Option<i64>,
    ) -> Result<()> {
        let Some(kind) = WithdrawalKind::parse(kind.trim()) else {
            ctx.say("❌ Kind must be one of: investment, earnings, balance")
                .await?;
            return Ok(());
        };
        let amount = parse_amount(&amount)?;

        let request = withdrawal::create(
            &ctx.data().database,
            NewWithdrawal {
                user_id: ctx.author().id.to_string(),
                amount,
                kind,
                holding_id,
                bank: BankDetails {
                    account_holder,
                    account_number,
                    ifsc_code,
                },
            },
            Utc::now(),
        )
        .await?;

        ctx.say(format!(
            "✅ Withdrawal of {} ({}) requested (Request ID: {})",
            format_money(request.amount),
            request.kind,
            request.id
        ))
        .await?;
        Ok(())
    }

    /// Lists your withdrawal requests.
    #[poise::command(slash_command, prefix_command)]
    pub async fn my_withdrawals(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let user_id = ctx.author().id.to_string();
        let requests = withdrawal::withdrawals_for_user(&ctx.data().database, &user_id).await?;
        if requests.is_empty() {
            ctx.say("No withdrawal requests yet.").await?;
            return Ok(());
        }

        let lines: Vec<String> = requests.iter().map(describe).collect();
        ctx.say(format!("🏦 **Your withdrawals**\n{}", lines.join("\n")))
            .await?;
        Ok(())
    }

    /// Lists open withdrawal requests (admin only).
    #[poise::command(slash_command, prefix_command)]
    pub async fn pending_withdrawals(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        if !ensure_admin(ctx).await? {
            return Ok(());
        }

        let requests = withdrawal::pending_withdrawals(&ctx.data().database).await?;
        if requests.is_empty() {
            ctx.say("No withdrawals are waiting.").await?;
            return Ok(());
        }

        let lines: Vec<String> = requests.iter().map(describe).collect();
        ctx.say(format!("📥 **Open withdrawals**\n{}", lines.join("\n")))
            .await?;
        Ok(())
    }

    /// Approves one or more withdrawals, e.g. `4,7,9` (admin only).
    #[poise::command(slash_command, prefix_command)]
    pub async fn approve_withdrawals(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Comma-separated request IDs"] ids: String,
    ) -> Result<()> {
        if !ensure_admin(ctx).await? {
            return Ok(());
        }
        let ids = parse_id_list(&ids)?;

        ctx.defer().await?;
        let outcome = withdrawal::bulk_approve(&ctx.data().database, &ids, Utc::now()).await;
        ctx.say(format_bulk_outcome("Approved", &outcome)).await?;
        Ok(())
    }

    /// Rejects one or more withdrawals with a reason (admin only).
    #[poise::command(slash_command, prefix_command)]
    pub async fn reject_withdrawals(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Comma-separated request IDs"] ids: String,
        #[description = "Why the requests are rejected"] reason: String,
    ) -> Result<()> {
        if !ensure_admin(ctx).await? {
            return Ok(());
        }
        let ids = parse_id_list(&ids)?;

        let outcome = withdrawal::bulk_reject(&ctx.data().database, &ids, &reason).await;
        ctx.say(format_bulk_outcome("Rejected", &outcome)).await?;
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
