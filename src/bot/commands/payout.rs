//! Payout Discord command - `run_payouts`.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::{BotData, handlers::admin::ensure_admin},
        core::payout,
        errors::{Error, Result},
    };
    use chrono::Utc;

    /// Generates this month's payouts now (admin only).
    ///
    /// Safe to run more than once: holdings already paid for the month are skipped.
    #[poise::command(slash_command, prefix_command)]
    pub async fn run_payouts(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        if !ensure_admin(ctx).await? {
            return Ok(());
        }

        // Acknowledge command quickly
        ctx.defer().await?;

        let summary = payout::generate_monthly_payouts(&ctx.data().database, Utc::now()).await?;
        ctx.say(payout::format_payout_summary(&summary)).await?;
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
