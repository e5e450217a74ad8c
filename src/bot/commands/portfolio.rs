//! Portfolio Discord commands - `portfolio` and `transactions`.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::{BotData, handlers::admin::ensure_admin},
        core::{report, wallet},
        errors::{Error, Result},
    };
    use chrono::Utc;

    /// Shows the wallet and every holding with its status and next payout.
    #[poise::command(slash_command, prefix_command)]
    pub async fn portfolio(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Investor to show (admins only; defaults to you)"] user: Option<String>,
    ) -> Result<()> {
        let author_id = ctx.author().id.to_string();
        let user_id = match user {
            Some(other) if other != author_id => {
                if !ensure_admin(ctx).await? {
                    return Ok(());
                }
                other
            }
            _ => author_id,
        };

        let db = &ctx.data().database;
        let summary = report::portfolio_summary(db, &user_id, Utc::now()).await?;
        ctx.say(report::format_portfolio_summary(&summary)).await?;
        Ok(())
    }

    /// Shows your most recent ledger entries.
    #[poise::command(slash_command, prefix_command)]
    pub async fn transactions(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "How many entries to show (default 10, max 25)"] limit: Option<u32>,
    ) -> Result<()> {
        let limit = limit.unwrap_or(10).clamp(1, 25) as usize;
        let user_id = ctx.author().id.to_string();
        let db = &ctx.data().database;

        let entries = wallet::transactions_for_user(db, &user_id).await?;
        if entries.is_empty() {
            ctx.say("No transactions yet.").await?;
            return Ok(());
        }

        let lines: Vec<String> = entries
            .iter()
            .take(limit)
            .map(report::format_transaction_summary)
            .collect();
        ctx.say(format!("📜 **Recent transactions**\n{}", lines.join("\n")))
            .await?;
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
