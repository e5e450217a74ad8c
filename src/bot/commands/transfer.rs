//! Resale Discord commands.
//!
//! A seller offers a holding to a named buyer, the buyer answers, the seller submits the
//! accepted offer, and an admin approves it, which moves ownership.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::{BotData, handlers::admin::ensure_admin, parse_amount},
        core::{report::format_money, transfer},
        errors::{Error, Result},
    };
    use chrono::Utc;
    use poise::serenity_prelude as serenity;

    /// Offers one of your holdings to another investor.
    #[poise::command(slash_command, prefix_command)]
    pub async fn sell(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Holding ID to sell"] holding_id: i64,
        #[description = "Buyer"] buyer: serenity::User,
        #[description = "Sale price"] price: String,
    ) -> Result<()> {
        let price = parse_amount(&price)?;
        let offer = transfer::create(
            &ctx.data().database,
            &ctx.author().id.to_string(),
            holding_id,
            &buyer.id.to_string(),
            price,
        )
        .await?;

        ctx.say(format!(
            "✅ Offered holding #{holding_id} to <@{}> for {} (Transfer ID: {}). \
             They can answer with `/respond_transfer`.",
            offer.buyer_id,
            format_money(offer.sale_price),
            offer.id
        ))
        .await?;
        Ok(())
    }

    /// Lists offers where you are the seller or the buyer.
    #[poise::command(slash_command, prefix_command)]
    pub async fn transfers(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let user_id = ctx.author().id.to_string();
        let offers = transfer::transfers_for_user(&ctx.data().database, &user_id).await?;
        if offers.is_empty() {
            ctx.say("No transfers yet.").await?;
            return Ok(());
        }

        let lines: Vec<String> = offers
            .iter()
            .map(|t| {
                format!(
                    "**#{}** holding #{} | <@{}> → <@{}> | {} | {} (buyer: {})",
                    t.id,
                    t.holding_id,
                    t.seller_id,
                    t.buyer_id,
                    format_money(t.sale_price),
                    t.status,
                    t.buyer_response
                )
            })
            .collect();
        ctx.say(format!("🔁 **Your transfers**\n{}", lines.join("\n")))
            .await?;
        Ok(())
    }

    /// Accepts or declines an offer made to you.
    #[poise::command(slash_command, prefix_command)]
    pub async fn respond_transfer(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Transfer ID"] transfer_id: i64,
        #[description = "Accept the offer?"] accept: bool,
    ) -> Result<()> {
        let updated = transfer::respond(
            &ctx.data().database,
            transfer_id,
            &ctx.author().id.to_string(),
            accept,
        )
        .await?;

        let verb = if accept { "accepted" } else { "declined" };
        ctx.say(format!(
            "✅ Transfer #{transfer_id} {verb} - <@{}> has been notified",
            updated.seller_id
        ))
        .await?;
        Ok(())
    }

    /// Sends an accepted offer to the admins for review.
    #[poise::command(slash_command, prefix_command)]
    pub async fn submit_transfer(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Transfer ID"] transfer_id: i64,
    ) -> Result<()> {
        transfer::submit_for_review(
            &ctx.data().database,
            transfer_id,
            &ctx.author().id.to_string(),
        )
        .await?;
        ctx.say(format!("✅ Transfer #{transfer_id} submitted for review"))
            .await?;
        Ok(())
    }

    /// Withdraws an offer that has not been reviewed yet.
    #[poise::command(slash_command, prefix_command)]
    pub async fn cancel_transfer(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Transfer ID"] transfer_id: i64,
    ) -> Result<()> {
        transfer::cancel(
            &ctx.data().database,
            transfer_id,
            &ctx.author().id.to_string(),
        )
        .await?;
        ctx.say(format!("✅ Transfer #{transfer_id} cancelled"))
            .await?;
        Ok(())
    }

    /// Approves a reviewed transfer and moves the holding (admin only).
    #[poise::command(slash_command, prefix_command)]
    pub async fn approve_transfer(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Transfer ID"] transfer_id: i64,
        #[description = "Optional notes"] notes: Option<String>,
    ) -> Result<()> {
        if !ensure_admin(ctx).await? {
            return Ok(());
        }

        let approved = transfer::admin_approve(
            &ctx.data().database,
            transfer_id,
            notes.as_deref(),
            Utc::now(),
        )
        .await?;
        let holding = approved.new_holding_id.map_or_else(String::new, |id| {
            format!(" - <@{}> now owns holding #{id}", approved.buyer_id)
        });
        ctx.say(format!("✅ Transfer #{transfer_id} approved{holding}"))
            .await?;
        Ok(())
    }

    /// Rejects a transfer under review (admin only).
    #[poise::command(slash_command, prefix_command)]
    pub async fn reject_transfer(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Transfer ID"] transfer_id: i64,
        #[description = "Why the transfer is rejected"] reason: String,
    ) -> Result<()> {
        if !ensure_admin(ctx).await? {
            return Ok(());
        }

        transfer::admin_reject(&ctx.data().database, transfer_id, &reason).await?;
        ctx.say(format!("✅ Transfer #{transfer_id} rejected"))
            .await?;
        Ok(())
    }

    /// Closes an approved transfer once settlement is done (admin only).
    #[poise::command(slash_command, prefix_command)]
    pub async fn complete_transfer(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Transfer ID"] transfer_id: i64,
    ) -> Result<()> {
        if !ensure_admin(ctx).await? {
            return Ok(());
        }

        transfer::complete(&ctx.data().database, transfer_id).await?;
        ctx.say(format!("✅ Transfer #{transfer_id} completed"))
            .await?;
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
