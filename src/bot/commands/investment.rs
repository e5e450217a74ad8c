//! Property and investment Discord commands.
//!
//! Investors either file a request with a payment proof for an admin to review
//! (`invest`) or pay through the gateway (`checkout` then `confirm_payment`). Admins list
//! properties and review requests here.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::{BotData, handlers::admin::ensure_admin, handlers::autocomplete, parse_amount},
        core::{
            checkout::{self, CheckoutConfirmation},
            investment::{self, NewInvestmentRequest},
            property::{self, NewProperty, PropertyStatus},
            report::format_money,
        },
        entities::property as property_entity,
        errors::{Error, Result},
    };
    use chrono::Utc;

    async fn find_property(
        ctx: poise::Context<'_, BotData, Error>,
        name: &str,
    ) -> Result<Option<property_entity::Model>> {
        let found = property::get_property_by_name(&ctx.data().database, name).await?;
        if found.is_none() {
            ctx.say(format!(
                "❌ Property '{name}' not found. Use `/properties` to see open properties."
            ))
            .await?;
        }
        Ok(found)
    }

    /// Lists properties currently open for investment.
    #[poise::command(slash_command, prefix_command)]
    pub async fn properties(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let listings = property::get_all_active_properties(&ctx.data().database).await?;
        if listings.is_empty() {
            ctx.say("No properties are open for investment.").await?;
            return Ok(());
        }

        let lines: Vec<String> = listings
            .iter()
            .map(|p| {
                format!(
                    "**{}** (#{}) - min {} | {}%/month | {} months lock-in | {} open",
                    p.name,
                    p.id,
                    format_money(p.min_investment),
                    p.monthly_return_rate.normalize(),
                    p.lock_in_months,
                    format_money(p.available_to_invest),
                )
            })
            .collect();
        ctx.say(format!("🏢 **Open properties**\n{}", lines.join("\n")))
            .await?;
        Ok(())
    }

    /// Lists a new property (admin only).
    #[poise::command(slash_command, prefix_command)]
    pub async fn add_property(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Property name"] name: String,
        #[description = "Minimum investment"] min_investment: String,
        #[description = "Lock-in in months"] lock_in_months: i32,
        #[description = "Monthly return in percent (e.g. 0.5)"] monthly_return_rate: String,
        #[description = "Total amount open to investors"] capacity: String,
    ) -> Result<()> {
        if !ensure_admin(ctx).await? {
            return Ok(());
        }

        let listing = property::create_property(
            &ctx.data().database,
            NewProperty {
                name,
                min_investment: parse_amount(&min_investment)?,
                lock_in_months,
                monthly_return_rate: parse_amount(&monthly_return_rate)?,
                capacity: parse_amount(&capacity)?,
            },
        )
        .await?;

        ctx.say(format!(
            "✅ Listed property '{}' (ID: {})",
            listing.name, listing.id
        ))
        .await?;
        Ok(())
    }

    /// Opens or closes a property to new investment (admin only).
    #[poise::command(slash_command, prefix_command)]
    pub async fn property_status(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Property ID"] property_id: i64,
        #[description = "active, inactive or closed"] status: String,
    ) -> Result<()> {
        if !ensure_admin(ctx).await? {
            return Ok(());
        }
        let Some(status) = PropertyStatus::parse(status.trim()) else {
            ctx.say("❌ Status must be one of: active, inactive, closed")
                .await?;
            return Ok(());
        };

        let updated = property::set_property_status(&ctx.data().database, property_id, status)
            .await?;
        ctx.say(format!(
            "✅ Property '{}' is now {}",
            updated.name, updated.status
        ))
        .await?;
        Ok(())
    }

    /// Submits an investment with a payment proof for admin review.
    #[poise::command(slash_command, prefix_command)]
    pub async fn invest(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Property to invest in"]
        #[autocomplete = "autocomplete::autocomplete_property_name"]
        property_name: String,
        #[description = "Amount paid"] amount: String,
        #[description = "Months you intend to hold"] months: i32,
        #[description = "Payment reference or receipt link"] proof: String,
    ) -> Result<()> {
        let amount = parse_amount(&amount)?;
        let Some(listing) = find_property(ctx, &property_name).await? else {
            return Ok(());
        };

        let request = investment::submit(
            &ctx.data().database,
            NewInvestmentRequest {
                user_id: ctx.author().id.to_string(),
                property_id: listing.id,
                amount,
                time_period: months,
                transaction_proof: proof,
            },
        )
        .await?;

        ctx.say(format!(
            "✅ Investment of {} in '{}' submitted for review (Request ID: {})",
            format_money(amount),
            listing.name,
            request.id
        ))
        .await?;
        Ok(())
    }

    /// Lists investment requests waiting for review (admin only).
    #[poise::command(slash_command, prefix_command)]
    pub async fn investment_requests(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        if !ensure_admin(ctx).await? {
            return Ok(());
        }

        let pending = investment::pending_requests(&ctx.data().database).await?;
        if pending.is_empty() {
            ctx.say("No investment requests are waiting.").await?;
            return Ok(());
        }

        let lines: Vec<String> = pending
            .iter()
            .map(|r| {
                format!(
                    "**#{}** <@{}> - {} in property #{} for {} months | proof: {}",
                    r.id,
                    r.user_id,
                    format_money(r.amount_invested),
                    r.property_id,
                    r.time_period,
                    r.transaction_proof
                )
            })
            .collect();
        ctx.say(format!("📥 **Pending investments**\n{}", lines.join("\n")))
            .await?;
        Ok(())
    }

    /// Approves an investment request and opens the holding (admin only).
    #[poise::command(slash_command, prefix_command)]
    pub async fn approve_investment(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Request ID"] request_id: i64,
        #[description = "Optional notes"] notes: Option<String>,
    ) -> Result<()> {
        if !ensure_admin(ctx).await? {
            return Ok(());
        }

        let approved = investment::approve(
            &ctx.data().database,
            request_id,
            notes.as_deref(),
            Utc::now(),
        )
        .await?;
        let holding = approved
            .holding_id
            .map_or_else(String::new, |id| format!(" - holding #{id} opened"));
        ctx.say(format!("✅ Investment request #{request_id} approved{holding}"))
            .await?;
        Ok(())
    }

    /// Rejects an investment request with a reason (admin only).
    #[poise::command(slash_command, prefix_command)]
    pub async fn reject_investment(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Request ID"] request_id: i64,
        #[description = "Why the request is rejected"] reason: String,
    ) -> Result<()> {
        if !ensure_admin(ctx).await? {
            return Ok(());
        }

        investment::reject(&ctx.data().database, request_id, &reason).await?;
        ctx.say(format!("✅ Investment request #{request_id} rejected"))
            .await?;
        Ok(())
    }

    /// Starts an online payment for an investment.
    #[poise::command(slash_command, prefix_command)]
    pub async fn checkout(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Property to invest in"]
        #[autocomplete = "autocomplete::autocomplete_property_name"]
        property_name: String,
        #[description = "Amount to invest"] amount: String,
    ) -> Result<()> {
        let data = ctx.data();
        let Some(gateway) = data.gateway.as_deref() else {
            ctx.say("❌ Online payments are not configured. Use `/invest` instead.")
                .await?;
            return Ok(());
        };
        let amount = parse_amount(&amount)?;
        let Some(listing) = find_property(ctx, &property_name).await? else {
            return Ok(());
        };

        let order = checkout::start_checkout(
            &data.database,
            gateway,
            &ctx.author().id.to_string(),
            listing.id,
            amount,
            &data.config.gateway.currency,
        )
        .await?;

        ctx.say(format!(
            "💳 Pay {} {} for '{}' using order `{}`, then run `/confirm_payment`.",
            format_money(order.amount),
            order.currency,
            listing.name,
            order.order_id
        ))
        .await?;
        Ok(())
    }

    /// Confirms a gateway payment and opens the holding.
    #[poise::command(slash_command, prefix_command)]
    pub async fn confirm_payment(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Order ID from /checkout"] order_id: String,
        #[description = "Payment ID from the provider"] payment_id: String,
        #[description = "Signature from the provider"] signature: String,
    ) -> Result<()> {
        let data = ctx.data();
        let Some(gateway) = data.gateway.as_deref() else {
            ctx.say("❌ Online payments are not configured.").await?;
            return Ok(());
        };

        let holding = checkout::complete_checkout(
            &data.database,
            gateway,
            CheckoutConfirmation {
                order_id,
                payment_id,
                signature,
            },
            Utc::now(),
        )
        .await?;

        ctx.say(format!(
            "✅ Payment confirmed - holding #{} opened for {}, locked until {}",
            holding.id,
            format_money(holding.amount_invested),
            holding.maturity_date.format("%Y-%m-%d")
        ))
        .await?;
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
