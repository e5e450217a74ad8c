//! General Discord commands - ping, help, and other utility commands.
//! This module contains simple commands that don't require database operations
//! and provide basic bot functionality and user assistance.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::BotData,
        errors::{Error, Result},
    };

    /// Responds with "Pong!" to test bot connectivity.
    ///
    /// This is a simple health check command that doesn't require any database operations.
    #[poise::command(slash_command, prefix_command)]
    pub async fn ping(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        ctx.say("Pong!").await?;
        Ok(())
    }

    /// Displays help information about available commands.
    #[poise::command(slash_command, prefix_command)]
    pub async fn help(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let help_text = "**Holdings Ledger Help**\n\
        Here is a summary of all available commands.\n\n\
        **Investing**\n\
        • `/properties` - Lists properties open for investment.\n\
        • `/invest <property> <amount> <months> <proof>` - Submits an investment for review.\n\
        • `/checkout <property> <amount>` - Starts an online payment.\n\
        • `/confirm_payment <order> <payment> <signature>` - Completes an online payment.\n\n\
        **Your Money**\n\
        • `/portfolio` - Shows your wallet and holdings.\n\
        • `/transactions` - Shows your recent ledger entries.\n\
        • `/withdraw <kind> <amount> <holder> <account> <ifsc> [holding]` - Requests a withdrawal.\n\
        • `/my_withdrawals` - Lists your withdrawal requests.\n\n\
        **Resale**\n\
        • `/sell <holding> <buyer> <price>` - Offers a holding to another investor.\n\
        • `/respond_transfer <id> <accept>` - Accepts or declines an offer made to you.\n\
        • `/submit_transfer <id>` / `/cancel_transfer <id>` - Seller actions.\n\
        • `/transfers` - Lists your offers.\n\n\
        **Admin**\n\
        • `/add_property`, `/property_status` - Manage listings.\n\
        • `/investment_requests`, `/approve_investment`, `/reject_investment`\n\
        • `/pending_withdrawals`, `/approve_withdrawals`, `/reject_withdrawals`\n\
        • `/approve_transfer`, `/reject_transfer`, `/complete_transfer`\n\
        • `/run_payouts` - Generates this month's payouts.\n\n\
        **Utility**\n\
        • `/ping` - Checks if the bot is responsive.\n\
        • `/help` - Shows this help message.";

        ctx.say(help_text).await?;
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
