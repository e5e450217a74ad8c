//! Bot layer - Discord-specific interface and command handlers
//!
//! This module provides the Discord interface for the holdings ledger, including all slash
//! commands, autocomplete handlers, and bot context management. Commands parse input,
//! call into [`crate::core`], and format the reply; no ledger rules live here.

/// Discord command implementations (portfolio, investment, withdrawal, transfer, payout)
pub mod commands;
/// Discord interaction handlers (autocomplete, admin checks)
pub mod handlers;

use crate::{
    config::AppConfig,
    core::gateway::HmacGateway,
    errors::{Error, Result},
};
use poise::serenity_prelude as serenity;
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;
use std::{str::FromStr, sync::Arc};
use tracing::{error, info, instrument};

/// Shared data available to all bot commands.
/// This structure holds the database connection and any other global state
/// that commands need to access.
pub struct BotData {
    /// Database connection for all database operations
    pub database: DatabaseConnection,
    /// Loaded settings (admins, currency)
    pub config: Arc<AppConfig>,
    /// Payment gateway, when a signing secret is configured
    pub gateway: Option<Arc<HmacGateway>>,
}

impl BotData {
    /// Creates a new `BotData` instance.
    #[must_use]
    pub const fn new(
        database: DatabaseConnection,
        config: Arc<AppConfig>,
        gateway: Option<Arc<HmacGateway>>,
    ) -> Self {
        Self {
            database,
            config,
            gateway,
        }
    }
}

/// Poise context used by every command.
pub type Context<'a> = poise::Context<'a, BotData, Error>;

/// Parses a user-typed amount such as `"2500"` or `"1,00,000.50"`.
///
/// # Errors
/// Returns `Error::Validation` if the text is not a decimal number.
pub fn parse_amount(raw: &str) -> Result<Decimal> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    Decimal::from_str(&cleaned).map_err(|_| Error::validation(format!("'{raw}' is not an amount")))
}

/// Parses a comma-separated id list like `"4, 7,9"`.
///
/// # Errors
/// Returns `Error::Validation` on the first entry that is not an id, or if the list is empty.
pub fn parse_id_list(raw: &str) -> Result<Vec<i64>> {
    let ids = raw
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<i64>()
                .map_err(|_| Error::validation(format!("'{part}' is not an id")))
        })
        .collect::<Result<Vec<_>>>()?;
    if ids.is_empty() {
        return Err(Error::validation("no ids given"));
    }
    Ok(ids)
}

async fn on_error(error: poise::FrameworkError<'_, BotData, Error>) {
    match error {
        poise::FrameworkError::Setup { error, .. } => {
            error!("Failed to start bot: {:?}", error);
        }
        poise::FrameworkError::Command { error, ctx, .. } => {
            error!("Error in command `{}`: {:?}", ctx.command().name, error);
            if let Err(e) = ctx.say(format!("❌ {error}")).await {
                error!("Failed to send error message: {}", e);
            }
        }
        error => {
            if let Err(e) = poise::builtins::on_error(error).await {
                error!("Error while handling error: {}", e);
            }
        }
    }
}

/// Starts the Discord client and blocks until it stops.
///
/// # Errors
/// Returns `Error::Framework` if the client cannot be built or the connection fails.
#[instrument(skip_all)]
pub async fn run_bot(
    token: String,
    config: Arc<AppConfig>,
    database: DatabaseConnection,
    gateway: Option<Arc<HmacGateway>>,
) -> Result<()> {
    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: commands::all(),
            on_error: |error| Box::pin(on_error(error)),
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                info!("Logged in as {}", ready.user.name);
                info!("Registering commands globally...");
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                Ok(BotData::new(database, config, gateway))
            })
        })
        .build();

    let intents =
        serenity::GatewayIntents::non_privileged() | serenity::GatewayIntents::MESSAGE_CONTENT;

    let mut client = serenity::ClientBuilder::new(token, intents)
        .framework(framework)
        .await?;

    info!("Starting bot...");
    client.start().await?;
    Ok(())
}

pub use commands::*;
pub use handlers::*;

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("2500").unwrap(), dec!(2500));
        assert_eq!(parse_amount(" 1,00,000.50 ").unwrap(), dec!(100000.50));
        assert!(matches!(parse_amount("ten"), Err(Error::Validation { .. })));
    }

    #[test]
    fn test_parse_id_list() {
        assert_eq!(parse_id_list("4, 7,9").unwrap(), vec![4, 7, 9]);
        assert!(parse_id_list(" , ").is_err());
        assert!(parse_id_list("4,x").is_err());
    }
}
