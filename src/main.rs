use holdings_ledger::{
    bot,
    config::{database::init_database, load_app_config},
    core::{gateway::HmacGateway, payout::run_payout_schedule},
    errors::{Error, Result},
};
use dotenvy::dotenv;
use std::{env, sync::Arc};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();

    // 3. Load the application configuration
    let app_config = Arc::new(load_app_config()?);
    info!(admins = app_config.admins.len(), "Configuration loaded");

    // 4. Initialize database
    let database = init_database(&app_config.database.url)
        .await
        .inspect(|_| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to initialize database: {}", e))?;

    // 5. Payout scheduler
    if app_config.payouts.scheduled {
        tokio::spawn(run_payout_schedule(
            database.clone(),
            app_config.payouts.interval(),
        ));
    } else {
        info!("Scheduled payouts disabled; use /run_payouts");
    }

    // 6. Payment gateway is optional; without it only reviewed investments are accepted
    let gateway = match HmacGateway::from_env() {
        Ok(gateway) => Some(Arc::new(gateway)),
        Err(e) => {
            warn!("Payment gateway disabled: {}", e);
            None
        }
    };

    // 7. Run the bot
    // DISCORD_BOT_TOKEN is loaded here, directly before use, not stored in AppConfig
    let token = env::var("DISCORD_BOT_TOKEN")
        .inspect_err(|e| error!("DISCORD_BOT_TOKEN not found: {}", e))
        .map_err(Error::EnvVar)?;

    bot::run_bot(token, app_config, database, gateway).await
}
