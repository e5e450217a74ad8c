//! Application settings loading from config.toml
//!
//! Non-secret settings live in `config.toml`; every section is optional and falls back to
//! defaults so the bot can start from an empty file. `DATABASE_URL` in the environment
//! overrides the file. Secrets (bot token, gateway secret) are never read from this file.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Default location of the `SQLite` database.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/holdings_ledger.sqlite?mode=rwc";

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    /// Database settings
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Payout scheduler settings
    #[serde(default)]
    pub payouts: PayoutConfig,
    /// Payment gateway settings
    #[serde(default)]
    pub gateway: GatewayConfig,
    /// User ids allowed to run admin commands
    #[serde(default)]
    pub admins: Vec<String>,
}

/// `[database]` section
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// Connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

/// `[payouts]` section
#[derive(Debug, Deserialize, Clone)]
pub struct PayoutConfig {
    /// Whether the binary runs the payout generator on a timer
    #[serde(default = "default_true")]
    pub scheduled: bool,
    /// Hours between scheduled runs
    #[serde(default = "default_interval_hours")]
    pub interval_hours: u64,
}

impl Default for PayoutConfig {
    fn default() -> Self {
        Self {
            scheduled: true,
            interval_hours: default_interval_hours(),
        }
    }
}

impl PayoutConfig {
    /// Interval between scheduled runs.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_hours * 60 * 60)
    }
}

/// `[gateway]` section
#[derive(Debug, Deserialize, Clone)]
pub struct GatewayConfig {
    /// ISO currency code sent with orders
    #[serde(default = "default_currency")]
    pub currency: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            currency: default_currency(),
        }
    }
}

fn default_database_url() -> String {
    DEFAULT_DATABASE_URL.to_string()
}

const fn default_true() -> bool {
    true
}

const fn default_interval_hours() -> u64 {
    24
}

fn default_currency() -> String {
    "INR".to_string()
}

/// Parses settings from a TOML string.
///
/// # Errors
/// Returns `Error::Config` if the TOML is invalid or the payout interval is zero.
pub fn parse_config(contents: &str) -> Result<AppConfig> {
    let config: AppConfig = toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })?;

    if config.payouts.interval_hours == 0 {
        return Err(Error::Config {
            message: "payouts.interval_hours must be at least 1".to_string(),
        });
    }

    Ok(config)
}

/// Loads settings from a TOML file
///
/// # Arguments
/// * `path` - Path to the config.toml file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path_ref = path.as_ref();
    debug!("Attempting to load configuration from: {:?}", path_ref);
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path_ref.display()),
    })?;
    parse_config(&contents)
}

/// Loads `./config.toml` when present (defaults otherwise) and applies environment
/// overrides.
///
/// # Errors
/// Returns an error if the file exists but cannot be parsed.
pub fn load_app_config() -> Result<AppConfig> {
    let path = Path::new("config.toml");
    let mut config = if path.exists() {
        load_config(path)?
    } else {
        debug!("No config.toml found, using defaults");
        AppConfig::default()
    };

    if let Ok(url) = std::env::var("DATABASE_URL") {
        config.database.url = url;
    }
    config.admins.extend(super::admins::admin_ids_from_env());

    Ok(config)
}

impl AppConfig {
    /// Whether `user_id` may run admin commands.
    #[must_use]
    pub fn is_admin(&self, user_id: &str) -> bool {
        self.admins.iter().any(|admin| admin == user_id)
    }
}
