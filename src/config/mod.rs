/// Admin user ids from the environment
pub mod admins;

/// Database configuration and connection management
pub mod database;

/// Application settings loading from config.toml
pub mod settings;

pub use settings::{AppConfig, load_app_config};
