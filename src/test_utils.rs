//! Shared test utilities for the holdings ledger.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test entities with sensible defaults.

use crate::{
    core::{
        holding::{self, NewHolding},
        property::{self, NewProperty},
        wallet::{self, NewTransaction, TransactionType},
        withdrawal::BankDetails,
    },
    entities,
    errors::Result,
};
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::DatabaseConnection;

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Midnight UTC on the given day.
///
/// # Panics
/// Panics on an invalid calendar date.
#[allow(clippy::unwrap_used)]
#[must_use]
pub fn date(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap()
}

/// Creates a test property with sensible defaults.
///
/// # Defaults
/// * `min_investment`: 100000
/// * `lock_in_months`: 3
/// * `monthly_return_rate`: 0.5 (%)
/// * capacity: 10000000
pub async fn create_test_property(
    db: &DatabaseConnection,
    name: &str,
) -> Result<entities::property::Model> {
    property::create_property(
        db,
        NewProperty {
            name: name.to_string(),
            min_investment: dec!(100000),
            lock_in_months: 3,
            monthly_return_rate: dec!(0.5),
            capacity: dec!(10000000),
        },
    )
    .await
}

/// Buys `amount` of a fresh default property for `user_id` at `purchased_at`.
pub async fn invest(
    db: &DatabaseConnection,
    user_id: &str,
    amount: Decimal,
    purchased_at: DateTime<Utc>,
) -> Result<entities::holding::Model> {
    let property = create_test_property(db, "Test Property").await?;
    holding::create(
        db,
        NewHolding {
            user_id: user_id.to_string(),
            property_id: property.id,
            amount,
            payment_id: None,
            purchased_at,
        },
    )
    .await
}

/// Credits `amount` to the user's cash balance.
pub async fn credit_wallet(
    db: &DatabaseConnection,
    user_id: &str,
    amount: Decimal,
) -> Result<entities::wallet::Model> {
    let posted = wallet::post(
        db,
        NewTransaction::completed(user_id, TransactionType::Credit, amount, "Test credit"),
    )
    .await?;
    Ok(posted.wallet)
}

/// Valid bank details.
#[must_use]
pub fn test_bank_details() -> BankDetails {
    BankDetails {
        account_holder: "Alice Investor".to_string(),
        account_number: "123456789012".to_string(),
        ifsc_code: "HDFC0001234".to_string(),
    }
}
