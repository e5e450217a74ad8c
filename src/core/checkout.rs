//! Gateway checkout - pay online, then open the holding.
//!
//! `start_checkout` validates the purchase and creates a gateway order; nothing is written.
//! `complete_checkout` verifies the provider's signature, reads the amount back from the
//! gateway order, and opens the holding with the payment id recorded on its investment entry.
//! Payment ids are unique in the ledger, so replaying a confirmation cannot buy twice.

use crate::{
    core::{
        gateway::{Order, PaymentGateway},
        holding::{self, NewHolding},
        property::{check_investable, get_property},
    },
    entities::holding as holding_entity,
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;
use std::collections::BTreeMap;
use tracing::{info, instrument, warn};

const USER_KEY: &str = "user_id";
const PROPERTY_KEY: &str = "property_id";

/// What the provider sends back after the investor pays.
#[derive(Debug, Clone)]
pub struct CheckoutConfirmation {
    /// Order created by [`start_checkout`]
    pub order_id: String,
    /// Provider payment id
    pub payment_id: String,
    /// Hex HMAC over `"order_id|payment_id"`
    pub signature: String,
}

/// Validates a purchase and creates the gateway order the investor will pay.
///
/// # Errors
/// Property check errors, or `Error::PaymentGateway` if the gateway fails.
#[instrument(skip(db, gateway))]
pub async fn start_checkout<G>(
    db: &DatabaseConnection,
    gateway: &G,
    user_id: &str,
    property_id: i64,
    amount: Decimal,
    currency: &str,
) -> Result<Order>
where
    G: PaymentGateway,
{
    let property = get_property(db, property_id)
        .await?
        .ok_or_else(|| Error::PropertyUnavailable {
            property_id,
            reason: "property does not exist".to_string(),
        })?;
    check_investable(&property, amount)?;

    let metadata = BTreeMap::from([
        (USER_KEY.to_string(), user_id.to_string()),
        (PROPERTY_KEY.to_string(), property_id.to_string()),
    ]);
    let order = gateway.create_order(amount, currency, &metadata).await?;

    info!(order_id = %order.order_id, "Checkout started");
    Ok(order)
}

fn metadata_value<'a>(order: &'a Order, key: &str) -> Result<&'a str> {
    order
        .metadata
        .get(key)
        .map(String::as_str)
        .ok_or_else(|| Error::PaymentGateway {
            message: format!("order {} has no {key}", order.order_id),
        })
}

/// Verifies a payment and opens the holding it paid for.
///
/// # Errors
/// - `Error::PaymentVerificationFailed` if the signature does not match; nothing is written
/// - `Error::PaymentGateway` if the order is unknown or malformed
/// - `Error::AlreadyProcessed` if the payment id was already used
#[instrument(skip(db, gateway, confirmation), fields(order_id = %confirmation.order_id))]
pub async fn complete_checkout<G>(
    db: &DatabaseConnection,
    gateway: &G,
    confirmation: CheckoutConfirmation,
    now: DateTime<Utc>,
) -> Result<holding_entity::Model>
where
    G: PaymentGateway,
{
    if !gateway.verify_signature(
        &confirmation.order_id,
        &confirmation.payment_id,
        &confirmation.signature,
    )? {
        warn!("Payment signature mismatch");
        return Err(Error::PaymentVerificationFailed {
            order_id: confirmation.order_id,
        });
    }

    let order = gateway.fetch_order(&confirmation.order_id).await?;
    let user_id = metadata_value(&order, USER_KEY)?.to_string();
    let property_id = metadata_value(&order, PROPERTY_KEY)?
        .parse::<i64>()
        .map_err(|e| Error::PaymentGateway {
            message: format!("order {} has a bad property id: {e}", order.order_id),
        })?;

    let holding = holding::create(
        db,
        NewHolding {
            user_id,
            property_id,
            amount: order.amount,
            payment_id: Some(confirmation.payment_id),
            purchased_at: now,
        },
    )
    .await?;

    info!(holding_id = holding.id, "Checkout completed");
    Ok(holding)
}
