//! Payment gateway seam.
//!
//! [`PaymentGateway`] is what checkout talks to. [`HmacGateway`] is the built-in
//! implementation: it keeps created orders in memory and signs payments with
//! HMAC-SHA256 over `"order_id|payment_id"`, hex encoded, the way hosted checkout
//! providers sign their payment callbacks.

use crate::errors::{Error, Result};
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use sha2::Sha256;
use std::{
    collections::{BTreeMap, HashMap},
    future::Future,
    sync::Mutex,
};
use tracing::debug;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Environment variable holding the gateway signing secret.
pub const GATEWAY_SECRET_ENV: &str = "PAYMENT_GATEWAY_SECRET";

/// An order created with the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    /// Gateway order id
    pub order_id: String,
    /// Amount the investor must pay
    pub amount: Decimal,
    /// ISO currency code
    pub currency: String,
    /// Who is paying for what
    pub metadata: BTreeMap<String, String>,
}

/// Operations checkout needs from a payment provider.
pub trait PaymentGateway: Send + Sync {
    /// Creates an order for `amount` in `currency`.
    fn create_order(
        &self,
        amount: Decimal,
        currency: &str,
        metadata: &BTreeMap<String, String>,
    ) -> impl Future<Output = Result<Order>> + Send;

    /// Looks up an order created earlier. The amount comes from here, never from the client.
    fn fetch_order(&self, order_id: &str) -> impl Future<Output = Result<Order>> + Send;

    /// Checks the signature the provider attached to a completed payment.
    fn verify_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> Result<bool>;
}

/// HMAC-SHA256 signing gateway with an in-memory order book.
pub struct HmacGateway {
    secret: Vec<u8>,
    orders: Mutex<HashMap<String, Order>>,
}

impl std::fmt::Debug for HmacGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacGateway").finish_non_exhaustive()
    }
}

impl HmacGateway {
    /// Creates a gateway signing with `secret`.
    ///
    /// # Errors
    /// Returns `Error::Config` if the secret is empty.
    pub fn new(secret: impl Into<Vec<u8>>) -> Result<Self> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(Error::Config {
                message: "payment gateway secret cannot be empty".to_string(),
            });
        }
        Ok(Self {
            secret,
            orders: Mutex::new(HashMap::new()),
        })
    }

    /// Creates a gateway from `PAYMENT_GATEWAY_SECRET`.
    pub fn from_env() -> Result<Self> {
        Self::new(std::env::var(GATEWAY_SECRET_ENV)?)
    }

    fn mac(&self, order_id: &str, payment_id: &str) -> Result<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.secret).map_err(|e| Error::Config {
            message: format!("invalid payment gateway secret: {e}"),
        })?;
        mac.update(order_id.as_bytes());
        mac.update(b"|");
        mac.update(payment_id.as_bytes());
        Ok(mac)
    }

    /// Hex signature for a payment, as the provider would attach it.
    pub fn sign(&self, order_id: &str, payment_id: &str) -> Result<String> {
        Ok(hex::encode(
            self.mac(order_id, payment_id)?.finalize().into_bytes(),
        ))
    }

    fn orders(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Order>>> {
        self.orders.lock().map_err(|_| Error::PaymentGateway {
            message: "order book lock poisoned".to_string(),
        })
    }
}

impl PaymentGateway for HmacGateway {
    async fn create_order(
        &self,
        amount: Decimal,
        currency: &str,
        metadata: &BTreeMap<String, String>,
    ) -> Result<Order> {
        if amount <= Decimal::ZERO {
            return Err(Error::InvalidAmount { amount });
        }
        let currency = currency.trim().to_ascii_uppercase();
        if currency.is_empty() {
            return Err(Error::validation("currency is required"));
        }

        let order = Order {
            order_id: format!("order_{}", Uuid::new_v4().simple()),
            amount,
            currency,
            metadata: metadata.clone(),
        };
        self.orders()?
            .insert(order.order_id.clone(), order.clone());

        debug!(order_id = %order.order_id, %amount, "Created gateway order");
        Ok(order)
    }

    async fn fetch_order(&self, order_id: &str) -> Result<Order> {
        self.orders()?
            .get(order_id)
            .cloned()
            .ok_or_else(|| Error::PaymentGateway {
                message: format!("unknown order {order_id}"),
            })
    }

    fn verify_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> Result<bool> {
        let Ok(provided) = hex::decode(signature.trim()) else {
            return Ok(false);
        };
        Ok(self
            .mac(order_id, payment_id)?
            .verify_slice(&provided)
            .is_ok())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_empty_secret_is_rejected() {
        assert!(matches!(HmacGateway::new(""), Err(Error::Config { .. })));
    }

    #[test]
    fn test_signature_verification() {
        let gateway = HmacGateway::new("s3cret").unwrap();
        let signature = gateway.sign("order_1", "pay_1").unwrap();
        assert_eq!(signature.len(), 64);

        assert!(gateway.verify_signature("order_1", "pay_1", &signature).unwrap());
        assert!(!gateway.verify_signature("order_1", "pay_2", &signature).unwrap());
        assert!(!gateway.verify_signature("order_1", "pay_1", "not-hex").unwrap());

        let other = HmacGateway::new("different").unwrap();
        assert!(!other.verify_signature("order_1", "pay_1", &signature).unwrap());
    }

    #[tokio::test]
    async fn test_orders_are_stored() -> Result<()> {
        let gateway = HmacGateway::new("s3cret")?;
        let metadata = BTreeMap::from([("user_id".to_string(), "alice".to_string())]);

        let order = gateway.create_order(dec!(500000), "inr", &metadata).await?;
        assert!(order.order_id.starts_with("order_"));
        assert_eq!(order.currency, "INR");

        let fetched = gateway.fetch_order(&order.order_id).await?;
        assert_eq!(fetched, order);

        let missing = gateway.fetch_order("order_missing").await;
        assert!(matches!(missing, Err(Error::PaymentGateway { .. })));

        let zero = gateway.create_order(dec!(0), "INR", &metadata).await;
        assert!(matches!(zero, Err(Error::InvalidAmount { .. })));
        Ok(())
    }
}
