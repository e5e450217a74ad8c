//! Unified error type for the holdings ledger.
//!
//! Every failure the core can produce is a variant of [`Error`]. Variants are grouped into
//! the categories returned by [`Error::kind`] so callers (the bot layer, the payout
//! scheduler) can decide whether to report, retry or abort without matching every variant.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

/// Broad category of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input, rejected before any side effect
    Validation,
    /// The request is well formed but violates the current state of the ledger
    State,
    /// A concurrent writer got there first
    Concurrency,
    /// The payment gateway failed or could not confirm the payment
    External,
    /// Storage, configuration or framework failure
    Internal,
}

/// All errors produced by the holdings ledger.
#[derive(Debug, Error)]
pub enum Error {
    /// Database error from `SeaORM`
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Description of what went wrong
        message: String,
    },

    /// Amount is zero, negative, or otherwise unusable
    #[error("Invalid amount: {amount}")]
    InvalidAmount {
        /// The rejected amount
        amount: Decimal,
    },

    /// Input failed validation (bank details, empty reason, bad ids)
    #[error("Validation failed: {message}")]
    Validation {
        /// What was wrong with the input
        message: String,
    },

    /// Investment below the property's minimum ticket
    #[error("Amount {amount} is below the minimum investment of {minimum}")]
    BelowMinimum {
        /// Requested amount
        amount: Decimal,
        /// Property minimum
        minimum: Decimal,
    },

    /// Property is not accepting this investment
    #[error("Property {property_id} is unavailable: {reason}")]
    PropertyUnavailable {
        /// Property id
        property_id: i64,
        /// Why it cannot take the investment
        reason: String,
    },

    /// A wallet field would go negative
    #[error("Insufficient funds in {field}: have {current}, need {required}")]
    InsufficientFunds {
        /// Wallet field that would underflow
        field: &'static str,
        /// Current value of the field
        current: Decimal,
        /// Amount the entry needs
        required: Decimal,
    },

    /// Withdrawal larger than what can be withdrawn right now
    #[error("Requested {requested} exceeds withdrawable amount {available}")]
    ExceedsWithdrawable {
        /// Requested amount
        requested: Decimal,
        /// Amount currently available after reservations
        available: Decimal,
    },

    /// Principal withdrawal before the lock-in ends
    #[error("Holding {holding_id} is locked until {maturity_date}")]
    HoldingNotMatured {
        /// Holding id
        holding_id: i64,
        /// When the lock-in ends
        maturity_date: DateTime<Utc>,
    },

    /// Holding was already withdrawn or sold
    #[error("Holding {holding_id} has been withdrawn")]
    HoldingWithdrawn {
        /// Holding id
        holding_id: i64,
    },

    /// A terminal record was asked to transition again
    #[error("{entity} {id} has already been processed")]
    AlreadyProcessed {
        /// Kind of record
        entity: &'static str,
        /// Record id
        id: String,
    },

    /// Transition not present in the workflow's transition table
    #[error("Invalid {workflow} transition: cannot {action} from {from}")]
    InvalidTransition {
        /// Workflow name
        workflow: &'static str,
        /// Current status
        from: String,
        /// Attempted action
        action: String,
    },

    /// Actor does not own the holding
    #[error("User {user_id} does not own holding {holding_id}")]
    NotOwner {
        /// Holding id
        holding_id: i64,
        /// Acting user
        user_id: String,
    },

    /// Actor is not allowed to perform this step
    #[error("User {user_id} is not allowed to {action}")]
    Unauthorized {
        /// Acting user
        user_id: String,
        /// What they tried to do
        action: String,
    },

    /// Resale price below the floor
    #[error("Sale price {sale_price} is below the minimum of {minimum}")]
    SalePriceTooLow {
        /// Offered price
        sale_price: Decimal,
        /// 80% of the principal
        minimum: Decimal,
    },

    /// Another transfer request is still open for this holding
    #[error("Holding {holding_id} already has an open transfer request")]
    TransferAlreadyOpen {
        /// Holding id
        holding_id: i64,
    },

    /// A principal withdrawal is still open for this holding
    #[error("Holding {holding_id} has an open principal withdrawal")]
    WithdrawalAlreadyOpen {
        /// Holding id
        holding_id: i64,
    },

    /// Record lookup failed
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of record
        entity: &'static str,
        /// Record id
        id: String,
    },

    /// Optimistic concurrency check failed
    #[error("Concurrent modification: {message}")]
    Conflict {
        /// What was being updated
        message: String,
    },

    /// Payment gateway unreachable or returned an error
    #[error("Payment gateway error: {message}")]
    PaymentGateway {
        /// Gateway failure description
        message: String,
    },

    /// Payment signature did not verify
    #[error("Payment verification failed for order {order_id}")]
    PaymentVerificationFailed {
        /// Gateway order id
        order_id: String,
    },

    /// Date arithmetic overflowed
    #[error("Invalid date: {message}")]
    InvalidDate {
        /// Description
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Missing or malformed environment variable
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    /// Integer conversion error
    #[error("Integer conversion error: {0}")]
    TryFromInt(#[from] std::num::TryFromIntError),

    /// Serenity/Poise framework error
    #[error("Serenity/Poise framework error: {0}")]
    Framework(Box<poise::serenity_prelude::Error>),
}

impl From<poise::serenity_prelude::Error> for Error {
    fn from(value: poise::serenity_prelude::Error) -> Self {
        Self::Framework(Box::new(value))
    }
}

impl Error {
    /// Category of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidAmount { .. }
            | Self::Validation { .. }
            | Self::BelowMinimum { .. }
            | Self::SalePriceTooLow { .. } => ErrorKind::Validation,
            Self::PropertyUnavailable { .. }
            | Self::InsufficientFunds { .. }
            | Self::ExceedsWithdrawable { .. }
            | Self::HoldingNotMatured { .. }
            | Self::HoldingWithdrawn { .. }
            | Self::AlreadyProcessed { .. }
            | Self::InvalidTransition { .. }
            | Self::NotOwner { .. }
            | Self::Unauthorized { .. }
            | Self::TransferAlreadyOpen { .. }
            | Self::WithdrawalAlreadyOpen { .. }
            | Self::NotFound { .. } => ErrorKind::State,
            Self::Conflict { .. } => ErrorKind::Concurrency,
            Self::PaymentGateway { .. } | Self::PaymentVerificationFailed { .. } => {
                ErrorKind::External
            }
            Self::Database(_)
            | Self::Config { .. }
            | Self::InvalidDate { .. }
            | Self::Io(_)
            | Self::EnvVar(_)
            | Self::TryFromInt(_)
            | Self::Framework(_) => ErrorKind::Internal,
        }
    }

    /// Shorthand for a [`Error::Validation`].
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Shorthand for a [`Error::NotFound`].
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            Error::InvalidAmount { amount: dec!(0) }.kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            Error::AlreadyProcessed {
                entity: "investment request",
                id: "1".to_string(),
            }
            .kind(),
            ErrorKind::State
        );
        assert_eq!(
            Error::Conflict {
                message: "wallet".to_string()
            }
            .kind(),
            ErrorKind::Concurrency
        );
        assert_eq!(
            Error::PaymentVerificationFailed {
                order_id: "order_1".to_string()
            }
            .kind(),
            ErrorKind::External
        );
    }

    #[test]
    fn test_error_messages_name_the_invariant() {
        let err = Error::SalePriceTooLow {
            sale_price: dec!(350000),
            minimum: dec!(400000),
        };
        assert_eq!(
            err.to_string(),
            "Sale price 350000 is below the minimum of 400000"
        );
    }
}
