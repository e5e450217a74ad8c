//! Discord command implementations organized by category.

#![allow(clippy::too_long_first_doc_paragraph)]

/// General utility commands
pub mod general;

/// Property listing and investment commands
pub mod investment;

/// Payout run command
pub mod payout;

/// Portfolio and ledger views
pub mod portfolio;

/// Holding resale commands
pub mod transfer;

/// Withdrawal request commands
pub mod withdrawal;

// Export commands
pub use general::*;
pub use investment::*;
pub use payout::*;
pub use portfolio::*;
pub use transfer::*;
pub use withdrawal::*;

use crate::{bot::BotData, errors::Error};

/// Every command the bot registers.
#[must_use]
pub fn all() -> Vec<poise::Command<BotData, Error>> {
    vec![
        ping(),
        help(),
        portfolio(),
        transactions(),
        properties(),
        add_property(),
        property_status(),
        invest(),
        investment_requests(),
        approve_investment(),
        reject_investment(),
        checkout(),
        confirm_payment(),
        withdraw(),
        my_withdrawals(),
        pending_withdrawals(),
        approve_withdrawals(),
        reject_withdrawals(),
        sell(),
        transfers(),
        respond_transfer(),
        submit_transfer(),
        cancel_transfer(),
        approve_transfer(),
        reject_transfer(),
        complete_transfer(),
        run_payouts(),
    ]
}
