//! Core business logic - framework-agnostic ledger, holding lifecycle and workflows.
//!
//! Modules are ordered leaf-first: `wallet` is the only writer of wallet rows, `holding`
//! posts through it, and the payout, withdrawal, transfer and investment modules build on
//! both. Nothing here knows about Discord.

/// Gateway-funded investment path
pub mod checkout;
/// Optimistic concurrency helpers
pub mod concurrency;
/// Payment gateway collaborator
pub mod gateway;
/// Holding lifecycle manager
pub mod holding;
/// Manual investment request approval
pub mod investment;
/// Monthly payout generator
pub mod payout;
/// Property listings
pub mod property;
/// Investor portfolio reporting
pub mod report;
/// Resale workflow
pub mod transfer;
/// Wallet ledger
pub mod wallet;
/// Withdrawal workflow
pub mod withdrawal;
/// Shared state-machine plumbing
pub mod workflow;
