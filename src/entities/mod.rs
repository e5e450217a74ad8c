//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod holding;
pub mod investment_request;
pub mod payout;
pub mod property;
pub mod transaction;
pub mod transfer_request;
pub mod wallet;
pub mod withdrawal_request;

// Re-export specific types to avoid conflicts
pub use holding::{Column as HoldingColumn, Entity as Holding, Model as HoldingModel};
pub use investment_request::{
    Column as InvestmentRequestColumn, Entity as InvestmentRequest,
    Model as InvestmentRequestModel,
};
pub use payout::{Column as PayoutColumn, Entity as Payout, Model as PayoutModel};
pub use property::{Column as PropertyColumn, Entity as Property, Model as PropertyModel};
pub use transaction::{
    Column as TransactionColumn, Entity as Transaction, Model as TransactionModel,
};
pub use transfer_request::{
    Column as TransferRequestColumn, Entity as TransferRequest, Model as TransferRequestModel,
};
pub use wallet::{Column as WalletColumn, Entity as Wallet, Model as WalletModel};
pub use withdrawal_request::{
    Column as WithdrawalRequestColumn, Entity as WithdrawalRequest,
    Model as WithdrawalRequestModel,
};
