//! Ledger entities
//!
//! `Account` and `Transaction` as the engine sees them. Persistence is
//! handled by the `store` module.

pub mod account;
pub mod transaction;

pub use account::{Account, AccountId, NewAccount};
pub use transaction::{
    FailureReason, Transaction, TransactionId, TransactionKind, TransactionStatus,
};
