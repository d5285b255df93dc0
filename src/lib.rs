//! bank_ledger Library
//!
//! Account ledger engine with per-account locking and periodic interest.
//! Re-exports modules for the binaries and integration tests.

pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod jobs;
pub mod lock;
pub mod model;
pub mod store;

pub use config::Config;
pub use domain::{Amount, AmountError, Balance, DomainError, InterestPolicy};
pub use engine::{LedgerEngine, TransferOutcome};
pub use error::{LedgerError, LedgerResult};
pub use jobs::{InterestRunReport, InterestScheduler, InterestSchedulerConfig};
pub use lock::AccountLockManager;
pub use model::{
    Account, AccountId, FailureReason, Transaction, TransactionId, TransactionKind,
    TransactionStatus,
};
pub use store::{InMemoryStore, LedgerStore, PgStore, StoreError};
