//! Store module
//!
//! Persistence boundary of the ledger. The engine only relies on each call
//! being individually atomic; keeping Account and Transaction writes
//! consistent with each other is the engine's job.

mod error;
mod memory;
mod postgres;

use async_trait::async_trait;

use crate::model::{Account, AccountId, NewAccount, Transaction, TransactionId};

pub use error::StoreError;
pub use memory::InMemoryStore;
pub use postgres::PgStore;

/// Repository for accounts and transaction records
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Persist a new account and return it with its assigned id
    async fn create_account(&self, new: NewAccount) -> Result<Account, StoreError>;

    /// Overwrite an existing account's balance
    async fn save_account(&self, account: &Account) -> Result<(), StoreError>;

    /// Insert (no id yet) or update (id present) a transaction record.
    /// Returns the record as stored, with its id.
    async fn save_transaction(&self, transaction: &Transaction) -> Result<Transaction, StoreError>;

    async fn find_account_by_id(&self, id: AccountId) -> Result<Option<Account>, StoreError>;

    /// All accounts, ordered by id
    async fn find_all_accounts(&self) -> Result<Vec<Account>, StoreError>;

    async fn find_transaction_by_id(
        &self,
        id: TransactionId,
    ) -> Result<Option<Transaction>, StoreError>;

    async fn find_transaction_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Transaction>, StoreError>;

    /// All transaction records, ordered by id
    async fn find_all_transactions(&self) -> Result<Vec<Transaction>, StoreError>;
}
