//! In-memory ledger store
//!
//! Map-backed implementation of `LedgerStore` used by tests and the load-test
//! binary. Each call holds the inner `RwLock` for its whole duration, which
//! gives the individually-atomic writes the engine expects.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::model::{Account, AccountId, NewAccount, Transaction, TransactionId};

use super::{LedgerStore, StoreError};

#[derive(Debug, Default)]
struct Inner {
    accounts: BTreeMap<AccountId, Account>,
    owners: HashMap<Uuid, AccountId>,
    transactions: BTreeMap<TransactionId, Transaction>,
    references: HashMap<String, TransactionId>,
    next_account_id: i64,
    next_transaction_id: i64,
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for InMemoryStore {
    async fn create_account(&self, new: NewAccount) -> Result<Account, StoreError> {
        let mut inner = self.inner.write().await;
        if inner.owners.contains_key(&new.owner_id) {
            return Err(StoreError::DuplicateOwner(new.owner_id));
        }

        inner.next_account_id += 1;
        let id = AccountId(inner.next_account_id);
        let account = Account::open(id, new);

        inner.owners.insert(account.owner_id(), id);
        inner.accounts.insert(id, account.clone());
        Ok(account)
    }

    async fn save_account(&self, account: &Account) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        match inner.accounts.get_mut(&account.id()) {
            Some(stored) => {
                *stored = account.clone();
                Ok(())
            }
            None => Err(StoreError::AccountNotFound(account.id())),
        }
    }

    async fn save_transaction(&self, transaction: &Transaction) -> Result<Transaction, StoreError> {
        let mut inner = self.inner.write().await;
        match transaction.id() {
            Some(id) => match inner.transactions.get_mut(&id) {
                Some(stored) => {
                    stored.copy_status_from(transaction);
                    Ok(stored.clone())
                }
                None => Err(StoreError::TransactionNotFound(id)),
            },
            None => {
                inner.next_transaction_id += 1;
                let id = TransactionId(inner.next_transaction_id);
                let stored = transaction.clone().with_id(id);

                inner.references.insert(stored.reference().to_string(), id);
                inner.transactions.insert(id, stored.clone());
                Ok(stored)
            }
        }
    }

    async fn find_account_by_id(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        Ok(self.inner.read().await.accounts.get(&id).cloned())
    }

    async fn find_all_accounts(&self) -> Result<Vec<Account>, StoreError> {
        Ok(self.inner.read().await.accounts.values().cloned().collect())
    }

    async fn find_transaction_by_id(
        &self,
        id: TransactionId,
    ) -> Result<Option<Transaction>, StoreError> {
        Ok(self.inner.read().await.transactions.get(&id).cloned())
    }

    async fn find_transaction_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Transaction>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .references
            .get(reference)
            .and_then(|id| inner.transactions.get(id))
            .cloned())
    }

    async fn find_all_transactions(&self) -> Result<Vec<Transaction>, StoreError> {
        Ok(self.inner.read().await.transactions.values().cloned().collect())
    }
}
