//! Common test utilities

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use uuid::Uuid;

use bank_ledger::model::NewAccount;
use bank_ledger::{
    Account, AccountId, AccountLockManager, InMemoryStore, InterestPolicy, LedgerEngine,
    LedgerStore, StoreError, Transaction, TransactionId, TransactionStatus,
};

/// Engine over a fresh in-memory store
pub fn engine() -> LedgerEngine {
    engine_with(Arc::new(InMemoryStore::new()), Duration::from_secs(5))
}

pub fn engine_with(store: Arc<dyn LedgerStore>, lock_timeout: Duration) -> LedgerEngine {
    LedgerEngine::new(
        store,
        AccountLockManager::new(lock_timeout),
        InterestPolicy::default(),
    )
}

/// Open an account with a random owner and return its id
pub async fn open(engine: &LedgerEngine, balance: Decimal) -> AccountId {
    engine
        .open_account(format!("ACC-{}", Uuid::new_v4().simple()), Uuid::new_v4(), balance)
        .await
        .expect("Failed to open account")
        .id()
}

pub async fn balance(engine: &LedgerEngine, id: AccountId) -> Decimal {
    engine
        .account(id)
        .await
        .expect("Failed to load account")
        .balance()
        .value()
}

// =========================================================================
// Failure injection
// =========================================================================

/// In-memory store whose writes can be made to fail on demand
#[derive(Default)]
pub struct FlakyStore {
    inner: InMemoryStore,
    fail_account_saves: AtomicBool,
    fail_pending_inserts: AtomicBool,
    fail_success_updates: AtomicBool,
    account_save_budget: Mutex<Option<usize>>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_account_saves(&self, on: bool) {
        self.fail_account_saves.store(on, Ordering::SeqCst);
    }

    pub fn fail_pending_inserts(&self, on: bool) {
        self.fail_pending_inserts.store(on, Ordering::SeqCst);
    }

    pub fn fail_success_updates(&self, on: bool) {
        self.fail_success_updates.store(on, Ordering::SeqCst);
    }

    /// Let the next `n` account saves through, then fail every one after
    pub fn fail_account_saves_after(&self, n: usize) {
        *self.account_save_budget.lock().unwrap() = Some(n);
    }

    fn take_account_save(&self) -> bool {
        let mut budget = self.account_save_budget.lock().unwrap();
        match budget.as_mut() {
            None => true,
            Some(0) => false,
            Some(left) => {
                *left -= 1;
                true
            }
        }
    }

    fn unavailable() -> StoreError {
        StoreError::Unavailable("injected failure".to_string())
    }
}

#[async_trait]
impl LedgerStore for FlakyStore {
    async fn create_account(&self, new: NewAccount) -> Result<Account, StoreError> {
        self.inner.create_account(new).await
    }

    async fn save_account(&self, account: &Account) -> Result<(), StoreError> {
        if self.fail_account_saves.load(Ordering::SeqCst) || !self.take_account_save() {
            return Err(Self::unavailable());
        }
        self.inner.save_account(account).await
    }

    async fn save_transaction(&self, transaction: &Transaction) -> Result<Transaction, StoreError> {
        if transaction.id().is_none() && self.fail_pending_inserts.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        if transaction.status() == TransactionStatus::Success
            && self.fail_success_updates.load(Ordering::SeqCst)
        {
            return Err(Self::unavailable());
        }
        self.inner.save_transaction(transaction).await
    }

    async fn find_account_by_id(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        self.inner.find_account_by_id(id).await
    }

    async fn find_all_accounts(&self) -> Result<Vec<Account>, StoreError> {
        self.inner.find_all_accounts().await
    }

    async fn find_transaction_by_id(
        &self,
        id: TransactionId,
    ) -> Result<Option<Transaction>, StoreError> {
        self.inner.find_transaction_by_id(id).await
    }

    async fn find_transaction_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Transaction>, StoreError> {
        self.inner.find_transaction_by_reference(reference).await
    }

    async fn find_all_transactions(&self) -> Result<Vec<Transaction>, StoreError> {
        self.inner.find_all_transactions().await
    }
}

// =========================================================================
// PostgreSQL
// =========================================================================

/// Setup test database - apply schema and truncate tables
pub async fn setup_test_db() -> PgPool {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to DB");

    pool.execute(include_str!("../../migrations/0001_ledger.sql"))
        .await
        .expect("Failed to apply schema");

    sqlx::query("TRUNCATE TABLE bank_transactions, bank_accounts RESTART IDENTITY CASCADE")
        .execute(&pool)
        .await
        .expect("Failed to clean up DB");

    pool
}
