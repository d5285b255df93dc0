//! Account Lock Manager
//!
//! Per-account mutual exclusion for balance mutations. Each account id maps
//! to its own async mutex, created on first use and dropped from the table
//! once nobody holds or waits on it. Operations on unrelated accounts never
//! contend. Two-account operations lock the lower id first,
//! which makes acquisition order global and rules out lock-order deadlocks.
//!
//! Waits are bounded: a lock not granted within the configured timeout is
//! reported as `LedgerError::LockTimeout` instead of blocking forever.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::LedgerError;
use crate::model::AccountId;

type LockTable = DashMap<AccountId, Arc<Mutex<()>>>;

/// Default bound on lock waits
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Grants exclusive access to an account's mutation path.
///
/// Cloning shares the lock table, so every clone serializes against the
/// same per-account locks.
#[derive(Debug, Clone)]
pub struct AccountLockManager {
    locks: Arc<LockTable>,
    timeout: Duration,
}

impl AccountLockManager {
    pub fn new(timeout: Duration) -> Self {
        Self {
            locks: Arc::new(DashMap::new()),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn lock_for(&self, account_id: AccountId) -> Arc<Mutex<()>> {
        self.locks
            .entry(account_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Wait for exclusive ownership of `account_id`.
    ///
    /// The returned guard releases the lock when dropped.
    pub async fn acquire(&self, account_id: AccountId) -> Result<AccountGuard, LedgerError> {
        let lock = self.lock_for(account_id);

        let acquired = tokio::time::timeout(self.timeout, lock.lock_owned()).await;
        match acquired {
            Ok(guard) => {
                tracing::debug!(account_id = %account_id, "Account lock acquired");
                Ok(AccountGuard {
                    account_id,
                    guard: Some(guard),
                    locks: self.locks.clone(),
                })
            }
            Err(_) => {
                forget_idle(&self.locks, account_id);
                tracing::warn!(
                    account_id = %account_id,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Timed out waiting for account lock"
                );
                Err(LedgerError::LockTimeout { account_id })
            }
        }
    }

    /// Lock two accounts, lower id first.
    ///
    /// If the second lock times out the first is released before returning.
    /// Passing the same id twice locks it once.
    pub async fn acquire_pair(
        &self,
        a: AccountId,
        b: AccountId,
    ) -> Result<PairGuard, LedgerError> {
        if a == b {
            let first = self.acquire(a).await?;
            return Ok(PairGuard {
                _first: first,
                _second: None,
            });
        }

        let (low, high) = if a < b { (a, b) } else { (b, a) };
        let first = self.acquire(low).await?;
        let second = self.acquire(high).await?;

        Ok(PairGuard {
            _first: first,
            _second: Some(second),
        })
    }

    /// Check if some task currently holds the lock for `account_id`
    pub fn is_locked(&self, account_id: AccountId) -> bool {
        self.locks
            .get(&account_id)
            .map(|lock| lock.try_lock().is_err())
            .unwrap_or(false)
    }

    /// Number of accounts currently held or waited on
    pub fn tracked_accounts(&self) -> usize {
        self.locks.len()
    }
}

/// Drop the table entry for `account_id` if the table holds the only handle
fn forget_idle(locks: &LockTable, account_id: AccountId) {
    locks.remove_if(&account_id, |_, lock| Arc::strong_count(lock) == 1);
}

impl Default for AccountLockManager {
    fn default() -> Self {
        Self::new(DEFAULT_LOCK_TIMEOUT)
    }
}

/// Exclusive hold on one account; released on drop
#[derive(Debug)]
pub struct AccountGuard {
    account_id: AccountId,
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<LockTable>,
}

impl AccountGuard {
    pub fn account_id(&self) -> AccountId {
        self.account_id
    }
}

impl Drop for AccountGuard {
    fn drop(&mut self) {
        // The owned guard keeps its own handle on the mutex; release it first
        self.guard.take();
        forget_idle(&self.locks, self.account_id);
        tracing::debug!(account_id = %self.account_id, "Account lock released");
    }
}

/// Hold on both accounts of a two-account operation
#[derive(Debug)]
pub struct PairGuard {
    _first: AccountGuard,
    _second: Option<AccountGuard>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_test::{assert_err, assert_ok};

    fn manager(timeout_ms: u64) -> AccountLockManager {
        AccountLockManager::new(Duration::from_millis(timeout_ms))
    }

    #[tokio::test]
    async fn test_acquire_and_release() {
        let locks = manager(100);

        let guard = assert_ok!(locks.acquire(AccountId(1)).await);
        assert_eq!(guard.account_id(), AccountId(1));
        assert!(locks.is_locked(AccountId(1)));

        drop(guard);
        assert!(!locks.is_locked(AccountId(1)));
        assert_ok!(locks.acquire(AccountId(1)).await);
    }

    #[tokio::test]
    async fn test_held_lock_times_out() {
        let locks = manager(50);
        let _held = locks.acquire(AccountId(1)).await.unwrap();

        let result = locks.acquire(AccountId(1)).await;

        assert!(matches!(
            result,
            Err(LedgerError::LockTimeout { account_id }) if account_id == AccountId(1)
        ));
    }

    #[tokio::test]
    async fn test_disjoint_accounts_do_not_block() {
        let locks = manager(50);
        let _a = locks.acquire(AccountId(1)).await.unwrap();

        assert_ok!(locks.acquire(AccountId(2)).await);
        assert_eq!(locks.tracked_accounts(), 2);
    }

    #[tokio::test]
    async fn test_released_locks_leave_the_table() {
        let locks = manager(50);

        for id in 1..=100 {
            drop(locks.acquire(AccountId(id)).await.unwrap());
        }
        assert_eq!(locks.tracked_accounts(), 0);

        let held = locks.acquire(AccountId(1)).await.unwrap();
        assert_err!(locks.acquire(AccountId(1)).await);
        assert_eq!(locks.tracked_accounts(), 1);

        drop(held);
        assert_eq!(locks.tracked_accounts(), 0);
    }

    #[tokio::test]
    async fn test_entry_survives_while_another_task_waits() {
        let locks = manager(1_000);
        let held = locks.acquire(AccountId(7)).await.unwrap();

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(AccountId(7)).await?;
                Ok::<_, LedgerError>(locks.is_locked(AccountId(7)))
            })
        };
        tokio::task::yield_now().await;
        drop(held);

        assert!(assert_ok!(waiter.await.unwrap()));
        assert_eq!(locks.tracked_accounts(), 0);
    }

    #[tokio::test]
    async fn test_clones_share_locks() {
        let locks = manager(50);
        let other = locks.clone();
        let _held = locks.acquire(AccountId(3)).await.unwrap();

        assert_err!(other.acquire(AccountId(3)).await);
    }

    #[tokio::test]
    async fn test_pair_releases_first_when_second_times_out() {
        let locks = manager(50);
        let _held = locks.acquire(AccountId(2)).await.unwrap();

        assert_err!(locks.acquire_pair(AccountId(1), AccountId(2)).await);
        assert!(!locks.is_locked(AccountId(1)));
    }

    #[tokio::test]
    async fn test_pair_with_same_id_locks_once() {
        let locks = manager(50);
        let guard = assert_ok!(locks.acquire_pair(AccountId(4), AccountId(4)).await);
        assert!(locks.is_locked(AccountId(4)));
        drop(guard);
        assert!(!locks.is_locked(AccountId(4)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_opposite_pairs_do_not_deadlock() {
        let locks = manager(2_000);
        let mut handles = Vec::new();

        for i in 0..50 {
            let locks = locks.clone();
            handles.push(tokio::spawn(async move {
                let (a, b) = if i % 2 == 0 {
                    (AccountId(1), AccountId(2))
                } else {
                    (AccountId(2), AccountId(1))
                };
                let _pair = locks.acquire_pair(a, b).await?;
                tokio::task::yield_now().await;
                Ok::<_, LedgerError>(())
            }));
        }

        for handle in handles {
            assert_ok!(handle.await.unwrap());
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_same_account_is_exclusive() {
        let locks = manager(5_000);
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();

        for _ in 0..32 {
            let locks = locks.clone();
            let inside = inside.clone();
            let max_inside = max_inside.clone();
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire(AccountId(9)).await.unwrap();
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_inside.fetch_max(now, Ordering::SeqCst);
                tokio::task::yield_now().await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    }
}
