//! Ledger Engine
//!
//! Balance mutations for deposit, withdrawal, transfer and interest accrual.
//!
//! Every mutation follows the same shape, executed while the affected
//! account locks are held:
//! 1. Load the account from the store
//! 2. Save a PENDING transaction record
//! 3. Apply the mutation and save the account
//! 4. Save the record again as SUCCESS, or as FAILED with the account put
//!    back to its prior balance
//!
//! Declined mutations (insufficient funds, overflow, store failures after the
//! PENDING record exists) come back as `Ok` with a FAILED record. `Err` is
//! reserved for requests that could not be recorded at all, and for
//! `RollbackFailed`: a balance change that could not be undone. In that case
//! the leg's record is left SUCCESS (or PENDING if even that save failed), so
//! records never claim a failure the stored balances contradict.

use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{Amount, Balance, DomainError, InterestPolicy};
use crate::error::{LedgerError, LedgerResult};
use crate::lock::AccountLockManager;
use crate::model::{
    Account, AccountId, FailureReason, NewAccount, Transaction, TransactionId, TransactionKind,
};
use crate::store::{LedgerStore, StoreError};

/// Result of a transfer: the debit record and, if the debit went through,
/// the credit record.
#[derive(Debug, Clone, Serialize)]
pub struct TransferOutcome {
    pub debit: Transaction,
    pub credit: Option<Transaction>,
}

impl TransferOutcome {
    /// Both legs recorded as SUCCESS
    pub fn is_success(&self) -> bool {
        self.debit.is_success() && self.credit.as_ref().is_some_and(Transaction::is_success)
    }
}

/// One account mutation in flight: the account, its balance before the
/// mutation, and the PENDING record as stored.
struct Leg {
    account: Account,
    prior: Balance,
    record: Transaction,
}

#[derive(Clone)]
pub struct LedgerEngine {
    store: Arc<dyn LedgerStore>,
    locks: AccountLockManager,
    policy: InterestPolicy,
}

impl LedgerEngine {
    pub fn new(store: Arc<dyn LedgerStore>, locks: AccountLockManager, policy: InterestPolicy) -> Self {
        Self {
            store,
            locks,
            policy,
        }
    }

    pub fn policy(&self) -> &InterestPolicy {
        &self.policy
    }

    pub fn locks(&self) -> &AccountLockManager {
        &self.locks
    }

    // ===== Mutations =====

    /// Credit `amount` to an account
    pub async fn deposit(&self, account_id: AccountId, amount: Decimal) -> LedgerResult<Transaction> {
        let amount = Amount::new(amount)?;
        let _guard = self.locks.acquire(account_id).await?;

        let account = self.load_account(account_id).await?;
        let record = self
            .run_single(
                account,
                Transaction::credit(account_id, amount, TransactionKind::Deposit),
                |acc| acc.credit(&amount),
            )
            .await?;

        if record.is_success() {
            tracing::info!(
                account_id = %account_id,
                amount = %amount,
                reference = %record.reference(),
                "Deposit completed"
            );
        }
        Ok(record)
    }

    /// Debit `amount` from an account. An uncovered withdrawal is returned as
    /// a FAILED record and leaves the balance untouched.
    pub async fn withdraw(&self, account_id: AccountId, amount: Decimal) -> LedgerResult<Transaction> {
        let amount = Amount::new(amount)?;
        let _guard = self.locks.acquire(account_id).await?;

        let account = self.load_account(account_id).await?;
        let record = self
            .run_single(account, Transaction::debit(account_id, amount), |acc| {
                acc.debit(&amount)
            })
            .await?;

        if record.is_success() {
            tracing::info!(
                account_id = %account_id,
                amount = %amount,
                reference = %record.reference(),
                "Withdrawal completed"
            );
        }
        Ok(record)
    }

    /// Move `amount` from one account to another.
    ///
    /// Both accounts stay locked for the whole transfer, so either both
    /// balances change or neither does.
    pub async fn transfer(
        &self,
        from: AccountId,
        to: AccountId,
        amount: Decimal,
    ) -> LedgerResult<TransferOutcome> {
        let amount = Amount::new(amount)?;
        if from == to {
            return Err(LedgerError::SameAccountTransfer);
        }

        let _guards = self.locks.acquire_pair(from, to).await?;

        let source = self.load_account(from).await?;
        let target = self.load_account(to).await?;

        // Debit
        let mut debit = self
            .open_leg(source, Transaction::debit(from, amount))
            .await?;
        if let Err(reason) = self.apply(&mut debit, |acc| acc.debit(&amount)).await {
            let debit = self.fail(debit, reason).await;
            return Ok(TransferOutcome {
                debit,
                credit: None,
            });
        }

        // Credit
        let mut credit = match self
            .open_leg(target, Transaction::credit(to, amount, TransactionKind::Deposit))
            .await
        {
            Ok(leg) => leg,
            Err(e) => {
                tracing::error!(from = %from, to = %to, error = %e, "Could not record credit leg");
                let reverted = self.revert(&mut debit).await;
                let debit = self.close(debit, reverted, FailureReason::Persistence).await?;
                return Ok(TransferOutcome {
                    debit,
                    credit: None,
                });
            }
        };
        if let Err(reason) = self.apply(&mut credit, |acc| acc.credit(&amount)).await {
            let credit = self.fail(credit, reason).await;
            let reverted = self.revert(&mut debit).await;
            let debit = self.close(debit, reverted, reason).await?;
            return Ok(TransferOutcome {
                debit,
                credit: Some(credit),
            });
        }

        // Commit
        let committed = match self.commit(&debit).await {
            Ok(d) => self.commit(&credit).await.map(|c| (d, c)),
            Err(reason) => Err(reason),
        };

        match committed {
            Ok((debit, credit)) => {
                tracing::info!(
                    from = %from,
                    to = %to,
                    amount = %amount,
                    debit_reference = %debit.reference(),
                    credit_reference = %credit.reference(),
                    "Transfer completed"
                );
                Ok(TransferOutcome {
                    debit,
                    credit: Some(credit),
                })
            }
            Err(reason) => {
                let credit_reverted = self.revert(&mut credit).await;
                let debit_reverted = self.revert(&mut debit).await;
                let credit = self.close(credit, credit_reverted, reason).await;
                let debit = self.close(debit, debit_reverted, reason).await;
                Ok(TransferOutcome {
                    debit: debit?,
                    credit: Some(credit?),
                })
            }
        }
    }

    /// Credit one round of interest if the account qualifies.
    ///
    /// Returns `Ok(None)` when the balance is not positive, the rounded
    /// accrual is zero, or the credit would take the balance past the cap.
    pub async fn charge_interest(&self, account_id: AccountId) -> LedgerResult<Option<Transaction>> {
        let _guard = self.locks.acquire(account_id).await?;
        let account = self.load_account(account_id).await?;

        let balance = account.balance().value();
        let accrual = match self.policy.accrual_for(balance, account.initial_balance()) {
            Some(accrual) => accrual,
            None => {
                tracing::debug!(
                    account_id = %account_id,
                    balance = %balance,
                    limit = %self.policy.limit(account.initial_balance()),
                    "Account does not qualify for interest"
                );
                return Ok(None);
            }
        };
        let amount = Amount::new(accrual)?;

        let record = self
            .run_single(
                account,
                Transaction::credit(account_id, amount, TransactionKind::Interest),
                |acc| acc.credit(&amount),
            )
            .await?;

        if record.is_success() {
            tracing::info!(
                account_id = %account_id,
                amount = %amount,
                reference = %record.reference(),
                "Interest credited"
            );
        }
        Ok(Some(record))
    }

    // ===== Accounts and records =====

    /// Open an account whose balance starts at `initial_balance`
    pub async fn open_account(
        &self,
        number: impl Into<String>,
        owner_id: Uuid,
        initial_balance: Decimal,
    ) -> LedgerResult<Account> {
        let initial_balance = Balance::new(initial_balance)?;
        let account = self
            .store
            .create_account(NewAccount::new(number, owner_id, initial_balance))
            .await?;

        tracing::info!(
            account_id = %account.id(),
            owner_id = %owner_id,
            initial_balance = %initial_balance,
            "Account opened"
        );
        Ok(account)
    }

    pub async fn account(&self, account_id: AccountId) -> LedgerResult<Account> {
        self.load_account(account_id).await
    }

    pub async fn accounts(&self) -> LedgerResult<Vec<Account>> {
        Ok(self.store.find_all_accounts().await?)
    }

    pub async fn transaction(&self, id: TransactionId) -> LedgerResult<Option<Transaction>> {
        Ok(self.store.find_transaction_by_id(id).await?)
    }

    pub async fn transaction_by_reference(&self, reference: &str) -> LedgerResult<Option<Transaction>> {
        Ok(self.store.find_transaction_by_reference(reference).await?)
    }

    pub async fn transactions(&self) -> LedgerResult<Vec<Transaction>> {
        Ok(self.store.find_all_transactions().await?)
    }

    // ===== Leg lifecycle (callers hold the account locks) =====

    async fn load_account(&self, account_id: AccountId) -> LedgerResult<Account> {
        self.store
            .find_account_by_id(account_id)
            .await?
            .ok_or(LedgerError::AccountNotFound(account_id))
    }

    /// Whole lifecycle of a single-account mutation
    async fn run_single<F>(
        &self,
        account: Account,
        pending: Transaction,
        mutate: F,
    ) -> LedgerResult<Transaction>
    where
        F: FnOnce(&mut Account) -> Result<(), DomainError>,
    {
        let mut leg = self.open_leg(account, pending).await?;

        if let Err(reason) = self.apply(&mut leg, mutate).await {
            return Ok(self.fail(leg, reason).await);
        }

        match self.commit(&leg).await {
            Ok(record) => Ok(record),
            Err(reason) => {
                let reverted = self.revert(&mut leg).await;
                self.close(leg, reverted, reason).await
            }
        }
    }

    async fn open_leg(&self, account: Account, pending: Transaction) -> LedgerResult<Leg> {
        let record = self.store.save_transaction(&pending).await.map_err(|e| {
            tracing::error!(
                reference = %pending.reference(),
                error = %e,
                "Failed to record pending transaction"
            );
            e
        })?;

        Ok(Leg {
            prior: account.balance(),
            account,
            record,
        })
    }

    /// Mutate the account and save it. On failure the in-memory account is
    /// back at its prior balance and the store was not changed.
    async fn apply<F>(&self, leg: &mut Leg, mutate: F) -> Result<(), FailureReason>
    where
        F: FnOnce(&mut Account) -> Result<(), DomainError>,
    {
        if let Err(e) = mutate(&mut leg.account) {
            return Err(FailureReason::from(&e));
        }

        if let Err(e) = self.store.save_account(&leg.account).await {
            tracing::error!(
                account_id = %leg.account.id(),
                reference = %leg.record.reference(),
                error = %e,
                "Failed to save account balance"
            );
            leg.account.restore_balance(leg.prior);
            return Err(FailureReason::Persistence);
        }
        Ok(())
    }

    /// Save the leg's record as SUCCESS
    async fn commit(&self, leg: &Leg) -> Result<Transaction, FailureReason> {
        let mut record = leg.record.clone();
        record.succeed().map_err(|e| FailureReason::from(&e))?;

        self.store.save_transaction(&record).await.map_err(|e| {
            tracing::error!(
                reference = %record.reference(),
                error = %e,
                "Failed to record transaction success"
            );
            FailureReason::Persistence
        })
    }

    /// Put the account back to its prior balance, in memory and in the store.
    /// On `Err` the stored balance still carries the leg's change.
    async fn revert(&self, leg: &mut Leg) -> Result<(), StoreError> {
        leg.account.restore_balance(leg.prior);
        self.store.save_account(&leg.account).await.map_err(|e| {
            tracing::error!(
                account_id = %leg.account.id(),
                balance = %leg.prior,
                error = %e,
                "Failed to restore account balance"
            );
            e
        })
    }

    /// Resolve the record of an applied leg after a revert attempt: FAILED
    /// if the revert went through, otherwise SUCCESS to match the balance
    /// the store still holds, reported as `RollbackFailed`.
    async fn close(
        &self,
        leg: Leg,
        reverted: Result<(), StoreError>,
        reason: FailureReason,
    ) -> LedgerResult<Transaction> {
        let source = match reverted {
            Ok(()) => return Ok(self.fail(leg, reason).await),
            Err(e) => e,
        };

        let account_id = leg.account.id();
        let reference = leg.record.reference().to_string();
        if self.commit(&leg).await.is_err() {
            tracing::error!(
                account_id = %account_id,
                reference = %reference,
                "Applied balance change left with a PENDING record"
            );
        }

        Err(LedgerError::RollbackFailed {
            account_id,
            reference,
            source,
        })
    }

    /// Close the leg's record as FAILED. Returns the record even if the
    /// store rejects the update.
    async fn fail(&self, leg: Leg, reason: FailureReason) -> Transaction {
        let mut record = leg.record;
        if let Err(e) = record.fail(reason) {
            tracing::error!(reference = %record.reference(), error = %e, "Cannot fail transaction");
            return record;
        }

        tracing::warn!(
            account_id = %leg.account.id(),
            reference = %record.reference(),
            kind = %record.kind(),
            amount = %record.amount(),
            reason = %reason,
            "Transaction failed"
        );

        match self.store.save_transaction(&record).await {
            Ok(saved) => saved,
            Err(e) => {
                tracing::error!(
                    reference = %record.reference(),
                    error = %e,
                    "Failed to record transaction failure"
                );
                record
            }
        }
    }
}
