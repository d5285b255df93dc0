//! PostgreSQL ledger store
//!
//! `LedgerStore` over `bank_accounts` and `bank_transactions`
//! (see `migrations/0001_ledger.sql`). Every method is a single statement,
//! so each write is atomic on its own.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::Amount;
use crate::model::{
    Account, AccountId, FailureReason, NewAccount, Transaction, TransactionId, TransactionKind,
    TransactionStatus,
};

use super::{LedgerStore, StoreError};

type AccountRow = (i64, String, Decimal, Decimal, Uuid, DateTime<Utc>);

type TransactionRow = (
    i64,
    String,
    String,
    Option<i64>,
    Option<i64>,
    Decimal,
    String,
    Option<String>,
    DateTime<Utc>,
);

const ACCOUNT_COLUMNS: &str = "id, number, initial_balance, balance, owner_id, created_at";

const TRANSACTION_COLUMNS: &str = "id, reference, kind, from_account_id, to_account_id, amount, status, failure_reason, created_at";

/// Unique index enforcing one account per owner
const OWNER_UNIQUE_CONSTRAINT: &str = "bank_accounts_owner_id_key";

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert_transaction(&self, transaction: &Transaction) -> Result<Transaction, StoreError> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO bank_transactions (
                reference, kind, from_account_id, to_account_id,
                amount, status, failure_reason, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(transaction.reference())
        .bind(transaction.kind().as_str())
        .bind(transaction.from_account().map(|id| id.0))
        .bind(transaction.to_account().map(|id| id.0))
        .bind(transaction.amount().value())
        .bind(transaction.status().as_str())
        .bind(transaction.failure_reason().map(|r| r.as_str()))
        .bind(transaction.created_at())
        .fetch_one(&self.pool)
        .await?;

        Ok(transaction.clone().with_id(TransactionId(id)))
    }

    async fn update_transaction(
        &self,
        id: TransactionId,
        transaction: &Transaction,
    ) -> Result<Transaction, StoreError> {
        let rows = sqlx::query(
            r#"
            UPDATE bank_transactions
            SET status = $2, failure_reason = $3
            WHERE id = $1
            "#,
        )
        .bind(id.0)
        .bind(transaction.status().as_str())
        .bind(transaction.failure_reason().map(|r| r.as_str()))
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows == 0 {
            return Err(StoreError::TransactionNotFound(id));
        }
        Ok(transaction.clone())
    }
}

fn account_from_row(row: AccountRow) -> Result<Account, StoreError> {
    let (id, number, initial_balance, balance, owner_id, created_at) = row;
    Account::from_db_state(id, number, initial_balance, balance, owner_id, created_at)
        .map_err(|e| StoreError::InvalidData(format!("account {}: {}", id, e)))
}

fn transaction_from_row(row: TransactionRow) -> Result<Transaction, StoreError> {
    let (id, reference, kind, from, to, amount, status, failure_reason, created_at) = row;
    let invalid = |msg: String| StoreError::InvalidData(format!("transaction {}: {}", id, msg));

    let kind: TransactionKind = kind.parse().map_err(invalid)?;
    let status: TransactionStatus = status.parse().map_err(invalid)?;
    let failure_reason: Option<FailureReason> = failure_reason
        .map(|r| r.parse())
        .transpose()
        .map_err(invalid)?;
    let amount = Amount::new(amount).map_err(|e| invalid(e.to_string()))?;

    Transaction::from_db_state(
        id,
        reference,
        kind,
        from,
        to,
        amount,
        status,
        failure_reason,
        created_at,
    )
    .ok_or_else(|| invalid("no account reference".to_string()))
}

#[async_trait]
impl LedgerStore for PgStore {
    async fn create_account(&self, new: NewAccount) -> Result<Account, StoreError> {
        let result: Result<AccountRow, sqlx::Error> = sqlx::query_as(&format!(
            r#"
            INSERT INTO bank_accounts (number, owner_id, initial_balance, balance)
            VALUES ($1, $2, $3, $3)
            RETURNING {}
            "#,
            ACCOUNT_COLUMNS
        ))
        .bind(&new.number)
        .bind(new.owner_id)
        .bind(new.initial_balance.value())
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => account_from_row(row),
            Err(sqlx::Error::Database(e)) if e.constraint() == Some(OWNER_UNIQUE_CONSTRAINT) => {
                Err(StoreError::DuplicateOwner(new.owner_id))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn save_account(&self, account: &Account) -> Result<(), StoreError> {
        let rows = sqlx::query(
            r#"
            UPDATE bank_accounts
            SET balance = $2
            WHERE id = $1
            "#,
        )
        .bind(account.id().0)
        .bind(account.balance().value())
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows == 0 {
            return Err(StoreError::AccountNotFound(account.id()));
        }
        Ok(())
    }

    async fn save_transaction(&self, transaction: &Transaction) -> Result<Transaction, StoreError> {
        match transaction.id() {
            Some(id) => self.update_transaction(id, transaction).await,
            None => self.insert_transaction(transaction).await,
        }
    }

    async fn find_account_by_id(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        let row: Option<AccountRow> = sqlx::query_as(&format!(
            "SELECT {} FROM bank_accounts WHERE id = $1",
            ACCOUNT_COLUMNS
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(account_from_row).transpose()
    }

    async fn find_all_accounts(&self) -> Result<Vec<Account>, StoreError> {
        let rows: Vec<AccountRow> = sqlx::query_as(&format!(
            "SELECT {} FROM bank_accounts ORDER BY id",
            ACCOUNT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(account_from_row).collect()
    }

    async fn find_transaction_by_id(
        &self,
        id: TransactionId,
    ) -> Result<Option<Transaction>, StoreError> {
        let row: Option<TransactionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM bank_transactions WHERE id = $1",
            TRANSACTION_COLUMNS
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(transaction_from_row).transpose()
    }

    async fn find_transaction_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Transaction>, StoreError> {
        let row: Option<TransactionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM bank_transactions WHERE reference = $1",
            TRANSACTION_COLUMNS
        ))
        .bind(reference)
        .fetch_optional(&self.pool)
        .await?;

        row.map(transaction_from_row).transpose()
    }

    async fn find_all_transactions(&self) -> Result<Vec<Transaction>, StoreError> {
        let rows: Vec<TransactionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM bank_transactions ORDER BY id",
            TRANSACTION_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(transaction_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn row(kind: &str, status: &str, reason: Option<&str>) -> TransactionRow {
        (
            5,
            "ref-5".to_string(),
            kind.to_string(),
            Some(1),
            None,
            dec!(12.50),
            status.to_string(),
            reason.map(str::to_string),
            Utc::now(),
        )
    }

    #[test]
    fn test_transaction_from_row() {
        let tx = transaction_from_row(row("WITHDRAWAL", "FAILED", Some("insufficient_funds"))).unwrap();

        assert_eq!(tx.id(), Some(TransactionId(5)));
        assert_eq!(tx.kind(), TransactionKind::Withdrawal);
        assert_eq!(tx.status(), TransactionStatus::Failed);
        assert_eq!(tx.failure_reason(), Some(FailureReason::InsufficientFunds));
        assert_eq!(tx.from_account(), Some(AccountId(1)));
    }

    #[test]
    fn test_transaction_from_row_rejects_unknown_status() {
        let result = transaction_from_row(row("DEPOSIT", "DONE", None));
        assert!(matches!(result, Err(StoreError::InvalidData(_))));
    }

    #[test]
    fn test_account_from_row_rejects_negative_balance() {
        let result = account_from_row((1, "n".to_string(), dec!(1), dec!(-5), Uuid::nil(), Utc::now()));
        assert!(matches!(result, Err(StoreError::InvalidData(_))));
    }
}
