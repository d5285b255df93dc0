//! Store Errors
//!
//! Error types for ledger persistence.

use uuid::Uuid;

use crate::model::{AccountId, TransactionId};

/// Errors that can occur in a ledger store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The owner already has an account
    #[error("Owner {0} already has an account")]
    DuplicateOwner(Uuid),

    /// Account row missing on update
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    /// Transaction row missing on update
    #[error("Transaction not found: {0}")]
    TransactionNotFound(TransactionId),

    /// Persisted row does not satisfy entity invariants
    #[error("Invalid stored data: {0}")]
    InvalidData(String),

    /// Store cannot accept writes right now
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    /// Check if retrying the same write may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Database(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        assert!(StoreError::Unavailable("down".to_string()).is_retryable());
        assert!(!StoreError::DuplicateOwner(Uuid::nil()).is_retryable());
        assert!(!StoreError::AccountNotFound(AccountId(3)).is_retryable());
    }

    #[test]
    fn test_display() {
        let err = StoreError::AccountNotFound(AccountId(42));
        assert_eq!(err.to_string(), "Account not found: 42");
    }
}
