//! Error handling module
//!
//! Errors the ledger engine reports to its callers. Declined withdrawals are
//! not errors: they come back as `FAILED` transaction records.

use crate::domain::AmountError;
use crate::model::AccountId;
use crate::store::StoreError;

/// Ledger-wide Result type
pub type LedgerResult<T> = Result<T, LedgerError>;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    // Rejected before any record is created
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Cannot transfer to the same account")]
    SameAccountTransfer,

    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    // Concurrency
    #[error("Timed out waiting for lock on account {account_id}")]
    LockTimeout { account_id: AccountId },

    // Store could not record anything at all
    #[error("Persistence failure: {0}")]
    Persistence(#[from] StoreError),

    // Balance change stayed applied; its record reads SUCCESS or PENDING
    #[error("Rollback failed for account {account_id} (transaction {reference}): {source}")]
    RollbackFailed {
        account_id: AccountId,
        reference: String,
        #[source]
        source: StoreError,
    },
}

impl From<AmountError> for LedgerError {
    fn from(error: AmountError) -> Self {
        LedgerError::InvalidAmount(error.to_string())
    }
}

impl LedgerError {
    /// Check if this is the caller's fault
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            LedgerError::InvalidAmount(_)
                | LedgerError::SameAccountTransfer
                | LedgerError::AccountNotFound(_)
        )
    }

    /// Check if retrying the same call may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            LedgerError::LockTimeout { .. } => true,
            LedgerError::Persistence(e) => e.is_retryable(),
            _ => false,
        }
    }
}
