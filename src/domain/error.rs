//! Domain Error Types
//!
//! Pure domain errors that don't depend on infrastructure.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::model::TransactionStatus;

/// Business rule violations raised by the account and transaction entities.
///
/// These are recoverable: the engine turns them into a `FAILED` transaction
/// record rather than propagating them to the caller.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    /// Withdrawal exceeds the current balance
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds {
        required: Decimal,
        available: Decimal,
    },

    /// Credit sum is not representable as a `Decimal`
    #[error("Balance overflow")]
    BalanceOverflow,

    /// Transaction status may only leave PENDING once
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: TransactionStatus,
        to: TransactionStatus,
    },
}

impl DomainError {
    pub fn insufficient_funds(required: Decimal, available: Decimal) -> Self {
        Self::InsufficientFunds {
            required,
            available,
        }
    }
}
