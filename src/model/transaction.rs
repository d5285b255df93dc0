//! Transaction entity
//!
//! An audit record of one balance movement. A record is created `PENDING`,
//! moves exactly once to `SUCCESS` or `FAILED`, and is never deleted. A
//! transfer between two accounts produces two records: a debit and a credit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::{Amount, DomainError};

use super::AccountId;

/// Store-assigned transaction identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(pub i64);

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Success,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Success => "SUCCESS",
            TransactionStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(TransactionStatus::Pending),
            "SUCCESS" => Ok(TransactionStatus::Success),
            "FAILED" => Ok(TransactionStatus::Failed),
            _ => Err(format!("Invalid transaction status: {}", s)),
        }
    }
}

/// What caused the movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
    Interest,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Deposit => "DEPOSIT",
            TransactionKind::Withdrawal => "WITHDRAWAL",
            TransactionKind::Interest => "INTEREST",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DEPOSIT" => Ok(TransactionKind::Deposit),
            "WITHDRAWAL" => Ok(TransactionKind::Withdrawal),
            "INTEREST" => Ok(TransactionKind::Interest),
            _ => Err(format!("Invalid transaction kind: {}", s)),
        }
    }
}

/// Why a record ended up `FAILED`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// The debited account's balance did not cover the amount
    InsufficientFunds,

    /// The credited sum exceeded the `Decimal` range
    BalanceOverflow,

    /// The store could not durably save the account or record
    Persistence,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::InsufficientFunds => "insufficient_funds",
            FailureReason::BalanceOverflow => "balance_overflow",
            FailureReason::Persistence => "persistence",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::InsufficientFunds => write!(f, "Insufficient funds"),
            FailureReason::BalanceOverflow => write!(f, "Balance overflow"),
            FailureReason::Persistence => write!(f, "Persistence failure"),
        }
    }
}

impl FromStr for FailureReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "insufficient_funds" => Ok(FailureReason::InsufficientFunds),
            "balance_overflow" => Ok(FailureReason::BalanceOverflow),
            "persistence" => Ok(FailureReason::Persistence),
            _ => Err(format!("Invalid failure reason: {}", s)),
        }
    }
}

impl From<&DomainError> for FailureReason {
    fn from(error: &DomainError) -> Self {
        match error {
            DomainError::InsufficientFunds { .. } => FailureReason::InsufficientFunds,
            DomainError::BalanceOverflow => FailureReason::BalanceOverflow,
            DomainError::InvalidTransition { .. } => FailureReason::Persistence,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    id: Option<TransactionId>,
    reference: String,
    kind: TransactionKind,
    from_account: Option<AccountId>,
    to_account: Option<AccountId>,
    amount: Amount,
    status: TransactionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure_reason: Option<FailureReason>,
    created_at: DateTime<Utc>,
}

impl Transaction {
    fn pending(
        kind: TransactionKind,
        from_account: Option<AccountId>,
        to_account: Option<AccountId>,
        amount: Amount,
    ) -> Self {
        Self {
            id: None,
            reference: Uuid::new_v4().to_string(),
            kind,
            from_account,
            to_account,
            amount,
            status: TransactionStatus::Pending,
            failure_reason: None,
            created_at: Utc::now(),
        }
    }

    /// Pending record for money arriving in `to` (deposit or interest)
    pub fn credit(to: AccountId, amount: Amount, kind: TransactionKind) -> Self {
        Self::pending(kind, None, Some(to), amount)
    }

    /// Pending record for money leaving `from`
    pub fn debit(from: AccountId, amount: Amount) -> Self {
        Self::pending(TransactionKind::Withdrawal, Some(from), None, amount)
    }

    /// Rebuild a record from persisted columns.
    ///
    /// Returns `None` when neither account reference is present.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_db_state(
        id: i64,
        reference: String,
        kind: TransactionKind,
        from_account: Option<i64>,
        to_account: Option<i64>,
        amount: Amount,
        status: TransactionStatus,
        failure_reason: Option<FailureReason>,
        created_at: DateTime<Utc>,
    ) -> Option<Self> {
        if from_account.is_none() && to_account.is_none() {
            return None;
        }
        Some(Self {
            id: Some(TransactionId(id)),
            reference,
            kind,
            from_account: from_account.map(AccountId),
            to_account: to_account.map(AccountId),
            amount,
            status,
            failure_reason,
            created_at,
        })
    }

    /// Attach the id the store assigned on first save
    pub fn with_id(mut self, id: TransactionId) -> Self {
        self.id = Some(id);
        self
    }

    pub(crate) fn succeed(&mut self) -> Result<(), DomainError> {
        self.transition(TransactionStatus::Success)?;
        Ok(())
    }

    pub(crate) fn fail(&mut self, reason: FailureReason) -> Result<(), DomainError> {
        self.transition(TransactionStatus::Failed)?;
        self.failure_reason = Some(reason);
        Ok(())
    }

    /// Take the status columns of `other`, leaving every other field alone
    pub(crate) fn copy_status_from(&mut self, other: &Transaction) {
        self.status = other.status;
        self.failure_reason = other.failure_reason;
    }

    fn transition(&mut self, to: TransactionStatus) -> Result<(), DomainError> {
        if self.status.is_terminal() {
            return Err(DomainError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    pub fn id(&self) -> Option<TransactionId> {
        self.id
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn kind(&self) -> TransactionKind {
        self.kind
    }

    pub fn from_account(&self) -> Option<AccountId> {
        self.from_account
    }

    pub fn to_account(&self) -> Option<AccountId> {
        self.to_account
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    pub fn failure_reason(&self) -> Option<FailureReason> {
        self.failure_reason
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_success(&self) -> bool {
        self.status == TransactionStatus::Success
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn amount() -> Amount {
        Amount::new(dec!(450)).unwrap()
    }

    #[test]
    fn test_credit_record_shape() {
        let tx = Transaction::credit(AccountId(2), amount(), TransactionKind::Deposit);

        assert_eq!(tx.id(), None);
        assert_eq!(tx.from_account(), None);
        assert_eq!(tx.to_account(), Some(AccountId(2)));
        assert_eq!(tx.status(), TransactionStatus::Pending);
        assert!(Uuid::parse_str(tx.reference()).is_ok());
    }

    #[test]
    fn test_debit_record_shape() {
        let tx = Transaction::debit(AccountId(1), amount());

        assert_eq!(tx.kind(), TransactionKind::Withdrawal);
        assert_eq!(tx.from_account(), Some(AccountId(1)));
        assert_eq!(tx.to_account(), None);
    }

    #[test]
    fn test_references_are_unique() {
        let a = Transaction::debit(AccountId(1), amount());
        let b = Transaction::debit(AccountId(1), amount());
        assert_ne!(a.reference(), b.reference());
    }

    #[test]
    fn test_status_transitions_once() {
        let mut tx = Transaction::debit(AccountId(1), amount());
        tx.succeed().unwrap();
        assert!(tx.is_success());

        let err = tx.fail(FailureReason::Persistence).unwrap_err();
        assert_eq!(
            err,
            DomainError::InvalidTransition {
                from: TransactionStatus::Success,
                to: TransactionStatus::Failed,
            }
        );
        assert_eq!(tx.failure_reason(), None);
    }

    #[test]
    fn test_failed_is_terminal() {
        let mut tx = Transaction::debit(AccountId(1), amount());
        tx.fail(FailureReason::InsufficientFunds).unwrap();

        assert_eq!(tx.status(), TransactionStatus::Failed);
        assert_eq!(tx.failure_reason(), Some(FailureReason::InsufficientFunds));
        assert!(tx.succeed().is_err());
    }

    #[test]
    fn test_from_db_state_requires_an_account() {
        let tx = Transaction::from_db_state(
            1,
            "ref".to_string(),
            TransactionKind::Deposit,
            None,
            None,
            amount(),
            TransactionStatus::Success,
            None,
            Utc::now(),
        );
        assert!(tx.is_none());
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            TransactionStatus::Pending,
            TransactionStatus::Success,
            TransactionStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<TransactionStatus>(), Ok(status));
        }
        assert!("DONE".parse::<TransactionStatus>().is_err());
    }

    #[test]
    fn test_serialization() {
        let mut tx = Transaction::debit(AccountId(1), amount());
        tx.fail(FailureReason::InsufficientFunds).unwrap();

        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["status"], "FAILED");
        assert_eq!(json["kind"], "WITHDRAWAL");
        assert_eq!(json["failure_reason"], "insufficient_funds");
        assert_eq!(json["from_account"], 1);
        assert!(json["to_account"].is_null());
    }
}
