//! Account entity
//!
//! Holds a party's balance. Identity, number, owner and opening balance are
//! fixed at creation; the balance changes only through the crate-private
//! `credit`/`debit` methods, which the ledger engine calls while holding the
//! account's lock.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::domain::{Amount, AmountError, Balance, DomainError};

/// Store-assigned account identifier. Ordering defines lock acquisition order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub i64);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Data needed to open an account; the store assigns the id
#[derive(Debug, Clone, PartialEq)]
pub struct NewAccount {
    pub number: String,
    pub owner_id: Uuid,
    pub initial_balance: Balance,
}

impl NewAccount {
    pub fn new(number: impl Into<String>, owner_id: Uuid, initial_balance: Balance) -> Self {
        Self {
            number: number.into(),
            owner_id,
            initial_balance,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    id: AccountId,
    number: String,
    initial_balance: Decimal,
    balance: Balance,
    owner_id: Uuid,
    created_at: DateTime<Utc>,
}

impl Account {
    /// Materialise a freshly opened account: balance equals the opening balance
    pub fn open(id: AccountId, new: NewAccount) -> Self {
        Self {
            id,
            number: new.number,
            initial_balance: new.initial_balance.value(),
            balance: new.initial_balance,
            owner_id: new.owner_id,
            created_at: Utc::now(),
        }
    }

    /// Rebuild an account from persisted columns
    pub(crate) fn from_db_state(
        id: i64,
        number: String,
        initial_balance: Decimal,
        balance: Decimal,
        owner_id: Uuid,
        created_at: DateTime<Utc>,
    ) -> Result<Self, AmountError> {
        Ok(Self {
            id: AccountId(id),
            number,
            initial_balance,
            balance: Balance::new(balance)?,
            owner_id,
            created_at,
        })
    }

    /// Add `amount` to the balance
    pub(crate) fn credit(&mut self, amount: &Amount) -> Result<(), DomainError> {
        self.balance = self
            .balance
            .credit(amount)
            .map_err(|_| DomainError::BalanceOverflow)?;
        Ok(())
    }

    /// Subtract `amount` from the balance; refused if it would go negative
    pub(crate) fn debit(&mut self, amount: &Amount) -> Result<(), DomainError> {
        if !self.balance.is_sufficient_for(amount) {
            return Err(DomainError::insufficient_funds(
                amount.value(),
                self.balance.value(),
            ));
        }
        self.balance = self
            .balance
            .debit(amount)
            .map_err(|_| DomainError::insufficient_funds(amount.value(), self.balance.value()))?;
        Ok(())
    }

    /// Put back a balance captured before an uncommitted mutation
    pub(crate) fn restore_balance(&mut self, balance: Balance) {
        self.balance = balance;
    }

    pub fn id(&self) -> AccountId {
        self.id
    }

    pub fn number(&self) -> &str {
        &self.number
    }

    pub fn initial_balance(&self) -> Decimal {
        self.initial_balance
    }

    pub fn balance(&self) -> Balance {
        self.balance
    }

    pub fn owner_id(&self) -> Uuid {
        self.owner_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {{{}}}", self.number, self.owner_id)
    }
}
