use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::account::{AccountId, AccountKind, UserId};
use super::money::Money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DraftId(pub i64);

impl fmt::Display for DraftId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId(pub i64);

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Income,
    Expense,
}

impl TransactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionKind::Income => "income",
            TransactionKind::Expense => "expense",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An unconfirmed staged row awaiting review. `amount` is always a
/// non-negative magnitude; the sign lives entirely in `kind`. `raw_row`
/// preserves the source row verbatim for audit and debugging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionDraft {
    pub id: Option<DraftId>,
    pub user_id: UserId,
    pub account_id: Option<AccountId>,
    pub date: NaiveDate,
    pub description: String,
    pub category: String,
    pub amount: Money,
    pub kind: TransactionKind,
    pub raw_row: String,
    /// Provenance, e.g. "csv" or "manual".
    pub source: String,
    pub bank_name: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// A committed ledger row. Immutable once created except for `category`
/// (every change is audited) and soft deletion via `deleted_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Option<TransactionId>,
    pub user_id: UserId,
    pub account_id: Option<AccountId>,
    pub date: NaiveDate,
    pub description: String,
    pub category: String,
    pub amount: Money,
    pub kind: TransactionKind,
    pub raw_row: String,
    pub source: String,
    pub bank_name: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// The one place ledger signs are decided: how much committing a transaction
/// moves its account's balance. A credit purchase increases what is owed; a
/// payment against the card reduces it.
pub fn balance_delta(account: AccountKind, kind: TransactionKind, amount: Money) -> Money {
    let magnitude = amount.abs();
    match (account.is_credit(), kind) {
        (false, TransactionKind::Income) => magnitude,
        (false, TransactionKind::Expense) => -magnitude,
        (true, TransactionKind::Expense) => magnitude,
        (true, TransactionKind::Income) => -magnitude,
    }
}
