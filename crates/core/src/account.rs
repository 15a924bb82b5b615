use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::money::Money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(pub i64);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Error)]
#[error("unknown account kind: '{0}'")]
pub struct ParseAccountKindError(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    Checking,
    Savings,
    Credit,
    Investment,
}

impl AccountKind {
    /// Credit accounts track a balance owed, which inverts every sign rule
    /// in the pipeline.
    pub fn is_credit(self) -> bool {
        matches!(self, AccountKind::Credit)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AccountKind::Checking => "checking",
            AccountKind::Savings => "savings",
            AccountKind::Credit => "credit",
            AccountKind::Investment => "investment",
        }
    }
}

impl FromStr for AccountKind {
    type Err = ParseAccountKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "checking" => Ok(AccountKind::Checking),
            // Older exports used "debit" for checking accounts.
            "debit" => Ok(AccountKind::Checking),
            "savings" => Ok(AccountKind::Savings),
            "credit" => Ok(AccountKind::Credit),
            "investment" => Ok(AccountKind::Investment),
            other => Err(ParseAccountKindError(other.to_string())),
        }
    }
}

impl fmt::Display for AccountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A bank account owned by one user. `balance` is only ever mutated by the
/// commit coordinator or an explicit recalculation, never by ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: Option<AccountId>,
    pub user_id: UserId,
    pub name: String,
    pub kind: AccountKind,
    pub institution: String,
    /// Masked card/account suffix, e.g. "4821".
    pub last_four: String,
    pub color: String,
    pub balance: Money,
}

impl Account {
    pub fn new(user_id: UserId, name: &str, kind: AccountKind) -> Self {
        Account {
            id: None,
            user_id,
            name: name.to_string(),
            kind,
            institution: String::new(),
            last_four: String::new(),
            color: String::new(),
            balance: Money::zero(),
        }
    }
}
