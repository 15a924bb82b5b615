use thiserror::Error;

use saldo_core::AccountId;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("account not found: {0}")]
    AccountNotFound(AccountId),
    #[error("transaction not found: {0}")]
    TransactionNotFound(i64),
    #[error("rule not found: {0}")]
    RuleNotFound(i64),
    #[error("not authorized")]
    NotAuthorized,
}
