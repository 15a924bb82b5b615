use sha2::{Digest, Sha256};

use saldo_core::{AccountId, UserId};

use crate::db::DbPool;
use crate::error::StorageError;

/// Lowercase hex SHA-256 of a statement file's bytes. Two exports with the
/// same checksum are the same statement.
pub fn file_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

pub async fn file_already_imported(
    pool: &DbPool,
    user: UserId,
    account_id: AccountId,
    sha256: &str,
) -> Result<bool, StorageError> {
    let (exists,): (i64,) = sqlx::query_as(
        "SELECT EXISTS(SELECT 1 FROM imported_files \
         WHERE user_id = ? AND account_id = ? AND sha256 = ?)",
    )
    .bind(user.0)
    .bind(account_id.0)
    .bind(sha256)
    .fetch_one(pool)
    .await?;
    Ok(exists != 0)
}

pub async fn record_imported_file(
    pool: &DbPool,
    user: UserId,
    account_id: AccountId,
    file_name: &str,
    sha256: &str,
) -> Result<(), StorageError> {
    sqlx::query(
        "INSERT OR IGNORE INTO imported_files (user_id, account_id, file_name, sha256) \
         VALUES (?, ?, ?, ?)",
    )
    .bind(user.0)
    .bind(account_id.0)
    .bind(file_name)
    .bind(sha256)
    .execute(pool)
    .await?;
    Ok(())
}
