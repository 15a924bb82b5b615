use saldo_core::{CategoryChange, Transaction, TransactionId, UserId};
use saldo_import::title_case;

use crate::db::{decode_timestamp, DbPool};
use crate::error::StorageError;
use crate::ledger::{map_transaction, TxRow, TX_COLUMNS};

type ChangeRow = (i64, i64, i64, String, String, String);

fn map_change(row: ChangeRow) -> CategoryChange {
    CategoryChange {
        id: Some(row.0),
        transaction_id: TransactionId(row.1),
        user_id: UserId(row.2),
        old_category: row.3,
        new_category: row.4,
        changed_at: decode_timestamp(&row.5),
    }
}

/// Changes a committed transaction's category and appends the audit record
/// in the same database transaction, so the trail can never diverge from
/// the ledger. The transaction must belong to `user`.
pub async fn recategorize(
    pool: &DbPool,
    id: TransactionId,
    new_category: &str,
    user: UserId,
) -> Result<Transaction, StorageError> {
    let mut tx = pool.begin().await?;

    let row: Option<(i64, String)> = sqlx::query_as(
        "SELECT user_id, category FROM transactions WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(id.0)
    .fetch_optional(&mut *tx)
    .await?;
    let (owner, old_category) = row.ok_or(StorageError::TransactionNotFound(id.0))?;
    if owner != user.0 {
        return Err(StorageError::NotAuthorized);
    }

    let new_category = title_case(new_category);

    let updated = sqlx::query_as::<_, TxRow>(&format!(
        "UPDATE transactions SET category = ?, updated_at = datetime('now') \
         WHERE id = ? RETURNING {TX_COLUMNS}"
    ))
    .bind(&new_category)
    .bind(id.0)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query(
        "INSERT INTO category_changes (transaction_id, user_id, old_category, new_category) \
         VALUES (?, ?, ?, ?)",
    )
    .bind(id.0)
    .bind(user.0)
    .bind(&old_category)
    .bind(&new_category)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(map_transaction(updated))
}

/// Full change history for one transaction, oldest first. Analytics only;
/// nothing on the ingestion path reads this.
pub async fn changes_for(
    pool: &DbPool,
    id: TransactionId,
) -> Result<Vec<CategoryChange>, StorageError> {
    let rows = sqlx::query_as::<_, ChangeRow>(
        "SELECT id, transaction_id, user_id, old_category, new_category, changed_at \
         FROM category_changes WHERE transaction_id = ? ORDER BY id",
    )
    .bind(id.0)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(map_change).collect())
}
