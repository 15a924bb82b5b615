use saldo_core::{AccountId, DraftId, Money, TransactionDraft, UserId};
use saldo_import::{fallback_category, title_case};

use crate::db::{decode_date, decode_timestamp, decode_tx_kind, DbPool};
use crate::error::StorageError;

type DraftRow = (
    i64,
    i64,
    Option<i64>,
    String,
    String,
    String,
    i64,
    String,
    String,
    String,
    Option<String>,
    String,
);

const DRAFT_COLUMNS: &str = "id, user_id, account_id, date, description, category, \
     amount_cents, kind, raw_row, source, bank_name, created_at";

fn map_draft(row: DraftRow) -> TransactionDraft {
    TransactionDraft {
        id: Some(DraftId(row.0)),
        user_id: UserId(row.1),
        account_id: row.2.map(AccountId),
        date: decode_date(&row.3),
        description: row.4,
        category: row.5,
        amount: Money::from_cents(row.6),
        kind: decode_tx_kind(&row.7),
        raw_row: row.8,
        source: row.9,
        bank_name: row.10,
        created_at: decode_timestamp(&row.11),
    }
}

/// Persists a draft for review. Text fields go through the canonical
/// normalization (a no-op for already-normalized input) and an absent
/// category is filled from the keyword fallback so no draft ever surfaces
/// uncategorized.
pub async fn insert_staged(
    pool: &DbPool,
    draft: &TransactionDraft,
) -> Result<TransactionDraft, StorageError> {
    let description = title_case(&draft.description);
    let category = if draft.category.trim().is_empty() {
        fallback_category(&description).to_string()
    } else {
        title_case(&draft.category)
    };

    let row = sqlx::query_as::<_, DraftRow>(&format!(
        "INSERT INTO staged_transactions \
         (user_id, account_id, date, description, category, amount_cents, kind, raw_row, source, bank_name) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING {DRAFT_COLUMNS}"
    ))
    .bind(draft.user_id.0)
    .bind(draft.account_id.map(|a| a.0))
    .bind(draft.date.to_string())
    .bind(&description)
    .bind(&category)
    .bind(draft.amount.abs().to_cents())
    .bind(draft.kind.as_str())
    .bind(&draft.raw_row)
    .bind(&draft.source)
    .bind(&draft.bank_name)
    .fetch_one(pool)
    .await?;

    Ok(map_draft(row))
}

/// All of one user's pending drafts, most recent transaction date first.
pub async fn list_staged(
    pool: &DbPool,
    user: UserId,
) -> Result<Vec<TransactionDraft>, StorageError> {
    let rows = sqlx::query_as::<_, DraftRow>(&format!(
        "SELECT {DRAFT_COLUMNS} FROM staged_transactions \
         WHERE user_id = ? ORDER BY date DESC, id DESC"
    ))
    .bind(user.0)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(map_draft).collect())
}

/// Deletes the listed drafts, ignoring ids the user does not own. Returns
/// how many rows actually went away.
pub async fn discard_staged(
    pool: &DbPool,
    ids: &[DraftId],
    user: UserId,
) -> Result<u64, StorageError> {
    let mut tx = pool.begin().await?;
    let mut deleted = 0u64;
    for id in ids {
        deleted += sqlx::query("DELETE FROM staged_transactions WHERE id = ? AND user_id = ?")
            .bind(id.0)
            .bind(user.0)
            .execute(&mut *tx)
            .await?
            .rows_affected();
    }
    tx.commit().await?;
    Ok(deleted)
}

/// Loads one draft for the commit path, inside the caller's transaction.
/// Foreign and unknown ids come back as `None` so a batch can skip them
/// silently.
pub(crate) async fn get_staged_owned(
    executor: &mut sqlx::SqliteConnection,
    id: DraftId,
    user: UserId,
) -> Result<Option<TransactionDraft>, StorageError> {
    let row = sqlx::query_as::<_, DraftRow>(&format!(
        "SELECT {DRAFT_COLUMNS} FROM staged_transactions WHERE id = ? AND user_id = ?"
    ))
    .bind(id.0)
    .bind(user.0)
    .fetch_optional(executor)
    .await?;

    Ok(row.map(map_draft))
}
