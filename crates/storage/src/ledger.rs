use chrono::NaiveDate;
use sqlx::Sqlite;

use saldo_core::{
    AccountId, Money, Transaction, TransactionDraft, TransactionId, UserId,
};

use crate::db::{decode_date, decode_timestamp, decode_tx_kind, DbPool};
use crate::error::StorageError;

pub(crate) type TxRow = (
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
    String,
    Option<String>,
);

pub(crate) const TX_COLUMNS: &str = "id, user_id, account_id, date, description, category, \
     amount_cents, kind, raw_row, source, bank_name, created_at, updated_at, deleted_at";

pub(crate) fn map_transaction(row: TxRow) -> Transaction {
    Transaction {
        id: Some(TransactionId(row.0)),
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
        updated_at: decode_timestamp(&row.12),
        deleted_at: row.13.as_deref().and_then(decode_timestamp),
    }
}

/// True when a live committed transaction already carries the candidate's
/// `(day, description, amount, account)` tuple for this user. Read-only;
/// callers decide whether to skip or warn.
pub async fn is_duplicate<'e, E>(
    executor: E,
    user: UserId,
    date: NaiveDate,
    description: &str,
    amount: Money,
    account_id: Option<AccountId>,
) -> Result<bool, StorageError>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let (exists,): (i64,) = sqlx::query_as(
        "SELECT EXISTS(SELECT 1 FROM transactions \
         WHERE user_id = ? AND date = ? AND description = ? \
           AND amount_cents = ? AND account_id IS ? AND deleted_at IS NULL)",
    )
    .bind(user.0)
    .bind(date.to_string())
    .bind(description)
    .bind(amount.to_cents())
    .bind(account_id.map(|a| a.0))
    .fetch_one(executor)
    .await?;

    Ok(exists != 0)
}

/// Inserts a permanent ledger row built from a staged draft's fields.
pub(crate) async fn insert_from_draft<'e, E>(
    executor: E,
    draft: &TransactionDraft,
) -> Result<Transaction, StorageError>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, TxRow>(&format!(
        "INSERT INTO transactions \
         (user_id, account_id, date, description, category, amount_cents, kind, raw_row, source, bank_name) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING {TX_COLUMNS}"
    ))
    .bind(draft.user_id.0)
    .bind(draft.account_id.map(|a| a.0))
    .bind(draft.date.to_string())
    .bind(&draft.description)
    .bind(&draft.category)
    .bind(draft.amount.to_cents())
    .bind(draft.kind.as_str())
    .bind(&draft.raw_row)
    .bind(&draft.source)
    .bind(&draft.bank_name)
    .fetch_one(executor)
    .await?;

    Ok(map_transaction(row))
}

pub async fn get_transaction(
    pool: &DbPool,
    id: TransactionId,
) -> Result<Option<Transaction>, StorageError> {
    let row = sqlx::query_as::<_, TxRow>(&format!(
        "SELECT {TX_COLUMNS} FROM transactions WHERE id = ? AND deleted_at IS NULL"
    ))
    .bind(id.0)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(map_transaction))
}

pub async fn list_for_account(
    pool: &DbPool,
    account_id: AccountId,
) -> Result<Vec<Transaction>, StorageError> {
    let rows = sqlx::query_as::<_, TxRow>(&format!(
        "SELECT {TX_COLUMNS} FROM transactions \
         WHERE account_id = ? AND deleted_at IS NULL ORDER BY date DESC, id DESC"
    ))
    .bind(account_id.0)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(map_transaction).collect())
}

/// Soft-deletes a transaction the user owns. The row stays behind for audit
/// history but vanishes from every live query, including duplicate checks.
pub async fn soft_delete(
    pool: &DbPool,
    id: TransactionId,
    user: UserId,
) -> Result<(), StorageError> {
    let result = sqlx::query(
        "UPDATE transactions SET deleted_at = datetime('now'), updated_at = datetime('now') \
         WHERE id = ? AND user_id = ? AND deleted_at IS NULL",
    )
    .bind(id.0)
    .bind(user.0)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StorageError::TransactionNotFound(id.0));
    }
    Ok(())
}
