use saldo_core::{balance_delta, AccountId, DraftId, Money, Transaction, UserId};

use crate::db::{decode_account_kind, DbPool};
use crate::error::StorageError;
use crate::{ledger, staging};

/// Converts the selected staged drafts into permanent ledger rows, adjusts
/// account balances, and removes the drafts, all inside one database
/// transaction. Any failure rolls the whole batch back: no ledger rows, no
/// balance movement, drafts untouched.
///
/// Foreign and unknown draft ids are skipped silently. A draft that would
/// duplicate an already-committed transaction is left staged and omitted
/// from the result, with a warning.
pub async fn commit_staged(
    pool: &DbPool,
    draft_ids: &[DraftId],
    user: UserId,
) -> Result<Vec<Transaction>, StorageError> {
    let mut tx = pool.begin().await?;
    let mut committed = Vec::new();

    for &draft_id in draft_ids {
        let Some(draft) = staging::get_staged_owned(&mut *tx, draft_id, user).await? else {
            continue;
        };

        if ledger::is_duplicate(
            &mut *tx,
            user,
            draft.date,
            &draft.description,
            draft.amount,
            draft.account_id,
        )
        .await?
        {
            tracing::warn!(
                draft_id = draft_id.0,
                description = %draft.description,
                "draft duplicates a committed transaction; leaving it staged"
            );
            continue;
        }

        // Resolve the account before writing anything so a dangling
        // reference aborts the batch cleanly.
        let account_kind = match draft.account_id {
            Some(account_id) => {
                let row: Option<(String,)> =
                    sqlx::query_as("SELECT kind FROM accounts WHERE id = ?")
                        .bind(account_id.0)
                        .fetch_optional(&mut *tx)
                        .await?;
                let (kind,) = row.ok_or(StorageError::AccountNotFound(account_id))?;
                Some((account_id, decode_account_kind(&kind)))
            }
            None => None,
        };

        let transaction = ledger::insert_from_draft(&mut *tx, &draft).await?;

        if let Some((account_id, kind)) = account_kind {
            let delta = balance_delta(kind, draft.kind, draft.amount);
            // Increment in SQL so concurrent batches on the same account
            // cannot lose updates.
            sqlx::query("UPDATE accounts SET balance_cents = balance_cents + ? WHERE id = ?")
                .bind(delta.to_cents())
                .bind(account_id.0)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query("DELETE FROM staged_transactions WHERE id = ?")
            .bind(draft_id.0)
            .execute(&mut *tx)
            .await?;

        committed.push(transaction);
    }

    tx.commit().await?;
    Ok(committed)
}

/// Recomputes an account's balance from its full live transaction history,
/// using the same sign rule as `commit_staged`. The stored balance is only
/// overwritten when it drifted. Returns the recomputed balance.
pub async fn recalculate(pool: &DbPool, account_id: AccountId) -> Result<Money, StorageError> {
    let mut tx = pool.begin().await?;

    let row: Option<(String, i64)> =
        sqlx::query_as("SELECT kind, balance_cents FROM accounts WHERE id = ?")
            .bind(account_id.0)
            .fetch_optional(&mut *tx)
            .await?;
    let (kind_raw, stored_cents) = row.ok_or(StorageError::AccountNotFound(account_id))?;
    let kind = decode_account_kind(&kind_raw);

    let rows: Vec<(i64, String)> = sqlx::query_as(
        "SELECT amount_cents, kind FROM transactions \
         WHERE account_id = ? AND deleted_at IS NULL",
    )
    .bind(account_id.0)
    .fetch_all(&mut *tx)
    .await?;

    let total = rows
        .into_iter()
        .map(|(cents, tx_kind)| {
            balance_delta(
                kind,
                crate::db::decode_tx_kind(&tx_kind),
                Money::from_cents(cents),
            )
        })
        .sum::<Money>();

    if total.to_cents() != stored_cents {
        tracing::info!(
            account = account_id.0,
            stored = stored_cents,
            recomputed = total.to_cents(),
            "repairing drifted account balance"
        );
        sqlx::query("UPDATE accounts SET balance_cents = ? WHERE id = ?")
            .bind(total.to_cents())
            .bind(account_id.0)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(total)
}
