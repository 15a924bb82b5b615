use saldo_core::{Account, AccountId, Money, UserId};

use crate::db::{decode_account_kind, DbPool};
use crate::error::StorageError;

type AccountRow = (i64, i64, String, String, String, String, String, i64);

const ACCOUNT_COLUMNS: &str =
    "id, user_id, name, kind, institution, last_four, color, balance_cents";

fn map_account(row: AccountRow) -> Account {
    Account {
        id: Some(AccountId(row.0)),
        user_id: UserId(row.1),
        name: row.2,
        kind: decode_account_kind(&row.3),
        institution: row.4,
        last_four: row.5,
        color: row.6,
        balance: Money::from_cents(row.7),
    }
}

pub async fn insert_account(pool: &DbPool, account: &Account) -> Result<Account, StorageError> {
    let row = sqlx::query_as::<_, AccountRow>(&format!(
        "INSERT INTO accounts (user_id, name, kind, institution, last_four, color, balance_cents) \
         VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING {ACCOUNT_COLUMNS}"
    ))
    .bind(account.user_id.0)
    .bind(&account.name)
    .bind(account.kind.as_str())
    .bind(&account.institution)
    .bind(&account.last_four)
    .bind(&account.color)
    .bind(account.balance.to_cents())
    .fetch_one(pool)
    .await?;

    Ok(map_account(row))
}

pub async fn get_account(
    pool: &DbPool,
    id: AccountId,
) -> Result<Option<Account>, StorageError> {
    let row = sqlx::query_as::<_, AccountRow>(&format!(
        "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?"
    ))
    .bind(id.0)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(map_account))
}
