use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;

use saldo_core::{AccountKind, TransactionKind};

pub type DbPool = Pool<Sqlite>;

pub async fn create_db(path: &Path) -> Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous = NORMAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS accounts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            kind TEXT NOT NULL,
            institution TEXT NOT NULL DEFAULT '',
            last_four TEXT NOT NULL DEFAULT '',
            color TEXT NOT NULL DEFAULT '',
            balance_cents INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS transactions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            account_id INTEGER REFERENCES accounts(id),
            date TEXT NOT NULL,
            description TEXT NOT NULL,
            category TEXT NOT NULL,
            amount_cents INTEGER NOT NULL CHECK (amount_cents >= 0),
            kind TEXT NOT NULL CHECK (kind IN ('income', 'expense')),
            raw_row TEXT NOT NULL DEFAULT '',
            source TEXT NOT NULL DEFAULT 'csv',
            bank_name TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            deleted_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    // The ledger's dedup invariant: one live row per (user, day,
    // description, amount, account).
    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_transactions_dedup
            ON transactions (user_id, date, description, amount_cents, account_id)
            WHERE deleted_at IS NULL
        "#,
    )
    .execute(pool)
    .await?;

    // Staging rows are transient pre-review data; the account reference is
    // validated at commit time, not here.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS staged_transactions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            account_id INTEGER,
            date TEXT NOT NULL,
            description TEXT NOT NULL,
            category TEXT NOT NULL,
            amount_cents INTEGER NOT NULL CHECK (amount_cents >= 0),
            kind TEXT NOT NULL CHECK (kind IN ('income', 'expense')),
            raw_row TEXT NOT NULL DEFAULT '',
            source TEXT NOT NULL DEFAULT 'csv',
            bank_name TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS categorization_rules (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            pattern TEXT NOT NULL,
            vendor TEXT NOT NULL,
            category TEXT NOT NULL,
            subcategory TEXT,
            scope TEXT,
            confidence REAL NOT NULL DEFAULT 1.0,
            user_defined INTEGER NOT NULL DEFAULT 1,
            use_count INTEGER NOT NULL DEFAULT 0,
            last_used TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS category_changes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            transaction_id INTEGER NOT NULL REFERENCES transactions(id),
            user_id INTEGER NOT NULL,
            old_category TEXT NOT NULL,
            new_category TEXT NOT NULL,
            changed_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS imported_files (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            account_id INTEGER NOT NULL,
            file_name TEXT NOT NULL,
            sha256 TEXT NOT NULL,
            imported_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE (user_id, account_id, sha256)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

// ── column decoding ──────────────────────────────────────────────────────
// Stored values are written by this crate, so decoding is forgiving rather
// than fallible.

pub(crate) fn decode_account_kind(raw: &str) -> AccountKind {
    AccountKind::from_str(raw).unwrap_or(AccountKind::Checking)
}

pub(crate) fn decode_tx_kind(raw: &str) -> TransactionKind {
    if raw == "income" {
        TransactionKind::Income
    } else {
        TransactionKind::Expense
    }
}

pub(crate) fn decode_date(raw: &str) -> NaiveDate {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap_or_default()
}

pub(crate) fn decode_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|dt| dt.and_utc())
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        })
}

pub(crate) fn encode_timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}
