use chrono::Utc;

use saldo_core::{CategorizationRule, RuleId, UserId};

use crate::db::{decode_timestamp, encode_timestamp, DbPool};
use crate::error::StorageError;

type RuleRow = (
    i64,
    i64,
    String,
    String,
    String,
    Option<String>,
    Option<String>,
    f64,
    i64,
    i64,
    Option<String>,
);

const RULE_COLUMNS: &str = "id, user_id, pattern, vendor, category, subcategory, scope, \
     confidence, user_defined, use_count, last_used";

fn map_rule(row: RuleRow) -> CategorizationRule {
    CategorizationRule {
        id: Some(RuleId(row.0)),
        user_id: UserId(row.1),
        pattern: row.2,
        vendor: row.3,
        category: row.4,
        subcategory: row.5,
        scope: row.6,
        confidence: row.7,
        user_defined: row.8 != 0,
        use_count: row.9,
        last_used: row.10.as_deref().and_then(decode_timestamp),
    }
}

/// One user's full rule set, oldest first. Callers hand this to the
/// categorization engine, which does its own ordering.
pub async fn rules_for_user(
    pool: &DbPool,
    user: UserId,
) -> Result<Vec<CategorizationRule>, StorageError> {
    let rows = sqlx::query_as::<_, RuleRow>(&format!(
        "SELECT {RULE_COLUMNS} FROM categorization_rules WHERE user_id = ? ORDER BY id"
    ))
    .bind(user.0)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(map_rule).collect())
}

pub async fn insert_rule(
    pool: &DbPool,
    rule: &CategorizationRule,
) -> Result<CategorizationRule, StorageError> {
    let row = sqlx::query_as::<_, RuleRow>(&format!(
        "INSERT INTO categorization_rules \
         (user_id, pattern, vendor, category, subcategory, scope, confidence, user_defined, use_count, last_used) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING {RULE_COLUMNS}"
    ))
    .bind(rule.user_id.0)
    .bind(&rule.pattern)
    .bind(&rule.vendor)
    .bind(&rule.category)
    .bind(&rule.subcategory)
    .bind(&rule.scope)
    .bind(rule.confidence)
    .bind(rule.user_defined as i64)
    .bind(rule.use_count)
    .bind(rule.last_used.map(encode_timestamp))
    .fetch_one(pool)
    .await?;

    Ok(map_rule(row))
}

/// Full-row update of an existing rule the user owns.
pub async fn update_rule(
    pool: &DbPool,
    rule: &CategorizationRule,
) -> Result<(), StorageError> {
    let id = rule.id.ok_or(StorageError::RuleNotFound(0))?;
    let result = sqlx::query(
        "UPDATE categorization_rules SET pattern = ?, vendor = ?, category = ?, \
         subcategory = ?, scope = ?, confidence = ?, user_defined = ?, use_count = ?, last_used = ? \
         WHERE id = ? AND user_id = ?",
    )
    .bind(&rule.pattern)
    .bind(&rule.vendor)
    .bind(&rule.category)
    .bind(&rule.subcategory)
    .bind(&rule.scope)
    .bind(rule.confidence)
    .bind(rule.user_defined as i64)
    .bind(rule.use_count)
    .bind(rule.last_used.map(encode_timestamp))
    .bind(id.0)
    .bind(rule.user_id.0)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StorageError::RuleNotFound(id.0));
    }
    Ok(())
}

/// Returns whether a rule was actually removed; foreign ids delete nothing.
pub async fn remove_rule(
    pool: &DbPool,
    id: RuleId,
    user: UserId,
) -> Result<bool, StorageError> {
    let result = sqlx::query("DELETE FROM categorization_rules WHERE id = ? AND user_id = ?")
        .bind(id.0)
        .bind(user.0)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Bumps use counters for every rule that just matched a lookup. This is
/// the mutating half of the categorize contract.
pub async fn record_usage(pool: &DbPool, ids: &[RuleId]) -> Result<(), StorageError> {
    if ids.is_empty() {
        return Ok(());
    }
    let now = encode_timestamp(Utc::now());
    let mut tx = pool.begin().await?;
    for id in ids {
        sqlx::query(
            "UPDATE categorization_rules SET use_count = use_count + 1, last_used = ? WHERE id = ?",
        )
        .bind(&now)
        .bind(id.0)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(())
}

/// Persists a learned rule, merging into an existing rule with the same
/// derived pattern instead of piling up duplicates: the correction refreshes
/// vendor/category and bumps the use count.
pub async fn upsert_learned(
    pool: &DbPool,
    rule: &CategorizationRule,
) -> Result<CategorizationRule, StorageError> {
    let existing: Option<(i64,)> = sqlx::query_as(
        "SELECT id FROM categorization_rules WHERE user_id = ? AND pattern = ?",
    )
    .bind(rule.user_id.0)
    .bind(&rule.pattern)
    .fetch_optional(pool)
    .await?;

    match existing {
        Some((id,)) => {
            let row = sqlx::query_as::<_, RuleRow>(&format!(
                "UPDATE categorization_rules SET vendor = ?, category = ?, subcategory = ?, \
                 use_count = use_count + 1, last_used = ? WHERE id = ? RETURNING {RULE_COLUMNS}"
            ))
            .bind(&rule.vendor)
            .bind(&rule.category)
            .bind(&rule.subcategory)
            .bind(encode_timestamp(Utc::now()))
            .bind(id)
            .fetch_one(pool)
            .await?;
            Ok(map_rule(row))
        }
        None => insert_rule(pool, rule).await,
    }
}
