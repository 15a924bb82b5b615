use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::account::UserId;
use super::transaction::TransactionId;

/// Confidence assigned to rules created by the learning step.
pub const LEARNED_CONFIDENCE: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuleId(pub i64);

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A pattern-to-vendor/category mapping. `pattern` is a `*`/`?` glob matched
/// case-insensitively anywhere inside a transaction description. Rules are
/// never deleted automatically; `use_count` only ever grows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorizationRule {
    pub id: Option<RuleId>,
    pub user_id: UserId,
    pub pattern: String,
    pub vendor: String,
    pub category: String,
    pub subcategory: Option<String>,
    /// Restricts the rule to one account/source; `None` matches everywhere.
    pub scope: Option<String>,
    /// In [0, 1].
    pub confidence: f64,
    pub user_defined: bool,
    pub use_count: i64,
    pub last_used: Option<DateTime<Utc>>,
}

impl CategorizationRule {
    /// An explicitly user-created rule: full confidence, unused so far.
    pub fn new(user_id: UserId, pattern: &str, vendor: &str, category: &str) -> Self {
        CategorizationRule {
            id: None,
            user_id,
            pattern: pattern.to_string(),
            vendor: vendor.to_string(),
            category: category.to_string(),
            subcategory: None,
            scope: None,
            confidence: 1.0,
            user_defined: true,
            use_count: 0,
            last_used: None,
        }
    }

    pub fn with_subcategory(mut self, subcategory: &str) -> Self {
        self.subcategory = Some(subcategory.to_string());
        self
    }

    pub fn with_scope(mut self, scope: &str) -> Self {
        self.scope = Some(scope.to_string());
        self
    }
}

/// Append-only audit record of one category change. Written whenever a
/// committed transaction is recategorized; read only by analytics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryChange {
    pub id: Option<i64>,
    pub transaction_id: TransactionId,
    pub user_id: UserId,
    pub old_category: String,
    pub new_category: String,
    pub changed_at: Option<DateTime<Utc>>,
}
