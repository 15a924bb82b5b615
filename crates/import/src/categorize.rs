use chrono::Utc;
use regex::Regex;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashSet;

use saldo_core::{CategorizationRule, RuleId, UserId, LEARNED_CONFIDENCE};

use crate::normalize::title_case;

/// Where a suggestion came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionSource {
    User,
    Learned,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VendorSuggestion {
    pub vendor: String,
    pub confidence: f64,
    pub source: SuggestionSource,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySuggestion {
    pub category: String,
    pub subcategory: Option<String>,
    pub confidence: f64,
    pub source: SuggestionSource,
}

/// Everything `suggest` returns for one description. `matched` carries the
/// full rules in surfaced order so callers can record usage against them.
#[derive(Debug, Clone, Default)]
pub struct Suggestions {
    pub vendors: Vec<VendorSuggestion>,
    pub categories: Vec<CategorySuggestion>,
    pub matched: Vec<CategorizationRule>,
}

impl Suggestions {
    pub fn is_empty(&self) -> bool {
        self.matched.is_empty()
    }

    pub fn matched_ids(&self) -> Vec<RuleId> {
        self.matched.iter().filter_map(|r| r.id).collect()
    }

    /// The suggestion surfaced first, if any.
    pub fn top_category(&self) -> Option<&CategorySuggestion> {
        self.categories.first()
    }
}

struct CompiledRule {
    rule: CategorizationRule,
    // Invalid globs never match rather than poisoning the whole engine.
    pattern: Option<Regex>,
}

impl CompiledRule {
    fn matches(&self, description: &str, scope: Option<&str>) -> bool {
        let scope_ok = match (&self.rule.scope, scope) {
            (None, _) => true,
            (Some(rule_scope), Some(given)) => rule_scope.eq_ignore_ascii_case(given),
            (Some(_), None) => false,
        };
        scope_ok
            && self
                .pattern
                .as_ref()
                .is_some_and(|re| re.is_match(description))
    }
}

/// One user's rule set, with glob patterns precompiled at construction.
///
/// `suggest` is pure. Callers that want the classic categorize behavior,
/// where every lookup counts as a use, must follow up with `record_usage`
/// against the rule repository.
pub struct CategorizationEngine {
    rules: Vec<CompiledRule>,
}

impl CategorizationEngine {
    pub fn new(rules: Vec<CategorizationRule>) -> Self {
        let rules = rules
            .into_iter()
            .map(|rule| {
                let pattern = compile_glob(&rule.pattern).ok();
                CompiledRule { rule, pattern }
            })
            .collect();
        Self { rules }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Matches `description` against every rule visible in `scope` and
    /// returns deduplicated vendor and category suggestions, best first.
    pub fn suggest(&self, description: &str, scope: Option<&str>) -> Suggestions {
        let mut matched: Vec<&CategorizationRule> = self
            .rules
            .iter()
            .filter(|compiled| compiled.matches(description, scope))
            .map(|compiled| &compiled.rule)
            .collect();
        matched.sort_by(|a, b| rule_order(a, b));

        let mut vendors = Vec::new();
        let mut seen_vendors = HashSet::new();
        let mut categories = Vec::new();
        let mut seen_categories = HashSet::new();

        for rule in &matched {
            let source = if rule.user_defined {
                SuggestionSource::User
            } else {
                SuggestionSource::Learned
            };

            if seen_vendors.insert(rule.vendor.to_lowercase()) {
                vendors.push(VendorSuggestion {
                    vendor: rule.vendor.clone(),
                    confidence: rule.confidence,
                    source,
                });
            }

            let category_key = (
                rule.category.to_lowercase(),
                rule.subcategory.as_deref().map(str::to_lowercase),
            );
            if seen_categories.insert(category_key) {
                categories.push(CategorySuggestion {
                    category: rule.category.clone(),
                    subcategory: rule.subcategory.clone(),
                    confidence: rule.confidence,
                    source,
                });
            }
        }

        Suggestions {
            vendors,
            categories,
            matched: matched.into_iter().cloned().collect(),
        }
    }
}

/// User-defined rules outrank learned ones; then higher confidence, heavier
/// use, and most recent use, in that order.
fn rule_order(a: &CategorizationRule, b: &CategorizationRule) -> Ordering {
    b.user_defined
        .cmp(&a.user_defined)
        .then(
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(Ordering::Equal),
        )
        .then(b.use_count.cmp(&a.use_count))
        .then(b.last_used.cmp(&a.last_used))
}

/// `*`/`?` glob → case-insensitive regex, unanchored: the pattern
/// `WALMART` matches anywhere inside "WALMART STORE #123".
fn compile_glob(glob: &str) -> Result<Regex, regex::Error> {
    let mut pattern = String::with_capacity(glob.len() + 8);
    pattern.push_str("(?i)");
    for ch in glob.chars() {
        match ch {
            '*' => pattern.push_str(".*"),
            '?' => pattern.push('.'),
            other => pattern.push_str(&regex::escape(&other.to_string())),
        }
    }
    Regex::new(&pattern)
}

/// Derives a learned rule from a corrected transaction: digit runs become
/// `*` so store numbers generalize, whitespace collapses, and the vendor is
/// the de-numbered description. Returns `None` for blank descriptions.
pub fn derive_rule(
    user_id: UserId,
    description: &str,
    category: &str,
    subcategory: Option<&str>,
) -> Option<CategorizationRule> {
    let description = description.trim();
    if description.is_empty() {
        return None;
    }

    Some(CategorizationRule {
        id: None,
        user_id,
        pattern: generalize_digits(description),
        vendor: vendor_from_description(description),
        category: category.to_string(),
        subcategory: subcategory.map(|s| s.to_string()),
        scope: None,
        confidence: LEARNED_CONFIDENCE,
        user_defined: true,
        use_count: 1,
        last_used: Some(Utc::now()),
    })
}

fn generalize_digits(description: &str) -> String {
    let mut out = String::with_capacity(description.len());
    let mut in_digits = false;
    for ch in description.chars() {
        if ch.is_ascii_digit() {
            if !in_digits {
                out.push('*');
                in_digits = true;
            }
        } else {
            out.push(ch);
            in_digits = false;
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn vendor_from_description(description: &str) -> String {
    let stripped: String = description
        .chars()
        .filter(|c| !c.is_ascii_digit())
        .collect();
    let collapsed = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    title_case(collapsed.trim_end_matches(|c: char| !c.is_alphanumeric()).trim())
}
