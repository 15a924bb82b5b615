use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;
use thiserror::Error;

use saldo_core::{AccountKind, Money, TransactionKind};

use crate::dialect::{AmountSign, Dialect};

#[derive(Error, Debug)]
pub enum RowError {
    #[error("missing column '{0}'")]
    MissingColumn(String),
    #[error("invalid amount: '{0}'")]
    InvalidAmount(String),
}

/// Canonical fields extracted from one statement row. `amount` is the
/// non-negative magnitude; the sign has been folded into `kind`.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRow {
    pub date: NaiveDate,
    pub description: String,
    /// `Some` when the dialect maps a category column (blank cells already
    /// defaulted); `None` when the dialect has no category column at all.
    pub category: Option<String>,
    pub amount: Money,
    pub kind: TransactionKind,
}

/// Case-insensitive header name → column index map for one file.
#[derive(Debug, Clone)]
pub struct HeaderIndex(HashMap<String, usize>);

impl HeaderIndex {
    pub fn new(headers: &csv::StringRecord) -> Self {
        HeaderIndex(
            headers
                .iter()
                .enumerate()
                .map(|(idx, name)| (name.trim().to_lowercase(), idx))
                .collect(),
        )
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.0.get(&name.trim().to_lowercase()).copied()
    }
}

/// Converts one raw CSV row into canonical draft fields.
///
/// Returns `Ok(None)` when the row carries no parseable date. Such rows are
/// skipped rather than failing the import; the caller is expected to log
/// them. A bad amount is a `RowError`: the row is still skippable, but the
/// reason is reported.
///
/// This is the only place amount-sign conventions are decoded; every import
/// path goes through here.
pub fn normalize(
    record: &csv::StringRecord,
    headers: &HeaderIndex,
    dialect: &Dialect,
    account_kind: AccountKind,
) -> Result<Option<NormalizedRow>, RowError> {
    let date_raw = field(record, headers, &dialect.mapping.date).unwrap_or("");
    let Some(date) = parse_date(date_raw, &dialect.date_format) else {
        return Ok(None);
    };

    let amount_raw = field(record, headers, &dialect.mapping.amount)
        .ok_or_else(|| RowError::MissingColumn(dialect.mapping.amount.clone()))?;
    let signed = parse_amount(amount_raw, dialect.amount_sign)?;
    let kind = resolve_kind(signed, account_kind);

    let description = title_case(field(record, headers, &dialect.mapping.description).unwrap_or(""));

    let category = dialect.mapping.category.as_ref().map(|column| {
        let raw = field(record, headers, column).unwrap_or("");
        if raw.trim().is_empty() {
            default_category(kind).to_string()
        } else {
            title_case(raw)
        }
    });

    Ok(Some(NormalizedRow {
        date,
        description,
        category,
        amount: Money::from_decimal(signed.abs()),
        kind,
    }))
}

fn field<'r>(
    record: &'r csv::StringRecord,
    headers: &HeaderIndex,
    name: &str,
) -> Option<&'r str> {
    headers.column(name).and_then(|idx| record.get(idx))
}

fn parse_date(raw: &str, format: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
        return Some(date);
    }

    // Bank exports are not always faithful to their documented format.
    for fallback in &[
        "%m/%d/%Y", "%d/%m/%Y", "%Y/%m/%d", "%m-%d-%Y", "%d-%m-%Y", "%Y-%m-%d",
    ] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, fallback) {
            return Some(date);
        }
    }

    None
}

fn parse_amount(raw: &str, convention: AmountSign) -> Result<Decimal, RowError> {
    let s = raw.trim();

    let (parenthesized, s) = match s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        Some(inner) => (true, inner.trim()),
        None => (false, s),
    };
    if parenthesized && convention == AmountSign::NegativeIsExpense {
        return Err(RowError::InvalidAmount(raw.to_string()));
    }

    let cleaned = s.replace([',', '$', ' '], "");
    if cleaned.is_empty() {
        return Err(RowError::InvalidAmount(raw.to_string()));
    }

    let mut amount =
        Decimal::from_str(&cleaned).map_err(|_| RowError::InvalidAmount(raw.to_string()))?;
    if parenthesized {
        amount = -amount;
    }
    Ok(amount)
}

/// Positive on a credit account means a charge (money owed); everywhere else
/// it means money in.
fn resolve_kind(signed: Decimal, account_kind: AccountKind) -> TransactionKind {
    let positive = signed > Decimal::ZERO;
    if account_kind.is_credit() {
        if positive {
            TransactionKind::Expense
        } else {
            TransactionKind::Income
        }
    } else if positive {
        TransactionKind::Income
    } else {
        TransactionKind::Expense
    }
}

/// Category used when a mapped category cell is blank.
pub fn default_category(kind: TransactionKind) -> &'static str {
    match kind {
        TransactionKind::Expense => "Uncategorized",
        TransactionKind::Income => "Income",
    }
}

/// Canonical text form: internal whitespace collapsed, each word
/// title-cased. Idempotent, so already-normalized text passes through
/// unchanged.
pub fn title_case(raw: &str) -> String {
    raw.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(|c| c.to_lowercase()))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::ColumnMapping;

    fn dialect(amount_sign: AmountSign, category: Option<&str>) -> Dialect {
        Dialect {
            name: "test".to_string(),
            bank: "Test Bank".to_string(),
            mapping: ColumnMapping {
                date: "Date".to_string(),
                description: "Description".to_string(),
                amount: "Amount".to_string(),
                category: category.map(|c| c.to_string()),
            },
            date_format: "%m/%d/%Y".to_string(),
            amount_sign,
            delimiter: ",".to_string(),
            detect_headers: vec![],
        }
    }

    fn row(fields: &[&str]) -> csv::StringRecord {
        csv::StringRecord::from(fields.to_vec())
    }

    fn headers(names: &[&str]) -> HeaderIndex {
        HeaderIndex::new(&row(names))
    }

    fn run(
        fields: &[&str],
        dialect: &Dialect,
        kind: AccountKind,
    ) -> Result<Option<NormalizedRow>, RowError> {
        let h = headers(&["Date", "Description", "Amount", "Category"]);
        normalize(&row(fields), &h, dialect, kind)
    }

    #[test]
    fn credit_account_sign_resolution() {
        // Charges positive, payment negative: the statement scenario from a
        // typical card export.
        let d = dialect(AmountSign::NegativeIsExpense, None);
        let cases = [
            ("12.95", TransactionKind::Expense, 1295),
            ("-20.00", TransactionKind::Income, 2000),
            ("84.99", TransactionKind::Expense, 8499),
        ];
        for (raw, expected_kind, expected_cents) in cases {
            let normalized = run(
                &["01/15/2024", "STORE", raw, ""],
                &d,
                AccountKind::Credit,
            )
            .unwrap()
            .unwrap();
            assert_eq!(normalized.kind, expected_kind, "amount {raw}");
            assert_eq!(normalized.amount.to_cents(), expected_cents, "amount {raw}");
        }
    }

    #[test]
    fn checking_account_inverts_the_signs() {
        let d = dialect(AmountSign::NegativeIsExpense, None);
        let deposit = run(&["01/15/2024", "PAYROLL", "300.00", ""], &d, AccountKind::Checking)
            .unwrap()
            .unwrap();
        assert_eq!(deposit.kind, TransactionKind::Income);

        let purchase = run(&["01/15/2024", "GROCER", "-50.00", ""], &d, AccountKind::Checking)
            .unwrap()
            .unwrap();
        assert_eq!(purchase.kind, TransactionKind::Expense);
        assert_eq!(purchase.amount.to_cents(), 5000);
    }

    #[test]
    fn zero_amount_is_not_positive() {
        let d = dialect(AmountSign::NegativeIsExpense, None);
        let on_credit = run(&["01/15/2024", "ADJ", "0.00", ""], &d, AccountKind::Credit)
            .unwrap()
            .unwrap();
        assert_eq!(on_credit.kind, TransactionKind::Income);

        let on_checking = run(&["01/15/2024", "ADJ", "0.00", ""], &d, AccountKind::Checking)
            .unwrap()
            .unwrap();
        assert_eq!(on_checking.kind, TransactionKind::Expense);
    }

    #[test]
    fn missing_date_skips_the_row() {
        let d = dialect(AmountSign::NegativeIsExpense, None);
        assert!(run(&["", "STORE", "5.00", ""], &d, AccountKind::Checking)
            .unwrap()
            .is_none());
        assert!(run(&["pending", "STORE", "5.00", ""], &d, AccountKind::Checking)
            .unwrap()
            .is_none());
    }

    #[test]
    fn date_format_fallbacks() {
        // Dialect says %m/%d/%Y but the row is ISO; the fallback chain
        // should still land it.
        let d = dialect(AmountSign::NegativeIsExpense, None);
        let normalized = run(&["2024-01-15", "STORE", "5.00", ""], &d, AccountKind::Checking)
            .unwrap()
            .unwrap();
        assert_eq!(normalized.date, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
    }

    #[test]
    fn currency_symbols_and_commas_are_stripped() {
        let d = dialect(AmountSign::NegativeIsExpense, None);
        let normalized = run(
            &["01/15/2024", "RENT", "$1,234.56", ""],
            &d,
            AccountKind::Checking,
        )
        .unwrap()
        .unwrap();
        assert_eq!(normalized.amount.to_cents(), 123456);
    }

    #[test]
    fn parentheses_convention_negates() {
        let d = dialect(AmountSign::ParenthesesIsExpense, None);
        let normalized = run(
            &["01/15/2024", "OFFICE", "(75.25)", ""],
            &d,
            AccountKind::Checking,
        )
        .unwrap()
        .unwrap();
        assert_eq!(normalized.kind, TransactionKind::Expense);
        assert_eq!(normalized.amount.to_cents(), 7525);
    }

    #[test]
    fn parentheses_tolerates_minus() {
        let d = dialect(AmountSign::ParenthesesIsExpense, None);
        let normalized = run(&["01/15/2024", "FEE", "-3.00", ""], &d, AccountKind::Checking)
            .unwrap()
            .unwrap();
        assert_eq!(normalized.kind, TransactionKind::Expense);
    }

    #[test]
    fn minus_convention_rejects_parentheses() {
        let d = dialect(AmountSign::NegativeIsExpense, None);
        let result = run(&["01/15/2024", "FEE", "(3.00)", ""], &d, AccountKind::Checking);
        assert!(matches!(result, Err(RowError::InvalidAmount(_))));
    }

    #[test]
    fn garbage_amount_is_an_error() {
        let d = dialect(AmountSign::NegativeIsExpense, None);
        let result = run(&["01/15/2024", "FEE", "n/a", ""], &d, AccountKind::Checking);
        assert!(matches!(result, Err(RowError::InvalidAmount(_))));
    }

    #[test]
    fn description_is_title_cased_and_collapsed() {
        let d = dialect(AmountSign::NegativeIsExpense, None);
        let normalized = run(
            &["01/15/2024", "  WALMART   STORE  #123 ", "-9.99", ""],
            &d,
            AccountKind::Checking,
        )
        .unwrap()
        .unwrap();
        assert_eq!(normalized.description, "Walmart Store #123");
    }

    #[test]
    fn blank_category_cell_gets_a_default() {
        let d = dialect(AmountSign::NegativeIsExpense, Some("Category"));
        let expense = run(&["01/15/2024", "STORE", "-9.99", " "], &d, AccountKind::Checking)
            .unwrap()
            .unwrap();
        assert_eq!(expense.category.as_deref(), Some("Uncategorized"));

        let income = run(&["01/15/2024", "PAYROLL", "100.00", ""], &d, AccountKind::Checking)
            .unwrap()
            .unwrap();
        assert_eq!(income.category.as_deref(), Some("Income"));
    }

    #[test]
    fn unmapped_category_stays_absent() {
        let d = dialect(AmountSign::NegativeIsExpense, None);
        let normalized = run(&["01/15/2024", "STORE", "-9.99", "x"], &d, AccountKind::Checking)
            .unwrap()
            .unwrap();
        assert_eq!(normalized.category, None);
    }

    #[test]
    fn mapped_category_is_normalized() {
        let d = dialect(AmountSign::NegativeIsExpense, Some("Category"));
        let normalized = run(
            &["01/15/2024", "STORE", "-9.99", "MERCHANDISE  & SUPPLIES"],
            &d,
            AccountKind::Checking,
        )
        .unwrap()
        .unwrap();
        assert_eq!(normalized.category.as_deref(), Some("Merchandise & Supplies"));
    }

    #[test]
    fn title_case_is_idempotent() {
        let once = title_case("WALMART   STORE #123");
        assert_eq!(title_case(&once), once);
    }
}
