use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// How a bank export encodes the sign of an amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AmountSign {
    /// Expenses carry a leading minus; a parenthesized amount is malformed.
    NegativeIsExpense,
    /// Expenses are parenthesized, accounting style; a minus is tolerated.
    ParenthesesIsExpense,
}

/// Column names (matched case-insensitively against the header row) that
/// carry each field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub date: String,
    pub description: String,
    pub amount: String,
    #[serde(default)]
    pub category: Option<String>,
}

/// One named bank CSV convention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dialect {
    pub name: String,
    /// Human-readable institution name, carried onto staged drafts.
    pub bank: String,
    pub mapping: ColumnMapping,
    pub date_format: String,
    pub amount_sign: AmountSign,
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    /// Header names that must all be present for positive detection.
    pub detect_headers: Vec<String>,
}

fn default_delimiter() -> String {
    ",".to_string()
}

impl Dialect {
    pub fn delimiter_byte(&self) -> u8 {
        self.delimiter.as_bytes().first().copied().unwrap_or(b',')
    }
}

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("duplicate dialect name: '{0}'")]
    DuplicateName(String),
    #[error("no registered dialect matches headers: [{0}]")]
    FormatNotDetected(String),
    #[error("unknown dialect: '{0}'")]
    UnknownDialect(String),
    #[error("failed to parse dialect file: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Holds the known bank dialects and decides which one applies to an
/// uploaded file. Detection is deterministic and independent of
/// registration order: the most specific match (largest detection-header
/// set) wins, ties broken by name.
#[derive(Debug, Default)]
pub struct FormatRegistry {
    dialects: Vec<Dialect>,
}

impl FormatRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry preloaded with the common US bank exports.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for dialect in builtin_dialects() {
            // Built-in names are distinct by construction.
            registry.register(dialect).unwrap();
        }
        registry
    }

    /// Loads `[[dialect]]` entries from a TOML document.
    pub fn from_toml(content: &str) -> Result<Self, RegistryError> {
        #[derive(Deserialize)]
        struct DialectFile {
            #[serde(default)]
            dialect: Vec<Dialect>,
        }
        let file: DialectFile = toml::from_str(content)?;
        let mut registry = Self::new();
        for dialect in file.dialect {
            registry.register(dialect)?;
        }
        Ok(registry)
    }

    /// Rejects duplicate names rather than silently appending a shadow
    /// candidate.
    pub fn register(&mut self, dialect: Dialect) -> Result<(), RegistryError> {
        if self
            .dialects
            .iter()
            .any(|d| d.name.eq_ignore_ascii_case(&dialect.name))
        {
            return Err(RegistryError::DuplicateName(dialect.name));
        }
        self.dialects.push(dialect);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Dialect> {
        self.dialects
            .iter()
            .find(|d| d.name.eq_ignore_ascii_case(name))
    }

    pub fn names(&self) -> Vec<&str> {
        self.dialects.iter().map(|d| d.name.as_str()).collect()
    }

    /// Returns the dialect whose detection headers are a subset of the
    /// supplied headers (case-insensitive, trimmed).
    pub fn detect(&self, headers: &[String]) -> Result<&Dialect, RegistryError> {
        let have: HashSet<String> = headers
            .iter()
            .map(|h| h.trim().to_lowercase())
            .collect();

        let mut best: Option<&Dialect> = None;
        for candidate in &self.dialects {
            let matches = candidate
                .detect_headers
                .iter()
                .all(|h| have.contains(&h.trim().to_lowercase()));
            if !matches {
                continue;
            }
            best = Some(match best {
                None => candidate,
                Some(current) => {
                    let (c, b) = (
                        candidate.detect_headers.len(),
                        current.detect_headers.len(),
                    );
                    if c > b || (c == b && candidate.name < current.name) {
                        candidate
                    } else {
                        current
                    }
                }
            });
        }

        best.ok_or_else(|| RegistryError::FormatNotDetected(headers.join(", ")))
    }
}

fn builtin_dialects() -> Vec<Dialect> {
    vec![
        Dialect {
            name: "chase-checking".to_string(),
            bank: "Chase".to_string(),
            mapping: ColumnMapping {
                date: "Posting Date".to_string(),
                description: "Description".to_string(),
                amount: "Amount".to_string(),
                category: None,
            },
            date_format: "%m/%d/%Y".to_string(),
            amount_sign: AmountSign::NegativeIsExpense,
            delimiter: ",".to_string(),
            detect_headers: vec![
                "Posting Date".to_string(),
                "Description".to_string(),
                "Amount".to_string(),
                "Balance".to_string(),
            ],
        },
        Dialect {
            name: "amex-card".to_string(),
            bank: "American Express".to_string(),
            mapping: ColumnMapping {
                date: "Date".to_string(),
                description: "Description".to_string(),
                amount: "Amount".to_string(),
                category: Some("Category".to_string()),
            },
            date_format: "%m/%d/%Y".to_string(),
            amount_sign: AmountSign::NegativeIsExpense,
            delimiter: ",".to_string(),
            detect_headers: vec![
                "Date".to_string(),
                "Description".to_string(),
                "Card Member".to_string(),
                "Amount".to_string(),
            ],
        },
        Dialect {
            name: "bofa-checking".to_string(),
            bank: "Bank of America".to_string(),
            mapping: ColumnMapping {
                date: "Date".to_string(),
                description: "Description".to_string(),
                amount: "Amount".to_string(),
                category: None,
            },
            date_format: "%m/%d/%Y".to_string(),
            amount_sign: AmountSign::NegativeIsExpense,
            delimiter: ",".to_string(),
            detect_headers: vec![
                "Date".to_string(),
                "Description".to_string(),
                "Amount".to_string(),
                "Running Bal.".to_string(),
            ],
        },
        Dialect {
            name: "bofa-card".to_string(),
            bank: "Bank of America".to_string(),
            mapping: ColumnMapping {
                date: "Posted Date".to_string(),
                description: "Payee".to_string(),
                amount: "Amount".to_string(),
                category: None,
            },
            date_format: "%m/%d/%Y".to_string(),
            amount_sign: AmountSign::NegativeIsExpense,
            delimiter: ",".to_string(),
            detect_headers: vec![
                "Posted Date".to_string(),
                "Reference Number".to_string(),
                "Payee".to_string(),
                "Amount".to_string(),
            ],
        },
        Dialect {
            name: "discover-card".to_string(),
            bank: "Discover".to_string(),
            mapping: ColumnMapping {
                date: "Trans. Date".to_string(),
                description: "Description".to_string(),
                amount: "Amount".to_string(),
                category: Some("Category".to_string()),
            },
            date_format: "%m/%d/%Y".to_string(),
            amount_sign: AmountSign::NegativeIsExpense,
            delimiter: ",".to_string(),
            detect_headers: vec![
                "Trans. Date".to_string(),
                "Description".to_string(),
                "Amount".to_string(),
                "Category".to_string(),
            ],
        },
        // Catch-all for hand-maintained spreadsheets and smaller banks; the
        // accounting-style parentheses convention is common there.
        Dialect {
            name: "generic".to_string(),
            bank: "Unknown".to_string(),
            mapping: ColumnMapping {
                date: "Date".to_string(),
                description: "Description".to_string(),
                amount: "Amount".to_string(),
                category: Some("Category".to_string()),
            },
            date_format: "%Y-%m-%d".to_string(),
            amount_sign: AmountSign::ParenthesesIsExpense,
            delimiter: ",".to_string(),
            detect_headers: vec![
                "Date".to_string(),
                "Description".to_string(),
                "Amount".to_string(),
            ],
        },
    ]
}
