//! In-process service facade over the ingestion pipeline: detect the bank
//! dialect, normalize and categorize rows, stage them for review, and commit
//! accepted drafts to the ledger. The HTTP layer that calls this lives
//! elsewhere; everything here is plain async Rust over the storage pool.

use std::fmt;
use std::path::Path;

use thiserror::Error;

use saldo_core::{
    Account, AccountId, CategorizationRule, DraftId, Money, RuleId, Transaction,
    TransactionDraft, TransactionId, UserId,
};
use saldo_import::{
    derive_rule, fallback_category, normalize, CategorizationEngine, Dialect, FormatRegistry,
    HeaderIndex, RegistryError, Suggestions,
};
use saldo_storage::{DbPool, StorageError};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    MissingDate,
    InvalidAmount,
    MalformedRow,
    Duplicate,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingDate => write!(f, "missing or unparseable date"),
            SkipReason::InvalidAmount => write!(f, "invalid amount"),
            SkipReason::MalformedRow => write!(f, "malformed row"),
            SkipReason::Duplicate => write!(f, "duplicate of a committed transaction"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SkippedRow {
    /// 1-based line number in the source file, counting the header.
    pub line: usize,
    pub reason: SkipReason,
}

/// What one `import_file` call did: staged drafts plus every row that was
/// passed over, with reasons. A failed import never produces a report; it
/// returns an error and mutates nothing.
#[derive(Debug, Default)]
pub struct ImportReport {
    pub dialect: String,
    pub staged: Vec<TransactionDraft>,
    pub skipped: Vec<SkippedRow>,
    /// True when the exact statement file was imported before; nothing is
    /// staged in that case.
    pub duplicate_file: bool,
}

impl ImportReport {
    pub fn imported(&self) -> usize {
        self.staged.len()
    }

    pub fn duplicates(&self) -> usize {
        self.skipped
            .iter()
            .filter(|s| s.reason == SkipReason::Duplicate)
            .count()
    }
}

/// The pipeline facade. One instance per process; all state lives in the
/// database, so independent imports for different users can share it.
pub struct Pipeline {
    db: DbPool,
    registry: FormatRegistry,
}

impl Pipeline {
    pub fn new(db: DbPool) -> Self {
        Self {
            db,
            registry: FormatRegistry::builtin(),
        }
    }

    pub fn with_registry(db: DbPool, registry: FormatRegistry) -> Self {
        Self { db, registry }
    }

    pub fn registry(&self) -> &FormatRegistry {
        &self.registry
    }

    pub fn db(&self) -> &DbPool {
        &self.db
    }

    // ── ingestion ────────────────────────────────────────────────────────

    /// Reads a statement export and stages its rows for review.
    ///
    /// The account must exist and belong to `user`; otherwise nothing is
    /// read. Passing `dialect_name` bypasses header detection. Row-level
    /// problems (bad date, bad amount, duplicate of a committed
    /// transaction) skip that row and continue; they come back in the
    /// report. Re-importing a byte-identical file is a no-op flagged via
    /// `duplicate_file`.
    pub async fn import_file(
        &self,
        path: &Path,
        user: UserId,
        account_id: AccountId,
        dialect_name: Option<&str>,
    ) -> Result<ImportReport, ServiceError> {
        let account = saldo_storage::get_account(&self.db, account_id)
            .await?
            .ok_or(StorageError::AccountNotFound(account_id))?;
        if account.user_id != user {
            return Err(StorageError::NotAuthorized.into());
        }

        let bytes = std::fs::read(path)?;
        let checksum = saldo_storage::file_checksum(&bytes);
        if saldo_storage::file_already_imported(&self.db, user, account_id, &checksum).await? {
            tracing::warn!(file = %path.display(), "statement file already imported; skipping");
            return Ok(ImportReport {
                duplicate_file: true,
                ..Default::default()
            });
        }

        let dialect: Dialect = match dialect_name {
            Some(name) => self
                .registry
                .get(name)
                .ok_or_else(|| RegistryError::UnknownDialect(name.to_string()))?
                .clone(),
            None => {
                let mut probe = csv::Reader::from_reader(bytes.as_slice());
                let headers: Vec<String> =
                    probe.headers()?.iter().map(|h| h.to_string()).collect();
                self.registry.detect(&headers)?.clone()
            }
        };

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .delimiter(dialect.delimiter_byte())
            .from_reader(bytes.as_slice());
        let header_index = HeaderIndex::new(reader.headers()?);

        let rules = saldo_storage::rules_for_user(&self.db, user).await?;
        let engine = CategorizationEngine::new(rules);

        let mut report = ImportReport {
            dialect: dialect.name.clone(),
            ..Default::default()
        };

        for (idx, result) in reader.records().enumerate() {
            let line = idx + 2;
            let record = match result {
                Ok(record) => record,
                Err(error) => {
                    tracing::warn!(line, %error, "row skipped");
                    report.skipped.push(SkippedRow {
                        line,
                        reason: SkipReason::MalformedRow,
                    });
                    continue;
                }
            };

            let normalized = match normalize(&record, &header_index, &dialect, account.kind) {
                Ok(Some(row)) => row,
                Ok(None) => {
                    tracing::warn!(line, "row skipped: missing or unparseable date");
                    report.skipped.push(SkippedRow {
                        line,
                        reason: SkipReason::MissingDate,
                    });
                    continue;
                }
                Err(error) => {
                    tracing::warn!(line, %error, "row skipped");
                    report.skipped.push(SkippedRow {
                        line,
                        reason: SkipReason::InvalidAmount,
                    });
                    continue;
                }
            };

            // Category priority: the statement's own column, then user
            // rules, then the keyword fallback.
            let category = match &normalized.category {
                Some(category) => category.clone(),
                None => {
                    let suggestions =
                        engine.suggest(&normalized.description, Some(&dialect.name));
                    saldo_storage::record_usage(&self.db, &suggestions.matched_ids()).await?;
                    match suggestions.top_category() {
                        Some(top) => top.category.clone(),
                        None => fallback_category(&normalized.description).to_string(),
                    }
                }
            };

            if saldo_storage::is_duplicate(
                &self.db,
                user,
                normalized.date,
                &normalized.description,
                normalized.amount,
                Some(account_id),
            )
            .await?
            {
                tracing::warn!(line, description = %normalized.description, "duplicate row skipped");
                report.skipped.push(SkippedRow {
                    line,
                    reason: SkipReason::Duplicate,
                });
                continue;
            }

            let raw_row = record.iter().collect::<Vec<_>>().join(&dialect.delimiter);
            let draft = TransactionDraft {
                id: None,
                user_id: user,
                account_id: Some(account_id),
                date: normalized.date,
                description: normalized.description.clone(),
                category,
                amount: normalized.amount,
                kind: normalized.kind,
                raw_row,
                source: "csv".to_string(),
                bank_name: Some(dialect.bank.clone()),
                created_at: None,
            };
            report.staged.push(saldo_storage::insert_staged(&self.db, &draft).await?);
        }

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("statement.csv");
        saldo_storage::record_imported_file(&self.db, user, account_id, file_name, &checksum)
            .await?;

        tracing::info!(
            dialect = %report.dialect,
            imported = report.imported(),
            skipped = report.skipped.len(),
            "statement import finished"
        );
        Ok(report)
    }

    // ── review & commit ──────────────────────────────────────────────────

    pub async fn review_staged(
        &self,
        user: UserId,
    ) -> Result<Vec<TransactionDraft>, ServiceError> {
        Ok(saldo_storage::list_staged(&self.db, user).await?)
    }

    pub async fn commit_staged(
        &self,
        ids: &[DraftId],
        user: UserId,
    ) -> Result<Vec<Transaction>, ServiceError> {
        Ok(saldo_storage::commit_staged(&self.db, ids, user).await?)
    }

    pub async fn discard_staged(
        &self,
        ids: &[DraftId],
        user: UserId,
    ) -> Result<u64, ServiceError> {
        Ok(saldo_storage::discard_staged(&self.db, ids, user).await?)
    }

    pub async fn recategorize(
        &self,
        id: TransactionId,
        category: &str,
        user: UserId,
    ) -> Result<Transaction, ServiceError> {
        Ok(saldo_storage::recategorize(&self.db, id, category, user).await?)
    }

    pub async fn recalculate_balance(
        &self,
        account_id: AccountId,
    ) -> Result<Money, ServiceError> {
        Ok(saldo_storage::recalculate(&self.db, account_id).await?)
    }

    // ── categorization ───────────────────────────────────────────────────

    /// Read+update: returns suggestions for `description` AND bumps the use
    /// counters of every matched rule. Use [`Pipeline::suggest`] for a
    /// dry-run lookup that leaves the counters alone.
    pub async fn categorize(
        &self,
        description: &str,
        scope: Option<&str>,
        user: UserId,
    ) -> Result<Suggestions, ServiceError> {
        let suggestions = self.suggest(description, scope, user).await?;
        saldo_storage::record_usage(&self.db, &suggestions.matched_ids()).await?;
        Ok(suggestions)
    }

    /// Pure lookup against the user's current rule set.
    pub async fn suggest(
        &self,
        description: &str,
        scope: Option<&str>,
        user: UserId,
    ) -> Result<Suggestions, ServiceError> {
        let rules = saldo_storage::rules_for_user(&self.db, user).await?;
        Ok(CategorizationEngine::new(rules).suggest(description, scope))
    }

    /// Learns a rule from a committed (typically just-corrected)
    /// transaction. Returns `None` when the description is blank. Rules
    /// with an identical derived pattern merge instead of accumulating.
    pub async fn learn_from(
        &self,
        id: TransactionId,
        user: UserId,
    ) -> Result<Option<CategorizationRule>, ServiceError> {
        let transaction = saldo_storage::get_transaction(&self.db, id)
            .await?
            .ok_or(StorageError::TransactionNotFound(id.0))?;
        if transaction.user_id != user {
            return Err(StorageError::NotAuthorized.into());
        }

        match derive_rule(user, &transaction.description, &transaction.category, None) {
            Some(rule) => Ok(Some(saldo_storage::upsert_learned(&self.db, &rule).await?)),
            None => Ok(None),
        }
    }

    // ── rule management ──────────────────────────────────────────────────

    pub async fn add_rule(
        &self,
        rule: &CategorizationRule,
    ) -> Result<CategorizationRule, ServiceError> {
        Ok(saldo_storage::insert_rule(&self.db, rule).await?)
    }

    pub async fn update_rule(&self, rule: &CategorizationRule) -> Result<(), ServiceError> {
        Ok(saldo_storage::update_rule(&self.db, rule).await?)
    }

    pub async fn remove_rule(&self, id: RuleId, user: UserId) -> Result<bool, ServiceError> {
        Ok(saldo_storage::remove_rule(&self.db, id, user).await?)
    }

    pub async fn rules_for(
        &self,
        user: UserId,
    ) -> Result<Vec<CategorizationRule>, ServiceError> {
        Ok(saldo_storage::rules_for_user(&self.db, user).await?)
    }

    // ── accounts ─────────────────────────────────────────────────────────

    pub async fn add_account(&self, account: &Account) -> Result<Account, ServiceError> {
        Ok(saldo_storage::insert_account(&self.db, account).await?)
    }

    pub async fn account(&self, id: AccountId) -> Result<Option<Account>, ServiceError> {
        Ok(saldo_storage::get_account(&self.db, id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use saldo_core::{AccountKind, TransactionKind};
    use std::path::PathBuf;

    struct Fixture {
        _dir: tempfile::TempDir,
        pipeline: Pipeline,
    }

    impl Fixture {
        async fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let db = saldo_storage::create_db(&dir.path().join("test.db"))
                .await
                .unwrap();
            Fixture {
                _dir: dir,
                pipeline: Pipeline::new(db),
            }
        }

        fn write_file(&self, name: &str, content: &str) -> PathBuf {
            let path = self._dir.path().join(name);
            std::fs::write(&path, content).unwrap();
            path
        }

        async fn account(&self, user: i64, kind: AccountKind, cents: i64) -> AccountId {
            let mut account = Account::new(UserId(user), "Test Account", kind);
            account.balance = Money::from_cents(cents);
            self.pipeline
                .add_account(&account)
                .await
                .unwrap()
                .id
                .unwrap()
        }
    }

    const CHECKING_CSV: &str = "\
Details,Posting Date,Description,Amount,Type,Balance,Check or Slip #
DEBIT,01/16/2024,GROCER MART 0042,-50.00,DEBIT,1250.00,
CREDIT,01/15/2024,ACME CORP PAYROLL,300.00,CREDIT,1300.00,
";

    const CARD_CSV: &str = "\
Trans. Date,Post Date,Description,Amount,Category
01/10/2024,01/11/2024,COFFEE SHOP 12,12.95,Restaurants
01/12/2024,01/13/2024,PAYMENT THANK YOU,-20.00,Payments and Credits
01/14/2024,01/15/2024,AIRLINE TICKETS,84.99,Travel
";

    #[tokio::test]
    async fn import_detects_dialect_and_stages_rows() {
        let f = Fixture::new().await;
        let account = f.account(1, AccountKind::Checking, 100_000).await;
        let path = f.write_file("chase.csv", CHECKING_CSV);

        let report = f
            .pipeline
            .import_file(&path, UserId(1), account, None)
            .await
            .unwrap();

        assert_eq!(report.dialect, "chase-checking");
        assert_eq!(report.imported(), 2);
        assert!(report.skipped.is_empty());
        assert!(!report.duplicate_file);

        let staged = f.pipeline.review_staged(UserId(1)).await.unwrap();
        // Most recent date first.
        assert_eq!(staged[0].description, "Grocer Mart 0042");
        assert_eq!(staged[0].kind, TransactionKind::Expense);
        assert_eq!(staged[0].amount.to_cents(), 5_000);
        assert_eq!(staged[1].kind, TransactionKind::Income);
        assert_eq!(staged[1].category, "Income");
        assert_eq!(staged[0].bank_name.as_deref(), Some("Chase"));
        assert_eq!(staged[0].source, "csv");
        assert!(staged[0].raw_row.contains("GROCER MART 0042"));
    }

    #[tokio::test]
    async fn credit_statement_resolves_types_by_sign() {
        let f = Fixture::new().await;
        let card = f.account(1, AccountKind::Credit, 0).await;
        let path = f.write_file("card.csv", CARD_CSV);

        let report = f
            .pipeline
            .import_file(&path, UserId(1), card, None)
            .await
            .unwrap();
        assert_eq!(report.dialect, "discover-card");
        assert_eq!(report.imported(), 3);

        let mut staged = f.pipeline.review_staged(UserId(1)).await.unwrap();
        staged.sort_by_key(|d| d.date);
        let kinds: Vec<TransactionKind> = staged.iter().map(|d| d.kind).collect();
        assert_eq!(
            kinds,
            [
                TransactionKind::Expense,
                TransactionKind::Income,
                TransactionKind::Expense
            ]
        );
        let cents: Vec<i64> = staged.iter().map(|d| d.amount.to_cents()).collect();
        assert_eq!(cents, [1_295, 2_000, 8_499]);
        // The statement's own category column wins.
        assert_eq!(staged[0].category, "Restaurants");
    }

    #[tokio::test]
    async fn commit_updates_checking_balance() {
        let f = Fixture::new().await;
        let account = f.account(1, AccountKind::Checking, 100_000).await;
        let path = f.write_file("chase.csv", CHECKING_CSV);

        f.pipeline
            .import_file(&path, UserId(1), account, None)
            .await
            .unwrap();
        let ids: Vec<DraftId> = f
            .pipeline
            .review_staged(UserId(1))
            .await
            .unwrap()
            .iter()
            .map(|d| d.id.unwrap())
            .collect();

        let committed = f.pipeline.commit_staged(&ids, UserId(1)).await.unwrap();
        assert_eq!(committed.len(), 2);

        let balance = f
            .pipeline
            .account(account)
            .await
            .unwrap()
            .unwrap()
            .balance;
        // 1000.00 + 300.00 - 50.00
        assert_eq!(balance.to_cents(), 125_000);
        assert!(f.pipeline.review_staged(UserId(1)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reimporting_the_same_file_is_flagged() {
        let f = Fixture::new().await;
        let account = f.account(1, AccountKind::Checking, 0).await;
        let path = f.write_file("chase.csv", CHECKING_CSV);

        f.pipeline
            .import_file(&path, UserId(1), account, None)
            .await
            .unwrap();
        let second = f
            .pipeline
            .import_file(&path, UserId(1), account, None)
            .await
            .unwrap();

        assert!(second.duplicate_file);
        assert_eq!(second.imported(), 0);
        assert_eq!(f.pipeline.review_staged(UserId(1)).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn committed_rows_are_skipped_on_overlapping_import() {
        let f = Fixture::new().await;
        let account = f.account(1, AccountKind::Checking, 0).await;

        let first = f.write_file("jan.csv", CHECKING_CSV);
        f.pipeline
            .import_file(&first, UserId(1), account, None)
            .await
            .unwrap();
        let ids: Vec<DraftId> = f
            .pipeline
            .review_staged(UserId(1))
            .await
            .unwrap()
            .iter()
            .map(|d| d.id.unwrap())
            .collect();
        f.pipeline.commit_staged(&ids, UserId(1)).await.unwrap();

        // Same two rows plus one new one, in a distinct file.
        let overlap = f.write_file(
            "jan-full.csv",
            "\
Details,Posting Date,Description,Amount,Type,Balance,Check or Slip #
DEBIT,01/16/2024,GROCER MART 0042,-50.00,DEBIT,1250.00,
CREDIT,01/15/2024,ACME CORP PAYROLL,300.00,CREDIT,1300.00,
DEBIT,01/17/2024,NEW MERCHANT,-10.00,DEBIT,1240.00,
",
        );
        let report = f
            .pipeline
            .import_file(&overlap, UserId(1), account, None)
            .await
            .unwrap();

        assert_eq!(report.imported(), 1);
        assert_eq!(report.duplicates(), 2);
        assert_eq!(f.pipeline.review_staged(UserId(1)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn bad_rows_are_skipped_with_reasons() {
        let f = Fixture::new().await;
        let account = f.account(1, AccountKind::Checking, 0).await;
        let path = f.write_file(
            "messy.csv",
            "\
Details,Posting Date,Description,Amount,Type,Balance,Check or Slip #
DEBIT,pending,NOT POSTED YET,-5.00,DEBIT,,
DEBIT,01/16/2024,BAD AMOUNT,abc,DEBIT,,
DEBIT,01/17/2024,FINE,-10.00,DEBIT,,
",
        );

        let report = f
            .pipeline
            .import_file(&path, UserId(1), account, None)
            .await
            .unwrap();

        assert_eq!(report.imported(), 1);
        assert_eq!(report.skipped.len(), 2);
        assert_eq!(report.skipped[0].reason, SkipReason::MissingDate);
        assert_eq!(report.skipped[0].line, 2);
        assert_eq!(report.skipped[1].reason, SkipReason::InvalidAmount);
        assert_eq!(report.skipped[1].line, 3);
    }

    #[tokio::test]
    async fn undetectable_format_is_fatal() {
        let f = Fixture::new().await;
        let account = f.account(1, AccountKind::Checking, 0).await;
        let path = f.write_file("weird.csv", "Foo,Bar\n1,2\n");

        let result = f.pipeline.import_file(&path, UserId(1), account, None).await;
        assert!(matches!(
            result,
            Err(ServiceError::Registry(RegistryError::FormatNotDetected(_)))
        ));
        assert!(f.pipeline.review_staged(UserId(1)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn explicit_dialect_bypasses_detection() {
        let f = Fixture::new().await;
        let account = f.account(1, AccountKind::Checking, 0).await;
        // Headers only satisfy "generic", but the caller names the dialect.
        let path = f.write_file(
            "named.csv",
            "Date,Description,Amount\n2024-01-15,SOMETHING,(12.00)\n",
        );

        let report = f
            .pipeline
            .import_file(&path, UserId(1), account, Some("generic"))
            .await
            .unwrap();
        assert_eq!(report.dialect, "generic");
        assert_eq!(report.imported(), 1);
        assert_eq!(report.staged[0].kind, TransactionKind::Expense);
    }

    #[tokio::test]
    async fn import_requires_account_ownership() {
        let f = Fixture::new().await;
        let account = f.account(2, AccountKind::Checking, 0).await;
        let path = f.write_file("chase.csv", CHECKING_CSV);

        let result = f.pipeline.import_file(&path, UserId(1), account, None).await;
        assert!(matches!(
            result,
            Err(ServiceError::Storage(StorageError::NotAuthorized))
        ));

        let missing = f
            .pipeline
            .import_file(&path, UserId(1), AccountId(999), None)
            .await;
        assert!(matches!(
            missing,
            Err(ServiceError::Storage(StorageError::AccountNotFound(_)))
        ));
    }

    #[tokio::test]
    async fn user_rules_categorize_uncategorized_statements() {
        let f = Fixture::new().await;
        let account = f.account(1, AccountKind::Checking, 0).await;
        f.pipeline
            .add_rule(
                &CategorizationRule::new(UserId(1), "GROCER MART", "Grocer Mart", "Groceries")
                    .with_subcategory("Food"),
            )
            .await
            .unwrap();

        let path = f.write_file("chase.csv", CHECKING_CSV);
        f.pipeline
            .import_file(&path, UserId(1), account, None)
            .await
            .unwrap();

        let staged = f.pipeline.review_staged(UserId(1)).await.unwrap();
        assert_eq!(staged[0].category, "Groceries");

        // The lookup counted as usage.
        let rules = f.pipeline.rules_for(UserId(1)).await.unwrap();
        assert_eq!(rules[0].use_count, 1);
        assert!(rules[0].last_used.is_some());
    }

    #[tokio::test]
    async fn keyword_fallback_fills_the_rest() {
        let f = Fixture::new().await;
        let account = f.account(1, AccountKind::Checking, 0).await;
        let path = f.write_file("chase.csv", CHECKING_CSV);

        f.pipeline
            .import_file(&path, UserId(1), account, None)
            .await
            .unwrap();
        let staged = f.pipeline.review_staged(UserId(1)).await.unwrap();
        // "ACME CORP PAYROLL" hits the payroll keyword group.
        assert_eq!(staged[1].category, "Income");
        // "GROCER MART 0042" hits the grocery keyword group.
        assert_eq!(staged[0].category, "Groceries");
    }

    #[tokio::test]
    async fn categorize_records_usage_but_suggest_does_not() {
        let f = Fixture::new().await;
        let rule = f
            .pipeline
            .add_rule(&CategorizationRule::new(
                UserId(1),
                "WALMART",
                "Walmart",
                "Shopping",
            ))
            .await
            .unwrap();

        let pure = f
            .pipeline
            .suggest("WALMART STORE #123", None, UserId(1))
            .await
            .unwrap();
        assert_eq!(pure.vendors[0].vendor, "Walmart");
        assert_eq!(
            f.pipeline.rules_for(UserId(1)).await.unwrap()[0].use_count,
            0
        );

        let counted = f
            .pipeline
            .categorize("WALMART STORE #123", None, UserId(1))
            .await
            .unwrap();
        assert_eq!(counted.matched_ids(), vec![rule.id.unwrap()]);
        assert_eq!(
            f.pipeline.rules_for(UserId(1)).await.unwrap()[0].use_count,
            1
        );
    }

    #[tokio::test]
    async fn recategorize_then_learn_closes_the_loop() {
        let f = Fixture::new().await;
        let account = f.account(1, AccountKind::Checking, 0).await;
        let path = f.write_file(
            "one.csv",
            "\
Details,Posting Date,Description,Amount,Type,Balance,Check or Slip #
DEBIT,01/16/2024,CHIPOTLE NYC #456,-12.95,DEBIT,,
",
        );
        f.pipeline
            .import_file(&path, UserId(1), account, None)
            .await
            .unwrap();
        let ids: Vec<DraftId> = f
            .pipeline
            .review_staged(UserId(1))
            .await
            .unwrap()
            .iter()
            .map(|d| d.id.unwrap())
            .collect();
        let committed = f.pipeline.commit_staged(&ids, UserId(1)).await.unwrap();
        let tx_id = committed[0].id.unwrap();

        let updated = f
            .pipeline
            .recategorize(tx_id, "Dining", UserId(1))
            .await
            .unwrap();
        assert_eq!(updated.category, "Dining");
        let changes = saldo_storage::changes_for(f.pipeline.db(), tx_id)
            .await
            .unwrap();
        assert_eq!(changes.len(), 1);

        let learned = f
            .pipeline
            .learn_from(tx_id, UserId(1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(learned.category, "Dining");

        // The learned rule generalizes the store number.
        let suggestions = f
            .pipeline
            .suggest("CHIPOTLE NYC #789", None, UserId(1))
            .await
            .unwrap();
        assert_eq!(suggestions.categories[0].category, "Dining");
        assert!(f
            .pipeline
            .suggest("CHIPOTLE LA #456", None, UserId(1))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn learn_from_checks_ownership() {
        let f = Fixture::new().await;
        let account = f.account(1, AccountKind::Checking, 0).await;
        let path = f.write_file(
            "one.csv",
            "\
Details,Posting Date,Description,Amount,Type,Balance,Check or Slip #
DEBIT,01/16/2024,SOME SHOP,-5.00,DEBIT,,
",
        );
        f.pipeline
            .import_file(&path, UserId(1), account, None)
            .await
            .unwrap();
        let ids: Vec<DraftId> = f
            .pipeline
            .review_staged(UserId(1))
            .await
            .unwrap()
            .iter()
            .map(|d| d.id.unwrap())
            .collect();
        let committed = f.pipeline.commit_staged(&ids, UserId(1)).await.unwrap();

        let result = f
            .pipeline
            .learn_from(committed[0].id.unwrap(), UserId(2))
            .await;
        assert!(matches!(
            result,
            Err(ServiceError::Storage(StorageError::NotAuthorized))
        ));
    }

    #[tokio::test]
    async fn discard_reports_owned_deletions_only() {
        let f = Fixture::new().await;
        let account = f.account(1, AccountKind::Checking, 0).await;
        let path = f.write_file("chase.csv", CHECKING_CSV);
        f.pipeline
            .import_file(&path, UserId(1), account, None)
            .await
            .unwrap();

        let ids: Vec<DraftId> = f
            .pipeline
            .review_staged(UserId(1))
            .await
            .unwrap()
            .iter()
            .map(|d| d.id.unwrap())
            .collect();
        let count = f
            .pipeline
            .discard_staged(&ids, UserId(2))
            .await
            .unwrap();
        assert_eq!(count, 0);

        let count = f.pipeline.discard_staged(&ids, UserId(1)).await.unwrap();
        assert_eq!(count, 2);
        assert!(f.pipeline.review_staged(UserId(1)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn recalculate_balance_round_trip() {
        let f = Fixture::new().await;
        let account = f.account(1, AccountKind::Checking, 0).await;
        let path = f.write_file("chase.csv", CHECKING_CSV);
        f.pipeline
            .import_file(&path, UserId(1), account, None)
            .await
            .unwrap();
        let ids: Vec<DraftId> = f
            .pipeline
            .review_staged(UserId(1))
            .await
            .unwrap()
            .iter()
            .map(|d| d.id.unwrap())
            .collect();
        f.pipeline.commit_staged(&ids, UserId(1)).await.unwrap();

        let recomputed = f.pipeline.recalculate_balance(account).await.unwrap();
        assert_eq!(recomputed.to_cents(), 25_000);
        let again = f.pipeline.recalculate_balance(account).await.unwrap();
        assert_eq!(again.to_cents(), 25_000);
    }
}
