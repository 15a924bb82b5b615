pub mod accounts;
pub mod audit;
pub mod commit;
pub mod db;
pub mod error;
pub mod imports;
pub mod ledger;
pub mod rules;
pub mod staging;

pub use accounts::{get_account, insert_account};
pub use audit::{changes_for, recategorize};
pub use commit::{commit_staged, recalculate};
pub use db::{create_db, DbPool};
pub use error::StorageError;
pub use imports::{file_already_imported, file_checksum, record_imported_file};
pub use ledger::{get_transaction, is_duplicate, list_for_account, soft_delete};
pub use rules::{
    insert_rule, record_usage, remove_rule, rules_for_user, update_rule, upsert_learned,
};
pub use staging::{discard_staged, insert_staged, list_staged};
