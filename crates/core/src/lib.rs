pub mod account;
pub mod money;
pub mod rule;
pub mod transaction;

pub use account::{Account, AccountId, AccountKind, ParseAccountKindError, UserId};
pub use money::Money;
pub use rule::{CategorizationRule, CategoryChange, RuleId, LEARNED_CONFIDENCE};
pub use transaction::{
    balance_delta, DraftId, Transaction, TransactionDraft, TransactionId, TransactionKind,
};
