pub mod categorize;
pub mod dialect;
pub mod keywords;
pub mod normalize;

pub use categorize::{
    derive_rule, CategorizationEngine, CategorySuggestion, SuggestionSource, Suggestions,
    VendorSuggestion,
};
pub use dialect::{AmountSign, ColumnMapping, Dialect, FormatRegistry, RegistryError};
pub use keywords::{fallback_category, FALLBACK_CATEGORY};
pub use normalize::{
    default_category, normalize, title_case, HeaderIndex, NormalizedRow, RowError,
};
