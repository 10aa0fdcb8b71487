//! `ordertrace-core` - shared value types.
//!
//! Pure crate: no IO, no network. Everything downstream (store, extractors,
//! reconciliation) speaks in these types.

pub mod dates;
pub mod key;
pub mod model;
pub mod money;

pub use dates::{parse_display_date, DateError, YearMonth};
pub use key::{normalize_text, ItemKey};
pub use model::{
    placeholder_kind, DayPartition, LineItem, OrderSummary, PlaceholderKind, Record, ToRecord,
    VariantIds, ERROR_PLACEHOLDER_PRODUCT, PLACEHOLDER_PRODUCT,
};
pub use money::Money;
