//! `ordertrace-recon` - reconciliation of two day-partitioned order datasets.
//!
//! Loads a candidate and a reference dataset month by month, diffs order-id
//! sets and per-order line-item multisets on raw and normalized keys, and
//! ranks aggregate discrepancies. Read-only over its inputs.

pub mod config;
pub mod engine;
pub mod error;
pub mod load;
pub mod model;
pub mod output;
pub mod report;

pub use config::{ColumnMapping, PerspectiveConfig, ReconConfig, SideConfig};
pub use engine::{compare_month, run};
pub use error::ReconError;
pub use model::{KeyDelta, MonthComparison, MonthStatus, ReconResult, ReconSummary, SideData};
pub use output::write_outputs;
