//! File I/O for ordertrace: the CSV wire format, the day-partitioned
//! incremental store, and month-level dataset loading for reconciliation.

pub mod csv;
pub mod dataset;
pub mod error;
pub mod store;

pub use dataset::{load_month, month_files, MonthFiles, MonthRecords};
pub use error::StoreError;
pub use store::{IncrementalStore, LINE_ITEMS_SUFFIX, ORDERS_SUFFIX};
