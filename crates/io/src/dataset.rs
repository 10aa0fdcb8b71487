//! Month-level loading of a dataset root.
//!
//! A dataset shares the store layout but may carry whole-month files
//! (`<YYYY-MM>_orders.csv`, `<YYYY-MM>_line-items.csv`) next to, or instead
//! of, day files. Both kinds are read and concatenated.

use std::path::{Path, PathBuf};

use ordertrace_core::{Record, YearMonth};
use tracing::debug;

use crate::csv::read_records;
use crate::error::StoreError;
use crate::store::{day_prefix, month_dir, read_dir_names, LINE_ITEMS_SUFFIX, ORDERS_SUFFIX};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonthFiles {
    pub orders: Vec<PathBuf>,
    pub line_items: Vec<PathBuf>,
}

impl MonthFiles {
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty() && self.line_items.is_empty()
    }
}

/// Raw records of one side for one month, columns as they appear on disk.
#[derive(Debug, Clone, Default)]
pub struct MonthRecords {
    pub orders: Vec<Record>,
    pub line_items: Vec<Record>,
    pub files: MonthFiles,
}

fn belongs_to(name: &str, suffix: &str, month: YearMonth) -> bool {
    if let Some(date) = day_prefix(name, suffix) {
        return month.contains(date);
    }
    name.strip_suffix(suffix)
        .map(|stem| stem == month.to_string())
        .unwrap_or(false)
}

/// Data files for `month` under `root`, in file-name order.
pub fn month_files(root: &Path, month: YearMonth) -> Result<MonthFiles, StoreError> {
    let dir = month_dir(root, month);
    let mut files = MonthFiles::default();
    for name in read_dir_names(&dir)? {
        if belongs_to(&name, ORDERS_SUFFIX, month) {
            files.orders.push(dir.join(&name));
        } else if belongs_to(&name, LINE_ITEMS_SUFFIX, month) {
            files.line_items.push(dir.join(&name));
        }
    }
    Ok(files)
}

/// Load every record for `month`. A missing month directory is empty data,
/// not an error; an unreadable file is.
pub fn load_month(root: &Path, month: YearMonth) -> Result<MonthRecords, StoreError> {
    let files = month_files(root, month)?;
    let mut out = MonthRecords::default();
    for path in &files.orders {
        out.orders.extend(read_records(path)?);
    }
    for path in &files.line_items {
        out.line_items.extend(read_records(path)?);
    }
    debug!(
        root = %root.display(),
        month = %month,
        order_files = files.orders.len(),
        line_item_files = files.line_items.len(),
        orders = out.orders.len(),
        line_items = out.line_items.len(),
        "month loaded"
    );
    out.files = files;
    Ok(out)
}
