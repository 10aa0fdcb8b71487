//! Incremental store: one pair of CSV files per calendar day.
//!
//! ```text
//! <root>/<YYYY>/<YYYY-MM>/<YYYY-MM-DD>_orders.csv
//! <root>/<YYYY>/<YYYY-MM>/<YYYY-MM-DD>_line-items.csv
//! ```
//!
//! A date is done once both files exist. That is the only resumption
//! mechanism: the month driver never re-extracts a done date.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use ordertrace_core::model::columns;
use ordertrace_core::{DayPartition, LineItem, OrderSummary, Record, ToRecord, YearMonth};
use tracing::debug;

use crate::csv::{read_records, write_records_to_path};
use crate::error::StoreError;

pub const ORDERS_SUFFIX: &str = "_orders.csv";
pub const LINE_ITEMS_SUFFIX: &str = "_line-items.csv";

const ORDERS_HEADER: &[&str] = &[
    columns::ORDER_ID,
    columns::DETAIL_REF,
    columns::CUSTOMER_NAME,
    columns::ASSOCIATE,
    columns::DISPLAY_DATE_TIME,
    columns::CHANNEL_TYPE,
    columns::CHANNEL,
    columns::FULFILLMENT_LOCATION,
    columns::DEMAND_LOCATION,
    columns::TOTAL,
    columns::DISCOUNT,
    columns::STATUS,
];

const LINE_ITEMS_HEADER: &[&str] = &[
    columns::ORDER_ID,
    columns::LINE_NUMBER,
    columns::PRODUCT_NAME,
    columns::COLOR,
    columns::SIZE,
    columns::QUANTITY,
    columns::UNIT_PRICE,
    columns::LINE_DISCOUNT,
    columns::DISCOUNTED_PRICE,
    columns::TAXES,
    columns::STATUS,
];

#[derive(Debug, Clone)]
pub struct IncrementalStore {
    root: PathBuf,
}

impl IncrementalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn month_dir(&self, month: YearMonth) -> PathBuf {
        month_dir(&self.root, month)
    }

    pub fn orders_path(&self, date: NaiveDate) -> PathBuf {
        self.month_dir(YearMonth::from_date(date))
            .join(format!("{}{}", date.format("%Y-%m-%d"), ORDERS_SUFFIX))
    }

    pub fn line_items_path(&self, date: NaiveDate) -> PathBuf {
        self.month_dir(YearMonth::from_date(date))
            .join(format!("{}{}", date.format("%Y-%m-%d"), LINE_ITEMS_SUFFIX))
    }

    /// True iff both files for `date` exist.
    pub fn exists(&self, date: NaiveDate) -> bool {
        self.orders_path(date).is_file() && self.line_items_path(date).is_file()
    }

    /// Persist one day.
    ///
    /// Both files are written to `.tmp` siblings first and then renamed into
    /// place, line items before orders. An interrupted write therefore never
    /// leaves a pair that [`exists`](Self::exists) reports as done.
    pub fn write(
        &self,
        date: NaiveDate,
        orders: &[OrderSummary],
        line_items: &[LineItem],
    ) -> Result<(), StoreError> {
        let dir = self.month_dir(YearMonth::from_date(date));
        std::fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;

        let order_records: Vec<Record> = orders.iter().map(ToRecord::to_record).collect();
        let item_records: Vec<Record> = line_items.iter().map(ToRecord::to_record).collect();

        let items_path = self.line_items_path(date);
        let orders_path = self.orders_path(date);
        let items_tmp = tmp_sibling(&items_path);
        let orders_tmp = tmp_sibling(&orders_path);

        write_records_to_path(&items_tmp, &item_records, LINE_ITEMS_HEADER)?;
        write_records_to_path(&orders_tmp, &order_records, ORDERS_HEADER)?;

        std::fs::rename(&items_tmp, &items_path).map_err(|e| StoreError::io(&items_path, e))?;
        std::fs::rename(&orders_tmp, &orders_path)
            .map_err(|e| StoreError::io(&orders_path, e))?;

        debug!(
            date = %date,
            orders = orders.len(),
            line_items = line_items.len(),
            "day persisted"
        );
        Ok(())
    }

    pub fn write_partition(&self, partition: &DayPartition) -> Result<(), StoreError> {
        self.write(partition.date, &partition.orders, &partition.line_items)
    }

    /// Read back a persisted day. `None` if the date is not done.
    pub fn read_day(&self, date: NaiveDate) -> Result<Option<DayPartition>, StoreError> {
        if !self.exists(date) {
            return Ok(None);
        }
        let orders = read_records(&self.orders_path(date))?
            .iter()
            .map(OrderSummary::from_record)
            .collect();
        let line_items = read_records(&self.line_items_path(date))?
            .iter()
            .map(LineItem::from_record)
            .collect();
        Ok(Some(DayPartition {
            date,
            orders,
            line_items,
        }))
    }

    /// Done dates within `month`, ascending.
    pub fn completed_dates(&self, month: YearMonth) -> Result<Vec<NaiveDate>, StoreError> {
        let (orders, items) = self.day_files(month)?;
        Ok(orders.intersection(&items).copied().collect())
    }

    /// Dates in `month` with only one of the two files present.
    pub fn partial_dates(&self, month: YearMonth) -> Result<Vec<NaiveDate>, StoreError> {
        let (orders, items) = self.day_files(month)?;
        Ok(orders.symmetric_difference(&items).copied().collect())
    }

    /// Months that have a directory under the root, ascending.
    pub fn months(&self) -> Result<Vec<YearMonth>, StoreError> {
        let mut months = BTreeSet::new();
        for year_dir in read_dir_names(&self.root)? {
            if year_dir.len() != 4 || !year_dir.bytes().all(|b| b.is_ascii_digit()) {
                continue;
            }
            for month_name in read_dir_names(&self.root.join(&year_dir))? {
                if let Ok(ym) = month_name.parse::<YearMonth>() {
                    if ym.to_string() == month_name && ym.year().to_string() == year_dir {
                        months.insert(ym);
                    }
                }
            }
        }
        Ok(months.into_iter().collect())
    }

    fn day_files(
        &self,
        month: YearMonth,
    ) -> Result<(BTreeSet<NaiveDate>, BTreeSet<NaiveDate>), StoreError> {
        let mut orders = BTreeSet::new();
        let mut items = BTreeSet::new();
        for name in read_dir_names(&self.month_dir(month))? {
            if let Some(date) = day_prefix(&name, ORDERS_SUFFIX) {
                if month.contains(date) {
                    orders.insert(date);
                }
            } else if let Some(date) = day_prefix(&name, LINE_ITEMS_SUFFIX) {
                if month.contains(date) {
                    items.insert(date);
                }
            }
        }
        Ok((orders, items))
    }
}

pub(crate) fn month_dir(root: &Path, month: YearMonth) -> PathBuf {
    root.join(format!("{:04}", month.year())).join(month.to_string())
}

/// Parse `<YYYY-MM-DD><suffix>` file names.
pub(crate) fn day_prefix(name: &str, suffix: &str) -> Option<NaiveDate> {
    let stem = name.strip_suffix(suffix)?;
    NaiveDate::parse_from_str(stem, "%Y-%m-%d").ok()
}

/// File names in `dir`, sorted. A missing directory has no entries.
pub(crate) fn read_dir_names(dir: &Path) -> Result<Vec<String>, StoreError> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StoreError::io(dir, e)),
    };
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| StoreError::io(dir, e))?;
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_string());
        }
    }
    names.sort();
    Ok(names)
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
