//! Writing a [`ReconResult`] to an output directory.
//!
//! ```text
//! <out>/summary.csv
//! <out>/<YYYY-MM>/orders_only_candidate.csv
//! <out>/<YYYY-MM>/orders_only_reference.csv
//! <out>/<YYYY-MM>/item_mismatches_raw.csv
//! <out>/<YYYY-MM>/item_mismatches_normalized.csv
//! <out>/top_discrepancies_{raw,normalized}.csv
//! <out>/all_discrepancies_{raw,normalized}.csv
//! <out>/recon.json                       (optional)
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::error::ReconError;
use crate::model::{KeyDelta, MonthComparison, ReconResult};

#[derive(Serialize)]
struct SummaryRow {
    month: String,
    status: String,
    error: String,
    candidate_orders: usize,
    reference_orders: usize,
    orders_delta: i64,
    candidate_only_orders: usize,
    reference_only_orders: usize,
    candidate_line_items: i64,
    reference_line_items: i64,
    line_items_delta: i64,
    raw_mismatches: usize,
    normalized_mismatches: usize,
    candidate_placeholders: i64,
    reference_placeholders: i64,
    candidate_error_placeholders: i64,
    reference_error_placeholders: i64,
    candidate_revenue: String,
    reference_revenue: String,
    revenue_delta: String,
    candidate_same_store: usize,
    candidate_cross_store: usize,
    candidate_unattributed: usize,
    reference_same_store: usize,
    reference_cross_store: usize,
    reference_unattributed: usize,
}

impl SummaryRow {
    fn from_month(m: &MonthComparison) -> Self {
        Self {
            month: m.month.to_string(),
            status: m.status.to_string(),
            error: m.error.clone().unwrap_or_default(),
            candidate_orders: m.candidate.orders,
            reference_orders: m.reference.orders,
            orders_delta: m.orders_delta(),
            candidate_only_orders: m.only_candidate.len(),
            reference_only_orders: m.only_reference.len(),
            candidate_line_items: m.candidate.line_items,
            reference_line_items: m.reference.line_items,
            line_items_delta: m.line_items_delta(),
            raw_mismatches: m.raw_mismatches.len(),
            normalized_mismatches: m.normalized_mismatches.len(),
            candidate_placeholders: m.candidate.placeholder_items,
            reference_placeholders: m.reference.placeholder_items,
            candidate_error_placeholders: m.candidate.error_placeholder_items,
            reference_error_placeholders: m.reference.error_placeholder_items,
            candidate_revenue: m.candidate.revenue.to_string(),
            reference_revenue: m.reference.revenue.to_string(),
            revenue_delta: m.revenue_delta().to_string(),
            candidate_same_store: m.candidate.store_split.same_store,
            candidate_cross_store: m.candidate.store_split.cross_store,
            candidate_unattributed: m.candidate.store_split.unattributed,
            reference_same_store: m.reference.store_split.same_store,
            reference_cross_store: m.reference.store_split.cross_store,
            reference_unattributed: m.reference.store_split.unattributed,
        }
    }
}

#[derive(Serialize)]
struct OrderRow<'a> {
    order_id: &'a str,
}

#[derive(Serialize)]
struct MismatchRow {
    order_id: String,
    key: String,
    product_name: String,
    color: String,
    size: String,
    candidate: i64,
    reference: i64,
    delta: i64,
}

#[derive(Serialize)]
struct DiscrepancyRow {
    rank: usize,
    key: String,
    product_name: String,
    color: String,
    size: String,
    candidate: i64,
    reference: i64,
    delta: i64,
}

fn mismatch_row(d: &KeyDelta) -> MismatchRow {
    MismatchRow {
        order_id: d.order_id.clone().unwrap_or_default(),
        key: d.key.to_string(),
        product_name: d.key.product.clone(),
        color: d.key.color.clone(),
        size: d.key.size.clone(),
        candidate: d.candidate,
        reference: d.reference,
        delta: d.delta,
    }
}

fn discrepancy_rows(deltas: &[KeyDelta]) -> Vec<DiscrepancyRow> {
    deltas
        .iter()
        .enumerate()
        .map(|(i, d)| DiscrepancyRow {
            rank: i + 1,
            key: d.key.to_string(),
            product_name: d.key.product.clone(),
            color: d.key.color.clone(),
            size: d.key.size.clone(),
            candidate: d.candidate,
            reference: d.reference,
            delta: d.delta,
        })
        .collect()
}

/// Serialize `rows` to `path`. Headers come from the row type; an empty
/// file gets `header`, which must list the same fields.
fn write_csv<T: Serialize>(path: &Path, header: &[&str], rows: &[T]) -> Result<(), ReconError> {
    let csv_err = |source| ReconError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .has_headers(!rows.is_empty())
        .from_path(path)
        .map_err(csv_err)?;
    if rows.is_empty() {
        writer.write_record(header).map_err(csv_err)?;
    }
    for row in rows {
        writer.serialize(row).map_err(csv_err)?;
    }
    writer.flush().map_err(|source| ReconError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), rows = rows.len(), "written");
    Ok(())
}

const SUMMARY_HEADER: &[&str] = &[
    "month",
    "status",
    "error",
    "candidate_orders",
    "reference_orders",
    "orders_delta",
    "candidate_only_orders",
    "reference_only_orders",
    "candidate_line_items",
    "reference_line_items",
    "line_items_delta",
    "raw_mismatches",
    "normalized_mismatches",
    "candidate_placeholders",
    "reference_placeholders",
    "candidate_error_placeholders",
    "reference_error_placeholders",
    "candidate_revenue",
    "reference_revenue",
    "revenue_delta",
    "candidate_same_store",
    "candidate_cross_store",
    "candidate_unattributed",
    "reference_same_store",
    "reference_cross_store",
    "reference_unattributed",
];
const ORDER_HEADER: &[&str] = &["order_id"];
const MISMATCH_HEADER: &[&str] = &[
    "order_id", "key", "product_name", "color", "size", "candidate", "reference", "delta",
];
const DISCREPANCY_HEADER: &[&str] = &[
    "rank", "key", "product_name", "color", "size", "candidate", "reference", "delta",
];

fn create_dir(dir: &Path) -> Result<(), ReconError> {
    fs::create_dir_all(dir).map_err(|source| ReconError::Io {
        path: dir.to_path_buf(),
        source,
    })
}

/// Write every report file under `out`. Returns the paths written.
pub fn write_outputs(result: &ReconResult, out: &Path, json: bool) -> Result<Vec<PathBuf>, ReconError> {
    create_dir(out)?;
    let mut written = Vec::new();

    let summary: Vec<SummaryRow> = result.months.iter().map(SummaryRow::from_month).collect();
    let path = out.join("summary.csv");
    write_csv(&path, SUMMARY_HEADER, &summary)?;
    written.push(path);

    for m in result.months.iter().filter(|m| m.is_ok()) {
        let dir = out.join(m.month.to_string());
        create_dir(&dir)?;

        for (name, ids) in [
            ("orders_only_candidate.csv", &m.only_candidate),
            ("orders_only_reference.csv", &m.only_reference),
        ] {
            let rows: Vec<OrderRow> = ids.iter().map(|id| OrderRow { order_id: id }).collect();
            let path = dir.join(name);
            write_csv(&path, ORDER_HEADER, &rows)?;
            written.push(path);
        }
        for (name, deltas) in [
            ("item_mismatches_raw.csv", &m.raw_mismatches),
            ("item_mismatches_normalized.csv", &m.normalized_mismatches),
        ] {
            let rows: Vec<MismatchRow> = deltas.iter().map(mismatch_row).collect();
            let path = dir.join(name);
            write_csv(&path, MISMATCH_HEADER, &rows)?;
            written.push(path);
        }
    }

    for (name, deltas) in [
        ("top_discrepancies_raw.csv", &result.raw.top),
        ("top_discrepancies_normalized.csv", &result.normalized.top),
        ("all_discrepancies_raw.csv", &result.raw.all),
        ("all_discrepancies_normalized.csv", &result.normalized.all),
    ] {
        let path = out.join(name);
        write_csv(&path, DISCREPANCY_HEADER, &discrepancy_rows(deltas))?;
        written.push(path);
    }

    if json {
        let path = out.join("recon.json");
        let text = serde_json::to_string_pretty(result)?;
        fs::write(&path, text).map_err(|source| ReconError::Io {
            path: path.clone(),
            source,
        })?;
        written.push(path);
    }

    Ok(written)
}
