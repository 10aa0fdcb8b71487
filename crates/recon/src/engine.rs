use std::collections::BTreeSet;

use ordertrace_core::{ItemKey, PlaceholderKind, YearMonth};
use rayon::prelude::*;
use tracing::{info, warn};

use crate::config::ReconConfig;
use crate::error::ReconError;
use crate::load::load_side;
use crate::model::{
    ItemRow, KeyCounts, KeyDelta, MonthComparison, MonthStatus, ReconResult,
    ReconSummary, SideData, SideSummary, StoreSplit,
};
use crate::report::discrepancies;

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

/// Reconcile every month of the configured range. Months are compared in
/// parallel; results come back in month order. A month whose data cannot be
/// read is marked failed and left out of the ranking.
pub fn run(config: &ReconConfig) -> Result<ReconResult, ReconError> {
    config.validate()?;
    let months = config.months()?;
    info!(
        candidate = %config.candidate.root.display(),
        reference = %config.reference.root.display(),
        months = months.len(),
        "reconciling"
    );

    let comparisons: Vec<MonthComparison> = months
        .par_iter()
        .map(|&month| reconcile_month(config, month))
        .collect();

    Ok(assemble(
        comparisons,
        config.output.top,
        config.output.include_placeholders,
    ))
}

/// Load and compare one month. Never fails; load errors become a failed
/// comparison.
pub fn reconcile_month(config: &ReconConfig, month: YearMonth) -> MonthComparison {
    let load = || -> Result<(SideData, SideData), ReconError> {
        let candidate = load_side(&config.candidate, "candidate", month, &config.perspective)?;
        let reference = load_side(&config.reference, "reference", month, &config.perspective)?;
        Ok((candidate, reference))
    };
    match load() {
        Ok((candidate, reference)) => compare_month(month, &candidate, &reference),
        Err(e) => {
            warn!(month = %month, error = %e, "month failed");
            MonthComparison::failed(month, e.to_string())
        }
    }
}

/// Rank discrepancies and total the summary over already compared months.
pub fn assemble(
    months: Vec<MonthComparison>,
    top: usize,
    include_placeholders: bool,
) -> ReconResult {
    let raw = discrepancies(&months, false, top, include_placeholders);
    let normalized = discrepancies(&months, true, top, include_placeholders);

    let mut summary = ReconSummary {
        months: months.len(),
        raw_discrepant_keys: raw.all.len(),
        normalized_discrepant_keys: normalized.all.len(),
        ..Default::default()
    };
    for m in &months {
        if m.status == MonthStatus::Failed {
            summary.failed_months += 1;
            continue;
        }
        summary.candidate_orders += m.candidate.orders;
        summary.reference_orders += m.reference.orders;
        summary.only_candidate += m.only_candidate.len();
        summary.only_reference += m.only_reference.len();
        summary.raw_mismatches += m.raw_mismatches.len();
        summary.normalized_mismatches += m.normalized_mismatches.len();
    }

    ReconResult {
        summary,
        months,
        raw,
        normalized,
    }
}

// ---------------------------------------------------------------------------
// Month comparison
// ---------------------------------------------------------------------------

fn key_counts<'a>(rows: impl IntoIterator<Item = &'a ItemRow>, normalize: bool) -> Vec<(ItemKey, i64)> {
    rows.into_iter()
        .map(|r| {
            let key = if normalize { r.key.normalized() } else { r.key.clone() };
            (key, r.quantity)
        })
        .collect()
}

fn add(counts: &mut KeyCounts, weighted: Vec<(ItemKey, i64)>, candidate: bool) {
    for (key, qty) in weighted {
        let entry = counts.entry(key).or_default();
        if candidate {
            entry.candidate += qty;
        } else {
            entry.reference += qty;
        }
    }
}

fn order_diff(order_id: &str, candidate: &[ItemRow], reference: &[ItemRow], normalize: bool) -> Vec<KeyDelta> {
    let mut counts = KeyCounts::new();
    add(&mut counts, key_counts(candidate, normalize), true);
    add(&mut counts, key_counts(reference, normalize), false);
    counts
        .into_iter()
        .filter(|(_, c)| c.delta() != 0)
        .map(|(key, c)| KeyDelta::new(Some(order_id.to_string()), key, c))
        .collect()
}

fn month_counts(candidate: &SideData, reference: &SideData, normalize: bool) -> KeyCounts {
    let mut counts = KeyCounts::new();
    add(&mut counts, key_counts(candidate.items.values().flatten(), normalize), true);
    add(&mut counts, key_counts(reference.items.values().flatten(), normalize), false);
    counts
}

fn store_split(side: &SideData) -> StoreSplit {
    let mut split = StoreSplit::default();
    for id in side.order_ids() {
        match side.orders.get(id) {
            Some(info)
                if !info.fulfillment_location.is_empty() && !info.demand_location.is_empty() =>
            {
                if info
                    .fulfillment_location
                    .eq_ignore_ascii_case(&info.demand_location)
                {
                    split.same_store += 1;
                } else {
                    split.cross_store += 1;
                }
            }
            _ => split.unattributed += 1,
        }
    }
    split
}

fn summarize(side: &SideData) -> SideSummary {
    let mut summary = SideSummary {
        orders: side.order_ids().count(),
        store_split: store_split(side),
        files: side.files,
        ..Default::default()
    };
    for row in side.items.values().flatten() {
        summary.line_items += row.quantity;
        summary.revenue += row.revenue;
        match ordertrace_core::placeholder_kind(&row.key.product) {
            Some(PlaceholderKind::StorePurchase) => summary.placeholder_items += row.quantity,
            Some(PlaceholderKind::Error) => summary.error_placeholder_items += row.quantity,
            None => {}
        }
    }
    summary
}

/// Compare one month of two sides. Pure and deterministic; swapping the
/// sides swaps every count and negates every delta.
pub fn compare_month(month: YearMonth, candidate: &SideData, reference: &SideData) -> MonthComparison {
    let ids_c: BTreeSet<&String> = candidate.order_ids().collect();
    let ids_r: BTreeSet<&String> = reference.order_ids().collect();

    let only_candidate: Vec<String> = ids_c.difference(&ids_r).map(|s| s.to_string()).collect();
    let only_reference: Vec<String> = ids_r.difference(&ids_c).map(|s| s.to_string()).collect();

    let mut raw_mismatches = Vec::new();
    let mut normalized_mismatches = Vec::new();
    for id in ids_c.intersection(&ids_r) {
        let c = candidate.items.get(*id).map(Vec::as_slice).unwrap_or(&[]);
        let r = reference.items.get(*id).map(Vec::as_slice).unwrap_or(&[]);
        raw_mismatches.extend(order_diff(id, c, r, false));
        normalized_mismatches.extend(order_diff(id, c, r, true));
    }

    MonthComparison {
        month,
        status: MonthStatus::Ok,
        error: None,
        candidate: summarize(candidate),
        reference: summarize(reference),
        only_candidate,
        only_reference,
        raw_mismatches,
        normalized_mismatches,
        raw_counts: month_counts(candidate, reference, false),
        normalized_counts: month_counts(candidate, reference, true),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::OrderInfo;
    use ordertrace_core::Money;

    fn row(key: &str, qty: i64) -> ItemRow {
        ItemRow {
            key: ItemKey::parse(key),
            quantity: qty,
            revenue: Money(1000 * qty),
        }
    }

    fn side(orders: &[(&str, &str, &str)], items: &[(&str, &str, i64)]) -> SideData {
        let mut s = SideData::default();
        for (id, f, d) in orders {
            s.orders.insert(
                id.to_string(),
                OrderInfo {
                    fulfillment_location: f.to_string(),
                    demand_location: d.to_string(),
                },
            );
        }
        for (id, key, qty) in items {
            s.items.entry(id.to_string()).or_default().push(row(key, *qty));
        }
        s
    }

    fn may() -> YearMonth {
        YearMonth::new(2024, 5).unwrap()
    }

    #[test]
    fn per_order_quantity_mismatch() {
        let a = side(&[("O1", "A", "A")], &[("O1", "Shirt|Red|M", 2)]);
        let b = side(&[("O1", "A", "A")], &[("O1", "Shirt|Red|M", 1)]);
        let m = compare_month(may(), &a, &b);
        assert_eq!(m.raw_mismatches.len(), 1);
        let d = &m.raw_mismatches[0];
        assert_eq!(d.order_id.as_deref(), Some("O1"));
        assert_eq!(d.key.to_string(), "Shirt|Red|M");
        assert_eq!((d.candidate, d.reference, d.delta), (2, 1, 1));
    }

    #[test]
    fn formatting_only_difference_disappears_after_normalization() {
        let a = side(&[], &[("O1", "Men's Tee|Red|M", 1)]);
        let b = side(&[], &[("O1", "mens tee|red|m", 1)]);
        let m = compare_month(may(), &a, &b);
        assert_eq!(m.raw_mismatches.len(), 2);
        assert!(m.normalized_mismatches.is_empty());
    }

    #[test]
    fn order_sets_include_item_only_ids() {
        let a = side(&[("O1", "", "")], &[("O2", "Cap||", 1)]);
        let b = side(&[("O1", "", "")], &[]);
        let m = compare_month(may(), &a, &b);
        assert_eq!(m.only_candidate, vec!["O2"]);
        assert!(m.only_reference.is_empty());
        assert_eq!(m.candidate.orders, 2);
    }

    #[test]
    fn store_split_leaves_blanks_unattributed() {
        let a = side(
            &[("1", "Downtown", "downtown"), ("2", "Downtown", "Web"), ("3", "", "Web")],
            &[("4", "Cap||", 1)],
        );
        let split = summarize(&a).store_split;
        assert_eq!(split.same_store, 1);
        assert_eq!(split.cross_store, 1);
        assert_eq!(split.unattributed, 2);
    }

    #[test]
    fn placeholders_are_counted_separately() {
        let a = side(
            &[],
            &[("1", "Store Purchase||", 1), ("2", "Error - Store Purchase||", 1), ("3", "Tee||", 3)],
        );
        let s = summarize(&a);
        assert_eq!(s.line_items, 5);
        assert_eq!(s.placeholder_items, 1);
        assert_eq!(s.error_placeholder_items, 1);
        assert_eq!(s.revenue, Money(5000));
    }

    #[test]
    fn failed_months_do_not_count() {
        let ok = compare_month(may(), &side(&[("O1", "", "")], &[]), &SideData::default());
        let failed = MonthComparison::failed(YearMonth::new(2024, 6).unwrap(), "unreadable".into());
        let result = assemble(vec![ok, failed], 10, false);
        assert_eq!(result.summary.months, 2);
        assert_eq!(result.summary.failed_months, 1);
        assert_eq!(result.summary.only_candidate, 1);
        assert_eq!(result.months[1].status, MonthStatus::Failed);
    }
}
