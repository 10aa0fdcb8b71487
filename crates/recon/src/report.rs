//! Discrepancy Reporter: range-level key totals, ranked.

use std::cmp::Ordering;

use crate::model::{Discrepancies, KeyCounts, KeyDelta, MonthComparison};

/// Sum per-key counts over every month with status `ok`.
pub fn aggregate(months: &[MonthComparison], normalized: bool) -> KeyCounts {
    let mut totals = KeyCounts::new();
    for m in months.iter().filter(|m| m.is_ok()) {
        let counts = if normalized {
            &m.normalized_counts
        } else {
            &m.raw_counts
        };
        for (key, count) in counts {
            totals.entry(key.clone()).or_default().add(*count);
        }
    }
    totals
}

/// `|delta|` descending, then candidate count descending, then key.
pub fn rank_order(a: &KeyDelta, b: &KeyDelta) -> Ordering {
    b.delta
        .abs()
        .cmp(&a.delta.abs())
        .then_with(|| b.candidate.cmp(&a.candidate))
        .then_with(|| a.key.cmp(&b.key))
}

/// Every key with a non-zero delta, ordered by key.
pub fn nonzero(totals: &KeyCounts) -> Vec<KeyDelta> {
    totals
        .iter()
        .filter(|(_, c)| c.delta() != 0)
        .map(|(key, c)| KeyDelta::new(None, key.clone(), *c))
        .collect()
}

/// Ranked discrepancies. Placeholder keys are left out unless
/// `include_placeholders`; the result is cut to `top` rows.
pub fn rank(totals: &KeyCounts, top: usize, include_placeholders: bool) -> Vec<KeyDelta> {
    let mut ranked: Vec<KeyDelta> = nonzero(totals)
        .into_iter()
        .filter(|d| include_placeholders || d.placeholder_kind().is_none())
        .collect();
    ranked.sort_by(rank_order);
    ranked.truncate(top);
    ranked
}

/// Both report variants for raw or normalized keys.
pub fn discrepancies(
    months: &[MonthComparison],
    normalized: bool,
    top: usize,
    include_placeholders: bool,
) -> Discrepancies {
    let totals = aggregate(months, normalized);
    Discrepancies {
        top: rank(&totals, top, include_placeholders),
        all: nonzero(&totals),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::KeyCount;
    use ordertrace_core::ItemKey;
    use proptest::prelude::*;

    fn totals(rows: &[(&str, i64, i64)]) -> KeyCounts {
        rows.iter()
            .map(|(k, c, r)| (ItemKey::parse(k), KeyCount { candidate: *c, reference: *r }))
            .collect()
    }

    #[test]
    fn ranks_by_magnitude_then_candidate() {
        let t = totals(&[
            ("A||", 1, 4),
            ("B||", 5, 2),
            ("C||", 9, 6),
            ("D||", 2, 2),
            ("E||", 0, 1),
        ]);
        let keys: Vec<String> = rank(&t, 10, false).iter().map(|d| d.key.product.clone()).collect();
        assert_eq!(keys, vec!["C", "B", "A", "E"]);
    }

    #[test]
    fn top_n_truncates_but_all_keeps_everything() {
        let t = totals(&[("A||", 1, 0), ("B||", 2, 0), ("C||", 3, 0)]);
        assert_eq!(rank(&t, 2, false).len(), 2);
        assert_eq!(nonzero(&t).len(), 3);
    }

    #[test]
    fn placeholders_need_opt_in() {
        let t = totals(&[("Error - Store Purchase||", 1, 0), ("Tee||", 0, 1)]);
        assert_eq!(rank(&t, 10, false).len(), 1);
        assert_eq!(rank(&t, 10, true).len(), 2);
        assert_eq!(nonzero(&t).len(), 2);
    }

    fn arb_totals() -> impl Strategy<Value = KeyCounts> {
        prop::collection::btree_map("[a-e]{1,2}", (0i64..20, 0i64..20), 0..30).prop_map(|m| {
            m.into_iter()
                .map(|(k, (c, r))| (ItemKey::new(&k, "", ""), KeyCount { candidate: c, reference: r }))
                .collect()
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn ranking_is_stable(t in arb_totals()) {
            let ranked = rank(&t, usize::MAX, true);
            for pair in ranked.windows(2) {
                let (a, b) = (&pair[0], &pair[1]);
                prop_assert!(a.delta.abs() >= b.delta.abs());
                if a.delta.abs() == b.delta.abs() {
                    prop_assert!(a.candidate >= b.candidate);
                }
            }
            prop_assert!(ranked.iter().all(|d| d.delta != 0));
        }
    }
}
