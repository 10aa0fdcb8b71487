use std::collections::BTreeMap;

use ordertrace_core::{ItemKey, Money, PlaceholderKind, YearMonth};
use serde::{Serialize, Serializer};

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// One line item of a side, reduced to what reconciliation looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRow {
    pub key: ItemKey,
    /// Quantity weight; 1 when missing or unparseable.
    pub quantity: i64,
    pub revenue: Money,
}

/// Locations of an order listed in a side's orders file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderInfo {
    pub fulfillment_location: String,
    pub demand_location: String,
}

/// One side's data for one month.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SideData {
    /// Orders from the orders files. Ids referenced only by line items are
    /// absent here but present in `items`.
    pub orders: BTreeMap<String, OrderInfo>,
    /// Line items per order id.
    pub items: BTreeMap<String, Vec<ItemRow>>,
    pub files: usize,
}

impl SideData {
    /// Order-id set: ids from the orders files plus ids referenced by items.
    pub fn order_ids(&self) -> impl Iterator<Item = &String> {
        let mut ids: Vec<&String> = self.orders.keys().chain(self.items.keys()).collect();
        ids.sort();
        ids.dedup();
        ids.into_iter()
    }
}

// ---------------------------------------------------------------------------
// Key counts
// ---------------------------------------------------------------------------

/// Quantity-weighted counts of one key on both sides.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct KeyCount {
    pub candidate: i64,
    pub reference: i64,
}

impl KeyCount {
    pub fn delta(&self) -> i64 {
        self.candidate - self.reference
    }

    pub fn add(&mut self, other: KeyCount) {
        self.candidate += other.candidate;
        self.reference += other.reference;
    }

    pub fn swapped(self) -> Self {
        Self {
            candidate: self.reference,
            reference: self.candidate,
        }
    }
}

pub type KeyCounts = BTreeMap<ItemKey, KeyCount>;

fn serialize_key<S: Serializer>(key: &ItemKey, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(key)
}

/// An unequal key count, per order or aggregated over a range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyDelta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(serialize_with = "serialize_key")]
    pub key: ItemKey,
    pub candidate: i64,
    pub reference: i64,
    pub delta: i64,
}

impl KeyDelta {
    pub fn new(order_id: Option<String>, key: ItemKey, count: KeyCount) -> Self {
        Self {
            order_id,
            key,
            candidate: count.candidate,
            reference: count.reference,
            delta: count.delta(),
        }
    }

    pub fn placeholder_kind(&self) -> Option<PlaceholderKind> {
        ordertrace_core::placeholder_kind(&self.key.product)
    }
}

// ---------------------------------------------------------------------------
// Month comparison
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MonthStatus {
    Ok,
    Failed,
}

impl std::fmt::Display for MonthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Orders split by fulfillment-location = demand-location. Orders with a
/// blank location on either field are `unattributed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreSplit {
    pub same_store: usize,
    pub cross_store: usize,
    pub unattributed: usize,
}

/// Totals of one side for one month.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SideSummary {
    pub orders: usize,
    /// Quantity-weighted line items, placeholders included.
    pub line_items: i64,
    pub placeholder_items: i64,
    pub error_placeholder_items: i64,
    pub revenue: Money,
    pub store_split: StoreSplit,
    pub files: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthComparison {
    pub month: YearMonth,
    pub status: MonthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub candidate: SideSummary,
    pub reference: SideSummary,
    pub only_candidate: Vec<String>,
    pub only_reference: Vec<String>,
    /// Per-order key mismatches on raw keys.
    pub raw_mismatches: Vec<KeyDelta>,
    /// Per-order key mismatches after normalization.
    pub normalized_mismatches: Vec<KeyDelta>,
    /// Month-wide counts per raw key, for range-level ranking.
    #[serde(skip)]
    pub raw_counts: KeyCounts,
    #[serde(skip)]
    pub normalized_counts: KeyCounts,
}

impl MonthComparison {
    pub fn failed(month: YearMonth, error: String) -> Self {
        Self {
            month,
            status: MonthStatus::Failed,
            error: Some(error),
            candidate: SideSummary::default(),
            reference: SideSummary::default(),
            only_candidate: Vec::new(),
            only_reference: Vec::new(),
            raw_mismatches: Vec::new(),
            normalized_mismatches: Vec::new(),
            raw_counts: KeyCounts::new(),
            normalized_counts: KeyCounts::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == MonthStatus::Ok
    }

    pub fn orders_delta(&self) -> i64 {
        self.candidate.orders as i64 - self.reference.orders as i64
    }

    pub fn line_items_delta(&self) -> i64 {
        self.candidate.line_items - self.reference.line_items
    }

    pub fn revenue_delta(&self) -> Money {
        self.candidate.revenue - self.reference.revenue
    }
}

// ---------------------------------------------------------------------------
// Summary + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconSummary {
    pub months: usize,
    pub failed_months: usize,
    pub candidate_orders: usize,
    pub reference_orders: usize,
    pub only_candidate: usize,
    pub only_reference: usize,
    pub raw_mismatches: usize,
    pub normalized_mismatches: usize,
    pub raw_discrepant_keys: usize,
    pub normalized_discrepant_keys: usize,
}

impl ReconSummary {
    pub fn is_clean(&self) -> bool {
        self.only_candidate == 0
            && self.only_reference == 0
            && self.raw_mismatches == 0
            && self.raw_discrepant_keys == 0
    }
}

/// Range-level ranked discrepancies for one key form.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Discrepancies {
    pub top: Vec<KeyDelta>,
    pub all: Vec<KeyDelta>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconResult {
    pub summary: ReconSummary,
    pub months: Vec<MonthComparison>,
    pub raw: Discrepancies,
    pub normalized: Discrepancies,
}
