use std::path::{Path, PathBuf};

use ordertrace_core::model::columns;
use ordertrace_core::YearMonth;
use serde::{Deserialize, Serialize};

use crate::error::ReconError;

pub const DEFAULT_TOP_N: usize = 100;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// A reconciliation run, usually read from a `recon.toml`:
///
/// ```toml
/// [candidate]
/// root = "orders"
///
/// [reference]
/// root = "canonical"
/// [reference.columns]
/// order_id = "Order Number"
/// product_name = "Item"
///
/// [range]
/// from = "2024-01"
/// to = "2024-06"
///
/// [output]
/// dir = "recon-out"
/// top = 50
///
/// [perspective]
/// fulfillment_locations = ["Downtown"]
/// ```
///
/// Every section is optional in the file so CLI flags can fill the gaps;
/// [`ReconConfig::validate`] checks the merged result.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReconConfig {
    pub candidate: SideConfig,
    pub reference: SideConfig,
    pub range: RangeConfig,
    pub output: OutputConfig,
    pub perspective: PerspectiveConfig,
}

// ---------------------------------------------------------------------------
// Sides
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SideConfig {
    pub root: PathBuf,
    pub columns: ColumnMapping,
}

/// Column names a side's files use. Defaults match the store's own headers.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ColumnMapping {
    pub order_id: String,
    pub product_name: String,
    pub color: String,
    pub size: String,
    pub quantity: String,
    pub unit_price: String,
    pub line_discount: String,
    pub discounted_price: String,
    pub fulfillment_location: String,
    pub demand_location: String,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            order_id: columns::ORDER_ID.into(),
            product_name: columns::PRODUCT_NAME.into(),
            color: columns::COLOR.into(),
            size: columns::SIZE.into(),
            quantity: columns::QUANTITY.into(),
            unit_price: columns::UNIT_PRICE.into(),
            line_discount: columns::LINE_DISCOUNT.into(),
            discounted_price: columns::DISCOUNTED_PRICE.into(),
            fulfillment_location: columns::FULFILLMENT_LOCATION.into(),
            demand_location: columns::DEMAND_LOCATION.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Range + Output + Perspective
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RangeConfig {
    pub from: Option<YearMonth>,
    pub to: Option<YearMonth>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub dir: Option<PathBuf>,
    /// Rows in the ranked top-discrepancy files.
    pub top: usize,
    /// Rank placeholder line items alongside real products.
    pub include_placeholders: bool,
    /// Also write `recon.json`.
    pub json: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: None,
            top: DEFAULT_TOP_N,
            include_placeholders: false,
            json: false,
        }
    }
}

/// Restricts both sides to orders fulfilled at and/or demanded by the given
/// locations. An empty list means no restriction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PerspectiveConfig {
    pub fulfillment_locations: Vec<String>,
    pub demand_locations: Vec<String>,
}

impl PerspectiveConfig {
    pub fn is_empty(&self) -> bool {
        self.fulfillment_locations.is_empty() && self.demand_locations.is_empty()
    }

    /// Whether an order with these locations is in view.
    pub fn admits(&self, fulfillment: &str, demand: &str) -> bool {
        let hit = |set: &[String], value: &str| {
            set.is_empty() || set.iter().any(|s| s.trim().eq_ignore_ascii_case(value.trim()))
        };
        hit(&self.fulfillment_locations, fulfillment) && hit(&self.demand_locations, demand)
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconConfig {
    /// Parse without validating; flags may still complete it.
    pub fn from_toml(input: &str, path: &Path) -> Result<Self, ReconError> {
        toml::from_str(input).map_err(|source| ReconError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ReconError> {
        let input = std::fs::read_to_string(path).map_err(|source| ReconError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&input, path)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if self.candidate.root.as_os_str().is_empty() {
            return Err(ReconError::ConfigValidation("candidate root is required".into()));
        }
        if self.reference.root.as_os_str().is_empty() {
            return Err(ReconError::ConfigValidation("reference root is required".into()));
        }
        self.months()?;
        if self.output.top == 0 {
            return Err(ReconError::ConfigValidation("output.top must be at least 1".into()));
        }
        Ok(())
    }

    /// Months of the inclusive range, ascending.
    pub fn months(&self) -> Result<Vec<YearMonth>, ReconError> {
        let (Some(from), Some(to)) = (self.range.from, self.range.to) else {
            return Err(ReconError::ConfigValidation(
                "range.from and range.to are required".into(),
            ));
        };
        YearMonth::range_inclusive(from, to)
            .map_err(|e| ReconError::ConfigValidation(format!("invalid range: {}", e)))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
