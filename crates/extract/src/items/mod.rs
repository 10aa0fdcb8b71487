//! Line-Item Extractor.
//!
//! An order's detail view is run through an ordered chain of strategies; the
//! first one that yields at least one item wins. When none does, or the
//! detail view could not be loaded, a single placeholder item is
//! synthesized so every order has at least one line item.

pub mod fields;
pub mod free_text;
pub mod prices;
pub mod structured;

use std::panic::{catch_unwind, AssertUnwindSafe};

use ordertrace_core::{LineItem, OrderSummary, PlaceholderKind};
use tracing::{debug, warn};

use crate::error::ExtractError;
use crate::page::PageSnapshot;

pub use free_text::FreeTextLines;
pub use structured::StructuredGroups;

/// One heuristic for turning a detail page into line items.
pub trait LineItemStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Items found on `page`, or empty if this strategy does not apply.
    /// Order id, line numbers and status are filled in by the chain.
    ///
    /// Implementations should not panic. If one does, the chain stops and
    /// the order gets an error placeholder instead of aborting the run.
    fn extract(&self, order: &OrderSummary, page: &PageSnapshot) -> Vec<LineItem>;
}

/// Result of running the chain for one order.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub items: Vec<LineItem>,
    /// Name of the strategy that produced `items`.
    pub strategy: &'static str,
    pub placeholder: Option<PlaceholderKind>,
}

pub const PLACEHOLDER_STRATEGY: &str = "placeholder";
pub const ERROR_PLACEHOLDER_STRATEGY: &str = "error_placeholder";

pub struct StrategyChain {
    strategies: Vec<Box<dyn LineItemStrategy>>,
}

impl Default for StrategyChain {
    fn default() -> Self {
        Self::new(vec![Box::new(StructuredGroups), Box::new(FreeTextLines)])
    }
}

impl StrategyChain {
    pub fn new(strategies: Vec<Box<dyn LineItemStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Extract line items for `order` from its loaded detail view, or from
    /// the error that prevented loading it. Never fails.
    pub fn extract(
        &self,
        order: &OrderSummary,
        detail: Result<&PageSnapshot, &ExtractError>,
    ) -> Extraction {
        let page = match detail {
            Ok(page) => page,
            Err(e) => {
                warn!(order_id = %order.order_id, error = %e, "detail view unavailable, using error placeholder");
                return placeholder(order, true);
            }
        };

        for strategy in &self.strategies {
            let items = match catch_unwind(AssertUnwindSafe(|| strategy.extract(order, page))) {
                Ok(items) => items,
                Err(_) => {
                    warn!(
                        order_id = %order.order_id,
                        strategy = strategy.name(),
                        "line-item strategy panicked, using error placeholder"
                    );
                    return placeholder(order, true);
                }
            };
            if items.is_empty() {
                continue;
            }
            debug!(
                order_id = %order.order_id,
                strategy = strategy.name(),
                items = items.len(),
                "line items extracted"
            );
            return Extraction {
                items: finish(order, items),
                strategy: strategy.name(),
                placeholder: None,
            };
        }

        debug!(order_id = %order.order_id, "no structured line items, using placeholder");
        placeholder(order, false)
    }
}

fn placeholder(order: &OrderSummary, failed: bool) -> Extraction {
    let item = LineItem::placeholder(order, failed);
    let kind = item.placeholder_kind();
    Extraction {
        items: vec![item],
        strategy: if failed {
            ERROR_PLACEHOLDER_STRATEGY
        } else {
            PLACEHOLDER_STRATEGY
        },
        placeholder: kind,
    }
}

fn finish(order: &OrderSummary, items: Vec<LineItem>) -> Vec<LineItem> {
    items
        .into_iter()
        .enumerate()
        .map(|(i, mut item)| {
            item.order_id = order.order_id.clone();
            item.line_number = i as u32 + 1;
            if item.status.is_empty() {
                item.status = order.status.clone();
            }
            item
        })
        .collect()
}
