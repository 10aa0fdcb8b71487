//! Page Extractor: paginated order list → ordered `OrderSummary` records.

use std::collections::HashSet;

use ordertrace_core::money::parse_amount;
use ordertrace_core::OrderSummary;
use tracing::{debug, warn};

use crate::error::ExtractError;
use crate::page::PageSnapshot;
use crate::session::ConsoleSession;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListColumn {
    OrderId,
    Customer,
    Associate,
    DateTime,
    ChannelType,
    Channel,
    FulfillmentLocation,
    DemandLocation,
    Total,
    Discount,
    Status,
}

/// Header labels the console uses for each column, lower-cased with
/// trailing `:` removed.
const ALIASES: &[(&str, ListColumn)] = &[
    ("order #", ListColumn::OrderId),
    ("order", ListColumn::OrderId),
    ("order id", ListColumn::OrderId),
    ("order number", ListColumn::OrderId),
    ("order no.", ListColumn::OrderId),
    ("customer", ListColumn::Customer),
    ("customer name", ListColumn::Customer),
    ("associate", ListColumn::Associate),
    ("sales associate", ListColumn::Associate),
    ("employee", ListColumn::Associate),
    ("date", ListColumn::DateTime),
    ("order date", ListColumn::DateTime),
    ("date/time", ListColumn::DateTime),
    ("created", ListColumn::DateTime),
    ("channel type", ListColumn::ChannelType),
    ("channel", ListColumn::Channel),
    ("fulfillment location", ListColumn::FulfillmentLocation),
    ("fulfilment location", ListColumn::FulfillmentLocation),
    ("fulfillment store", ListColumn::FulfillmentLocation),
    ("demand location", ListColumn::DemandLocation),
    ("demand store", ListColumn::DemandLocation),
    ("total", ListColumn::Total),
    ("order total", ListColumn::Total),
    ("discount", ListColumn::Discount),
    ("discounts", ListColumn::Discount),
    ("total discount", ListColumn::Discount),
    ("status", ListColumn::Status),
    ("order status", ListColumn::Status),
];

pub fn column_for_label(label: &str) -> Option<ListColumn> {
    let cleaned = label
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    let cleaned = cleaned.trim_end_matches(':').trim();
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == cleaned)
        .map(|(_, col)| *col)
}

/// Rows and continuation parsed from one list page.
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub orders: Vec<OrderSummary>,
    /// Rows without an order id.
    pub malformed_rows: usize,
    /// Absolute URL of the next page, if a live "Next" control exists.
    pub next: Option<String>,
}

fn is_row(page: &PageSnapshot, idx: usize) -> bool {
    let el = page.get(idx);
    el.is("tr") || el.attr("role") == Some("row")
}

fn is_table(page: &PageSnapshot, idx: usize) -> bool {
    let el = page.get(idx);
    el.is("table") || matches!(el.attr("role"), Some("table") | Some("grid"))
}

fn row_cells(page: &PageSnapshot, row: usize) -> Vec<usize> {
    page.children(row)
}

/// Map of cell position → column, if `row` is a header row.
fn header_columns(page: &PageSnapshot, row: usize) -> Option<Vec<Option<ListColumn>>> {
    let cols: Vec<Option<ListColumn>> = row_cells(page, row)
        .into_iter()
        .map(|cell| column_for_label(&page.text_content(cell)))
        .collect();
    if cols.contains(&Some(ListColumn::OrderId)) && cols.iter().flatten().count() >= 2 {
        Some(cols)
    } else {
        None
    }
}

fn enclosing_table(page: &PageSnapshot, idx: usize) -> Option<usize> {
    page.ancestors(idx).find(|&a| is_table(page, a))
}

/// Parse one list page.
pub fn parse_list_page(page: &PageSnapshot) -> ListPage {
    let mut out = ListPage {
        next: find_next(page),
        ..Default::default()
    };

    let Some((header_row, columns)) = (0..page.len())
        .filter(|&i| is_row(page, i))
        .find_map(|i| header_columns(page, i).map(|cols| (i, cols)))
    else {
        return out;
    };
    let table = enclosing_table(page, header_row);

    for row in (page.get(header_row).end..page.len()).filter(|&i| is_row(page, i)) {
        if enclosing_table(page, row) != table {
            continue;
        }
        // Repeated header rows (sticky headers, per-group headers).
        if header_columns(page, row).is_some() {
            continue;
        }
        let cells = row_cells(page, row);
        if cells.iter().all(|&c| page.text_content(c).trim().is_empty()) {
            continue;
        }

        let mut order = OrderSummary::default();
        for (pos, cell) in cells.iter().enumerate() {
            let Some(Some(column)) = columns.get(pos) else {
                continue;
            };
            let text = page.text_content(*cell);
            let text = text.trim();
            match column {
                ListColumn::OrderId => order.order_id = text.trim_start_matches('#').trim().to_string(),
                ListColumn::Customer => order.customer_name = text.to_string(),
                ListColumn::Associate => order.associate = text.to_string(),
                ListColumn::DateTime => order.display_date_time = text.to_string(),
                ListColumn::ChannelType => order.channel_type = text.to_string(),
                ListColumn::Channel => order.channel = text.to_string(),
                ListColumn::FulfillmentLocation => order.fulfillment_location = text.to_string(),
                ListColumn::DemandLocation => order.demand_location = text.to_string(),
                ListColumn::Total => order.total = parse_amount(text),
                ListColumn::Discount => order.discount = parse_amount(text),
                ListColumn::Status => order.status = text.to_string(),
            }
        }

        if order.order_id.is_empty() {
            out.malformed_rows += 1;
            debug!(row, "list row without order id skipped");
            continue;
        }
        order.detail_ref = page
            .first_link(row)
            .map(|href| page.resolve(href))
            .unwrap_or_default();
        out.orders.push(order);
    }
    out
}

fn is_disabled(page: &PageSnapshot, idx: usize) -> bool {
    let el = page.get(idx);
    el.attrs.contains_key("disabled")
        || el.attr("aria-disabled") == Some("true")
        || el
            .attr("class")
            .map(|c| c.split_whitespace().any(|k| k == "disabled"))
            .unwrap_or(false)
}

fn looks_like_next(page: &PageSnapshot, idx: usize) -> bool {
    let el = page.get(idx);
    let label = |s: &str| {
        let s = s.trim().to_lowercase();
        s == "next" || s.starts_with("next ") || s.starts_with("next›") || s.starts_with("next»")
    };
    label(el.own_text())
        || el.attr("aria-label").map(label).unwrap_or(false)
        || el
            .attr("rel")
            .map(|r| r.split_whitespace().any(|k| k == "next"))
            .unwrap_or(false)
}

/// The "Next" control: labelled by text, `aria-label` or `rel="next"`,
/// carrying a link target (on itself or a link ancestor) and not disabled.
pub fn find_next(page: &PageSnapshot) -> Option<String> {
    for (idx, _) in page.elements() {
        if !looks_like_next(page, idx) {
            continue;
        }
        let holder = std::iter::once(idx)
            .chain(page.ancestors(idx).take(2))
            .find(|&i| page.get(i).attr("href").is_some());
        let Some(holder) = holder else {
            continue;
        };
        if is_disabled(page, idx) || is_disabled(page, holder) {
            continue;
        }
        let href = page.get(holder).attr("href").unwrap_or("").trim();
        if href.is_empty() || href == "#" || href.starts_with("javascript:") {
            continue;
        }
        return Some(page.resolve(href));
    }
    None
}

#[derive(Debug, Clone, Copy)]
pub struct ListOptions {
    pub dedupe: bool,
    pub max_pages: u32,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            dedupe: true,
            max_pages: 500,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ListOutcome {
    pub orders: Vec<OrderSummary>,
    pub pages: u32,
    pub malformed_rows: usize,
    pub duplicates: usize,
    /// Why pagination stopped before the end of the list, if it did.
    pub incomplete: Option<String>,
}

/// Walk the list from `first_url`, following "Next" until it is absent or
/// disabled, a page has no rows, a target repeats, or the page cap is hit.
///
/// A non-fatal navigation error ends the walk and marks the outcome
/// incomplete. Fatal errors are returned.
pub fn extract_orders(
    session: &mut dyn ConsoleSession,
    first_url: &str,
    options: &ListOptions,
) -> Result<ListOutcome, ExtractError> {
    let mut outcome = ListOutcome::default();
    let mut visited: HashSet<String> = HashSet::new();
    let mut seen_ids: HashSet<String> = HashSet::new();
    let mut url = first_url.to_string();
    visited.insert(url.clone());

    loop {
        if outcome.pages >= options.max_pages {
            warn!(pages = outcome.pages, "page cap reached");
            outcome.incomplete = Some(format!("page cap of {} reached", options.max_pages));
            break;
        }

        let snapshot = match session.navigate(&url) {
            Ok(s) => s,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(url = %url, error = %e, "list navigation failed, abandoning remaining pages");
                outcome.incomplete = Some(e.to_string());
                break;
            }
        };
        outcome.pages += 1;

        let page = parse_list_page(&snapshot);
        outcome.malformed_rows += page.malformed_rows;
        debug!(
            page = outcome.pages,
            rows = page.orders.len(),
            malformed = page.malformed_rows,
            "list page parsed"
        );
        if page.orders.is_empty() {
            break;
        }

        for order in page.orders {
            if options.dedupe && !seen_ids.insert(order.order_id.clone()) {
                outcome.duplicates += 1;
                debug!(order_id = %order.order_id, "duplicate order row dropped");
                continue;
            }
            outcome.orders.push(order);
        }

        match page.next {
            None => break,
            Some(next) if !visited.insert(next.clone()) => {
                warn!(url = %next, "pagination stuck: next page already visited");
                break;
            }
            Some(next) => url = next,
        }
    }

    if outcome.duplicates > 0 {
        warn!(duplicates = outcome.duplicates, "duplicate order ids across list pages");
    }
    Ok(outcome)
}
