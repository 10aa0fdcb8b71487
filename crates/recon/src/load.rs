//! Reading one side's month into [`SideData`].

use ordertrace_core::money::{parse_amount, parse_signed_amount};
use ordertrace_core::{ItemKey, Record, YearMonth};
use ordertrace_io::load_month;
use tracing::debug;

use crate::config::{ColumnMapping, PerspectiveConfig, SideConfig};
use crate::error::ReconError;
use crate::model::{ItemRow, OrderInfo, SideData};

fn field<'a>(record: &'a Record, column: &str) -> &'a str {
    record.get(column).map(|s| s.trim()).unwrap_or("")
}

/// Quantity weight of a line. Missing or unparseable quantities count as 1.
pub fn parse_quantity(value: &str) -> i64 {
    let v = value.trim();
    if let Ok(q) = v.parse::<i64>() {
        return q;
    }
    match v.parse::<f64>() {
        Ok(f) if f.is_finite() && f.fract() == 0.0 => f as i64,
        _ => 1,
    }
}

fn line_revenue(record: &Record, columns: &ColumnMapping) -> ordertrace_core::Money {
    let discounted = field(record, &columns.discounted_price);
    if !discounted.is_empty() {
        return parse_signed_amount(discounted);
    }
    parse_signed_amount(field(record, &columns.unit_price))
        - parse_amount(field(record, &columns.line_discount))
}

/// Build a side from raw records. Rows without an order id are ignored.
///
/// With a non-empty perspective only orders whose locations it admits are
/// kept, and line items survive only if their order does.
pub fn side_from_records(
    orders: &[Record],
    items: &[Record],
    columns: &ColumnMapping,
    perspective: &PerspectiveConfig,
) -> SideData {
    let mut side = SideData::default();

    for record in orders {
        let id = field(record, &columns.order_id);
        if id.is_empty() {
            continue;
        }
        let info = OrderInfo {
            fulfillment_location: field(record, &columns.fulfillment_location).to_string(),
            demand_location: field(record, &columns.demand_location).to_string(),
        };
        if !perspective.admits(&info.fulfillment_location, &info.demand_location) {
            continue;
        }
        side.orders.entry(id.to_string()).or_insert(info);
    }

    let filtered = !perspective.is_empty();
    for record in items {
        let id = field(record, &columns.order_id);
        if id.is_empty() || (filtered && !side.orders.contains_key(id)) {
            continue;
        }
        let row = ItemRow {
            key: ItemKey::new(
                field(record, &columns.product_name),
                field(record, &columns.color),
                field(record, &columns.size),
            ),
            quantity: parse_quantity(field(record, &columns.quantity)),
            revenue: line_revenue(record, columns),
        };
        side.items.entry(id.to_string()).or_default().push(row);
    }
    side
}

/// Load `month` of one side. A missing month is empty data.
pub fn load_side(
    side: &SideConfig,
    label: &'static str,
    month: YearMonth,
    perspective: &PerspectiveConfig,
) -> Result<SideData, ReconError> {
    let records =
        load_month(&side.root, month).map_err(|source| ReconError::Load { side: label, source })?;
    let mut data = side_from_records(
        &records.orders,
        &records.line_items,
        &side.columns,
        perspective,
    );
    data.files = records.files.orders.len() + records.files.line_items.len();
    debug!(
        side = label,
        month = %month,
        orders = data.orders.len(),
        item_orders = data.items.len(),
        "side loaded"
    );
    Ok(data)
}
