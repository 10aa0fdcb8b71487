use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::key::{normalize_text, ItemKey};
use crate::money::{parse_amount, Money};

/// Product name of the synthesized line item when an order's detail view
/// yields nothing structured.
pub const PLACEHOLDER_PRODUCT: &str = "Store Purchase";
/// Product name of the synthesized line item when the detail fetch failed.
pub const ERROR_PLACEHOLDER_PRODUCT: &str = "Error - Store Purchase";

/// One CSV row: column name → cell text, in column order.
pub type Record = IndexMap<String, String>;

/// Flatten a value into an ordered CSV record.
pub trait ToRecord {
    fn to_record(&self) -> Record;
}

// ---------------------------------------------------------------------------
// Column names (wire format)
// ---------------------------------------------------------------------------

pub mod columns {
    pub const ORDER_ID: &str = "order_id";
    pub const DETAIL_REF: &str = "detail_ref";
    pub const CUSTOMER_NAME: &str = "customer_name";
    pub const ASSOCIATE: &str = "associate";
    pub const DISPLAY_DATE_TIME: &str = "display_date_time";
    pub const CHANNEL_TYPE: &str = "channel_type";
    pub const CHANNEL: &str = "channel";
    pub const FULFILLMENT_LOCATION: &str = "fulfillment_location";
    pub const DEMAND_LOCATION: &str = "demand_location";
    pub const TOTAL: &str = "total";
    pub const DISCOUNT: &str = "discount";
    pub const STATUS: &str = "status";

    pub const LINE_NUMBER: &str = "line_number";
    pub const PRODUCT_NAME: &str = "product_name";
    pub const COLOR: &str = "color";
    pub const SIZE: &str = "size";
    pub const SKU: &str = "sku";
    pub const UPC: &str = "upc";
    pub const ITEM_NUMBER: &str = "item_number";
    pub const PRODUCT_ID: &str = "product_id";
    pub const VARIANT_GROUP_ID: &str = "variant_group_id";
    pub const QUANTITY: &str = "quantity";
    pub const UNIT_PRICE: &str = "unit_price";
    pub const LINE_DISCOUNT: &str = "line_discount";
    pub const DISCOUNTED_PRICE: &str = "discounted_price";
    pub const TAXES: &str = "taxes";
}

fn field(record: &Record, name: &str) -> String {
    record.get(name).cloned().unwrap_or_default()
}

fn optional_field(record: &Record, name: &str) -> Option<String> {
    record.get(name).filter(|v| !v.trim().is_empty()).cloned()
}

// ---------------------------------------------------------------------------
// OrderSummary
// ---------------------------------------------------------------------------

/// Order header as read from the paginated order list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSummary {
    pub order_id: String,
    /// Link target of the order's detail view.
    pub detail_ref: String,
    pub customer_name: String,
    pub associate: String,
    /// Timestamp exactly as the console displays it.
    pub display_date_time: String,
    pub channel_type: String,
    pub channel: String,
    pub fulfillment_location: String,
    pub demand_location: String,
    pub total: Money,
    pub discount: Money,
    pub status: String,
}

impl ToRecord for OrderSummary {
    fn to_record(&self) -> Record {
        use columns::*;
        let mut r = Record::new();
        r.insert(ORDER_ID.into(), self.order_id.clone());
        r.insert(DETAIL_REF.into(), self.detail_ref.clone());
        r.insert(CUSTOMER_NAME.into(), self.customer_name.clone());
        r.insert(ASSOCIATE.into(), self.associate.clone());
        r.insert(DISPLAY_DATE_TIME.into(), self.display_date_time.clone());
        r.insert(CHANNEL_TYPE.into(), self.channel_type.clone());
        r.insert(CHANNEL.into(), self.channel.clone());
        r.insert(FULFILLMENT_LOCATION.into(), self.fulfillment_location.clone());
        r.insert(DEMAND_LOCATION.into(), self.demand_location.clone());
        r.insert(TOTAL.into(), self.total.to_string());
        r.insert(DISCOUNT.into(), self.discount.to_string());
        r.insert(STATUS.into(), self.status.clone());
        r
    }
}

impl OrderSummary {
    pub fn from_record(record: &Record) -> Self {
        use columns::*;
        Self {
            order_id: field(record, ORDER_ID),
            detail_ref: field(record, DETAIL_REF),
            customer_name: field(record, CUSTOMER_NAME),
            associate: field(record, ASSOCIATE),
            display_date_time: field(record, DISPLAY_DATE_TIME),
            channel_type: field(record, CHANNEL_TYPE),
            channel: field(record, CHANNEL),
            fulfillment_location: field(record, FULFILLMENT_LOCATION),
            demand_location: field(record, DEMAND_LOCATION),
            total: parse_amount(&field(record, TOTAL)),
            discount: parse_amount(&field(record, DISCOUNT)),
            status: field(record, STATUS),
        }
    }
}

// ---------------------------------------------------------------------------
// LineItem
// ---------------------------------------------------------------------------

/// Identifiers that make a descriptor group a real line item. Any one of
/// them is enough.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantIds {
    pub sku: Option<String>,
    pub upc: Option<String>,
    pub item_number: Option<String>,
    pub product_id: Option<String>,
    pub variant_group_id: Option<String>,
}

impl VariantIds {
    pub fn is_empty(&self) -> bool {
        self.sku.is_none()
            && self.upc.is_none()
            && self.item_number.is_none()
            && self.product_id.is_none()
            && self.variant_group_id.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub order_id: String,
    /// 1-based position within the order.
    pub line_number: u32,
    pub product_name: String,
    pub color: String,
    pub size: String,
    pub variant: VariantIds,
    pub quantity: u32,
    pub unit_price: Money,
    pub line_discount: Money,
    pub discounted_price: Money,
    pub taxes: Money,
    pub status: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaceholderKind {
    /// Detail view had nothing structured.
    StorePurchase,
    /// Detail view could not be fetched or parsed.
    Error,
}

/// Classify a product name as a synthesized placeholder.
///
/// Matches the two synthesized names in raw or normalized form; any other
/// product whose name starts with `Error -` is an error placeholder too.
pub fn placeholder_kind(product_name: &str) -> Option<PlaceholderKind> {
    let name = product_name.trim();
    let normalized = normalize_text(name);
    if normalized == normalize_text(PLACEHOLDER_PRODUCT) {
        Some(PlaceholderKind::StorePurchase)
    } else if normalized == normalize_text(ERROR_PLACEHOLDER_PRODUCT)
        || name.to_ascii_lowercase().starts_with("error -")
    {
        Some(PlaceholderKind::Error)
    } else {
        None
    }
}

impl LineItem {
    /// Synthesize the single line item for an order whose detail view
    /// produced nothing. `failed` selects the error-labelled variant.
    pub fn placeholder(order: &OrderSummary, failed: bool) -> Self {
        let product_name = if failed {
            ERROR_PLACEHOLDER_PRODUCT
        } else {
            PLACEHOLDER_PRODUCT
        };
        Self {
            order_id: order.order_id.clone(),
            line_number: 1,
            product_name: product_name.to_string(),
            color: String::new(),
            size: String::new(),
            variant: VariantIds::default(),
            quantity: 1,
            unit_price: order.total,
            line_discount: order.discount,
            discounted_price: order.total.floored_sub(order.discount),
            taxes: Money::ZERO,
            status: order.status.clone(),
        }
    }

    pub fn placeholder_kind(&self) -> Option<PlaceholderKind> {
        placeholder_kind(&self.product_name)
    }

    pub fn key(&self) -> ItemKey {
        ItemKey::new(&self.product_name, &self.color, &self.size)
    }
}

impl ToRecord for LineItem {
    fn to_record(&self) -> Record {
        use columns::*;
        let mut r = Record::new();
        r.insert(ORDER_ID.into(), self.order_id.clone());
        r.insert(LINE_NUMBER.into(), self.line_number.to_string());
        r.insert(PRODUCT_NAME.into(), self.product_name.clone());
        r.insert(COLOR.into(), self.color.clone());
        r.insert(SIZE.into(), self.size.clone());
        let ids = [
            (SKU, &self.variant.sku),
            (UPC, &self.variant.upc),
            (ITEM_NUMBER, &self.variant.item_number),
            (PRODUCT_ID, &self.variant.product_id),
            (VARIANT_GROUP_ID, &self.variant.variant_group_id),
        ];
        for (name, value) in ids {
            if let Some(v) = value {
                r.insert(name.into(), v.clone());
            }
        }
        r.insert(QUANTITY.into(), self.quantity.to_string());
        r.insert(UNIT_PRICE.into(), self.unit_price.to_string());
        r.insert(LINE_DISCOUNT.into(), self.line_discount.to_string());
        r.insert(DISCOUNTED_PRICE.into(), self.discounted_price.to_string());
        r.insert(TAXES.into(), self.taxes.to_string());
        r.insert(STATUS.into(), self.status.clone());
        r
    }
}

impl LineItem {
    pub fn from_record(record: &Record) -> Self {
        use columns::*;
        Self {
            order_id: field(record, ORDER_ID),
            line_number: field(record, LINE_NUMBER).trim().parse().unwrap_or(0),
            product_name: field(record, PRODUCT_NAME),
            color: field(record, COLOR),
            size: field(record, SIZE),
            variant: VariantIds {
                sku: optional_field(record, SKU),
                upc: optional_field(record, UPC),
                item_number: optional_field(record, ITEM_NUMBER),
                product_id: optional_field(record, PRODUCT_ID),
                variant_group_id: optional_field(record, VARIANT_GROUP_ID),
            },
            quantity: field(record, QUANTITY).trim().parse().unwrap_or(1),
            unit_price: parse_amount(&field(record, UNIT_PRICE)),
            line_discount: parse_amount(&field(record, LINE_DISCOUNT)),
            discounted_price: parse_amount(&field(record, DISCOUNTED_PRICE)),
            taxes: parse_amount(&field(record, TAXES)),
            status: field(record, STATUS),
        }
    }
}

// ---------------------------------------------------------------------------
// DayPartition
// ---------------------------------------------------------------------------

/// Everything extracted for one calendar day. Persisted as a file pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayPartition {
    pub date: NaiveDate,
    pub orders: Vec<OrderSummary>,
    pub line_items: Vec<LineItem>,
}

impl DayPartition {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            orders: Vec::new(),
            line_items: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order() -> OrderSummary {
        OrderSummary {
            order_id: "O-1001".into(),
            detail_ref: "/orders/O-1001".into(),
            display_date_time: "5/14/2024 3:22 PM".into(),
            fulfillment_location: "Downtown".into(),
            demand_location: "Downtown".into(),
            total: Money(12000),
            discount: Money(2000),
            status: "Completed".into(),
            ..Default::default()
        }
    }

    #[test]
    fn placeholder_copies_order_prices() {
        let item = LineItem::placeholder(&order(), false);
        assert_eq!(item.product_name, PLACEHOLDER_PRODUCT);
        assert_eq!(item.line_number, 1);
        assert_eq!(item.quantity, 1);
        assert_eq!(item.unit_price, Money(12000));
        assert_eq!(item.line_discount, Money(2000));
        assert_eq!(item.discounted_price, Money(10000));
        assert_eq!(item.placeholder_kind(), Some(PlaceholderKind::StorePurchase));

        let err = LineItem::placeholder(&order(), true);
        assert_eq!(err.product_name, ERROR_PLACEHOLDER_PRODUCT);
        assert_eq!(err.placeholder_kind(), Some(PlaceholderKind::Error));
    }

    #[test]
    fn placeholder_detection_is_lenient() {
        assert_eq!(placeholder_kind(" store purchase "), Some(PlaceholderKind::StorePurchase));
        assert_eq!(placeholder_kind("ERROR - STORE PURCHASE"), Some(PlaceholderKind::Error));
        assert_eq!(placeholder_kind("Error - timeout"), Some(PlaceholderKind::Error));
        assert_eq!(placeholder_kind("Store Purchase Bag"), None);
        assert_eq!(placeholder_kind("error store purchase"), Some(PlaceholderKind::Error));
    }

    #[test]
    fn line_item_record_omits_absent_identifiers() {
        let mut item = LineItem::placeholder(&order(), false);
        let cols: Vec<String> = item.to_record().keys().cloned().collect();
        assert!(!cols.contains(&"sku".to_string()));

        item.variant.upc = Some("012345678905".into());
        let record = item.to_record();
        let cols: Vec<&str> = record.keys().map(|s| s.as_str()).collect();
        let size_pos = cols.iter().position(|c| *c == "size").unwrap();
        assert_eq!(cols[size_pos + 1], "upc");
        assert_eq!(record["unit_price"], "120.00");
    }

    #[test]
    fn records_round_trip() {
        let o = order();
        assert_eq!(OrderSummary::from_record(&o.to_record()), o);

        let mut item = LineItem::placeholder(&o, false);
        item.variant.sku = Some("SKU-9".into());
        assert_eq!(LineItem::from_record(&item.to_record()), item);
    }
}
