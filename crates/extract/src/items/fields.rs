//! Labeled fields on a detail page.
//!
//! Three shapes are recognised:
//!
//! - one element whose text is `Label: value`
//! - a label leaf (`SKU:` or a known label) followed by a value leaf
//! - an element carrying `data-label`, whose text is the value

use std::sync::OnceLock;

use regex::Regex;

use crate::page::PageSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Sku,
    Upc,
    ItemNumber,
    ProductId,
    VariantGroupId,
    Product,
    Color,
    Size,
    Quantity,
    Price,
    Discount,
    DiscountedPrice,
    Taxes,
}

impl Field {
    /// Identifiers that qualify a group as a line item.
    pub fn is_identifier(self) -> bool {
        matches!(
            self,
            Field::Sku | Field::Upc | Field::ItemNumber | Field::ProductId | Field::VariantGroupId
        )
    }
}

const LABELS: &[(&str, Field)] = &[
    ("sku", Field::Sku),
    ("sku #", Field::Sku),
    ("sku number", Field::Sku),
    ("upc", Field::Upc),
    ("upc code", Field::Upc),
    ("barcode", Field::Upc),
    ("item #", Field::ItemNumber),
    ("item number", Field::ItemNumber),
    ("item no", Field::ItemNumber),
    ("item no.", Field::ItemNumber),
    ("internal item number", Field::ItemNumber),
    ("product id", Field::ProductId),
    ("product #", Field::ProductId),
    ("product number", Field::ProductId),
    ("variant group id", Field::VariantGroupId),
    ("variant group", Field::VariantGroupId),
    ("product", Field::Product),
    ("product name", Field::Product),
    ("item", Field::Product),
    ("item name", Field::Product),
    ("name", Field::Product),
    ("description", Field::Product),
    ("color", Field::Color),
    ("colour", Field::Color),
    ("size", Field::Size),
    ("qty", Field::Quantity),
    ("qty.", Field::Quantity),
    ("quantity", Field::Quantity),
    ("price", Field::Price),
    ("unit price", Field::Price),
    ("original price", Field::Price),
    ("retail price", Field::Price),
    ("discount", Field::Discount),
    ("discounts", Field::Discount),
    ("line discount", Field::Discount),
    ("discounted price", Field::DiscountedPrice),
    ("sale price", Field::DiscountedPrice),
    ("net price", Field::DiscountedPrice),
    ("final price", Field::DiscountedPrice),
    ("tax", Field::Taxes),
    ("taxes", Field::Taxes),
];

/// Canonical label text: lower-case, single spaces, no trailing colon.
pub fn clean_label(s: &str) -> String {
    let joined = s.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
    joined.trim_end_matches(':').trim_end().to_string()
}

pub fn field_for_label(label: &str) -> Option<Field> {
    let cleaned = clean_label(label);
    LABELS
        .iter()
        .find(|(alias, _)| *alias == cleaned)
        .map(|(_, f)| *f)
}

fn inline_re() -> &'static Regex {
    static INLINE_RE: OnceLock<Regex> = OnceLock::new();
    INLINE_RE.get_or_init(|| {
        Regex::new(r"^\s*([A-Za-z][A-Za-z0-9 #./&-]{0,40}?)\s*:\s*(\S.*?)\s*$")
            .expect("valid labeled-field regex")
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledField {
    pub field: Field,
    pub value: String,
    /// Element holding the label.
    pub label_node: usize,
    /// Element holding the value (same as `label_node` for inline fields).
    pub value_node: usize,
}

/// Every recognised labeled field on the page, in document order.
pub fn labeled_fields(page: &PageSnapshot) -> Vec<LabeledField> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < page.len() {
        let el = page.get(i);

        if let Some(label) = el.attr("data-label") {
            if let Some(field) = field_for_label(label) {
                let value = page.text_content(i);
                if !value.trim().is_empty() {
                    out.push(LabeledField {
                        field,
                        value: value.trim().to_string(),
                        label_node: i,
                        value_node: i,
                    });
                }
                i = el.end;
                continue;
            }
        }

        let text = el.own_text();
        if text.is_empty() {
            i += 1;
            continue;
        }

        if let Some(c) = inline_re().captures(text) {
            if let Some(field) = field_for_label(&c[1]) {
                out.push(LabeledField {
                    field,
                    value: c[2].to_string(),
                    label_node: i,
                    value_node: i,
                });
                i += 1;
                continue;
            }
        }

        if let Some(field) = field_for_label(text) {
            if let Some(value_node) = next_value_leaf(page, i) {
                out.push(LabeledField {
                    field,
                    value: page.get(value_node).own_text().to_string(),
                    label_node: i,
                    value_node,
                });
                i = value_node + 1;
                continue;
            }
        }

        i += 1;
    }
    out
}

/// The first text-bearing element after `label`'s subtree, within the
/// label's parent. Another label is not a value.
fn next_value_leaf(page: &PageSnapshot, label: usize) -> Option<usize> {
    let parent = page.get(label).parent?;
    let scope_end = page.get(parent).end;
    let mut j = page.get(label).end;
    while j < scope_end {
        let text = page.get(j).own_text();
        if !text.is_empty() {
            if text.ends_with(':') || field_for_label(text).is_some() {
                return None;
            }
            return Some(j);
        }
        j += 1;
    }
    None
}
