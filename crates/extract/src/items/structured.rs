//! Structured field-group detection.
//!
//! A line item on a detail page is a repeated group of labeled fields. A
//! group qualifies only if it exposes at least one identifier (SKU, UPC,
//! item number, product id, variant group id). Groups are found by climbing
//! from each identifier field while no identifier kind appears twice in the
//! subtree, which keeps neighbouring items apart.

use std::collections::{BTreeSet, HashMap, HashSet};

use ordertrace_core::money::{contains_currency_token, currency_tokens, parse_amount};
use ordertrace_core::{LineItem, Money, OrderSummary, VariantIds};
use tracing::debug;

use crate::page::PageSnapshot;

use super::fields::{field_for_label, labeled_fields, Field, LabeledField};
use super::prices::align_prices;
use super::LineItemStrategy;

/// Labels that close an order-level summary block. A group never grows
/// into a container holding one.
const SUMMARY_LABELS: &[&str] = &["subtotal", "sub total", "order total", "grand total"];

fn is_boundary(page: &PageSnapshot, idx: usize) -> bool {
    matches!(
        page.get(idx).tag.as_str(),
        "body" | "html" | "main" | "table" | "tbody" | "thead" | "ul" | "ol" | "form"
    )
}

fn holds_summary(page: &PageSnapshot, idx: usize) -> bool {
    page.subtree(idx).any(|i| {
        let t = page.get(i).own_text().to_lowercase();
        let t = t.trim_end_matches(':').trim();
        SUMMARY_LABELS.iter().any(|l| t == *l || t.starts_with(&format!("{}:", l)))
    })
}

fn identifier_kinds_unique(page: &PageSnapshot, idx: usize, ids: &[&LabeledField]) -> bool {
    let mut seen = HashSet::new();
    ids.iter()
        .filter(|f| page.contains(idx, f.label_node))
        .all(|f| seen.insert(f.field))
}

fn group_root(page: &PageSnapshot, field: &LabeledField, ids: &[&LabeledField]) -> usize {
    let mut root = page.get(field.label_node).parent.unwrap_or(field.label_node);
    if is_boundary(page, root) {
        return field.label_node;
    }
    for a in page.ancestors(root) {
        if is_boundary(page, a) || !identifier_kinds_unique(page, a, ids) || holds_summary(page, a) {
            break;
        }
        root = a;
    }
    root
}

/// Roots of all qualifying groups, in document order. A root that contains
/// another root is dropped in favour of the inner one.
pub fn find_groups(page: &PageSnapshot, fields: &[LabeledField]) -> Vec<usize> {
    let ids: Vec<&LabeledField> = fields.iter().filter(|f| f.field.is_identifier()).collect();
    let roots: BTreeSet<usize> = ids.iter().map(|f| group_root(page, f, &ids)).collect();
    roots
        .iter()
        .copied()
        .filter(|&r| !roots.iter().any(|&o| o != r && page.contains(r, o)))
        .collect()
}

/// Text leaves that are plausibly a product name.
fn is_name_candidate(text: &str) -> bool {
    let t = text.trim();
    t.chars().filter(|c| c.is_alphabetic()).count() >= 2
        && !contains_currency_token(t)
        && field_for_label(t).is_none()
        && !t.ends_with(':')
}

fn parse_quantity(value: &str) -> Option<u32> {
    let digits: String = value
        .trim()
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok().filter(|q| *q > 0)
}

fn build_item(
    page: &PageSnapshot,
    group: usize,
    all_groups: &[usize],
    fields: &[&LabeledField],
) -> LineItem {
    let mut by_field: HashMap<Field, &str> = HashMap::new();
    let mut consumed: HashSet<usize> = HashSet::new();
    for f in fields {
        by_field.entry(f.field).or_insert(f.value.as_str());
        consumed.insert(f.label_node);
        consumed.insert(f.value_node);
    }
    let get = |field: Field| by_field.get(&field).map(|v| v.trim().to_string());

    let product_name = get(Field::Product).unwrap_or_else(|| {
        page.text_leaves(group)
            .into_iter()
            .filter(|i| !consumed.contains(i))
            .map(|i| page.get(i).own_text())
            .find(|t| is_name_candidate(t))
            .unwrap_or_default()
            .to_string()
    });

    let variant = VariantIds {
        sku: get(Field::Sku),
        upc: get(Field::Upc),
        item_number: get(Field::ItemNumber),
        product_id: get(Field::ProductId),
        variant_group_id: get(Field::VariantGroupId),
    };

    let aligned = align_prices(page, group, all_groups).unwrap_or_default();
    let labeled = |field: Field| by_field.get(&field).map(|v| parse_amount(v));

    let discount = aligned
        .discount
        .or_else(|| labeled(Field::Discount))
        .unwrap_or(Money::ZERO);
    let mut unit_price = aligned.price.or_else(|| labeled(Field::Price));
    let mut discounted = aligned
        .discounted_price
        .or_else(|| labeled(Field::DiscountedPrice));

    if unit_price.is_none() && discounted.is_none() {
        let text = page.text_content(group);
        unit_price = currency_tokens(&text).first().map(|t| parse_amount(t));
    }
    if unit_price.is_none() {
        unit_price = discounted.map(|d| d + discount);
    }
    let unit_price = unit_price.unwrap_or(Money::ZERO);
    if discounted.is_none() {
        discounted = Some(unit_price.floored_sub(discount));
    }

    LineItem {
        product_name,
        color: get(Field::Color).unwrap_or_default(),
        size: get(Field::Size).unwrap_or_default(),
        variant,
        quantity: get(Field::Quantity)
            .as_deref()
            .and_then(parse_quantity)
            .unwrap_or(1),
        unit_price,
        line_discount: discount,
        discounted_price: discounted.unwrap_or(unit_price),
        taxes: aligned
            .taxes
            .or_else(|| labeled(Field::Taxes))
            .unwrap_or(Money::ZERO),
        ..Default::default()
    }
}

/// Field groups with identifiers, priced by column alignment.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredGroups;

impl LineItemStrategy for StructuredGroups {
    fn name(&self) -> &'static str {
        "structured"
    }

    fn extract(&self, order: &OrderSummary, page: &PageSnapshot) -> Vec<LineItem> {
        let fields = labeled_fields(page);
        let groups = find_groups(page, &fields);
        debug!(order_id = %order.order_id, groups = groups.len(), "structured groups");

        groups
            .iter()
            .filter_map(|&g| {
                let in_group: Vec<&LabeledField> = fields
                    .iter()
                    .filter(|f| page.contains(g, f.label_node))
                    .collect();
                if !in_group.iter().any(|f| f.field.is_identifier()) {
                    return None;
                }
                Some(build_item(page, g, &groups, &in_group))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::Node;

    fn order() -> OrderSummary {
        OrderSummary {
            order_id: "O-7".into(),
            ..Default::default()
        }
    }

    fn card(name: &str, sku: &str, color: &str, size: &str, price: &str) -> Node {
        Node::new("li").children([
            Node::new("h4").text(name),
            Node::new("div").children([Node::new("span").text("SKU:"), Node::new("span").text(sku)]),
            Node::new("div").text(&format!("Color: {}", color)),
            Node::new("div").text(&format!("Size: {}", size)),
            Node::new("div").text("Qty: 2"),
            Node::new("div").text(&format!("Price: {}", price)),
        ])
    }

    #[test]
    fn repeated_cards_become_items() {
        let page = PageSnapshot::new(
            "https://pos.example.com/orders/7",
            "",
            Node::new("body").child(
                Node::new("ul")
                    .child(card("Oxford Shirt", "S-1", "Blue", "M", "$59.00"))
                    .child(card("Chino", "S-2", "Khaki", "32", "$1,020.00")),
            ),
        );
        let items = StructuredGroups.extract(&order(), &page);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].product_name, "Oxford Shirt");
        assert_eq!(items[0].color, "Blue");
        assert_eq!(items[0].size, "M");
        assert_eq!(items[0].quantity, 2);
        assert_eq!(items[0].variant.sku.as_deref(), Some("S-1"));
        assert_eq!(items[0].unit_price, Money(5900));
        assert_eq!(items[0].discounted_price, Money(5900));
        assert_eq!(items[1].product_name, "Chino");
        assert_eq!(items[1].unit_price, Money(102000));
    }

    #[test]
    fn groups_without_identifiers_do_not_qualify() {
        let page = PageSnapshot::new(
            "https://pos.example.com/orders/7",
            "",
            Node::new("body").child(
                Node::new("div")
                    .child(Node::new("h4").text("Gift wrap"))
                    .child(Node::new("div").text("Color: Red"))
                    .child(Node::new("div").text("Price: $5.00")),
            ),
        );
        assert!(StructuredGroups.extract(&order(), &page).is_empty());
    }

    #[test]
    fn single_item_does_not_swallow_order_summary() {
        let page = PageSnapshot::new(
            "https://pos.example.com/orders/7",
            "",
            Node::new("body").child(
                Node::new("div")
                    .child(
                        Node::new("div")
                            .child(Node::new("p").text("Wool Scarf"))
                            .child(Node::new("p").text("UPC: 0001112223334"))
                            .child(Node::new("p").text("$35.00")),
                    )
                    .child(Node::new("div").child(Node::new("p").text("Subtotal: $35.00"))),
            ),
        );
        let fields = labeled_fields(&page);
        let groups = find_groups(&page, &fields);
        assert_eq!(groups, vec![2]);
        let items = StructuredGroups.extract(&order(), &page);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].product_name, "Wool Scarf");
        assert_eq!(items[0].unit_price, Money(3500));
        assert_eq!(items[0].variant.upc.as_deref(), Some("0001112223334"));
    }

    #[test]
    fn discount_derives_discounted_price() {
        let page = PageSnapshot::new(
            "https://pos.example.com/orders/7",
            "",
            Node::new("body").child(
                Node::new("div").children([
                    Node::new("p").text("Linen Shirt"),
                    Node::new("p").text("Item #: 4471"),
                    Node::new("p").text("Price: $80.00"),
                    Node::new("p").text("Discount: -$20.00"),
                ]),
            ),
        );
        let items = StructuredGroups.extract(&order(), &page);
        assert_eq!(items[0].line_discount, Money(2000));
        assert_eq!(items[0].discounted_price, Money(6000));
        assert_eq!(items[0].variant.item_number.as_deref(), Some("4471"));
    }
}
