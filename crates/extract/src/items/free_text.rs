//! Free-text fallback: one line item per body-text line carrying prices.

use std::sync::OnceLock;

use ordertrace_core::money::{currency_token_spans, parse_amount};
use ordertrace_core::{LineItem, Money, OrderSummary};
use regex::Regex;

use crate::page::PageSnapshot;

use super::LineItemStrategy;

fn excluded_re() -> &'static Regex {
    static EXCLUDED_RE: OnceLock<Regex> = OnceLock::new();
    EXCLUDED_RE.get_or_init(|| {
        Regex::new(r"(?i)\b(sub\s?-?total|total|tax(es)?)\b").expect("valid exclusion regex")
    })
}

fn quantity_re() -> &'static Regex {
    static QTY_RE: OnceLock<Regex> = OnceLock::new();
    QTY_RE.get_or_init(|| {
        Regex::new(r"(?i)(?:\bqty\.?\s*:?\s*(\d+)\b|(?:^|\s)[x×]\s?(\d+)\b)").expect("valid quantity regex")
    })
}

/// Non-product lines that still carry an amount.
const NON_PRODUCT: &[&str] = &[
    "discount", "discounts", "shipping", "payment", "paid", "balance", "change", "change due",
    "cash", "credit", "refund", "tender", "tip",
];

fn clean_name(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .trim_matches(|c: char| c == '-' || c == '|' || c == ':' || c == '@' || c == ',' || c.is_whitespace())
        .to_string()
}

/// Parse one line. `None` if it is not a product line.
pub fn parse_line(line: &str) -> Option<LineItem> {
    let spans = currency_token_spans(line);
    if spans.is_empty() || excluded_re().is_match(line) {
        return None;
    }

    let mut quantity = 1;
    let mut rest = String::with_capacity(line.len());
    let mut last = 0;
    for (start, end) in &spans {
        rest.push_str(&line[last..*start]);
        rest.push(' ');
        last = *end;
    }
    rest.push_str(&line[last..]);

    if let Some(c) = quantity_re().captures(&rest) {
        let q = c.get(1).or_else(|| c.get(2)).and_then(|m| m.as_str().parse::<u32>().ok());
        if let Some(q) = q.filter(|q| *q > 0) {
            quantity = q;
        }
        let whole = c.get(0).map(|m| m.range()).unwrap_or(0..0);
        rest.replace_range(whole, " ");
    }

    let name = clean_name(&rest);
    if name.chars().filter(|c| c.is_alphabetic()).count() < 2
        || NON_PRODUCT.contains(&name.to_lowercase().as_str())
    {
        return None;
    }

    let amounts: Vec<Money> = spans.iter().map(|(s, e)| parse_amount(&line[*s..*e])).collect();
    let unit_price = amounts[0];
    let discounted_price = *amounts.last().unwrap_or(&unit_price);
    let line_discount = match amounts.len() {
        0 | 1 => Money::ZERO,
        2 => unit_price.floored_sub(discounted_price),
        _ => amounts[1],
    };

    Some(LineItem {
        product_name: name,
        quantity,
        unit_price,
        line_discount,
        discounted_price,
        ..Default::default()
    })
}

/// Scans line-broken body text for price-bearing lines, skipping totals and
/// taxes. The text left after removing the amounts is the product name.
#[derive(Debug, Default, Clone, Copy)]
pub struct FreeTextLines;

impl LineItemStrategy for FreeTextLines {
    fn name(&self) -> &'static str {
        "free_text"
    }

    fn extract(&self, _order: &OrderSummary, page: &PageSnapshot) -> Vec<LineItem> {
        page.lines().filter_map(parse_line).collect()
    }
}
