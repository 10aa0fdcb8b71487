//! Price-column alignment.
//!
//! Detail pages render line items as rows under column headers (Price,
//! Discount, Discounted Price, Taxes). For a line-item group we look for the
//! smallest enclosing row-like container whose currency tokens best line up
//! under those headers, then give each header its horizontally closest
//! token. Discount and tax amounts are drawn in an accent color, which
//! settles ties.

use ordertrace_core::money::{contains_currency_token, currency_tokens, parse_amount};
use ordertrace_core::Money;

use crate::page::{is_accent_color, PageSnapshot, Rect};

use super::fields::clean_label;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PriceColumn {
    Price,
    Discount,
    DiscountedPrice,
    Taxes,
}

impl PriceColumn {
    fn prefers_accent(self) -> bool {
        matches!(self, PriceColumn::Discount | PriceColumn::Taxes)
    }
}

fn column_for_header(text: &str) -> Option<PriceColumn> {
    match clean_label(text).as_str() {
        "price" | "unit price" => Some(PriceColumn::Price),
        "discount" | "discounts" => Some(PriceColumn::Discount),
        "discounted price" | "sale price" => Some(PriceColumn::DiscountedPrice),
        "tax" | "taxes" => Some(PriceColumn::Taxes),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy)]
struct Header {
    column: PriceColumn,
    rect: Rect,
}

impl Header {
    fn tolerance(&self) -> f64 {
        (self.rect.width / 2.0).max(24.0)
    }
}

#[derive(Debug, Clone, Copy)]
struct Token {
    node: usize,
    rect: Rect,
    accent: bool,
    value: Money,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlignedPrices {
    pub price: Option<Money>,
    pub discount: Option<Money>,
    pub discounted_price: Option<Money>,
    pub taxes: Option<Money>,
    /// Container the values were read from.
    pub container: Option<usize>,
}

impl AlignedPrices {
    pub fn is_empty(&self) -> bool {
        self.price.is_none()
            && self.discount.is_none()
            && self.discounted_price.is_none()
            && self.taxes.is_none()
    }

    fn set(&mut self, column: PriceColumn, value: Money) {
        match column {
            PriceColumn::Price => self.price = Some(value),
            PriceColumn::Discount => self.discount = Some(value),
            PriceColumn::DiscountedPrice => self.discounted_price = Some(value),
            PriceColumn::Taxes => self.taxes = Some(value),
        }
    }
}

fn page_headers(page: &PageSnapshot) -> Vec<Header> {
    page.elements()
        .filter_map(|(_, el)| {
            let column = column_for_header(el.own_text())?;
            Some(Header {
                column,
                rect: el.rect?,
            })
        })
        .collect()
}

fn tokens_in(page: &PageSnapshot, container: usize) -> Vec<Token> {
    page.subtree(container)
        .filter_map(|i| {
            let el = page.get(i);
            let text = el.own_text();
            if !contains_currency_token(text) {
                return None;
            }
            let first = currency_tokens(text).into_iter().next()?;
            Some(Token {
                node: i,
                rect: el.rect?,
                accent: el.color.as_deref().map(is_accent_color).unwrap_or(false),
                value: parse_amount(first),
            })
        })
        .collect()
}

/// For each column, the header nearest above `top`.
fn headers_above(headers: &[Header], top: f64) -> Vec<Header> {
    let mut chosen: Vec<Header> = Vec::new();
    for h in headers.iter().filter(|h| h.rect.y <= top) {
        match chosen.iter_mut().find(|c| c.column == h.column) {
            Some(c) if h.rect.y > c.rect.y => *c = *h,
            Some(_) => {}
            None => chosen.push(*h),
        }
    }
    chosen
}

fn distance(token: &Token, header: &Header) -> f64 {
    (token.rect.center_x() - header.rect.center_x()).abs()
}

const TIE_EPSILON: f64 = 0.5;

/// The header `token` belongs to: nearest within tolerance. When two
/// headers are equally near, accent tokens go to discount/tax columns.
fn owning_header(token: &Token, headers: &[Header]) -> Option<Header> {
    let mut best: Option<(Header, f64)> = None;
    for h in headers {
        let d = distance(token, h);
        if d > h.tolerance() {
            continue;
        }
        best = match best {
            None => Some((*h, d)),
            Some((b, bd)) if (d - bd).abs() <= TIE_EPSILON => {
                if h.column.prefers_accent() == token.accent && b.column.prefers_accent() != token.accent {
                    Some((*h, d))
                } else {
                    Some((b, bd))
                }
            }
            Some((_, bd)) if d < bd => Some((*h, d)),
            keep => keep,
        };
    }
    best.map(|(h, _)| h)
}

fn aligned_count(tokens: &[Token], headers: &[Header]) -> usize {
    tokens
        .iter()
        .filter(|t| owning_header(t, headers).is_some())
        .count()
}

fn stops_climb(page: &PageSnapshot, idx: usize) -> bool {
    let el = page.get(idx);
    matches!(
        el.tag.as_str(),
        "body" | "html" | "main" | "table" | "tbody" | "thead" | "ul" | "ol" | "form"
    )
}

/// Align prices for the group rooted at `group`. `other_groups` bound how
/// far the container may grow.
pub fn align_prices(page: &PageSnapshot, group: usize, other_groups: &[usize]) -> Option<AlignedPrices> {
    let headers = page_headers(page);
    if headers.is_empty() {
        return None;
    }

    let mut candidates = vec![group];
    for a in page.ancestors(group).take(3) {
        if stops_climb(page, a) || other_groups.iter().any(|&g| g != group && page.contains(a, g)) {
            break;
        }
        candidates.push(a);
    }

    let mut best: Option<(usize, Vec<Token>, Vec<Header>, usize)> = None;
    for container in candidates {
        let tokens = tokens_in(page, container);
        let Some(top) = tokens.iter().map(|t| t.rect.y).reduce(f64::min) else {
            continue;
        };
        let hs = headers_above(&headers, top);
        let count = aligned_count(&tokens, &hs);
        if count > best.as_ref().map(|b| b.3).unwrap_or(0) {
            best = Some((container, tokens, hs, count));
        }
    }
    let (container, tokens, hs, _) = best?;

    let mut out = AlignedPrices {
        container: Some(container),
        ..Default::default()
    };
    for header in &hs {
        let mut pick: Option<(&Token, f64)> = None;
        for t in tokens.iter() {
            let Some(owner) = owning_header(t, &hs) else {
                continue;
            };
            if owner.column != header.column {
                continue;
            }
            let d = distance(t, header);
            pick = match pick {
                None => Some((t, d)),
                Some((p, pd)) if (d - pd).abs() <= TIE_EPSILON => {
                    let wants = header.column.prefers_accent();
                    if t.accent == wants && p.accent != wants {
                        Some((t, d))
                    } else {
                        Some((p, pd))
                    }
                }
                Some((_, pd)) if d < pd => Some((t, d)),
                keep => keep,
            };
        }
        if let Some((t, _)) = pick {
            out.set(header.column, t.value);
            tracing::trace!(column = ?header.column, node = t.node, value = %t.value, "price aligned");
        }
    }

    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}
