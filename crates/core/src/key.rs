use std::fmt;

use serde::{Deserialize, Serialize};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

pub const KEY_SEPARATOR: char = '|';

/// Reconciliation key for a line item: `(product, color, size)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemKey {
    pub product: String,
    pub color: String,
    pub size: String,
}

impl ItemKey {
    pub fn new(product: &str, color: &str, size: &str) -> Self {
        Self {
            product: product.trim().to_string(),
            color: color.trim().to_string(),
            size: size.trim().to_string(),
        }
    }

    /// Parse a rendered `product|color|size` key. Missing parts are empty.
    pub fn parse(s: &str) -> Self {
        let mut parts = s.splitn(3, KEY_SEPARATOR);
        let product = parts.next().unwrap_or("");
        let color = parts.next().unwrap_or("");
        let size = parts.next().unwrap_or("");
        Self::new(product, color, size)
    }

    pub fn normalized(&self) -> Self {
        Self {
            product: normalize_text(&self.product),
            color: normalize_text(&self.color),
            size: normalize_text(&self.size),
        }
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{sep}{}{sep}{}",
            self.product,
            self.color,
            self.size,
            sep = KEY_SEPARATOR
        )
    }
}

fn is_apostrophe(c: char) -> bool {
    matches!(c, '\'' | '`' | '\u{2018}' | '\u{2019}' | '\u{02BC}')
}

/// Canonical form of one key field.
///
/// Lower-cases, strips diacritics (NFKD minus combining marks), deletes
/// apostrophes so `Men's` and `mens` agree, and collapses every other run of
/// non-alphanumeric characters to a single space.
pub fn normalize_text(s: &str) -> String {
    let folded: String = s
        .to_lowercase()
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase();

    let mut out = String::with_capacity(folded.len());
    let mut pending_space = false;
    for c in folded.chars() {
        if is_apostrophe(c) {
            continue;
        }
        if c.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(c);
        } else {
            pending_space = true;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn renders_with_pipes() {
        let k = ItemKey::new(" Shirt ", "Red", "M");
        assert_eq!(k.to_string(), "Shirt|Red|M");
        assert_eq!(ItemKey::parse("Shirt|Red|M"), k);
    }

    #[test]
    fn parse_tolerates_short_keys() {
        let k = ItemKey::parse("Gift Card");
        assert_eq!(k.product, "Gift Card");
        assert_eq!(k.color, "");
        assert_eq!(k.size, "");
        assert_eq!(k.to_string(), "Gift Card||");
    }

    #[test]
    fn apostrophes_and_case_collapse() {
        let a = ItemKey::parse("Men's Tee|Red|M").normalized();
        let b = ItemKey::parse("mens tee|red|m").normalized();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "mens tee|red|m");
    }

    #[test]
    fn diacritics_and_punctuation() {
        assert_eq!(normalize_text("Crème  Brûlée"), "creme brulee");
        assert_eq!(normalize_text("T-Shirt / V-Neck"), "t shirt v neck");
        assert_eq!(normalize_text("  XL  "), "xl");
        assert_eq!(normalize_text("Women’s Jacket"), "womens jacket");
        assert_eq!(normalize_text("---"), "");
    }

    proptest! {
        #[test]
        fn normalization_is_idempotent(s in "[A-Za-z0-9 '’`&/.,ÀÉÎõüçñßØ-]{0,32}") {
            let once = normalize_text(&s);
            prop_assert_eq!(normalize_text(&once), once.clone());
        }

        #[test]
        fn normalized_key_is_idempotent(
            p in "[A-Za-z' éü-]{0,16}",
            c in "[A-Za-z/ ]{0,8}",
            z in "[A-Z0-9.]{0,4}",
        ) {
            let k = ItemKey::new(&p, &c, &z).normalized();
            prop_assert_eq!(k.normalized(), k);
        }
    }
}
