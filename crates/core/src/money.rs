//! Money in minor units.
//!
//! Amounts scraped from the console are display strings (`$1,234.50`,
//! `-$5.00`, `Discount: $3`). Everything is converted to `i64` cents with
//! integer math; floats never touch an amount.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(pub i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    pub fn cents(self) -> i64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Subtraction that never goes below zero. Used for derived prices.
    pub fn floored_sub(self, rhs: Money) -> Money {
        Money((self.0 - rhs.0).max(0))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl Add for Money {
    type Output = Money;
    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Money;
    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse a scraped amount.
///
/// Every character other than ASCII digits and `.` is stripped first, so
/// `$1,234.50`, `USD 1234.5` and `-$3` all parse (the last one to `3.00`).
/// Empty or unparseable input yields zero. Fractions beyond two places are
/// rounded half-up.
pub fn parse_amount(s: &str) -> Money {
    let kept: String = s.chars().filter(|c| c.is_ascii_digit() || *c == '.').collect();
    parse_unsigned_decimal(&kept).map(Money).unwrap_or(Money::ZERO)
}

/// Like [`parse_amount`], but keeps a leading `-` or accounting parentheses.
/// Used when reading exported datasets where returns carry a sign.
pub fn parse_signed_amount(s: &str) -> Money {
    let trimmed = s.trim();
    let negative = trimmed.starts_with('-')
        || trimmed.starts_with("$-")
        || (trimmed.starts_with('(') && trimmed.ends_with(')'));
    let m = parse_amount(trimmed);
    if negative {
        Money(-m.0)
    } else {
        m
    }
}

fn parse_unsigned_decimal(s: &str) -> Option<i64> {
    if s.is_empty() || s.matches('.').count() > 1 {
        return None;
    }
    let (whole, frac) = match s.find('.') {
        Some(dot) => (&s[..dot], &s[dot + 1..]),
        None => (s, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return None;
    }

    let dollars: i64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let mut digits = frac.bytes().map(|b| (b - b'0') as i64);
    let tens = digits.next().unwrap_or(0);
    let ones = digits.next().unwrap_or(0);
    let round_up = digits.next().map(|d| d >= 5).unwrap_or(false);

    let cents = dollars
        .checked_mul(100)?
        .checked_add(tens * 10 + ones)?
        .checked_add(if round_up { 1 } else { 0 })?;
    Some(cents)
}

// ---------------------------------------------------------------------------
// Currency tokens
// ---------------------------------------------------------------------------

fn currency_re() -> &'static Regex {
    static CURRENCY_RE: OnceLock<Regex> = OnceLock::new();
    CURRENCY_RE.get_or_init(|| {
        Regex::new(r"\$\s?(?:[0-9][0-9,]*(?:\.[0-9]+)?|\.[0-9]+)").expect("valid currency regex")
    })
}

/// All `$`-prefixed amounts in `text`, in order of appearance.
pub fn currency_tokens(text: &str) -> Vec<&str> {
    currency_re().find_iter(text).map(|m| m.as_str()).collect()
}

/// Byte spans of the currency tokens in `text`.
pub fn currency_token_spans(text: &str) -> Vec<(usize, usize)> {
    currency_re().find_iter(text).map(|m| (m.start(), m.end())).collect()
}

pub fn contains_currency_token(text: &str) -> bool {
    currency_re().is_match(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_amount_strips_formatting() {
        assert_eq!(parse_amount("$1,234.50"), Money(123450));
        assert_eq!(parse_amount("$0.99"), Money(99));
        assert_eq!(parse_amount("100"), Money(10000));
        assert_eq!(parse_amount("  $42 "), Money(4200));
        assert_eq!(parse_amount("$10.5"), Money(1050));
        assert_eq!(parse_amount("$.75"), Money(75));
        assert_eq!(parse_amount("-$3.00"), Money(300));
    }

    #[test]
    fn parse_amount_garbage_is_zero() {
        assert_eq!(parse_amount(""), Money::ZERO);
        assert_eq!(parse_amount("N/A"), Money::ZERO);
        assert_eq!(parse_amount("$"), Money::ZERO);
        assert_eq!(parse_amount("1.2.3"), Money::ZERO);
        assert_eq!(parse_amount("."), Money::ZERO);
        assert_eq!(parse_amount("99999999999999999999999"), Money::ZERO);
    }

    #[test]
    fn parse_amount_rounds_third_place() {
        assert_eq!(parse_amount("1.005"), Money(101));
        assert_eq!(parse_amount("1.004"), Money(100));
    }

    #[test]
    fn parse_signed_amount_keeps_sign() {
        assert_eq!(parse_signed_amount("-12.50"), Money(-1250));
        assert_eq!(parse_signed_amount("$-12.50"), Money(-1250));
        assert_eq!(parse_signed_amount("($7.00)"), Money(-700));
        assert_eq!(parse_signed_amount("7"), Money(700));
    }

    #[test]
    fn display_is_plain_decimal() {
        assert_eq!(Money(123450).to_string(), "1234.50");
        assert_eq!(Money(5).to_string(), "0.05");
        assert_eq!(Money(-300).to_string(), "-3.00");
        assert_eq!(Money::ZERO.to_string(), "0.00");
    }

    #[test]
    fn display_round_trips_through_parse() {
        for cents in [0, 1, 99, 100, 123456] {
            assert_eq!(parse_amount(&Money(cents).to_string()), Money(cents));
        }
    }

    #[test]
    fn tokens_found_in_order() {
        let line = "Blue Oxford Shirt  $59.00  -$10.00  $49.00";
        assert_eq!(currency_tokens(line), vec!["$59.00", "$10.00", "$49.00"]);
        assert!(contains_currency_token("Total $1,020.00"));
        assert!(!contains_currency_token("Qty 2"));
    }

    #[test]
    fn floored_sub_never_negative() {
        assert_eq!(Money(500).floored_sub(Money(200)), Money(300));
        assert_eq!(Money(100).floored_sub(Money(200)), Money::ZERO);
    }
}
