//! Calendar helpers: the `YearMonth` unit the driver and the reconciler walk,
//! and parsing of the console's free-text timestamps.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{Datelike, Duration, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DateError {
    #[error("invalid month {0:?} (expected YYYY-MM)")]
    InvalidMonth(String),
    #[error("month range {start}..{end} is reversed")]
    ReversedRange { start: YearMonth, end: YearMonth },
}

// ---------------------------------------------------------------------------
// YearMonth
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        if (1..=12).contains(&month) && NaiveDate::from_ymd_opt(year, month, 1).is_some() {
            Some(Self { year, month })
        } else {
            None
        }
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(self) -> i32 {
        self.year
    }

    pub fn month(self) -> u32 {
        self.month
    }

    pub fn prev(self) -> Self {
        if self.month == 1 {
            Self { year: self.year - 1, month: 12 }
        } else {
            Self { year: self.year, month: self.month - 1 }
        }
    }

    pub fn next(self) -> Self {
        if self.month == 12 {
            Self { year: self.year + 1, month: 1 }
        } else {
            Self { year: self.year, month: self.month + 1 }
        }
    }

    pub fn first_day(self) -> NaiveDate {
        // Constructor guarantees the first of the month exists.
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    pub fn last_day(self) -> NaiveDate {
        self.next().first_day() - Duration::days(1)
    }

    pub fn contains(self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }

    /// Inclusive month range, oldest first.
    pub fn range_inclusive(start: YearMonth, end: YearMonth) -> Result<Vec<YearMonth>, DateError> {
        if start > end {
            return Err(DateError::ReversedRange { start, end });
        }
        let mut months = Vec::new();
        let mut cur = start;
        while cur <= end {
            months.push(cur);
            cur = cur.next();
        }
        Ok(months)
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = DateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || DateError::InvalidMonth(s.to_string());
        let (y, m) = s.trim().split_once('-').ok_or_else(err)?;
        if y.len() != 4 || m.is_empty() || m.len() > 2 {
            return Err(err());
        }
        let year: i32 = y.parse().map_err(|_| err())?;
        let month: u32 = m.parse().map_err(|_| err())?;
        YearMonth::new(year, month).ok_or_else(err)
    }
}

impl Serialize for YearMonth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for YearMonth {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Display timestamps
// ---------------------------------------------------------------------------

fn iso_re() -> &'static Regex {
    static ISO_RE: OnceLock<Regex> = OnceLock::new();
    ISO_RE.get_or_init(|| Regex::new(r"\b(\d{4})-(\d{1,2})-(\d{1,2})").expect("valid iso regex"))
}

fn us_numeric_re() -> &'static Regex {
    static US_RE: OnceLock<Regex> = OnceLock::new();
    US_RE.get_or_init(|| {
        Regex::new(r"\b(\d{1,2})/(\d{1,2})/(\d{4}|\d{2})\b").expect("valid us date regex")
    })
}

fn month_name_first_re() -> &'static Regex {
    static MDY_RE: OnceLock<Regex> = OnceLock::new();
    MDY_RE.get_or_init(|| {
        Regex::new(r"(?i)\b([a-z]{3,9})\.?\s+(\d{1,2})(?:st|nd|rd|th)?,?\s+(\d{4})\b")
            .expect("valid month-name regex")
    })
}

fn day_first_re() -> &'static Regex {
    static DMY_RE: OnceLock<Regex> = OnceLock::new();
    DMY_RE.get_or_init(|| {
        Regex::new(r"(?i)\b(\d{1,2})\s+([a-z]{3,9})\.?,?\s+(\d{4})\b").expect("valid day-first regex")
    })
}

fn month_from_name(name: &str) -> Option<u32> {
    let lower = name.to_ascii_lowercase();
    let prefix = lower.get(..3)?;
    let month = match prefix {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

/// Extract the calendar day from a console display timestamp.
///
/// Accepts ISO (`2024-05-14T15:22`), US numeric (`5/14/2024 3:22 PM`,
/// `05/14/24`), and month-name forms (`May 14, 2024`, `14 May 2024`). The
/// time-of-day portion is ignored. Returns `None` when no date is found.
pub fn parse_display_date(text: &str) -> Option<NaiveDate> {
    if let Some(c) = iso_re().captures(text) {
        let y = c[1].parse().ok()?;
        let m = c[2].parse().ok()?;
        let d = c[3].parse().ok()?;
        return NaiveDate::from_ymd_opt(y, m, d);
    }

    if let Some(c) = us_numeric_re().captures(text) {
        let m = c[1].parse().ok()?;
        let d = c[2].parse().ok()?;
        let mut y: i32 = c[3].parse().ok()?;
        if c[3].len() == 2 {
            y += 2000;
        }
        return NaiveDate::from_ymd_opt(y, m, d);
    }

    if let Some(c) = month_name_first_re().captures(text) {
        if let Some(m) = month_from_name(&c[1]) {
            let d = c[2].parse().ok()?;
            let y = c[3].parse().ok()?;
            return NaiveDate::from_ymd_opt(y, m, d);
        }
    }

    if let Some(c) = day_first_re().captures(text) {
        if let Some(m) = month_from_name(&c[2]) {
            let d = c[1].parse().ok()?;
            let y = c[3].parse().ok()?;
            return NaiveDate::from_ymd_opt(y, m, d);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ym(s: &str) -> YearMonth {
        s.parse().unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn month_walks_across_year_boundary() {
        assert_eq!(ym("2024-01").prev(), ym("2023-12"));
        assert_eq!(ym("2023-12").next(), ym("2024-01"));
        assert_eq!(ym("2024-05").prev().next(), ym("2024-05"));
    }

    #[test]
    fn month_bounds() {
        assert_eq!(ym("2024-02").last_day(), date(2024, 2, 29));
        assert_eq!(ym("2023-02").last_day(), date(2023, 2, 28));
        assert_eq!(ym("2024-12").last_day(), date(2024, 12, 31));
        assert_eq!(ym("2024-12").first_day(), date(2024, 12, 1));
        assert!(ym("2024-05").contains(date(2024, 5, 31)));
        assert!(!ym("2024-05").contains(date(2024, 6, 1)));
    }

    #[test]
    fn month_parse_rejects_garbage() {
        assert!("2024-13".parse::<YearMonth>().is_err());
        assert!("2024".parse::<YearMonth>().is_err());
        assert!("24-05".parse::<YearMonth>().is_err());
        assert!("2024-5".parse::<YearMonth>().is_ok());
        assert_eq!(ym("2024-5").to_string(), "2024-05");
    }

    #[test]
    fn range_is_inclusive_and_ordered() {
        let months = YearMonth::range_inclusive(ym("2023-11"), ym("2024-02")).unwrap();
        let labels: Vec<String> = months.iter().map(|m| m.to_string()).collect();
        assert_eq!(labels, vec!["2023-11", "2023-12", "2024-01", "2024-02"]);
        assert!(YearMonth::range_inclusive(ym("2024-02"), ym("2024-01")).is_err());
    }

    #[test]
    fn month_serializes_as_string() {
        let json = serde_json::to_string(&ym("2024-05")).unwrap();
        assert_eq!(json, "\"2024-05\"");
        let back: YearMonth = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ym("2024-05"));
    }

    #[test]
    fn display_dates_in_common_shapes() {
        assert_eq!(parse_display_date("2024-05-14T15:22:00"), Some(date(2024, 5, 14)));
        assert_eq!(parse_display_date("5/14/2024 3:22 PM"), Some(date(2024, 5, 14)));
        assert_eq!(parse_display_date("05/14/24"), Some(date(2024, 5, 14)));
        assert_eq!(parse_display_date("May 14, 2024 3:22 PM"), Some(date(2024, 5, 14)));
        assert_eq!(parse_display_date("Sept. 3rd, 2023"), Some(date(2023, 9, 3)));
        assert_eq!(parse_display_date("14 May 2024 15:22"), Some(date(2024, 5, 14)));
    }

    #[test]
    fn display_dates_rejects_nonsense() {
        assert_eq!(parse_display_date(""), None);
        assert_eq!(parse_display_date("yesterday"), None);
        assert_eq!(parse_display_date("2/30/2024"), None);
    }
}
