//! Name and date normalization.
//!
//! Names are reduced to a comparison key; dates are parsed into a start
//! [`NaiveDate`] with the matched range text kept verbatim for display.

use std::collections::BTreeSet;
use std::ops::RangeInclusive;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::{Captures, Regex};
use tracing::{debug, warn};

use conftrack_shared::{DateOrder, YearWindow, is_unknown};

// ---------------------------------------------------------------------------
// Names
// ---------------------------------------------------------------------------

/// Lower-case, replace every non-alphanumeric character with a space and
/// collapse whitespace. Comparison only, never display.
pub fn normalize_name(name: &str) -> String {
    let spaced: String = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                ' '
            }
        })
        .collect();
    spaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalized name tokens longer than two characters.
pub fn significant_tokens(name: &str) -> BTreeSet<String> {
    normalize_name(name)
        .split(' ')
        .filter(|t| t.chars().count() > 2)
        .map(String::from)
        .collect()
}

// ---------------------------------------------------------------------------
// Date context
// ---------------------------------------------------------------------------

/// Per-run and per-source parameters for date parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateContext {
    /// Year assumed when the text carries none.
    pub default_year: i32,
    /// Years outside this window are rejected as implausible.
    pub plausible: RangeInclusive<i32>,
    /// How to read `03/04/2026`.
    pub order: DateOrder,
}

impl DateContext {
    pub fn new(default_year: i32, plausible: RangeInclusive<i32>) -> Self {
        Self {
            default_year,
            plausible,
            order: DateOrder::MonthFirst,
        }
    }

    pub fn from_window(window: &YearWindow) -> Self {
        Self::new(window.default_year, window.plausible.clone())
    }

    /// Same context with a different numeric convention.
    pub fn with_order(&self, order: DateOrder) -> Self {
        Self {
            order,
            ..self.clone()
        }
    }

    fn date(&self, year: i32, month: u32, day: u32) -> Option<NaiveDate> {
        if !self.plausible.contains(&year) {
            debug!(year, "rejecting date outside plausible window");
            return None;
        }
        NaiveDate::from_ymd_opt(year, month, day)
    }
}

/// A parsed date (or range start) with its source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedDate {
    pub start: NaiveDate,
    /// The matched date or range, verbatim.
    pub dates: String,
    /// Numeric date where day-first and month-first both give valid, different days.
    pub ambiguous: bool,
}

impl NormalizedDate {
    /// `YYYY-MM-DD`.
    pub fn iso(&self) -> String {
        self.start.format("%Y-%m-%d").to_string()
    }
}

// ---------------------------------------------------------------------------
// Date parsing
// ---------------------------------------------------------------------------

const MONTHS: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// Month number for a full or abbreviated English month name.
pub fn month_number(token: &str) -> Option<u32> {
    let t = token.trim_end_matches('.').to_ascii_lowercase();
    if t == "sept" {
        return Some(9);
    }
    if t.len() < 3 {
        return None;
    }
    MONTHS
        .iter()
        .position(|m| m.starts_with(t.as_str()))
        .map(|i| i as u32 + 1)
}

static ISO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{4})-(\d{1,2})-(\d{1,2})(?:\b|T)").expect("valid regex"));

static CROSS_MONTH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b([a-z]{3,9})\.?\s+(\d{1,2})(?:st|nd|rd|th)?\s*(?:[-–—]|to|through)\s*([a-z]{3,9})\.?\s+(\d{1,2})(?:st|nd|rd|th)?\b(?:,?\s*(\d{4})\b)?",
    )
    .expect("valid regex")
});

static CROSS_MONTH_DAY_FIRST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(\d{1,2})(?:st|nd|rd|th)?\s+([a-z]{3,9})\.?\s*(?:[-–—]|to|through)\s*(\d{1,2})(?:st|nd|rd|th)?\s+([a-z]{3,9})\b\.?(?:,?\s*(\d{4})\b)?",
    )
    .expect("valid regex")
});

static MONTH_DAY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b([a-z]{3,9})\.?\s+(\d{1,2})(?:st|nd|rd|th)?(?:\s*(?:[-–—]|to|through)\s*\d{1,2}(?:st|nd|rd|th)?)?\b(?:,?\s*(\d{4})\b)?",
    )
    .expect("valid regex")
});

static DAY_MONTH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(\d{1,2})(?:st|nd|rd|th)?(?:\s*(?:[-–—]|to)\s*\d{1,2}(?:st|nd|rd|th)?)?\s+(?:of\s+)?([a-z]{3,9})\b\.?(?:,?\s*(\d{4})\b)?",
    )
    .expect("valid regex")
});

static NUMERIC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2})[/.-](\d{1,2})[/.-](\d{4})\b").expect("valid regex"));

static MONTH_YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b([a-z]{3,9})\.?,?\s+(\d{4})\b").expect("valid regex"));

static YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b((?:19|20)\d{2})\b").expect("valid regex"));

/// Parse a free-text date or date range.
///
/// Recognized, in priority order: ISO dates, textual ranges spanning two
/// months, `Month Day[-Day][, Year]`, `Day[-Day] Month[ Year]`, numeric dates
/// read per [`DateContext::order`], and finally `Month Year` (day 1).
/// A missing year is taken from elsewhere in the text, else the context's
/// default year. Years outside the plausible window yield `None`.
pub fn normalize_date(text: &str, ctx: &DateContext) -> Option<NormalizedDate> {
    let text = text.trim();
    if is_unknown(text) {
        return None;
    }

    parse_iso(text, ctx)
        .or_else(|| parse_cross_month(text, ctx))
        .or_else(|| parse_month_day(text, ctx))
        .or_else(|| parse_day_month(text, ctx))
        .or_else(|| parse_numeric(text, ctx))
        .or_else(|| parse_month_year(text, ctx))
}

fn parse_iso(text: &str, ctx: &DateContext) -> Option<NormalizedDate> {
    ISO_RE.captures_iter(text).find_map(|caps| {
        let start = ctx.date(num(&caps, 1)?, num(&caps, 2)?, num(&caps, 3)?)?;
        Some(found(start, &caps, false))
    })
}

fn parse_cross_month(text: &str, ctx: &DateContext) -> Option<NormalizedDate> {
    let month_first = CROSS_MONTH_RE.captures_iter(text).find_map(|caps| {
        let (m1, d1) = (month_number(&caps[1])?, num(&caps, 2)?);
        let m2 = month_number(&caps[3])?;
        range_start(text, ctx, &caps, m1, d1, m2, 5)
    });
    month_first.or_else(|| {
        CROSS_MONTH_DAY_FIRST_RE.captures_iter(text).find_map(|caps| {
            let (d1, m1) = (num(&caps, 1)?, month_number(&caps[2])?);
            let m2 = month_number(&caps[4])?;
            range_start(text, ctx, &caps, m1, d1, m2, 5)
        })
    })
}

/// Start of a range whose year (group `year_group`) belongs to the end month.
fn range_start(
    text: &str,
    ctx: &DateContext,
    caps: &Captures<'_>,
    m1: u32,
    d1: u32,
    m2: u32,
    year_group: usize,
) -> Option<NormalizedDate> {
    let end_year = year_of(text, caps, year_group, ctx);
    let year = if m1 > m2 { end_year - 1 } else { end_year };
    let start = ctx.date(year, m1, d1)?;
    Some(found(start, caps, false))
}

fn parse_month_day(text: &str, ctx: &DateContext) -> Option<NormalizedDate> {
    MONTH_DAY_RE.captures_iter(text).find_map(|caps| {
        let month = month_number(&caps[1])?;
        let day = num(&caps, 2)?;
        let start = ctx.date(year_of(text, &caps, 3, ctx), month, day)?;
        Some(found(start, &caps, false))
    })
}

fn parse_day_month(text: &str, ctx: &DateContext) -> Option<NormalizedDate> {
    DAY_MONTH_RE.captures_iter(text).find_map(|caps| {
        let day = num(&caps, 1)?;
        let month = month_number(&caps[2])?;
        let start = ctx.date(year_of(text, &caps, 3, ctx), month, day)?;
        Some(found(start, &caps, false))
    })
}

fn parse_numeric(text: &str, ctx: &DateContext) -> Option<NormalizedDate> {
    NUMERIC_RE.captures_iter(text).find_map(|caps| {
        let (a, b, year) = (num(&caps, 1)?, num(&caps, 2)?, num(&caps, 3)?);
        let (month, day) = match ctx.order {
            DateOrder::MonthFirst => (a, b),
            DateOrder::DayFirst => (b, a),
        };
        let start = ctx.date(year, month, day)?;
        let ambiguous = a != b && a <= 12 && b <= 12;
        if ambiguous {
            warn!(text = &caps[0], order = ?ctx.order, "numeric date is ambiguous");
        }
        Some(found(start, &caps, ambiguous))
    })
}

fn parse_month_year(text: &str, ctx: &DateContext) -> Option<NormalizedDate> {
    MONTH_YEAR_RE.captures_iter(text).find_map(|caps| {
        let month = month_number(&caps[1])?;
        let start = ctx.date(num(&caps, 2)?, month, 1)?;
        Some(found(start, &caps, false))
    })
}

fn num<T: std::str::FromStr>(caps: &Captures<'_>, group: usize) -> Option<T> {
    caps.get(group)?.as_str().parse().ok()
}

/// Explicit year in `group`, else the first year anywhere in `text`, else the default.
fn year_of(text: &str, caps: &Captures<'_>, group: usize, ctx: &DateContext) -> i32 {
    num(caps, group)
        .or_else(|| {
            YEAR_RE
                .captures(text)
                .and_then(|c| c[1].parse::<i32>().ok())
        })
        .unwrap_or(ctx.default_year)
}

fn found(start: NaiveDate, caps: &Captures<'_>, ambiguous: bool) -> NormalizedDate {
    NormalizedDate {
        start,
        dates: caps[0].trim().trim_end_matches(',').trim_end().to_string(),
        ambiguous,
    }
}

// ---------------------------------------------------------------------------
// Vague start dates
// ---------------------------------------------------------------------------

static DAY_ONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:^|\D)0?1(?:st)?(?:\D|$)").expect("valid regex"));

/// A 1st-of-month start date whose display text names no day 1: a
/// month-only guess, treated as missing by enrichment.
pub fn is_vague_start(start_date: &str, dates: &str) -> bool {
    start_date.len() == 10 && start_date.ends_with("-01") && !DAY_ONE_RE.is_match(dates)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> DateContext {
        DateContext::new(2026, 2025..=2030)
    }

    fn iso(text: &str) -> Option<String> {
        normalize_date(text, &ctx()).map(|d| d.iso())
    }

    #[test]
    fn name_key() {
        assert_eq!(
            normalize_name("  The 2026 AFA/AEA Annual-Meeting!! "),
            "the 2026 afa aea annual meeting"
        );
        let tokens = significant_tokens("2026 Finance Workshop at NY");
        assert!(tokens.contains("2026"));
        assert!(tokens.contains("finance"));
        assert!(!tokens.contains("at"));
        assert!(!tokens.contains("ny"));
    }

    #[test]
    fn month_names() {
        assert_eq!(month_number("Sept"), Some(9));
        assert_eq!(month_number("mar."), Some(3));
        assert_eq!(month_number("June"), Some(6));
        assert_eq!(month_number("Jul"), Some(7));
        assert_eq!(month_number("Room"), None);
        assert_eq!(month_number("ma"), None);
    }

    #[test]
    fn range_keeps_text_verbatim() {
        let d = normalize_date("March 19-20, 2026", &ctx()).unwrap();
        assert_eq!(d.iso(), "2026-03-19");
        assert_eq!(d.dates, "March 19-20, 2026");
        assert!(!d.ambiguous);
    }

    #[test]
    fn missing_year_uses_default() {
        assert_eq!(iso("Mar 19").as_deref(), Some("2026-03-19"));
        let pinned = DateContext::new(2027, 2025..=2030);
        assert_eq!(
            normalize_date("Mar 19", &pinned).map(|d| d.iso()).as_deref(),
            Some("2027-03-19")
        );
    }

    #[test]
    fn iso_passes_through() {
        assert_eq!(iso("2026-07-04").as_deref(), Some("2026-07-04"));
        assert_eq!(iso("2026-02-30"), None);
    }

    #[test]
    fn textual_forms() {
        assert_eq!(iso("February 1, 2026").as_deref(), Some("2026-02-01"));
        assert_eq!(iso("14–16 April 2026").as_deref(), Some("2026-04-14"));
        assert_eq!(iso("April 14-16, 2026").as_deref(), Some("2026-04-14"));
        assert_eq!(iso("Thursday, June 4th 2026").as_deref(), Some("2026-06-04"));
        assert_eq!(iso("5th of May, 2026").as_deref(), Some("2026-05-05"));
    }

    #[test]
    fn cross_month_ranges() {
        assert_eq!(iso("March 30 - April 2, 2026").as_deref(), Some("2026-03-30"));
        assert_eq!(iso("30 March - 2 April 2026").as_deref(), Some("2026-03-30"));
        assert_eq!(
            iso("December 30 - January 2, 2027").as_deref(),
            Some("2026-12-30")
        );
    }

    #[test]
    fn year_elsewhere_in_text() {
        assert_eq!(iso("2026 meeting, June 5-6").as_deref(), Some("2026-06-05"));
    }

    #[test]
    fn numeric_follows_source_convention() {
        let us = normalize_date("03/04/2026", &ctx()).unwrap();
        assert_eq!(us.iso(), "2026-03-04");
        assert!(us.ambiguous);

        let eu = normalize_date("03/04/2026", &ctx().with_order(DateOrder::DayFirst)).unwrap();
        assert_eq!(eu.iso(), "2026-04-03");
        assert!(eu.ambiguous);

        let clear = normalize_date("25-12-2026", &ctx().with_order(DateOrder::DayFirst)).unwrap();
        assert_eq!(clear.iso(), "2026-12-25");
        assert!(!clear.ambiguous);
    }

    #[test]
    fn implausible_year_rejected() {
        assert_eq!(iso("March 19, 2031"), None);
        assert_eq!(iso("2019-05-01"), None);
    }

    #[test]
    fn unknown_and_garbage() {
        assert_eq!(iso("TBD"), None);
        assert_eq!(iso(""), None);
        assert_eq!(iso("Room 12 and Hall 4"), None);
    }

    #[test]
    fn month_only_is_day_one() {
        let d = normalize_date("September 2026", &ctx()).unwrap();
        assert_eq!(d.iso(), "2026-09-01");
        assert!(is_vague_start(&d.iso(), &d.dates));
    }

    #[test]
    fn vague_start_detection() {
        assert!(is_vague_start("2026-05-01", "May 2026"));
        assert!(is_vague_start("2026-05-01", ""));
        assert!(!is_vague_start("2026-05-01", "May 1-3, 2026"));
        assert!(!is_vague_start("2026-05-01", "1st May 2026"));
        assert!(!is_vague_start("2026-05-14", "May 14"));
        assert!(!is_vague_start("", ""));
    }
}
