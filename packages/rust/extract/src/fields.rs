//! Field extractors: pure `text -> value` functions over the pattern tables.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::normalize::{DateContext, NormalizedDate, normalize_date};
use crate::patterns;

/// Everything the extractors found in one body of text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extracted {
    pub deadline: Option<NaiveDate>,
    pub conference: Option<NormalizedDate>,
    pub location: Option<String>,
}

impl Extracted {
    pub fn is_empty(&self) -> bool {
        self.deadline.is_none() && self.conference.is_none() && self.location.is_none()
    }
}

/// Run all three extractors.
pub fn extract_fields(text: &str, ctx: &DateContext) -> Extracted {
    Extracted {
        deadline: extract_deadline(text, ctx),
        conference: extract_conference_dates(text, ctx),
        location: extract_location(text),
    }
}

/// Submission deadline. Rules carrying a year win over year-less ones.
pub fn extract_deadline(text: &str, ctx: &DateContext) -> Option<NaiveDate> {
    first_date(&patterns::DEADLINE, text, ctx, false)
        .or_else(|| first_date(&patterns::DEADLINE_NOYEAR, text, ctx, true))
        .map(|d| d.start)
}

/// Conference dates: start date plus the range text as written.
pub fn extract_conference_dates(text: &str, ctx: &DateContext) -> Option<NormalizedDate> {
    first_date(&patterns::CONFERENCE_DATE, text, ctx, false)
        .or_else(|| first_date(&patterns::CONFERENCE_DATE_NOYEAR, text, ctx, true))
}

/// Venue from a `Location:`/`Venue:` label, cut at the next label or sentence end.
pub fn extract_location(text: &str) -> Option<String> {
    static NEXT_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?i)\s+(?:date|dates|deadline|time|posted|website|contact|email)s?\s*:.*$|\s*[|•].*$")
            .expect("valid regex")
    });

    patterns::LOCATION.iter().find_map(|re| {
        let caps = re.captures(text)?;
        let raw = NEXT_LABEL_RE.replace(caps[1].trim(), "");
        let cleaned = raw
            .trim()
            .trim_end_matches(['.', ',', ';'])
            .trim()
            .to_string();
        (!cleaned.is_empty()).then_some(cleaned)
    })
}

/// First rule, in table order, whose capture normalizes to a plausible date.
fn first_date(
    rules: &[Regex],
    text: &str,
    ctx: &DateContext,
    year_less: bool,
) -> Option<NormalizedDate> {
    rules.iter().find_map(|re| {
        re.captures_iter(text).find_map(|caps| {
            let m = caps.get(1)?;
            if year_less && followed_by_digit(&text[m.end()..]) {
                return None;
            }
            normalize_date(m.as_str(), ctx)
        })
    })
}

/// `"March 6, 2031"` must not be read as year-less `"March 6"`.
fn followed_by_digit(rest: &str) -> bool {
    rest.trim_start_matches([',', ' '])
        .starts_with(|c: char| c.is_ascii_digit())
}
