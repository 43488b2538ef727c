//! Cross-field and sanity checks applied before any value is written.

use std::fmt;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

/// Why a suggested value was discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    DeadlineNotBeforeStart { deadline: NaiveDate, start: NaiveDate },
    StartNotAfterDeadline { start: NaiveDate, deadline: NaiveDate },
    LocationTooLong(usize),
    LocationMarkup,
    LocationNoLetters,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeadlineNotBeforeStart { deadline, start } => {
                write!(f, "deadline {deadline} is not before start {start}")
            }
            Self::StartNotAfterDeadline { start, deadline } => {
                write!(f, "start {start} is not after deadline {deadline}")
            }
            Self::LocationTooLong(len) => write!(f, "location too long ({len} chars)"),
            Self::LocationMarkup => f.write_str("location contains markup"),
            Self::LocationNoLetters => f.write_str("location has no letters"),
        }
    }
}

/// `YYYY-MM-DD` → date.
pub fn parse_iso(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}

/// A deadline must fall strictly before the event it belongs to.
pub fn check_deadline(deadline: NaiveDate, start: Option<NaiveDate>) -> Result<(), Rejection> {
    match start {
        Some(start) if deadline >= start => Err(Rejection::DeadlineNotBeforeStart { deadline, start }),
        _ => Ok(()),
    }
}

/// The mirror rule when a start date arrives after a deadline is known.
pub fn check_start(start: NaiveDate, deadline: Option<NaiveDate>) -> Result<(), Rejection> {
    match deadline {
        Some(deadline) if start <= deadline => Err(Rejection::StartNotAfterDeadline { start, deadline }),
        _ => Ok(()),
    }
}

static MARKUP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</?[a-z][^>]*>|[{}]|&[a-z]+;|javascript:|function\s*\(|\bvar\s+\w+\s*=|https?://")
        .expect("valid regex")
});

/// Trimmed location if it looks like a venue; extraction debris otherwise.
pub fn check_location(location: &str, max_len: usize) -> Result<String, Rejection> {
    let cleaned = location.split_whitespace().collect::<Vec<_>>().join(" ");
    let len = cleaned.chars().count();
    if len > max_len {
        return Err(Rejection::LocationTooLong(len));
    }
    if MARKUP_RE.is_match(&cleaned) {
        return Err(Rejection::LocationMarkup);
    }
    if !cleaned.chars().any(char::is_alphabetic) {
        return Err(Rejection::LocationNoLetters);
    }
    Ok(cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        parse_iso(s).unwrap()
    }

    #[test]
    fn deadline_must_precede_start() {
        assert!(check_deadline(d("2026-02-01"), Some(d("2026-02-19"))).is_ok());
        assert!(check_deadline(d("2026-09-01"), Some(d("2026-08-01"))).is_err());
        assert!(check_deadline(d("2026-08-01"), Some(d("2026-08-01"))).is_err());
        assert!(check_deadline(d("2026-09-01"), None).is_ok());
        assert!(check_start(d("2026-08-01"), Some(d("2026-09-01"))).is_err());
    }

    #[test]
    fn locations() {
        assert_eq!(check_location("  Orlando,   FL ", 100).unwrap(), "Orlando, FL");
        assert_eq!(check_location(&"x".repeat(150), 100), Err(Rejection::LocationTooLong(150)));
        assert_eq!(check_location("<div>Paris</div>", 100), Err(Rejection::LocationMarkup));
        assert_eq!(check_location("window.x = {a: 1}", 100), Err(Rejection::LocationMarkup));
        assert_eq!(check_location("2026", 100), Err(Rejection::LocationNoLetters));
    }
}
