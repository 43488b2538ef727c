//! Versioned pattern tables for the field extractors.
//!
//! Each table is plain data: a template string per rule, in priority order.
//! Templates use placeholders that expand to shared date grammars, so the
//! tables stay readable and can be tested without any fetch plumbing.
//!
//! | placeholder     | expands to                                          |
//! |-----------------|-----------------------------------------------------|
//! | `{DATE}`        | one date with a year, captured as group 1           |
//! | `{DATE_NOYEAR}` | `Month Day` / `Day Month` without a year, group 1   |
//! | `{RANGE}`       | a date or date range with a year, group 1           |
//! | `{RANGE_NOYEAR}`| a date or range without a year, group 1             |
//! | `{FILLER}`      | up to 40 chars then a comma ("Friday, ", "5pm ET, ")|

use std::sync::LazyLock;

use regex::Regex;

pub(crate) const DEADLINE_TEMPLATES: &[&str] = &[
    r"submission\s+deadline\s*(?:is|:|-)?\s*{FILLER}{DATE}",
    r"deadline\s+for\s+(?:paper\s+)?submissions?\s*(?:is|:)?\s*{FILLER}{DATE}",
    r"(?:deadline|due\s+date)\s*(?:is|:|-)\s*{FILLER}{DATE}",
    r"extended\s+(?:to|until)\s*{FILLER}{DATE}",
    r"submit(?:ted)?\s+(?:\w+\s+){0,4}?(?:by|before|no\s+later\s+than)\s*{FILLER}{DATE}",
    r"due\s+(?:by|on|before)?\s*{FILLER}{DATE}",
    r"no\s+later\s+than\s*{FILLER}{DATE}",
    r"closing\s+date.{0,30}?{DATE}",
    r"deadline.{0,60}?{DATE}",
    r"submi\w*.{0,60}?{DATE}",
];

/// Second pass when no deadline carries a year.
pub(crate) const DEADLINE_NOYEAR_TEMPLATES: &[&str] = &[
    r"submission\s+deadline\s*(?:is|:|-)?\s*{FILLER}{DATE_NOYEAR}",
    r"(?:deadline|due\s+date)\s*(?:is|:|-)\s*{FILLER}{DATE_NOYEAR}",
    r"extended\s+(?:to|until)\s*{FILLER}{DATE_NOYEAR}",
    r"due\s+(?:by|on|before)\s*{FILLER}{DATE_NOYEAR}",
    r"no\s+later\s+than\s*{FILLER}{DATE_NOYEAR}",
];

pub(crate) const CONFERENCE_DATE_TEMPLATES: &[&str] = &[
    r"conference\s+dates?\s*:\s*{RANGE}",
    r"dates?\s+of\s+(?:the\s+)?(?:conference|meeting|workshop|symposium)\s*:?\s*{RANGE}",
    r"(?m)^\s*dates?\s*:\s*{RANGE}",
    r"(?:held|takes?\s+place)\s+(?:on\s+|from\s+)?{RANGE}",
    r"held\s+(?:in|at)\s+[^.\n]{1,60}?\s+(?:on|from)\s+{RANGE}",
    r"scheduled\s+(?:for|on)\s+{RANGE}",
    r"(?:conference|meeting|symposium|workshop)\s+will\s+be\s+(?:on|from)\s+{RANGE}",
];

pub(crate) const CONFERENCE_DATE_NOYEAR_TEMPLATES: &[&str] = &[
    r"conference\s+dates?\s*:\s*{RANGE_NOYEAR}",
    r"(?:held|takes?\s+place)\s+(?:on\s+|from\s+)?{RANGE_NOYEAR}",
];

/// Location rules capture the rest of the labelled line.
pub(crate) const LOCATION_TEMPLATES: &[&str] = &[
    r"(?m)^\s*location\s*:\s*([^\n]{2,160})",
    r"(?m)^\s*venue\s*:\s*([^\n]{2,160})",
    r"\blocation\s*:\s*([^\n]{2,160})",
];

// ---------------------------------------------------------------------------
// Grammar fragments
// ---------------------------------------------------------------------------

const MONTH: &str = r"[A-Za-z]{3,9}\.?";
const DAY: &str = r"\d{1,2}(?:st|nd|rd|th)?";
const DASH: &str = r"\s*(?:[-–—]|to|through)\s*";
const WEEKDAY: &str =
    r"(?:(?:mon|tues?|wed(?:nes)?|thu(?:rs)?|fri|sat(?:ur)?|sun)(?:day)?\.?,?\s+)?";
const FILLER: &str = r"(?:[^,\n]{0,40}?,\s*)?";

fn date_body() -> String {
    format!(
        r"{MONTH}\s+{DAY},?\s*\d{{4}}|{DAY}\s+(?:of\s+)?{MONTH},?\s*\d{{4}}|\d{{4}}-\d{{1,2}}-\d{{1,2}}|\d{{1,2}}[/.-]\d{{1,2}}[/.-]\d{{4}}"
    )
}

fn date_noyear_body() -> String {
    format!(r"(?:{MONTH}\s+{DAY}|{DAY}\s+(?:of\s+)?{MONTH})\b")
}

fn range_body() -> String {
    format!(
        r"{MONTH}\s+{DAY}(?:{DASH}(?:{MONTH}\s+)?{DAY})?,?\s*\d{{4}}|{DAY}(?:\s+{MONTH})?{DASH}{DAY}\s+{MONTH},?\s*\d{{4}}|{DAY}\s+{MONTH},?\s*\d{{4}}|\d{{4}}-\d{{1,2}}-\d{{1,2}}|\d{{1,2}}[/.-]\d{{1,2}}[/.-]\d{{4}}"
    )
}

fn range_noyear_body() -> String {
    format!(r"(?:{MONTH}\s+{DAY}(?:{DASH}(?:{MONTH}\s+)?{DAY})?|{DAY}(?:{DASH}{DAY})?\s+{MONTH})\b")
}

/// Expand placeholders and compile a template, case-insensitively.
pub(crate) fn compile(template: &str) -> Regex {
    let expanded = template
        .replace("{FILLER}", FILLER)
        .replace("{DATE_NOYEAR}", &format!("{WEEKDAY}({})", date_noyear_body()))
        .replace("{DATE}", &format!("{WEEKDAY}({})", date_body()))
        .replace("{RANGE_NOYEAR}", &format!("{WEEKDAY}({})", range_noyear_body()))
        .replace("{RANGE}", &format!("{WEEKDAY}({})", range_body()));
    Regex::new(&format!("(?i){expanded}")).expect("valid pattern template")
}

fn compile_all(templates: &[&str]) -> Vec<Regex> {
    templates.iter().map(|t| compile(t)).collect()
}

pub(crate) static DEADLINE: LazyLock<Vec<Regex>> =
    LazyLock::new(|| compile_all(DEADLINE_TEMPLATES));
pub(crate) static DEADLINE_NOYEAR: LazyLock<Vec<Regex>> =
    LazyLock::new(|| compile_all(DEADLINE_NOYEAR_TEMPLATES));
pub(crate) static CONFERENCE_DATE: LazyLock<Vec<Regex>> =
    LazyLock::new(|| compile_all(CONFERENCE_DATE_TEMPLATES));
pub(crate) static CONFERENCE_DATE_NOYEAR: LazyLock<Vec<Regex>> =
    LazyLock::new(|| compile_all(CONFERENCE_DATE_NOYEAR_TEMPLATES));
pub(crate) static LOCATION: LazyLock<Vec<Regex>> =
    LazyLock::new(|| compile_all(LOCATION_TEMPLATES));

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_template_compiles() {
        for table in [
            DEADLINE_TEMPLATES,
            DEADLINE_NOYEAR_TEMPLATES,
            CONFERENCE_DATE_TEMPLATES,
            CONFERENCE_DATE_NOYEAR_TEMPLATES,
            LOCATION_TEMPLATES,
        ] {
            for template in table {
                let re = compile(template);
                assert!(re.captures_len() >= 2, "{template} lacks a capture group");
            }
        }
    }

    #[test]
    fn date_placeholder_captures_only_the_date() {
        let re = compile(r"deadline\s*:\s*{DATE}");
        let caps = re.captures("Deadline: Friday, March 6, 2026 at noon").unwrap();
        assert_eq!(&caps[1], "March 6, 2026");
    }

    #[test]
    fn range_placeholder_takes_whole_range() {
        let re = compile(r"held\s+{RANGE}");
        let caps = re.captures("will be held 14-16 May 2026 in Lisbon").unwrap();
        assert_eq!(&caps[1], "14-16 May 2026");
        let caps = re.captures("held March 30 - April 2, 2026").unwrap();
        assert_eq!(&caps[1], "March 30 - April 2, 2026");
    }
}
