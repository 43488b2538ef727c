//! SSRN professional-announcement listing adapter.
//!
//! Conference items sit in a `<ul>` right after a section heading; when the
//! headings change, every announcement link inside a list item is used.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use conftrack_shared::{CandidateRecord, Result, SourceKind, SourceSpec};

use super::{SourceAdapter, candidate, element_text, resolve};

/// Section headings whose lists hold conferences.
const CONFERENCE_SECTIONS: &[&str] = &[
    "Call for Papers & Participants - Conference",
    "Call for Participants - Conference",
    "Call for Papers - Competitions",
];

/// Listing items that are never events.
const SKIP_KEYWORDS: &[&str] = &[
    "phd",
    "doctoral position",
    "faculty position",
    "professor of",
    "call for chapters",
    "special issue",
    "journal of",
    "edited book",
    "tenure track",
    "research associate",
    "instructor",
    "lecturer",
    "fellowship",
    "scholarship",
];

static HEADING_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h3, h4").expect("valid selector"));
static LI_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("li").expect("valid selector"));
static P_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("p").expect("valid selector"));
static ANNOUNCEMENT_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"a[href*="/announcement/?id="]"#).expect("valid selector")
});
static ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[?&]id=(\d+)").expect("valid regex"));

/// Adapter for SSRN network announcement pages.
pub struct SsrnAdapter;

impl SourceAdapter for SsrnAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Ssrn
    }

    fn parse(
        &self,
        body: &str,
        base_url: &Url,
        source: &SourceSpec,
    ) -> Result<Vec<CandidateRecord>> {
        let doc = Html::parse_document(body);

        let mut items: Vec<ElementRef<'_>> = Vec::new();
        for heading in doc.select(&HEADING_SEL) {
            let text = element_text(&heading);
            if !CONFERENCE_SECTIONS.iter().any(|s| text.contains(s)) {
                continue;
            }
            let Some(list) = heading.next_siblings().find_map(ElementRef::wrap) else {
                continue;
            };
            if matches!(list.value().name(), "ul" | "ol") {
                items.extend(list.select(&LI_SEL));
            }
        }

        if items.is_empty() {
            debug!("no conference sections found, scanning all announcement links");
            items = doc
                .select(&ANNOUNCEMENT_SEL)
                .filter_map(|link| {
                    link.ancestors()
                        .filter_map(ElementRef::wrap)
                        .find(|el| el.value().name() == "li")
                })
                .collect();
        }

        let candidates: Vec<CandidateRecord> = items
            .iter()
            .filter_map(|li| parse_item(li, base_url, source))
            .collect();

        debug!(
            entries = items.len(),
            kept = candidates.len(),
            "parsed SSRN listing"
        );
        Ok(candidates)
    }

    fn name(&self) -> &str {
        "ssrn"
    }
}

fn parse_item(li: &ElementRef<'_>, base_url: &Url, source: &SourceSpec) -> Option<CandidateRecord> {
    let link = li.select(&ANNOUNCEMENT_SEL).next()?;
    let name = element_text(&link);
    if name.is_empty() {
        return None;
    }

    let lower = name.to_lowercase();
    if let Some(kw) = SKIP_KEYWORDS.iter().find(|kw| lower.contains(*kw)) {
        debug!(%name, keyword = kw, "skipping non-event listing item");
        return None;
    }

    let href = resolve(base_url, link.value().attr("href")?)?;
    let sid = ID_RE
        .captures(&href)
        .map(|c| c[1].to_string())
        .unwrap_or_default();

    let mut dates = String::new();
    let mut location = String::new();
    for p in li.select(&P_SEL) {
        let text = element_text(&p);
        if let Some(rest) = text
            .strip_prefix("Conference Dates:")
            .or_else(|| text.strip_prefix("Date:"))
        {
            dates = rest.trim().to_string();
        } else if let Some(rest) = text.strip_prefix("Location:") {
            location = rest.trim().to_string();
        }
    }

    let mut c = candidate(source, &name, "", &element_text(li));
    c.source_id = sid;
    c.external_link = href;
    c.dates = dates;
    c.location = location;
    Some(c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use conftrack_shared::DateOrder;

    fn spec() -> SourceSpec {
        SourceSpec {
            name: "ssrn-arn".into(),
            url: "https://www.ssrn.com/index.cfm/en/janda/professional-announcements/?annsNet=204"
                .into(),
            kind: SourceKind::Ssrn,
            category: Some("Accounting".into()),
            discipline: None,
            authoritative: false,
            date_order: DateOrder::DayFirst,
        }
    }

    fn parse(html: &str) -> Vec<CandidateRecord> {
        let spec = spec();
        let base = Url::parse(&spec.url).unwrap();
        SsrnAdapter.parse(html, &base, &spec).unwrap()
    }

    const LISTING: &str = r#"<html><body>
        <h3>Call for Papers & Participants - Conference</h3>
        <ul>
          <li>
            <a href="/index.cfm/en/janda/announcement/?id=15001">2026 AAA ATA Midyear Meeting</a>
            <p>Conference Dates: 19 Feb 2026 - 21 Feb 2026</p>
            <p>Location: Orlando, FL, United States</p>
            <p>Posted: 2 Oct 2025</p>
          </li>
          <li>
            <a href="/index.cfm/en/janda/announcement/?id=15002">Assistant Professor of Accounting, Tenure Track</a>
          </li>
        </ul>
        <h3>Jobs</h3>
        <ul>
          <li><a href="/index.cfm/en/janda/announcement/?id=15003">Lecturer in Finance</a></li>
        </ul>
        </body></html>"#;

    #[test]
    fn reads_conference_section() {
        let items = parse(LISTING);
        assert_eq!(items.len(), 1);
        let item = &items[0];
        assert_eq!(item.name, "2026 AAA ATA Midyear Meeting");
        assert_eq!(item.source_id, "15001");
        assert_eq!(
            item.external_link,
            "https://www.ssrn.com/index.cfm/en/janda/announcement/?id=15001"
        );
        assert_eq!(item.dates, "19 Feb 2026 - 21 Feb 2026");
        assert_eq!(item.location, "Orlando, FL, United States");
        assert!(item.url.is_empty());
        assert_eq!(item.categories, vec!["Accounting".to_string()]);
        assert_eq!(item.source_tag, "ssrn-arn");
    }

    #[test]
    fn falls_back_to_announcement_links() {
        let html = r#"<html><body><div><ul>
            <li><a href="https://www.ssrn.com/index.cfm/en/janda/announcement/?id=777">Winter Finance Forum</a>
                <p>Date: 10 Jan 2027</p></li>
            </ul></div></body></html>"#;
        let items = parse(html);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].source_id, "777");
        assert_eq!(items[0].dates, "10 Jan 2027");
    }

    #[test]
    fn empty_page_yields_nothing() {
        assert!(parse("<html><body><p>Maintenance</p></body></html>").is_empty());
    }
}
