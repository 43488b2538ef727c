//! Generic (fallback) listing adapter.
//!
//! Treats every list item or heading that carries a link as one event.
//! Links inside page chrome are ignored.

use std::collections::HashSet;
use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use url::Url;

use conftrack_shared::{CandidateRecord, Result, SourceKind, SourceSpec};

use super::{SourceAdapter, candidate, element_text, resolve};

static ENTRY_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("li, h2, h3, h4, tr, article").expect("valid selector")
});
static LINK_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid selector"));

/// Names shorter than this are navigation, not events.
const MIN_NAME_LEN: usize = 8;

/// Adapter for arbitrary event listing pages.
pub struct HtmlListAdapter;

impl SourceAdapter for HtmlListAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::HtmlList
    }

    fn parse(
        &self,
        body: &str,
        base_url: &Url,
        source: &SourceSpec,
    ) -> Result<Vec<CandidateRecord>> {
        let doc = Html::parse_document(body);
        let mut seen: HashSet<String> = HashSet::new();
        let mut out = Vec::new();

        for entry in doc.select(&ENTRY_SEL) {
            if in_chrome(&entry) {
                continue;
            }
            let Some(link) = entry.select(&LINK_SEL).next() else {
                continue;
            };
            let name = element_text(&link);
            if name.chars().count() < MIN_NAME_LEN {
                continue;
            }
            let Some(url) = link.value().attr("href").and_then(|h| resolve(base_url, h)) else {
                continue;
            };
            if !seen.insert(url.clone()) {
                continue;
            }
            out.push(candidate(source, &name, &url, &element_text(&entry)));
        }
        Ok(out)
    }

    fn name(&self) -> &str {
        "html-list"
    }
}

fn in_chrome(el: &ElementRef<'_>) -> bool {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| matches!(a.value().name(), "nav" | "header" | "footer" | "aside"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use conftrack_shared::DateOrder;

    #[test]
    fn reads_linked_list_items() {
        let html = r#"<html><body>
            <nav><ul><li><a href="/about-the-society">About the society</a></li></ul></nav>
            <main>
              <h2><a href="/events/efa-2026">European Finance Association Annual Meeting</a></h2>
              <ul>
                <li><a href="/events/efa-2026">European Finance Association Annual Meeting</a> 19-22 August 2026, Lisbon</li>
                <li><a href="/events/doctoral">Doctoral Tutorial</a> 18 August 2026</li>
                <li><a href="/x">More</a></li>
                <li>No link here</li>
              </ul>
            </main></body></html>"#;

        let spec = SourceSpec {
            name: "efa".into(),
            url: "https://efa.example.org/events/".into(),
            kind: SourceKind::HtmlList,
            category: Some("Finance".into()),
            discipline: None,
            authoritative: false,
            date_order: DateOrder::DayFirst,
        };
        let items = HtmlListAdapter
            .parse(html, &Url::parse(&spec.url).unwrap(), &spec)
            .unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].url, "https://efa.example.org/events/efa-2026");
        assert_eq!(items[1].name, "Doctoral Tutorial");
        assert!(items[1].description.contains("18 August 2026"));
    }
}
