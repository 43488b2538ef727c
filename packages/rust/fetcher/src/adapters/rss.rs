//! RSS 2.0 / Atom feed adapter.

use std::sync::LazyLock;

use regex::Regex;
use scraper::Html;
use tracing::debug;
use url::Url;

use conftrack_shared::{CandidateRecord, ConfTrackError, Result, SourceKind, SourceSpec};

use super::{SourceAdapter, candidate, collapse_ws, resolve};

static ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<(item|entry)\b[^>]*>(.*?)</(?:item|entry)>").expect("valid regex"));
static FEED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<(?:rss|feed|channel|rdf:RDF)\b").expect("valid regex"));
static LINK_HREF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<link\b[^>]*\bhref\s*=\s*["']([^"']+)["']"#).expect("valid regex")
});
static CDATA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!\[CDATA\[(.*?)\]\]>").expect("valid regex"));

/// Adapter for syndication feeds.
pub struct RssAdapter;

impl SourceAdapter for RssAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Rss
    }

    fn parse(
        &self,
        body: &str,
        base_url: &Url,
        source: &SourceSpec,
    ) -> Result<Vec<CandidateRecord>> {
        if !FEED_RE.is_match(body) {
            return Err(ConfTrackError::parse(format!(
                "{}: body is not an RSS/Atom feed",
                source.name
            )));
        }

        let mut out = Vec::new();
        for caps in ITEM_RE.captures_iter(body) {
            let inner = &caps[2];
            let Some(title) = tag_text(inner, "title").filter(|t| !t.is_empty()) else {
                debug!("feed item without title, skipping");
                continue;
            };

            let link = tag_text(inner, "link")
                .filter(|l| !l.is_empty())
                .or_else(|| LINK_HREF_RE.captures(inner).map(|c| c[1].to_string()))
                .and_then(|href| resolve(base_url, href.trim()))
                .unwrap_or_default();

            let description = ["description", "summary", "content", "content:encoded"]
                .iter()
                .find_map(|tag| tag_text(inner, tag))
                .unwrap_or_default();

            out.push(candidate(source, &title, &link, &description));
        }
        Ok(out)
    }

    fn name(&self) -> &str {
        "rss"
    }
}

/// Plain text of the first `<tag>` element: CDATA unwrapped, markup and
/// entities resolved.
fn tag_text(xml: &str, tag: &str) -> Option<String> {
    let pattern = format!(r"(?is)<{0}\b[^>]*>(.*?)</{0}>", regex::escape(tag));
    let re = Regex::new(&pattern).ok()?;
    let raw = re.captures(xml)?.get(1)?.as_str();
    let unwrapped = CDATA_RE.replace_all(raw, "$1");
    // Escaped markup inside descriptions decodes to tags on the first pass.
    let decoded = fragment_text(&fragment_text(&unwrapped));
    Some(collapse_ws(&decoded))
}

fn fragment_text(html: &str) -> String {
    Html::parse_fragment(html)
        .root_element()
        .text()
        .collect::<String>()
}
