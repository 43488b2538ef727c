//! Search-provider response parsing.
//!
//! Three response shapes are understood:
//! - Brave web search: `{"web": {"results": [{"title", "url", "description"}]}}`
//! - Generic: `{"results": [{"title", "url", "snippet"}]}`
//! - Google CSE: `{"items": [{"title", "link", "snippet"}]}`

use serde::Deserialize;

use conftrack_shared::{ConfTrackError, Result, SearchHit};

// ---------------------------------------------------------------------------
// Wire shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct Response {
    #[serde(default)]
    web: Option<WebSection>,
    #[serde(default)]
    results: Option<Vec<RawHit>>,
    #[serde(default)]
    items: Option<Vec<RawHit>>,
}

#[derive(Debug, Default, Deserialize)]
struct WebSection {
    #[serde(default)]
    results: Vec<RawHit>,
}

#[derive(Debug, Default, Deserialize)]
struct RawHit {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    snippet: Option<String>,
}

impl RawHit {
    fn into_hit(self) -> Option<SearchHit> {
        let url = self.url.or(self.link).filter(|u| !u.trim().is_empty())?;
        Some(SearchHit {
            title: strip_highlight(&self.title),
            url,
            snippet: strip_highlight(&self.description.or(self.snippet).unwrap_or_default()),
        })
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Parse a provider body into ranked hits, capped at `limit`.
///
/// Hits without a URL are dropped. A body that is not JSON is a parse error;
/// JSON of an unknown shape yields no hits.
pub fn parse_response(body: &str, limit: usize) -> Result<Vec<SearchHit>> {
    let response: Response = serde_json::from_str(body)
        .map_err(|e| ConfTrackError::parse(format!("search response: {e}")))?;

    let raw = response
        .web
        .map(|w| w.results)
        .or(response.results)
        .or(response.items)
        .unwrap_or_default();

    Ok(raw
        .into_iter()
        .filter_map(RawHit::into_hit)
        .take(limit)
        .collect())
}

/// Providers wrap matched terms in `<strong>`/`<b>`; remove the tags.
fn strip_highlight(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_tag = false;
    for c in text.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}
