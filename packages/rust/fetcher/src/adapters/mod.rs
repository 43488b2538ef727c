//! Source adapters: one per listing shape, each turning a fetched body into
//! candidate records.

mod html_list;
mod rss;
mod ssrn;

use std::collections::HashMap;

use scraper::ElementRef;
use tracing::{debug, info, instrument};
use url::Url;

use conftrack_shared::{CandidateRecord, ConfTrackError, Result, SourceKind, SourceSpec};

use crate::client::PageFetcher;

pub use html_list::HtmlListAdapter;
pub use rss::RssAdapter;
pub use ssrn::SsrnAdapter;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Parses one listing body into candidates.
///
/// Items that cannot be read are skipped; an `Err` means the whole body is
/// not the shape this adapter expects.
pub trait SourceAdapter: Send + Sync {
    /// Listing kind this adapter handles.
    fn kind(&self) -> SourceKind;

    fn parse(&self, body: &str, base_url: &Url, source: &SourceSpec)
    -> Result<Vec<CandidateRecord>>;

    /// Human-readable adapter name for tracing.
    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Holds one adapter per [`SourceKind`].
pub struct AdapterRegistry {
    adapters: Vec<Box<dyn SourceAdapter>>,
}

impl AdapterRegistry {
    /// Registry with all built-in adapters; the generic list adapter is last.
    pub fn new() -> Self {
        Self {
            adapters: vec![
                Box::new(SsrnAdapter),
                Box::new(RssAdapter),
                Box::new(HtmlListAdapter),
            ],
        }
    }

    /// Adapter for `kind`, falling back to the generic list adapter.
    pub fn for_kind(&self, kind: SourceKind) -> &dyn SourceAdapter {
        self.adapters
            .iter()
            .find(|a| a.kind() == kind)
            .map(|a| a.as_ref())
            .unwrap_or(&HtmlListAdapter)
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Scraping
// ---------------------------------------------------------------------------

/// Fetch one source's listing and parse it with the matching adapter.
#[instrument(skip_all, fields(source = %source.name))]
pub async fn scrape_source<F: PageFetcher>(
    fetcher: &F,
    registry: &AdapterRegistry,
    source: &SourceSpec,
) -> Result<Vec<CandidateRecord>> {
    let base = Url::parse(&source.url)
        .map_err(|e| ConfTrackError::config(format!("source {}: bad URL: {e}", source.name)))?;
    let page = fetcher.fetch(&source.url).await?;

    let adapter = registry.for_kind(source.kind);
    let items = adapter.parse(&page.body, &base, source)?;

    info!(adapter = adapter.name(), items = items.len(), "source scraped");
    Ok(items)
}

/// Collapse items sharing a source id, unioning their categories.
///
/// The same announcement is often listed under several networks; first
/// occurrence wins for every other field. Items without a source id pass
/// through untouched.
pub fn dedup_by_source_id(items: Vec<CandidateRecord>) -> Vec<CandidateRecord> {
    let mut out: Vec<CandidateRecord> = Vec::with_capacity(items.len());
    let mut seen: HashMap<String, usize> = HashMap::new();

    for item in items {
        if item.source_id.is_empty() {
            out.push(item);
            continue;
        }
        match seen.get(&item.source_id) {
            Some(&index) => {
                let kept = &mut out[index];
                for category in item.categories {
                    if !kept.categories.contains(&category) {
                        kept.categories.push(category);
                    }
                }
                debug!(sid = %item.source_id, "collapsed duplicate listing item");
            }
            None => {
                seen.insert(item.source_id.clone(), out.len());
                out.push(item);
            }
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Helpers shared by adapters
// ---------------------------------------------------------------------------

/// Candidate with the source-level fields filled in.
pub(crate) fn candidate(
    source: &SourceSpec,
    name: &str,
    url: &str,
    description: &str,
) -> CandidateRecord {
    let mut c = CandidateRecord::new(name, url, description, source.name.as_str());
    c.date_order = source.date_order;
    if let Some(category) = &source.category {
        c.categories.push(category.clone());
    }
    if let Some(discipline) = &source.discipline {
        if source.authoritative {
            c.implied_discipline = Some(discipline.clone());
        } else {
            c.categories.push(discipline.clone());
        }
    }
    c
}

/// Element text with whitespace collapsed.
pub(crate) fn element_text(el: &ElementRef<'_>) -> String {
    collapse_ws(&el.text().collect::<String>())
}

pub(crate) fn collapse_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Resolve `href` against the listing URL, dropping the fragment.
pub(crate) fn resolve(base: &Url, href: &str) -> Option<String> {
    if href.starts_with('#') || href.starts_with("javascript:") || href.starts_with("mailto:") {
        return None;
    }
    let mut resolved = base.join(href).ok()?;
    resolved.set_fragment(None);
    Some(resolved.to_string())
}
