//! Page fetching and source adapters.
//!
//! This crate provides:
//! - [`PageFetcher`] and its HTTP implementation [`HttpFetcher`]
//! - [`adapters`]: listing parsers (SSRN, RSS/Atom, generic HTML lists)
//! - [`scrape_source`]: fetch + parse for one configured source

pub mod adapters;
pub mod client;

pub use adapters::{
    AdapterRegistry, HtmlListAdapter, RssAdapter, SourceAdapter, SsrnAdapter, dedup_by_source_id,
    scrape_source,
};
pub use client::{FetchPolicy, FetchedPage, HttpFetcher, PageFetcher, is_ssrf_target};
