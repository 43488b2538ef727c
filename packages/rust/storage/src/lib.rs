//! Persistence for conftrack.
//!
//! - [`CatalogStore`]: the authoritative JSON catalog, loaded at the start of
//!   a run and rewritten wholesale at the end
//! - [`OutputLayout`]: auxiliary run artefacts (raw scrapes, escalation
//!   queue, audit trail, removed records)
//! - [`LookupCache`]: libSQL database caching search-provider responses
//!
//! Two runs must not write the same catalog concurrently; nothing here locks.

pub mod cache;
pub mod catalog;
mod migrations;

pub use cache::LookupCache;
pub use catalog::{CatalogStore, OutputLayout, append_json_array, write_json, write_text};
