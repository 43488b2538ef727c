//! Shared types, error model, and configuration for conftrack.
//!
//! This crate is the foundation depended on by all other conftrack crates.
//! It provides:
//! - [`ConfTrackError`], the unified error type
//! - Domain types ([`ConferenceRecord`], [`CandidateRecord`], [`Field`], [`RunId`])
//! - The in-memory [`Catalog`]
//! - Configuration ([`AppConfig`], [`SourceSpec`], config loading)

pub mod catalog;
pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use catalog::Catalog;
pub use config::{
    AgentConfig, AppConfig, DefaultsConfig, EnrichmentSettings, JunkConfig, MatchingConfig,
    SearchConfig, SourceKind, SourceSpec, SubpageRule, YearWindow, config_dir, config_file_path,
    init_config, load_config, load_config_from,
};
pub use error::{ConfTrackError, Result};
pub use types::{
    CandidateRecord, ConferenceRecord, DateOrder, Field, FieldProvenance, GENERIC_COUNTRY, Pass,
    RunId, SearchHit, Suggestion, TBD, is_unknown,
};
