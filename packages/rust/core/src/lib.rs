//! Domain logic and run orchestration for conftrack.
//!
//! Matching, merging, junk removal and taxonomy operate on an in-memory
//! [`Catalog`](conftrack_shared::Catalog); enrichment and tier assignment
//! reach out through the fetcher, search and agent seams; [`pipeline`]
//! strings them together into one run.

pub mod agent;
pub mod enrichment;
pub mod junk;
pub mod matcher;
pub mod merge;
pub mod pipeline;
pub mod taxonomy;
pub mod tiers;
pub mod validate;

pub use agent::{AgentRunner, CommandAgent};
pub use enrichment::{EnrichOptions, EnrichmentReport, Enricher, NoAgent, NoSearch};
pub use junk::{JunkClassifier, JunkSweep};
pub use matcher::Matcher;
pub use merge::{MergeEngine, MergeSummary};
pub use pipeline::{Pipeline, ProgressReporter, RunOptions, RunSummary, SilentProgress};
pub use tiers::{TierOptions, TierReport, assign_tiers};
