//! End-to-end run: load → scrape → merge → junk sweep → enrich → tiers → save.
//!
//! The catalog is loaded once, handed by `&mut` through every stage and
//! written once at the end. Only catalog I/O is fatal; source, page, search
//! and agent failures degrade to "no data" and the run carries on.

use std::time::{Duration, Instant};

use chrono::NaiveDate;
use tracing::{error, info, instrument, warn};

use conftrack_extract::DateContext;
use conftrack_fetcher::{AdapterRegistry, PageFetcher, dedup_by_source_id, scrape_source};
use conftrack_search::SearchProvider;
use conftrack_shared::{AppConfig, CandidateRecord, Catalog, ConferenceRecord, Result, RunId};
use conftrack_storage::{CatalogStore, OutputLayout, append_json_array, write_json, write_text};

use crate::agent::AgentRunner;
use crate::enrichment::{EnrichOptions, Enricher};
use crate::junk::JunkClassifier;
use crate::matcher::Matcher;
use crate::merge::{MergeEngine, MergeSummary, ensure_unique_source_ids};
use crate::taxonomy::ensure_disciplines;
use crate::tiers::{TierOptions, TierReport, assign_tiers};

/// Which stages run, and how.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Compute everything, write nothing.
    pub dry_run: bool,
    pub scrape: bool,
    pub enrich: bool,
    pub tiers: bool,
    pub deadlines_only: bool,
    pub include_past: bool,
    /// Reference date for the year window and the past-event cut-off.
    pub today: NaiveDate,
}

impl RunOptions {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            dry_run: false,
            scrape: true,
            enrich: true,
            tiers: false,
            deadlines_only: false,
            include_past: false,
            today,
        }
    }
}

/// What a run did.
#[derive(Debug)]
pub struct RunSummary {
    pub run_id: RunId,
    pub sources_ok: usize,
    pub sources_failed: usize,
    /// Candidates after in-batch de-duplication.
    pub candidates: usize,
    pub merge: MergeSummary,
    pub junk_removed: usize,
    pub fields_filled: usize,
    pub suggestions_rejected: usize,
    pub needs_agent: usize,
    pub agent_removed: usize,
    pub agent_aborted: bool,
    pub tiers: Option<TierReport>,
    pub records: usize,
    pub saved: bool,
    pub elapsed: Duration,
}

impl RunSummary {
    fn new(run_id: RunId) -> Self {
        Self {
            run_id,
            sources_ok: 0,
            sources_failed: 0,
            candidates: 0,
            merge: MergeSummary::default(),
            junk_removed: 0,
            fields_filled: 0,
            suggestions_rejected: 0,
            needs_agent: 0,
            agent_removed: 0,
            agent_aborted: false,
            tiers: None,
            records: 0,
            saved: false,
            elapsed: Duration::ZERO,
        }
    }
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called per source or record within a phase.
    fn record_progress(&self, current: usize, total: usize, detail: &str);
    /// Called when the run completes.
    fn done(&self, summary: &RunSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn record_progress(&self, _current: usize, _total: usize, _detail: &str) {}
    fn done(&self, _summary: &RunSummary) {}
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// The collaborators of a run. Search and agent are optional.
pub struct Pipeline<'a, F, S, A> {
    config: &'a AppConfig,
    store: &'a CatalogStore,
    layout: &'a OutputLayout,
    fetcher: &'a F,
    search: Option<&'a S>,
    agent: Option<&'a A>,
}

impl<'a, F, S, A> Pipeline<'a, F, S, A>
where
    F: PageFetcher,
    S: SearchProvider,
    A: AgentRunner,
{
    pub fn new(
        config: &'a AppConfig,
        store: &'a CatalogStore,
        layout: &'a OutputLayout,
        fetcher: &'a F,
    ) -> Self {
        Self {
            config,
            store,
            layout,
            fetcher,
            search: None,
            agent: None,
        }
    }

    pub fn with_search(mut self, search: Option<&'a S>) -> Self {
        self.search = search;
        self
    }

    pub fn with_agent(mut self, agent: Option<&'a A>) -> Self {
        self.agent = agent;
        self
    }

    /// Run the configured stages once.
    #[instrument(skip_all, fields(catalog = %self.store.path().display(), dry_run = options.dry_run))]
    pub async fn run(&self, options: &RunOptions, progress: &dyn ProgressReporter) -> Result<RunSummary> {
        let start = Instant::now();
        let mut summary = RunSummary::new(RunId::new());
        let window = self.config.defaults.year_window(options.today);
        let ctx = DateContext::from_window(&window);
        let fallback = self.config.defaults.fallback_discipline.as_str();

        info!(
            run = %summary.run_id,
            default_year = window.default_year,
            plausible = ?window.plausible,
            "starting run"
        );

        progress.phase("Loading catalog");
        let mut catalog = self.store.load()?;
        let mut removed: Vec<ConferenceRecord> = Vec::new();

        // --- Scrape + merge ---
        if options.scrape {
            let candidates = self.scrape_all(options.dry_run, &mut summary, progress).await;
            summary.candidates = candidates.len();

            progress.phase("Merging");
            let engine = MergeEngine::new(
                Matcher::new(&self.config.matching),
                ctx.clone(),
                fallback,
                self.config.enrichment.max_location_len,
            );
            summary.merge = engine.merge_all(&candidates, &mut catalog);
        } else {
            ensure_unique_source_ids(&mut catalog);
        }

        // --- Junk sweep ---
        progress.phase("Removing non-conference entries");
        let sweep = JunkClassifier::new(&self.config.junk).sweep(&mut catalog);
        summary.junk_removed = sweep.removed.len();
        removed.extend(sweep.removed);
        catalog.renumber();

        // --- Enrichment ---
        let mut enrichment = None;
        if options.enrich {
            let enrich_options = EnrichOptions {
                deadlines_only: options.deadlines_only,
                include_past: options.include_past,
                today: options.today,
            };
            let mut report = Enricher::new(
                self.fetcher,
                &self.config.enrichment,
                ctx.clone(),
                summary.run_id.clone(),
                enrich_options,
            )
            .with_search(self.search)
            .with_agent(self.agent)
            .enrich(&mut catalog, progress)
            .await;

            summary.fields_filled = report.accepted();
            summary.suggestions_rejected = report.rejected();
            summary.needs_agent = report.needs_agent.len();
            summary.agent_removed = report.removed.len();
            summary.agent_aborted = report.agent_aborted;
            removed.append(&mut report.removed);
            enrichment = Some(report);
        }

        // --- Tiers ---
        if options.tiers {
            progress.phase("Assigning tiers");
            summary.tiers = Some(assign_tiers(&mut catalog, self.agent, TierOptions::default()).await);
        }

        ensure_disciplines(&mut catalog, fallback);
        summary.records = catalog.len();

        // --- Save ---
        if options.dry_run {
            info!(records = catalog.len(), "dry run, nothing written");
        } else {
            progress.phase("Saving");
            self.store.save(&mut catalog)?;
            summary.saved = true;

            if let Some(report) = &enrichment {
                if !options.deadlines_only {
                    aux("escalation queue", write_json(&self.layout.needs_agent_path(), &report.needs_agent));
                }
                if !report.suggestions.is_empty() {
                    aux("audit", append_json_array(&self.layout.audit_path(), &report.suggestions));
                }
                if let Some(reply) = &report.agent_reply {
                    aux("agent reply", write_text(&self.layout.agent_reply_path(), reply));
                }
            }
            if !removed.is_empty() {
                aux("removed records", append_json_array(&self.layout.removed_path(), &removed));
            }
        }

        summary.elapsed = start.elapsed();
        info!(
            run = %summary.run_id,
            records = summary.records,
            created = summary.merge.created,
            updated = summary.merge.updated,
            filled = summary.fields_filled,
            removed = removed.len(),
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "run complete"
        );
        progress.done(&summary);
        Ok(summary)
    }

    async fn scrape_all(
        &self,
        dry_run: bool,
        summary: &mut RunSummary,
        progress: &dyn ProgressReporter,
    ) -> Vec<CandidateRecord> {
        progress.phase("Scraping sources");
        let registry = AdapterRegistry::new();
        let sources = &self.config.sources;
        let mut candidates = Vec::new();

        for (i, source) in sources.iter().enumerate() {
            progress.record_progress(i + 1, sources.len(), &source.name);
            match scrape_source(self.fetcher, &registry, source).await {
                Ok(items) => {
                    summary.sources_ok += 1;
                    if !dry_run {
                        aux("raw scrape", write_json(&self.layout.raw_path(&source.name), &items));
                    }
                    candidates.extend(items);
                }
                Err(e) => {
                    summary.sources_failed += 1;
                    if e.is_recoverable() {
                        warn!(source = %source.name, error = %e, "source failed, skipping");
                    } else {
                        error!(source = %source.name, error = %e, "source failed unexpectedly, skipping");
                    }
                }
            }
            if i + 1 < sources.len() && self.config.enrichment.fetch_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.enrichment.fetch_delay_ms)).await;
            }
        }

        let before = candidates.len();
        let candidates = dedup_by_source_id(candidates);
        info!(scraped = before, unique = candidates.len(), "scrape complete");
        candidates
    }

    /// Tier assignment on its own: load, assign, save unless `dry_run`.
    #[instrument(skip_all, fields(all = options.all, dry_run))]
    pub async fn run_tiers(&self, options: TierOptions, dry_run: bool) -> Result<TierReport> {
        let mut catalog: Catalog = self.store.load()?;
        let report = assign_tiers(&mut catalog, self.agent, options).await;
        if dry_run {
            info!("dry run, tiers not saved");
        } else {
            self.store.save(&mut catalog)?;
        }
        Ok(report)
    }
}

/// Auxiliary outputs never fail the run.
fn aux(what: &str, result: Result<()>) {
    if let Err(e) = result {
        warn!(file = what, error = %e, "could not write auxiliary output");
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::PathBuf;

    use conftrack_fetcher::FetchedPage;
    use conftrack_shared::{
        ConfTrackError, DateOrder, EnrichmentSettings, SourceKind, SourceSpec, Suggestion,
    };
    use uuid::Uuid;

    use super::*;
    use crate::enrichment::{NoAgent, NoSearch};

    struct FakeFetcher(HashMap<String, String>);

    impl FakeFetcher {
        fn with(pages: &[(&str, &str)]) -> Self {
            Self(pages.iter().map(|(u, b)| (u.to_string(), b.to_string())).collect())
        }
    }

    impl PageFetcher for FakeFetcher {
        async fn fetch(&self, url: &str) -> Result<FetchedPage> {
            self.0
                .get(url)
                .map(|body| FetchedPage {
                    url: url.to_string(),
                    status: 200,
                    body: body.clone(),
                })
                .ok_or_else(|| ConfTrackError::Network(format!("404 {url}")))
        }
    }

    struct ProseAgent;

    impl AgentRunner for ProseAgent {
        async fn run(&self, _prompt: &str) -> Result<String> {
            Ok("I looked around but could not find anything reliable.".into())
        }
    }

    const FEED_URL: &str = "https://feeds.example.org/rss";

    const FEED: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>Finance calls</title>
<item>
  <title>Midwest Finance Association Annual Meeting 2027</title>
  <link>https://mfa.example.org/</link>
  <description>Submission deadline: September 15, 2026. Conference dates: March 4-6, 2027. Location: Chicago, IL</description>
</item>
<item>
  <title>Utah Winter Finance Conference 2027</title>
  <link>https://uwfc.example.edu/</link>
  <description>Submission deadline: October 31, 2026. Conference dates: February 25-27, 2027. Location: Snowbird, Utah</description>
</item>
</channel></rss>"#;

    struct Workspace {
        root: PathBuf,
        store: CatalogStore,
        layout: OutputLayout,
        config: AppConfig,
    }

    impl Workspace {
        fn new() -> Self {
            let root = std::env::temp_dir().join(format!("conftrack_pipeline_{}", Uuid::now_v7()));
            let mut config = AppConfig::default();
            config.sources = vec![SourceSpec {
                name: "feed".into(),
                url: FEED_URL.into(),
                kind: SourceKind::Rss,
                category: Some("Finance".into()),
                discipline: None,
                authoritative: false,
                date_order: DateOrder::MonthFirst,
            }];
            config.enrichment = EnrichmentSettings {
                fetch_delay_ms: 0,
                search_delay_ms: 0,
                ..Default::default()
            };
            Self {
                store: CatalogStore::new(root.join("conferences.json")),
                layout: OutputLayout::new(root.join("out")),
                root,
                config,
            }
        }

        fn seed(&self, records: Vec<ConferenceRecord>) {
            self.store.save(&mut Catalog::new(records)).unwrap();
        }

        fn saved(&self) -> Catalog {
            self.store.load().unwrap()
        }
    }

    impl Drop for Workspace {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.root);
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 1).unwrap()
    }

    fn options() -> RunOptions {
        RunOptions::new(today())
    }

    #[tokio::test]
    async fn rerun_on_own_output_changes_nothing() {
        let ws = Workspace::new();
        let fetcher = FakeFetcher::with(&[(FEED_URL, FEED)]);
        let pipeline: Pipeline<'_, _, NoSearch, NoAgent> =
            Pipeline::new(&ws.config, &ws.store, &ws.layout, &fetcher);

        let first = pipeline.run(&options(), &SilentProgress).await.unwrap();
        assert_eq!(first.merge.created, 2);
        let after_first = std::fs::read_to_string(ws.store.path()).unwrap();

        let mfa = ws.saved().iter().find(|r| r.name.starts_with("Midwest")).cloned().unwrap();
        assert_eq!(mfa.start_date, "2027-03-04");
        assert_eq!(mfa.deadline, "2026-09-15");
        assert_eq!(mfa.location, "Chicago, IL");
        assert!(mfa.discipline.contains("fin"));

        let second = pipeline.run(&options(), &SilentProgress).await.unwrap();
        assert_eq!(second.merge.created, 0);
        assert_eq!(second.merge.updated, 0);
        assert_eq!(second.merge.unchanged, 2);
        assert_eq!(second.fields_filled, 0);
        assert_eq!(std::fs::read_to_string(ws.store.path()).unwrap(), after_first);
        assert!(ws.layout.raw_path("feed").exists());
    }

    #[tokio::test]
    async fn local_enrichment_end_to_end() {
        let ws = Workspace::new();
        ws.seed(vec![ConferenceRecord {
            id: 1,
            name: "AAA ATA Midyear Meeting 2026".into(),
            url: "https://example.org/x".into(),
            location: "TBD".into(),
            ..Default::default()
        }]);
        let fetcher = FakeFetcher::with(&[(
            "https://example.org/x",
            "<html><body><h1>AAA ATA Midyear Meeting 2026</h1>\
             <p>Submission Deadline: February 1, 2026</p>\
             <p>The meeting will be held February 19-21, 2026.</p></body></html>",
        )]);
        let mut opts = options();
        opts.scrape = false;
        opts.today = NaiveDate::from_ymd_opt(2025, 10, 1).unwrap();

        let pipeline: Pipeline<'_, _, NoSearch, NoAgent> =
            Pipeline::new(&ws.config, &ws.store, &ws.layout, &fetcher);
        let summary = pipeline.run(&opts, &SilentProgress).await.unwrap();

        let r = ws.saved().records()[0].clone();
        assert_eq!(r.deadline, "2026-02-01");
        assert_eq!(r.start_date, "2026-02-19");
        assert!(r.dates.contains("February 19-21, 2026"));
        assert_eq!(r.location, "TBD");
        assert_eq!(summary.fields_filled, 2);

        let audit: Vec<Suggestion> =
            serde_json::from_str(&std::fs::read_to_string(ws.layout.audit_path()).unwrap()).unwrap();
        assert_eq!(audit.len(), 2);
        assert!(audit.iter().all(|s| s.accepted && s.run_id == summary.run_id));
    }

    #[tokio::test]
    async fn junk_and_duplicate_ids_are_cleaned() {
        let ws = Workspace::new();
        let rec = |name: &str, sid: &str, start: &str, dates: &str| ConferenceRecord {
            name: name.into(),
            source_id: sid.into(),
            start_date: start.into(),
            dates: dates.into(),
            ..Default::default()
        };
        ws.seed(vec![
            rec("Finance Workshop Alpha", "abc", "2027-05-03", "May 3-4, 2027"),
            rec("Banking Symposium Beta", "abc", "2027-06-10", "June 10, 2027"),
            rec("Call for Proposals: Market Design Grants", "", "", ""),
        ]);
        let fetcher = FakeFetcher::with(&[]);
        let mut opts = options();
        opts.scrape = false;
        opts.enrich = false;

        let pipeline: Pipeline<'_, _, NoSearch, NoAgent> =
            Pipeline::new(&ws.config, &ws.store, &ws.layout, &fetcher);
        let summary = pipeline.run(&opts, &SilentProgress).await.unwrap();

        let saved = ws.saved();
        assert_eq!(saved.len(), 2);
        assert_ne!(saved.records()[0].source_id, saved.records()[1].source_id);
        assert_eq!(summary.junk_removed, 1);
        let removed: Vec<ConferenceRecord> =
            serde_json::from_str(&std::fs::read_to_string(ws.layout.removed_path()).unwrap()).unwrap();
        assert_eq!(removed[0].name, "Call for Proposals: Market Design Grants");
    }

    #[tokio::test]
    async fn unparsable_agent_reply_is_kept_for_inspection() {
        let ws = Workspace::new();
        ws.seed(vec![ConferenceRecord {
            id: 1,
            name: "Finance Workshop Alpha".into(),
            ..Default::default()
        }]);
        let fetcher = FakeFetcher::with(&[]);
        let mut opts = options();
        opts.scrape = false;

        let pipeline: Pipeline<'_, _, NoSearch, _> =
            Pipeline::new(&ws.config, &ws.store, &ws.layout, &fetcher).with_agent(Some(&ProseAgent));
        let summary = pipeline.run(&opts, &SilentProgress).await.unwrap();

        assert!(summary.agent_aborted);
        assert_eq!(summary.needs_agent, 1);
        assert_eq!(ws.saved().records()[0].start_date, "");
        let reply = std::fs::read_to_string(ws.layout.agent_reply_path()).unwrap();
        assert!(reply.contains("could not find"));
        let queue: Vec<ConferenceRecord> =
            serde_json::from_str(&std::fs::read_to_string(ws.layout.needs_agent_path()).unwrap()).unwrap();
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn dry_run_writes_nothing_and_failed_sources_are_skipped() {
        let ws = Workspace::new();
        let fetcher = FakeFetcher::with(&[]);
        let pipeline: Pipeline<'_, _, NoSearch, NoAgent> =
            Pipeline::new(&ws.config, &ws.store, &ws.layout, &fetcher);
        let mut opts = options();
        opts.dry_run = true;

        let summary = pipeline.run(&opts, &SilentProgress).await.unwrap();
        assert_eq!(summary.sources_failed, 1);
        assert!(!summary.saved);
        assert!(!ws.store.path().exists());
        assert!(!ws.layout.root().exists());
    }

    #[tokio::test]
    async fn corrupt_catalog_is_fatal() {
        let ws = Workspace::new();
        std::fs::create_dir_all(&ws.root).unwrap();
        std::fs::write(ws.store.path(), "{ not json").unwrap();
        let fetcher = FakeFetcher::with(&[]);
        let pipeline: Pipeline<'_, _, NoSearch, NoAgent> =
            Pipeline::new(&ws.config, &ws.store, &ws.layout, &fetcher);

        assert!(pipeline.run(&options(), &SilentProgress).await.is_err());
    }

    #[tokio::test]
    async fn tiers_command_respects_dry_run() {
        let ws = Workspace::new();
        ws.seed(vec![ConferenceRecord {
            id: 1,
            name: "European Finance Association Annual Meeting".into(),
            ..Default::default()
        }]);
        let fetcher = FakeFetcher::with(&[]);
        let pipeline: Pipeline<'_, _, NoSearch, NoAgent> =
            Pipeline::new(&ws.config, &ws.store, &ws.layout, &fetcher);

        let report = pipeline.run_tiers(TierOptions::default(), true).await.unwrap();
        assert_eq!(report.from_reference, 1);
        assert_eq!(ws.saved().records()[0].tier, "");

        pipeline.run_tiers(TierOptions::default(), false).await.unwrap();
        assert_eq!(ws.saved().records()[0].tier, "2");
    }
}
