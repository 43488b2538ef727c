//! Enrichment orchestrator.
//!
//! Records still missing a deadline, a trustworthy start date or a location
//! climb three passes, each costlier than the last:
//!
//! 1. **Local**: fetch the record's own page (venue sub-pages first) and run
//!    the field extractors.
//! 2. **Search**: query the search provider, relevance-gate each hit, fetch
//!    and mine the pages that pass.
//! 3. **Agent**: records still without a start date go to the AI agent in
//!    one batch; only a strict JSON array reply is acted on.
//!
//! Every value, whatever its pass, goes through the same cross-field and
//! sanity checks before it is written, and every suggestion (kept or not)
//! lands in the report for the audit file.

mod relevance;
mod verdict;

pub use relevance::{RelevanceGate, distinctive_tokens};
pub use verdict::{AgentVerdict, build_prompt, parse_verdicts};

use std::collections::BTreeSet;
use std::sync::LazyLock;
use std::time::Duration;

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use tracing::{debug, info, instrument, warn};
use url::Url;

use conftrack_extract::{
    DateContext, Extracted, NormalizedDate, extract_fields, is_vague_start, normalize_date, page_text,
};
use conftrack_fetcher::PageFetcher;
use conftrack_search::{SearchProvider, SearchResults};
use conftrack_shared::{
    Catalog, ConfTrackError, ConferenceRecord, EnrichmentSettings, Field, Pass, Result, RunId,
    SearchHit, Suggestion, is_unknown,
};

use crate::agent::AgentRunner;
use crate::pipeline::ProgressReporter;
use crate::taxonomy::detect_country;
use crate::validate::{Rejection, check_deadline, check_location, check_start, parse_iso};

// ---------------------------------------------------------------------------
// Options and report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct EnrichOptions {
    /// Only look for missing deadlines.
    pub deadlines_only: bool,
    /// Also enrich events that already took place.
    pub include_past: bool,
    pub today: NaiveDate,
}

impl EnrichOptions {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            deadlines_only: false,
            include_past: false,
            today,
        }
    }
}

#[derive(Debug, Default)]
pub struct EnrichmentReport {
    /// Records that entered at least one pass.
    pub examined: usize,
    /// Every suggested value, accepted or rejected.
    pub suggestions: Vec<Suggestion>,
    /// Records still missing a start date after passes 1 and 2.
    pub needs_agent: Vec<ConferenceRecord>,
    /// Records the agent said are not conferences.
    pub removed: Vec<ConferenceRecord>,
    /// Raw agent reply when it could not be parsed.
    pub agent_reply: Option<String>,
    pub agent_aborted: bool,
}

impl EnrichmentReport {
    pub fn accepted(&self) -> usize {
        self.suggestions.iter().filter(|s| s.accepted).count()
    }

    pub fn rejected(&self) -> usize {
        self.suggestions.len() - self.accepted()
    }

    /// Distinct records that received at least one value.
    pub fn updated_records(&self) -> usize {
        self.suggestions
            .iter()
            .filter(|s| s.accepted)
            .map(|s| s.record_id)
            .collect::<BTreeSet<_>>()
            .len()
    }
}

// ---------------------------------------------------------------------------
// Collaborator stand-ins
// ---------------------------------------------------------------------------

/// Search provider for runs without one.
pub struct NoSearch;

impl SearchProvider for NoSearch {
    async fn search(&self, _query: &str, _limit: usize) -> Result<SearchResults> {
        Ok(SearchResults {
            hits: Vec::new(),
            cached: false,
        })
    }
}

/// Agent for runs without one.
pub struct NoAgent;

impl AgentRunner for NoAgent {
    async fn run(&self, _prompt: &str) -> Result<String> {
        Err(ConfTrackError::Agent("no agent configured".into()))
    }
}

// ---------------------------------------------------------------------------
// Enricher
// ---------------------------------------------------------------------------

struct Target {
    url: String,
    /// Must pass the relevance gate before its text is mined.
    gated: bool,
}

pub struct Enricher<'a, F, S, A> {
    fetcher: &'a F,
    search: Option<&'a S>,
    agent: Option<&'a A>,
    settings: &'a EnrichmentSettings,
    ctx: DateContext,
    run_id: RunId,
    options: EnrichOptions,
}

impl<'a, F, S, A> Enricher<'a, F, S, A>
where
    F: PageFetcher,
    S: SearchProvider,
    A: AgentRunner,
{
    pub fn new(
        fetcher: &'a F,
        settings: &'a EnrichmentSettings,
        ctx: DateContext,
        run_id: RunId,
        options: EnrichOptions,
    ) -> Self {
        Self {
            fetcher,
            search: None,
            agent: None,
            settings,
            ctx,
            run_id,
            options,
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

    /// Run all available passes over the catalog.
    #[instrument(skip_all, fields(records = catalog.len(), run = %self.run_id))]
    pub async fn enrich(
        &self,
        catalog: &mut Catalog,
        progress: &dyn ProgressReporter,
    ) -> EnrichmentReport {
        let mut report = EnrichmentReport::default();

        let in_scope: Vec<usize> = catalog
            .iter()
            .enumerate()
            .filter(|(_, r)| self.in_scope(r))
            .map(|(i, _)| i)
            .collect();

        // Pass 1
        progress.phase("Enrich: local pages");
        let pending: Vec<usize> = in_scope
            .iter()
            .copied()
            .filter(|&i| catalog.get(i).is_some_and(|r| !self.missing(r).is_empty()))
            .collect();
        report.examined = pending.len();
        for (n, &i) in pending.iter().enumerate() {
            let Some(record) = catalog.get_mut(i) else { continue };
            progress.record_progress(n + 1, pending.len(), &record.name);
            self.local_pass(record, &mut report).await;
        }

        // Pass 2
        if let Some(search) = self.search {
            progress.phase("Enrich: search");
            let pending: Vec<usize> = in_scope
                .iter()
                .copied()
                .filter(|&i| catalog.get(i).is_some_and(|r| self.wants_search(r)))
                .collect();
            for (n, &i) in pending.iter().enumerate() {
                let Some(record) = catalog.get_mut(i) else { continue };
                progress.record_progress(n + 1, pending.len(), &record.name);
                self.search_pass(search, record, &mut report).await;
            }
        }

        // Escalation queue
        if !self.options.deadlines_only {
            report.needs_agent = in_scope
                .iter()
                .filter_map(|&i| catalog.get(i))
                .filter(|r| start_missing(r))
                .cloned()
                .collect();
        }

        // Pass 3
        if let Some(agent) = self.agent {
            if !report.needs_agent.is_empty() {
                progress.phase("Enrich: agent");
                let batch: Vec<u64> = report
                    .needs_agent
                    .iter()
                    .take(self.settings.agent_batch_limit)
                    .map(|r| r.id)
                    .collect();
                self.agent_pass(agent, catalog, &batch, &mut report).await;
            }
        }

        info!(
            examined = report.examined,
            accepted = report.accepted(),
            rejected = report.rejected(),
            needs_agent = report.needs_agent.len(),
            removed = report.removed.len(),
            "enrichment complete"
        );
        report
    }

    // -----------------------------------------------------------------------
    // Scope
    // -----------------------------------------------------------------------

    /// Fields this run should still try to find.
    fn missing(&self, record: &ConferenceRecord) -> Vec<Field> {
        let mut fields = Vec::new();
        if record.is_unknown(Field::Deadline) {
            fields.push(Field::Deadline);
        }
        if !self.options.deadlines_only {
            if start_missing(record) {
                fields.push(Field::StartDate);
            }
            if record.is_unknown(Field::Location) {
                fields.push(Field::Location);
            }
        }
        fields
    }

    fn in_scope(&self, record: &ConferenceRecord) -> bool {
        self.options.include_past || known_start(record).is_none_or(|s| s >= self.options.today)
    }

    fn wants_search(&self, record: &ConferenceRecord) -> bool {
        !self.missing(record).is_empty() || record.is_unknown(Field::Url)
    }

    /// Parsed http(s) link whose host does not block direct fetching.
    fn usable(&self, raw: &str) -> Option<Url> {
        let url = Url::parse(raw.trim()).ok()?;
        if !matches!(url.scheme(), "http" | "https") {
            return None;
        }
        let host = url.host_str()?;
        let blocked = self
            .settings
            .blocked_hosts
            .iter()
            .any(|b| host_matches(host, b));
        (!blocked).then_some(url)
    }

    // -----------------------------------------------------------------------
    // Pass 1: local extraction
    // -----------------------------------------------------------------------

    fn local_targets(&self, record: &ConferenceRecord) -> Vec<Target> {
        let mut targets = Vec::new();

        if let Some(url) = self.usable(&record.url) {
            if let Some(host) = url.host_str() {
                for rule in self.settings.subpages.iter().filter(|r| host_matches(host, &r.host)) {
                    for path in &rule.paths {
                        if let Ok(sub) = url.join(&format!("/{}", path.trim_start_matches('/'))) {
                            targets.push(Target {
                                url: sub.to_string(),
                                gated: true,
                            });
                        }
                    }
                }
            }
            targets.push(Target {
                url: record.url.trim().to_string(),
                gated: false,
            });
        } else if self.usable(&record.external_link).is_some() {
            targets.push(Target {
                url: record.external_link.trim().to_string(),
                gated: false,
            });
        }
        targets
    }

    #[instrument(skip_all, fields(id = record.id))]
    async fn local_pass(&self, record: &mut ConferenceRecord, report: &mut EnrichmentReport) {
        let gate = RelevanceGate::for_name(&record.name);

        for target in self.local_targets(record) {
            if self.missing(record).is_empty() {
                break;
            }
            let Some(text) = self.fetch_text(&target.url).await else {
                continue;
            };
            if target.gated && !gate.matches(&text) {
                debug!(url = %target.url, "sub-page is not about this record");
                continue;
            }
            let found = extract_fields(&text, &self.ctx);
            if !found.is_empty() {
                self.apply(record, &found, &target.url, Pass::Local, report);
            }
        }
    }

    async fn fetch_text(&self, url: &str) -> Option<String> {
        let fetched = self.fetcher.fetch(url).await;
        pause(self.settings.fetch_delay_ms).await;

        let page = match fetched {
            Ok(page) => page,
            Err(e) => {
                debug!(url, error = %e, "fetch failed, no data");
                return None;
            }
        };
        match page_text(&page.body) {
            Ok(text) => Some(text),
            Err(e) => {
                warn!(url, error = %e, "could not read page");
                None
            }
        }
    }

    // -----------------------------------------------------------------------
    // Pass 2: search
    // -----------------------------------------------------------------------

    fn query_for(&self, record: &ConferenceRecord) -> String {
        static YEAR_RE: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r"\b(?:19|20)\d{2}\b").expect("valid regex"));

        let base = YEAR_RE.replace_all(&record.name, " ");
        let base = base.split_whitespace().collect::<Vec<_>>().join(" ");
        let year = known_start(record).map_or(self.ctx.default_year, |d| d.year());
        let topic = if record.is_unknown(Field::Deadline) {
            "submission deadline"
        } else {
            "conference dates"
        };
        format!("{base} {year} {topic}")
    }

    #[instrument(skip_all, fields(id = record.id))]
    async fn search_pass(&self, search: &S, record: &mut ConferenceRecord, report: &mut EnrichmentReport) {
        let query = self.query_for(record);
        let results = match search.search(&query, self.settings.max_search_results).await {
            Ok(results) => results,
            Err(e) => {
                warn!(query = %query, error = %e, "search failed, no data");
                pause(self.settings.search_delay_ms).await;
                return;
            }
        };
        if !results.cached {
            pause(self.settings.search_delay_ms).await;
        }
        debug!(query = %query, hits = results.hits.len(), cached = results.cached, "search returned");

        let gate = RelevanceGate::for_name(&record.name);
        for hit in results.hits.iter().take(self.settings.max_search_results) {
            if !self.wants_search(record) {
                break;
            }
            self.mine_hit(hit, &gate, record, report).await;
        }
    }

    async fn mine_hit(
        &self,
        hit: &SearchHit,
        gate: &RelevanceGate,
        record: &mut ConferenceRecord,
        report: &mut EnrichmentReport,
    ) {
        let summary = format!("{} {} {}", hit.title, hit.snippet, hit.url);
        if !gate.matches(&summary) {
            debug!(url = %hit.url, "search hit failed relevance gate");
            return;
        }
        if self.usable(&hit.url).is_none() {
            debug!(url = %hit.url, "search hit not fetchable");
            return;
        }
        let Some(text) = self.fetch_text(&hit.url).await else {
            return;
        };
        if !gate.matches(&text) {
            debug!(url = %hit.url, "page failed secondary relevance check, discarding");
            return;
        }

        let found = extract_fields(&text, &self.ctx);
        if !found.is_empty() {
            self.apply(record, &found, &hit.url, Pass::Search, report);
        }
        if record.is_unknown(Field::Url) {
            record.set_with_provenance(Field::Url, hit.url.clone(), &hit.url, Pass::Search);
            self.note(report, record, Field::Url, &hit.url, &hit.url, Pass::Search, None);
        }
    }

    // -----------------------------------------------------------------------
    // Pass 3: agent
    // -----------------------------------------------------------------------

    #[instrument(skip_all, fields(batch = batch.len()))]
    async fn agent_pass(
        &self,
        agent: &A,
        catalog: &mut Catalog,
        batch: &[u64],
        report: &mut EnrichmentReport,
    ) {
        let prompt = {
            let records: Vec<&ConferenceRecord> = catalog
                .iter()
                .filter(|r| batch.contains(&r.id))
                .collect();
            build_prompt(&records)
        };

        let reply = match agent.run(&prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "agent pass skipped");
                report.agent_aborted = true;
                return;
            }
        };
        let verdicts = match parse_verdicts(&reply) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "agent reply unparsable, catalog left unchanged");
                report.agent_reply = Some(reply);
                report.agent_aborted = true;
                return;
            }
        };

        for verdict in verdicts {
            let id = verdict.id();
            if !batch.contains(&id) {
                warn!(id, "agent answered for a record it was not asked about");
                continue;
            }
            match verdict {
                AgentVerdict::Fix {
                    start_date,
                    dates,
                    deadline,
                    location,
                    url,
                    source,
                    ..
                } => {
                    let Some(record) = catalog.find_by_id_mut(id) else { continue };
                    let source = source
                        .filter(|s| !s.trim().is_empty())
                        .unwrap_or_else(|| "agent".to_string());
                    let found = Extracted {
                        deadline: deadline.as_deref().and_then(|d| self.agent_date(d)),
                        conference: self.agent_conference(start_date.as_deref(), dates.as_deref()),
                        location: location.filter(|l| !is_unknown(l)),
                    };
                    self.apply(record, &found, &source, Pass::Agent, report);

                    if let Some(url) = url.filter(|u| self.usable(u).is_some()) {
                        if record.is_unknown(Field::Url) {
                            record.set_with_provenance(Field::Url, url.clone(), &source, Pass::Agent);
                            self.note(report, record, Field::Url, &url, &source, Pass::Agent, None);
                        }
                    }
                }
                AgentVerdict::NotConference { reason, .. } => {
                    if let Some(removed) = catalog.remove_by_id(id) {
                        info!(id, name = %removed.name, reason = reason.as_deref().unwrap_or(""), "agent: not a conference, removed");
                        report.removed.push(removed);
                    }
                }
                AgentVerdict::Unknown { .. } => debug!(id, "agent could not resolve"),
            }
        }
    }

    /// ISO or free-text date from the agent, inside the plausible window.
    fn agent_date(&self, value: &str) -> Option<NaiveDate> {
        parse_iso(value)
            .filter(|d| self.ctx.plausible.contains(&d.year()))
            .or_else(|| normalize_date(value, &self.ctx).map(|n| n.start))
    }

    fn agent_conference(&self, start: Option<&str>, dates: Option<&str>) -> Option<NormalizedDate> {
        let dates = dates.map(str::trim).filter(|d| !d.is_empty());
        match start.and_then(|s| self.agent_date(s)) {
            Some(start) => Some(NormalizedDate {
                start,
                dates: dates.map_or_else(|| start.format("%B %-d, %Y").to_string(), String::from),
                ambiguous: false,
            }),
            None => dates.and_then(|d| normalize_date(d, &self.ctx)),
        }
    }

    // -----------------------------------------------------------------------
    // Validation and application
    // -----------------------------------------------------------------------

    /// Write every found value that fills a gap and passes validation.
    fn apply(
        &self,
        record: &mut ConferenceRecord,
        found: &Extracted,
        source: &str,
        pass: Pass,
        report: &mut EnrichmentReport,
    ) {
        if let Some(conf) = &found.conference {
            if !self.options.deadlines_only && start_missing(record) {
                let verdict = check_start(conf.start, parse_iso(&record.deadline));
                if verdict.is_ok() {
                    record.set_with_provenance(Field::StartDate, conf.iso(), source, pass);
                    record.set_with_provenance(Field::Dates, conf.dates.clone(), source, pass);
                }
                self.note(report, record, Field::StartDate, &conf.iso(), source, pass, verdict.err());
            }
        }

        if let Some(deadline) = found.deadline {
            if record.is_unknown(Field::Deadline) {
                let value = deadline.format("%Y-%m-%d").to_string();
                let verdict = check_deadline(deadline, known_start(record));
                if verdict.is_ok() {
                    record.set_with_provenance(Field::Deadline, value.clone(), source, pass);
                }
                self.note(report, record, Field::Deadline, &value, source, pass, verdict.err());
            }
        }

        if let Some(location) = &found.location {
            if !self.options.deadlines_only && record.is_unknown(Field::Location) {
                match check_location(location, self.settings.max_location_len) {
                    Ok(clean) => {
                        record.set_with_provenance(Field::Location, clean.clone(), source, pass);
                        self.note(report, record, Field::Location, &clean, source, pass, None);
                        let country = detect_country(&clean);
                        if country != "Unknown" && record.is_unknown(Field::Country) {
                            record.set_with_provenance(Field::Country, country.clone(), source, pass);
                            self.note(report, record, Field::Country, &country, source, pass, None);
                        }
                    }
                    Err(rejection) => {
                        self.note(report, record, Field::Location, location, source, pass, Some(rejection));
                    }
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn note(
        &self,
        report: &mut EnrichmentReport,
        record: &ConferenceRecord,
        field: Field,
        value: &str,
        source: &str,
        pass: Pass,
        rejection: Option<Rejection>,
    ) {
        match &rejection {
            None => info!(id = record.id, %field, value, %pass, source, "field updated"),
            Some(why) => warn!(id = record.id, %field, value, %pass, source, reason = %why, "suggestion rejected"),
        }
        report.suggestions.push(Suggestion {
            run_id: self.run_id.clone(),
            record_id: record.id,
            name: record.name.clone(),
            field,
            value: value.to_string(),
            source: source.to_string(),
            pass,
            accepted: rejection.is_none(),
            reason: rejection.map(|r| r.to_string()),
        });
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Empty, placeholder, unparsable or month-only start date.
fn start_missing(record: &ConferenceRecord) -> bool {
    known_start(record).is_none()
}

fn known_start(record: &ConferenceRecord) -> Option<NaiveDate> {
    if record.is_unknown(Field::StartDate) || is_vague_start(&record.start_date, &record.dates) {
        return None;
    }
    parse_iso(&record.start_date)
}

fn host_matches(host: &str, rule: &str) -> bool {
    let host = host.trim_start_matches("www.");
    let rule = rule.trim_start_matches("www.");
    host.eq_ignore_ascii_case(rule) || host.ends_with(&format!(".{rule}"))
}

async fn pause(ms: u64) {
    if ms > 0 {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}
