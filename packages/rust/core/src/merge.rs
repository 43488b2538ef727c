//! Merge policy: fill blanks on a matched record, or create a new one.
//!
//! Populated values are never overwritten by a later source; only empty
//! fields and sentinels (`TBD`, `Unknown`, a bare `USA` location/country)
//! are filled. A 1st-of-month start date that looks like a month-only guess
//! also counts as a blank.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use conftrack_extract::{
    DateContext, NormalizedDate, extract_conference_dates, extract_deadline, extract_location,
    is_vague_start, normalize_date, normalize_name,
};
use conftrack_shared::{
    CandidateRecord, Catalog, ConferenceRecord, Field, Pass, TBD, is_unknown,
};

use crate::matcher::{MatchKey, Matcher, strip_url};
use crate::taxonomy::{detect_country, detect_disciplines};
use crate::validate::{check_deadline, check_location, check_start, parse_iso};

/// Hex digits kept from the name+link hash.
const DERIVED_SID_LEN: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeAction {
    Updated,
    Created,
}

/// Result of reconciling one candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub action: MergeAction,
    pub id: u64,
    /// Fields written on an existing record (empty for creations).
    pub changed: Vec<Field>,
    pub score: Option<f64>,
}

/// Totals over one batch of candidates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub created: usize,
    /// Matched records that gained at least one field.
    pub updated: usize,
    pub unchanged: usize,
    pub skipped: usize,
}

/// Candidate fields after normalization and extraction from its description.
#[derive(Debug, Default)]
struct Resolved {
    conference: Option<NormalizedDate>,
    dates: String,
    location: String,
    country: String,
    deadline: Option<NaiveDate>,
}

pub struct MergeEngine {
    matcher: Matcher,
    ctx: DateContext,
    fallback_discipline: String,
    max_location_len: usize,
}

impl MergeEngine {
    pub fn new(
        matcher: Matcher,
        ctx: DateContext,
        fallback_discipline: impl Into<String>,
        max_location_len: usize,
    ) -> Self {
        Self {
            matcher,
            ctx,
            fallback_discipline: fallback_discipline.into(),
            max_location_len,
        }
    }

    /// Reconcile every candidate, then restore source-id uniqueness.
    pub fn merge_all(&self, candidates: &[CandidateRecord], catalog: &mut Catalog) -> MergeSummary {
        let mut summary = MergeSummary::default();
        for candidate in candidates {
            let Some(outcome) = self.merge_or_create(candidate, catalog) else {
                summary.skipped += 1;
                continue;
            };
            match outcome.action {
                MergeAction::Created => summary.created += 1,
                MergeAction::Updated if outcome.changed.is_empty() => summary.unchanged += 1,
                MergeAction::Updated => summary.updated += 1,
            }
        }
        let fixed = ensure_unique_source_ids(catalog);
        info!(
            created = summary.created,
            updated = summary.updated,
            unchanged = summary.unchanged,
            skipped = summary.skipped,
            sid_fixes = fixed,
            "merge complete"
        );
        summary
    }

    /// Fill a matched record's blanks or append a new record. Nameless
    /// candidates are ignored.
    pub fn merge_or_create(
        &self,
        candidate: &CandidateRecord,
        catalog: &mut Catalog,
    ) -> Option<MergeOutcome> {
        if candidate.name.trim().is_empty() {
            debug!(source = %candidate.source_tag, "candidate without a name, skipping");
            return None;
        }

        let resolved = self.resolve(candidate);
        let key = MatchKey::from_candidate(candidate, &self.ctx);

        if let Some(hit) = self.matcher.find_match(&key, catalog) {
            let record = catalog.get_mut(hit.index)?;
            let changed = self.fill(record, candidate, &resolved);
            if !changed.is_empty() {
                info!(
                    id = record.id,
                    name = %record.name,
                    fields = ?changed.iter().map(Field::as_str).collect::<Vec<_>>(),
                    "filled fields from {}", candidate.source_tag
                );
            }
            return Some(MergeOutcome {
                action: MergeAction::Updated,
                id: record.id,
                changed,
                score: Some(hit.score),
            });
        }

        let record = self.create(candidate, resolved, catalog);
        let id = record.id;
        info!(id, name = %record.name, sid = %record.source_id, "new conference");
        catalog.push(record);
        Some(MergeOutcome {
            action: MergeAction::Created,
            id,
            changed: Vec::new(),
            score: None,
        })
    }

    fn resolve(&self, c: &CandidateRecord) -> Resolved {
        let ctx = self.ctx.with_order(c.date_order);

        let conference = normalize_date(&c.dates, &ctx)
            .or_else(|| extract_conference_dates(&c.description, &ctx));
        if let Some(conf) = conference.as_ref().filter(|d| d.ambiguous) {
            warn!(name = %c.name, dates = %conf.dates, "numeric date reads both ways, using source convention");
        }
        let dates = if is_unknown(&c.dates) {
            conference.as_ref().map(|d| d.dates.clone()).unwrap_or_default()
        } else {
            c.dates.trim().to_string()
        };

        let raw_location = if is_unknown(&c.location) {
            extract_location(&c.description).unwrap_or_default()
        } else {
            c.location.clone()
        };
        let location = if raw_location.trim().is_empty() {
            String::new()
        } else {
            match check_location(&raw_location, self.max_location_len) {
                Ok(loc) => loc,
                Err(reason) => {
                    debug!(name = %c.name, %reason, "discarding candidate location");
                    String::new()
                }
            }
        };
        let country = if location.is_empty() {
            String::new()
        } else {
            Some(detect_country(&location))
                .filter(|country| country != "Unknown")
                .unwrap_or_default()
        };

        let start = conference.as_ref().map(|d| d.start);
        let deadline = normalize_date(&c.deadline, &ctx)
            .map(|d| d.start)
            .or_else(|| extract_deadline(&c.description, &ctx))
            .filter(|d| match check_deadline(*d, start) {
                Ok(()) => true,
                Err(reason) => {
                    debug!(name = %c.name, %reason, "discarding candidate deadline");
                    false
                }
            });

        Resolved {
            conference,
            dates,
            location,
            country,
            deadline,
        }
    }

    fn fill(
        &self,
        record: &mut ConferenceRecord,
        c: &CandidateRecord,
        resolved: &Resolved,
    ) -> Vec<Field> {
        let source = provenance_source(c);
        let mut changed = Vec::new();

        let mut set = |record: &mut ConferenceRecord, field: Field, value: &str| {
            let value = value.trim();
            if is_unknown(value) || record.get(field) == value {
                return;
            }
            record.set_with_provenance(field, value.to_string(), &source, Pass::Merge);
            changed.push(field);
        };

        let mut start_written = false;
        for field in Field::MERGEABLE {
            match field {
                // A vague start ("May 2026") may be replaced by an exact one.
                Field::StartDate => {
                    let fillable = record.is_unknown(field)
                        || is_vague_start(&record.start_date, &record.dates);
                    let Some(conf) = resolved.conference.as_ref().filter(|_| fillable) else {
                        continue;
                    };
                    match check_start(conf.start, parse_iso(&record.deadline)) {
                        Ok(()) => {
                            let before = record.start_date.clone();
                            set(record, field, &conf.iso());
                            start_written = record.start_date != before;
                        }
                        Err(reason) => debug!(id = record.id, %reason, "candidate start rejected"),
                    }
                }
                // Display text travels with a newly written start.
                Field::Dates if start_written || record.is_unknown(field) => {
                    set(record, field, &resolved.dates);
                }
                Field::Deadline if record.is_unknown(field) => {
                    let Some(deadline) = resolved.deadline else { continue };
                    match check_deadline(deadline, parse_iso(&record.start_date)) {
                        Ok(()) => set(record, field, &deadline.format("%Y-%m-%d").to_string()),
                        Err(reason) => debug!(id = record.id, %reason, "candidate deadline rejected"),
                    }
                }
                Field::Location if record.is_unknown(field) => set(record, field, &resolved.location),
                Field::Country if record.is_unknown(field) => set(record, field, &resolved.country),
                Field::Url if record.is_unknown(field) => set(record, field, &c.url),
                Field::ExternalLink if record.is_unknown(field) => {
                    set(record, field, &c.external_link);
                }
                _ => {}
            }
        }

        match c.implied_discipline.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            Some(tag) if !record.discipline.contains(tag) => {
                info!(id = record.id, from = ?record.discipline, to = tag, "correcting discipline");
                record.discipline = [tag.to_string()].into();
            }
            Some(_) => {}
            None if record.discipline.is_empty() => {
                record.discipline =
                    detect_disciplines(&c.categories, &record.name, &self.fallback_discipline);
            }
            None => {}
        }

        changed
    }

    fn create(
        &self,
        c: &CandidateRecord,
        resolved: Resolved,
        catalog: &Catalog,
    ) -> ConferenceRecord {
        let discipline = match c.implied_discipline.as_deref().map(str::trim) {
            Some(tag) if !tag.is_empty() => [tag.to_string()].into(),
            _ => detect_disciplines(&c.categories, &c.name, &self.fallback_discipline),
        };

        ConferenceRecord {
            id: catalog.next_id(),
            name: c.name.trim().to_string(),
            dates: resolved.dates,
            start_date: resolved.conference.map(|d| d.iso()).unwrap_or_default(),
            location: resolved.location,
            country: resolved.country,
            discipline,
            source_id: assign_source_id(c, catalog),
            external_link: c.external_link.trim().to_string(),
            deadline: resolved
                .deadline
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| TBD.to_string()),
            url: c.url.trim().to_string(),
            tier: String::new(),
            provenance: Vec::new(),
        }
    }
}

fn provenance_source(c: &CandidateRecord) -> String {
    [&c.url, &c.external_link, &c.source_tag]
        .into_iter()
        .find(|s| !s.trim().is_empty())
        .cloned()
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Source identities
// ---------------------------------------------------------------------------

/// Stable identity from the normalized name and the stripped link.
pub fn derive_source_id(name: &str, link: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_name(name));
    hasher.update("|");
    hasher.update(strip_url(link));
    let hex = format!("{:x}", hasher.finalize());
    hex[..DERIVED_SID_LEN].to_string()
}

/// The candidate's own id if free, else a derived one, suffixed until free.
fn assign_source_id(c: &CandidateRecord, catalog: &Catalog) -> String {
    let own = c.source_id.trim();
    if !own.is_empty() && !catalog.contains_source_id(own) {
        return own.to_string();
    }

    let link = if c.url.trim().is_empty() { &c.external_link } else { &c.url };
    let base = derive_source_id(&c.name, link);
    let sid = if catalog.contains_source_id(&base) {
        suffixed(&base, 2, |s| catalog.contains_source_id(s))
    } else {
        base
    };
    if !own.is_empty() {
        warn!(name = %c.name, taken = own, assigned = %sid, "source id collision");
    }
    sid
}

/// First `base-n`, `n >= from`, not yet taken.
fn suffixed(base: &str, from: usize, taken: impl Fn(&str) -> bool) -> String {
    (from..)
        .map(|n| format!("{base}-{n}"))
        .find(|s| !taken(s))
        .unwrap_or_else(|| base.to_string())
}

/// Suffix repeated source ids by occurrence index. Returns how many records
/// were renamed.
pub fn ensure_unique_source_ids(catalog: &mut Catalog) -> usize {
    let mut in_use: HashSet<String> = catalog.source_ids().into_iter().map(String::from).collect();
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut fixed = 0;

    for record in catalog.records_mut() {
        let sid = record.source_id.trim().to_string();
        if sid.is_empty() {
            continue;
        }
        let count = seen.entry(sid.clone()).or_insert(0);
        *count += 1;
        if *count == 1 {
            continue;
        }

        let renamed = suffixed(&sid, *count, |s| in_use.contains(s));
        warn!(id = record.id, from = %sid, to = %renamed, "duplicate source id");
        in_use.insert(renamed.clone());
        record.source_id = renamed;
        fixed += 1;
    }
    fixed
}
