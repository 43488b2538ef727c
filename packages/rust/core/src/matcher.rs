//! Candidate-to-catalog matching.
//!
//! Rules per existing record, strongest first:
//! 0. same adapter-supplied source id: 1.0, checked across the whole catalog
//!    before anything else
//! 1. same event URL (query and fragment ignored) or same external link
//!    (fragment ignored, query kept): 1.0
//! 2. Jaccard overlap of significant name tokens
//! 3. plus a bonus when both start dates fall in the same year (capped at 1.0)
//!
//! The best score wins if it clears the threshold; ties keep the earlier record.

use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate};
use tracing::debug;
use url::Url;

use conftrack_extract::{DateContext, normalize_date, significant_tokens};
use conftrack_shared::{CandidateRecord, Catalog, ConferenceRecord, MatchingConfig};

/// The comparable view of a candidate.
#[derive(Debug, Clone, Default)]
pub struct MatchKey {
    /// Adapter-supplied identity; empty when the adapter has none.
    pub source_id: String,
    pub tokens: BTreeSet<String>,
    pub url: String,
    pub external_link: String,
    pub start_year: Option<i32>,
}

impl MatchKey {
    pub fn from_candidate(candidate: &CandidateRecord, ctx: &DateContext) -> Self {
        let start_year = normalize_date(&candidate.dates, &ctx.with_order(candidate.date_order))
            .map(|d| d.start.year());
        Self {
            source_id: candidate.source_id.trim().to_string(),
            tokens: significant_tokens(&candidate.name),
            url: strip_url(&candidate.url),
            external_link: link_key(&candidate.external_link),
            start_year,
        }
    }

    pub fn from_record(record: &ConferenceRecord) -> Self {
        Self {
            source_id: record.source_id.trim().to_string(),
            tokens: significant_tokens(&record.name),
            url: strip_url(&record.url),
            external_link: link_key(&record.external_link),
            start_year: record_year(record),
        }
    }
}

/// Best counterpart found for a candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchResult {
    /// Position in the catalog.
    pub index: usize,
    pub score: f64,
}

#[derive(Debug, Clone)]
pub struct Matcher {
    threshold: f64,
    same_year_bonus: f64,
}

impl Default for Matcher {
    fn default() -> Self {
        Self::new(&MatchingConfig::default())
    }
}

impl Matcher {
    pub fn new(config: &MatchingConfig) -> Self {
        Self {
            threshold: config.threshold,
            same_year_bonus: config.same_year_bonus,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Similarity of a candidate key and an existing record, in `[0, 1]`.
    pub fn score(&self, key: &MatchKey, record: &ConferenceRecord) -> f64 {
        let other = MatchKey::from_record(record);

        if same_link(&key.source_id, &other.source_id)
            || same_link(&key.url, &other.url)
            || same_link(&key.external_link, &other.external_link)
        {
            return 1.0;
        }

        let mut score = jaccard(&key.tokens, &other.tokens);
        if let (Some(a), Some(b)) = (key.start_year, other.start_year) {
            if a == b {
                score += self.same_year_bonus;
            }
        }
        score.min(1.0)
    }

    /// Best record clearing the threshold, if any.
    pub fn find_match(&self, key: &MatchKey, catalog: &Catalog) -> Option<MatchResult> {
        if let Some(index) = catalog
            .iter()
            .position(|r| same_link(&key.source_id, r.source_id.trim()))
        {
            debug!(index, sid = %key.source_id, "candidate matched by source id");
            return Some(MatchResult { index, score: 1.0 });
        }

        let mut best: Option<MatchResult> = None;
        for (index, record) in catalog.iter().enumerate() {
            let score = self.score(key, record);
            if score >= 1.0 {
                return Some(MatchResult { index, score });
            }
            if best.is_none_or(|b| score > b.score) {
                best = Some(MatchResult { index, score });
            }
        }

        let best = best.filter(|b| b.score >= self.threshold);
        if let Some(b) = best {
            debug!(index = b.index, score = b.score, "candidate matched");
        }
        best
    }
}

fn record_year(record: &ConferenceRecord) -> Option<i32> {
    NaiveDate::parse_from_str(record.start_date.trim(), "%Y-%m-%d")
        .ok()
        .map(|d| d.year())
}

fn same_link(a: &str, b: &str) -> bool {
    !a.is_empty() && a == b
}

fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Comparison form of an event page: no query, no fragment, no trailing
/// slash.
pub fn strip_url(raw: &str) -> String {
    let raw = raw.trim();
    match Url::parse(raw) {
        Ok(mut url) => {
            url.set_query(None);
            url.set_fragment(None);
            url.as_str().trim_end_matches('/').to_string()
        }
        Err(_) => {
            let end = raw.find(['?', '#']).unwrap_or(raw.len());
            raw[..end].trim_end_matches('/').to_lowercase()
        }
    }
}

/// Comparison form of a listing link. The query is kept: listing sites
/// identify announcements by it (`?id=15001`).
pub fn link_key(raw: &str) -> String {
    let raw = raw.trim();
    match Url::parse(raw) {
        Ok(mut url) => {
            url.set_fragment(None);
            url.to_string()
        }
        Err(_) => raw.split('#').next().unwrap_or_default().to_lowercase(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> DateContext {
        DateContext::new(2026, 2025..=2030)
    }

    fn record(name: &str, start: &str) -> ConferenceRecord {
        ConferenceRecord {
            id: 1,
            name: name.into(),
            start_date: start.into(),
            ..Default::default()
        }
    }

    fn key_for(name: &str, dates: &str) -> MatchKey {
        let mut c = CandidateRecord::new(name, "", "", "test");
        c.dates = dates.into();
        MatchKey::from_candidate(&c, &ctx())
    }

    #[test]
    fn reordered_year_matches() {
        let m = Matcher::default();
        let score = m.score(
            &key_for("2026 Finance Workshop", "June 3, 2026"),
            &record("Finance Workshop 2026", "2026-06-03"),
        );
        assert!(score >= 0.6, "score {score}");
    }

    #[test]
    fn different_topic_does_not_match() {
        let m = Matcher::default();
        let score = m.score(
            &key_for("2026 Finance Workshop", "June 3, 2026"),
            &record("2026 Accounting Symposium", "2026-06-10"),
        );
        assert!(score < 0.6, "score {score}");
    }

    #[test]
    fn same_url_ignoring_query_is_exact() {
        let m = Matcher::default();
        let mut c = CandidateRecord::new("Totally different", "https://x.org/conf/?utm=1#top", "", "t");
        c.dates = String::new();
        let p = MatchKey::from_candidate(&c, &ctx());
        let mut r = record("Another name", "");
        r.url = "https://X.org/conf".into();
        assert_eq!(m.score(&p, &r), 1.0);
    }

    #[test]
    fn listing_links_differ_by_query() {
        let m = Matcher::default();
        let mut c = CandidateRecord::new("Utah Winter Finance Conference", "", "", "ssrn");
        c.external_link = "https://papers.ssrn.com/sol3/announcement/?id=15001".into();
        let p = MatchKey::from_candidate(&c, &ctx());

        let mut other = record("Household Economics Gathering", "");
        other.external_link = "https://papers.ssrn.com/sol3/announcement/?id=15002".into();
        assert!(m.score(&p, &other) < 0.6);

        let mut same = record("Renamed Listing", "");
        same.external_link = "https://papers.ssrn.com/sol3/announcement/?id=15001#top".into();
        assert_eq!(m.score(&p, &same), 1.0);
    }

    #[test]
    fn source_id_wins_over_earlier_link_match() {
        let m = Matcher::default();
        let mut c = CandidateRecord::new("Alpha Corporate Finance Conference", "https://alpha.edu/conf", "", "ssrn");
        c.source_id = "777".into();
        let p = MatchKey::from_candidate(&c, &ctx());

        let mut by_url = record("Something Else", "");
        by_url.url = "https://alpha.edu/conf".into();
        let mut by_sid = record("2026 Finance Conference at Alpha University", "");
        by_sid.source_id = "777".into();
        let catalog = Catalog::new(vec![by_url, by_sid]);

        let found = m.find_match(&p, &catalog).unwrap();
        assert_eq!(found.index, 1);
        assert_eq!(found.score, 1.0);
    }

    #[test]
    fn bonus_is_capped() {
        let m = Matcher::default();
        let s = m.score(
            &key_for("Midwest Finance Association Meeting", "March 5, 2026"),
            &record("Midwest Finance Association Meeting", "2026-03-05"),
        );
        assert_eq!(s, 1.0);
    }

    #[test]
    fn best_match_wins_and_ties_keep_first() {
        let m = Matcher::default();
        let catalog = Catalog::new(vec![
            record("Finance Workshop 2026", ""),
            record("Finance Workshop 2026", ""),
            record("Economics Symposium", ""),
        ]);
        let found = m.find_match(&key_for("Finance Workshop 2026", ""), &catalog).unwrap();
        assert_eq!(found.index, 0);

        assert!(m.find_match(&key_for("Unrelated Gathering Of Chemists", ""), &catalog).is_none());
    }

    #[test]
    fn empty_names_never_match() {
        let m = Matcher::default();
        assert_eq!(m.score(&key_for("", ""), &record("", "")), 0.0);
    }
}
