//! Conference tiers: 1 elite, 2 strong, 3 regional/niche/new.
//!
//! A curated reference table is tried first (substring, then substring on a
//! cleaned name, then bigram similarity). Names it does not know go to the AI
//! agent in batches; with the agent enabled, whatever is still unassigned
//! defaults to tier 3.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt::Write as _;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info, instrument, warn};

use conftrack_shared::{Catalog, ConfTrackError, ConferenceRecord, Result};

use crate::agent::{AgentRunner, json_span};

/// `(pattern, tier, discipline hint)`; first match wins, so specific
/// patterns come before general ones.
const TIER_REFERENCE: &[(&str, u8, &str)] = &[
    // substrings of tier-1 names
    ("Southwestern Finance Association", 3, "fin"),
    // tier 1, finance
    ("American Finance Association", 1, "fin"),
    ("AFA Annual Meeting", 1, "fin"),
    ("Western Finance Association", 1, "fin"),
    ("WFA Annual Meeting", 1, "fin"),
    ("SFS Cavalcade Asia-Pacific", 2, "fin"),
    ("Society for Financial Studies Cavalcade", 1, "fin"),
    ("SFS Cavalcade", 1, "fin"),
    ("NBER Corporate Finance", 1, "fin"),
    ("NBER Asset Pricing", 1, "fin"),
    ("NBER Behavioral Finance", 1, "fin"),
    ("NBER Household Finance", 1, "fin"),
    ("NBER Summer Institute", 1, "econ"),
    ("Utah Winter Finance", 1, "fin"),
    ("Texas Finance Festival", 1, "fin"),
    ("Financial Research Association", 1, "fin"),
    ("Finance Theory Group", 1, "fin"),
    ("Macro Finance Society", 1, "fin"),
    ("Duke-UNC Corporate Finance", 1, "fin"),
    ("Labor and Finance Group", 1, "fin"),
    ("Red Rock Finance", 1, "fin"),
    ("Napa Conference on Financial Markets", 1, "fin"),
    ("Colorado Finance Summit", 1, "fin"),
    ("Wharton Conference on Liquidity", 1, "fin"),
    ("RCFS Winter Conference", 1, "fin"),
    // tier 1, accounting
    ("Journal of Accounting Research Conference", 1, "acct"),
    ("JAR Conference", 1, "acct"),
    ("Journal of Accounting and Economics Conference", 1, "acct"),
    ("JAE Conference", 1, "acct"),
    ("Review of Accounting Studies Conference", 1, "acct"),
    ("Contemporary Accounting Research Conference", 1, "acct"),
    ("Stanford Accounting Research Summer Camp", 1, "acct"),
    ("Columbia Burton Conference", 1, "acct"),
    ("London Business School Accounting Symposium", 1, "acct"),
    ("MIT Asia Accounting Conference", 1, "acct"),
    ("Dartmouth Accounting Research Conference", 1, "acct"),
    ("Yale Accounting Conference", 1, "acct"),
    // tier 1, economics
    ("American Economic Association", 1, "econ"),
    ("AEA/ASSA", 1, "econ"),
    ("ASSA Annual Meeting", 1, "econ"),
    ("Econometric Society World Congress", 1, "econ"),
    ("NBER Economic Fluctuations", 1, "econ"),
    ("NBER Public Economics", 1, "econ"),
    ("NBER Labor", 1, "econ"),
    ("NBER International Trade", 1, "econ"),
    ("NBER Industrial Organization", 1, "econ"),
    ("NBER Monetary Economics", 1, "econ"),
    ("Jackson Hole Economic Symposium", 1, "econ"),
    // tier 2, finance
    ("European Winter Finance", 2, "fin"),
    ("European Finance Association", 2, "fin"),
    ("EFA Annual Meeting", 2, "fin"),
    ("Financial Intermediation Research Society", 2, "fin"),
    ("FIRS Conference", 2, "fin"),
    ("European Financial Management Association", 2, "fin"),
    ("Financial Management Association", 2, "fin"),
    ("FMA Annual Meeting", 2, "fin"),
    ("FMA Asia", 2, "fin"),
    ("FMA European", 2, "fin"),
    ("Northern Finance Association", 2, "fin"),
    ("China International Conference in Finance", 2, "fin"),
    ("Paris December Finance Meeting", 2, "fin"),
    ("CEPR European Corporate Governance", 2, "fin"),
    ("CEPR Household Finance", 2, "fin"),
    ("Adam Smith Workshop", 2, "fin"),
    ("Helsinki Finance Summit", 2, "fin"),
    ("SFI Research Days", 2, "fin"),
    ("ABFER Annual Conference", 2, "fin"),
    ("Finance Down Under", 2, "fin"),
    ("Asian Finance Association", 2, "fin"),
    ("Australasian Finance and Banking", 2, "fin"),
    ("Federal Reserve Bank", 2, "fin"),
    ("Mitsui Finance Symposium", 2, "fin"),
    ("Financial Stability Conference", 2, "fin"),
    ("SAFE Conference", 2, "fin"),
    ("Market Microstructure", 2, "fin"),
    ("Financial Econometrics", 2, "fin"),
    ("German Finance Association", 2, "fin"),
    ("French Finance Association", 2, "fin"),
    ("International Finance and Banking Society", 2, "fin"),
    ("World Finance Conference", 2, "fin"),
    // tier 2, accounting
    ("American Accounting Association Annual", 2, "acct"),
    ("AAA Annual Meeting", 2, "acct"),
    ("AAA Auditing Section", 2, "acct"),
    ("AAA FARS", 2, "acct"),
    ("AAA Management Accounting", 2, "acct"),
    ("AAA International Accounting", 2, "acct"),
    ("AAA Tax Section", 2, "acct"),
    ("Canadian Academic Accounting", 2, "acct"),
    ("European Accounting Association", 2, "acct"),
    ("EAA Annual Congress", 2, "acct"),
    ("Hawaii Accounting Research", 2, "acct"),
    ("BYU Accounting Research", 2, "acct"),
    ("Colorado Summer Accounting", 2, "acct"),
    ("Lone Star Accounting Research", 2, "acct"),
    ("Midwest Accounting Research", 2, "acct"),
    ("AFAANZ", 2, "acct"),
    // tier 2, economics
    ("European Economic Association", 2, "econ"),
    ("EEA-ESEM", 2, "econ"),
    ("Royal Economic Society", 2, "econ"),
    ("CEPR European Summer Symposium", 2, "econ"),
    ("Society of Labor Economists", 2, "econ"),
    ("International Industrial Organization", 2, "econ"),
    ("Society for Economic Dynamics", 2, "econ"),
    ("Midwest Macro", 2, "econ"),
    ("Barcelona Summer Forum", 2, "econ"),
    ("International Association for Applied Econometrics", 2, "econ"),
    ("Society for the Advancement of Economic Theory", 2, "econ"),
    ("North American Econometric Society", 2, "econ"),
    ("European Econometric Society", 2, "econ"),
    ("Annual Bank Research Conference", 2, "econ"),
    ("ECB Conference", 2, "econ"),
    // tier 3, finance
    ("Southern Finance Association", 3, "fin"),
    ("Eastern Finance Association", 3, "fin"),
    ("Midwest Finance Association", 3, "fin"),
    ("Academy of Economics and Finance", 3, "fin"),
    ("Global Finance Conference", 3, "fin"),
    ("Multinational Finance", 3, "fin"),
    ("Wolpertinger Conference", 3, "fin"),
    ("Financial Engineering and Banking Society", 3, "fin"),
    ("Infiniti Conference", 3, "fin"),
    ("Emerging Markets Finance", 3, "fin"),
    ("Vietnam Symposium", 3, "fin"),
    ("New Zealand Finance", 3, "fin"),
    ("Islamic Finance", 3, "fin"),
    ("Sustainable Finance", 3, "fin"),
    ("Behavioral Finance Conference", 3, "fin"),
    // tier 3, accounting
    ("AAA Midwest", 3, "acct"),
    ("AAA Southeast", 3, "acct"),
    ("AAA Ohio", 3, "acct"),
    ("AAA Northeast", 3, "acct"),
    ("AAA Southwest", 3, "acct"),
    ("AAA Western", 3, "acct"),
    ("Accounting PhD Rookie Camp", 3, "acct"),
    ("Global Management Accounting", 3, "acct"),
    // tier 3, economics
    ("Southern Economic Association", 3, "econ"),
    ("Eastern Economic Association", 3, "econ"),
    ("Western Economic Association", 3, "econ"),
    ("Missouri Valley Economic", 3, "econ"),
    ("Atlantic Economic Conference", 3, "econ"),
    ("Rimini Centre for Economic Analysis", 3, "econ"),
    ("Asia-Pacific Applied Economics", 3, "econ"),
];

/// Minimum bigram similarity for a fuzzy hit.
const FUZZY_THRESHOLD: f64 = 0.70;

/// Records per agent task.
const AGENT_BATCH: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMethod {
    Exact,
    Normalized,
    Fuzzy,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierMatch {
    pub tier: u8,
    pub pattern: &'static str,
    pub discipline: &'static str,
    pub method: MatchMethod,
    pub score: f64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TierOptions {
    /// Re-assign records that already carry a tier.
    pub all: bool,
    /// Reference table only.
    pub no_agent: bool,
}

#[derive(Debug, Default)]
pub struct TierReport {
    pub considered: usize,
    pub from_reference: usize,
    pub from_agent: usize,
    pub defaulted: usize,
    pub unassigned: usize,
    /// Tier → records, over the whole catalog afterwards.
    pub counts: BTreeMap<String, usize>,
}

// ---------------------------------------------------------------------------
// Reference matching
// ---------------------------------------------------------------------------

static CFP_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:call\s+for\s+papers|cfp)\s*[:\-]?\s*").expect("valid regex")
});
static NUMBERS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b20\d{2}\b|\b\d+(?:st|nd|rd|th)\b|\b\d+\b").expect("valid regex")
});

/// Lower-cased name without CFP prefix, years, ordinals or bare numbers.
pub fn tier_normalize(name: &str) -> String {
    let lower = name.to_lowercase();
    let stripped = CFP_PREFIX_RE.replace(&lower, "");
    let stripped = NUMBERS_RE.replace_all(&stripped, " ");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn match_reference(name: &str) -> Option<TierMatch> {
    let lower = name.to_lowercase();
    let normalized = tier_normalize(name);

    let hit = |method: MatchMethod, haystack: &str| {
        TIER_REFERENCE
            .iter()
            .find(|(pattern, ..)| haystack.contains(&pattern.to_lowercase()))
            .map(|&(pattern, tier, discipline)| TierMatch {
                tier,
                pattern,
                discipline,
                method,
                score: 1.0,
            })
    };
    if let Some(m) = hit(MatchMethod::Exact, &lower).or_else(|| hit(MatchMethod::Normalized, &normalized)) {
        return Some(m);
    }

    let mut best: Option<TierMatch> = None;
    for &(pattern, tier, discipline) in TIER_REFERENCE {
        let score = strsim::sorensen_dice(&normalized, &tier_normalize(pattern));
        if best.is_none_or(|b| score > b.score) {
            best = Some(TierMatch {
                tier,
                pattern,
                discipline,
                method: MatchMethod::Fuzzy,
                score,
            });
        }
    }
    best.filter(|b| b.score >= FUZZY_THRESHOLD)
}

// ---------------------------------------------------------------------------
// Assignment
// ---------------------------------------------------------------------------

/// Assign tiers in place.
#[instrument(skip_all, fields(records = catalog.len(), all = options.all))]
pub async fn assign_tiers<A: AgentRunner>(
    catalog: &mut Catalog,
    agent: Option<&A>,
    options: TierOptions,
) -> TierReport {
    let mut report = TierReport::default();
    let mut unmatched = Vec::new();

    for record in catalog.records_mut() {
        if !options.all && !record.tier.trim().is_empty() {
            continue;
        }
        report.considered += 1;
        match match_reference(&record.name) {
            Some(m) => {
                debug!(id = record.id, tier = m.tier, pattern = m.pattern, method = ?m.method, "tier from reference");
                record.tier = m.tier.to_string();
                if record.discipline.is_empty() {
                    record.discipline.insert(m.discipline.to_string());
                }
                report.from_reference += 1;
            }
            None => unmatched.push(record.id),
        }
    }

    match agent.filter(|_| !options.no_agent) {
        Some(agent) if !unmatched.is_empty() => {
            let mut answered = HashSet::new();
            for batch in unmatched.chunks(AGENT_BATCH) {
                for (id, tier) in tier_batch(agent, catalog, batch).await {
                    if let Some(record) = catalog.find_by_id_mut(id) {
                        record.tier = tier.to_string();
                        answered.insert(id);
                        report.from_agent += 1;
                    }
                }
            }
            for id in unmatched.iter().filter(|id| !answered.contains(*id)) {
                if let Some(record) = catalog.find_by_id_mut(*id) {
                    record.tier = "3".into();
                    report.defaulted += 1;
                }
            }
        }
        _ => report.unassigned = unmatched.len(),
    }

    for record in catalog.iter() {
        *report.counts.entry(record.tier.clone()).or_insert(0) += 1;
    }
    info!(
        considered = report.considered,
        reference = report.from_reference,
        agent = report.from_agent,
        defaulted = report.defaulted,
        unassigned = report.unassigned,
        "tier assignment complete"
    );
    report
}

async fn tier_batch<A: AgentRunner>(agent: &A, catalog: &Catalog, ids: &[u64]) -> Vec<(u64, u8)> {
    let records: Vec<&ConferenceRecord> = catalog.iter().filter(|r| ids.contains(&r.id)).collect();
    let prompt = tier_prompt(&records);

    let reply = match agent.run(&prompt).await {
        Ok(reply) => reply,
        Err(e) => {
            warn!(error = %e, "tier batch failed");
            return Vec::new();
        }
    };
    match parse_tier_reply(&reply) {
        Ok(tiers) => tiers.into_iter().filter(|(id, _)| ids.contains(id)).collect(),
        Err(e) => {
            warn!(error = %e, "tier reply unparsable");
            Vec::new()
        }
    }
}

fn tier_prompt(records: &[&ConferenceRecord]) -> String {
    let mut list = String::new();
    for r in records {
        let disc = r.discipline.iter().cloned().collect::<Vec<_>>().join(", ");
        let location = if r.location.trim().is_empty() { "Unknown" } else { &r.location };
        let _ = writeln!(list, "- ID:{} | Name: {} | Discipline: {disc} | Location: {location}", r.id, r.name);
    }
    format!(
        "You are an expert in academic finance, accounting, and economics conferences.\n\
         Assign a tier (1, 2, or 3) to each conference below.\n\n\
         - Tier 1: elite, very selective or invite-only (AFA, WFA, NBER workshops, SFS Cavalcade, JAR Conference).\n\
         - Tier 2: strong association meetings and good field conferences (EFA, FIRS, FMA, AAA Annual, EEA-ESEM).\n\
         - Tier 3: regional, niche or newer conferences.\n\
         If unsure, assign 3.\n\n\
         Conferences:\n{list}\n\
         Respond with ONLY a JSON object mapping IDs to tiers, like {{\"123\": 2, \"456\": 3}}."
    )
}

/// `{ "<id>": tier }` pairs; entries outside 1–3 are dropped.
pub fn parse_tier_reply(reply: &str) -> Result<Vec<(u64, u8)>> {
    let span = json_span(reply, '{', '}')
        .ok_or_else(|| ConfTrackError::parse("tier reply contains no JSON object"))?;
    let map: HashMap<String, serde_json::Value> = serde_json::from_str(&span)
        .map_err(|e| ConfTrackError::parse(format!("tier reply is not a JSON object: {e}")))?;

    let mut out: Vec<(u64, u8)> = map
        .into_iter()
        .filter_map(|(id, tier)| {
            let id = id.trim().parse::<u64>().ok()?;
            let tier = match tier {
                serde_json::Value::Number(n) => n.as_u64()?,
                serde_json::Value::String(s) => s.trim().parse().ok()?,
                _ => return None,
            };
            (1..=3).contains(&tier).then_some((id, tier as u8))
        })
        .collect();
    out.sort_unstable();
    Ok(out)
}
