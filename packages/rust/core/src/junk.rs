//! Non-conference detection and the post-merge junk sweep.

use tracing::{info, warn};

use conftrack_shared::{Catalog, ConferenceRecord, JunkConfig};

use crate::validate::parse_iso;

/// Phrases marking announcements that are not conferences.
const EXCLUSIONS: &[&str] = &[
    "prize",
    "award",
    "ph.d.",
    "phd in ",
    "phd program",
    "professorship",
    "assistant professor",
    "data grant",
    "call for registration",
    "fully funded",
    "research programme",
    "research program",
    "call for proposals",
    "call for applications",
    "call for nominations",
    "call for research projects",
    "dissertation proposal",
    "dissertation grant",
    "doctoral internship",
    "doctoral colloquium",
    "hackathon",
    "webinar",
    "student research competition",
    "postdoctoral",
    "postdoc ",
    "research associate",
    "graduate programme",
    "graduate program",
    "call for papers:",
    "call for papers!",
    "now accepting submissions",
    "research grants provided by",
];

/// Junk unless the name also says "conference".
const EXCLUSIONS_UNLESS_CONFERENCE: &[&str] = &["summer school", "call for job market paper"];

/// Genuine conference vocabulary that overrides an exclusion hit.
const SAFELIST: &[&str] = &[
    "annual meeting",
    "annual conference",
    "midyear meeting",
    "finance conference",
    "accounting conference",
    "economics conference",
    "annual congress",
    "winter finance",
    "research conference",
    "workshop",
    "symposium",
    "forum",
    "summit",
];

/// Two-tier classifier: exclusion phrases, overridden by a safelist.
#[derive(Debug, Clone)]
pub struct JunkClassifier {
    exclusions: Vec<String>,
    safelist: Vec<String>,
}

impl Default for JunkClassifier {
    fn default() -> Self {
        Self::new(&JunkConfig::default())
    }
}

impl JunkClassifier {
    /// Built-in tables plus the configured extras.
    pub fn new(config: &JunkConfig) -> Self {
        let lower = |items: &[String]| -> Vec<String> {
            items
                .iter()
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect()
        };

        let mut exclusions: Vec<String> = EXCLUSIONS.iter().map(|s| s.to_string()).collect();
        exclusions.extend(lower(&config.extra_exclusions));
        let mut safelist: Vec<String> = SAFELIST.iter().map(|s| s.to_string()).collect();
        safelist.extend(lower(&config.extra_safelist));

        Self {
            exclusions,
            safelist,
        }
    }

    /// Whether `name` is a non-conference announcement.
    pub fn is_junk(&self, name: &str) -> bool {
        let name = name.to_lowercase();

        if self.exclusions.iter().any(|kw| name.contains(kw.as_str())) {
            return !self.safelist.iter().any(|safe| name.contains(safe.as_str()));
        }

        EXCLUSIONS_UNLESS_CONFERENCE
            .iter()
            .any(|kw| name.contains(kw) && !name.contains("conference"))
    }
}

/// What the sweep did.
#[derive(Debug, Default)]
pub struct JunkSweep {
    /// Junk names without a start date: removed.
    pub removed: Vec<ConferenceRecord>,
    /// Junk names that carry a start date: kept, logged.
    pub kept_dated: Vec<u64>,
    /// No start date but a conference-like name: kept, logged.
    pub flagged: Vec<u64>,
}

impl JunkClassifier {
    /// Remove undated junk; warn about dated junk and undated keepers.
    pub fn sweep(&self, catalog: &mut Catalog) -> JunkSweep {
        let mut report = JunkSweep::default();

        for record in catalog.iter() {
            let undated = undated(record);
            match (self.is_junk(&record.name), undated) {
                (true, false) => {
                    warn!(id = record.id, name = %record.name, "junk-like name with a start date, keeping");
                    report.kept_dated.push(record.id);
                }
                (false, true) => {
                    warn!(id = record.id, name = %record.name, "no start date, keeping for enrichment");
                    report.flagged.push(record.id);
                }
                _ => {}
            }
        }

        report.removed = catalog.remove_where(|r| undated(r) && self.is_junk(&r.name));
        for r in &report.removed {
            info!(id = r.id, name = %r.name, "removed non-conference entry");
        }
        report
    }
}

/// No start date that parses: empty, a sentinel or garbage.
fn undated(record: &ConferenceRecord) -> bool {
    parse_iso(&record.start_date).is_none()
}
