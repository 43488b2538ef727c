//! Core domain types for the conference catalog.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Placeholder written by sources and older catalog generations for "not known yet".
pub const TBD: &str = "TBD";

/// Generic location/country default some sources emit when they know nothing.
pub const GENERIC_COUNTRY: &str = "USA";

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one pipeline run (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Fields and sentinels
// ---------------------------------------------------------------------------

/// Text fields of a [`ConferenceRecord`] that merge and enrichment fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    Dates,
    StartDate,
    Location,
    Country,
    Deadline,
    Url,
    ExternalLink,
    Tier,
}

impl Field {
    /// Fields the merge policy engine may fill from a matched candidate,
    /// in fill order. The start date precedes its display text.
    pub const MERGEABLE: [Field; 7] = [
        Field::StartDate,
        Field::Dates,
        Field::Location,
        Field::Country,
        Field::Deadline,
        Field::Url,
        Field::ExternalLink,
    ];

    /// Name used in the persisted JSON and in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dates => "dates",
            Self::StartDate => "startDate",
            Self::Location => "location",
            Self::Country => "country",
            Self::Deadline => "deadline",
            Self::Url => "url",
            Self::ExternalLink => "ssrnLink",
            Self::Tier => "tier",
        }
    }

    /// Whether `value` is a placeholder eligible for fill-only overwrite.
    pub fn is_unknown_value(&self, value: &str) -> bool {
        if is_unknown(value) {
            return true;
        }
        matches!(self, Self::Location | Self::Country) && value.trim() == GENERIC_COUNTRY
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `""`, `"TBD"`, `"TBA"`, `"Unknown"` (any case, surrounding whitespace ignored).
pub fn is_unknown(value: &str) -> bool {
    let v = value.trim();
    v.is_empty()
        || v.eq_ignore_ascii_case(TBD)
        || v.eq_ignore_ascii_case("tba")
        || v.eq_ignore_ascii_case("unknown")
}

/// Enrichment tier that produced a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pass {
    Merge,
    Local,
    Search,
    Agent,
}

impl std::fmt::Display for Pass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Merge => "merge",
            Self::Local => "local",
            Self::Search => "search",
            Self::Agent => "agent",
        };
        f.write_str(s)
    }
}

/// Where an enriched value came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldProvenance {
    pub field: Field,
    pub value: String,
    /// Source URL, or a short collaborator tag when no URL exists.
    pub source: String,
    pub pass: Pass,
}

// ---------------------------------------------------------------------------
// ConferenceRecord
// ---------------------------------------------------------------------------

/// One real-world academic conference/event as persisted in the catalog.
///
/// Key names follow the catalog file the pipeline has always written
/// (`disc`, `sid`, `ssrnLink`); the descriptive names are accepted on input.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConferenceRecord {
    pub id: u64,
    pub name: String,
    /// Human-readable range, display only.
    #[serde(default)]
    pub dates: String,
    /// `YYYY-MM-DD` or empty.
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub country: String,
    #[serde(default, rename = "disc", alias = "discipline")]
    pub discipline: BTreeSet<String>,
    #[serde(default, rename = "sid", alias = "sourceId")]
    pub source_id: String,
    #[serde(default, rename = "ssrnLink", alias = "externalLink")]
    pub external_link: String,
    /// `YYYY-MM-DD`, `"TBD"`, or empty.
    #[serde(default)]
    pub deadline: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub tier: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub provenance: Vec<FieldProvenance>,
}

impl ConferenceRecord {
    /// Read a text field.
    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::Dates => &self.dates,
            Field::StartDate => &self.start_date,
            Field::Location => &self.location,
            Field::Country => &self.country,
            Field::Deadline => &self.deadline,
            Field::Url => &self.url,
            Field::ExternalLink => &self.external_link,
            Field::Tier => &self.tier,
        }
    }

    /// Mutable access to a text field.
    pub fn get_mut(&mut self, field: Field) -> &mut String {
        match field {
            Field::Dates => &mut self.dates,
            Field::StartDate => &mut self.start_date,
            Field::Location => &mut self.location,
            Field::Country => &mut self.country,
            Field::Deadline => &mut self.deadline,
            Field::Url => &mut self.url,
            Field::ExternalLink => &mut self.external_link,
            Field::Tier => &mut self.tier,
        }
    }

    /// Whether `field` holds a placeholder.
    pub fn is_unknown(&self, field: Field) -> bool {
        field.is_unknown_value(self.get(field))
    }

    /// Overwrite `field` and remember where the value came from.
    pub fn set_with_provenance(&mut self, field: Field, value: String, source: &str, pass: Pass) {
        *self.get_mut(field) = value.clone();
        self.provenance.push(FieldProvenance {
            field,
            value,
            source: source.to_string(),
            pass,
        });
    }
}

// ---------------------------------------------------------------------------
// CandidateRecord
// ---------------------------------------------------------------------------

/// Convention for purely numeric dates (`03/04/2026`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DateOrder {
    /// `MM/DD/YYYY`.
    #[default]
    MonthFirst,
    /// `DD/MM/YYYY` or `DD-MM-YYYY`.
    DayFirst,
}

/// A conference entry produced by a source adapter, not yet reconciled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CandidateRecord {
    pub name: String,
    pub url: String,
    #[serde(rename = "descriptionText")]
    pub description: String,
    pub source_tag: String,
    /// Identity token assigned by the source, if it has one.
    pub source_id: String,
    pub external_link: String,
    /// Raw listing date text.
    pub dates: String,
    pub location: String,
    pub deadline: String,
    /// Source categories ("Finance", "Accounting", ...).
    pub categories: Vec<String>,
    /// Discipline tag the origin authoritatively implies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub implied_discipline: Option<String>,
    pub date_order: DateOrder,
}

impl CandidateRecord {
    /// Candidate carrying only the four fields every adapter provides.
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        description: impl Into<String>,
        source_tag: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            description: description.into(),
            source_tag: source_tag.into(),
            ..Default::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Search hits and audit entries
// ---------------------------------------------------------------------------

/// One ranked result from the search provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub snippet: String,
}

/// An enrichment suggestion, accepted or rejected, kept for audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub run_id: RunId,
    pub record_id: u64,
    pub name: String,
    pub field: Field,
    pub value: String,
    pub source: String,
    pub pass: Pass,
    pub accepted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_id_is_unique() {
        assert_ne!(RunId::new(), RunId::new());
    }

    #[test]
    fn sentinels() {
        assert!(is_unknown(""));
        assert!(is_unknown(" tbd "));
        assert!(is_unknown("Unknown"));
        assert!(!is_unknown("Chicago, IL"));

        assert!(Field::Country.is_unknown_value("USA"));
        assert!(Field::Location.is_unknown_value("USA"));
        assert!(!Field::Deadline.is_unknown_value("USA"));
    }

    #[test]
    fn record_uses_catalog_key_names() {
        let record = ConferenceRecord {
            id: 7,
            name: "AAA ATA Midyear Meeting 2026".into(),
            start_date: "2026-02-19".into(),
            discipline: ["acct".to_string()].into(),
            source_id: "12345".into(),
            external_link: "https://www.ssrn.com/announcement/?id=12345".into(),
            deadline: TBD.into(),
            ..Default::default()
        };

        let json = serde_json::to_value(&record).expect("serialize");
        assert_eq!(json["startDate"], "2026-02-19");
        assert_eq!(json["disc"][0], "acct");
        assert_eq!(json["sid"], "12345");
        assert!(json["ssrnLink"].as_str().unwrap().contains("12345"));
        assert!(json.get("provenance").is_none());
    }

    #[test]
    fn record_accepts_descriptive_aliases() {
        let json = r#"{
            "id": 3,
            "name": "Finance Workshop 2026",
            "discipline": ["fin"],
            "sourceId": "abc",
            "externalLink": "https://papers.example.org/1"
        }"#;
        let record: ConferenceRecord = serde_json::from_str(json).expect("deserialize");
        assert_eq!(record.source_id, "abc");
        assert!(record.discipline.contains("fin"));
        assert_eq!(record.deadline, "");
        assert_eq!(record.external_link, "https://papers.example.org/1");
    }

    #[test]
    fn provenance_is_recorded() {
        let mut record = ConferenceRecord::default();
        record.set_with_provenance(
            Field::Deadline,
            "2026-02-01".into(),
            "https://example.org/x",
            Pass::Local,
        );
        assert_eq!(record.deadline, "2026-02-01");
        assert_eq!(record.provenance.len(), 1);
        assert_eq!(record.provenance[0].pass, Pass::Local);
    }

    #[test]
    fn candidate_wire_names() {
        let c = CandidateRecord::new("X Conference", "https://x.org", "desc", "rss");
        let json = serde_json::to_value(&c).expect("serialize");
        assert_eq!(json["descriptionText"], "desc");
        assert_eq!(json["sourceTag"], "rss");
        assert_eq!(json["dateOrder"], "month-first");
    }
}
