//! Escalation task wording and the strict reply format.

use std::fmt::Write as _;

use serde::Deserialize;
use tracing::warn;

use conftrack_shared::{ConfTrackError, ConferenceRecord, Result};

use crate::agent::json_span;

/// One per-record answer from the agent.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum AgentVerdict {
    Fix {
        id: u64,
        #[serde(default, alias = "startDate")]
        start_date: Option<String>,
        #[serde(default)]
        dates: Option<String>,
        #[serde(default)]
        deadline: Option<String>,
        #[serde(default)]
        location: Option<String>,
        #[serde(default)]
        url: Option<String>,
        #[serde(default)]
        source: Option<String>,
    },
    #[serde(alias = "not-conference")]
    NotConference {
        id: u64,
        #[serde(default)]
        reason: Option<String>,
    },
    Unknown { id: u64 },
}

impl AgentVerdict {
    pub fn id(&self) -> u64 {
        match self {
            Self::Fix { id, .. } | Self::NotConference { id, .. } | Self::Unknown { id } => *id,
        }
    }
}

/// Verdicts from a reply. No JSON array at all is an error; elements that do
/// not fit the format are skipped.
pub fn parse_verdicts(reply: &str) -> Result<Vec<AgentVerdict>> {
    let span = json_span(reply, '[', ']')
        .ok_or_else(|| ConfTrackError::parse("agent reply contains no JSON array"))?;
    let items: Vec<serde_json::Value> = serde_json::from_str(&span)
        .map_err(|e| ConfTrackError::parse(format!("agent reply is not a JSON array: {e}")))?;

    Ok(items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<AgentVerdict>(item.clone()) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(error = %e, item = %item, "skipping malformed verdict");
                None
            }
        })
        .collect())
}

/// The natural-language task for one batch.
pub fn build_prompt(records: &[&ConferenceRecord]) -> String {
    let mut prompt = String::from(
        "You are helping maintain a catalog of academic conferences. For each entry below, \
         browse or search the web and determine its start date, display dates, submission \
         deadline and location.\n\n\
         Reply with ONLY a JSON array, one object per entry, using one of these shapes:\n\
         {\"verdict\": \"fix\", \"id\": <id>, \"start_date\": \"YYYY-MM-DD\", \"dates\": \"<as written>\", \
         \"deadline\": \"YYYY-MM-DD\", \"location\": \"<City, Country>\", \"url\": \"<event page>\", \
         \"source\": \"<page you used>\"}\n\
         {\"verdict\": \"not_conference\", \"id\": <id>, \"reason\": \"<why>\"}\n\
         {\"verdict\": \"unknown\", \"id\": <id>}\n\
         Omit fields you could not confirm.\n\nEntries:\n",
    );
    for r in records {
        let _ = write!(prompt, "- id {}: {}", r.id, r.name);
        if !r.dates.trim().is_empty() {
            let _ = write!(prompt, " | dates: {}", r.dates);
        }
        if !r.url.trim().is_empty() {
            let _ = write!(prompt, " | url: {}", r.url);
        }
        if !r.external_link.trim().is_empty() {
            let _ = write!(prompt, " | listing: {}", r.external_link);
        }
        prompt.push('\n');
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_three_verdicts() {
        let reply = r#"Sure! Here is what I found:
```json
[
  {"verdict": "fix", "id": 4, "startDate": "2026-05-14", "dates": "May 14-16, 2026", "source": "https://x.org"},
  {"verdict": "not_conference", "id": 5, "reason": "journal special issue"},
  {"verdict": "unknown", "id": 6},
  {"verdict": "maybe", "id": 7},
  {"id": 8}
]
```"#;
        let verdicts = parse_verdicts(reply).unwrap();
        assert_eq!(verdicts.len(), 3);
        assert!(matches!(
            &verdicts[0],
            AgentVerdict::Fix { id: 4, start_date: Some(s), .. } if s == "2026-05-14"
        ));
        assert!(matches!(verdicts[1], AgentVerdict::NotConference { id: 5, .. }));
        assert_eq!(verdicts[2].id(), 6);
    }

    #[test]
    fn prose_reply_is_an_error() {
        assert!(parse_verdicts("I could not find anything, sorry.").is_err());
        assert!(parse_verdicts("[not json at all]").is_err());
    }

    #[test]
    fn prompt_lists_entries() {
        let r = ConferenceRecord {
            id: 9,
            name: "Finance Workshop".into(),
            external_link: "https://papers.ssrn.com/a?id=1".into(),
            ..Default::default()
        };
        let prompt = build_prompt(&[&r]);
        assert!(prompt.contains("- id 9: Finance Workshop | listing: https://papers.ssrn.com/a?id=1"));
        assert!(prompt.contains("not_conference"));
    }
}
