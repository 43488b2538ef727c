//! Application configuration for conftrack.
//!
//! User config lives at `~/.conftrack/conftrack.toml`.
//! CLI flags override config file values, which override defaults.
//! Secrets never live in the file: it only names the environment variables
//! that hold them.

use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{ConfTrackError, Result};
use crate::types::DateOrder;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "conftrack.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".conftrack";

/// SSRN professional-announcement listing, parameterised by network id.
const SSRN_LISTING: &str =
    "https://www.ssrn.com/index.cfm/en/janda/professional-announcements/?annsNet=";

// ---------------------------------------------------------------------------
// Config structs (matching conftrack.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub defaults: DefaultsConfig,

    #[serde(default)]
    pub matching: MatchingConfig,

    #[serde(default)]
    pub enrichment: EnrichmentSettings,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub junk: JunkConfig,

    /// Listing pages and feeds to harvest.
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceSpec>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            defaults: DefaultsConfig::default(),
            matching: MatchingConfig::default(),
            enrichment: EnrichmentSettings::default(),
            search: SearchConfig::default(),
            agent: AgentConfig::default(),
            junk: JunkConfig::default(),
            sources: default_sources(),
        }
    }
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Catalog JSON file.
    #[serde(default = "default_catalog_path")]
    pub catalog_path: String,

    /// Directory for raw scrape outputs, queue and audit files.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Discipline tag given to records nothing else classifies.
    #[serde(default = "default_fallback_discipline")]
    pub fallback_discipline: String,

    /// Year assumed for dates written without one. Unset: next calendar year.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_year: Option<i32>,

    /// Earliest plausible event year. Unset: this year - 1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_year: Option<i32>,

    /// Latest plausible event year. Unset: this year + 4.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_year: Option<i32>,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            catalog_path: default_catalog_path(),
            output_dir: default_output_dir(),
            fallback_discipline: default_fallback_discipline(),
            default_year: None,
            min_year: None,
            max_year: None,
        }
    }
}

fn default_catalog_path() -> String {
    "conferences.json".into()
}
fn default_output_dir() -> String {
    "conftrack-out".into()
}
fn default_fallback_discipline() -> String {
    "fin".into()
}

/// Year values resolved for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YearWindow {
    pub default_year: i32,
    pub plausible: RangeInclusive<i32>,
}

impl DefaultsConfig {
    /// Resolve the default year and plausible window against `today`.
    ///
    /// Recomputed every run so the meaning does not drift as time passes.
    pub fn year_window(&self, today: NaiveDate) -> YearWindow {
        let this_year = today.year();
        YearWindow {
            default_year: self.default_year.unwrap_or(this_year + 1),
            plausible: self.min_year.unwrap_or(this_year - 1)
                ..=self.max_year.unwrap_or(this_year + 4),
        }
    }
}

/// `[matching]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Minimum score for a candidate to count as an existing record.
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    /// Added to name similarity when both start dates share a year.
    #[serde(default = "default_year_bonus")]
    pub same_year_bonus: f64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            same_year_bonus: default_year_bonus(),
        }
    }
}

fn default_threshold() -> f64 {
    0.6
}
fn default_year_bonus() -> f64 {
    0.15
}

/// `[enrichment]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentSettings {
    /// Politeness delay after each page fetch.
    #[serde(default = "default_fetch_delay")]
    pub fetch_delay_ms: u64,

    /// Delay after each search call (provider quota is ~1 request/second).
    #[serde(default = "default_search_delay")]
    pub search_delay_ms: u64,

    /// Results considered per search query.
    #[serde(default = "default_max_results")]
    pub max_search_results: usize,

    /// Longest string accepted as a venue.
    #[serde(default = "default_max_location_len")]
    pub max_location_len: usize,

    /// Most records sent to the AI agent in one task.
    #[serde(default = "default_agent_batch")]
    pub agent_batch_limit: usize,

    /// Hosts that block direct fetching; links there are only lookup keys.
    #[serde(default = "default_blocked_hosts")]
    pub blocked_hosts: Vec<String>,

    /// Venue sub-pages tried before the record's own page.
    #[serde(default = "default_subpages")]
    pub subpages: Vec<SubpageRule>,
}

impl Default for EnrichmentSettings {
    fn default() -> Self {
        Self {
            fetch_delay_ms: default_fetch_delay(),
            search_delay_ms: default_search_delay(),
            max_search_results: default_max_results(),
            max_location_len: default_max_location_len(),
            agent_batch_limit: default_agent_batch(),
            blocked_hosts: default_blocked_hosts(),
            subpages: default_subpages(),
        }
    }
}

fn default_fetch_delay() -> u64 {
    1500
}
fn default_search_delay() -> u64 {
    1100
}
fn default_max_results() -> usize {
    5
}
fn default_max_location_len() -> usize {
    100
}
fn default_agent_batch() -> usize {
    40
}
fn default_blocked_hosts() -> Vec<String> {
    vec!["ssrn.com".into(), "papers.ssrn.com".into()]
}
fn default_subpages() -> Vec<SubpageRule> {
    vec![SubpageRule {
        host: "aaahq.org".into(),
        paths: vec!["submissions".into(), "call-for-papers".into()],
    }]
}

/// Sub-paths a venue host is known to publish under each event page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubpageRule {
    /// Matched as a suffix of the record URL's host.
    pub host: String,
    pub paths: Vec<String>,
}

/// `[search]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_search_key_env")]
    pub api_key_env: String,

    /// Name of the env var that may override the endpoint.
    #[serde(default = "default_search_endpoint_env")]
    pub endpoint_env: String,

    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,

    /// How long a cached response stays valid.
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_hours: i64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_search_key_env(),
            endpoint_env: default_search_endpoint_env(),
            endpoint: default_search_endpoint(),
            timeout_secs: default_search_timeout(),
            cache_ttl_hours: default_cache_ttl(),
        }
    }
}

fn default_search_key_env() -> String {
    "BRAVE_API_KEY".into()
}
fn default_search_endpoint_env() -> String {
    "CONFTRACK_SEARCH_URL".into()
}
fn default_search_endpoint() -> String {
    "https://api.search.brave.com/res/v1/web/search".into()
}
fn default_search_timeout() -> u64 {
    15
}
fn default_cache_ttl() -> i64 {
    72
}

impl SearchConfig {
    /// API key from the environment, if set and non-empty.
    pub fn api_key(&self) -> Option<String> {
        env_value(&self.api_key_env)
    }

    /// Endpoint from the environment, falling back to the configured one.
    pub fn resolved_endpoint(&self) -> String {
        env_value(&self.endpoint_env).unwrap_or_else(|| self.endpoint.clone())
    }
}

/// `[agent]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Name of the env var that may override the command line.
    #[serde(default = "default_agent_env")]
    pub command_env: String,

    #[serde(default = "default_agent_command")]
    pub command: String,

    #[serde(default = "default_agent_args")]
    pub args: Vec<String>,

    #[serde(default = "default_agent_timeout")]
    pub timeout_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            command_env: default_agent_env(),
            command: default_agent_command(),
            args: default_agent_args(),
            timeout_secs: default_agent_timeout(),
        }
    }
}

fn default_agent_env() -> String {
    "CONFTRACK_AGENT_CMD".into()
}
fn default_agent_command() -> String {
    "claude".into()
}
fn default_agent_args() -> Vec<String> {
    vec!["-p".into()]
}
fn default_agent_timeout() -> u64 {
    900
}

impl AgentConfig {
    /// Program and arguments, taking a whitespace-split override from the env.
    pub fn command_line(&self) -> (String, Vec<String>) {
        if let Some(raw) = env_value(&self.command_env) {
            let mut parts = raw.split_whitespace().map(String::from);
            if let Some(program) = parts.next() {
                return (program, parts.collect());
            }
        }
        (self.command.clone(), self.args.clone())
    }
}

/// `[junk]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JunkConfig {
    /// Phrases marking non-conference items, on top of the built-in list.
    #[serde(default)]
    pub extra_exclusions: Vec<String>,

    /// Phrases marking genuine conferences, on top of the built-in list.
    #[serde(default)]
    pub extra_safelist: Vec<String>,
}

/// Adapter used to read a source's listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    Ssrn,
    Rss,
    HtmlList,
}

/// `[[sources]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpec {
    /// Short tag, also the raw output file stem.
    pub name: String,
    pub url: String,
    pub kind: SourceKind,

    /// Category attached to every item ("Finance", ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// Discipline this origin implies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discipline: Option<String>,

    /// When true, `discipline` corrects mis-tagged existing records.
    #[serde(default)]
    pub authoritative: bool,

    #[serde(default)]
    pub date_order: DateOrder,
}

fn default_sources() -> Vec<SourceSpec> {
    [("ssrn-fen", "Finance", 203), ("ssrn-arn", "Accounting", 204), ("ssrn-ern", "Economics", 205)]
        .into_iter()
        .map(|(name, category, network)| SourceSpec {
            name: name.into(),
            url: format!("{SSRN_LISTING}{network}"),
            kind: SourceKind::Ssrn,
            category: Some(category.into()),
            discipline: None,
            authoritative: false,
            date_order: DateOrder::DayFirst,
        })
        .collect()
}

impl AppConfig {
    /// Reject values no run could use.
    pub fn validate(&self) -> Result<()> {
        let threshold = self.matching.threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfTrackError::validation(format!(
                "matching.threshold {threshold} outside 0..=1"
            )));
        }
        if let (Some(min), Some(max)) = (self.defaults.min_year, self.defaults.max_year) {
            if min > max {
                return Err(ConfTrackError::validation(format!(
                    "defaults.min_year {min} is after max_year {max}"
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.conftrack/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ConfTrackError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.conftrack/conftrack.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfTrackError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content)
        .map_err(|e| ConfTrackError::config(format!("failed to parse {}: {e}", path.display())))?;
    config.validate()?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ConfTrackError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ConfTrackError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ConfTrackError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Non-empty value of an environment variable.
fn env_value(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(val) if !val.trim().is_empty() => Some(val),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("catalog_path"));
        assert!(toml_str.contains("BRAVE_API_KEY"));
        assert!(toml_str.contains("annsNet=204"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.matching.threshold, 0.6);
        assert_eq!(parsed.sources.len(), 3);
        assert_eq!(parsed.sources[0].date_order, DateOrder::DayFirst);
    }

    #[test]
    fn config_with_custom_source() {
        let toml_str = r#"
[defaults]
catalog_path = "/tmp/conferences.json"
default_year = 2027

[[sources]]
name = "aaa"
url = "https://aaahq.org/meetings/feed.xml"
kind = "rss"
discipline = "acct"
authoritative = true
date_order = "month-first"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.sources.len(), 1);
        assert_eq!(config.sources[0].kind, SourceKind::Rss);
        assert!(config.sources[0].authoritative);
        assert_eq!(config.defaults.default_year, Some(2027));
        assert_eq!(config.enrichment.fetch_delay_ms, 1500);
    }

    #[test]
    fn year_window_follows_today() {
        let defaults = DefaultsConfig::default();
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let window = defaults.year_window(today);
        assert_eq!(window.default_year, 2027);
        assert_eq!(window.plausible, 2025..=2030);
    }

    #[test]
    fn year_window_pinned() {
        let defaults = DefaultsConfig {
            default_year: Some(2026),
            min_year: Some(2024),
            max_year: Some(2028),
            ..Default::default()
        };
        let today = NaiveDate::from_ymd_opt(2030, 1, 1).unwrap();
        let window = defaults.year_window(today);
        assert_eq!(window.default_year, 2026);
        assert_eq!(window.plausible, 2024..=2028);
    }

    #[test]
    fn out_of_range_values_fail_to_load() {
        let path = std::env::temp_dir()
            .join(format!("conftrack_config_{}.toml", uuid::Uuid::now_v7()));
        std::fs::write(&path, "[matching]\nthreshold = 1.5\n").expect("write config");
        let err = load_config_from(&path).unwrap_err();
        assert!(matches!(err, ConfTrackError::Validation { .. }));
        assert!(err.to_string().contains("1.5"));

        std::fs::write(&path, "[defaults]\nmin_year = 2030\nmax_year = 2026\n")
            .expect("write config");
        assert!(load_config_from(&path).is_err());

        std::fs::write(&path, "[matching]\nthreshold = 0.7\n").expect("write config");
        assert_eq!(load_config_from(&path).expect("valid config").matching.threshold, 0.7);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn agent_command_from_config() {
        let mut config = AgentConfig::default();
        // Unique env var name to avoid interfering with other tests
        config.command_env = "CONFTRACK_TEST_NONEXISTENT_AGENT_12345".into();
        let (program, args) = config.command_line();
        assert_eq!(program, "claude");
        assert_eq!(args, vec!["-p".to_string()]);
    }

    #[test]
    fn search_key_missing() {
        let mut config = SearchConfig::default();
        config.api_key_env = "CONFTRACK_TEST_NONEXISTENT_KEY_12345".into();
        assert!(config.api_key().is_none());
        config.endpoint_env = "CONFTRACK_TEST_NONEXISTENT_URL_12345".into();
        assert_eq!(config.resolved_endpoint(), config.endpoint);
    }
}
