//! JSON catalog file and the auxiliary run artefacts written next to it.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use conftrack_shared::{Catalog, ConfTrackError, Result};

// ---------------------------------------------------------------------------
// CatalogStore
// ---------------------------------------------------------------------------

/// The persisted catalog: one indented JSON array, rewritten wholesale.
#[derive(Debug, Clone)]
pub struct CatalogStore {
    path: PathBuf,
}

impl CatalogStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the catalog. A missing file is an empty catalog; anything else
    /// that goes wrong is fatal to the caller.
    pub fn load(&self) -> Result<Catalog> {
        if !self.path.exists() {
            info!(path = %self.path.display(), "catalog not found, starting empty");
            return Ok(Catalog::default());
        }

        let raw =
            std::fs::read_to_string(&self.path).map_err(|e| ConfTrackError::io(&self.path, e))?;
        let catalog: Catalog = serde_json::from_str(&raw).map_err(|e| {
            ConfTrackError::parse(format!("catalog {}: {e}", self.path.display()))
        })?;

        info!(path = %self.path.display(), records = catalog.len(), "catalog loaded");
        Ok(catalog)
    }

    /// Renumber ids and rewrite the whole file.
    pub fn save(&self, catalog: &mut Catalog) -> Result<()> {
        catalog.renumber();
        write_json(&self.path, catalog)?;
        info!(path = %self.path.display(), records = catalog.len(), "catalog saved");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// OutputLayout
// ---------------------------------------------------------------------------

/// Paths of the auxiliary files produced by a run.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `raw/<source>.json`: one scrape output per source.
    pub fn raw_path(&self, source: &str) -> PathBuf {
        self.root.join("raw").join(format!("{}.json", file_stem(source)))
    }

    /// Escalation queue for records still missing a start date.
    pub fn needs_agent_path(&self) -> PathBuf {
        self.root.join("needs_agent.json")
    }

    pub fn audit_path(&self) -> PathBuf {
        self.root.join("enrichment_audit.json")
    }

    /// Raw agent reply kept when it could not be parsed.
    pub fn agent_reply_path(&self) -> PathBuf {
        self.root.join("agent_reply.txt")
    }

    pub fn removed_path(&self) -> PathBuf {
        self.root.join("removed.json")
    }
}

fn file_stem(source: &str) -> String {
    source
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

// ---------------------------------------------------------------------------
// File helpers
// ---------------------------------------------------------------------------

/// Write `value` as indented JSON, creating parent directories.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| ConfTrackError::Conversion(e.to_string()))?;
    write_text(path, &json)
}

/// Write `text`, creating parent directories.
pub fn write_text(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfTrackError::io(parent, e))?;
    }
    std::fs::write(path, text).map_err(|e| ConfTrackError::io(path, e))?;
    debug!(path = %path.display(), bytes = text.len(), "wrote file");
    Ok(())
}

/// Extend the JSON array at `path` with `items`. A missing or unreadable
/// file starts a new array.
pub fn append_json_array<T: Serialize>(path: &Path, items: &[T]) -> Result<()> {
    let mut all: Vec<serde_json::Value> = match std::fs::read_to_string(path) {
        Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "existing array unreadable, replacing");
            Vec::new()
        }),
        Err(_) => Vec::new(),
    };
    for item in items {
        all.push(serde_json::to_value(item).map_err(|e| ConfTrackError::Conversion(e.to_string()))?);
    }
    write_json(path, &all)
}

#[cfg(test)]
mod tests {
    use super::*;
    use conftrack_shared::ConferenceRecord;
    use uuid::Uuid;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("conftrack_store_{}", Uuid::now_v7()))
    }

    fn record(id: u64, name: &str) -> ConferenceRecord {
        ConferenceRecord {
            id,
            name: name.into(),
            ..Default::default()
        }
    }

    #[test]
    fn missing_catalog_is_empty() {
        let store = CatalogStore::new(temp_dir().join("conferences.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn save_renumbers_and_round_trips() {
        let store = CatalogStore::new(temp_dir().join("nested").join("conferences.json"));
        let mut catalog = Catalog::new(vec![record(10, "A Conference"), record(4, "B Symposium")]);
        store.save(&mut catalog).unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.starts_with("[\n"));

        let loaded = store.load().unwrap();
        let ids: Vec<u64> = loaded.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(loaded.get(1).unwrap().name, "B Symposium");
    }

    #[test]
    fn malformed_catalog_is_an_error() {
        let dir = temp_dir();
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("conferences.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = CatalogStore::new(&path).load().unwrap_err();
        assert!(matches!(err, ConfTrackError::Parse { .. }));
    }

    #[test]
    fn layout_paths() {
        let layout = OutputLayout::new("/tmp/out");
        assert_eq!(layout.raw_path("ssrn-fen"), PathBuf::from("/tmp/out/raw/ssrn-fen.json"));
        assert_eq!(layout.raw_path("a/b c"), PathBuf::from("/tmp/out/raw/a_b_c.json"));
        assert!(layout.audit_path().ends_with("enrichment_audit.json"));
    }

    #[test]
    fn append_extends_existing_array() {
        let path = temp_dir().join("audit.json");
        append_json_array(&path, &[record(1, "first")]).unwrap();
        append_json_array(&path, &[record(2, "second"), record(3, "third")]).unwrap();

        let all: Vec<ConferenceRecord> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[2].name, "third");
    }
}
