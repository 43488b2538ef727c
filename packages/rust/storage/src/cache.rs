//! libSQL-backed lookup cache for search-provider responses.

use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use libsql::{Connection, Database, params};

use conftrack_shared::{ConfTrackError, Result};

use crate::migrations;

/// Key/value cache with per-entry timestamps; expiry is checked on read.
pub struct LookupCache {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

impl LookupCache {
    /// Open or create the cache database at `path`.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfTrackError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| ConfTrackError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| ConfTrackError::Storage(e.to_string()))?;

        let cache = Self { db, conn };
        cache.run_migrations().await?;
        Ok(cache)
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    ConfTrackError::Storage(format!("migration v{} failed: {e}", migration.version))
                })?;
            }
        }
        Ok(())
    }

    /// Current schema version, or 0 before the first migration.
    async fn schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => match rows.next().await {
                Ok(Some(row)) => row.get::<u32>(0).unwrap_or(0),
                _ => 0,
            },
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Cached payload for `key` if it is younger than `max_age`.
    pub async fn get(&self, key: &str, max_age: Duration) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query(
                "SELECT payload, created_at FROM search_cache WHERE key = ?1",
                params![key],
            )
            .await
            .map_err(|e| ConfTrackError::Storage(e.to_string()))?;

        let row = match rows.next().await {
            Ok(Some(row)) => row,
            Ok(None) => return Ok(None),
            Err(e) => return Err(ConfTrackError::Storage(e.to_string())),
        };

        let payload: String = row
            .get(0)
            .map_err(|e| ConfTrackError::Storage(e.to_string()))?;
        let created_at: String = row
            .get(1)
            .map_err(|e| ConfTrackError::Storage(e.to_string()))?;

        let fresh = DateTime::parse_from_rfc3339(&created_at)
            .map(|t| Utc::now() - t.with_timezone(&Utc) <= max_age)
            .unwrap_or(false);

        Ok(fresh.then_some(payload))
    }

    /// Store (or replace) the payload for `key`.
    pub async fn put(&self, key: &str, query: &str, payload: &str) -> Result<()> {
        self.put_at(key, query, payload, Utc::now()).await
    }

    pub(crate) async fn put_at(
        &self,
        key: &str,
        query: &str,
        payload: &str,
        created_at: DateTime<Utc>,
    ) -> Result<()> {
        let created_at = created_at.to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO search_cache (key, query, payload, created_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(key) DO UPDATE SET
                   query = excluded.query,
                   payload = excluded.payload,
                   created_at = excluded.created_at",
                params![key, query, payload, created_at.as_str()],
            )
            .await
            .map_err(|e| ConfTrackError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Delete entries older than `max_age`. Returns the number removed.
    pub async fn purge_expired(&self, max_age: Duration) -> Result<u64> {
        let cutoff = (Utc::now() - max_age).to_rfc3339();
        let removed = self
            .conn
            .execute(
                "DELETE FROM search_cache WHERE created_at < ?1",
                params![cutoff.as_str()],
            )
            .await
            .map_err(|e| ConfTrackError::Storage(e.to_string()))?;
        Ok(removed)
    }
}
