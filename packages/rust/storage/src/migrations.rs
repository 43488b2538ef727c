//! SQL migration definitions for the lookup cache database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            description: "Initial schema: search_cache",
            sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Search-provider responses keyed by query hash
CREATE TABLE IF NOT EXISTS search_cache (
    key        TEXT PRIMARY KEY,
    query      TEXT NOT NULL,
    payload    TEXT NOT NULL,
    created_at TEXT NOT NULL
);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
        },
        Migration {
            version: 2,
            description: "Index search_cache by age for expiry sweeps",
            sql: r#"
CREATE INDEX IF NOT EXISTS idx_search_cache_created ON search_cache(created_at);

INSERT INTO schema_migrations (version) VALUES (2);
"#,
        },
    ]
}
