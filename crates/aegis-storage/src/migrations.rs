//! Embedded forward-only schema migrations (spec.md §4.1).
//!
//! Migrations are plain DDL scripts keyed by version. `apply_pending` runs
//! every migration with `version > max(applied_version)` in ascending
//! order, each inside its own transaction, recording the version atomically
//! -- mirroring `_run_migrations()` in the original `database/connection.py`.

use crate::error::{Result, StorageError};
use rusqlite::Connection;
use std::collections::BTreeMap;

/// v1: the tables needed for the core data model (spec.md §3), with the
/// indexes spec.md §4.1 requires.
const V1_INITIAL: &str = r#"
CREATE TABLE IF NOT EXISTS conversations (
    id TEXT PRIMARY KEY,
    session_id TEXT NOT NULL,
    user_input TEXT NOT NULL,
    assistant_response TEXT NOT NULL,
    model_used TEXT NOT NULL,
    duration_ms REAL NOT NULL,
    intent TEXT NOT NULL,
    metadata TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_conversations_session_id ON conversations(session_id);

CREATE TABLE IF NOT EXISTS short_term_memory (
    id TEXT PRIMARY KEY,
    session_id TEXT NOT NULL,
    role TEXT NOT NULL,
    content TEXT NOT NULL,
    metadata TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL,
    expires_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_short_term_session_id ON short_term_memory(session_id);

CREATE TABLE IF NOT EXISTS long_term_memory (
    id TEXT PRIMARY KEY,
    content TEXT NOT NULL,
    category TEXT,
    importance INTEGER NOT NULL DEFAULT 5,
    embedding BLOB,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    access_count INTEGER NOT NULL DEFAULT 0,
    last_accessed TEXT,
    metadata TEXT NOT NULL DEFAULT '{}'
);
CREATE INDEX IF NOT EXISTS idx_long_term_category ON long_term_memory(category);
CREATE INDEX IF NOT EXISTS idx_long_term_importance ON long_term_memory(importance);

CREATE TABLE IF NOT EXISTS extensions_registry (
    name TEXT PRIMARY KEY,
    enabled INTEGER NOT NULL DEFAULT 1,
    metadata TEXT NOT NULL DEFAULT '{}',
    registered_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS telemetry_metrics (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    metric_name TEXT NOT NULL,
    value REAL NOT NULL,
    kind TEXT NOT NULL,
    tags TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_telemetry_metrics_created_at ON telemetry_metrics(created_at);

CREATE TABLE IF NOT EXISTS telemetry_errors (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    category TEXT NOT NULL,
    code TEXT NOT NULL,
    message TEXT NOT NULL,
    recoverable INTEGER NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_telemetry_errors_created_at ON telemetry_errors(created_at);

CREATE TABLE IF NOT EXISTS logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    level TEXT NOT NULL,
    message TEXT NOT NULL,
    fields TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_logs_created_at ON logs(created_at);

CREATE TABLE IF NOT EXISTS benchmarks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    duration_ms REAL NOT NULL,
    metadata TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL
);
"#;

/// v2: personality fragments + their append-only audit log (spec.md §3, §4.8).
const V2_PERSONALITY: &str = r#"
CREATE TABLE IF NOT EXISTS personality_fragments (
    id TEXT PRIMARY KEY,
    content TEXT NOT NULL,
    kind TEXT NOT NULL,
    category TEXT,
    confidence REAL NOT NULL,
    status TEXT NOT NULL,
    source TEXT,
    version INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    approved_at TEXT,
    metadata TEXT NOT NULL DEFAULT '{}'
);
CREATE INDEX IF NOT EXISTS idx_personality_status ON personality_fragments(status);
CREATE INDEX IF NOT EXISTS idx_personality_kind ON personality_fragments(kind);
CREATE INDEX IF NOT EXISTS idx_personality_category ON personality_fragments(category);
CREATE INDEX IF NOT EXISTS idx_personality_confidence ON personality_fragments(confidence);

CREATE TABLE IF NOT EXISTS personality_audit (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    fragment_id TEXT NOT NULL,
    action TEXT NOT NULL,
    old_content TEXT,
    new_content TEXT,
    old_status TEXT,
    new_status TEXT,
    confidence REAL,
    reason TEXT,
    metadata TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_personality_audit_fragment_id ON personality_audit(fragment_id);
CREATE INDEX IF NOT EXISTS idx_personality_audit_created_at ON personality_audit(created_at);
"#;

/// The full, ordered set of migrations. `BTreeMap` keeps them sorted by
/// version so `apply_pending` can walk them in ascending order.
fn all_migrations() -> BTreeMap<u32, &'static str> {
    let mut m = BTreeMap::new();
    m.insert(1, V1_INITIAL);
    m.insert(2, V2_PERSONALITY);
    m
}

/// Apply every migration with `version > current_version`, each inside its
/// own transaction, recording the applied version atomically in the same
/// transaction as the DDL it guards.
pub fn apply_pending(conn: &mut Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        )",
    )?;

    let current_version: u32 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |row| {
            row.get(0)
        })
        .unwrap_or(0);

    for (version, ddl) in all_migrations().range((current_version + 1)..=u32::MAX) {
        let tx = conn.transaction().map_err(|e| StorageError::Migration {
            version: *version,
            source: e,
        })?;
        tx.execute_batch(ddl).map_err(|e| StorageError::Migration {
            version: *version,
            source: e,
        })?;
        tx.execute(
            "INSERT INTO schema_version (version, applied_at) VALUES (?1, ?2)",
            rusqlite::params![version, chrono::Utc::now().to_rfc3339()],
        )
        .map_err(|e| StorageError::Migration {
            version: *version,
            source: e,
        })?;
        tx.commit().map_err(|e| StorageError::Migration {
            version: *version,
            source: e,
        })?;
        tracing::info!(version, "applied storage migration");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applies_all_migrations_in_order_and_is_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        apply_pending(&mut conn).unwrap();
        apply_pending(&mut conn).unwrap();

        let version: u32 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(version, 2);

        // Tables from both migrations must exist.
        conn.query_row("SELECT COUNT(*) FROM conversations", [], |r| r.get::<_, i64>(0))
            .unwrap();
        conn.query_row("SELECT COUNT(*) FROM personality_fragments", [], |r| {
            r.get::<_, i64>(0)
        })
        .unwrap();
    }
}
