//! `Storage`: the embedded, single-writer, pooled-read persistence layer
//! (spec.md §4.1).

use crate::error::{Result, StorageError};
use crate::migrations;
use crate::pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::Value;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;

/// Row counts and WAL size, used by the CLI's `status` command.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StorageStats {
    pub table_rows: std::collections::BTreeMap<String, i64>,
    pub wal_bytes: u64,
}

const TABLES: &[&str] = &[
    "conversations",
    "short_term_memory",
    "long_term_memory",
    "extensions_registry",
    "telemetry_metrics",
    "telemetry_errors",
    "logs",
    "benchmarks",
    "personality_fragments",
    "personality_audit",
];

/// Embedded relational store. Reads go through a bounded `r2d2` pool with no
/// lock; every write statement serializes through one process-wide writer
/// connection (spec.md §4.1, §5 "Locking discipline").
#[derive(Clone)]
pub struct Storage {
    writer: Arc<AsyncMutex<Connection>>,
    read_pool: r2d2::Pool<SqliteConnectionManager>,
    path: PathBuf,
}

impl Storage {
    /// Opens (creating if absent) the database at `path`, applies every
    /// pending migration, and builds a read pool of `pool_size` connections.
    pub async fn new(path: &Path, pool_size: u32) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StorageError::Io(parent.to_path_buf(), e))?;
        }

        let mut writer = pool::open_writer(path)?;
        migrations::apply_pending(&mut writer)?;

        let read_pool = pool::build_read_pool(path, pool_size)?;

        Ok(Self {
            writer: Arc::new(AsyncMutex::new(writer)),
            read_pool,
            path: path.to_path_buf(),
        })
    }

    /// Execute one write statement under the process-wide write lock,
    /// returning the number of rows affected.
    pub async fn execute(&self, sql: &str, params: Vec<Value>) -> Result<usize> {
        let writer = self.writer.clone();
        let sql = sql.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = writer.blocking_lock();
            conn.execute(&sql, rusqlite::params_from_iter(params))
                .map_err(StorageError::from)
        })
        .await
        .map_err(|e| StorageError::Other(e.into()))?
    }

    /// Execute the same statement for many parameter rows inside a single
    /// transaction (spec.md §4.1 `executeMany`).
    pub async fn execute_many(&self, sql: &str, rows: Vec<Vec<Value>>) -> Result<usize> {
        let writer = self.writer.clone();
        let sql = sql.to_string();
        tokio::task::spawn_blocking(move || {
            let mut conn = writer.blocking_lock();
            let tx = conn.transaction()?;
            let mut affected = 0usize;
            {
                let mut stmt = tx.prepare(&sql)?;
                for row in rows {
                    affected += stmt.execute(rusqlite::params_from_iter(row))?;
                }
            }
            tx.commit()?;
            Ok(affected)
        })
        .await
        .map_err(|e| StorageError::Other(e.into()))?
    }

    /// Run `f` inside a write transaction under the process-wide writer
    /// lock, committing on `Ok` and rolling back (implicitly, via `Drop`)
    /// on `Err`.
    pub async fn transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&rusqlite::Transaction<'_>) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let writer = self.writer.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = writer.blocking_lock();
            let tx = conn.transaction()?;
            let result = f(&tx)?;
            tx.commit()?;
            Ok(result)
        })
        .await
        .map_err(|e| StorageError::Other(e.into()))?
    }

    /// Run a read query via the pooled connection, mapping each row with
    /// `mapper`.
    pub async fn fetch_all<T, F>(&self, sql: &str, params: Vec<Value>, mapper: F) -> Result<Vec<T>>
    where
        F: Fn(&rusqlite::Row<'_>) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.read_pool.clone();
        let sql = sql.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(params), |row| mapper(row))?
                .collect::<rusqlite::Result<Vec<T>>>()?;
            Ok(rows)
        })
        .await
        .map_err(|e| StorageError::Other(e.into()))?
    }

    /// As `fetch_all`, but returns only the first row (or `None`).
    pub async fn fetch_one<T, F>(
        &self,
        sql: &str,
        params: Vec<Value>,
        mapper: F,
    ) -> Result<Option<T>>
    where
        F: Fn(&rusqlite::Row<'_>) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let mut rows = self.fetch_all(sql, params, mapper).await?;
        Ok(if rows.is_empty() {
            None
        } else {
            Some(rows.remove(0))
        })
    }

    /// Insert a row built from `(column, value)` pairs, returning the
    /// number of affected rows (always 0 or 1).
    pub async fn insert(&self, table: &str, columns: Vec<(&str, Value)>) -> Result<usize> {
        let names: Vec<&str> = columns.iter().map(|(c, _)| *c).collect();
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "INSERT INTO {table} ({}) VALUES ({})",
            names.join(", "),
            placeholders.join(", ")
        );
        let params: Vec<Value> = columns.into_iter().map(|(_, v)| v).collect();
        self.execute(&sql, params).await
    }

    /// Update rows matching `where_clause` (a raw SQL fragment using `?N`
    /// placeholders continuing after the SET clause's own placeholders).
    pub async fn update(
        &self,
        table: &str,
        set: Vec<(&str, Value)>,
        where_clause: &str,
        where_params: Vec<Value>,
    ) -> Result<usize> {
        let assignments: Vec<String> = set
            .iter()
            .enumerate()
            .map(|(i, (col, _))| format!("{col} = ?{}", i + 1))
            .collect();
        let sql = format!("UPDATE {table} SET {} WHERE {where_clause}", assignments.join(", "));
        let mut params: Vec<Value> = set.into_iter().map(|(_, v)| v).collect();
        params.extend(where_params);
        self.execute(&sql, params).await
    }

    /// Delete rows matching `where_clause`.
    pub async fn delete(
        &self,
        table: &str,
        where_clause: &str,
        where_params: Vec<Value>,
    ) -> Result<usize> {
        let sql = format!("DELETE FROM {table} WHERE {where_clause}");
        self.execute(&sql, where_params).await
    }

    /// Best-effort `VACUUM` (spec.md §4.1 failure semantics).
    pub async fn vacuum(&self) -> Result<()> {
        let writer = self.writer.clone();
        let result = tokio::task::spawn_blocking(move || {
            let conn = writer.blocking_lock();
            conn.execute_batch("VACUUM")
        })
        .await;
        if let Err(e) = result {
            tracing::warn!(error = %e, "vacuum task panicked");
        } else if let Ok(Err(e)) = result {
            tracing::warn!(error = %e, "vacuum failed (best-effort, ignored)");
        }
        Ok(())
    }

    /// Row counts per table plus the on-disk WAL file size.
    pub async fn stats(&self) -> Result<StorageStats> {
        let pool = self.read_pool.clone();
        let mut table_rows = std::collections::BTreeMap::new();
        for table in TABLES {
            let pool = pool.clone();
            let table = (*table).to_string();
            let count: i64 = tokio::task::spawn_blocking(move || {
                let conn = pool.get()?;
                conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))
                    .map_err(StorageError::from)
            })
            .await
            .map_err(|e| StorageError::Other(e.into()))??;
            table_rows.insert(table.clone(), count);
        }

        let wal_path = self.wal_path();
        let wal_bytes = std::fs::metadata(&wal_path).map(|m| m.len()).unwrap_or(0);

        Ok(StorageStats {
            table_rows,
            wal_bytes,
        })
    }

    fn wal_path(&self) -> PathBuf {
        let mut p = self.path.clone();
        let name = format!(
            "{}-wal",
            p.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default()
        );
        p.set_file_name(name);
        p
    }
}
