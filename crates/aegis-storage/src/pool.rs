//! Connection setup: WAL mode, busy timeout, normal sync (spec.md §4.1).

use crate::error::{Result, StorageError};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use std::path::Path;

/// Apply the three PRAGMAs spec.md §4.1 requires to a fresh connection:
/// write-ahead logging, a >=5s busy-timeout retry, and NORMAL synchronous
/// mode (not FULL -- WAL already protects against corruption on crash, so
/// FULL would only cost fsyncs without buying additional durability).
pub(crate) fn configure_connection(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "busy_timeout", 5_000i64)?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    Ok(())
}

pub(crate) fn open_writer(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    configure_connection(&conn)?;
    Ok(conn)
}

pub(crate) fn build_read_pool(
    path: &Path,
    pool_size: u32,
) -> Result<r2d2::Pool<SqliteConnectionManager>> {
    let manager = SqliteConnectionManager::file(path).with_init(|conn| {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "busy_timeout", 5_000i64)?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Ok(())
    });
    r2d2::Pool::builder()
        .max_size(pool_size)
        .build(manager)
        .map_err(StorageError::from)
}
