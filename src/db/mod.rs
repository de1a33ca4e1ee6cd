//! Global SQLite connection for the Analysis History store.
//!
//! Mirrors the single-connection-singleton shape used throughout this crate: one
//! `rusqlite::Connection` behind a `Mutex`, opened once during application setup and
//! borrowed for the duration of each query.

use anyhow::Result;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;

pub static DB: once_cell::sync::Lazy<Mutex<Option<Connection>>> =
    once_cell::sync::Lazy::new(|| Mutex::new(None));

pub fn init_database(path: &Path) -> Result<()> {
    let conn = Connection::open(path)?;

    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS analyses (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp TEXT NOT NULL,
            total_value REAL NOT NULL,
            total_positions INTEGER NOT NULL,
            etf_count INTEGER NOT NULL,
            stock_count INTEGER NOT NULL,
            risk_data TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_analyses_timestamp ON analyses(timestamp);
        "#,
    )?;

    *DB.lock()
        .map_err(|e| anyhow::anyhow!("failed to lock database during init: {e}"))? = Some(conn);

    log::info!("Analysis history database initialised at {}", path.display());
    Ok(())
}

pub fn get_connection() -> Result<std::sync::MutexGuard<'static, Option<Connection>>> {
    Ok(DB
        .lock()
        .map_err(|e| anyhow::anyhow!("failed to lock database: {e}"))?)
}
