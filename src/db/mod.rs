pub mod migrations;
pub mod schema;

use anyhow::{Context, Result};
use rusqlite::Connection;
use serde::Serialize;
use std::path::Path;

/// Open (or create) the Matrix database at the given path with the schema
/// initialized and migrations applied.
pub fn open_database(path: impl AsRef<Path>) -> Result<Connection> {
    let path = path.as_ref();

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }

    let conn = Connection::open(path)
        .with_context(|| format!("failed to open database at {}", path.display()))?;

    // WAL lets the CLI read while the server writes
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.busy_timeout(std::time::Duration::from_millis(5000))?;

    schema::init_schema(&conn).context("failed to initialize schema")?;
    migrations::run_migrations(&conn).context("failed to run migrations")?;

    tracing::info!(path = %path.display(), "database initialized");
    Ok(conn)
}

/// Open an in-memory database with schema and migrations applied.
pub fn open_memory_database() -> Result<Connection> {
    let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
    schema::init_schema(&conn).context("failed to initialize schema")?;
    migrations::run_migrations(&conn).context("failed to run migrations")?;
    Ok(conn)
}

/// Result of [`check_database_health`].
#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub integrity_ok: bool,
    pub integrity_details: String,
    pub schema_version: u32,
    pub key_count: u64,
    pub story_key_count: u64,
}

/// Run `PRAGMA integrity_check` and collect basic row counts.
pub fn check_database_health(conn: &Connection) -> Result<HealthReport> {
    let integrity: String = conn
        .query_row("PRAGMA integrity_check", [], |row| row.get(0))
        .context("integrity check failed to run")?;
    let schema_version = migrations::get_schema_version(conn)?;
    let key_count: i64 = conn.query_row("SELECT COUNT(*) FROM kv", [], |row| row.get(0))?;
    let story_key_count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM kv WHERE key LIKE 'story:%'",
        [],
        |row| row.get(0),
    )?;

    Ok(HealthReport {
        integrity_ok: integrity == "ok",
        integrity_details: integrity,
        schema_version,
        key_count: key_count as u64,
        story_key_count: story_key_count as u64,
    })
}
