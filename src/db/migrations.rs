//! Forward-only schema migration framework.
//!
//! Tracks the schema version in `schema_meta` and runs sequential migrations
//! to bring the database up to [`CURRENT_SCHEMA_VERSION`].

use rusqlite::{params, Connection};

/// The schema version that the current binary expects.
pub const CURRENT_SCHEMA_VERSION: u32 = 2;

/// Get the current schema version from the database.
pub fn get_schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    conn.query_row(
        "SELECT value FROM schema_meta WHERE key = 'schema_version'",
        [],
        |row| {
            let val: String = row.get(0)?;
            Ok(val.parse::<u32>().unwrap_or(0))
        },
    )
}

fn update_schema_version(conn: &Connection, version: u32) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE schema_meta SET value = ?1 WHERE key = 'schema_version'",
        [version.to_string()],
    )?;
    Ok(())
}

/// Run any pending forward-only migrations. Each migration runs in a transaction.
pub fn run_migrations(conn: &Connection) -> rusqlite::Result<()> {
    let mut version = get_schema_version(conn)?;
    tracing::debug!(schema_version = version, target = CURRENT_SCHEMA_VERSION, "checking migrations");

    while version < CURRENT_SCHEMA_VERSION {
        let next = version + 1;
        tracing::info!(from = version, to = next, "running migration");

        let tx = conn.unchecked_transaction()?;
        match next {
            2 => migrate_v1_to_v2(&tx)?,
            _ => {
                tracing::error!(version = next, "unknown migration target");
                break;
            }
        }
        update_schema_version(&tx, next)?;
        tx.commit()?;

        version = next;
    }

    Ok(())
}

/// Migration v1 → v2: early builds kept the heap under `moments`. Move it to
/// `heap` unless a `heap` key already exists, in which case `heap` wins and the
/// legacy key is dropped.
fn migrate_v1_to_v2(conn: &Connection) -> rusqlite::Result<()> {
    let heap_exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM kv WHERE key = 'heap'",
        [],
        |row| row.get(0),
    )?;
    if heap_exists {
        let dropped = conn.execute("DELETE FROM kv WHERE key = 'moments'", [])?;
        if dropped > 0 {
            tracing::warn!("dropped legacy `moments` key shadowed by `heap`");
        }
        return Ok(());
    }

    let moved = conn.execute(
        "UPDATE kv SET key = 'heap', updated_at = ?1 WHERE key = 'moments'",
        params![chrono::Utc::now().to_rfc3339()],
    )?;
    if moved > 0 {
        tracing::info!("renamed legacy `moments` key to `heap`");
    }
    Ok(())
}
