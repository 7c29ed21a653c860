//! Typed access to the `kv` table.
//!
//! Values are JSON documents. Callers that touch several keys in one logical
//! update open a transaction and pass it here (a `Transaction` derefs to
//! `Connection`).

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;

pub const HEAP_KEY: &str = "heap";
pub const TRASH_KEY: &str = "trash";
pub const STORIES_KEY: &str = "stories";
pub const OVERLAYS_KEY: &str = "overlays";
pub const AGENTS_KEY: &str = "agents";
pub const STORY_PREFIX: &str = "story:";

/// Key holding the ordered items of one story.
pub fn story_key(story_id: &str) -> String {
    format!("{STORY_PREFIX}{story_id}")
}

/// Read the raw JSON text stored under `key`.
pub fn get_raw(conn: &Connection, key: &str) -> Result<Option<String>> {
    let value = conn
        .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
            row.get::<_, String>(0)
        })
        .optional()?;
    Ok(value)
}

/// Read and deserialize the value stored under `key`.
pub fn get_json<T: DeserializeOwned>(conn: &Connection, key: &str) -> Result<Option<T>> {
    match get_raw(conn, key)? {
        Some(text) => {
            let value = serde_json::from_str(&text)
                .with_context(|| format!("corrupt value under key `{key}`"))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

/// Like [`get_json`] but falls back to `T::default()` for a missing key.
pub fn get_or_default<T: DeserializeOwned + Default>(conn: &Connection, key: &str) -> Result<T> {
    Ok(get_json(conn, key)?.unwrap_or_default())
}

/// Serialize `value` and upsert it under `key`.
pub fn set_json<T: Serialize + ?Sized>(conn: &Connection, key: &str, value: &T) -> Result<()> {
    let text = serde_json::to_string(value)?;
    conn.execute(
        "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3) \
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        params![key, text, chrono::Utc::now().to_rfc3339()],
    )?;
    tracing::debug!(key, bytes = text.len(), "kv set");
    Ok(())
}

/// Delete `key`. Returns `true` if a row was removed.
pub fn delete_key(conn: &Connection, key: &str) -> Result<bool> {
    let removed = conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
    tracing::debug!(key, removed, "kv delete");
    Ok(removed > 0)
}

/// All keys beginning with `prefix`, sorted.
pub fn keys_with_prefix(conn: &Connection, prefix: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT key FROM kv WHERE substr(key, 1, ?2) = ?1 ORDER BY key")?;
    let keys = stmt
        .query_map(params![prefix, prefix.len() as i64], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(keys)
}

/// Remove every scrapbook collection (heap, trash, stories, story items,
/// overlays). Agent configuration is kept. Returns the number of keys removed.
pub fn clear_scrapbook(conn: &Connection) -> Result<usize> {
    let removed = conn.execute(
        "DELETE FROM kv WHERE key IN (?1, ?2, ?3, ?4) OR substr(key, 1, ?6) = ?5",
        params![
            HEAP_KEY,
            TRASH_KEY,
            STORIES_KEY,
            OVERLAYS_KEY,
            STORY_PREFIX,
            STORY_PREFIX.len() as i64
        ],
    )?;
    tracing::info!(removed, "scrapbook keys cleared");
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Connection {
        crate::db::open_memory_database().unwrap()
    }

    #[test]
    fn set_then_get_roundtrips_json() {
        let conn = test_db();
        set_json(&conn, "heap", &serde_json::json!([{"id": "a", "src": "a.gif"}])).unwrap();
        let value: serde_json::Value = get_json(&conn, "heap").unwrap().unwrap();
        assert_eq!(value[0]["src"], "a.gif");
    }

    #[test]
    fn set_overwrites_existing_value() {
        let conn = test_db();
        set_json(&conn, "k", &1).unwrap();
        set_json(&conn, "k", &2).unwrap();
        assert_eq!(get_json::<i32>(&conn, "k").unwrap(), Some(2));
    }

    #[test]
    fn missing_key_is_none_or_default() {
        let conn = test_db();
        assert!(get_json::<Vec<String>>(&conn, "nope").unwrap().is_none());
        assert!(get_or_default::<Vec<String>>(&conn, "nope").unwrap().is_empty());
    }

    #[test]
    fn corrupt_value_is_an_error() {
        let conn = test_db();
        conn.execute(
            "INSERT INTO kv (key, value, updated_at) VALUES ('heap', 'not json', 'now')",
            [],
        )
        .unwrap();
        assert!(get_json::<serde_json::Value>(&conn, "heap").is_err());
    }

    #[test]
    fn prefix_scan_and_clear_keep_agents() {
        let conn = test_db();
        set_json(&conn, HEAP_KEY, &Vec::<u8>::new()).unwrap();
        set_json(&conn, &story_key("s1"), &Vec::<u8>::new()).unwrap();
        set_json(&conn, &story_key("s2"), &Vec::<u8>::new()).unwrap();
        set_json(&conn, AGENTS_KEY, &Vec::<u8>::new()).unwrap();
        set_json(&conn, "storyteller", &0).unwrap();

        assert_eq!(keys_with_prefix(&conn, STORY_PREFIX).unwrap(), vec!["story:s1", "story:s2"]);

        assert_eq!(clear_scrapbook(&conn).unwrap(), 3);
        assert!(get_raw(&conn, AGENTS_KEY).unwrap().is_some());
        assert!(get_raw(&conn, "storyteller").unwrap().is_some());
        assert!(get_raw(&conn, HEAP_KEY).unwrap().is_none());
    }

    #[test]
    fn delete_reports_whether_key_existed() {
        let conn = test_db();
        set_json(&conn, "k", &true).unwrap();
        assert!(delete_key(&conn, "k").unwrap());
        assert!(!delete_key(&conn, "k").unwrap());
    }
}
