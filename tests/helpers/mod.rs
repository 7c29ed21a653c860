#![allow(dead_code)]

use matrix::db;
use matrix::scrapbook::heap;
use matrix::scrapbook::types::NewMoment;
use rusqlite::Connection;

/// Open a fresh in-memory database with schema and migrations applied.
pub fn test_db() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    db::schema::init_schema(&conn).unwrap();
    db::migrations::run_migrations(&conn).unwrap();
    conn
}

/// A moment input with a predictable src.
pub fn new_moment(name: &str) -> NewMoment {
    NewMoment {
        src: format!("https://example.com/{name}.gif"),
        name: Some(name.to_string()),
    }
}

/// Add moments named `names` to the heap. Returns their ids in order.
pub fn seed_heap(conn: &Connection, names: &[&str]) -> Vec<String> {
    heap::add_to_heap(conn, names.iter().map(|n| new_moment(n)).collect())
        .unwrap()
        .into_iter()
        .map(|m| m.id)
        .collect()
}

/// Raw JSON stored under `key`, parsed.
pub fn raw_json(conn: &Connection, key: &str) -> Option<serde_json::Value> {
    matrix::store::get_raw(conn, key)
        .unwrap()
        .map(|s| serde_json::from_str(&s).unwrap())
}
