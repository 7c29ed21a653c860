//! Caption overlays, keyed by moment id and stored together under `overlays`.

use std::collections::BTreeMap;

use anyhow::{bail, Result};
use rusqlite::Connection;

use super::types::Overlay;
use super::ScrapbookError;
use crate::store::{self, OVERLAYS_KEY};

pub type OverlayMap = BTreeMap<String, Overlay>;

pub fn list_overlays(conn: &Connection) -> Result<OverlayMap> {
    store::get_or_default(conn, OVERLAYS_KEY)
}

pub fn set_overlay(conn: &Connection, moment_id: &str, overlay: Overlay) -> Result<()> {
    if overlay.text.trim().is_empty() {
        bail!(ScrapbookError::Invalid("overlay text must not be empty".into()));
    }
    let mut overlays = list_overlays(conn)?;
    overlays.insert(moment_id.to_string(), overlay);
    store::set_json(conn, OVERLAYS_KEY, &overlays)
}

/// Remove the overlay of one moment. Returns `false` if it had none.
pub fn clear_overlay(conn: &Connection, moment_id: &str) -> Result<bool> {
    let removed = drop_overlays(conn, &[moment_id.to_string()])?;
    Ok(removed > 0)
}

pub(crate) fn drop_overlays(conn: &Connection, moment_ids: &[String]) -> Result<usize> {
    let mut overlays = list_overlays(conn)?;
    let before = overlays.len();
    for id in moment_ids {
        overlays.remove(id);
    }
    let removed = before - overlays.len();
    if removed > 0 {
        store::set_json(conn, OVERLAYS_KEY, &overlays)?;
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caption(text: &str) -> Overlay {
        Overlay {
            text: text.into(),
            position: Some("bottom".into()),
            color: None,
        }
    }

    #[test]
    fn set_replaces_and_clear_removes() {
        let conn = crate::db::open_memory_database().unwrap();
        set_overlay(&conn, "m1", caption("first")).unwrap();
        set_overlay(&conn, "m1", caption("second")).unwrap();

        let overlays = list_overlays(&conn).unwrap();
        assert_eq!(overlays.len(), 1);
        assert_eq!(overlays["m1"].text, "second");

        assert!(clear_overlay(&conn, "m1").unwrap());
        assert!(!clear_overlay(&conn, "m1").unwrap());
    }

    #[test]
    fn blank_text_is_rejected() {
        let conn = crate::db::open_memory_database().unwrap();
        assert!(set_overlay(&conn, "m1", caption(" ")).is_err());
    }
}
