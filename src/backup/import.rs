//! Best-effort backup import.
//!
//! Accepts the current format, the older `moments` spelling, and the legacy
//! bare array of moments. Entries that cannot be read as a moment are skipped;
//! a document with no recognisable collection at all is rejected.

use std::collections::HashSet;

use anyhow::Result;
use rusqlite::Connection;
use serde::Serialize;
use serde_json::{Map, Value};

use super::{Backup, BackupError, StoryBackup, BACKUP_VERSION};
use crate::scrapbook::overlays::OverlayMap;
use crate::scrapbook::types::{Moment, Overlay, StoryMeta};
use crate::store::{self, HEAP_KEY, OVERLAYS_KEY, STORIES_KEY, TRASH_KEY};

/// What an import wrote.
#[derive(Debug, Default, PartialEq, Serialize)]
pub struct ImportReport {
    pub heap: usize,
    pub trash: usize,
    pub stories: usize,
    pub story_moments: usize,
    pub overlays: usize,
}

/// Parse a backup document of any supported shape.
pub fn parse_backup(text: &str) -> Result<Backup, BackupError> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| BackupError::invalid(format!("not JSON: {e}")))?;

    match value {
        Value::Array(items) => Ok(Backup {
            version: BACKUP_VERSION,
            heap: moments_from(&items),
            ..Default::default()
        }),
        Value::Object(map) => parse_structured(&map),
        other => Err(BackupError::invalid(format!(
            "expected an object or array, found {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn parse_structured(map: &Map<String, Value>) -> Result<Backup, BackupError> {
    let heap_key = if map.contains_key("heap") { "heap" } else { "moments" };
    let heap = array_at(map, heap_key)?;
    let trash = array_at(map, "trash")?;
    let story_entries = array_at(map, "stories")?;
    if heap.is_none() && trash.is_none() && story_entries.is_none() {
        return Err(BackupError::invalid("no heap, moments, trash or stories key"));
    }
    let overlays = match map.get("overlays") {
        None => None,
        Some(Value::Object(entries)) => Some(entries),
        Some(other) => {
            return Err(BackupError::invalid(format!(
                "overlays must be an object, found {}",
                json_kind(other)
            )))
        }
    };

    let mut seen = HashSet::new();
    let stories = story_entries
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| story_from(entry, &mut seen))
                .collect()
        })
        .unwrap_or_default();

    Ok(Backup {
        version: BACKUP_VERSION,
        exported_at: map
            .get("exportedAt")
            .and_then(Value::as_str)
            .map(str::to_string),
        heap: heap.map(|items| moments_from(items)).unwrap_or_default(),
        trash: trash.map(|items| moments_from(items)).unwrap_or_default(),
        stories,
        overlays: overlays.map(overlays_from).unwrap_or_default(),
    })
}

/// A collection key that is present must hold an array; restoring a
/// mistyped value as empty would wipe that collection.
fn array_at<'a>(
    map: &'a Map<String, Value>,
    key: &str,
) -> Result<Option<&'a Vec<Value>>, BackupError> {
    match map.get(key) {
        None => Ok(None),
        Some(Value::Array(items)) => Ok(Some(items)),
        Some(other) => Err(BackupError::invalid(format!(
            "{key} must be an array, found {}",
            json_kind(other)
        ))),
    }
}

fn id_from(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn moment_from(value: &Value) -> Option<Moment> {
    match value {
        Value::String(src) if !src.trim().is_empty() => Some(Moment::new(src.clone(), None)),
        Value::Object(obj) => {
            let src = obj.get("src").and_then(Value::as_str)?;
            if src.trim().is_empty() {
                return None;
            }
            let name = obj.get("name").and_then(Value::as_str).map(str::to_string);
            let mut moment = Moment::new(src, name);
            if let Some(id) = id_from(obj.get("id")) {
                moment.id = id;
            }
            Some(moment)
        }
        _ => None,
    }
}

fn moments_from(items: &[Value]) -> Vec<Moment> {
    let moments: Vec<Moment> = items.iter().filter_map(moment_from).collect();
    if moments.len() < items.len() {
        tracing::warn!(
            skipped = items.len() - moments.len(),
            "skipped unreadable moments in backup"
        );
    }
    moments
}

fn story_from(value: &Value, seen: &mut HashSet<String>) -> Option<StoryBackup> {
    let obj = value.as_object()?;
    let id = id_from(obj.get("id"))
        .filter(|id| !seen.contains(id))
        .unwrap_or_else(|| uuid::Uuid::now_v7().to_string());
    seen.insert(id.clone());

    let items = match obj.get("items") {
        Some(Value::Array(items)) => moments_from(items),
        _ => Vec::new(),
    };
    let title = obj
        .get("title")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string);

    Some(StoryBackup {
        id,
        title,
        count: items.len(),
        items,
    })
}

fn overlays_from(map: &Map<String, Value>) -> OverlayMap {
    map.iter()
        .filter_map(|(id, v)| {
            let overlay = match v {
                Value::String(text) => Overlay {
                    text: text.clone(),
                    position: None,
                    color: None,
                },
                other => serde_json::from_value::<Overlay>(other.clone()).ok()?,
            };
            (!overlay.text.trim().is_empty()).then(|| (id.clone(), overlay))
        })
        .collect()
}

/// Replace the scrapbook with `backup`. Agent configuration is left alone.
pub fn restore_backup(conn: &mut Connection, backup: &Backup) -> Result<ImportReport> {
    let tx = conn.transaction()?;
    store::clear_scrapbook(&tx)?;

    store::set_json(&tx, HEAP_KEY, &backup.heap)?;
    store::set_json(&tx, TRASH_KEY, &backup.trash)?;

    let mut metas = Vec::with_capacity(backup.stories.len());
    let mut story_moments = 0;
    for story in &backup.stories {
        store::set_json(&tx, &store::story_key(&story.id), &story.items)?;
        story_moments += story.items.len();
        metas.push(StoryMeta {
            id: story.id.clone(),
            title: story.title.clone(),
            count: Some(story.items.len()),
        });
    }
    store::set_json(&tx, STORIES_KEY, &metas)?;
    store::set_json(&tx, OVERLAYS_KEY, &backup.overlays)?;

    tx.commit()?;

    let report = ImportReport {
        heap: backup.heap.len(),
        trash: backup.trash.len(),
        stories: metas.len(),
        story_moments,
        overlays: backup.overlays.len(),
    };
    tracing::info!(?report, "backup imported");
    Ok(report)
}

/// Parse `text` and replace the scrapbook with it. Nothing is written when the
/// document is invalid.
pub fn import_backup(conn: &mut Connection, text: &str) -> Result<ImportReport> {
    let backup = parse_backup(text).map_err(|e| {
        let BackupError::Invalid { reason } = &e;
        tracing::warn!(%reason, "rejected backup file");
        e
    })?;
    restore_backup(conn, &backup)
}
