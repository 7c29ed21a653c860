use anyhow::Result;
use rusqlite::Connection;
use serde_json::{json, Value};

use super::{remove_src, Backup, StoryBackup, BACKUP_VERSION};
use crate::scrapbook::types::Moment;
use crate::scrapbook::{heap, overlays, stories, trash};
use crate::store;

/// Collect every collection into one [`Backup`].
pub fn export_snapshot(conn: &Connection) -> Result<Backup> {
    let mut story_backups = Vec::new();
    for meta in stories::list_stories(conn)? {
        let items: Vec<Moment> = store::get_or_default(conn, &store::story_key(&meta.id))?;
        story_backups.push(StoryBackup {
            id: meta.id,
            title: meta.title,
            count: items.len(),
            items,
        });
    }

    Ok(Backup {
        version: BACKUP_VERSION,
        exported_at: Some(chrono::Utc::now().to_rfc3339()),
        heap: heap::list_heap(conn)?,
        trash: trash::list_trash(conn)?,
        stories: story_backups,
        overlays: overlays::list_overlays(conn)?,
    })
}

/// Pretty-printed backup document.
///
/// If the full document cannot be serialized, a summary without any `src`
/// payloads is returned instead so the user still gets their structure.
pub fn export_json(conn: &Connection) -> Result<String> {
    render_backup(&export_snapshot(conn)?)
}

/// Pretty-print an already taken snapshot, with the same fallback as
/// [`export_json`].
pub fn render_backup(backup: &Backup) -> Result<String> {
    match serde_json::to_string_pretty(backup) {
        Ok(json) => Ok(json),
        Err(e) => {
            tracing::warn!(error = %e, "full export failed, writing sanitized summary");
            Ok(serde_json::to_string_pretty(&sanitized_summary(backup))?)
        }
    }
}

/// The backup with every `src` removed, for showing before download.
pub fn preview(conn: &Connection) -> Result<Value> {
    let backup = export_snapshot(conn)?;
    Ok(remove_src(serde_json::to_value(&backup)?))
}

fn moment_stub(m: &Moment) -> Value {
    json!({ "id": m.id, "name": m.name })
}

fn sanitized_summary(backup: &Backup) -> Value {
    json!({
        "version": backup.version,
        "exportedAt": backup.exported_at,
        "sanitized": true,
        "counts": {
            "heap": backup.heap.len(),
            "trash": backup.trash.len(),
            "stories": backup.stories.len(),
            "overlays": backup.overlays.len(),
        },
        "heap": backup.heap.iter().map(moment_stub).collect::<Vec<_>>(),
        "trash": backup.trash.iter().map(moment_stub).collect::<Vec<_>>(),
        "stories": backup.stories.iter().map(|s| json!({
            "id": s.id,
            "title": s.title,
            "count": s.count,
            "items": s.items.iter().map(moment_stub).collect::<Vec<_>>(),
        })).collect::<Vec<_>>(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapbook::types::NewMoment;

    #[test]
    fn snapshot_inlines_story_items() {
        let mut conn = crate::db::open_memory_database().unwrap();
        let ids: Vec<String> = heap::add_to_heap(
            &conn,
            vec![
                NewMoment { src: "a.gif".into(), name: Some("a".into()) },
                NewMoment { src: "b.gif".into(), name: None },
            ],
        )
        .unwrap()
        .into_iter()
        .map(|m| m.id)
        .collect();
        let story = stories::create_story(&mut conn, Some("Trip")).unwrap();
        stories::add_to_story(&mut conn, &story.id, &ids[1..]).unwrap();

        let backup = export_snapshot(&conn).unwrap();
        assert_eq!(backup.version, BACKUP_VERSION);
        assert_eq!(backup.heap.len(), 1);
        assert_eq!(backup.stories.len(), 1);
        assert_eq!(backup.stories[0].count, 1);
        assert_eq!(backup.stories[0].items[0].src, "b.gif");
    }

    #[test]
    fn rendered_snapshot_matches_its_counts() {
        let conn = crate::db::open_memory_database().unwrap();
        heap::add_to_heap(
            &conn,
            vec![NewMoment { src: "a.gif".into(), name: None }],
        )
        .unwrap();

        let snapshot = export_snapshot(&conn).unwrap();
        let text = render_backup(&snapshot).unwrap();
        let doc: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(doc["heap"].as_array().unwrap().len(), snapshot.heap.len());
        assert_eq!(doc["exportedAt"], json!(snapshot.exported_at));
    }

    #[test]
    fn preview_has_no_src() {
        let conn = crate::db::open_memory_database().unwrap();
        heap::add_to_heap(
            &conn,
            vec![NewMoment { src: "data:image/gif;base64,R0lG".into(), name: None }],
        )
        .unwrap();

        let value = preview(&conn).unwrap();
        assert!(!value.to_string().contains("R0lG"));
        assert!(value["heap"][0]["id"].is_string());
    }

    #[test]
    fn summary_lists_structure_without_payloads() {
        let backup = Backup {
            version: BACKUP_VERSION,
            heap: vec![Moment::new("data:xyz", Some("n".into()))],
            ..Default::default()
        };
        let summary = sanitized_summary(&backup);
        assert_eq!(summary["counts"]["heap"], 1);
        assert_eq!(summary["heap"][0]["name"], "n");
        assert!(!summary.to_string().contains("data:xyz"));
    }

    #[test]
    fn export_json_parses_back() {
        let conn = crate::db::open_memory_database().unwrap();
        let text = export_json(&conn).unwrap();
        let parsed: Backup = serde_json::from_str(&text).unwrap();
        assert!(parsed.heap.is_empty());
    }
}
