use anyhow::Result;
use rusqlite::Connection;
use serde::Serialize;

use super::{agents, heap, overlays, stories, trash};
use crate::store;

/// Counts across every collection.
#[derive(Debug, Serialize)]
pub struct ScrapbookStats {
    pub heap: usize,
    pub selected: usize,
    pub trash: usize,
    pub stories: usize,
    pub story_moments: usize,
    pub overlays: usize,
    pub agents: usize,
    /// Story metadata whose stored count disagrees with its item list.
    pub stale_counts: Vec<String>,
}

pub fn scrapbook_stats(conn: &Connection) -> Result<ScrapbookStats> {
    let heap = heap::list_heap(conn)?;
    let stories = stories::list_stories(conn)?;

    let mut story_moments = 0;
    let mut stale_counts = Vec::new();
    for story in &stories {
        let items: Vec<serde_json::Value> =
            store::get_or_default(conn, &store::story_key(&story.id))?;
        story_moments += items.len();
        if story.count != Some(items.len()) {
            stale_counts.push(story.id.clone());
        }
    }

    Ok(ScrapbookStats {
        selected: heap.iter().filter(|m| m.is_selected()).count(),
        heap: heap.len(),
        trash: trash::list_trash(conn)?.len(),
        stories: stories.len(),
        story_moments,
        overlays: overlays::list_overlays(conn)?.len(),
        agents: agents::list_agents(conn)?.len(),
        stale_counts,
    })
}
