//! Stories: named, ordered sub-collections.
//!
//! Metadata for every story lives in the `stories` list; the items of one story
//! live under `story:<id>`. Each mutation rewrites both inside a transaction and
//! recomputes `count` from the item list.

use anyhow::{bail, Result};
use rusqlite::Connection;

use super::types::{Moment, StoryMeta};
use super::{take_by_ids, unselect, ScrapbookError};
use crate::store::{self, story_key, HEAP_KEY, STORIES_KEY, TRASH_KEY};

pub fn list_stories(conn: &Connection) -> Result<Vec<StoryMeta>> {
    store::get_or_default(conn, STORIES_KEY)
}

fn find_story(stories: &[StoryMeta], id: &str) -> Result<usize> {
    match stories.iter().position(|s| s.id == id) {
        Some(idx) => Ok(idx),
        None => bail!(ScrapbookError::not_found("story", id)),
    }
}

/// Ordered items of one story.
pub fn story_items(conn: &Connection, id: &str) -> Result<Vec<Moment>> {
    find_story(&list_stories(conn)?, id)?;
    store::get_or_default(conn, &story_key(id))
}

/// Write `items` for story `id` and refresh its count in `stories`.
fn write_items(
    conn: &Connection,
    stories: &mut [StoryMeta],
    idx: usize,
    items: &[Moment],
) -> Result<()> {
    stories[idx].count = Some(items.len());
    store::set_json(conn, &story_key(&stories[idx].id), items)?;
    store::set_json(conn, STORIES_KEY, &*stories)
}

pub fn create_story(conn: &mut Connection, title: Option<&str>) -> Result<StoryMeta> {
    let title = title.map(str::trim).filter(|t| !t.is_empty());
    let story = StoryMeta {
        id: uuid::Uuid::now_v7().to_string(),
        title: title.map(str::to_string),
        count: Some(0),
    };

    let tx = conn.transaction()?;
    let mut stories: Vec<StoryMeta> = store::get_or_default(&tx, STORIES_KEY)?;
    stories.push(story.clone());
    store::set_json(&tx, STORIES_KEY, &stories)?;
    store::set_json(&tx, &story_key(&story.id), &Vec::<Moment>::new())?;
    tx.commit()?;

    tracing::info!(id = %story.id, title = ?story.title, "story created");
    Ok(story)
}

pub fn rename_story(conn: &Connection, id: &str, title: &str) -> Result<StoryMeta> {
    let mut stories = list_stories(conn)?;
    let idx = find_story(&stories, id)?;
    let title = title.trim();
    stories[idx].title = (!title.is_empty()).then(|| title.to_string());
    store::set_json(conn, STORIES_KEY, &stories)?;
    Ok(stories[idx].clone())
}

/// Delete a story. Its moments go to the front of the trash so nothing is lost
/// silently. Returns how many moments were trashed.
pub fn delete_story(conn: &mut Connection, id: &str) -> Result<usize> {
    let tx = conn.transaction()?;

    let mut stories: Vec<StoryMeta> = store::get_or_default(&tx, STORIES_KEY)?;
    let idx = find_story(&stories, id)?;
    stories.remove(idx);

    let key = story_key(id);
    let items: Vec<Moment> = store::get_or_default(&tx, &key)?;
    let trashed = items.len();
    if trashed > 0 {
        let mut trash: Vec<Moment> = store::get_or_default(&tx, TRASH_KEY)?;
        trash.splice(0..0, unselect(items));
        store::set_json(&tx, TRASH_KEY, &trash)?;
    }

    store::delete_key(&tx, &key)?;
    store::set_json(&tx, STORIES_KEY, &stories)?;
    tx.commit()?;

    tracing::info!(id, trashed, "story deleted");
    Ok(trashed)
}

/// Move heap moments to the end of a story. Unknown ids are ignored.
pub fn add_to_story(conn: &mut Connection, id: &str, ids: &[String]) -> Result<usize> {
    let tx = conn.transaction()?;

    let mut stories: Vec<StoryMeta> = store::get_or_default(&tx, STORIES_KEY)?;
    let idx = find_story(&stories, id)?;

    let mut heap: Vec<Moment> = store::get_or_default(&tx, HEAP_KEY)?;
    let moving = unselect(take_by_ids(&mut heap, ids));
    let moved = moving.len();
    if moved == 0 {
        return Ok(0);
    }

    let mut items: Vec<Moment> = store::get_or_default(&tx, &story_key(id))?;
    items.extend(moving);

    store::set_json(&tx, HEAP_KEY, &heap)?;
    write_items(&tx, &mut stories, idx, &items)?;
    tx.commit()?;

    tracing::info!(story = id, moved, "moments added to story");
    Ok(moved)
}

/// Move story moments back to the end of the heap.
pub fn remove_from_story(conn: &mut Connection, id: &str, ids: &[String]) -> Result<usize> {
    let tx = conn.transaction()?;

    let mut stories: Vec<StoryMeta> = store::get_or_default(&tx, STORIES_KEY)?;
    let idx = find_story(&stories, id)?;

    let mut items: Vec<Moment> = store::get_or_default(&tx, &story_key(id))?;
    let removed = take_by_ids(&mut items, ids);
    let count = removed.len();
    if count == 0 {
        return Ok(0);
    }

    let mut heap: Vec<Moment> = store::get_or_default(&tx, HEAP_KEY)?;
    heap.extend(removed);

    store::set_json(&tx, HEAP_KEY, &heap)?;
    write_items(&tx, &mut stories, idx, &items)?;
    tx.commit()?;

    tracing::info!(story = id, count, "moments removed from story");
    Ok(count)
}

/// Move the item at `from` to position `to` within a story.
pub fn move_within_story(conn: &mut Connection, id: &str, from: usize, to: usize) -> Result<()> {
    let tx = conn.transaction()?;

    let mut stories: Vec<StoryMeta> = store::get_or_default(&tx, STORIES_KEY)?;
    let idx = find_story(&stories, id)?;
    let mut items: Vec<Moment> = store::get_or_default(&tx, &story_key(id))?;

    if from >= items.len() || to >= items.len() {
        bail!(ScrapbookError::Invalid(format!(
            "position out of range: story has {} items",
            items.len()
        )));
    }
    let item = items.remove(from);
    items.insert(to, item);

    write_items(&tx, &mut stories, idx, &items)?;
    tx.commit()?;
    Ok(())
}
