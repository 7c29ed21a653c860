//! The heap: the default, unsorted collection of moments.

use anyhow::{bail, Result};
use rusqlite::Connection;

use super::types::{Moment, NewMoment};
use super::{take_by_ids, unselect, ScrapbookError};
use crate::store::{self, HEAP_KEY, TRASH_KEY};

pub fn list_heap(conn: &Connection) -> Result<Vec<Moment>> {
    store::get_or_default(conn, HEAP_KEY)
}

/// Append new moments to the end of the heap. Returns the created records.
pub fn add_to_heap(conn: &Connection, new: Vec<NewMoment>) -> Result<Vec<Moment>> {
    if new.iter().any(|m| m.src.trim().is_empty()) {
        bail!(ScrapbookError::Invalid("moment src must not be empty".into()));
    }

    let mut heap = list_heap(conn)?;
    let created: Vec<Moment> = new
        .into_iter()
        .map(|m| Moment::new(m.src, m.name))
        .collect();
    heap.extend(created.iter().cloned());
    store::set_json(conn, HEAP_KEY, &heap)?;

    tracing::info!(added = created.len(), total = heap.len(), "moments added to heap");
    Ok(created)
}

/// Flip the selection flag of one heap moment. Returns the new state.
pub fn toggle_selected(conn: &Connection, id: &str) -> Result<bool> {
    let mut heap = list_heap(conn)?;
    let Some(moment) = heap.iter_mut().find(|m| m.id == id) else {
        bail!(ScrapbookError::not_found("moment", id));
    };
    let selected = !moment.is_selected();
    moment.selected = selected.then_some(true);
    store::set_json(conn, HEAP_KEY, &heap)?;
    Ok(selected)
}

/// Ids of the currently selected heap moments, in heap order.
pub fn selected_ids(conn: &Connection) -> Result<Vec<String>> {
    Ok(list_heap(conn)?
        .into_iter()
        .filter(Moment::is_selected)
        .map(|m| m.id)
        .collect())
}

/// Unselect everything. Returns how many moments were selected.
pub fn clear_selection(conn: &Connection) -> Result<usize> {
    let mut heap = list_heap(conn)?;
    let cleared = heap.iter().filter(|m| m.is_selected()).count();
    if cleared > 0 {
        heap = unselect(heap);
        store::set_json(conn, HEAP_KEY, &heap)?;
    }
    Ok(cleared)
}

/// Soft-delete: move heap moments to the front of the trash. Unknown ids are
/// ignored. Returns how many moments moved.
pub fn trash_moments(conn: &mut Connection, ids: &[String]) -> Result<usize> {
    let tx = conn.transaction()?;

    let mut heap: Vec<Moment> = store::get_or_default(&tx, HEAP_KEY)?;
    let taken = unselect(take_by_ids(&mut heap, ids));
    if taken.is_empty() {
        return Ok(0);
    }

    let mut trash: Vec<Moment> = store::get_or_default(&tx, TRASH_KEY)?;
    let moved = taken.len();
    trash.splice(0..0, taken);

    store::set_json(&tx, HEAP_KEY, &heap)?;
    store::set_json(&tx, TRASH_KEY, &trash)?;
    tx.commit()?;

    tracing::info!(moved, "moments moved to trash");
    Ok(moved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapbook::trash::list_trash;

    fn new(src: &str) -> NewMoment {
        NewMoment {
            src: src.into(),
            name: None,
        }
    }

    #[test]
    fn add_assigns_ids_and_appends() {
        let conn = crate::db::open_memory_database().unwrap();
        let first = add_to_heap(&conn, vec![new("a.gif")]).unwrap();
        add_to_heap(&conn, vec![new("b.gif")]).unwrap();

        let heap = list_heap(&conn).unwrap();
        assert_eq!(heap.len(), 2);
        assert_eq!(heap[0].id, first[0].id);
        assert_eq!(heap[1].src, "b.gif");
        assert_ne!(heap[0].id, heap[1].id);
    }

    #[test]
    fn add_rejects_blank_src() {
        let conn = crate::db::open_memory_database().unwrap();
        assert!(add_to_heap(&conn, vec![new("  ")]).is_err());
        assert!(list_heap(&conn).unwrap().is_empty());
    }

    #[test]
    fn toggle_selection_round_trip() {
        let conn = crate::db::open_memory_database().unwrap();
        let id = add_to_heap(&conn, vec![new("a.gif")]).unwrap()[0].id.clone();

        assert!(toggle_selected(&conn, &id).unwrap());
        assert_eq!(selected_ids(&conn).unwrap(), vec![id.clone()]);
        assert!(!toggle_selected(&conn, &id).unwrap());
        assert!(selected_ids(&conn).unwrap().is_empty());
    }

    #[test]
    fn toggle_unknown_is_not_found() {
        let conn = crate::db::open_memory_database().unwrap();
        let err = toggle_selected(&conn, "missing").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ScrapbookError>(),
            Some(ScrapbookError::NotFound { .. })
        ));
    }

    #[test]
    fn trash_moves_and_unselects() {
        let mut conn = crate::db::open_memory_database().unwrap();
        let created = add_to_heap(&conn, vec![new("a.gif"), new("b.gif")]).unwrap();
        toggle_selected(&conn, &created[0].id).unwrap();

        let moved = trash_moments(&mut conn, &[created[0].id.clone()]).unwrap();
        assert_eq!(moved, 1);

        let heap = list_heap(&conn).unwrap();
        let trash = list_trash(&conn).unwrap();
        assert_eq!(heap.len(), 1);
        assert_eq!(trash.len(), 1);
        assert_eq!(trash[0].id, created[0].id);
        assert!(!trash[0].is_selected());
    }

    #[test]
    fn clear_selection_counts() {
        let conn = crate::db::open_memory_database().unwrap();
        let created = add_to_heap(&conn, vec![new("a.gif"), new("b.gif")]).unwrap();
        for m in &created {
            toggle_selected(&conn, &m.id).unwrap();
        }
        assert_eq!(clear_selection(&conn).unwrap(), 2);
        assert_eq!(clear_selection(&conn).unwrap(), 0);
    }
}
