//! The trash: soft-deleted moments waiting to be restored or purged.

use anyhow::Result;
use rusqlite::Connection;

use super::overlays::drop_overlays;
use super::take_by_ids;
use super::types::Moment;
use crate::store::{self, HEAP_KEY, TRASH_KEY};

pub fn list_trash(conn: &Connection) -> Result<Vec<Moment>> {
    store::get_or_default(conn, TRASH_KEY)
}

/// Move trashed moments back to the end of the heap.
pub fn restore(conn: &mut Connection, ids: &[String]) -> Result<usize> {
    let tx = conn.transaction()?;

    let mut trash: Vec<Moment> = store::get_or_default(&tx, TRASH_KEY)?;
    let restored = take_by_ids(&mut trash, ids);
    if restored.is_empty() {
        return Ok(0);
    }

    let mut heap: Vec<Moment> = store::get_or_default(&tx, HEAP_KEY)?;
    let count = restored.len();
    heap.extend(restored);

    store::set_json(&tx, TRASH_KEY, &trash)?;
    store::set_json(&tx, HEAP_KEY, &heap)?;
    tx.commit()?;

    tracing::info!(count, "moments restored from trash");
    Ok(count)
}

/// Permanently delete trashed moments and their overlays.
pub fn delete_forever(conn: &mut Connection, ids: &[String]) -> Result<usize> {
    let tx = conn.transaction()?;

    let mut trash: Vec<Moment> = store::get_or_default(&tx, TRASH_KEY)?;
    let purged = take_by_ids(&mut trash, ids);
    if purged.is_empty() {
        return Ok(0);
    }

    store::set_json(&tx, TRASH_KEY, &trash)?;
    let purged_ids: Vec<String> = purged.into_iter().map(|m| m.id).collect();
    drop_overlays(&tx, &purged_ids)?;
    tx.commit()?;

    tracing::info!(count = purged_ids.len(), "moments deleted permanently");
    Ok(purged_ids.len())
}

/// Purge the whole trash. Returns how many moments were removed.
pub fn empty_trash(conn: &mut Connection) -> Result<usize> {
    let ids: Vec<String> = list_trash(conn)?.into_iter().map(|m| m.id).collect();
    delete_forever(conn, &ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapbook::heap::{add_to_heap, list_heap, trash_moments};
    use crate::scrapbook::overlays::{list_overlays, set_overlay};
    use crate::scrapbook::types::{NewMoment, Overlay};

    fn seed(conn: &mut Connection, n: usize) -> Vec<String> {
        let new = (0..n)
            .map(|i| NewMoment {
                src: format!("{i}.gif"),
                name: None,
            })
            .collect();
        let ids: Vec<String> = add_to_heap(conn, new)
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        trash_moments(conn, &ids).unwrap();
        ids
    }

    #[test]
    fn restore_returns_moments_to_heap() {
        let mut conn = crate::db::open_memory_database().unwrap();
        let ids = seed(&mut conn, 3);

        assert_eq!(restore(&mut conn, &ids[..1]).unwrap(), 1);
        assert_eq!(list_heap(&conn).unwrap().len(), 1);
        assert_eq!(list_trash(&conn).unwrap().len(), 2);
    }

    #[test]
    fn restore_unknown_ids_is_noop() {
        let mut conn = crate::db::open_memory_database().unwrap();
        seed(&mut conn, 1);
        assert_eq!(restore(&mut conn, &["nope".into()]).unwrap(), 0);
        assert_eq!(list_trash(&conn).unwrap().len(), 1);
    }

    #[test]
    fn delete_forever_drops_overlays() {
        let mut conn = crate::db::open_memory_database().unwrap();
        let ids = seed(&mut conn, 2);
        set_overlay(
            &conn,
            &ids[0],
            Overlay {
                text: "hi".into(),
                position: None,
                color: None,
            },
        )
        .unwrap();

        assert_eq!(delete_forever(&mut conn, &ids[..1]).unwrap(), 1);
        assert!(list_overlays(&conn).unwrap().is_empty());
        assert_eq!(list_trash(&conn).unwrap().len(), 1);
    }

    #[test]
    fn empty_trash_purges_everything() {
        let mut conn = crate::db::open_memory_database().unwrap();
        seed(&mut conn, 4);
        assert_eq!(empty_trash(&mut conn).unwrap(), 4);
        assert!(list_trash(&conn).unwrap().is_empty());
        assert_eq!(empty_trash(&mut conn).unwrap(), 0);
    }
}
