//! Collection bookkeeping for moments.
//!
//! Moments move between three kinds of collection: the heap, the trash, and
//! any number of stories. Every operation reads the affected collections,
//! edits them in memory, and writes them back inside one transaction so the
//! keys never drift apart.

pub mod agents;
pub mod heap;
pub mod overlays;
pub mod stats;
pub mod stories;
pub mod trash;
pub mod types;

use std::collections::HashSet;

use thiserror::Error;

use types::Moment;

/// Errors the HTTP layer maps to client-facing statuses.
#[derive(Debug, Error)]
pub enum ScrapbookError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("{0}")]
    Invalid(String),

    #[error("{0}")]
    Conflict(String),
}

impl ScrapbookError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }
}

/// Remove the moments whose id is in `ids` from `list`, preserving the order
/// of both the taken and the remaining moments.
pub fn take_by_ids(list: &mut Vec<Moment>, ids: &[String]) -> Vec<Moment> {
    let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
    let (taken, kept): (Vec<Moment>, Vec<Moment>) = std::mem::take(list)
        .into_iter()
        .partition(|m| wanted.contains(m.id.as_str()));
    *list = kept;
    taken
}

/// Drop the selection flag; moments changing collection arrive unselected.
pub(crate) fn unselect(mut moments: Vec<Moment>) -> Vec<Moment> {
    for m in &mut moments {
        m.selected = None;
    }
    moments
}
