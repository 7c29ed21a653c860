//! JSON backups of the whole scrapbook.
//!
//! A backup is one document holding the heap, the trash, every story with its
//! items inlined, and the overlays:
//!
//! ```json
//! { "version": 2, "exportedAt": "…", "heap": [...], "trash": [...],
//!   "stories": [{ "id": "s1", "title": "T", "count": 1, "items": [...] }],
//!   "overlays": { "<moment id>": { "text": "…" } } }
//! ```
//!
//! Import is lenient: older files that use `moments` instead of `heap`, or
//! that are a bare array of moments, are recovered as far as possible.

pub mod export;
pub mod import;
pub mod sanitize;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::scrapbook::overlays::OverlayMap;
use crate::scrapbook::types::Moment;

pub use export::{export_json, export_snapshot, preview, render_backup};
pub use import::{import_backup, parse_backup, ImportReport};
pub use sanitize::remove_src;

/// Format version written into new backups.
pub const BACKUP_VERSION: u32 = 2;

#[derive(Debug, Error)]
pub enum BackupError {
    /// Shown to the user as is; the reason goes to the log.
    #[error("Invalid backup file")]
    Invalid { reason: String },
}

impl BackupError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid {
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Backup {
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exported_at: Option<String>,
    pub heap: Vec<Moment>,
    pub trash: Vec<Moment>,
    pub stories: Vec<StoryBackup>,
    pub overlays: OverlayMap,
}

/// A story with its items inlined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryBackup {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub count: usize,
    pub items: Vec<Moment>,
}
