//! Scrapbook record types.
//!
//! Defines [`Moment`] (one saved GIF/image), [`StoryMeta`] (a named, ordered
//! sub-collection), [`Overlay`] (caption text drawn over a moment), and
//! [`Agent`] (a chat persona). All records serialize camelCase so backups stay
//! compatible with files written by the browser build.

use serde::{Deserialize, Serialize};

/// A single saved GIF or image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Moment {
    /// UUID v7 for moments created here; imported ids are kept verbatim.
    pub id: String,
    /// Data URI, absolute URL, or `/api/proxy?u=…` path.
    pub src: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected: Option<bool>,
}

impl Moment {
    pub fn new(src: impl Into<String>, name: Option<String>) -> Self {
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            src: src.into(),
            name,
            selected: None,
        }
    }

    pub fn is_selected(&self) -> bool {
        self.selected.unwrap_or(false)
    }
}

/// Input for adding a moment; the id is assigned on insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMoment {
    pub src: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Story metadata, stored in the `stories` list. Items live under `story:<id>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryMeta {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Number of items, recomputed on every mutation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

/// Caption text drawn over a moment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Overlay {
    pub text: String,
    /// `top`, `center` or `bottom`; renderer default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// Avatar crop window in image-relative units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AvatarCrop {
    pub x: f64,
    pub y: f64,
    pub scale: f64,
}

/// A chat persona.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_crop: Option<AvatarCrop>,
}

/// Partial update for an [`Agent`]. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub avatar_url: Option<String>,
    pub avatar_crop: Option<AvatarCrop>,
}

/// Input for creating an agent. The id defaults to a slug of the name.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAgent {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub avatar_crop: Option<AvatarCrop>,
}
