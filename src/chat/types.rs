//! Wire types for the chat endpoint. Field names are camelCase on the wire.

use serde::{Deserialize, Serialize};

use crate::scrapbook::types::Agent;

/// How replies are fanned out across the target agents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orchestration {
    /// Decide from the @mentions in the prompt.
    #[default]
    Auto,
    Parallel,
    Sequential,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionMode {
    /// Every target agent replies.
    #[default]
    Roundtable,
    /// Only the first target replies.
    Direct,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatMode {
    Demo,
    Live,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A prior turn supplied by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoryItem {
    #[serde(default)]
    pub name: Option<String>,
}

/// The story the user is looking at, folded into each agent's system prompt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoryContext {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub items: Vec<StoryItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub prompt: String,
    #[serde(default)]
    pub model: Option<String>,
    /// Overrides the stored crew for this request.
    #[serde(default)]
    pub agents: Option<Vec<Agent>>,
    #[serde(default)]
    pub story: Option<StoryContext>,
    /// Id of the agent that speaks first in coordinator mode.
    #[serde(default)]
    pub coordinator_agent: Option<String>,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    #[serde(default)]
    pub coordinator_mode: bool,
    #[serde(default)]
    pub orchestration: Orchestration,
    #[serde(default)]
    pub interaction_mode: InteractionMode,
    /// Ignore `history`.
    #[serde(default)]
    pub stateless: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub agent_id: String,
    pub agent_name: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub agents: Vec<Agent>,
    pub messages: Vec<ChatMessage>,
    pub mode: ChatMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One turn sent to a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}
