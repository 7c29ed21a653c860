//! Chat persona configuration stored under `agents`.
//!
//! Until the user edits the crew, the three built-in agents are returned.

use anyhow::{bail, Result};
use rusqlite::Connection;

use super::types::{Agent, AgentPatch, NewAgent};
use super::ScrapbookError;
use crate::store::{self, AGENTS_KEY};

/// The built-in crew used when nothing is stored and a chat request names no agents.
pub fn default_agents() -> Vec<Agent> {
    let agent = |id: &str, name: &str, description: &str| Agent {
        id: id.into(),
        name: name.into(),
        description: description.into(),
        avatar_url: None,
        avatar_crop: None,
    };
    vec![
        agent(
            "curator",
            "Curator",
            "Picks the moments that belong together and explains why.",
        ),
        agent(
            "critic",
            "Critic",
            "Pushes back on weak choices and points out what is missing.",
        ),
        agent(
            "storyteller",
            "Storyteller",
            "Turns a set of moments into a short narrative.",
        ),
    ]
}

pub fn list_agents(conn: &Connection) -> Result<Vec<Agent>> {
    Ok(store::get_json(conn, AGENTS_KEY)?.unwrap_or_else(default_agents))
}

/// Lowercase, alphanumerics and dashes only.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.trim().chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}

pub fn create_agent(conn: &Connection, new: NewAgent) -> Result<Agent> {
    let name = new.name.trim().to_string();
    if name.is_empty() {
        bail!(ScrapbookError::Invalid("agent name must not be empty".into()));
    }
    let id = match new.id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => slugify(&name),
    };
    if id.is_empty() {
        bail!(ScrapbookError::Invalid(format!("cannot derive an id from name `{name}`")));
    }

    let mut agents = list_agents(conn)?;
    if agents.iter().any(|a| a.id == id) {
        bail!(ScrapbookError::Conflict(format!("agent `{id}` already exists")));
    }

    let agent = Agent {
        id,
        name,
        description: new.description,
        avatar_url: new.avatar_url,
        avatar_crop: new.avatar_crop,
    };
    agents.push(agent.clone());
    store::set_json(conn, AGENTS_KEY, &agents)?;

    tracing::info!(id = %agent.id, "agent created");
    Ok(agent)
}

pub fn update_agent(conn: &Connection, id: &str, patch: AgentPatch) -> Result<Agent> {
    let mut agents = list_agents(conn)?;
    let Some(agent) = agents.iter_mut().find(|a| a.id == id) else {
        bail!(ScrapbookError::not_found("agent", id));
    };

    if let Some(name) = patch.name {
        let name = name.trim();
        if name.is_empty() {
            bail!(ScrapbookError::Invalid("agent name must not be empty".into()));
        }
        agent.name = name.to_string();
    }
    if let Some(description) = patch.description {
        agent.description = description;
    }
    if let Some(url) = patch.avatar_url {
        agent.avatar_url = (!url.is_empty()).then_some(url);
    }
    if let Some(crop) = patch.avatar_crop {
        agent.avatar_crop = Some(crop);
    }

    let updated = agent.clone();
    store::set_json(conn, AGENTS_KEY, &agents)?;
    Ok(updated)
}

pub fn delete_agent(conn: &Connection, id: &str) -> Result<()> {
    let mut agents = list_agents(conn)?;
    let before = agents.len();
    agents.retain(|a| a.id != id);
    if agents.len() == before {
        bail!(ScrapbookError::not_found("agent", id));
    }
    store::set_json(conn, AGENTS_KEY, &agents)
}
