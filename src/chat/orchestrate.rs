//! Decide who answers and in what order.
//!
//! `@name` tokens in the prompt pick the target agents. In `auto`
//! orchestration, mentions chained with a sequencing word ("@curator pick
//! three, then @critic review them") run one after another so later agents see
//! earlier replies; any other prompt fans out in parallel.

use std::sync::LazyLock;

use regex::Regex;

use super::types::{ChatRequest, InteractionMode, Orchestration};
use crate::scrapbook::types::Agent;

static MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@([\w-]+)").expect("valid mention regex"));

static SEQUENCE_CUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)@[\w-]+[^@]*?(?:\bthen\b|\bafter\s+that\b|\bfollowed\s+by\b|->|=>|→)[^@]*@[\w-]+",
    )
    .expect("valid sequence regex")
});

/// Resolved fan-out for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatPlan {
    /// Speaks first; its reply is handed to every target.
    pub coordinator: Option<Agent>,
    pub targets: Vec<Agent>,
    pub sequential: bool,
}

fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

fn matches_agent(token: &str, agent: &Agent) -> bool {
    let token = normalize(token);
    token == normalize(&agent.id)
        || token == normalize(&agent.name)
        || token == normalize(&agent.name.replace(' ', "-"))
}

/// Agents mentioned in `prompt`, in order of first mention, without repeats.
pub fn find_mentions(prompt: &str, agents: &[Agent]) -> Vec<Agent> {
    let mut found: Vec<Agent> = Vec::new();
    for caps in MENTION.captures_iter(prompt) {
        // `@critic->@storyteller`: the arrow is not part of the name.
        let token = caps[1].trim_end_matches('-');
        if let Some(agent) = agents.iter().find(|a| matches_agent(token, a)) {
            if !found.iter().any(|f| f.id == agent.id) {
                found.push(agent.clone());
            }
        }
    }
    found
}

/// Whether two mentions are joined by a sequencing word or arrow.
pub fn has_sequence_cue(prompt: &str) -> bool {
    SEQUENCE_CUE.is_match(prompt)
}

pub fn plan(req: &ChatRequest, agents: &[Agent]) -> ChatPlan {
    let mentions = find_mentions(&req.prompt, agents);

    let sequential = match req.orchestration {
        Orchestration::Sequential => true,
        Orchestration::Parallel => false,
        Orchestration::Auto => mentions.len() >= 2 && has_sequence_cue(&req.prompt),
    };

    let mut targets = if mentions.is_empty() {
        agents.to_vec()
    } else {
        mentions
    };

    let coordinator = if req.coordinator_mode {
        let chosen = req
            .coordinator_agent
            .as_deref()
            .and_then(|id| agents.iter().find(|a| a.id == id))
            .or_else(|| agents.first())
            .cloned();
        if let Some(ref c) = chosen {
            targets.retain(|t| t.id != c.id);
        }
        chosen
    } else {
        None
    };

    if req.interaction_mode == InteractionMode::Direct {
        targets.truncate(1);
    }

    tracing::debug!(
        coordinator = ?coordinator.as_ref().map(|c| &c.id),
        targets = ?targets.iter().map(|t| &t.id).collect::<Vec<_>>(),
        sequential,
        "chat plan"
    );

    ChatPlan {
        coordinator,
        targets,
        sequential,
    }
}
