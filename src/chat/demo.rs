//! Canned transcript served when no provider key is configured or a live
//! call fails and fallback is enabled.

use super::orchestrate::ChatPlan;
use super::types::ChatMessage;
use crate::scrapbook::types::Agent;

fn canned_line(agent: &Agent, prompt: &str) -> String {
    let topic = prompt.trim();
    let topic = if topic.is_empty() { "this" } else { topic };
    match agent.id.as_str() {
        "curator" => format!(
            "I'd start with the moments that carry the most light and movement, then cut anything that repeats a beat. On \"{topic}\": three strong frames beat ten similar ones."
        ),
        "critic" => format!(
            "Before we commit, check the pacing. \"{topic}\" works if every frame earns its place; drop the weakest one and the set gets sharper."
        ),
        "storyteller" => format!(
            "Here's a thread for \"{topic}\": open quiet, build to the busiest frame, and close on something small and still."
        ),
        _ => format!("{} here. My take on \"{topic}\": {}", agent.name, agent.description),
    }
}

/// One canned message per speaking agent, coordinator first.
pub fn transcript(plan: &ChatPlan, prompt: &str) -> Vec<ChatMessage> {
    plan.coordinator
        .iter()
        .chain(plan.targets.iter())
        .map(|agent| ChatMessage {
            agent_id: agent.id.clone(),
            agent_name: agent.name.clone(),
            content: canned_line(agent, prompt),
        })
        .collect()
}
