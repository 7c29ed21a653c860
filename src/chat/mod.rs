//! Multi-agent chat over third-party LLM APIs.
//!
//! A request is planned into a coordinator and a list of target agents (see
//! [`orchestrate`]), then each agent is asked in turn or concurrently. Without
//! a provider key the canned [`demo`] transcript is returned instead.

pub mod demo;
pub mod orchestrate;
pub mod provider;
pub mod types;

use futures::future::join_all;

use crate::config::ChatConfig;
use crate::scrapbook::agents::default_agents;
use crate::scrapbook::types::Agent;
use orchestrate::ChatPlan;
use provider::ChatCompleter;
use types::{ChatMessage, ChatMode, ChatRequest, ChatResponse, HistoryEntry, Role, StoryContext, Turn};

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("no API key configured for {provider}")]
    NoApiKey { provider: &'static str },

    #[error("network error: {0}")]
    Network(String),

    #[error("{provider} API error (status {status}): {message}")]
    Api {
        provider: &'static str,
        status: u16,
        message: String,
    },

    #[error("failed to parse {provider} response: {message}")]
    Parse {
        provider: &'static str,
        message: String,
    },
}

/// System prompt for one agent, with the story being viewed folded in.
pub fn system_prompt(agent: &Agent, story: Option<&StoryContext>) -> String {
    let mut prompt = format!("You are {}.", agent.name);
    if !agent.description.trim().is_empty() {
        prompt.push(' ');
        prompt.push_str(agent.description.trim());
    }
    prompt.push_str(
        "\nYou are one voice in a small group helping someone arrange a scrapbook of images and GIFs. Keep replies short.",
    );

    if let Some(story) = story {
        let title = story
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or("Untitled story");
        prompt.push_str(&format!("\n\nThe story on screen is \"{title}\""));
        let names: Vec<&str> = story
            .items
            .iter()
            .filter_map(|i| i.name.as_deref())
            .filter(|n| !n.trim().is_empty())
            .collect();
        if names.is_empty() {
            prompt.push_str(&format!(" with {} moments.", story.items.len()));
        } else {
            prompt.push_str(&format!(" with these moments: {}.", names.join(", ")));
        }
    }
    prompt
}

fn agent_name<'a>(agents: &'a [Agent], id: Option<&'a str>) -> &'a str {
    match id {
        Some(id) => agents
            .iter()
            .find(|a| a.id == id)
            .map(|a| a.name.as_str())
            .unwrap_or(id),
        None => "Assistant",
    }
}

/// Prior turns as seen by `agent`: its own replies stay assistant turns,
/// other agents' replies are quoted back as user context.
fn history_turns(history: &[HistoryEntry], agent: &Agent, agents: &[Agent]) -> Vec<Turn> {
    history
        .iter()
        .map(|entry| match entry.role {
            Role::User => Turn::user(entry.content.clone()),
            Role::Assistant if entry.agent_id.as_deref() == Some(agent.id.as_str()) => {
                Turn::assistant(entry.content.clone())
            }
            Role::Assistant => Turn::user(format!(
                "[{}]: {}",
                agent_name(agents, entry.agent_id.as_deref()),
                entry.content
            )),
        })
        .collect()
}

fn user_turn(prompt: &str, earlier: &[ChatMessage]) -> Turn {
    let mut content = prompt.to_string();
    for msg in earlier {
        content.push_str(&format!("\n\n[{}]: {}", msg.agent_name, msg.content));
    }
    Turn::user(content)
}

struct Session<'a, C: ?Sized> {
    completer: &'a C,
    req: &'a ChatRequest,
    agents: &'a [Agent],
    model: &'a str,
}

impl<C: ChatCompleter + ?Sized> Session<'_, C> {
    async fn ask(&self, agent: &Agent, earlier: &[ChatMessage]) -> Result<ChatMessage, ChatError> {
        let system = system_prompt(agent, self.req.story.as_ref());
        let mut turns = if self.req.stateless {
            Vec::new()
        } else {
            history_turns(&self.req.history, agent, self.agents)
        };
        turns.push(user_turn(&self.req.prompt, earlier));

        let content = self.completer.complete(self.model, &system, &turns).await?;
        Ok(ChatMessage {
            agent_id: agent.id.clone(),
            agent_name: agent.name.clone(),
            content: content.trim().to_string(),
        })
    }

    /// Run the plan, returning what completed and the first error, if any.
    async fn run(&self, plan: &ChatPlan) -> (Vec<ChatMessage>, Option<ChatError>) {
        let mut messages = Vec::new();

        if let Some(coordinator) = &plan.coordinator {
            match self.ask(coordinator, &[]).await {
                Ok(msg) => messages.push(msg),
                Err(e) => return (messages, Some(e)),
            }
        }

        if plan.sequential {
            for target in &plan.targets {
                match self.ask(target, &messages).await {
                    Ok(msg) => messages.push(msg),
                    Err(e) => return (messages, Some(e)),
                }
            }
            return (messages, None);
        }

        let context = messages.clone();
        let results = join_all(plan.targets.iter().map(|t| self.ask(t, &context))).await;
        let mut first_error = None;
        for result in results {
            match result {
                Ok(msg) => messages.push(msg),
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
        (messages, first_error)
    }
}

/// Answer a chat request.
///
/// `stored_agents` is the saved crew; the request's own `agents` take
/// precedence and the built-in defaults fill in when both are empty.
pub async fn run_chat<C: ChatCompleter + ?Sized>(
    completer: &C,
    req: &ChatRequest,
    stored_agents: Vec<Agent>,
    config: &ChatConfig,
) -> ChatResponse {
    let agents = req
        .agents
        .clone()
        .filter(|a| !a.is_empty())
        .or_else(|| Some(stored_agents).filter(|a| !a.is_empty()))
        .unwrap_or_else(default_agents);

    let model = req
        .model
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or(config.default_model.as_str());

    let plan = orchestrate::plan(req, &agents);

    if !completer.is_configured(model) {
        tracing::info!(model, "no provider key, serving demo transcript");
        return ChatResponse {
            messages: demo::transcript(&plan, &req.prompt),
            agents,
            mode: ChatMode::Demo,
            error: None,
        };
    }

    let session = Session {
        completer,
        req,
        agents: &agents,
        model,
    };
    let (messages, error) = session.run(&plan).await;

    match error {
        None => {
            tracing::info!(model, replies = messages.len(), sequential = plan.sequential, "chat answered");
            ChatResponse {
                agents,
                messages,
                mode: ChatMode::Live,
                error: None,
            }
        }
        Some(e) if config.demo_fallback => {
            tracing::warn!(model, error = %e, "provider call failed, falling back to demo");
            ChatResponse {
                messages: demo::transcript(&plan, &req.prompt),
                agents,
                mode: ChatMode::Demo,
                error: Some(e.to_string()),
            }
        }
        Some(e) => {
            tracing::warn!(model, error = %e, completed = messages.len(), "provider call failed");
            ChatResponse {
                agents,
                messages,
                mode: ChatMode::Live,
                error: Some(e.to_string()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::chat::types::{Orchestration, StoryItem};

    /// Replies with the speaker's name and records every call.
    #[derive(Default)]
    struct FakeCompleter {
        configured: bool,
        fail_for: Option<&'static str>,
        calls: Mutex<Vec<(String, Vec<Turn>)>>,
    }

    impl FakeCompleter {
        fn live() -> Self {
            Self {
                configured: true,
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<(String, Vec<Turn>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatCompleter for FakeCompleter {
        fn is_configured(&self, _model: &str) -> bool {
            self.configured
        }

        async fn complete(&self, _model: &str, system: &str, turns: &[Turn]) -> Result<String, ChatError> {
            self.calls
                .lock()
                .unwrap()
                .push((system.to_string(), turns.to_vec()));
            let speaker = system
                .strip_prefix("You are ")
                .and_then(|s| s.split('.').next())
                .unwrap_or("?")
                .to_string();
            if self.fail_for == Some(speaker.as_str()) {
                return Err(ChatError::Api {
                    provider: "openai",
                    status: 500,
                    message: "boom".into(),
                });
            }
            Ok(format!("  {speaker} says hi  "))
        }
    }

    fn request(prompt: &str) -> ChatRequest {
        ChatRequest {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    fn speakers(resp: &ChatResponse) -> Vec<&str> {
        resp.messages.iter().map(|m| m.agent_id.as_str()).collect()
    }

    #[tokio::test]
    async fn no_key_serves_demo() {
        let fake = FakeCompleter::default();
        let resp = run_chat(&fake, &request("hello"), vec![], &ChatConfig::default()).await;
        assert_eq!(resp.mode, ChatMode::Demo);
        assert_eq!(resp.agents.len(), 3);
        assert_eq!(speakers(&resp), ["curator", "critic", "storyteller"]);
        assert!(fake.calls().is_empty());
    }

    #[tokio::test]
    async fn parallel_replies_keep_agent_order() {
        let fake = FakeCompleter::live();
        let resp = run_chat(&fake, &request("thoughts?"), vec![], &ChatConfig::default()).await;
        assert_eq!(resp.mode, ChatMode::Live);
        assert_eq!(speakers(&resp), ["curator", "critic", "storyteller"]);
        assert_eq!(resp.messages[1].content, "Critic says hi");
        assert!(resp.error.is_none());
    }

    #[tokio::test]
    async fn sequential_agents_see_earlier_replies() {
        let fake = FakeCompleter::live();
        let resp = run_chat(
            &fake,
            &request("@curator pick, then @critic judge"),
            vec![],
            &ChatConfig::default(),
        )
        .await;
        assert_eq!(speakers(&resp), ["curator", "critic"]);

        let calls = fake.calls();
        let critic_turn = &calls[1].1.last().unwrap().content;
        assert!(critic_turn.contains("[Curator]: Curator says hi"));
    }

    #[tokio::test]
    async fn coordinator_reply_reaches_targets() {
        let fake = FakeCompleter::live();
        let mut req = request("plan it");
        req.coordinator_mode = true;
        req.coordinator_agent = Some("storyteller".into());
        req.orchestration = Orchestration::Parallel;
        let resp = run_chat(&fake, &req, vec![], &ChatConfig::default()).await;
        assert_eq!(speakers(&resp), ["storyteller", "curator", "critic"]);
        for (_, turns) in &fake.calls()[1..] {
            assert!(turns.last().unwrap().content.contains("[Storyteller]"));
        }
    }

    #[tokio::test]
    async fn history_is_skipped_when_stateless() {
        let fake = FakeCompleter::live();
        let mut req = request("@critic again?");
        req.history = vec![
            HistoryEntry {
                role: Role::User,
                agent_id: None,
                content: "first".into(),
            },
            HistoryEntry {
                role: Role::Assistant,
                agent_id: Some("curator".into()),
                content: "pick 3".into(),
            },
        ];
        run_chat(&fake, &req, vec![], &ChatConfig::default()).await;
        let turns = &fake.calls()[0].1;
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[1], Turn::user("[Curator]: pick 3"));

        req.stateless = true;
        let fake = FakeCompleter::live();
        run_chat(&fake, &req, vec![], &ChatConfig::default()).await;
        assert_eq!(fake.calls()[0].1.len(), 1);
    }

    #[tokio::test]
    async fn story_lands_in_system_prompt() {
        let fake = FakeCompleter::live();
        let mut req = request("@storyteller go");
        req.story = Some(StoryContext {
            title: Some("Lisbon".into()),
            items: vec![
                StoryItem { name: Some("tram".into()) },
                StoryItem { name: None },
            ],
        });
        run_chat(&fake, &req, vec![], &ChatConfig::default()).await;
        let system = &fake.calls()[0].0;
        assert!(system.contains("\"Lisbon\""));
        assert!(system.contains("tram"));
    }

    #[tokio::test]
    async fn failure_falls_back_to_demo_with_error() {
        let fake = FakeCompleter {
            configured: true,
            fail_for: Some("Critic"),
            ..Default::default()
        };
        let resp = run_chat(&fake, &request("hey"), vec![], &ChatConfig::default()).await;
        assert_eq!(resp.mode, ChatMode::Demo);
        assert!(resp.error.unwrap().contains("status 500"));
        assert_eq!(resp.messages.len(), 3);
    }

    #[tokio::test]
    async fn failure_without_fallback_keeps_partial_replies() {
        let fake = FakeCompleter {
            configured: true,
            fail_for: Some("Critic"),
            ..Default::default()
        };
        let config = ChatConfig {
            demo_fallback: false,
            ..Default::default()
        };
        let resp = run_chat(&fake, &request("hey"), vec![], &config).await;
        assert_eq!(resp.mode, ChatMode::Live);
        assert!(resp.error.is_some());
        assert_eq!(speakers(&resp), ["curator", "storyteller"]);
    }

    #[tokio::test]
    async fn request_agents_override_stored() {
        let fake = FakeCompleter::default();
        let stored = vec![Agent {
            id: "dj".into(),
            name: "DJ".into(),
            description: String::new(),
            avatar_url: None,
            avatar_crop: None,
        }];
        let resp = run_chat(&fake, &request("hi"), stored.clone(), &ChatConfig::default()).await;
        assert_eq!(speakers(&resp), ["dj"]);

        let mut req = request("hi");
        req.agents = Some(default_agents()[..1].to_vec());
        let resp = run_chat(&fake, &req, stored, &ChatConfig::default()).await;
        assert_eq!(speakers(&resp), ["curator"]);
    }
}
