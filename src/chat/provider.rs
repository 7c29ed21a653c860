//! LLM providers behind the chat endpoint.
//!
//! Models whose name starts with `claude` go to the Anthropic Messages API;
//! everything else goes to an OpenAI-compatible `/chat/completions` endpoint.
//! Keys are read from the environment once, when the client is built.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use super::types::{Role, Turn};
use super::ChatError;
use crate::config::ChatConfig;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Something that can turn a system prompt plus turns into one reply.
#[async_trait]
pub trait ChatCompleter: Send + Sync {
    /// Whether a live call can be attempted for `model`.
    fn is_configured(&self, model: &str) -> bool;

    async fn complete(&self, model: &str, system: &str, turns: &[Turn]) -> Result<String, ChatError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    Anthropic,
}

impl Provider {
    pub fn for_model(model: &str) -> Self {
        if model.trim().to_ascii_lowercase().starts_with("claude") {
            Self::Anthropic
        } else {
            Self::OpenAi
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
        }
    }
}

/// Merge consecutive turns from the same side and drop leading assistant
/// turns; both APIs want a user turn first and Anthropic wants strict
/// alternation.
pub fn normalize_turns(turns: &[Turn]) -> Vec<Turn> {
    let mut out: Vec<Turn> = Vec::with_capacity(turns.len());
    for turn in turns {
        if turn.content.trim().is_empty() {
            continue;
        }
        match out.last_mut() {
            None if turn.role == Role::Assistant => continue,
            Some(last) if last.role == turn.role => {
                last.content.push_str("\n\n");
                last.content.push_str(&turn.content);
            }
            _ => out.push(turn.clone()),
        }
    }
    out
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Deserialize)]
struct OpenAiMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "str::is_empty")]
    system: &'a str,
    messages: Vec<WireMessage<'a>>,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicBlock>,
}

#[derive(Deserialize)]
struct AnthropicBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// HTTP client for both providers.
#[derive(Clone)]
pub struct LlmClient {
    http: reqwest::Client,
    openai_base_url: String,
    anthropic_base_url: String,
    openai_key: Option<String>,
    anthropic_key: Option<String>,
    max_tokens: u32,
}

impl LlmClient {
    pub fn new(
        http: reqwest::Client,
        config: &ChatConfig,
        openai_key: Option<String>,
        anthropic_key: Option<String>,
    ) -> Self {
        Self {
            http,
            openai_base_url: config.openai_base_url.trim_end_matches('/').to_string(),
            anthropic_base_url: config.anthropic_base_url.trim_end_matches('/').to_string(),
            openai_key: openai_key.filter(|k| !k.trim().is_empty()),
            anthropic_key: anthropic_key.filter(|k| !k.trim().is_empty()),
            max_tokens: config.max_tokens,
        }
    }

    /// Build a client reading keys from the env vars named in `config`.
    pub fn from_env(http: reqwest::Client, config: &ChatConfig) -> Self {
        let openai_key = std::env::var(&config.openai_key_env).ok();
        let anthropic_key = std::env::var(&config.anthropic_key_env).ok();
        tracing::info!(
            openai = openai_key.is_some(),
            anthropic = anthropic_key.is_some(),
            "chat provider keys loaded"
        );
        Self::new(http, config, openai_key, anthropic_key)
    }

    fn key_for(&self, provider: Provider) -> Option<&str> {
        match provider {
            Provider::OpenAi => self.openai_key.as_deref(),
            Provider::Anthropic => self.anthropic_key.as_deref(),
        }
    }

    async fn send<T: for<'de> Deserialize<'de>>(
        &self,
        provider: Provider,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ChatError> {
        let response = request
            .send()
            .await
            .map_err(|e| ChatError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(ChatError::Api {
                provider: provider.as_str(),
                status,
                message,
            });
        }

        response.json().await.map_err(|e| ChatError::Parse {
            provider: provider.as_str(),
            message: e.to_string(),
        })
    }

    async fn complete_openai(
        &self,
        key: &str,
        model: &str,
        system: &str,
        turns: &[Turn],
    ) -> Result<String, ChatError> {
        let mut messages = Vec::with_capacity(turns.len() + 1);
        if !system.is_empty() {
            messages.push(WireMessage {
                role: "system",
                content: system,
            });
        }
        messages.extend(turns.iter().map(|t| WireMessage {
            role: role_str(t.role),
            content: &t.content,
        }));
        let body = OpenAiRequest {
            model,
            messages,
            max_tokens: self.max_tokens,
        };

        let request = self
            .http
            .post(format!("{}/chat/completions", self.openai_base_url))
            .bearer_auth(key)
            .json(&body);
        let response: OpenAiResponse = self.send(Provider::OpenAi, request).await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ChatError::Parse {
                provider: Provider::OpenAi.as_str(),
                message: "response had no choices".into(),
            })
    }

    async fn complete_anthropic(
        &self,
        key: &str,
        model: &str,
        system: &str,
        turns: &[Turn],
    ) -> Result<String, ChatError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(key).map_err(|_| ChatError::NoApiKey {
                provider: Provider::Anthropic.as_str(),
            })?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(ANTHROPIC_VERSION));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let body = AnthropicRequest {
            model,
            max_tokens: self.max_tokens,
            system,
            messages: turns
                .iter()
                .map(|t| WireMessage {
                    role: role_str(t.role),
                    content: &t.content,
                })
                .collect(),
        };

        let request = self
            .http
            .post(format!("{}/messages", self.anthropic_base_url))
            .headers(headers)
            .json(&body);
        let response: AnthropicResponse = self.send(Provider::Anthropic, request).await?;

        let text: Vec<String> = response
            .content
            .into_iter()
            .filter(|b| b.kind == "text")
            .filter_map(|b| b.text)
            .collect();
        if text.is_empty() {
            return Err(ChatError::Parse {
                provider: Provider::Anthropic.as_str(),
                message: "response had no text blocks".into(),
            });
        }
        Ok(text.join(""))
    }
}

#[async_trait]
impl ChatCompleter for LlmClient {
    fn is_configured(&self, model: &str) -> bool {
        self.key_for(Provider::for_model(model)).is_some()
    }

    async fn complete(&self, model: &str, system: &str, turns: &[Turn]) -> Result<String, ChatError> {
        let provider = Provider::for_model(model);
        let key = self.key_for(provider).ok_or(ChatError::NoApiKey {
            provider: provider.as_str(),
        })?;
        let turns = normalize_turns(turns);

        tracing::debug!(provider = provider.as_str(), model, turns = turns.len(), "provider call");
        match provider {
            Provider::OpenAi => self.complete_openai(key, model, system, &turns).await,
            Provider::Anthropic => self.complete_anthropic(key, model, system, &turns).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_follows_model_prefix() {
        assert_eq!(Provider::for_model("claude-3-5-haiku-latest"), Provider::Anthropic);
        assert_eq!(Provider::for_model("Claude-Opus"), Provider::Anthropic);
        assert_eq!(Provider::for_model("gpt-4o-mini"), Provider::OpenAi);
        assert_eq!(Provider::for_model("llama3"), Provider::OpenAi);
    }

    #[test]
    fn normalize_merges_and_trims_leading_assistant() {
        let turns = vec![
            Turn::assistant("orphan"),
            Turn::user("a"),
            Turn::user("b"),
            Turn::assistant("c"),
            Turn::assistant("  "),
            Turn::assistant("d"),
            Turn::user("e"),
        ];
        let out = normalize_turns(&turns);
        assert_eq!(
            out,
            vec![Turn::user("a\n\nb"), Turn::assistant("c\n\nd"), Turn::user("e")]
        );
    }

    #[test]
    fn blank_keys_count_as_missing() {
        let client = LlmClient::new(
            reqwest::Client::new(),
            &ChatConfig::default(),
            Some("  ".into()),
            Some("sk-ant".into()),
        );
        assert!(!client.is_configured("gpt-4o-mini"));
        assert!(client.is_configured("claude-3-5-haiku-latest"));
    }

    #[tokio::test]
    async fn missing_key_errors_without_network() {
        let client = LlmClient::new(reqwest::Client::new(), &ChatConfig::default(), None, None);
        let err = client
            .complete("gpt-4o-mini", "sys", &[Turn::user("hi")])
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::NoApiKey { provider: "openai" }));
    }
}
