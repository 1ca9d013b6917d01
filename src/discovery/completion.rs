//! Chat-completion discovery provider

use super::{http_client, DiscoveryContext, DiscoveryProvider, SourceKind, SuggestionBlock};
use crate::config::DiscoveryConfig;
use crate::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const USER_AGENT: &str = "MinecraftServerFinder/1.0";

const SYSTEM_PROMPT: &str = "You recommend public Minecraft Java Edition servers. \
Answer with a plain list, one server per line, formatted as `name - address`. \
Do not add any other commentary.";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatReply>,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// Completion provider: POST a fixed prompt, return the first completion
pub struct CompletionProvider {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    temperature: f32,
    api_key: Option<String>,
    max_results: usize,
}

impl CompletionProvider {
    pub fn new(config: &DiscoveryConfig) -> Result<Self> {
        Ok(CompletionProvider {
            client: http_client(config.timeout(), USER_AGENT)?,
            endpoint: config.completion.endpoint.clone(),
            model: config.completion.model.clone(),
            temperature: config.completion.temperature,
            api_key: config.completion.api_key.clone(),
            max_results: config.max_results,
        })
    }

    fn user_prompt(&self, ctx: &DiscoveryContext) -> String {
        let cause = if ctx.detail.is_empty() {
            ctx.reason.to_string()
        } else {
            format!("{}: {}", ctx.reason, ctx.detail)
        };
        format!(
            "The Minecraft server {} is unreachable ({}). \
             Suggest {} popular public servers the player could join instead.",
            ctx.address, cause, self.max_results
        )
    }

    async fn complete(&self, ctx: &DiscoveryContext) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: self.user_prompt(ctx),
                },
            ],
            temperature: self.temperature,
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let resp = request.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::http(format!("completion endpoint returned {}", status)));
        }

        let text = resp.text().await?;
        extract_completion(&text)
    }
}

#[async_trait]
impl DiscoveryProvider for CompletionProvider {
    fn kind(&self) -> SourceKind {
        SourceKind::Completion
    }

    async fn suggest_alternatives(&self, ctx: &DiscoveryContext) -> SuggestionBlock {
        match self.complete(ctx).await {
            Ok(text) => {
                debug!("[{}] completion returned {} bytes", ctx.address, text.len());
                SuggestionBlock::new(SourceKind::Completion, text)
            }
            Err(e) => {
                warn!("[{}] completion request failed: {}", ctx.address, e);
                SuggestionBlock::new(
                    SourceKind::Completion,
                    format!("Could not fetch suggestions from the completion service: {}", e),
                )
            }
        }
    }
}

/// Pull the first completion's text out of a chat-completion response body
fn extract_completion(body: &str) -> Result<String> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| Error::parse(format!("completion response is not valid JSON: {}", e)))?;

    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
        .ok_or_else(|| Error::parse("completion response contained no text"))
}
