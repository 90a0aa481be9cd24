//! Minimal OpenAI-compatible client (chat.completions, plain text only).
//!
//! Calls are instrumented and log model names, latencies, and token usage (not contents).
//!
//! NOTE: We never log the API key.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use super::{http_error, CompletionProvider, ProviderError, USER_AGENT_VALUE};
use crate::config::{AppConfig, GenerationConfig};
use crate::domain::ConversationTurn;

#[derive(Clone)]
pub struct OpenAiClient {
  client: reqwest::Client,
  api_key: String,
  pub base_url: String,
  pub model: String,
  system_instruction: String,
  generation: GenerationConfig,
}

impl OpenAiClient {
  /// Construct the client if we find OPENAI_API_KEY; otherwise return None.
  pub fn from_env(cfg: &AppConfig) -> Option<Self> {
    let api_key = std::env::var("OPENAI_API_KEY").ok()?;
    let base_url =
      std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
    let model =
      std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());

    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(cfg.chat.timeout_secs))
      .build()
      .ok()?;

    Some(Self {
      client,
      api_key,
      base_url,
      model,
      system_instruction: cfg.chat.system_instruction.clone(),
      generation: cfg.generation.clone(),
    })
  }

  fn build_request(&self, history: &[ConversationTurn]) -> ChatCompletionRequest {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(ChatMessageReq { role: "system".into(), content: self.system_instruction.clone() });
    messages.extend(history.iter().map(|t| ChatMessageReq { role: t.role.as_str().into(), content: t.text.clone() }));
    ChatCompletionRequest {
      model: self.model.clone(),
      messages,
      temperature: self.generation.temperature,
      top_p: self.generation.top_p,
      max_tokens: Some(self.generation.max_output_tokens),
    }
  }
}

#[async_trait]
impl CompletionProvider for OpenAiClient {
  fn name(&self) -> &str { "openai" }

  #[instrument(level = "info", skip(self, history), fields(model = %self.model, turns = history.len()))]
  async fn complete(&self, history: &[ConversationTurn]) -> Result<String, ProviderError> {
    let url = format!("{}/chat/completions", self.base_url);
    let req = self.build_request(history);

    let start = Instant::now();
    let res = self.client.post(&url)
      .header(USER_AGENT, USER_AGENT_VALUE)
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req).send().await?;

    if !res.status().is_success() {
      return Err(http_error(res).await);
    }

    let body: ChatCompletionResponse = res.json().await?;
    if let Some(usage) = &body.usage {
      info!(prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, elapsed = ?start.elapsed(), "OpenAI usage");
    }
    let text = body.choices.into_iter().next()
      .and_then(|c| c.message.content)
      .unwrap_or_default().trim().to_string();

    if text.is_empty() { Err(ProviderError::Empty) } else { Ok(text) }
  }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  top_p: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  max_tokens: Option<u32>,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}
