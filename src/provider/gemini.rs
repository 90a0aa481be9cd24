//! Minimal Gemini client (`models/{model}:generateContent`).
//!
//! The whole retained history goes out as `contents`, with the camping-advice
//! system instruction attached separately. Calls log model, latency and token
//! usage, never message text or the API key.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use super::{http_error, CompletionProvider, ProviderError, USER_AGENT_VALUE};
use crate::config::{AppConfig, GenerationConfig};
use crate::domain::{ConversationTurn, Role};

#[derive(Clone)]
pub struct GeminiClient {
  client: reqwest::Client,
  api_key: String,
  pub base_url: String,
  pub model: String,
  system_instruction: String,
  generation: GenerationConfig,
}

impl GeminiClient {
  /// Construct the client if we find GEMINI_API_KEY; otherwise return None.
  pub fn from_env(cfg: &AppConfig) -> Option<Self> {
    let api_key = std::env::var("GEMINI_API_KEY").ok()?;
    let base_url = std::env::var("GEMINI_BASE_URL")
      .unwrap_or_else(|_| "https://generativelanguage.googleapis.com/v1beta".into());
    let model = std::env::var("GEMINI_MODEL").unwrap_or_else(|_| "gemini-1.5-flash".into());

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

  /// Gemini wants `contents` to open with a user turn and alternate roles. Leading
  /// model turns (left behind by eviction) are dropped, and consecutive turns of
  /// one role (left behind by a fallback) are merged into one multi-part entry.
  fn build_request(&self, history: &[ConversationTurn]) -> GenerateRequest {
    let start = history.iter().position(|t| t.role == Role::User).unwrap_or(history.len());
    let mut contents: Vec<Content> = Vec::with_capacity(history.len() - start);
    for t in &history[start..] {
      let role = match t.role {
        Role::User => "user",
        Role::Assistant => "model",
      };
      let part = Part { text: t.text.clone() };
      match contents.last_mut() {
        Some(prev) if prev.role.as_deref() == Some(role) => prev.parts.push(part),
        _ => contents.push(Content { role: Some(role.into()), parts: vec![part] }),
      }
    }

    GenerateRequest {
      system_instruction: Content { role: None, parts: vec![Part { text: self.system_instruction.clone() }] },
      contents,
      generation_config: GenConfig {
        temperature: self.generation.temperature,
        top_p: self.generation.top_p,
        top_k: self.generation.top_k,
        max_output_tokens: self.generation.max_output_tokens,
        response_mime_type: "text/plain".into(),
      },
    }
  }
}

#[async_trait]
impl CompletionProvider for GeminiClient {
  fn name(&self) -> &str { "gemini" }

  #[instrument(level = "info", skip(self, history), fields(model = %self.model, turns = history.len()))]
  async fn complete(&self, history: &[ConversationTurn]) -> Result<String, ProviderError> {
    let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
    let req = self.build_request(history);

    let start = Instant::now();
    let res = self.client.post(&url)
      .header(USER_AGENT, USER_AGENT_VALUE)
      .header(CONTENT_TYPE, "application/json")
      .header("x-goog-api-key", &self.api_key)
      .json(&req).send().await?;

    if !res.status().is_success() {
      return Err(http_error(res).await);
    }

    let body: GenerateResponse = res.json().await?;
    if let Some(usage) = &body.usage_metadata {
      info!(prompt_tokens = ?usage.prompt_token_count, candidate_tokens = ?usage.candidates_token_count, total_tokens = ?usage.total_token_count, elapsed = ?start.elapsed(), "Gemini usage");
    }
    reply_text(body)
  }
}

/// Join the first candidate's parts and drop trailing newlines.
fn reply_text(body: GenerateResponse) -> Result<String, ProviderError> {
  let text: String = body.candidates
    .into_iter()
    .next()
    .and_then(|c| c.content)
    .map(|c| c.parts.into_iter().map(|p| p.text).collect())
    .unwrap_or_default();
  let text = text.trim_end_matches(['\n', '\r']).to_string();
  if text.trim().is_empty() { Err(ProviderError::Empty) } else { Ok(text) }
}

// --- Gemini DTOs ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
  system_instruction: Content,
  contents: Vec<Content>,
  generation_config: GenConfig,
}

#[derive(Serialize, Deserialize)]
struct Content {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  role: Option<String>,
  #[serde(default)]
  parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
  #[serde(default)]
  text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenConfig {
  temperature: f32,
  top_p: f32,
  top_k: u32,
  max_output_tokens: u32,
  response_mime_type: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
  #[serde(default)]
  candidates: Vec<Candidate>,
  #[serde(default)]
  usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize)]
struct Candidate {
  #[serde(default)]
  content: Option<Content>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
  #[serde(default)] prompt_token_count: Option<u32>,
  #[serde(default)] candidates_token_count: Option<u32>,
  #[serde(default)] total_token_count: Option<u32>,
}

#[cfg(test)]
mod tests {
  use super::*;

  fn client() -> GeminiClient {
    let cfg = AppConfig::default();
    GeminiClient {
      client: reqwest::Client::new(),
      api_key: "test-key".into(),
      base_url: "http://localhost".into(),
      model: "gemini-1.5-flash".into(),
      system_instruction: cfg.chat.system_instruction,
      generation: cfg.generation,
    }
  }

  #[test]
  fn request_maps_roles_and_generation_config() {
    let history = vec![
      ConversationTurn::user("best tent for tundra?"),
      ConversationTurn::assistant("A four-season tent."),
      ConversationTurn::user("and a stove?"),
    ];
    let v = serde_json::to_value(client().build_request(&history)).unwrap();

    let roles: Vec<&str> = v["contents"].as_array().unwrap().iter().map(|c| c["role"].as_str().unwrap()).collect();
    assert_eq!(roles, ["user", "model", "user"]);
    assert_eq!(v["contents"][2]["parts"][0]["text"], "and a stove?");
    assert!(v["systemInstruction"].get("role").is_none());
    assert_eq!(v["generationConfig"]["topK"], 50);
    assert_eq!(v["generationConfig"]["maxOutputTokens"], 10_000);
    assert_eq!(v["generationConfig"]["responseMimeType"], "text/plain");
  }

  #[test]
  fn contents_open_with_user_and_alternate() {
    // What a capped session looks like after evictions and a failed exchange.
    let history = vec![
      ConversationTurn::assistant("orphaned reply"),
      ConversationTurn::user("first try"),
      ConversationTurn::user("second try"),
      ConversationTurn::assistant("Here you go."),
    ];
    let v = serde_json::to_value(client().build_request(&history)).unwrap();
    let contents = v["contents"].as_array().unwrap();
    let roles: Vec<&str> = contents.iter().map(|c| c["role"].as_str().unwrap()).collect();
    assert_eq!(roles, ["user", "model"]);
    assert_eq!(contents[0]["parts"][0]["text"], "first try");
    assert_eq!(contents[0]["parts"][1]["text"], "second try");

    let only_model = vec![ConversationTurn::assistant("hello")];
    let v = serde_json::to_value(client().build_request(&only_model)).unwrap();
    assert!(v["contents"].as_array().unwrap().is_empty());
  }

  #[test]
  fn reply_joins_parts_and_strips_trailing_newlines() {
    let body: GenerateResponse = serde_json::from_str(
      r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Pack layers. "},{"text":"Bring water.\n\n"}]}}]}"#,
    ).unwrap();
    assert_eq!(reply_text(body).unwrap(), "Pack layers. Bring water.");
  }

  #[test]
  fn blocked_candidate_is_empty() {
    let body: GenerateResponse = serde_json::from_str(r#"{"candidates":[{"finishReason":"SAFETY"}]}"#).unwrap();
    assert!(matches!(reply_text(body), Err(ProviderError::Empty)));
  }
}
