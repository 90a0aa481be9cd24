//! Generative-text providers behind one narrow interface.
//!
//! The chat core only ever sees [`CompletionProvider`]; the concrete clients
//! (Gemini, OpenAI-compatible) are picked from environment variables at startup.
//! Tests swap in a scripted fake.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::config::AppConfig;
use crate::domain::ConversationTurn;

pub mod gemini;
pub mod openai;

pub use gemini::GeminiClient;
pub use openai::OpenAiClient;

const USER_AGENT_VALUE: &str = "trailhead-backend/0.1";

#[derive(Debug, Error)]
pub enum ProviderError {
  #[error("provider request timed out")]
  Timeout,
  #[error("network error: {0}")]
  Network(String),
  #[error("provider HTTP {status}: {message}")]
  Http { status: u16, message: String },
  #[error("invalid provider response: {0}")]
  Decode(String),
  #[error("provider returned no text")]
  Empty,
}

impl ProviderError {
  /// Worth one more attempt: timeouts, connection failures, throttling and server errors.
  pub fn is_transient(&self) -> bool {
    match self {
      ProviderError::Timeout | ProviderError::Network(_) => true,
      ProviderError::Http { status, .. } => *status == 429 || *status >= 500,
      ProviderError::Decode(_) | ProviderError::Empty => false,
    }
  }
}

impl From<reqwest::Error> for ProviderError {
  fn from(e: reqwest::Error) -> Self {
    if e.is_timeout() {
      ProviderError::Timeout
    } else if e.is_decode() {
      ProviderError::Decode(e.to_string())
    } else {
      ProviderError::Network(e.to_string())
    }
  }
}

/// Produces the next assistant reply given the conversation so far.
/// The last turn in `history` is the user's newest message.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
  fn name(&self) -> &str;

  async fn complete(&self, history: &[ConversationTurn]) -> Result<String, ProviderError>;
}

/// Pick a provider from the environment: Gemini first, then OpenAI, else none.
pub fn provider_from_env(cfg: &AppConfig) -> Option<Arc<dyn CompletionProvider>> {
  if let Some(g) = GeminiClient::from_env(cfg) {
    info!(target: "trailhead", base_url = %g.base_url, model = %g.model, "Gemini provider enabled.");
    return Some(Arc::new(g));
  }
  if let Some(o) = OpenAiClient::from_env(cfg) {
    info!(target: "trailhead", base_url = %o.base_url, model = %o.model, "OpenAI provider enabled.");
    return Some(Arc::new(o));
  }
  info!(target: "trailhead", "No provider key set (GEMINI_API_KEY / OPENAI_API_KEY). Chat will answer with the fallback reply.");
  None
}

/// Turn a non-2xx response into a `ProviderError::Http`, preferring the provider's own message.
async fn http_error(res: reqwest::Response) -> ProviderError {
  let status = res.status().as_u16();
  let body = res.text().await.unwrap_or_default();
  let message = extract_error_message(&body).unwrap_or(body);
  ProviderError::Http { status, message }
}

/// Both Gemini and OpenAI wrap failures as `{"error": {"message": ...}}`.
fn extract_error_message(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}
