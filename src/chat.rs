//! Chat sessions for the camping assistant.
//!
//! A [`ChatSession`] owns a bounded window of recent turns. [`ChatService`] runs one
//! exchange against it: validate, record the user turn, ask the provider with the
//! whole window as context, record the reply. Provider failures never escape
//! `post`; the caller gets the configured fallback reply instead and the history
//! gains no assistant turn.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use crate::config::ChatConfig;
use crate::domain::{ConversationTurn, Role};
use crate::history::BoundedHistory;
use crate::provider::{CompletionProvider, ProviderError};
use crate::store::MessageLog;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChatError {
  #[error("User input is required")]
  InvalidInput,
}

pub struct ChatSession {
  pub id: String,
  pub created_at: DateTime<Utc>,
  /// Monotonic time of the last exchange; drives idle eviction.
  pub last_used: Instant,
  history: BoundedHistory<ConversationTurn>,
}

impl ChatSession {
  pub fn new(id: impl Into<String>, max_history: usize) -> Self {
    Self {
      id: id.into(),
      created_at: Utc::now(),
      last_used: Instant::now(),
      history: BoundedHistory::new(max_history),
    }
  }

  /// Append a turn, returning the one evicted to make room, if any.
  pub fn record(&mut self, turn: ConversationTurn) -> Option<ConversationTurn> {
    let evicted = self.history.push(turn);
    if evicted.is_some() {
      debug!(target: "chat", session = %self.id, cap = self.history.capacity(), "Evicted oldest turn");
    }
    evicted
  }

  /// Snapshot of the retained turns, oldest first.
  pub fn history(&self) -> Vec<ConversationTurn> { self.history.to_vec() }

  pub fn len(&self) -> usize { self.history.len() }

  pub fn reset(&mut self) { self.history.clear(); }
}

/// Outcome of one exchange.
#[derive(Clone, Debug, PartialEq)]
pub struct ChatReply {
  pub reply: String,
  /// True when `reply` is the fallback text rather than a model answer.
  pub fallback: bool,
  pub user_message_id: Option<u64>,
  pub assistant_message_id: Option<u64>,
}

pub struct ChatService {
  provider: Option<Arc<dyn CompletionProvider>>,
  log: Arc<MessageLog>,
  cfg: ChatConfig,
}

impl ChatService {
  pub fn new(provider: Option<Arc<dyn CompletionProvider>>, log: Arc<MessageLog>, cfg: ChatConfig) -> Self {
    Self { provider, log, cfg }
  }

  pub fn provider_name(&self) -> Option<&str> { self.provider.as_deref().map(|p| p.name()) }

  pub fn new_session(&self, id: impl Into<String>) -> ChatSession {
    ChatSession::new(id, self.cfg.max_history)
  }

  /// Run one user → assistant exchange on `session`.
  ///
  /// Only blank input is an error, and it leaves the session and log untouched.
  /// Accepted input is recorded exactly as given; trimming is for validation only.
  #[instrument(level = "info", skip(self, session, user_input), fields(session = %session.id, input_len = user_input.len()))]
  pub async fn post(&self, session: &mut ChatSession, user_input: &str, category: Option<&str>) -> Result<ChatReply, ChatError> {
    if user_input.trim().is_empty() {
      return Err(ChatError::InvalidInput);
    }
    let category = category.unwrap_or(&self.cfg.default_category);

    session.last_used = Instant::now();
    session.record(ConversationTurn::user(user_input));
    let user_message_id = self.persist(Role::User, user_input, category).await;

    let Some(provider) = &self.provider else {
      warn!(target: "chat", session = %session.id, "No provider configured; answering with fallback.");
      return Ok(self.fallback(user_message_id));
    };

    let outcome = self.complete_with_retry(provider.as_ref(), session.history.as_slice()).await;
    match outcome {
      Ok(reply) => {
        session.record(ConversationTurn::assistant(reply.clone()));
        let assistant_message_id = self.persist(Role::Assistant, &reply, category).await;
        info!(target: "chat", session = %session.id, provider = provider.name(), reply_len = reply.len(), turns = session.len(), "Assistant replied");
        Ok(ChatReply { reply, fallback: false, user_message_id, assistant_message_id })
      }
      Err(e) => {
        error!(target: "chat", session = %session.id, provider = provider.name(), error = %e, "Provider failed; answering with fallback.");
        Ok(self.fallback(user_message_id))
      }
    }
  }

  /// One call plus up to `max_retries` more on transient failures, each under the timeout.
  async fn complete_with_retry(&self, provider: &dyn CompletionProvider, history: &[ConversationTurn]) -> Result<String, ProviderError> {
    let timeout = Duration::from_secs(self.cfg.timeout_secs);
    let mut attempt = 0u32;
    loop {
      let result = match tokio::time::timeout(timeout, provider.complete(history)).await {
        Ok(r) => r,
        Err(_) => Err(ProviderError::Timeout),
      };
      match result {
        Err(e) if e.is_transient() && attempt < self.cfg.max_retries => {
          attempt += 1;
          warn!(target: "chat", provider = provider.name(), attempt, error = %e, "Transient provider failure; retrying");
        }
        other => return other,
      }
    }
  }

  async fn persist(&self, role: Role, text: &str, category: &str) -> Option<u64> {
    if !self.cfg.persist_turns {
      return None;
    }
    Some(self.log.create(text, role.as_str(), category).await.id)
  }

  fn fallback(&self, user_message_id: Option<u64>) -> ChatReply {
    ChatReply {
      reply: self.cfg.fallback_reply.clone(),
      fallback: true,
      user_message_id,
      assistant_message_id: None,
    }
  }
}
