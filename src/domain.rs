//! Domain models: conversation turns, stored quiz results and logged chat messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who produced a turn.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
  User,
  Assistant,
}

impl Role {
  pub fn as_str(&self) -> &'static str {
    match self {
      Role::User => "user",
      Role::Assistant => "assistant",
    }
  }
}

/// One message in a chat exchange, owned by exactly one session.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ConversationTurn {
  pub role: Role,
  pub text: String,
  pub created_at: DateTime<Utc>,
}

impl ConversationTurn {
  pub fn new(role: Role, text: impl Into<String>) -> Self {
    Self { role, text: text.into(), created_at: Utc::now() }
  }

  pub fn user(text: impl Into<String>) -> Self { Self::new(Role::User, text) }

  pub fn assistant(text: impl Into<String>) -> Self { Self::new(Role::Assistant, text) }
}

/// A stored quiz submission with the park it was assigned.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct QuizResult {
  pub id: u64,
  pub user: String,
  pub total_points: i64,
  pub assigned_park: String,
  pub timestamp: DateTime<Utc>,
}

/// Durable record of a chat turn. Never evicted, unlike session history.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LoggedMessage {
  pub id: u64,
  pub message: String,
  pub author: String,
  pub category: String,
  pub timestamp: DateTime<Utc>,
}

/// A user's write-up of a park or campsite.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Review {
  pub id: u64,
  pub user: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub park: Option<String>,
  pub title: String,
  pub comment: String,
  pub timestamp: DateTime<Utc>,
}

/// A 1-5 star rating attached to a review.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Rating {
  pub id: u64,
  pub review_id: u64,
  pub user: String,
  pub stars: u8,
  pub timestamp: DateTime<Utc>,
}
