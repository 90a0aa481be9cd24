//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{ConversationTurn, QuizResult, Rating};

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    Chat {
        #[serde(default)]
        session_id: Option<String>,
        user_input: String,
        #[serde(default)]
        category: Option<String>,
    },
    SubmitQuiz {
        #[serde(default)]
        user: Option<String>,
        #[serde(alias = "points")]
        total_points: i64,
    },
    ResetChat {
        session_id: String,
    },
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    ChatReply {
        #[serde(flatten)]
        reply: ChatOut,
    },
    QuizResult {
        #[serde(flatten)]
        result: QuizSubmitOut,
    },
    Reset {
        session_id: String,
    },
    Error {
        message: String,
    },
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    #[serde(default)]
    pub user: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct QuizIn {
    #[serde(default)]
    pub user: Option<String>,
    #[serde(alias = "points")]
    pub total_points: i64,
}

#[derive(Debug, Serialize)]
pub struct QuizSubmitOut {
    pub total_points: i64,
    pub assigned_park: String,
    /// False when the score fell outside every range; nothing is stored then.
    pub matched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quiz_result: Option<QuizResult>,
}

#[derive(Debug, Deserialize)]
pub struct QuizUpdateIn {
    pub id: u64,
    #[serde(default)]
    pub user: Option<String>,
    pub assigned_park: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatIn {
    pub user_input: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatOut {
    pub session_id: String,
    pub user_input: String,
    pub model_response: String,
    pub fallback: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_message_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assistant_message_id: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct HistoryOut {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub turns: Vec<ConversationTurn>,
}

#[derive(Debug, Deserialize)]
pub struct ReviewIn {
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub park: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Deserialize)]
pub struct RatingIn {
    #[serde(default)]
    pub user: Option<String>,
    pub stars: i64,
}

#[derive(Debug, Serialize)]
pub struct RatingsOut {
    pub review_id: u64,
    pub count: usize,
    /// Mean stars; null until the first rating.
    pub average: Option<f64>,
    pub ratings: Vec<Rating>,
}

#[derive(Debug, Serialize)]
pub struct MessageOut {
    pub message: String,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
    pub provider: Option<String>,
}
