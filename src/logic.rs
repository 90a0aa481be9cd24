//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! This includes:
//!   - Quiz submission (score → park, stored per user when a park matches)
//!   - One chat exchange on a (possibly new) session
//!   - Review creation and 1-5 star ratings

use tracing::{info, instrument};

use crate::domain::{Rating, Review};
use crate::error::ApiError;
use crate::protocol::{ChatOut, QuizSubmitOut, RatingsOut};
use crate::state::AppState;
use crate::util::{non_blank, trunc_for_log};

pub const ANONYMOUS_USER: &str = "anonymous";

pub fn user_or_anonymous(user: Option<&str>) -> &str {
  non_blank(user).unwrap_or(ANONYMOUS_USER)
}

#[instrument(level = "info", skip(state))]
pub async fn submit_quiz(state: &AppState, user: &str, total_points: i64) -> Result<QuizSubmitOut, ApiError> {
  if total_points < 0 {
    return Err(ApiError::BadRequest("total_points must be a non-negative integer".into()));
  }

  let Some(range) = state.parks.lookup(total_points) else {
    info!(target: "quiz", %user, total_points, "Score matched no park; not stored");
    return Ok(QuizSubmitOut {
      total_points,
      assigned_park: state.parks.assign_park(total_points).to_string(),
      matched: false,
      quiz_result: None,
    });
  };

  let rec = state.quizzes.create(user, total_points, &range.park).await;
  info!(target: "quiz", %user, total_points, park = %rec.assigned_park, id = rec.id, "Quiz submitted");
  Ok(QuizSubmitOut {
    total_points,
    assigned_park: rec.assigned_park.clone(),
    matched: true,
    quiz_result: Some(rec),
  })
}

#[instrument(level = "info", skip(state, user_input), fields(input_len = user_input.len()))]
pub async fn chat_turn(
  state: &AppState,
  session_id: Option<&str>,
  user_input: &str,
  category: Option<&str>,
) -> Result<ChatOut, ApiError> {
  // Reject before touching the session map so bad input never creates a session.
  if user_input.trim().is_empty() {
    return Err(crate::chat::ChatError::InvalidInput.into());
  }

  let (session_id, session) = state.session(non_blank(session_id)).await;
  let mut session = session.lock().await;
  let reply = state.chat.post(&mut session, user_input, non_blank(category)).await?;

  info!(
    target: "chat",
    session = %session_id,
    fallback = reply.fallback,
    preview = %trunc_for_log(&reply.reply, 40),
    "Chat turn complete"
  );
  Ok(ChatOut {
    session_id,
    user_input: user_input.to_string(),
    model_response: reply.reply,
    fallback: reply.fallback,
    user_message_id: reply.user_message_id,
    assistant_message_id: reply.assistant_message_id,
  })
}

#[instrument(level = "info", skip(state, title, comment), fields(title_len = title.len(), comment_len = comment.len()))]
pub async fn create_review(
  state: &AppState,
  user: &str,
  park: Option<&str>,
  title: &str,
  comment: &str,
) -> Result<Review, ApiError> {
  let title = title.trim();
  if title.is_empty() {
    return Err(ApiError::BadRequest("Review title is required".into()));
  }
  let comment = comment.trim();
  if comment.is_empty() {
    return Err(ApiError::BadRequest("Review comment is required".into()));
  }
  let rec = state.reviews.create(user, non_blank(park), title, comment).await;
  info!(target: "reviews", id = rec.id, %user, "Review created");
  Ok(rec)
}

#[instrument(level = "info", skip(state))]
pub async fn rate_review(state: &AppState, review_id: u64, user: &str, stars: i64) -> Result<Rating, ApiError> {
  let stars = u8::try_from(stars)
    .ok()
    .filter(|s| (1..=5).contains(s))
    .ok_or_else(|| ApiError::BadRequest("Invalid star rating. Must be an integer between 1 and 5.".into()))?;
  let rec = state.reviews.rate(review_id, user, stars).await.ok_or_else(review_not_found)?;
  info!(target: "reviews", id = rec.id, review_id, stars, %user, "Review rated");
  Ok(rec)
}

pub async fn review_ratings(state: &AppState, review_id: u64) -> Result<RatingsOut, ApiError> {
  let ratings = state.reviews.ratings(review_id).await.ok_or_else(review_not_found)?;
  let count = ratings.len();
  let average = (count > 0).then(|| ratings.iter().map(|r| f64::from(r.stars)).sum::<f64>() / count as f64);
  Ok(RatingsOut { review_id, count, average, ratings })
}

pub fn review_not_found() -> ApiError {
  ApiError::NotFound("Review not found".into())
}
