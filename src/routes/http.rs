//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented; bodies are logged by size, never by content.
//!
//! JSON, query and path extraction failures come back as 400 `{"message"}` rather
//! than axum's default plain-text 422.

use std::sync::Arc;
use axum::{
  extract::{rejection::{JsonRejection, PathRejection, QueryRejection}, Path, Query, State},
  http::StatusCode,
  Json,
};
use tracing::{info, instrument};

use crate::domain::{LoggedMessage, QuizResult, Rating, Review};
use crate::error::ApiError;
use crate::logic::*;
use crate::parks::ScoreRange;
use crate::protocol::*;
use crate::state::AppState;
use crate::util::non_blank;
use crate::store::{MessageUpdate, ReviewUpdate};

type ApiResult<T> = Result<Json<T>, ApiError>;

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> Json<HealthOut> {
  Json(HealthOut { ok: true, provider: state.chat.provider_name().map(str::to_string) })
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_parks(State(state): State<Arc<AppState>>) -> Json<Vec<ScoreRange>> {
  Json(state.parks.ranges().to_vec())
}

// --- Quiz ---

#[instrument(level = "info", skip(state, payload))]
pub async fn http_post_quiz(
  State(state): State<Arc<AppState>>,
  payload: Result<Json<QuizIn>, JsonRejection>,
) -> ApiResult<QuizSubmitOut> {
  let Json(body) = payload?;
  let user = user_or_anonymous(body.user.as_deref());
  Ok(Json(submit_quiz(&state, user, body.total_points).await?))
}

#[instrument(level = "info", skip(state, q))]
pub async fn http_get_quiz(
  State(state): State<Arc<AppState>>,
  q: Result<Query<UserQuery>, QueryRejection>,
) -> ApiResult<QuizResult> {
  let Query(q) = q?;
  let user = user_or_anonymous(q.user.as_deref());
  let rec = state.quizzes.latest(user).await
    .ok_or_else(|| ApiError::NotFound("Quiz result not found".into()))?;
  Ok(Json(rec))
}

#[instrument(level = "info", skip(state, payload))]
pub async fn http_put_quiz(
  State(state): State<Arc<AppState>>,
  payload: Result<Json<QuizUpdateIn>, JsonRejection>,
) -> ApiResult<QuizResult> {
  let Json(body) = payload?;
  let park = body.assigned_park.trim();
  if park.is_empty() {
    return Err(ApiError::BadRequest("assigned_park must be a non-empty string".into()));
  }
  let user = user_or_anonymous(body.user.as_deref());
  let rec = state.quizzes.update(body.id, user, park).await
    .ok_or_else(|| ApiError::NotFound("Quiz result not found".into()))?;
  info!(target: "quiz", id = rec.id, %user, park = %rec.assigned_park, "Quiz result updated");
  Ok(Json(rec))
}

#[instrument(level = "info", skip(state, q))]
pub async fn http_delete_quiz(
  State(state): State<Arc<AppState>>,
  q: Result<Query<UserQuery>, QueryRejection>,
) -> ApiResult<MessageOut> {
  let Query(q) = q?;
  let user = user_or_anonymous(q.user.as_deref());
  let rec = state.quizzes.delete_latest(user).await
    .ok_or_else(|| ApiError::NotFound("No quiz results found for this user".into()))?;
  info!(target: "quiz", id = rec.id, %user, "Latest quiz result deleted");
  Ok(Json(MessageOut { message: "Latest quiz result deleted successfully".into() }))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_quizzes(State(state): State<Arc<AppState>>) -> Json<Vec<QuizResult>> {
  Json(state.quizzes.all().await)
}

// --- Chat ---

#[instrument(level = "info", skip(state, payload))]
pub async fn http_post_chat(
  State(state): State<Arc<AppState>>,
  payload: Result<Json<ChatIn>, JsonRejection>,
) -> ApiResult<ChatOut> {
  let Json(body) = payload?;
  let out = chat_turn(&state, body.session_id.as_deref(), &body.user_input, body.category.as_deref()).await?;
  Ok(Json(out))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_chat_history(
  State(state): State<Arc<AppState>>,
  Path(session_id): Path<String>,
) -> ApiResult<HistoryOut> {
  let session = state.find_session(&session_id).await
    .ok_or_else(|| ApiError::NotFound("Chat session not found".into()))?;
  let session = session.lock().await;
  Ok(Json(HistoryOut { session_id, created_at: session.created_at, turns: session.history() }))
}

#[instrument(level = "info", skip(state))]
pub async fn http_delete_chat(
  State(state): State<Arc<AppState>>,
  Path(session_id): Path<String>,
) -> ApiResult<MessageOut> {
  if !state.remove_session(&session_id).await {
    return Err(ApiError::NotFound("Chat session not found".into()));
  }
  Ok(Json(MessageOut { message: "Chat session reset".into() }))
}

// --- Message log ---

#[instrument(level = "info", skip(state))]
pub async fn http_get_messages(State(state): State<Arc<AppState>>) -> Json<Vec<LoggedMessage>> {
  Json(state.messages.list().await)
}

#[instrument(level = "info", skip(state, id))]
pub async fn http_get_message(
  State(state): State<Arc<AppState>>,
  id: Result<Path<u64>, PathRejection>,
) -> ApiResult<LoggedMessage> {
  let Path(id) = id?;
  let rec = state.messages.get(id).await.ok_or_else(message_not_found)?;
  Ok(Json(rec))
}

#[instrument(level = "info", skip(state, id, payload))]
pub async fn http_put_message(
  State(state): State<Arc<AppState>>,
  id: Result<Path<u64>, PathRejection>,
  payload: Result<Json<MessageUpdate>, JsonRejection>,
) -> ApiResult<LoggedMessage> {
  let Path(id) = id?;
  let Json(update) = payload?;
  if update.is_empty() {
    return Err(ApiError::BadRequest("Nothing to update: provide message, author or category".into()));
  }
  let rec = state.messages.update(id, update).await.ok_or_else(message_not_found)?;
  info!(target: "chat", id, "Logged message updated");
  Ok(Json(rec))
}

#[instrument(level = "info", skip(state, id))]
pub async fn http_delete_message(
  State(state): State<Arc<AppState>>,
  id: Result<Path<u64>, PathRejection>,
) -> ApiResult<MessageOut> {
  let Path(id) = id?;
  state.messages.delete(id).await.ok_or_else(message_not_found)?;
  info!(target: "chat", id, "Logged message deleted");
  Ok(Json(MessageOut { message: "Message deleted".into() }))
}

// --- Reviews & ratings ---

#[instrument(level = "info", skip(state, q))]
pub async fn http_get_reviews(
  State(state): State<Arc<AppState>>,
  q: Result<Query<UserQuery>, QueryRejection>,
) -> ApiResult<Vec<Review>> {
  let Query(q) = q?;
  Ok(Json(state.reviews.list(non_blank(q.user.as_deref())).await))
}

#[instrument(level = "info", skip(state, payload))]
pub async fn http_post_review(
  State(state): State<Arc<AppState>>,
  payload: Result<Json<ReviewIn>, JsonRejection>,
) -> ApiResult<Review> {
  let Json(body) = payload?;
  let user = user_or_anonymous(body.user.as_deref());
  let rec = create_review(&state, user, body.park.as_deref(), &body.title, &body.comment).await?;
  Ok(Json(rec))
}

#[instrument(level = "info", skip(state, id))]
pub async fn http_get_review(
  State(state): State<Arc<AppState>>,
  id: Result<Path<u64>, PathRejection>,
) -> ApiResult<Review> {
  let Path(id) = id?;
  let rec = state.reviews.get(id).await.ok_or_else(review_not_found)?;
  Ok(Json(rec))
}

#[instrument(level = "info", skip(state, id, payload))]
pub async fn http_put_review(
  State(state): State<Arc<AppState>>,
  id: Result<Path<u64>, PathRejection>,
  payload: Result<Json<ReviewUpdate>, JsonRejection>,
) -> ApiResult<Review> {
  let Path(id) = id?;
  let Json(update) = payload?;
  if update.is_empty() {
    return Err(ApiError::BadRequest("Nothing to update: provide title, comment or park".into()));
  }
  let blank = |v: &Option<String>| v.as_deref().is_some_and(|t| t.trim().is_empty());
  if blank(&update.title) || blank(&update.comment) {
    return Err(ApiError::BadRequest("Review title and comment cannot be blank".into()));
  }
  let rec = state.reviews.update(id, update).await.ok_or_else(review_not_found)?;
  info!(target: "reviews", id, "Review updated");
  Ok(Json(rec))
}

#[instrument(level = "info", skip(state, id))]
pub async fn http_delete_review(
  State(state): State<Arc<AppState>>,
  id: Result<Path<u64>, PathRejection>,
) -> ApiResult<MessageOut> {
  let Path(id) = id?;
  let (_, ratings) = state.reviews.delete(id).await.ok_or_else(review_not_found)?;
  info!(target: "reviews", id, ratings, "Review deleted");
  Ok(Json(MessageOut { message: "Review deleted".into() }))
}

#[instrument(level = "info", skip(state, id))]
pub async fn http_get_ratings(
  State(state): State<Arc<AppState>>,
  id: Result<Path<u64>, PathRejection>,
) -> ApiResult<RatingsOut> {
  let Path(id) = id?;
  Ok(Json(review_ratings(&state, id).await?))
}

#[instrument(level = "info", skip(state, id, payload))]
pub async fn http_post_rating(
  State(state): State<Arc<AppState>>,
  id: Result<Path<u64>, PathRejection>,
  payload: Result<Json<RatingIn>, JsonRejection>,
) -> Result<(StatusCode, Json<Rating>), ApiError> {
  let Path(id) = id?;
  let Json(body) = payload?;
  let user = user_or_anonymous(body.user.as_deref());
  let rec = rate_review(&state, id, user, body.stars).await?;
  Ok((StatusCode::CREATED, Json(rec)))
}

fn message_not_found() -> ApiError {
  ApiError::NotFound("Message not found".into())
}
