//! Router assembly: HTTP endpoints, WebSocket upgrade, static files, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;
pub mod ws;

/// Build the application router with:
/// - WebSocket at `/ws`
/// - REST-ish API under `/api/v1/...`
/// - Static frontend from `./static` with index fallback
/// - CORS (allow any origin/method/headers)
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    let static_service = ServeDir::new("./static")
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new("./static/index.html"));

    Router::new()
        // WebSocket
        .route("/ws", get(ws::ws_upgrade))
        // HTTP API
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/parks", get(http::http_get_parks))
        .route(
            "/api/v1/quiz",
            post(http::http_post_quiz)
                .get(http::http_get_quiz)
                .put(http::http_put_quiz)
                .delete(http::http_delete_quiz),
        )
        .route("/api/v1/quizzes", get(http::http_get_quizzes))
        .route("/api/v1/chat", post(http::http_post_chat))
        .route(
            "/api/v1/chat/:session_id",
            get(http::http_get_chat_history).delete(http::http_delete_chat),
        )
        .route("/api/v1/messages", get(http::http_get_messages))
        .route(
            "/api/v1/messages/:id",
            get(http::http_get_message)
                .put(http::http_put_message)
                .delete(http::http_delete_message),
        )
        .route("/api/v1/reviews", get(http::http_get_reviews).post(http::http_post_review))
        .route(
            "/api/v1/reviews/:id",
            get(http::http_get_review)
                .put(http::http_put_review)
                .delete(http::http_delete_review),
        )
        .route(
            "/api/v1/reviews/:id/ratings",
            get(http::http_get_ratings).post(http::http_post_rating),
        )
        // State + CORS + HTTP tracing
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Frontend fallback
        .fallback_service(static_service)
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        Router,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::chat::tests::ScriptedProvider;
    use crate::config::AppConfig;
    use crate::provider::ProviderError;

    fn app_with(script: Vec<Result<String, ProviderError>>) -> Router {
        let state = AppState::new(AppConfig::default(), Some(Arc::new(ScriptedProvider::new(script))));
        build_router(Arc::new(state))
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let req = Request::builder().method(method).uri(uri);
        let req = match body {
            Some(b) => req
                .header("Content-Type", "application/json")
                .body(Body::from(b.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, value)
    }

    #[tokio::test]
    async fn health_reports_provider() {
        let app = app_with(vec![]);
        let (status, body) = send(&app, "GET", "/api/v1/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "ok": true, "provider": "scripted" }));
    }

    #[tokio::test]
    async fn parks_lists_default_table() {
        let app = app_with(vec![]);
        let (_, body) = send(&app, "GET", "/api/v1/parks", None).await;
        assert_eq!(body.as_array().unwrap().len(), 4);
        assert_eq!(body[0], json!({ "min": 70, "max": 130, "park": "Denali National Park" }));
    }

    #[tokio::test]
    async fn quiz_lifecycle() {
        let app = app_with(vec![]);

        let (status, body) = send(&app, "POST", "/api/v1/quiz", Some(json!({ "user": "ana", "total_points": 150 }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["assigned_park"], "Grand Canyon National Park");
        assert_eq!(body["matched"], true);
        let id = body["quiz_result"]["id"].as_u64().unwrap();

        let (status, body) = send(&app, "GET", "/api/v1/quiz?user=ana", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], id);

        let (status, body) = send(&app, "PUT", "/api/v1/quiz", Some(json!({ "id": id, "user": "ana", "assigned_park": "Zion National Park" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["assigned_park"], "Zion National Park");

        let (_, all) = send(&app, "GET", "/api/v1/quizzes", None).await;
        assert_eq!(all.as_array().unwrap().len(), 1);

        let (status, _) = send(&app, "DELETE", "/api/v1/quiz?user=ana", None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = send(&app, "GET", "/api/v1/quiz?user=ana", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Quiz result not found");
    }

    #[tokio::test]
    async fn quiz_accepts_points_alias_and_reports_gaps() {
        let app = app_with(vec![]);
        let (status, body) = send(&app, "POST", "/api/v1/quiz", Some(json!({ "points": 300 }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["assigned_park"], "No matching park found");
        assert_eq!(body["matched"], false);
        assert!(body.get("quiz_result").is_none());
    }

    #[tokio::test]
    async fn quiz_rejects_bad_scores_with_400() {
        let app = app_with(vec![]);
        for payload in [json!({}), json!({ "total_points": "lots" }), json!({ "total_points": 12.5 }), json!({ "total_points": -3 })] {
            let (status, body) = send(&app, "POST", "/api/v1/quiz", Some(payload.clone())).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "payload {payload}");
            assert!(body["message"].is_string());
        }
    }

    #[tokio::test]
    async fn chat_round_trip_and_history() {
        let app = app_with(vec![Ok("Pitch your tent on high ground.".into())]);

        let (status, body) = send(&app, "POST", "/api/v1/chat", Some(json!({ "user_input": "rain tips?" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user_input"], "rain tips?");
        assert_eq!(body["model_response"], "Pitch your tent on high ground.");
        assert_eq!(body["fallback"], false);
        let sid = body["session_id"].as_str().unwrap().to_string();

        let (status, hist) = send(&app, "GET", &format!("/api/v1/chat/{sid}"), None).await;
        assert_eq!(status, StatusCode::OK);
        let turns = hist["turns"].as_array().unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0]["role"], "user");
        assert_eq!(turns[1]["role"], "assistant");

        let (_, msgs) = send(&app, "GET", "/api/v1/messages", None).await;
        assert_eq!(msgs.as_array().unwrap().len(), 2);

        let (status, _) = send(&app, "DELETE", &format!("/api/v1/chat/{sid}"), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&app, "GET", &format!("/api/v1/chat/{sid}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn empty_chat_input_is_400() {
        let app = app_with(vec![]);
        let (status, body) = send(&app, "POST", "/api/v1/chat", Some(json!({ "user_input": "" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "User input is required");

        let (status, _) = send(&app, "POST", "/api/v1/chat", Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn upstream_failure_returns_fallback_not_500() {
        let app = app_with(vec![Err(ProviderError::Http { status: 403, message: "quota".into() })]);
        let (status, body) = send(&app, "POST", "/api/v1/chat", Some(json!({ "user_input": "hi", "session_id": "s1" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["fallback"], true);
        assert_eq!(body["session_id"], "s1");
        assert!(body.get("assistant_message_id").is_none());
    }

    #[tokio::test]
    async fn message_log_edit_and_delete() {
        let app = app_with(vec![]);
        let (_, chat) = send(&app, "POST", "/api/v1/chat", Some(json!({ "user_input": "hello", "category": "greetings" }))).await;
        let id = chat["user_message_id"].as_u64().unwrap();

        let (status, rec) = send(&app, "GET", &format!("/api/v1/messages/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(rec["category"], "greetings");
        assert_eq!(rec["author"], "user");

        let (status, rec) = send(&app, "PUT", &format!("/api/v1/messages/{id}"), Some(json!({ "message": "hello there" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(rec["message"], "hello there");

        let (status, _) = send(&app, "PUT", &format!("/api/v1/messages/{id}"), Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, "DELETE", &format!("/api/v1/messages/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = send(&app, "DELETE", &format!("/api/v1/messages/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Message not found");

        let (status, _) = send(&app, "GET", "/api/v1/messages/not-a-number", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn reviews_and_ratings() {
        let app = app_with(vec![]);

        let (status, body) = send(&app, "POST", "/api/v1/reviews", Some(json!({ "user": "ana", "title": "Bears" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Review comment is required");

        let (status, review) = send(
            &app,
            "POST",
            "/api/v1/reviews",
            Some(json!({ "user": "ana", "park": "Denali National Park", "title": "Bears", "comment": "Use the food lockers." })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let id = review["id"].as_u64().unwrap();
        let ratings_uri = format!("/api/v1/reviews/{id}/ratings");

        let (status, rating) = send(&app, "POST", &ratings_uri, Some(json!({ "user": "ben", "stars": 5 }))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(rating["review_id"], id);
        for stars in [json!(0), json!(6), json!(4.5)] {
            let (status, _) = send(&app, "POST", &ratings_uri, Some(json!({ "stars": stars }))).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "stars {stars}");
        }
        send(&app, "POST", &ratings_uri, Some(json!({ "stars": 4 }))).await;
        let (_, summary) = send(&app, "GET", &ratings_uri, None).await;
        assert_eq!(summary["count"], 2);
        assert_eq!(summary["average"], 4.5);

        let (status, up) = send(&app, "PUT", &format!("/api/v1/reviews/{id}"), Some(json!({ "title": "Bears!" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(up["title"], "Bears!");
        assert_eq!(up["comment"], "Use the food lockers.");

        let (_, mine) = send(&app, "GET", "/api/v1/reviews?user=ana", None).await;
        assert_eq!(mine.as_array().unwrap().len(), 1);
        let (_, theirs) = send(&app, "GET", "/api/v1/reviews?user=ben", None).await;
        assert!(theirs.as_array().unwrap().is_empty());

        let (status, _) = send(&app, "DELETE", &format!("/api/v1/reviews/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = send(&app, "GET", &ratings_uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Review not found");
        let (status, _) = send(&app, "POST", &ratings_uri, Some(json!({ "stars": 3 }))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
