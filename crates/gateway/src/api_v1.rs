//! HTTP API v1 - chat and session memory.
//!
//! Endpoints:
//!
//! - `POST /api/v1/chat`                - Send a message, get the full turn
//! - `POST /api/v1/chat/stream`         - Send a message, get an SSE stream
//! - `POST /api/v1/chat/stream_tokens`  - SSE stream of answer tokens only
//! - `GET  /api/v1/memory`              - Inspect a session's memory
//! - `POST /api/v1/memory/summary`      - Force a summarization pass
//! - `POST /api/v1/memory/clear`        - Reset a session
//! - `POST /api/v1/memory/threshold`    - Change the summarization threshold

use axum::{
    Router,
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    response::sse::{Event as SseEvent, KeepAlive, Sse},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::StreamExt;
use tracing::{info, warn};

use wayfarer_agent::{HistoryEntry, StreamEvent, StreamMode, TurnOrchestrator, TurnResponse};
use wayfarer_core::memory::{DEFAULT_SESSION_ID, SessionMemory, SessionStats, ThresholdScope};

// ── State ─────────────────────────────────────────────────────────────────

/// Shared state for the v1 API.
pub struct ApiV1State {
    pub orchestrator: Arc<TurnOrchestrator>,
}

impl ApiV1State {
    pub fn new(orchestrator: Arc<TurnOrchestrator>) -> Self {
        Self { orchestrator }
    }

    fn memory(&self) -> &Arc<dyn SessionMemory> {
        self.orchestrator.memory()
    }
}

pub type SharedApiState = Arc<ApiV1State>;

// ── Router ────────────────────────────────────────────────────────────────

/// Build the v1 API router. Nest this under "/api/v1" in the main router.
pub fn v1_router(state: SharedApiState) -> Router {
    Router::new()
        .route("/chat", post(chat_handler))
        .route("/chat/stream", post(chat_stream_handler))
        .route("/chat/stream_tokens", post(chat_stream_tokens_handler))
        .route("/memory", get(memory_handler))
        .route("/memory/summary", post(update_summary_handler))
        .route("/memory/clear", post(clear_memory_handler))
        .route("/memory/threshold", post(threshold_handler))
        .with_state(state)
}

// ── Request / Response types ──────────────────────────────────────────────

#[derive(Deserialize)]
struct ChatRequest {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    session_id: Option<String>,
    /// `messages` (default), `updates`, `both` or `tokens`.
    #[serde(default)]
    stream_mode: Option<String>,
}

#[derive(Deserialize)]
struct SessionQuery {
    #[serde(default)]
    session_id: Option<String>,
}

#[derive(Deserialize)]
struct ThresholdRequest {
    #[serde(default)]
    session_id: Option<String>,
    threshold: serde_json::Value,
}

#[derive(Serialize, Deserialize)]
struct MemoryResponse {
    session_id: String,
    summary: String,
    recent_messages: Vec<HistoryEntry>,
    message_count: usize,
    stats: SessionStats,
}

#[derive(Serialize, Deserialize)]
struct MemoryActionResponse {
    session_id: String,
    message: String,
}

#[derive(Serialize, Deserialize)]
struct ErrorResponse {
    error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
}

fn session_or_default(session_id: Option<String>) -> String {
    session_id
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_SESSION_ID.to_string())
}

/// The message text, or a 400 when it is missing or blank.
fn require_message(message: Option<String>) -> Result<String, ApiError> {
    match message {
        None => Err(api_error(
            StatusCode::BAD_REQUEST,
            "Missing required field: message",
        )),
        Some(m) if m.trim().is_empty() => {
            Err(api_error(StatusCode::BAD_REQUEST, "Message cannot be empty"))
        }
        Some(m) => Ok(m),
    }
}

fn sse_event(event: &StreamEvent) -> SseEvent {
    let data = serde_json::to_string(event).unwrap_or_default();
    SseEvent::default().event(event.event_type()).data(data)
}

// ── Chat ──────────────────────────────────────────────────────────────────

async fn chat_handler(
    State(state): State<SharedApiState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<TurnResponse>, ApiError> {
    let message = require_message(payload.message)?;
    let session_id = session_or_default(payload.session_id);
    info!(session_id = %session_id, "v1/chat request");

    match state.orchestrator.run_turn(&session_id, &message).await {
        Ok(outcome) => Ok(Json(TurnResponse::from(outcome))),
        Err(e) => {
            warn!(session_id = %session_id, error = %e, "Chat turn failed");
            Err(api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Internal server error: {e}"),
            ))
        }
    }
}

/// `POST /api/v1/chat/stream` - one SSE frame per stream event.
async fn chat_stream_handler(
    State(state): State<SharedApiState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Sse<impl futures::Stream<Item = Result<SseEvent, Infallible>>>, ApiError> {
    let mode = match payload.stream_mode.as_deref() {
        None => StreamMode::default(),
        Some(raw) => raw
            .parse::<StreamMode>()
            .map_err(|e| api_error(StatusCode::BAD_REQUEST, e))?,
    };
    stream_turn(state, payload, mode)
}

/// `POST /api/v1/chat/stream_tokens` - answer tokens, then `final`.
async fn chat_stream_tokens_handler(
    State(state): State<SharedApiState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Sse<impl futures::Stream<Item = Result<SseEvent, Infallible>>>, ApiError> {
    stream_turn(state, payload, StreamMode::Tokens)
}

fn stream_turn(
    state: SharedApiState,
    payload: ChatRequest,
    mode: StreamMode,
) -> Result<Sse<impl futures::Stream<Item = Result<SseEvent, Infallible>>>, ApiError> {
    let message = require_message(payload.message)?;
    let session_id = session_or_default(payload.session_id);
    info!(session_id = %session_id, mode = %mode, "v1/chat/stream SSE request");

    let stream = state
        .orchestrator
        .run_turn_stream(&session_id, &message, mode)
        .map(|event| Ok(sse_event(&event)));

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

// ── Memory ────────────────────────────────────────────────────────────────

async fn memory_handler(
    State(state): State<SharedApiState>,
    Query(query): Query<SessionQuery>,
) -> Json<MemoryResponse> {
    let snapshot = state
        .memory()
        .read(&session_or_default(query.session_id))
        .await;

    Json(MemoryResponse {
        message_count: snapshot.recent_messages.len(),
        recent_messages: wayfarer_agent::history_entries(&snapshot.recent_messages),
        session_id: snapshot.session_id,
        summary: snapshot.summary,
        stats: snapshot.stats,
    })
}

async fn update_summary_handler(
    State(state): State<SharedApiState>,
    Json(query): Json<SessionQuery>,
) -> Json<MemoryActionResponse> {
    let session_id = session_or_default(query.session_id);
    let update = state.memory().update_summary(&session_id).await;
    Json(MemoryActionResponse {
        message: update.message().to_string(),
        session_id,
    })
}

async fn clear_memory_handler(
    State(state): State<SharedApiState>,
    Json(query): Json<SessionQuery>,
) -> Json<MemoryActionResponse> {
    let session_id = session_or_default(query.session_id);
    state.memory().clear(&session_id).await;
    info!(session_id = %session_id, "Session memory cleared");
    Json(MemoryActionResponse {
        session_id,
        message: "Conversation memory cleared".into(),
    })
}

/// Without a `session_id` the threshold applies to every session.
async fn threshold_handler(
    State(state): State<SharedApiState>,
    Json(payload): Json<ThresholdRequest>,
) -> Result<Json<MemoryActionResponse>, ApiError> {
    let Some(threshold) = payload.threshold.as_i64() else {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            format!(
                "summarization threshold must be a positive integer, got {}",
                payload.threshold
            ),
        ));
    };

    let (scope, label) = match payload.session_id {
        Some(id) if !id.trim().is_empty() => {
            let id = id.trim().to_string();
            (ThresholdScope::Session(id.clone()), id)
        }
        _ => (ThresholdScope::Global, "*".to_string()),
    };

    state
        .memory()
        .set_summarization_threshold(scope, threshold)
        .await
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;

    Ok(Json(MemoryActionResponse {
        session_id: label,
        message: format!("Summarization threshold set to {threshold}"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use std::sync::Mutex;
    use tower::ServiceExt;

    use wayfarer_agent::ReactExecutor;
    use wayfarer_config::ToolsConfig;
    use wayfarer_core::error::ProviderError;
    use wayfarer_core::message::Message;
    use wayfarer_core::provider::{Provider, ProviderRequest, ProviderResponse};
    use wayfarer_memory::InMemorySessionStore;

    /// Replies with scripted completions in order.
    struct MockProvider {
        replies: Mutex<Vec<String>>,
    }

    impl MockProvider {
        fn new(replies: &[&str]) -> Self {
            Self {
                replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            }
        }
    }

    #[async_trait::async_trait]
    impl Provider for MockProvider {
        fn name(&self) -> &str {
            "gateway_mock"
        }

        async fn complete(
            &self,
            _request: ProviderRequest,
        ) -> Result<ProviderResponse, ProviderError> {
            let mut replies = self.replies.lock().unwrap();
            if replies.is_empty() {
                return Err(ProviderError::ApiError {
                    status_code: 500,
                    message: "no scripted reply".into(),
                });
            }
            Ok(ProviderResponse {
                message: Message::assistant(replies.remove(0)),
                usage: None,
                model: "mock-model".into(),
            })
        }
    }

    fn test_api_state(replies: &[&str]) -> SharedApiState {
        let provider: Arc<dyn Provider> = Arc::new(MockProvider::new(replies));
        let tools = Arc::new(wayfarer_tools::default_registry(&ToolsConfig::default()));
        let executor = ReactExecutor::new(provider, "mock-model", tools);
        let memory = Arc::new(InMemorySessionStore::default());
        Arc::new(ApiV1State::new(Arc::new(TurnOrchestrator::new(
            memory, executor,
        ))))
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    async fn body_text(response: axum::response::Response) -> String {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(body.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn chat_returns_turn_response() {
        let state = test_api_state(&[
            " I need the time.\nAction: TimeTool\nAction Input: Tokyo",
            " I now know the final answer\nFinal Answer: It is late in Tokyo.",
        ]);
        let app = v1_router(state);

        let response = app
            .oneshot(post_json(
                "/chat",
                serde_json::json!({"message": "Time in Tokyo?", "session_id": "s1"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["response"], "It is late in Tokyo.");
        assert_eq!(json["reasoning"]["steps"][0]["action"], "TimeTool");
        assert_eq!(json["agent_response"]["function_calls"][0]["tool"], "TimeTool");
        assert_eq!(json["history"][0]["type"], "human");
        assert_eq!(json["history"][1]["content"], "It is late in Tokyo.");
    }

    #[tokio::test]
    async fn chat_rejects_blank_message() {
        let app = v1_router(test_api_state(&[]));
        let response = app
            .oneshot(post_json("/chat", serde_json::json!({"message": "   "})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "Message cannot be empty");
    }

    #[tokio::test]
    async fn chat_rejects_missing_message() {
        let app = v1_router(test_api_state(&[]));
        let response = app
            .oneshot(post_json("/chat", serde_json::json!({"session_id": "s"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await["error"],
            "Missing required field: message"
        );
    }

    #[tokio::test]
    async fn unrecoverable_failure_is_500() {
        let app = v1_router(test_api_state(&[""]));
        let response = app
            .oneshot(post_json("/chat", serde_json::json!({"message": "hi"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let error = body_json(response).await["error"].as_str().unwrap().to_string();
        assert!(error.starts_with("Internal server error:"));
    }

    #[tokio::test]
    async fn stream_emits_sse_frames() {
        let app = v1_router(test_api_state(&[
            " I now know the final answer\nFinal Answer: Hello there.",
        ]));
        let response = app
            .oneshot(post_json(
                "/chat/stream",
                serde_json::json!({"message": "hi", "stream_mode": "messages"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["content-type"],
            "text/event-stream"
        );

        let text = body_text(response).await;
        assert!(text.contains("event: token"));
        assert!(text.contains("event: structured_output"));
        assert!(text.contains(r#""type":"token""#));
    }

    #[tokio::test]
    async fn stream_tokens_ends_with_final() {
        let app = v1_router(test_api_state(&[
            " I now know the final answer\nFinal Answer: Bonjour.",
        ]));
        let response = app
            .oneshot(post_json("/chat/stream_tokens", serde_json::json!({"message": "hi"})))
            .await
            .unwrap();
        let text = body_text(response).await;
        assert!(text.contains("event: final"));
        assert!(text.contains(r#""response":"Bonjour.""#));
        assert!(!text.contains("event: structured_output"));
    }

    #[tokio::test]
    async fn stream_rejects_unknown_mode() {
        let app = v1_router(test_api_state(&[]));
        let response = app
            .oneshot(post_json(
                "/chat/stream",
                serde_json::json!({"message": "hi", "stream_mode": "verbose"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn memory_reflects_chat_and_clear() {
        let state = test_api_state(&[" I now know the final answer\nFinal Answer: Hi!"]);

        let response = v1_router(state.clone())
            .oneshot(post_json(
                "/chat",
                serde_json::json!({"message": "hello", "session_id": "m"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let req = Request::builder()
            .uri("/memory?session_id=m")
            .body(Body::empty())
            .unwrap();
        let json = body_json(v1_router(state.clone()).oneshot(req).await.unwrap()).await;
        assert_eq!(json["session_id"], "m");
        assert_eq!(json["message_count"], 2);
        assert_eq!(json["recent_messages"][1]["content"], "Hi!");
        assert_eq!(json["stats"]["total_messages"], 2);

        let response = v1_router(state.clone())
            .oneshot(post_json("/memory/clear", serde_json::json!({"session_id": "m"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let req = Request::builder()
            .uri("/memory?session_id=m")
            .body(Body::empty())
            .unwrap();
        let json = body_json(v1_router(state).oneshot(req).await.unwrap()).await;
        assert_eq!(json["message_count"], 0);
        assert_eq!(json["summary"], "");
    }

    #[tokio::test]
    async fn summary_below_threshold_reports_not_needed() {
        let app = v1_router(test_api_state(&[]));
        let response = app
            .oneshot(post_json("/memory/summary", serde_json::json!({"session_id": "x"})))
            .await
            .unwrap();
        let json = body_json(response).await;
        assert!(json["message"].as_str().unwrap().starts_with("No summary needed"));
    }

    #[tokio::test]
    async fn threshold_validation() {
        let state = test_api_state(&[]);

        for bad in [serde_json::json!(0), serde_json::json!(-3), serde_json::json!("five")] {
            let response = v1_router(state.clone())
                .oneshot(post_json("/memory/threshold", serde_json::json!({"threshold": bad})))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            let error = body_json(response).await["error"].as_str().unwrap().to_string();
            assert!(error.contains("positive integer"), "{error}");
        }

        let response = v1_router(state.clone())
            .oneshot(post_json(
                "/memory/threshold",
                serde_json::json!({"session_id": "t", "threshold": 3}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let req = Request::builder()
            .uri("/memory?session_id=t")
            .body(Body::empty())
            .unwrap();
        let json = body_json(v1_router(state).oneshot(req).await.unwrap()).await;
        assert_eq!(json["stats"]["summarization_threshold"], 3);
    }
}
