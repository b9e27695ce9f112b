//! HTTP API gateway for Wayfarer.
//!
//! Exposes the health check and the v1 API (chat, streaming chat, and
//! session memory administration). Built on Axum.

pub mod api_v1;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, header};
use axum::{Router, response::Json, routing::get};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{info, warn};

use wayfarer_agent::{ReactExecutor, TurnOrchestrator};
use wayfarer_config::{AppConfig, GatewayConfig};
use wayfarer_core::event::EventBus;
use wayfarer_memory::{InMemorySessionStore, StoreLimits, summarizer_for};

/// Build the full router: `/health` plus the v1 API under `/api/v1`.
///
/// Layers applied:
/// - CORS (any origin unless `cors_origins` is configured)
/// - Request body size limit
/// - HTTP trace logging
pub fn build_router(api_state: api_v1::SharedApiState, config: &GatewayConfig) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .nest("/api/v1", api_v1::v1_router(api_state))
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(cors_layer(&config.cors_origins))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(parsed))
}

/// Wire provider, summarizer, session store, tools, and reasoning loop
/// into one orchestrator.
pub fn build_orchestrator(
    config: &AppConfig,
    event_bus: Arc<EventBus>,
) -> Result<Arc<TurnOrchestrator>, Box<dyn std::error::Error>> {
    let router = wayfarer_providers::router::build_from_config(config);
    let provider = router.default().ok_or_else(|| {
        format!(
            "No provider configured for '{}'. Set an API key or run `wayfarer onboard`.",
            config.default_provider
        )
    })?;
    let model = wayfarer_providers::router::resolve_model(config);

    let summarizer = summarizer_for(&config.memory.summarizer, Some(provider.clone()), &model);
    let memory = Arc::new(
        InMemorySessionStore::new(StoreLimits {
            buffer_size: config.memory.buffer_size,
            summarization_threshold: config.memory.summarization_threshold,
        })
        .with_summarizer(summarizer)
        .with_event_bus(event_bus.clone()),
    );

    let tools = Arc::new(wayfarer_tools::default_registry(&config.tools));
    let executor = ReactExecutor::new(provider, model, tools)
        .with_temperature(config.default_temperature)
        .with_max_tokens(config.default_max_tokens)
        .with_max_iterations(u32::try_from(config.agent.max_iterations).unwrap_or(u32::MAX))
        .with_event_bus(event_bus.clone());

    Ok(Arc::new(
        TurnOrchestrator::new(memory, executor)
            .with_event_bus(event_bus)
            .with_stream_buffer(config.agent.stream_buffer),
    ))
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let event_bus = Arc::new(EventBus::default());
    let orchestrator = build_orchestrator(&config, event_bus)?;
    let api_state = Arc::new(api_v1::ApiV1State::new(orchestrator));
    let app = build_router(api_state, &config.gateway);

    info!(addr = %addr, provider = %config.default_provider, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Handlers ---

#[derive(Serialize, Deserialize)]
struct HealthResponse {
    status: String,
    message: String,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".into(),
        message: "AI Agent Chat API is running".into(),
    })
}
