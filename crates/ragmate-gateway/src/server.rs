//! HTTP server implementation using Axum.

use axum::{
    routing::{get, post},
    Router,
};
use ragmate_core::config::{GatewayConfig, SearchConfig};
use ragmate_core::error::{RagmateError, Result};
use ragmate_knowledge::DocumentManager;
use ragmate_vector::Retriever;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::routes;

/// Shared state for the gateway server.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<DocumentManager>,
    pub retriever: Arc<Retriever>,
    pub search_defaults: SearchConfig,
    /// Optional bearer token required on every /api/knowledge route.
    pub auth_token: Option<String>,
}

/// Bearer-token middleware. A no-op when no token is configured.
async fn require_token(
    axum::extract::State(state): axum::extract::State<Arc<AppState>>,
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let Some(expected) = &state.auth_token else {
        return next.run(req).await;
    };

    let provided = req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or("");
    if provided == expected {
        return next.run(req).await;
    }

    axum::response::Response::builder()
        .status(axum::http::StatusCode::UNAUTHORIZED)
        .header("Content-Type", "application/json")
        .body(axum::body::Body::from(
            serde_json::json!({ "error": "Invalid or missing token" }).to_string(),
        ))
        .unwrap()
}

/// Build the gateway router.
pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/api/knowledge/upload", post(routes::upload))
        .route("/api/knowledge/delete", post(routes::delete))
        .route("/api/knowledge/files", get(routes::files))
        .route("/api/knowledge/search", post(routes::search))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            require_token,
        ));

    Router::new()
        .route("/api/health", get(routes::health))
        .merge(api)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn serve(config: &GatewayConfig, state: Arc<AppState>) -> Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| RagmateError::Config(format!("Failed to bind {addr}: {e}")))?;
    tracing::info!("Gateway listening on http://{addr}");
    axum::serve(listener, router(state))
        .await
        .map_err(|e| RagmateError::Config(format!("Gateway server error: {e}")))?;
    Ok(())
}
