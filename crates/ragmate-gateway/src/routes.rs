//! API route handlers for the gateway.

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use ragmate_core::error::RagmateError;
use ragmate_core::types::Query;
use ragmate_knowledge::NewUpload;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::server::AppState;

/// Map a core error to an HTTP status and a client-safe message.
///
/// Raw upstream bodies and orphaned resource ids stay in the log; the
/// response carries only what the user needs to act on.
fn error_response(err: &RagmateError) -> Response {
    let (status, message) = match err {
        RagmateError::Validation(msg) if msg.starts_with("Unsupported file type") => {
            (StatusCode::UNSUPPORTED_MEDIA_TYPE, msg.clone())
        }
        RagmateError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        RagmateError::Transport { status, .. } => {
            tracing::error!("Upstream failure: {err}");
            (
                StatusCode::BAD_GATEWAY,
                format!("The vector service request failed (status {status})"),
            )
        }
        RagmateError::Consistency { stage, .. } => {
            tracing::error!("Partial failure: {err}");
            (
                StatusCode::BAD_GATEWAY,
                format!("The operation failed partway ({stage}); please retry"),
            )
        }
        RagmateError::Config(_) | RagmateError::Ledger(_) | RagmateError::Io(_) => {
            tracing::error!("Internal failure: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal error".to_string(),
            )
        }
    };
    (status, Json(json!({ "error": message }))).into_response()
}

/// Health check endpoint.
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "ragmate-gateway",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Upload a single file and attach it to the knowledge base.
pub async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Response {
    let mut upload: Option<NewUpload> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return error_response(&RagmateError::Validation(format!(
                    "Malformed multipart body: {e}"
                )))
            }
        };
        if field.name() != Some("file") {
            continue;
        }
        let declared_name = field.file_name().unwrap_or("file").to_string();
        let declared_mime = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = match field.bytes().await {
            Ok(bytes) => bytes.to_vec(),
            Err(e) => {
                return error_response(&RagmateError::Validation(format!(
                    "Failed to read file field: {e}"
                )))
            }
        };
        upload = Some(NewUpload {
            bytes,
            declared_name,
            declared_mime,
        });
    }

    let Some(upload) = upload else {
        return error_response(&RagmateError::Validation("No file uploaded".into()));
    };

    match state.manager.upload(upload).await {
        Ok(document) => Json(json!({
            "success": true,
            "file_id": document.origin_file_id,
            "filename": document.name,
        }))
        .into_response(),
        Err(err) => error_response(&err),
    }
}

#[derive(Debug, Deserialize)]
pub struct DeleteRequest {
    pub file_id: String,
}

/// Delete a file: detach from the store, best-effort origin delete, drop the
/// ledger entry.
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Json(body): Json<DeleteRequest>,
) -> Response {
    if body.file_id.is_empty() {
        return error_response(&RagmateError::Validation("Missing file_id".into()));
    }

    let store_id = match state.manager.store_id().await {
        Ok(id) => id,
        Err(err) => return error_response(&err),
    };

    match state.manager.delete(&store_id, &body.file_id).await {
        Ok(_) => Json(json!({
            "success": true,
            "file_id": body.file_id,
        }))
        .into_response(),
        Err(err) => error_response(&err),
    }
}

/// List the documents currently recorded in the ledger.
pub async fn files(State(state): State<Arc<AppState>>) -> Response {
    match state.manager.documents() {
        Ok(documents) => Json(json!({ "files": documents })).into_response(),
        Err(err) => error_response(&err),
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub max_results: Option<u32>,
    pub score_threshold: Option<f64>,
    pub apply_threshold: Option<bool>,
}

/// Similarity search over the knowledge base.
pub async fn search(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SearchRequest>,
) -> Response {
    if body.query.trim().is_empty() {
        return error_response(&RagmateError::Validation("Missing query".into()));
    }

    let defaults = &state.search_defaults;
    let query = Query {
        text: body.query,
        max_results: body.max_results.unwrap_or(defaults.max_results),
        score_threshold: body.score_threshold.unwrap_or(defaults.score_threshold),
        apply_threshold: body.apply_threshold.unwrap_or(defaults.apply_threshold),
    };

    let store_id = match state.manager.store_id().await {
        Ok(id) => id,
        Err(err) => return error_response(&err),
    };

    match state.retriever.retrieve(&store_id, &query).await {
        Ok(results) => Json(json!({ "results": results })).into_response(),
        Err(err) => error_response(&err),
    }
}
