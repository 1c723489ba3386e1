//! REST API handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use super::types::{ErrorResponse, RespondRequest, RespondResponse, ThreadResponse};
use crate::conversation::ConversationDriver;
use crate::error::BridgeError;
use crate::session::Identity;

type ApiError = (StatusCode, Json<ErrorResponse>);

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub driver: Arc<ConversationDriver>,
}

impl AppState {
    pub fn new(driver: ConversationDriver) -> Self {
        Self {
            driver: Arc::new(driver),
        }
    }
}

fn api_error(err: BridgeError) -> ApiError {
    let (status, body) = ErrorResponse::from_error(&err);
    if status.is_server_error() {
        tracing::error!(error = %err, "request failed");
    }
    (status, Json(body))
}

/// Health check endpoint.
pub async fn health() -> &'static str {
    "OK"
}

/// API information endpoint.
pub async fn api_info(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let threads = state.driver.thread_count().await.map_err(api_error)?;

    Ok(Json(serde_json::json!({
        "name": "assistant-bridge",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "threads": threads
    })))
}

/// Answer a message on behalf of an identity.
pub async fn respond(
    State(state): State<AppState>,
    Json(req): Json<RespondRequest>,
) -> Result<Json<RespondResponse>, ApiError> {
    let identity = Identity::new(req.identity.as_str()).map_err(api_error)?;

    if req.message.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::bad_request("message must not be empty")),
        ));
    }

    let reply = state
        .driver
        .respond(&req.message, &identity, req.display_name())
        .await
        .map_err(api_error)?;

    Ok(Json(RespondResponse {
        identity: identity.to_string(),
        reply,
    }))
}

/// Get the thread recorded for an identity.
pub async fn get_thread(
    State(state): State<AppState>,
    Path(identity): Path<String>,
) -> Result<Json<ThreadResponse>, ApiError> {
    let identity = Identity::new(identity).map_err(api_error)?;

    let thread = state
        .driver
        .lookup_thread(&identity)
        .await
        .map_err(api_error)?
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse::thread_not_found(identity.as_str())),
            )
        })?;

    Ok(Json(ThreadResponse {
        identity: identity.to_string(),
        thread_id: thread.into_inner(),
    }))
}
