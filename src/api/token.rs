//! Room token endpoint
//!
//! `GET /api/token` creates a fresh LiveKit room and returns a participant
//! token for it.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Serialize;

use super::ApiState;

/// Error body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: &'static str,
}

fn server_error(error: &'static str) -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResponse { error })).into_response()
}

/// Set up a room and hand out a token to join it
async fn issue_token(State(state): State<Arc<ApiState>>) -> Response {
    let Some(issuer) = &state.livekit else {
        tracing::warn!("token requested without LiveKit credentials");
        return server_error("LiveKit credentials not configured");
    };

    match issuer.issue().await {
        Ok(token) => Json(token).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to set up room");
            server_error("Failed to setup room")
        }
    }
}

/// Build token router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/api/token", get(issue_token))
        .with_state(state)
}
