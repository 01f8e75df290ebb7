//! Axum handlers for the agent services.
//!
//! The `Authorization` header is checked before anything else; the body is
//! parsed by hand afterwards so a bad body never masks a missing credential.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::subsystems::agents::TurnRequest;

use super::AgentState;

const INVALID_TOKEN: &str = "Invalid authorization token";

// ── Request types ─────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct InvokeRequest {
    message: String,
    #[serde(default)]
    session_id: Option<String>,
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Build a JSON error response body.
pub(super) fn json_error(code: &str, msg: impl std::fmt::Display) -> Json<serde_json::Value> {
    Json(json!({ "error": code, "message": format!("{msg}") }))
}

/// The header value when it carries a non-empty bearer token.
pub(super) fn bearer_authorization(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() {
        Some(value)
    } else {
        None
    }
}

// ── Handlers ──────────────────────────────────────────────────────────────────

/// GET /health
pub(super) async fn health(State(state): State<AgentState>) -> Response {
    let body = json!({
        "status": "ok",
        "service": state.runtime.profile().id(),
        "history": state.runtime.history_backend(),
    });
    (StatusCode::OK, Json(body)).into_response()
}

/// POST /invoke
pub(super) async fn invoke(
    State(state): State<AgentState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(authorization) = bearer_authorization(&headers) else {
        debug!(channel_id = %state.channel_id, "rejected request without bearer token");
        return (StatusCode::FORBIDDEN, Json(json!({ "detail": INVALID_TOKEN }))).into_response();
    };

    let req: InvokeRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                json_error("invalid_request", format!("invalid JSON: {e}")),
            )
                .into_response();
        }
    };

    let turn = TurnRequest {
        message: req.message,
        session_id: req.session_id.filter(|s| !s.is_empty()),
        authorization: Some(authorization.to_string()),
    };

    match state.runtime.invoke(&turn).await {
        Ok(output) => (StatusCode::OK, Json(json!({ "output": output }))).into_response(),
        Err(e) => {
            warn!(channel_id = %state.channel_id, error = %e, "invoke failed");
            (StatusCode::INTERNAL_SERVER_ERROR, json_error(e.code(), e)).into_response()
        }
    }
}
