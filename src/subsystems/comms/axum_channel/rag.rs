//! Axum handlers for the RAG service.

use axum::{
    Json,
    body::{Body, Bytes},
    extract::State,
    http::{StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use super::RagState;
use super::api::json_error;

#[derive(Deserialize)]
pub(super) struct QuestionRequest {
    question: String,
}

#[derive(Deserialize)]
pub(super) struct IngestRequest {
    text: String,
}

fn parse<T: serde::de::DeserializeOwned>(body: &Bytes) -> Result<T, Response> {
    serde_json::from_slice(body).map_err(|e| {
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            json_error("invalid_request", format!("invalid JSON: {e}")),
        )
            .into_response()
    })
}

/// POST / — stream the answer as plain text.
pub(super) async fn answer(State(state): State<RagState>, body: Bytes) -> Response {
    let req: QuestionRequest = match parse(&body) {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    match state.service.answer_stream(&req.question).await {
        Ok(stream) => (
            StatusCode::OK,
            [(CONTENT_TYPE, "text/plain; charset=utf-8")],
            Body::from_stream(stream),
        )
            .into_response(),
        Err(e) => {
            warn!(channel_id = %state.channel_id, error = %e, "rag answer failed");
            (StatusCode::INTERNAL_SERVER_ERROR, json_error("llm_error", e)).into_response()
        }
    }
}

/// POST /ingest — add raw Markdown text to the index.
pub(super) async fn ingest(State(state): State<RagState>, body: Bytes) -> Response {
    let req: IngestRequest = match parse(&body) {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    match state.service.ingest_text(&req.text).await {
        Ok(_) => (StatusCode::OK, Json(json!({ "ok": true }))).into_response(),
        Err(e) => {
            warn!(channel_id = %state.channel_id, error = %e, "ingest failed");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))).into_response()
        }
    }
}

/// GET /health
pub(super) async fn health(State(state): State<RagState>) -> Response {
    let body = json!({
        "status": "ok",
        "service": "rag",
        "chunks": state.service.len().await,
    });
    (StatusCode::OK, Json(body)).into_response()
}
