//! HTTP contract of the agent services' `/invoke` and `/health` routes.

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header::AUTHORIZATION, header::CONTENT_TYPE};
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

use berry_agents::config::Config;
use berry_agents::llm::LlmProvider;
use berry_agents::llm::providers::scripted::{ScriptedProvider, ScriptedReply};
use berry_agents::subsystems::agents::{AgentProfile, AgentRuntime};
use berry_agents::subsystems::comms::agent_router;
use berry_agents::subsystems::memory::SessionHistory;
use berry_agents::subsystems::memory::stores::tmp::TmpStore;
use berry_agents::subsystems::tools::ToolBox;

// ── helpers ──────────────────────────────────────────────────────────────────

fn app(profile: AgentProfile, replies: Vec<ScriptedReply>) -> (Router, ScriptedProvider, TempDir) {
    let tmp = TempDir::new().unwrap();
    let cfg = Config::test_default(tmp.path());
    let scripted = ScriptedProvider::new(replies);
    let runtime = AgentRuntime::new(
        profile,
        &cfg,
        LlmProvider::Scripted(scripted.clone()),
        ToolBox::new(),
        SessionHistory::new(Arc::new(TmpStore::new())),
    );
    (agent_router(profile.id(), Arc::new(runtime)), scripted, tmp)
}

fn invoke(auth: Option<&str>, body: &str) -> Request<Body> {
    let mut req = Request::builder()
        .method("POST")
        .uri("/invoke")
        .header(CONTENT_TYPE, "application/json");
    if let Some(value) = auth {
        req = req.header(AUTHORIZATION, value);
    }
    req.body(Body::from(body.to_string())).unwrap()
}

async fn json_body(resp: axum::response::Response) -> Value {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// ── authorization ────────────────────────────────────────────────────────────

#[tokio::test]
async fn missing_or_non_bearer_credentials_are_forbidden() {
    let (router, scripted, _tmp) = app(AgentProfile::Coordinator, vec![]);
    for auth in [None, Some("Basic dXNlcjpwdw=="), Some("Bearer ")] {
        let resp = router
            .clone()
            .oneshot(invoke(auth, r#"{"message":"hi"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert_eq!(json_body(resp).await, json!({ "detail": "Invalid authorization token" }));
    }
    assert_eq!(scripted.calls(), 0);
}

#[tokio::test]
async fn credentials_are_checked_before_the_body() {
    let (router, _, _tmp) = app(AgentProfile::Coordinator, vec![]);
    let resp = router.oneshot(invoke(None, "garbage")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

// ── request handling ─────────────────────────────────────────────────────────

#[tokio::test]
async fn malformed_body_is_unprocessable() {
    let (router, _, _tmp) = app(AgentProfile::Coordinator, vec![]);
    let resp = router
        .oneshot(invoke(Some("Bearer t"), r#"{"session_id":"s"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json_body(resp).await["error"], "invalid_request");
}

#[tokio::test]
async fn answer_is_returned_as_output() {
    let (router, _, _tmp) = app(
        AgentProfile::KnowledgeBase,
        vec![ScriptedReply::text("Paris is the capital of France.")],
    );
    let resp = router
        .oneshot(invoke(Some("Bearer t"), r#"{"message":"What is the capital of France?"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await, json!({ "output": "Paris is the capital of France." }));
}

#[tokio::test]
async fn undecodable_model_output_is_a_500() {
    let (router, _, _tmp) = app(
        AgentProfile::Coordinator,
        vec![ScriptedReply::completion("plain completion text")],
    );
    let resp = router
        .oneshot(invoke(Some("Bearer t"), r#"{"message":"hi","session_id":"s-1"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(resp).await;
    assert_eq!(body["error"], "decode_error");
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn health_reports_profile_and_backend() {
    let (router, _, _tmp) = app(AgentProfile::KnowledgeBase, vec![]);
    let resp = router
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "knowledge_base");
    assert!(body["history"].is_string());
}
