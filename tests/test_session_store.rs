//! Integration tests for the SQLite session store.
//!
//! Run with:
//!   cargo test --features store-sqlite --test test_session_store

use std::sync::Arc;

use tempfile::TempDir;

use berry_agents::subsystems::memory::stores::sqlite::SqliteStore;
use berry_agents::subsystems::memory::{
    STATELESS_SESSION_ID, SessionHistory, SessionRecord, SessionStore, ToolRecord, Turn,
};

// ── helpers ──────────────────────────────────────────────────────────────────

fn turn_with_tools(question: &str) -> Turn {
    Turn {
        question: question.into(),
        answer: format!("answer to {question}"),
        tools: vec![
            ToolRecord::ModelStep {
                call_id: "call_1".into(),
                tool: "knowledge_base_tool".into(),
                arguments: r#"{"query":"vpn"}"#.into(),
                content: String::new(),
            },
            ToolRecord::ToolResult {
                call_id: "call_1".into(),
                tool: "knowledge_base_tool".into(),
                content: "Use vpn.example.com".into(),
            },
        ],
    }
}

// ── SqliteStore ──────────────────────────────────────────────────────────────

#[test]
fn turns_survive_reopen_in_order() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("data").join("berry.sqlite3");

    {
        let store = SqliteStore::open(&path, "session").unwrap();
        let record = SessionRecord::new(vec![turn_with_tools("first"), turn_with_tools("second")]);
        store.put("s-1", &record).unwrap();
    }

    let store = SqliteStore::open(&path, "session").unwrap();
    let loaded = store.get("s-1").unwrap().expect("session should exist");
    assert_eq!(loaded.conversation.len(), 2);
    assert_eq!(loaded.conversation[0].question, "first");
    assert_eq!(loaded.conversation[1].question, "second");
    let kinds: Vec<&str> = loaded.conversation[0].tools.iter().map(ToolRecord::kind).collect();
    assert_eq!(kinds, vec!["model_step", "tool_result"]);
}

#[test]
fn put_overwrites_whole_history() {
    let tmp = TempDir::new().unwrap();
    let store = SqliteStore::open(&tmp.path().join("s.sqlite3"), "session").unwrap();
    store.put("s", &SessionRecord::new(vec![turn_with_tools("a")])).unwrap();
    store
        .put("s", &SessionRecord::new(vec![turn_with_tools("a"), turn_with_tools("b")]))
        .unwrap();
    assert_eq!(store.get("s").unwrap().unwrap().conversation.len(), 2);
    assert!(store.get("other").unwrap().is_none());
}

#[test]
fn invalid_table_name_is_rejected() {
    let tmp = TempDir::new().unwrap();
    assert!(SqliteStore::open(&tmp.path().join("s.sqlite3"), "session; DROP").is_err());
}

#[test]
fn keyword_and_digit_entity_names_reopen() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("s.sqlite3");
    for table in ["group", "123"] {
        SqliteStore::open(&path, table)
            .unwrap()
            .put("s", &SessionRecord::new(vec![turn_with_tools(table)]))
            .unwrap();
    }
    for table in ["group", "123"] {
        let loaded = SqliteStore::open(&path, table).unwrap().get("s").unwrap().unwrap();
        assert_eq!(loaded.conversation[0].question, table);
    }
}

#[test]
fn persisted_shape_uses_native_tool_arrays() {
    let record = SessionRecord::new(vec![turn_with_tools("q")]);
    let json = serde_json::to_value(&record).unwrap();
    let tools = &json["conversation"][0]["tools"];
    assert!(tools.is_array());
    assert_eq!(tools[0]["type"], "model_step");
    assert_eq!(tools[1]["type"], "tool_result");
    assert!(json["last_message_utc"].is_string());
}

// ── SessionHistory over SQLite ───────────────────────────────────────────────

#[tokio::test]
async fn history_roundtrip_and_stateless_bypass() {
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(SqliteStore::open(&tmp.path().join("h.sqlite3"), "session").unwrap());
    let history = SessionHistory::new(store.clone());

    history.save("s-2", vec![turn_with_tools("hello")]).await.unwrap();
    let turns = history.load("s-2").await.unwrap();
    assert_eq!(turns, vec![turn_with_tools("hello")]);

    history.save(STATELESS_SESSION_ID, vec![turn_with_tools("x")]).await.unwrap();
    assert!(store.get(STATELESS_SESSION_ID).unwrap().is_none());
}
