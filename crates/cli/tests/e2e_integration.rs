//! End-to-end tests across the workspace: configuration file on disk,
//! file-backed store, the full tool registry, engine and gateway wired the
//! way `agentwire serve` wires them, with a scripted model.

use std::sync::Arc;

use agentwire_agent::testing::{Reply, ScriptedProvider};
use agentwire_agent::{TurnOutcome, TurnRequest};
use agentwire_config::{AppConfig, StoreBackend};
use agentwire_core::context::RequestContext;
use agentwire_core::event::StreamEvent;
use agentwire_core::message::Role;
use agentwire_core::store::ChatStore;
use agentwire_gateway::{AppState, build_router};
use agentwire_store::FileChatStore;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

fn write_config(dir: &std::path::Path, body: &str) -> AppConfig {
    let path = dir.join("config.toml");
    std::fs::write(&path, body).unwrap();
    AppConfig::load_from(&path).unwrap()
}

#[tokio::test]
async fn e2e_config_file_drives_engine_and_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let store_dir = dir.path().join("chats");
    let config = write_config(
        dir.path(),
        &format!(
            r#"
[workflow]
hard_cap = 3
soft_threshold = 1

[store]
backend = "file"
path = "{}"

[tools]
disabled = ["schedule_meeting"]
"#,
            store_dir.display()
        ),
    );
    assert_eq!(config.store.backend, StoreBackend::File);

    let store = agentwire_store::build_from_config(&config.store).unwrap();
    let chat = store.create_chat("alice", "Budget").await.unwrap();
    let tools = Arc::new(agentwire_tools::default_registry(&config.tools).unwrap());
    assert!(tools.resolve("schedule_meeting").is_err());

    let provider = Arc::new(ScriptedProvider::always(Reply::tools(
        "Working on it.",
        &[("calculator", "100/4")],
    )));
    let runner =
        agentwire_agent::build_turn_runner(&config, provider.clone(), tools, Arc::clone(&store));

    let (tx, mut rx) = mpsc::channel(256);
    let run = runner
        .run(
            TurnRequest::new(vec![], "Split 100 four ways"),
            Arc::new(RequestContext::new().with_user("alice").with_chat(chat.id.clone())),
            tx,
            CancellationToken::new(),
        )
        .await
        .unwrap();
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }

    assert!(matches!(run.outcome, TurnOutcome::CapReached));
    assert_eq!(provider.call_count(), 3);
    assert_eq!(events.last(), Some(&StreamEvent::Done));
    assert!(events.contains(&StreamEvent::tool_end("calculator", "Result: 25")));

    // A fresh handle on the same directory sees the persisted turn.
    let reopened = FileChatStore::open(&store_dir).unwrap();
    let last = reopened.get_last_message(&chat.id).await.unwrap().unwrap();
    assert_eq!(last.role, Role::Assistant);
    assert_eq!(last.content, "Working on it.\n\nWorking on it.\n\nWorking on it.");
}

#[tokio::test]
async fn e2e_gateway_health_and_tools() {
    let config = AppConfig::default();
    let tools = Arc::new(agentwire_tools::default_registry(&config.tools).unwrap());
    let store = agentwire_store::build_from_config(&config.store).unwrap();
    let provider = Arc::new(ScriptedProvider::new(vec![]));
    let runner =
        agentwire_agent::build_turn_runner(&config, provider, Arc::clone(&tools), Arc::clone(&store));
    let router = build_router(AppState::new(runner, tools, store), &config.gateway);

    let health = router
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(health.status(), StatusCode::OK);

    let response = router
        .oneshot(Request::builder().uri("/api/tools").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["count"], 14);
    let names: Vec<&str> = json["tools"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|t| t["name"].as_str())
        .collect();
    for expected in [
        "calculator",
        "weather",
        "wikipedia_search",
        "academic_search",
        "schedule_meeting",
    ] {
        assert!(names.contains(&expected), "missing {expected}");
    }
}

#[test]
fn e2e_config_defaults_and_validation() {
    let config = AppConfig::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.workflow.hard_cap, 15);
    assert_eq!(config.workflow.soft_threshold, 10);
    assert_eq!(config.gateway.port, 42618);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[workflow]\nhard_cap = 5\nsoft_threshold = 5\n").unwrap();
    assert!(AppConfig::load_from(&path).is_err());
}
