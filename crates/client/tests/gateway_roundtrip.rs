//! The client against a live gateway on a loopback port, and against canned
//! HTTP responses.

use std::sync::Arc;

use agentwire_agent::testing::{Reply, ScriptedProvider};
use agentwire_client::{ChatClient, ChatRequest, ClientError};
use agentwire_config::{AppConfig, GatewayConfig};
use agentwire_core::event::StreamEvent;
use agentwire_core::message::Message;
use agentwire_core::store::ChatStore;
use agentwire_core::tool::ToolRegistry;
use agentwire_gateway::{AppState, build_router};
use agentwire_store::InMemoryChatStore;
use agentwire_tools::calculator::CalculatorTool;
use tokio::net::TcpListener;
use tokio_stream::StreamExt;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn spawn_gateway(replies: Vec<Reply>, store: Arc<InMemoryChatStore>) -> String {
    let config = AppConfig::default();
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(CalculatorTool)).unwrap();
    let tools = Arc::new(registry);

    let provider = Arc::new(ScriptedProvider::new(replies));
    let runner =
        agentwire_agent::build_turn_runner(&config, provider, Arc::clone(&tools), store.clone());
    let router = build_router(AppState::new(runner, tools, store), &GatewayConfig::default());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        agentwire_gateway::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn turn_streams_typed_events_end_to_end() {
    let url = spawn_gateway(
        vec![
            Reply::tool("calculator", "12*12"),
            Reply::text("12 times 12 is 144."),
        ],
        Arc::new(InMemoryChatStore::new()),
    )
    .await;

    let client = ChatClient::new(url).unwrap();
    let events: Vec<StreamEvent> = client
        .stream(&ChatRequest::new("What is 12*12?"))
        .await
        .unwrap()
        .collect()
        .await;

    assert_eq!(events[0], StreamEvent::tool_start("calculator", "12*12"));
    assert_eq!(events[1], StreamEvent::tool_end("calculator", "Result: 144"));
    let text: String = events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::Token { token } => Some(token.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(text, "12 times 12 is 144.");
    assert_eq!(events.last(), Some(&StreamEvent::Done));
}

#[tokio::test]
async fn persistent_turn_through_client() {
    let store = Arc::new(InMemoryChatStore::new());
    let chat = store.create_chat("alice", "Greetings").await.unwrap();
    let url = spawn_gateway(vec![Reply::text("Hi Alice!")], store.clone()).await;

    let client = ChatClient::new(url).unwrap().with_user("alice");
    let request = ChatRequest::new("Hello")
        .with_history(vec![Message::human("earlier"), Message::assistant("reply")])
        .with_chat(chat.id.clone());
    let events: Vec<StreamEvent> = client.stream(&request).await.unwrap().collect().await;

    assert_eq!(events.last(), Some(&StreamEvent::Done));
    let last = store.get_last_message(&chat.id).await.unwrap().unwrap();
    assert_eq!(last.content, "Hi Alice!");
    assert_eq!(store.message_count().await, 2);
}

#[tokio::test]
async fn rejected_request_is_status_error() {
    let url = spawn_gateway(vec![], Arc::new(InMemoryChatStore::new())).await;
    let client = ChatClient::new(url).unwrap();

    let err = client.stream(&ChatRequest::new("  ")).await.unwrap_err();
    match err {
        ClientError::Status { status, body } => {
            assert_eq!(status, 400);
            assert!(body.contains("newMessage"));
        }
        other => panic!("Expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn canned_body_with_noise_is_reassembled() {
    let server = MockServer::start().await;
    let body = concat!(
        ": connected\n\n",
        "data: {\"type\":\"token\",\"token\":\"Hi\"}\n\n",
        "data: garbage\n\n",
        "data:{\"type\":\"done\"}\n\n",
        "data: {\"type\":\"token\",\"token\":\"trailing",
    );
    Mock::given(method("POST"))
        .and(path("/api/chat/stream"))
        .and(header("x-user-id", "u1"))
        .and(header("x-oauth-token", "tok"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(body),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = ChatClient::new(server.uri())
        .unwrap()
        .with_user("u1")
        .with_oauth_token("tok");
    let events: Vec<StreamEvent> = client
        .stream(&ChatRequest::new("hi"))
        .await
        .unwrap()
        .collect()
        .await;

    assert_eq!(events, vec![StreamEvent::token("Hi"), StreamEvent::Done]);
}

#[tokio::test]
async fn unreachable_gateway_is_http_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = ChatClient::new(format!("http://{addr}")).unwrap();
    let err = client.stream(&ChatRequest::new("hi")).await.unwrap_err();
    assert!(matches!(err, ClientError::Http(_)));
}
