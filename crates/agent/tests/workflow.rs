//! End-to-end turns through the engine with a scripted model.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use agentwire_agent::prompt::{CAP_FALLBACK, WRAP_UP_WARNING};
use agentwire_agent::testing::{Reply, ScriptedProvider};
use agentwire_agent::{GraphRun, TurnOutcome, TurnRequest, TurnRunner, build_turn_runner};
use agentwire_config::AppConfig;
use agentwire_core::context::RequestContext;
use agentwire_core::error::{ProviderError, StoreError, ToolError};
use agentwire_core::event::StreamEvent;
use agentwire_core::message::{Message, Role};
use agentwire_core::store::{Chat, ChatStore, StoredMessage};
use agentwire_core::tool::{Tool, ToolRegistry};
use agentwire_store::InMemoryChatStore;
use agentwire_tools::calculator::CalculatorTool;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Sleeps for `millis`, counting invocations.
struct Sleeper {
    name: &'static str,
    millis: u64,
    calls: AtomicUsize,
}

impl Sleeper {
    fn new(name: &'static str, millis: u64) -> Arc<Self> {
        Arc::new(Self {
            name,
            millis,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Tool for Sleeper {
    fn name(&self) -> &str {
        self.name
    }
    fn description(&self) -> &str {
        "waits, then reports"
    }
    async fn run(&self, input: &str, _ctx: &RequestContext) -> Result<String, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(self.millis)).await;
        Ok(format!("{} done: {input}", self.name))
    }
}

struct Fixture {
    provider: Arc<ScriptedProvider>,
    runner: Arc<TurnRunner>,
}

fn fixture(
    provider: ScriptedProvider,
    tools: Vec<Arc<dyn Tool>>,
    store: Arc<dyn ChatStore>,
    configure: impl FnOnce(&mut AppConfig),
) -> Fixture {
    let mut config = AppConfig::default();
    configure(&mut config);

    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(CalculatorTool)).unwrap();
    for tool in tools {
        registry.register(tool).unwrap();
    }

    let provider = Arc::new(provider);
    let runner = build_turn_runner(&config, provider.clone(), Arc::new(registry), store);
    Fixture { provider, runner }
}

async fn run_turn(
    runner: &TurnRunner,
    message: &str,
    ctx: RequestContext,
    cancel: CancellationToken,
) -> (Option<GraphRun>, Vec<StreamEvent>) {
    let (tx, mut rx) = mpsc::channel(1024);
    let run = runner
        .run(TurnRequest::new(vec![], message), Arc::new(ctx), tx, cancel)
        .await;
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    (run, events)
}

fn token_text(events: &[StreamEvent]) -> String {
    events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::Token { token } => Some(token.as_str()),
            _ => None,
        })
        .collect()
}

fn kinds(events: &[StreamEvent]) -> Vec<&'static str> {
    events.iter().map(StreamEvent::event_type).collect()
}

#[tokio::test]
async fn calculator_turn_streams_tool_events_then_answer() {
    let f = fixture(
        ScriptedProvider::new(vec![
            Reply::tool("calculator", "2+2"),
            Reply::text("2 + 2 equals 4."),
        ]),
        vec![],
        Arc::new(InMemoryChatStore::new()),
        |_| {},
    );

    let (run, events) = run_turn(&f.runner, "What is 2+2?", RequestContext::new(), CancellationToken::new()).await;

    assert_eq!(events[0], StreamEvent::tool_start("calculator", "2+2"));
    assert_eq!(events[1], StreamEvent::tool_end("calculator", "Result: 4"));
    assert!(token_text(&events).contains('4'));
    assert_eq!(events.last(), Some(&StreamEvent::Done));
    assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);

    let run = run.unwrap();
    assert!(matches!(run.outcome, TurnOutcome::Completed));
    assert_eq!(run.text, "2 + 2 equals 4.");
    assert_eq!(f.provider.call_count(), 2);

    // The second prompt carries the tool result for the model.
    let requests = f.provider.requests();
    let result = requests[1].messages.iter().find(|m| m.role == Role::Tool).unwrap();
    assert_eq!(result.content, "Result: 4");
}

#[tokio::test(start_paused = true)]
async fn timed_out_tool_still_ends_with_done() {
    let stuck = Sleeper::new("stuck", 3_600_000);
    let f = fixture(
        ScriptedProvider::new(vec![
            Reply::tool("stuck", "anything"),
            Reply::text("Sorry, I couldn't get that information right now."),
        ]),
        vec![stuck],
        Arc::new(InMemoryChatStore::new()),
        |c| c.workflow.tool_timeout_secs = 1,
    );

    let (run, events) = run_turn(&f.runner, "Look it up", RequestContext::new(), CancellationToken::new()).await;

    assert_eq!(
        events[1],
        StreamEvent::tool_end("stuck", "Error: tool 'stuck' timed out after 1s")
    );
    assert!(token_text(&events).contains("couldn't"));
    assert_eq!(events.last(), Some(&StreamEvent::Done));
    assert!(!events.iter().any(|e| e.event_type() == "error"));
    assert!(run.unwrap().outcome.is_success());
}

#[tokio::test]
async fn endless_tool_requests_stop_at_hard_cap() {
    let dummy = Sleeper::new("dummy", 0);
    let f = fixture(
        ScriptedProvider::always(Reply::tool("dummy", "again")),
        vec![dummy.clone()],
        Arc::new(InMemoryChatStore::new()),
        |_| {},
    );

    let (run, events) = run_turn(&f.runner, "loop forever", RequestContext::new(), CancellationToken::new()).await;
    let run = run.unwrap();

    assert!(matches!(run.outcome, TurnOutcome::CapReached));
    assert_eq!(f.provider.call_count(), 15);
    assert_eq!(run.steps, 15);
    assert_eq!(run.state.tool_call_count, 15);
    // The capping step's tools never run.
    assert_eq!(dummy.calls.load(Ordering::SeqCst), 14);

    let n = events.len();
    assert_eq!(events[n - 2], StreamEvent::token(CAP_FALLBACK));
    assert_eq!(events[n - 1], StreamEvent::Done);
    assert_eq!(run.text, CAP_FALLBACK);
}

#[tokio::test]
async fn agent_steps_never_exceed_cap() {
    for cap in 1..=6 {
        let f = fixture(
            ScriptedProvider::always(Reply::tool("calculator", "1+1")),
            vec![],
            Arc::new(InMemoryChatStore::new()),
            |c| {
                c.workflow.hard_cap = cap;
                c.workflow.soft_threshold = 0;
            },
        );
        let (run, _) = run_turn(&f.runner, "go", RequestContext::new(), CancellationToken::new()).await;
        assert_eq!(f.provider.call_count(), cap as usize, "cap {cap}");
        assert!(matches!(run.unwrap().outcome, TurnOutcome::CapReached));
    }
}

#[tokio::test]
async fn cap_with_text_does_not_add_fallback() {
    let f = fixture(
        ScriptedProvider::always(Reply::tools("Still working.", &[("calculator", "1+1")])),
        vec![],
        Arc::new(InMemoryChatStore::new()),
        |c| {
            c.workflow.hard_cap = 2;
            c.workflow.soft_threshold = 1;
        },
    );
    let (run, events) = run_turn(&f.runner, "go", RequestContext::new(), CancellationToken::new()).await;
    let run = run.unwrap();
    assert_eq!(run.text, "Still working.\n\nStill working.");
    assert_eq!(token_text(&events), run.text);
    assert!(!token_text(&events).contains(CAP_FALLBACK));
}

#[tokio::test]
async fn prompts_past_soft_threshold_carry_wrap_up_warning() {
    let f = fixture(
        ScriptedProvider::always(Reply::tool("calculator", "3*3")),
        vec![],
        Arc::new(InMemoryChatStore::new()),
        |c| {
            c.workflow.hard_cap = 5;
            c.workflow.soft_threshold = 2;
        },
    );
    run_turn(&f.runner, "go", RequestContext::new(), CancellationToken::new()).await;

    let warned: Vec<bool> = f
        .provider
        .requests()
        .iter()
        .map(|r| {
            let system: Vec<&Message> = r.messages.iter().filter(|m| m.role == Role::System).collect();
            assert_eq!(system.len(), 1);
            assert_eq!(r.messages[0].role, Role::System);
            system[0].content.contains(WRAP_UP_WARNING)
        })
        .collect();
    assert_eq!(warned, vec![false, false, true, true, true]);
}

#[tokio::test]
async fn model_failure_emits_single_error() {
    let f = fixture(
        ScriptedProvider::new(vec![
            Reply::tool("calculator", "1+1"),
            Reply::Fail(ProviderError::RateLimited { retry_after_secs: 5 }),
        ]),
        vec![],
        Arc::new(InMemoryChatStore::new()),
        |_| {},
    );

    let (run, events) = run_turn(&f.runner, "hi", RequestContext::new(), CancellationToken::new()).await;

    assert_eq!(kinds(&events), vec!["tool_start", "tool_end", "error"]);
    assert!(matches!(run.unwrap().outcome, TurnOutcome::Failed(ProviderError::RateLimited { .. })));
    assert_eq!(f.provider.call_count(), 2);
}

#[tokio::test]
async fn tool_events_are_paired_in_order() {
    let f = fixture(
        ScriptedProvider::new(vec![
            Reply::tools("", &[("slow", "a"), ("fast", "b"), ("calculator", "2*3")]),
            Reply::text("All done."),
        ]),
        vec![Sleeper::new("slow", 80), Sleeper::new("fast", 5)],
        Arc::new(InMemoryChatStore::new()),
        |_| {},
    );

    let (_, events) = run_turn(&f.runner, "do three things", RequestContext::new(), CancellationToken::new()).await;

    for tool in ["slow", "fast", "calculator"] {
        let position = |kind: &str| {
            events.iter().position(|e| {
                e.event_type() == kind
                    && matches!(e, StreamEvent::ToolStart { tool: t, .. } | StreamEvent::ToolEnd { tool: t, .. } if t == tool)
            })
        };
        let start = position("tool_start").unwrap();
        let end = position("tool_end").unwrap();
        assert!(start < end, "{tool}");
    }

    // Tool results reach the model in request order.
    let requests = f.provider.requests();
    let results: Vec<&str> = requests[1]
        .messages
        .iter()
        .filter(|m| m.role == Role::Tool)
        .map(|m| m.content.as_str())
        .collect();
    assert_eq!(results, vec!["slow done: a", "fast done: b", "Result: 6"]);
}

#[tokio::test]
async fn persistent_turn_stores_both_sides() {
    let store = Arc::new(InMemoryChatStore::new());
    let chat = store.create_chat("alice", "Math").await.unwrap();
    let f = fixture(
        ScriptedProvider::new(vec![
            Reply::tools("Let me check.", &[("calculator", "6*7")]),
            Reply::text("It is 42."),
        ]),
        vec![],
        store.clone(),
        |_| {},
    );

    let ctx = RequestContext::new().with_user("alice").with_chat(chat.id.clone());
    let (_, events) = run_turn(&f.runner, "What is 6*7?", ctx, CancellationToken::new()).await;

    assert_eq!(events.last(), Some(&StreamEvent::Done));
    assert_eq!(store.message_count().await, 2);
    let last = store.get_last_message(&chat.id).await.unwrap().unwrap();
    assert_eq!(last.role, Role::Assistant);
    assert_eq!(last.content, "Let me check.\n\nIt is 42.");
    assert_eq!(token_text(&events), last.content);
}

#[tokio::test]
async fn streamed_text_matches_stored_reply_across_silent_steps() {
    let store = Arc::new(InMemoryChatStore::new());
    let chat = store.create_chat("alice", "Math").await.unwrap();
    let f = fixture(
        ScriptedProvider::new(vec![
            Reply::tools("First I will add.", &[("calculator", "1+1")]),
            Reply::tool("calculator", "2*3"),
            Reply::tools("", &[("calculator", "4-1")]),
            Reply::text("Done: 2, 6 and 3."),
        ]),
        vec![],
        store.clone(),
        |_| {},
    );

    let ctx = RequestContext::new().with_user("alice").with_chat(chat.id.clone());
    let (run, events) = run_turn(&f.runner, "Do some math", ctx, CancellationToken::new()).await;

    let run = run.unwrap();
    assert_eq!(run.text, "First I will add.\n\nDone: 2, 6 and 3.");
    assert_eq!(token_text(&events), run.text);
    let last = store.get_last_message(&chat.id).await.unwrap().unwrap();
    assert_eq!(token_text(&events), last.content);
}

#[tokio::test]
async fn first_step_text_has_no_leading_separator() {
    let f = fixture(
        ScriptedProvider::new(vec![
            Reply::tool("calculator", "2+2"),
            Reply::text("Four."),
        ]),
        vec![],
        Arc::new(InMemoryChatStore::new()),
        |_| {},
    );
    let (run, events) = run_turn(&f.runner, "2+2?", RequestContext::new(), CancellationToken::new()).await;
    assert_eq!(token_text(&events), "Four.");
    assert_eq!(run.unwrap().text, "Four.");
}

#[tokio::test]
async fn ephemeral_turn_stores_nothing() {
    let store = Arc::new(InMemoryChatStore::new());
    let f = fixture(
        ScriptedProvider::new(vec![Reply::text("Hello!")]),
        vec![],
        store.clone(),
        |_| {},
    );
    let (_, events) = run_turn(&f.runner, "hi", RequestContext::new(), CancellationToken::new()).await;
    assert_eq!(kinds(&events).last(), Some(&"done"));
    assert_eq!(store.message_count().await, 0);
}

#[tokio::test]
async fn unknown_chat_fails_before_the_model_runs() {
    let f = fixture(
        ScriptedProvider::new(vec![Reply::text("never sent")]),
        vec![],
        Arc::new(InMemoryChatStore::new()),
        |_| {},
    );
    let ctx = RequestContext::new().with_chat("missing");
    let (run, events) = run_turn(&f.runner, "hi", ctx, CancellationToken::new()).await;

    assert!(run.is_none());
    assert_eq!(kinds(&events), vec!["error"]);
    assert_eq!(f.provider.call_count(), 0);
}

/// Accepts user messages, rejects assistant replies.
struct ReplyRejectingStore(InMemoryChatStore);

#[async_trait]
impl ChatStore for ReplyRejectingStore {
    fn name(&self) -> &str {
        "reply-rejecting"
    }
    async fn create_chat(&self, user_id: &str, title: &str) -> Result<Chat, StoreError> {
        self.0.create_chat(user_id, title).await
    }
    async fn list_chats(&self, user_id: &str) -> Result<Vec<Chat>, StoreError> {
        self.0.list_chats(user_id).await
    }
    async fn store_message(
        &self,
        chat_id: &str,
        role: Role,
        content: &str,
    ) -> Result<StoredMessage, StoreError> {
        match role {
            Role::Assistant => Err(StoreError::Storage("disk full".into())),
            _ => self.0.store_message(chat_id, role, content).await,
        }
    }
    async fn get_last_message(&self, chat_id: &str) -> Result<Option<StoredMessage>, StoreError> {
        self.0.get_last_message(chat_id).await
    }
}

#[tokio::test]
async fn failed_reply_persistence_replaces_done_with_error() {
    let store = Arc::new(ReplyRejectingStore(InMemoryChatStore::new()));
    let chat = store.create_chat("alice", "Flaky").await.unwrap();
    let f = fixture(
        ScriptedProvider::new(vec![Reply::text("Here you go.")]),
        vec![],
        store,
        |_| {},
    );

    let ctx = RequestContext::new().with_chat(chat.id);
    let (_, events) = run_turn(&f.runner, "hi", ctx, CancellationToken::new()).await;

    assert_eq!(events.last(), Some(&StreamEvent::error("Storage error: disk full")));
    assert!(!events.contains(&StreamEvent::Done));
}

#[tokio::test(start_paused = true)]
async fn cancellation_stops_the_turn_without_terminal_event() {
    let stuck = Sleeper::new("stuck", 3_600_000);
    let f = fixture(
        ScriptedProvider::new(vec![Reply::tool("stuck", "x"), Reply::text("unreachable")]),
        vec![stuck],
        Arc::new(InMemoryChatStore::new()),
        |_| {},
    );

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let (run, events) = run_turn(&f.runner, "hi", RequestContext::new(), cancel).await;

    assert!(matches!(run.unwrap().outcome, TurnOutcome::Cancelled));
    assert_eq!(kinds(&events), vec!["tool_start"]);
    assert_eq!(f.provider.call_count(), 1);
}

#[tokio::test]
async fn spawned_turn_streams_until_done() {
    let f = fixture(
        ScriptedProvider::new(vec![Reply::text("Streaming works.")]),
        vec![],
        Arc::new(InMemoryChatStore::new()),
        |_| {},
    );

    let mut rx = f.runner.spawn(
        TurnRequest::new(vec![Message::human("earlier"), Message::assistant("reply")], "now"),
        Arc::new(RequestContext::new()),
        CancellationToken::new(),
    );
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }

    assert_eq!(token_text(&events), "Streaming works.");
    assert_eq!(events.last(), Some(&StreamEvent::Done));

    let requests = f.provider.requests();
    let contents: Vec<&str> = requests[0].messages[1..].iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["earlier", "reply", "now"]);
}
