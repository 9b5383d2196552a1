//! Turn driver: persistence around one graph run and the terminal event.
//!
//! Event order on the channel is: tokens and tool events as the graph
//! produces them, then exactly one of `Done` or `Error`. A cancelled turn
//! emits nothing further since nobody is listening.

use std::sync::Arc;

use agentwire_core::context::RequestContext;
use agentwire_core::event::StreamEvent;
use agentwire_core::message::{Message, Role};
use agentwire_core::store::ChatStore;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::graph::{GraphController, GraphRun, TurnOutcome};

/// Capacity of the per-turn event channel.
pub const EVENT_BUFFER: usize = 64;

/// One inbound chat turn: prior history plus the new user message.
#[derive(Debug, Clone, Default)]
pub struct TurnRequest {
    pub messages: Vec<Message>,
    pub new_message: String,
}

impl TurnRequest {
    pub fn new(messages: Vec<Message>, new_message: impl Into<String>) -> Self {
        Self {
            messages,
            new_message: new_message.into(),
        }
    }

    fn into_history(self) -> Vec<Message> {
        let mut history = self.messages;
        history.push(Message::human(self.new_message));
        history
    }
}

pub struct TurnRunner {
    graph: Arc<GraphController>,
    store: Arc<dyn ChatStore>,
}

impl TurnRunner {
    pub fn new(graph: Arc<GraphController>, store: Arc<dyn ChatStore>) -> Self {
        Self { graph, store }
    }

    pub fn graph(&self) -> &GraphController {
        &self.graph
    }

    pub fn store(&self) -> &Arc<dyn ChatStore> {
        &self.store
    }

    /// Start a turn on its own task and return the event stream.
    pub fn spawn(
        self: &Arc<Self>,
        request: TurnRequest,
        ctx: Arc<RequestContext>,
        cancel: CancellationToken,
    ) -> mpsc::Receiver<StreamEvent> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let runner = Arc::clone(self);
        tokio::spawn(async move {
            runner.run(request, ctx, tx, cancel).await;
        });
        rx
    }

    /// Run one turn, sending every event to `events`.
    ///
    /// Returns `None` when the turn ended before the graph ran.
    pub async fn run(
        &self,
        request: TurnRequest,
        ctx: Arc<RequestContext>,
        events: mpsc::Sender<StreamEvent>,
        cancel: CancellationToken,
    ) -> Option<GraphRun> {
        let chat_id = ctx.chat_id.clone();
        info!(
            chat_id = chat_id.as_deref().unwrap_or("-"),
            history = request.messages.len(),
            "Turn started"
        );

        if let Some(chat_id) = &chat_id
            && let Err(e) = self
                .store
                .store_message(chat_id, Role::Human, &request.new_message)
                .await
        {
            warn!(chat_id = %chat_id, error = %e, "Failed to persist user message");
            let _ = events.send(StreamEvent::error(e.to_string())).await;
            return None;
        }

        let run = self
            .graph
            .run(request.into_history(), Arc::clone(&ctx), events.clone(), cancel)
            .await;

        let terminal = match &run.outcome {
            TurnOutcome::Cancelled => {
                info!("Turn cancelled");
                None
            }
            TurnOutcome::Failed(e) => Some(StreamEvent::error(e.to_string())),
            TurnOutcome::Completed | TurnOutcome::CapReached => {
                Some(self.persist_reply(chat_id.as_deref(), &run.text).await)
            }
        };

        if let Some(event) = terminal {
            let _ = events.send(event).await;
        }
        Some(run)
    }

    /// `Done` once the reply is stored (or when there is nothing to store).
    async fn persist_reply(&self, chat_id: Option<&str>, text: &str) -> StreamEvent {
        let Some(chat_id) = chat_id else {
            return StreamEvent::Done;
        };
        match self.store.store_message(chat_id, Role::Assistant, text).await {
            Ok(_) => StreamEvent::Done,
            Err(e) => {
                warn!(chat_id = %chat_id, error = %e, "Failed to persist assistant reply");
                StreamEvent::error(e.to_string())
            }
        }
    }
}
