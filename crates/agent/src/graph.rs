//! Graph controller: the bounded Agent ⇄ Tools cycle.
//!
//! ```text
//! Start ──► Agent ──(tool calls)──► Tools
//!             ▲                        │
//!             └────────────────────────┘
//!           Agent ──(text only | hard cap)──► End
//! ```
//!
//! The loop is an explicit state machine over [`Node`]. Every agent step that
//! requests tools bumps `tool_call_count`; at the hard cap the graph ends
//! without running that step's tools, and past the soft threshold each
//! prompt carries a wrap-up warning.

use std::sync::Arc;

use agentwire_config::WorkflowConfig;
use agentwire_core::context::RequestContext;
use agentwire_core::error::ProviderError;
use agentwire_core::event::StreamEvent;
use agentwire_core::message::{Message, ToolCallRequest};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::context::{ContextWindow, WindowBudget};
use crate::executor::ToolExecutor;
use crate::prompt::{self, CAP_FALLBACK};
use crate::step::AgentStep;

/// Streamed between the text of consecutive steps and stored the same way,
/// so a reloaded reply matches what the client rendered.
pub const SEGMENT_SEPARATOR: &str = "\n\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Node {
    Start,
    Agent,
    Tools,
    End,
}

/// Conversation state owned by one graph run.
#[derive(Debug, Clone, Default)]
pub struct WorkflowState {
    pub messages: Vec<Message>,
    pub tool_call_count: u32,
}

impl WorkflowState {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            tool_call_count: 0,
        }
    }
}

/// How a graph run ended.
#[derive(Debug, Clone)]
pub enum TurnOutcome {
    /// The model answered without requesting tools.
    Completed,
    /// The hard cap on tool-requesting steps was reached.
    CapReached,
    /// The model call failed; the turn ends with an error.
    Failed(ProviderError),
    /// The cancellation token fired.
    Cancelled,
}

impl TurnOutcome {
    /// Whether the turn ends with `Done` (as opposed to `Error` or nothing).
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed | Self::CapReached)
    }
}

/// Everything a caller needs after a run.
#[derive(Debug, Clone)]
pub struct GraphRun {
    pub outcome: TurnOutcome,
    /// Each step's text joined by blank lines; the fallback on an empty cap.
    pub text: String,
    pub state: WorkflowState,
    pub steps: u32,
}

pub struct GraphController {
    step: AgentStep,
    executor: ToolExecutor,
    window: ContextWindow,
    system_prompt: Option<String>,
    hard_cap: u32,
    soft_threshold: u32,
}

impl GraphController {
    pub fn new(step: AgentStep, executor: ToolExecutor) -> Self {
        Self {
            step,
            executor,
            window: ContextWindow::default(),
            system_prompt: None,
            hard_cap: 15,
            soft_threshold: 10,
        }
    }

    pub fn from_config(step: AgentStep, executor: ToolExecutor, config: &WorkflowConfig) -> Self {
        Self {
            window: ContextWindow::new(WindowBudget::from_config(config)),
            system_prompt: config.system_prompt.clone(),
            hard_cap: config.hard_cap,
            soft_threshold: config.soft_threshold,
            ..Self::new(step, executor)
        }
    }

    pub fn with_limits(mut self, hard_cap: u32, soft_threshold: u32) -> Self {
        self.hard_cap = hard_cap;
        self.soft_threshold = soft_threshold;
        self
    }

    pub fn with_window(mut self, window: ContextWindow) -> Self {
        self.window = window;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn executor(&self) -> &ToolExecutor {
        &self.executor
    }

    /// Run the graph to completion over `history`, which must end with the
    /// new human message.
    pub async fn run(
        &self,
        history: Vec<Message>,
        ctx: Arc<RequestContext>,
        events: mpsc::Sender<StreamEvent>,
        cancel: CancellationToken,
    ) -> GraphRun {
        let base_prompt = prompt::system_prompt(self.system_prompt.as_deref(), chrono::Utc::now());
        let mut state = WorkflowState::new(history);
        let mut segments: Vec<String> = Vec::new();
        let mut pending: Vec<ToolCallRequest> = Vec::new();
        let mut steps = 0;
        let mut outcome = TurnOutcome::Completed;
        let mut node = Node::Start;

        while node != Node::End {
            node = match node {
                Node::Start => Node::Agent,

                Node::Agent => {
                    let system = if state.tool_call_count >= self.soft_threshold {
                        prompt::with_wrap_up(&base_prompt)
                    } else {
                        base_prompt.clone()
                    };
                    let prompt = self.window.apply(&state.messages, &system);

                    let separator = (!segments.is_empty()).then_some(SEGMENT_SEPARATOR);
                    let result = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => None,
                        result = self.step.run_continuing(prompt, &events, separator) => Some(result),
                    };
                    if result.is_some() {
                        steps += 1;
                    }

                    match result {
                        None => {
                            outcome = TurnOutcome::Cancelled;
                            Node::End
                        }
                        Some(Err(e)) => {
                            warn!(error = %e, step = steps, "Agent step failed");
                            outcome = TurnOutcome::Failed(e);
                            Node::End
                        }
                        Some(Ok(output)) => {
                            if !output.text.is_empty() {
                                segments.push(output.text.clone());
                            }
                            if !output.wants_tools() {
                                state.messages.push(Message::assistant(output.text));
                                outcome = TurnOutcome::Completed;
                                Node::End
                            } else {
                                state.tool_call_count += 1;
                                state.messages.push(Message::assistant_with_tools(
                                    output.text,
                                    output.tool_calls.clone(),
                                ));
                                if state.tool_call_count >= self.hard_cap {
                                    warn!(
                                        hard_cap = self.hard_cap,
                                        "Tool call cap reached; ending turn"
                                    );
                                    outcome = TurnOutcome::CapReached;
                                    Node::End
                                } else {
                                    pending = output.tool_calls;
                                    Node::Tools
                                }
                            }
                        }
                    }
                }

                Node::Tools => {
                    let calls = std::mem::take(&mut pending);
                    match self.executor.execute(&calls, &ctx, &events, &cancel).await {
                        Ok(results) => {
                            state.messages.extend(
                                results
                                    .into_iter()
                                    .map(|r| Message::tool_result(r.tool_call_id, r.output)),
                            );
                            debug!(
                                tool_call_count = state.tool_call_count,
                                "Tool results appended"
                            );
                            Node::Agent
                        }
                        Err(_) => {
                            outcome = TurnOutcome::Cancelled;
                            Node::End
                        }
                    }
                }

                Node::End => Node::End,
            };
        }

        let mut text = segments.join(SEGMENT_SEPARATOR);
        if matches!(outcome, TurnOutcome::CapReached) && text.is_empty() {
            let _ = events.send(StreamEvent::token(CAP_FALLBACK)).await;
            text = CAP_FALLBACK.to_string();
        }

        info!(
            steps,
            tool_call_count = state.tool_call_count,
            outcome = ?outcome,
            "Graph finished"
        );
        GraphRun {
            outcome,
            text,
            state,
            steps,
        }
    }
}
