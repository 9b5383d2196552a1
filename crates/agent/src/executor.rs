//! Tool executor: runs the tool calls of one agent step.
//!
//! Each invocation runs in its own task under a timeout, so a slow, failing
//! or panicking tool only ever produces an error result. Results come back
//! in request order regardless of completion order.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use agentwire_config::{ExecutionKind, WorkflowConfig};
use agentwire_core::context::RequestContext;
use agentwire_core::error::ToolError;
use agentwire_core::event::StreamEvent;
use agentwire_core::message::ToolCallRequest;
use agentwire_core::tool::{ToolOutput, ToolRegistry, ToolResult};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tokio::time::error::Elapsed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::Cancelled;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExecutionMode {
    #[default]
    Concurrent,
    Sequential,
}

impl From<ExecutionKind> for ExecutionMode {
    fn from(kind: ExecutionKind) -> Self {
        match kind {
            ExecutionKind::Concurrent => Self::Concurrent,
            ExecutionKind::Sequential => Self::Sequential,
        }
    }
}

pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    timeout: Duration,
    mode: ExecutionMode,
}

type Settled = Result<Result<ToolOutput, Elapsed>, JoinError>;

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            timeout: Duration::from_secs(30),
            mode: ExecutionMode::default(),
        }
    }

    pub fn from_config(registry: Arc<ToolRegistry>, config: &WorkflowConfig) -> Self {
        Self::new(registry)
            .with_timeout(Duration::from_secs(config.tool_timeout_secs))
            .with_mode(config.execution.into())
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Run every call, emitting `ToolStart` at dispatch and `ToolEnd` as each
    /// result is ready. In-flight tools are aborted on cancellation.
    pub async fn execute(
        &self,
        calls: &[ToolCallRequest],
        ctx: &Arc<RequestContext>,
        events: &mpsc::Sender<StreamEvent>,
        cancel: &CancellationToken,
    ) -> Result<Vec<ToolResult>, Cancelled> {
        debug!(count = calls.len(), mode = ?self.mode, "Executing tool calls");
        match self.mode {
            ExecutionMode::Concurrent => self.run_concurrent(calls, ctx, events, cancel).await,
            ExecutionMode::Sequential => self.run_sequential(calls, ctx, events, cancel).await,
        }
    }

    async fn run_concurrent(
        &self,
        calls: &[ToolCallRequest],
        ctx: &Arc<RequestContext>,
        events: &mpsc::Sender<StreamEvent>,
        cancel: &CancellationToken,
    ) -> Result<Vec<ToolResult>, Cancelled> {
        let mut results: Vec<Option<ToolResult>> = vec![None; calls.len()];
        let mut tasks = JoinSet::new();
        let mut slots = HashMap::new();

        for (i, call) in calls.iter().enumerate() {
            emit(events, StreamEvent::tool_start(&call.tool_name, &call.input_text)).await;
            match self.spawn_into(&mut tasks, call, ctx) {
                Ok(id) => {
                    slots.insert(id, i);
                }
                Err(result) => {
                    emit(events, end_event(&result)).await;
                    results[i] = Some(result);
                }
            }
        }

        loop {
            let joined = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tasks.abort_all();
                    return Err(Cancelled);
                }
                joined = tasks.join_next_with_id() => joined,
            };
            let Some(joined) = joined else { break };

            let (id, settled): (_, Settled) = match joined {
                Ok((id, output)) => (id, Ok(output)),
                Err(e) => (e.id(), Err(e)),
            };
            let Some(&i) = slots.get(&id) else { continue };
            let result = self.settle(&calls[i], settled);
            emit(events, end_event(&result)).await;
            results[i] = Some(result);
        }

        Ok(results.into_iter().flatten().collect())
    }

    async fn run_sequential(
        &self,
        calls: &[ToolCallRequest],
        ctx: &Arc<RequestContext>,
        events: &mpsc::Sender<StreamEvent>,
        cancel: &CancellationToken,
    ) -> Result<Vec<ToolResult>, Cancelled> {
        let mut results = Vec::with_capacity(calls.len());

        for call in calls {
            if cancel.is_cancelled() {
                return Err(Cancelled);
            }
            emit(events, StreamEvent::tool_start(&call.tool_name, &call.input_text)).await;

            let mut tasks = JoinSet::new();
            let result = match self.spawn_into(&mut tasks, call, ctx) {
                Err(result) => result,
                Ok(_) => {
                    let joined = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            tasks.abort_all();
                            return Err(Cancelled);
                        }
                        joined = tasks.join_next() => joined,
                    };
                    match joined {
                        Some(settled) => self.settle(call, settled),
                        None => ToolResult::from_error(call, &ToolError::Panicked(call.tool_name.clone())),
                    }
                }
            };

            emit(events, end_event(&result)).await;
            results.push(result);
        }

        Ok(results)
    }

    /// Resolve and spawn one call. Unknown tools settle immediately.
    fn spawn_into(
        &self,
        tasks: &mut JoinSet<Result<ToolOutput, Elapsed>>,
        call: &ToolCallRequest,
        ctx: &Arc<RequestContext>,
    ) -> Result<tokio::task::Id, ToolResult> {
        let tool = self.registry.resolve(&call.tool_name).map_err(|e| {
            warn!(tool = %call.tool_name, "Model requested an unknown tool");
            ToolResult::from_error(call, &e)
        })?;

        let ctx = Arc::clone(ctx);
        let input = call.input_text.clone();
        let timeout = self.timeout;
        let handle = tasks.spawn(async move {
            tokio::time::timeout(timeout, tool.invoke(&input, &ctx)).await
        });
        Ok(handle.id())
    }

    fn settle(&self, call: &ToolCallRequest, settled: Settled) -> ToolResult {
        match settled {
            Ok(Ok(output)) => {
                if output.is_error {
                    warn!(tool = %call.tool_name, error = %output.text, "Tool failed");
                }
                ToolResult::from_output(call, output)
            }
            Ok(Err(_)) => {
                warn!(tool = %call.tool_name, timeout_secs = self.timeout.as_secs(), "Tool timed out");
                ToolResult::from_error(
                    call,
                    &ToolError::Timeout {
                        tool_name: call.tool_name.clone(),
                        timeout_secs: self.timeout.as_secs(),
                    },
                )
            }
            Err(e) => {
                warn!(tool = %call.tool_name, error = %e, "Tool task crashed");
                ToolResult::from_error(call, &ToolError::Panicked(call.tool_name.clone()))
            }
        }
    }
}

fn end_event(result: &ToolResult) -> StreamEvent {
    StreamEvent::tool_end(&result.tool_name, &result.output)
}

async fn emit(events: &mpsc::Sender<StreamEvent>, event: StreamEvent) {
    // A closed channel means the client left; the cancellation token handles that.
    let _ = events.send(event).await;
}
