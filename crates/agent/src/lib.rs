//! The agentwire workflow engine.
//!
//! One chat turn flows through these pieces:
//!
//! 1. [`context::ContextWindow`] trims the history to a budget and prepends
//!    the system prompt.
//! 2. [`step::AgentStep`] streams one model reply, forwarding tokens.
//! 3. [`executor::ToolExecutor`] runs the requested tools concurrently,
//!    each under a timeout.
//! 4. [`graph::GraphController`] loops steps 2 and 3 until the model answers
//!    in plain text or the tool-call cap is hit.
//! 5. [`turn::TurnRunner`] persists the exchange and emits `Done` or `Error`.

pub mod context;
pub mod error;
pub mod executor;
pub mod graph;
pub mod prompt;
pub mod step;
pub mod turn;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

use std::sync::Arc;

use agentwire_config::AppConfig;
use agentwire_core::provider::Provider;
use agentwire_core::store::ChatStore;
use agentwire_core::tool::ToolRegistry;

pub use context::{ContextWindow, WindowBudget};
pub use error::Cancelled;
pub use executor::{ExecutionMode, ToolExecutor};
pub use graph::{GraphController, GraphRun, TurnOutcome, WorkflowState};
pub use step::{AgentStep, StepOutput};
pub use turn::{TurnRequest, TurnRunner};

/// Wire a turn runner from configuration and its collaborators.
pub fn build_turn_runner(
    config: &AppConfig,
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    store: Arc<dyn ChatStore>,
) -> Arc<TurnRunner> {
    let step = AgentStep::from_config(provider, &config.model).with_tools(tools.definitions());
    let executor = ToolExecutor::from_config(tools, &config.workflow);
    let graph = GraphController::from_config(step, executor, &config.workflow);
    Arc::new(TurnRunner::new(Arc::new(graph), store))
}
