//! One model invocation: stream the reply, forward tokens, collect tool calls.

use std::sync::Arc;

use agentwire_config::ModelConfig;
use agentwire_core::error::ProviderError;
use agentwire_core::event::StreamEvent;
use agentwire_core::message::{Message, ToolCallRequest};
use agentwire_core::provider::{Provider, ProviderRequest, ToolDefinition, Usage};
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// What a single agent step produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepOutput {
    /// The full text streamed during this step.
    pub text: String,
    /// Tool calls requested by the model, inputs already unwrapped.
    pub tool_calls: Vec<ToolCallRequest>,
    pub usage: Option<Usage>,
}

impl StepOutput {
    pub fn wants_tools(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Calls the model with a prepared prompt and the tool schemas.
pub struct AgentStep {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    tools: Vec<ToolDefinition>,
}

impl AgentStep {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
            tools: Vec::new(),
        }
    }

    pub fn from_config(provider: Arc<dyn Provider>, config: &ModelConfig) -> Self {
        Self::new(provider, config.model.as_str())
            .with_temperature(config.temperature)
            .with_max_tokens(config.max_tokens)
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    /// Run the step. Text deltas are sent as `Token` events as they arrive.
    ///
    /// A closed event channel does not stop the step; cancellation is the
    /// caller's job.
    pub async fn run(
        &self,
        messages: Vec<Message>,
        events: &mpsc::Sender<StreamEvent>,
    ) -> Result<StepOutput, ProviderError> {
        self.run_continuing(messages, events, None).await
    }

    /// Like [`run`](Self::run), but if this step produces any text, `separator`
    /// is streamed as its own token just before the first delta. The separator
    /// is not part of [`StepOutput::text`].
    pub async fn run_continuing(
        &self,
        messages: Vec<Message>,
        events: &mpsc::Sender<StreamEvent>,
        separator: Option<&str>,
    ) -> Result<StepOutput, ProviderError> {
        let request = ProviderRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            tools: self.tools.clone(),
        };

        let mut chunks = self.provider.stream(request).await?;
        let mut output = StepOutput::default();

        while let Some(chunk) = chunks.recv().await {
            let chunk = chunk?;
            if let Some(delta) = chunk.content.filter(|d| !d.is_empty()) {
                if output.text.is_empty()
                    && let Some(separator) = separator
                    && events.send(StreamEvent::token(separator)).await.is_err()
                {
                    trace!("Event receiver gone; separator dropped");
                }
                output.text.push_str(&delta);
                if events.send(StreamEvent::token(delta)).await.is_err() {
                    trace!("Event receiver gone; token dropped");
                }
            }
            output
                .tool_calls
                .extend(chunk.tool_calls.into_iter().map(unwrap_input));
            if chunk.usage.is_some() {
                output.usage = chunk.usage;
            }
            if chunk.done {
                break;
            }
        }

        debug!(
            provider = %self.provider.name(),
            text_len = output.text.len(),
            tool_calls = output.tool_calls.len(),
            "Agent step finished"
        );
        Ok(output)
    }
}

/// Tools take one string. The model sends `{"input": "..."}`; anything else is
/// passed through as raw JSON text.
fn unwrap_input(mut call: ToolCallRequest) -> ToolCallRequest {
    if let Ok(serde_json::Value::Object(args)) = serde_json::from_str(&call.input_text)
        && let Some(serde_json::Value::String(input)) = args.get("input")
    {
        call.input_text = input.clone();
    }
    call
}
