//! Anthropic native provider implementation.
//!
//! Uses Anthropic's Messages API directly.
//!
//! Features:
//! - `x-api-key` header authentication (not Bearer)
//! - `anthropic-version` header
//! - System prompt as top-level field
//! - Native tool use with `tool_use` / `tool_result` content blocks
//! - Streaming via SSE with `content_block_delta` events
//! - Prompt caching: `cache_control` on the system prompt and on messages
//!   that carry a cache hint

use std::time::Duration;

use agentwire_config::ModelConfig;
use agentwire_core::error::ProviderError;
use agentwire_core::message::{Message, Role, ToolCallRequest};
use agentwire_core::provider::{
    ChunkReceiver, Provider, ProviderRequest, ProviderResponse, StreamChunk, ToolDefinition,
    Usage,
};
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const PROMPT_CACHING_BETA: &str = "prompt-caching-2024-07-31";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Anthropic native Messages API provider.
pub struct AnthropicProvider {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
    prompt_caching: bool,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider with prompt caching enabled.
    pub fn new(api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .unwrap_or_default();

        Self {
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            client,
            prompt_caching: true,
        }
    }

    /// Build from the `[model]` config section. Fails without an API key.
    pub fn from_config(config: &ModelConfig) -> Result<Self, ProviderError> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            ProviderError::NotConfigured(
                "no Anthropic API key (set model.api_key, AGENTWIRE_API_KEY or ANTHROPIC_API_KEY)"
                    .into(),
            )
        })?;

        Ok(Self::new(api_key)
            .with_base_url(&config.api_url)
            .with_prompt_caching(config.prompt_caching))
    }

    /// Create with a custom base URL (e.g., for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_prompt_caching(mut self, enabled: bool) -> Self {
        self.prompt_caching = enabled;
        self
    }

    /// Split system messages off the conversation.
    /// Anthropic puts the system prompt in a top-level field, not in messages.
    fn extract_system(messages: &[Message]) -> (Vec<&str>, Vec<&Message>) {
        let mut system_parts: Vec<&str> = Vec::new();
        let mut non_system: Vec<&Message> = Vec::new();

        for msg in messages {
            match msg.role {
                Role::System => system_parts.push(&msg.content),
                _ => non_system.push(msg),
            }
        }

        (system_parts, non_system)
    }

    /// The `system` field. With caching, each part becomes its own block and
    /// only the first is marked.
    fn system_field(&self, parts: &[&str]) -> Option<serde_json::Value> {
        if parts.is_empty() {
            return None;
        }
        if !self.prompt_caching {
            return Some(serde_json::json!(parts.join("\n\n")));
        }

        let blocks: Vec<ContentBlock> = parts
            .iter()
            .enumerate()
            .map(|(i, part)| {
                let mut block = ContentBlock::text(*part);
                if i == 0 {
                    block.mark_cached();
                }
                block
            })
            .collect();
        Some(serde_json::json!(blocks))
    }

    /// Convert messages to Anthropic API format with content blocks.
    ///
    /// Consecutive tool results are merged into one `user` message, which is
    /// how the API expects the answers to a multi-tool `assistant` turn.
    fn to_api_messages(messages: &[&Message], caching: bool) -> Vec<AnthropicMessage> {
        let mut result: Vec<AnthropicMessage> = Vec::new();

        for msg in messages {
            let cache = caching && msg.cache_hint;
            match msg.role {
                Role::Human => {
                    let mut api_msg = AnthropicMessage {
                        role: "user".into(),
                        content: AnthropicContent::Text(msg.content.clone()),
                    };
                    if cache {
                        api_msg.mark_cached();
                    }
                    result.push(api_msg);
                }
                Role::Assistant => {
                    if msg.tool_calls.is_empty() && msg.content.is_empty() {
                        continue;
                    }
                    let mut api_msg = if msg.tool_calls.is_empty() {
                        AnthropicMessage {
                            role: "assistant".into(),
                            content: AnthropicContent::Text(msg.content.clone()),
                        }
                    } else {
                        let mut blocks: Vec<ContentBlock> = Vec::new();
                        if !msg.content.is_empty() {
                            blocks.push(ContentBlock::text(msg.content.as_str()));
                        }
                        for tc in &msg.tool_calls {
                            blocks.push(ContentBlock::ToolUse {
                                id: tc.id.clone(),
                                name: tc.tool_name.clone(),
                                input: serde_json::json!({ "input": tc.input_text }),
                                cache_control: None,
                            });
                        }
                        AnthropicMessage {
                            role: "assistant".into(),
                            content: AnthropicContent::Blocks(blocks),
                        }
                    };
                    if cache {
                        api_msg.mark_cached();
                    }
                    result.push(api_msg);
                }
                Role::Tool => {
                    let mut block = ContentBlock::ToolResult {
                        tool_use_id: msg.tool_call_id.clone().unwrap_or_default(),
                        content: msg.content.clone(),
                        cache_control: None,
                    };
                    if cache {
                        block.mark_cached();
                    }
                    let merge = result.last().is_some_and(|prev| prev.is_tool_results());
                    if merge
                        && let Some(AnthropicMessage {
                            content: AnthropicContent::Blocks(blocks),
                            ..
                        }) = result.last_mut()
                    {
                        blocks.push(block);
                    } else {
                        result.push(AnthropicMessage {
                            role: "user".into(),
                            content: AnthropicContent::Blocks(vec![block]),
                        });
                    }
                }
                Role::System => {} // handled separately
            }
        }

        result
    }

    /// Convert tool definitions to Anthropic format.
    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<AnthropicTool> {
        tools
            .iter()
            .map(|t| AnthropicTool {
                name: t.name.clone(),
                description: t.description.clone(),
                input_schema: t.parameters.clone(),
            })
            .collect()
    }

    fn build_body(&self, request: &ProviderRequest, stream: bool) -> serde_json::Value {
        let (system, messages) = Self::extract_system(&request.messages);
        let api_messages = Self::to_api_messages(&messages, self.prompt_caching);

        let mut body = serde_json::json!({
            "model": request.model,
            "messages": api_messages,
            "max_tokens": request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            "temperature": request.temperature,
        });

        if stream {
            body["stream"] = serde_json::json!(true);
        }

        if let Some(system) = self.system_field(&system) {
            body["system"] = system;
        }

        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(&request.tools));
        }

        body
    }

    /// POST to `/v1/messages` and map non-success statuses to errors.
    async fn send(
        &self,
        body: &serde_json::Value,
        stream: bool,
    ) -> Result<reqwest::Response, ProviderError> {
        let url = format!("{}/v1/messages", self.base_url);

        let mut builder = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json");

        if self.prompt_caching {
            builder = builder.header("anthropic-beta", PROMPT_CACHING_BETA);
        }
        if stream {
            builder = builder.header("Accept", "text/event-stream");
        }

        let response = builder
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status().as_u16();

        if status == 429 {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(5);
            return Err(ProviderError::RateLimited { retry_after_secs });
        }
        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(
                "Invalid Anthropic API key".into(),
            ));
        }
        if !response.status().is_success() {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Anthropic API error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        Ok(response)
    }

    /// Convert Anthropic API response to our ProviderResponse.
    fn response_to_provider_response(resp: AnthropicResponse) -> ProviderResponse {
        let mut text_content = String::new();
        let mut tool_calls = Vec::new();

        for block in &resp.content {
            match block {
                ResponseContentBlock::Text { text } => {
                    if !text_content.is_empty() {
                        text_content.push('\n');
                    }
                    text_content.push_str(text);
                }
                ResponseContentBlock::ToolUse { id, name, input } => {
                    tool_calls.push(ToolCallRequest::new(
                        id.clone(),
                        name.clone(),
                        serde_json::to_string(input).unwrap_or_default(),
                    ));
                }
                ResponseContentBlock::Other => {}
            }
        }

        ProviderResponse {
            message: Message::assistant_with_tools(text_content, tool_calls),
            usage: Some(Usage {
                prompt_tokens: resp.usage.input_tokens,
                completion_tokens: resp.usage.output_tokens,
                cache_read_tokens: resp.usage.cache_read_input_tokens,
            }),
            model: resp.model,
        }
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let body = self.build_body(&request, false);

        debug!(provider = "anthropic", model = %request.model, "Sending completion request");

        let response = self.send(&body, false).await?;

        let api_resp: AnthropicResponse =
            response
                .json()
                .await
                .map_err(|e| ProviderError::ApiError {
                    status_code: 200,
                    message: format!("Failed to parse Anthropic response: {e}"),
                })?;

        Ok(Self::response_to_provider_response(api_resp))
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        let body = self.build_body(&request, true);

        debug!(
            provider = "anthropic",
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending streaming request"
        );

        let response = self.send(&body, true).await?;

        let (tx, rx) = tokio::sync::mpsc::channel(64);

        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut buffer: Vec<u8> = Vec::new();
            let mut acc = StreamAccumulator::default();

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx
                            .send(Err(ProviderError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                };

                buffer.extend_from_slice(&bytes);

                while let Some(line_end) = buffer.iter().position(|&b| b == b'\n') {
                    let raw: Vec<u8> = buffer.drain(..=line_end).collect();
                    let line = String::from_utf8_lossy(&raw);
                    let line = line.trim_end_matches(['\n', '\r']);

                    // `event:` lines duplicate the `type` field of the payload.
                    let Some(data) = line.strip_prefix("data:") else {
                        continue;
                    };
                    let data = data.trim();
                    if data.is_empty() {
                        continue;
                    }

                    let event: serde_json::Value = match serde_json::from_str(data) {
                        Ok(v) => v,
                        Err(e) => {
                            trace!(error = %e, data = %data, "Ignoring unparseable Anthropic SSE");
                            continue;
                        }
                    };

                    match acc.on_event(&event) {
                        Ok(Some(chunk)) => {
                            if tx.send(Ok(chunk)).await.is_err() {
                                // Receiver gone: dropping the stream closes the connection.
                                return;
                            }
                        }
                        Ok(None) => {}
                        Err(e) => {
                            let _ = tx.send(Err(e)).await;
                            return;
                        }
                    }

                    if acc.finished {
                        let _ = tx.send(Ok(std::mem::take(&mut acc).finish())).await;
                        return;
                    }
                }
            }

            let _ = tx
                .send(Err(ProviderError::StreamInterrupted(
                    "stream ended before message_stop".into(),
                )))
                .await;
        });

        Ok(rx)
    }
}

/// Folds Anthropic stream events into [`StreamChunk`]s.
///
/// Text deltas are forwarded immediately; tool calls are collected until
/// their block closes and delivered together in the final chunk.
#[derive(Default)]
struct StreamAccumulator {
    pending: Option<PendingToolUse>,
    tool_calls: Vec<ToolCallRequest>,
    usage: Usage,
    finished: bool,
}

#[derive(Default)]
struct PendingToolUse {
    id: String,
    name: String,
    arguments: String,
}

impl StreamAccumulator {
    fn on_event(
        &mut self,
        event: &serde_json::Value,
    ) -> Result<Option<StreamChunk>, ProviderError> {
        let event_type = event["type"].as_str().unwrap_or("");

        match event_type {
            "message_start" => {
                let usage = &event["message"]["usage"];
                self.usage.prompt_tokens = as_u32(&usage["input_tokens"]);
                self.usage.cache_read_tokens = as_u32(&usage["cache_read_input_tokens"]);
            }
            "content_block_start" => {
                let block = &event["content_block"];
                if block["type"].as_str() == Some("tool_use") {
                    self.close_tool_use();
                    self.pending = Some(PendingToolUse {
                        id: block["id"].as_str().unwrap_or("").to_string(),
                        name: block["name"].as_str().unwrap_or("").to_string(),
                        arguments: String::new(),
                    });
                }
            }
            "content_block_delta" => {
                let delta = &event["delta"];
                match delta["type"].as_str().unwrap_or("") {
                    "text_delta" => {
                        if let Some(text) = delta["text"].as_str() {
                            return Ok(Some(StreamChunk::text(text)));
                        }
                    }
                    "input_json_delta" => {
                        if let (Some(pending), Some(partial)) =
                            (self.pending.as_mut(), delta["partial_json"].as_str())
                        {
                            pending.arguments.push_str(partial);
                        }
                    }
                    other => trace!(delta_type = other, "Ignoring Anthropic delta"),
                }
            }
            "content_block_stop" => self.close_tool_use(),
            "message_delta" => {
                if let Some(out) = event["usage"]["output_tokens"].as_u64() {
                    self.usage.completion_tokens = out as u32;
                }
            }
            "message_stop" => self.finished = true,
            "error" => {
                let message = event["error"]["message"]
                    .as_str()
                    .unwrap_or("unknown streaming error");
                return Err(ProviderError::StreamInterrupted(message.to_string()));
            }
            other => trace!(event_type = other, "Ignoring Anthropic SSE event"),
        }

        Ok(None)
    }

    fn close_tool_use(&mut self) {
        if let Some(pending) = self.pending.take() {
            let arguments = if pending.arguments.trim().is_empty() {
                "{}".to_string()
            } else {
                pending.arguments
            };
            self.tool_calls
                .push(ToolCallRequest::new(pending.id, pending.name, arguments));
        }
    }

    fn finish(mut self) -> StreamChunk {
        self.close_tool_use();
        StreamChunk {
            content: None,
            tool_calls: self.tool_calls,
            done: true,
            usage: Some(self.usage),
        }
    }
}

fn as_u32(value: &serde_json::Value) -> u32 {
    value.as_u64().unwrap_or(0) as u32
}

// --- Anthropic API types ---

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: AnthropicContent,
}

impl AnthropicMessage {
    /// Put `cache_control` on the last content block.
    fn mark_cached(&mut self) {
        if let AnthropicContent::Text(text) = &self.content {
            self.content = AnthropicContent::Blocks(vec![ContentBlock::text(text.as_str())]);
        }
        if let AnthropicContent::Blocks(blocks) = &mut self.content
            && let Some(last) = blocks.last_mut()
        {
            last.mark_cached();
        }
    }

    fn is_tool_results(&self) -> bool {
        self.role == "user"
            && matches!(&self.content, AnthropicContent::Blocks(blocks)
                if blocks.iter().all(|b| matches!(b, ContentBlock::ToolResult { .. })))
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum AnthropicContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct CacheControl {
    #[serde(rename = "type")]
    kind: &'static str,
}

impl CacheControl {
    fn ephemeral() -> Self {
        Self { kind: "ephemeral" }
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        cache_control: Option<CacheControl>,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        cache_control: Option<CacheControl>,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        cache_control: Option<CacheControl>,
    },
}

impl ContentBlock {
    fn text(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            cache_control: None,
        }
    }

    fn mark_cached(&mut self) {
        match self {
            Self::Text { cache_control, .. }
            | Self::ToolUse { cache_control, .. }
            | Self::ToolResult { cache_control, .. } => {
                *cache_control = Some(CacheControl::ephemeral());
            }
        }
    }

    #[cfg(test)]
    fn is_cached(&self) -> bool {
        match self {
            Self::Text { cache_control, .. }
            | Self::ToolUse { cache_control, .. }
            | Self::ToolResult { cache_control, .. } => cache_control.is_some(),
        }
    }
}

#[derive(Debug, Serialize)]
struct AnthropicTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    model: String,
    content: Vec<ResponseContentBlock>,
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
    #[serde(default)]
    cache_read_input_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request(messages: Vec<Message>) -> ProviderRequest {
        ProviderRequest {
            model: "claude-sonnet-4-20250514".into(),
            messages,
            temperature: 0.7,
            max_tokens: None,
            tools: vec![],
        }
    }

    #[test]
    fn constructor_with_base_url() {
        let provider =
            AnthropicProvider::new("sk-ant-test").with_base_url("https://custom.proxy.com/");
        assert_eq!(provider.base_url, "https://custom.proxy.com");
        assert!(provider.prompt_caching);
    }

    #[test]
    fn from_config_requires_key() {
        let config = ModelConfig::default();
        let err = AnthropicProvider::from_config(&config).err().unwrap();
        assert!(matches!(err, ProviderError::NotConfigured(_)));
    }

    #[test]
    fn system_extraction() {
        let messages = vec![
            Message::system("You are helpful"),
            Message::human("Hello"),
            Message::assistant("Hi!"),
            Message::system("Wrap up now"),
        ];

        let (system, non_system) = AnthropicProvider::extract_system(&messages);
        assert_eq!(system, vec!["You are helpful", "Wrap up now"]);
        assert_eq!(non_system.len(), 2);
        assert_eq!(non_system[0].role, Role::Human);
    }

    #[test]
    fn cached_system_marks_only_base_prompt() {
        let provider = AnthropicProvider::new("sk-ant-test");
        let system = provider
            .system_field(&["You are helpful", "Wrap up now"])
            .unwrap();
        assert_eq!(system[0]["cache_control"]["type"], "ephemeral");
        assert!(system[1].get("cache_control").is_none());

        let plain = AnthropicProvider::new("sk-ant-test").with_prompt_caching(false);
        let system = plain.system_field(&["You are helpful", "Wrap up now"]).unwrap();
        assert_eq!(system, serde_json::json!("You are helpful\n\nWrap up now"));
    }

    #[test]
    fn cache_hint_becomes_cache_control_on_last_block() {
        let mut hinted = Message::human("What is 2+2?");
        hinted.cache_hint = true;
        let messages = [Message::human("earlier"), hinted];
        let refs: Vec<&Message> = messages.iter().collect();

        let api_msgs = AnthropicProvider::to_api_messages(&refs, true);
        assert!(matches!(api_msgs[0].content, AnthropicContent::Text(_)));
        match &api_msgs[1].content {
            AnthropicContent::Blocks(blocks) => {
                assert_eq!(blocks.len(), 1);
                assert!(blocks[0].is_cached());
            }
            _ => panic!("Expected blocks content"),
        }

        let api_msgs = AnthropicProvider::to_api_messages(&refs, false);
        assert!(matches!(api_msgs[1].content, AnthropicContent::Text(_)));
    }

    #[test]
    fn message_conversion_with_tool_calls() {
        let msg = Message::assistant_with_tools(
            "Let me calculate",
            vec![ToolCallRequest::new("toolu_123", "calculator", "2+2")],
        );

        let api_msgs = AnthropicProvider::to_api_messages(&[&msg], true);
        assert_eq!(api_msgs.len(), 1);
        assert_eq!(api_msgs[0].role, "assistant");

        match &api_msgs[0].content {
            AnthropicContent::Blocks(blocks) => {
                assert_eq!(blocks.len(), 2);
                match &blocks[1] {
                    ContentBlock::ToolUse { id, name, input, .. } => {
                        assert_eq!(id, "toolu_123");
                        assert_eq!(name, "calculator");
                        assert_eq!(input["input"], "2+2");
                    }
                    _ => panic!("Expected tool_use block"),
                }
            }
            _ => panic!("Expected blocks content"),
        }
    }

    #[test]
    fn consecutive_tool_results_share_one_user_message() {
        let messages = [
            Message::assistant_with_tools(
                "",
                vec![
                    ToolCallRequest::new("t1", "weather", "Oslo"),
                    ToolCallRequest::new("t2", "weather", "Paris"),
                ],
            ),
            Message::tool_result("t1", "Oslo: 3°C"),
            Message::tool_result("t2", "Paris: 11°C"),
        ];
        let refs: Vec<&Message> = messages.iter().collect();
        let api_msgs = AnthropicProvider::to_api_messages(&refs, true);
        assert_eq!(api_msgs.len(), 2);
        assert_eq!(api_msgs[1].role, "user");
        match &api_msgs[1].content {
            AnthropicContent::Blocks(blocks) => assert_eq!(blocks.len(), 2),
            _ => panic!("Expected blocks content"),
        }
    }

    #[test]
    fn parse_tool_use_response() {
        let resp: AnthropicResponse = serde_json::from_str(
            r#"{
                "id": "msg_02",
                "model": "claude-sonnet-4-20250514",
                "content": [
                    {"type": "text", "text": "Let me calculate"},
                    {"type": "tool_use", "id": "toolu_abc", "name": "calculator", "input": {"input": "2+2"}}
                ],
                "usage": {"input_tokens": 20, "output_tokens": 10, "cache_read_input_tokens": 12},
                "stop_reason": "tool_use"
            }"#,
        )
        .unwrap();

        let pr = AnthropicProvider::response_to_provider_response(resp);
        assert_eq!(pr.message.content, "Let me calculate");
        assert_eq!(pr.message.tool_calls.len(), 1);
        assert_eq!(pr.message.tool_calls[0].tool_name, "calculator");
        assert_eq!(pr.message.tool_calls[0].input_text, r#"{"input":"2+2"}"#);
        assert_eq!(pr.usage.unwrap().cache_read_tokens, 12);
    }

    #[test]
    fn accumulator_collects_text_and_tools() {
        let mut acc = StreamAccumulator::default();
        let events = [
            serde_json::json!({"type": "message_start", "message": {"usage": {"input_tokens": 30}}}),
            serde_json::json!({"type": "content_block_start", "index": 0, "content_block": {"type": "text", "text": ""}}),
            serde_json::json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "Checking"}}),
            serde_json::json!({"type": "content_block_stop", "index": 0}),
            serde_json::json!({"type": "content_block_start", "index": 1, "content_block": {"type": "tool_use", "id": "toolu_1", "name": "calculator"}}),
            serde_json::json!({"type": "content_block_delta", "index": 1, "delta": {"type": "input_json_delta", "partial_json": "{\"input\":"}}),
            serde_json::json!({"type": "content_block_delta", "index": 1, "delta": {"type": "input_json_delta", "partial_json": "\"2+2\"}"}}),
            serde_json::json!({"type": "content_block_stop", "index": 1}),
            serde_json::json!({"type": "message_delta", "usage": {"output_tokens": 7}}),
        ];

        let mut texts = Vec::new();
        for event in &events {
            if let Some(chunk) = acc.on_event(event).unwrap() {
                texts.push(chunk.content.unwrap());
            }
        }
        assert_eq!(texts, vec!["Checking"]);
        assert!(!acc.finished);

        acc.on_event(&serde_json::json!({"type": "message_stop"})).unwrap();
        assert!(acc.finished);

        let last = acc.finish();
        assert!(last.done);
        assert_eq!(last.tool_calls.len(), 1);
        assert_eq!(last.tool_calls[0].input_text, r#"{"input":"2+2"}"#);
        let usage = last.usage.unwrap();
        assert_eq!(usage.prompt_tokens, 30);
        assert_eq!(usage.completion_tokens, 7);
    }

    #[test]
    fn accumulator_surfaces_stream_errors() {
        let mut acc = StreamAccumulator::default();
        let err = acc
            .on_event(&serde_json::json!({"type": "error", "error": {"type": "overloaded_error", "message": "Overloaded"}}))
            .unwrap_err();
        assert!(err.to_string().contains("Overloaded"));
    }

    #[tokio::test]
    async fn complete_sends_caching_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "sk-ant-test"))
            .and(header("anthropic-beta", PROMPT_CACHING_BETA))
            .and(body_partial_json(serde_json::json!({
                "system": [{"type": "text", "text": "Be brief", "cache_control": {"type": "ephemeral"}}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "msg_1",
                "type": "message",
                "role": "assistant",
                "model": "claude-sonnet-4-20250514",
                "content": [{"type": "text", "text": "Hello!"}],
                "usage": {"input_tokens": 10, "output_tokens": 2}
            })))
            .mount(&server)
            .await;

        let provider = AnthropicProvider::new("sk-ant-test").with_base_url(server.uri());
        let response = provider
            .complete(request(vec![Message::system("Be brief"), Message::human("Hi")]))
            .await
            .unwrap();
        assert_eq!(response.message.content, "Hello!");
    }

    #[tokio::test]
    async fn stream_parses_sse_body() {
        let sse = concat!(
            "event: message_start\n",
            "data: {\"type\":\"message_start\",\"message\":{\"usage\":{\"input_tokens\":5}}}\n\n",
            "event: content_block_delta\n",
            "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Hel\"}}\n\n",
            "event: ping\n",
            "data: {\"type\":\"ping\"}\n\n",
            "event: content_block_delta\n",
            "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"lo\"}}\n\n",
            "event: message_stop\n",
            "data: {\"type\":\"message_stop\"}\n\n",
        );

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(body_partial_json(serde_json::json!({"stream": true})))
            .respond_with(ResponseTemplate::new(200).set_body_raw(sse, "text/event-stream"))
            .mount(&server)
            .await;

        let provider = AnthropicProvider::new("sk-ant-test").with_base_url(server.uri());
        let mut rx = provider
            .stream(request(vec![Message::human("Hi")]))
            .await
            .unwrap();

        let mut text = String::new();
        let mut done = false;
        while let Some(chunk) = rx.recv().await {
            let chunk = chunk.unwrap();
            if let Some(t) = chunk.content {
                text.push_str(&t);
            }
            done |= chunk.done;
        }
        assert_eq!(text, "Hello");
        assert!(done);
    }

    #[tokio::test]
    async fn truncated_stream_is_an_error() {
        let sse = "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Hel\"}}\n\n";
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(sse, "text/event-stream"))
            .mount(&server)
            .await;

        let provider = AnthropicProvider::new("sk-ant-test").with_base_url(server.uri());
        let mut rx = provider
            .stream(request(vec![Message::human("Hi")]))
            .await
            .unwrap();

        assert!(rx.recv().await.unwrap().is_ok());
        let err = rx.recv().await.unwrap().unwrap_err();
        assert!(matches!(err, ProviderError::StreamInterrupted(_)));
    }

    #[tokio::test]
    async fn status_codes_map_to_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("x-api-key", "limited"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "12"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(header("x-api-key", "bad"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(header("x-api-key", "overloaded"))
            .respond_with(ResponseTemplate::new(529).set_body_string("Overloaded"))
            .mount(&server)
            .await;

        let call = |key: &str| {
            let provider = AnthropicProvider::new(key).with_base_url(server.uri());
            async move {
                provider
                    .stream(request(vec![Message::human("Hi")]))
                    .await
                    .err()
                    .unwrap()
            }
        };

        assert!(matches!(
            call("limited").await,
            ProviderError::RateLimited { retry_after_secs: 12 }
        ));
        assert!(matches!(
            call("bad").await,
            ProviderError::AuthenticationFailed(_)
        ));
        assert!(matches!(
            call("overloaded").await,
            ProviderError::ApiError { status_code: 529, .. }
        ));
    }
}
