//! Scripted model provider for tests of the engine and the crates above it.
//!
//! Each `stream` call pops the next [`Reply`]. Text replies are streamed one
//! word at a time; tool replies arrive in the final chunk with their input
//! wrapped as `{"input": ...}`, the way a real model sends it.

use std::collections::VecDeque;
use std::sync::Mutex;

use agentwire_core::error::ProviderError;
use agentwire_core::message::{Message, ToolCallRequest};
use agentwire_core::provider::{
    ChunkReceiver, Provider, ProviderRequest, ProviderResponse, StreamChunk,
};
use async_trait::async_trait;
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    /// Optional lead-in text plus `(tool, input)` pairs.
    Tools(String, Vec<(String, String)>),
    Fail(ProviderError),
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn tool(name: &str, input: &str) -> Self {
        Self::Tools(String::new(), vec![(name.into(), input.into())])
    }

    pub fn tools(lead: &str, calls: &[(&str, &str)]) -> Self {
        Self::Tools(
            lead.into(),
            calls
                .iter()
                .map(|(n, i)| ((*n).to_string(), (*i).to_string()))
                .collect(),
        )
    }
}

pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Reply>>,
    repeat: Option<Reply>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            repeat: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answer every call with the same reply.
    pub fn always(reply: Reply) -> Self {
        Self {
            repeat: Some(reply),
            ..Self::new(Vec::new())
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or_default()
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn next_reply(&self, request: ProviderRequest) -> Reply {
        let call = {
            let mut requests = self.requests.lock().unwrap_or_else(|e| e.into_inner());
            requests.push(request);
            requests.len()
        };
        let queued = self
            .replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        match (queued, &self.repeat) {
            (Some(reply), _) => reply,
            (None, Some(reply)) => reply.clone(),
            (None, None) => Reply::Fail(ProviderError::ApiError {
                status_code: 500,
                message: format!("script exhausted at call {call}"),
            }),
        }
    }
}

fn tool_calls(calls: &[(String, String)]) -> Vec<ToolCallRequest> {
    calls
        .iter()
        .enumerate()
        .map(|(i, (name, input))| {
            ToolCallRequest::new(
                format!("toolu_{i}_{name}"),
                name.as_str(),
                serde_json::json!({ "input": input }).to_string(),
            )
        })
        .collect()
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let message = match self.next_reply(request) {
            Reply::Text(text) => Message::assistant(text),
            Reply::Tools(lead, calls) => Message::assistant_with_tools(lead, tool_calls(&calls)),
            Reply::Fail(e) => return Err(e),
        };
        Ok(ProviderResponse {
            message,
            usage: None,
            model: "scripted".into(),
        })
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        let (text, calls) = match self.next_reply(request) {
            Reply::Text(text) => (text, Vec::new()),
            Reply::Tools(lead, calls) => (lead, tool_calls(&calls)),
            Reply::Fail(e) => return Err(e),
        };

        let mut chunks: Vec<StreamChunk> = text
            .split_inclusive(' ')
            .map(StreamChunk::text)
            .collect();
        chunks.push(StreamChunk {
            tool_calls: calls,
            done: true,
            ..StreamChunk::default()
        });

        let (tx, rx) = mpsc::channel(chunks.len());
        for chunk in chunks {
            let _ = tx.send(Ok(chunk)).await;
        }
        Ok(rx)
    }
}
