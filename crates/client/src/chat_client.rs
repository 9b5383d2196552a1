//! HTTP client for `POST /api/chat/stream`.

use std::time::Duration;

use agentwire_core::event::StreamEvent;
use agentwire_core::message::Message;
use futures::StreamExt;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use crate::error::ClientError;
use crate::reassembler::StreamReassembler;

/// One turn as the gateway expects it.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    pub new_message: String,
    pub chat_id: Option<String>,
}

impl ChatRequest {
    pub fn new(new_message: impl Into<String>) -> Self {
        Self {
            new_message: new_message.into(),
            ..Self::default()
        }
    }

    pub fn with_history(mut self, messages: Vec<Message>) -> Self {
        self.messages = messages;
        self
    }

    pub fn with_chat(mut self, chat_id: impl Into<String>) -> Self {
        self.chat_id = Some(chat_id.into());
        self
    }
}

pub struct ChatClient {
    client: reqwest::Client,
    base_url: String,
    user_id: Option<String>,
    oauth_token: Option<String>,
}

impl ChatClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ClientError::InvalidUrl(base_url));
        }
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url,
            user_id: None,
            oauth_token: None,
        })
    }

    /// Identify as `user_id` (sent as `x-user-id`).
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_oauth_token(mut self, token: impl Into<String>) -> Self {
        self.oauth_token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send one turn and stream back its events.
    ///
    /// Fails only if the gateway cannot be reached or rejects the request.
    /// A transport error mid-stream ends the stream early; callers detect
    /// that by the missing `Done`/`Error`.
    pub async fn stream(
        &self,
        request: &ChatRequest,
    ) -> Result<ReceiverStream<StreamEvent>, ClientError> {
        let url = format!("{}/api/chat/stream", self.base_url);
        let mut builder = self
            .client
            .post(&url)
            .header("accept", "text/event-stream")
            .json(request);
        if let Some(user_id) = &self.user_id {
            builder = builder.header("x-user-id", user_id);
        }
        if let Some(token) = &self.oauth_token {
            builder = builder.header("x-oauth-token", token);
        }

        debug!(url = %url, chat_id = ?request.chat_id, "Opening chat stream");
        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(async move {
            let mut bytes = response.bytes_stream();
            let mut reassembler = StreamReassembler::new();

            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        warn!(error = %e, "Chat stream interrupted");
                        return;
                    }
                };
                for event in reassembler.push(&chunk) {
                    if tx.send(event).await.is_err() {
                        // Receiver dropped: returning closes the connection.
                        return;
                    }
                }
            }
            reassembler.finish();
        });

        Ok(ReceiverStream::new(rx))
    }
}
