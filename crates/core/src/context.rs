//! Per-request caller context.
//!
//! One `RequestContext` is built for every incoming chat request and handed
//! (behind an `Arc`) to the graph controller and each tool invocation. Tools
//! that act on behalf of the caller, such as calendar mutation, read the
//! identity from here.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    /// Identifier supplied by the identity provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Third-party OAuth access token (e.g. Google Calendar), if connected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oauth_token: Option<String>,

    /// Chat this turn belongs to; `None` means an ephemeral session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_oauth_token(mut self, token: impl Into<String>) -> Self {
        self.oauth_token = Some(token.into());
        self
    }

    pub fn with_chat(mut self, chat_id: impl Into<String>) -> Self {
        self.chat_id = Some(chat_id.into());
        self
    }

    /// Whether results of this turn should be persisted.
    pub fn is_persistent(&self) -> bool {
        self.chat_id.is_some()
    }
}
