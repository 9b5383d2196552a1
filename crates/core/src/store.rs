//! ChatStore trait: the persistence collaborator.
//!
//! The engine only needs four operations: open a chat, list a user's chats,
//! append a message, and read back the most recent one. Schema design is
//! left to the implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::message::Role;

/// A conversation owned by one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

/// One persisted message of a chat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredMessage {
    pub id: String,
    pub chat_id: String,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Persistence for chats and their messages.
///
/// Implementations: in-memory (tests, ephemeral servers) and JSONL files.
/// Implementations are shared between concurrent turns and do their own
/// locking.
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// The backend name (e.g., "memory", "file").
    fn name(&self) -> &str;

    /// Create a chat and return it.
    async fn create_chat(&self, user_id: &str, title: &str) -> Result<Chat, StoreError>;

    /// All chats of a user, newest first.
    async fn list_chats(&self, user_id: &str) -> Result<Vec<Chat>, StoreError>;

    /// Append a message to an existing chat.
    async fn store_message(
        &self,
        chat_id: &str,
        role: Role,
        content: &str,
    ) -> Result<StoredMessage, StoreError>;

    /// The most recent message of a chat, if it has any.
    async fn get_last_message(&self, chat_id: &str) -> Result<Option<StoredMessage>, StoreError>;
}
