//! In-memory backend: useful for testing and ephemeral servers.

use agentwire_core::error::StoreError;
use agentwire_core::message::Role;
use agentwire_core::store::{Chat, ChatStore, StoredMessage};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Chats and messages in insertion order.
///
/// Shared by both backends; the file backend replays its JSONL files into one
/// of these on open.
#[derive(Debug, Default)]
pub(crate) struct ChatTables {
    pub(crate) chats: Vec<Chat>,
    pub(crate) messages: Vec<StoredMessage>,
}

impl ChatTables {
    pub(crate) fn create_chat(&mut self, user_id: &str, title: &str) -> Chat {
        let chat = Chat {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            title: title.to_string(),
            created_at: Utc::now(),
        };
        self.chats.push(chat.clone());
        chat
    }

    pub(crate) fn list_chats(&self, user_id: &str) -> Vec<Chat> {
        self.chats
            .iter()
            .rev()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect()
    }

    pub(crate) fn store_message(
        &mut self,
        chat_id: &str,
        role: Role,
        content: &str,
    ) -> Result<StoredMessage, StoreError> {
        if !self.chats.iter().any(|c| c.id == chat_id) {
            return Err(StoreError::ChatNotFound(chat_id.to_string()));
        }
        let message = StoredMessage {
            id: Uuid::new_v4().to_string(),
            chat_id: chat_id.to_string(),
            role,
            content: content.to_string(),
            created_at: Utc::now(),
        };
        self.messages.push(message.clone());
        Ok(message)
    }

    pub(crate) fn get_last_message(
        &self,
        chat_id: &str,
    ) -> Result<Option<StoredMessage>, StoreError> {
        if !self.chats.iter().any(|c| c.id == chat_id) {
            return Err(StoreError::ChatNotFound(chat_id.to_string()));
        }
        Ok(self
            .messages
            .iter()
            .rev()
            .find(|m| m.chat_id == chat_id)
            .cloned())
    }
}

/// A store that keeps everything in process memory.
/// Useful for testing and sessions where persistence isn't needed.
#[derive(Clone, Default)]
pub struct InMemoryChatStore {
    tables: Arc<RwLock<ChatTables>>,
}

impl InMemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of messages across all chats.
    pub async fn message_count(&self) -> usize {
        self.tables.read().await.messages.len()
    }
}

#[async_trait]
impl ChatStore for InMemoryChatStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn create_chat(&self, user_id: &str, title: &str) -> Result<Chat, StoreError> {
        Ok(self.tables.write().await.create_chat(user_id, title))
    }

    async fn list_chats(&self, user_id: &str) -> Result<Vec<Chat>, StoreError> {
        Ok(self.tables.read().await.list_chats(user_id))
    }

    async fn store_message(
        &self,
        chat_id: &str,
        role: Role,
        content: &str,
    ) -> Result<StoredMessage, StoreError> {
        self.tables
            .write()
            .await
            .store_message(chat_id, role, content)
    }

    async fn get_last_message(&self, chat_id: &str) -> Result<Option<StoredMessage>, StoreError> {
        self.tables.read().await.get_last_message(chat_id)
    }
}
