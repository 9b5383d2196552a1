//! File-based chat store: persistent JSON-lines storage.
//!
//! Two append-only files live in the store directory:
//! - `chats.jsonl`: one [`Chat`] per line
//! - `messages.jsonl`: one [`StoredMessage`] per line
//!
//! Both are replayed into memory on open; every mutation appends one line.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use agentwire_core::error::StoreError;
use agentwire_core::message::Role;
use agentwire_core::store::{Chat, ChatStore, StoredMessage};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::in_memory::ChatTables;

const CHATS_FILE: &str = "chats.jsonl";
const MESSAGES_FILE: &str = "messages.jsonl";

/// A file-backed chat store using JSONL (one JSON object per line).
///
/// Reads are served from memory. The write lock is held across each append so
/// file order matches memory order.
pub struct FileChatStore {
    dir: PathBuf,
    tables: Arc<RwLock<ChatTables>>,
}

impl FileChatStore {
    /// Open the store in `dir`, loading any existing records.
    ///
    /// The directory is created if missing.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| {
            StoreError::Storage(format!(
                "Failed to create store directory {}: {e}",
                dir.display()
            ))
        })?;

        let tables = ChatTables {
            chats: load_jsonl(&dir.join(CHATS_FILE)),
            messages: load_jsonl(&dir.join(MESSAGES_FILE)),
        };
        debug!(
            path = %dir.display(),
            chats = tables.chats.len(),
            messages = tables.messages.len(),
            "File chat store loaded"
        );

        Ok(Self {
            dir,
            tables: Arc::new(RwLock::new(tables)),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn append<T: Serialize>(&self, file: &str, record: &T) -> Result<(), StoreError> {
        let mut line = serde_json::to_string(record)
            .map_err(|e| StoreError::Storage(format!("Failed to serialize record: {e}")))?;
        line.push('\n');

        let path = self.dir.join(file);
        let mut handle = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open {}: {e}", path.display())))?;
        handle
            .write_all(line.as_bytes())
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to write {}: {e}", path.display())))?;
        handle
            .flush()
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to flush {}: {e}", path.display())))
    }
}

/// Load records from a JSONL file, skipping lines that do not parse.
fn load_jsonl<T: DeserializeOwned>(path: &Path) -> Vec<T> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(_) => return Vec::new(), // Not created yet
    };

    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str::<T>(line) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(error = %e, path = %path.display(), "Skipping corrupted record");
                None
            }
        })
        .collect()
}

#[async_trait]
impl ChatStore for FileChatStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn create_chat(&self, user_id: &str, title: &str) -> Result<Chat, StoreError> {
        let mut tables = self.tables.write().await;
        let chat = tables.create_chat(user_id, title);
        if let Err(e) = self.append(CHATS_FILE, &chat).await {
            tables.chats.pop();
            return Err(e);
        }
        Ok(chat)
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
        let mut tables = self.tables.write().await;
        let message = tables.store_message(chat_id, role, content)?;
        if let Err(e) = self.append(MESSAGES_FILE, &message).await {
            tables.messages.pop();
            return Err(e);
        }
        Ok(message)
    }

    async fn get_last_message(&self, chat_id: &str) -> Result<Option<StoredMessage>, StoreError> {
        self.tables.read().await.get_last_message(chat_id)
    }
}
