//! Chat persistence implementations for agentwire.

pub mod file_backend;
pub mod in_memory;

use std::sync::Arc;

use agentwire_config::{StoreBackend, StoreConfig};
use agentwire_core::error::StoreError;
use agentwire_core::store::ChatStore;

pub use file_backend::FileChatStore;
pub use in_memory::InMemoryChatStore;

/// Open the configured store.
pub fn build_from_config(config: &StoreConfig) -> Result<Arc<dyn ChatStore>, StoreError> {
    match config.backend {
        StoreBackend::Memory => Ok(Arc::new(InMemoryChatStore::new())),
        StoreBackend::File => Ok(Arc::new(FileChatStore::open(config.resolved_path())?)),
    }
}
