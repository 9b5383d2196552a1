//! # agentwire Core
//!
//! Domain types, traits, and error definitions for the agentwire
//! tool-calling engine. This crate has **no framework dependencies**: it
//! defines the model that every other crate implements against.
//!
//! ## Design Philosophy
//!
//! Every collaborator the engine talks to is a trait here:
//! - [`Provider`] for the LLM backend
//! - [`Tool`] for capabilities the model can invoke
//! - [`ChatStore`] for chat persistence
//!
//! Implementations live in their own crates, so the engine can be tested with
//! scripted providers and in-memory stores.

pub mod context;
pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod store;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use context::RequestContext;
pub use error::{Error, ProviderError, Result, StoreError, ToolError};
pub use event::StreamEvent;
pub use message::{Message, Role, ToolCallRequest};
pub use provider::{Provider, ProviderRequest, ProviderResponse, StreamChunk, ToolDefinition};
pub use store::{Chat, ChatStore, StoredMessage};
pub use tool::{Tool, ToolOutput, ToolRegistry, ToolResult};
