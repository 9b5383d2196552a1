//! Client side of the agentwire event stream.
//!
//! [`StreamReassembler`] rebuilds typed events from raw body chunks;
//! [`ChatClient`] posts a turn to a gateway and yields those events as a
//! stream.

pub mod chat_client;
pub mod error;
pub mod reassembler;

pub use chat_client::{ChatClient, ChatRequest};
pub use error::ClientError;
pub use reassembler::StreamReassembler;
