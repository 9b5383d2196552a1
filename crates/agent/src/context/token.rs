//! Token estimation for the token-denominated window budget.
//!
//! Character heuristic: ~4 characters per token, rounded up, plus a fixed
//! per-message overhead for role and delimiters.

use agentwire_core::message::Message;

/// Tokens charged per message on top of its content.
pub const MESSAGE_OVERHEAD: usize = 4;

/// Estimate the token count of a string.
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}

/// Estimate one message, counting its content, any tool-call inputs, and
/// the per-message overhead.
pub fn estimate_message_tokens(message: &Message) -> usize {
    let calls: usize = message
        .tool_calls
        .iter()
        .map(|c| estimate_tokens(&c.tool_name) + estimate_tokens(&c.input_text))
        .sum();
    MESSAGE_OVERHEAD + estimate_tokens(&message.content) + calls
}

pub fn estimate_messages_tokens(messages: &[Message]) -> usize {
    messages.iter().map(estimate_message_tokens).sum()
}
