//! Wire events streamed from the server to the client.
//!
//! Each event travels as one event-stream frame: `data: <json>\n\n`.
//! The JSON object carries a `type` discriminator:
//!
//! | type         | fields                     |
//! |--------------|----------------------------|
//! | `token`      | `token`                    |
//! | `tool_start` | `tool`, `input`            |
//! | `tool_end`   | `tool`, `output`           |
//! | `error`      | `error` (terminal)         |
//! | `done`       | (terminal, text persisted) |

use serde::{Deserialize, Serialize};

/// Field prefix for the payload line of a frame.
pub const DATA_PREFIX: &str = "data:";

/// Terminates every frame.
pub const FRAME_DELIMITER: &str = "\n\n";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Incremental assistant text.
    Token { token: String },

    /// A tool call was dispatched.
    ToolStart {
        tool: String,
        input: serde_json::Value,
    },

    /// A tool call produced its result.
    ToolEnd {
        tool: String,
        output: serde_json::Value,
    },

    /// The turn failed; nothing follows.
    Error { error: String },

    /// The turn completed and its text is durable; nothing follows.
    Done,
}

impl StreamEvent {
    pub fn token(token: impl Into<String>) -> Self {
        Self::Token {
            token: token.into(),
        }
    }

    pub fn tool_start(tool: impl Into<String>, input: impl Into<String>) -> Self {
        Self::ToolStart {
            tool: tool.into(),
            input: serde_json::Value::String(input.into()),
        }
    }

    pub fn tool_end(tool: impl Into<String>, output: impl Into<String>) -> Self {
        Self::ToolEnd {
            tool: tool.into(),
            output: serde_json::Value::String(output.into()),
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self::Error {
            error: error.into(),
        }
    }

    /// The value of the `type` field.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Token { .. } => "token",
            Self::ToolStart { .. } => "tool_start",
            Self::ToolEnd { .. } => "tool_end",
            Self::Error { .. } => "error",
            Self::Done => "done",
        }
    }

    /// `Error` and `Done` end the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error { .. } | Self::Done)
    }

    /// Serialize into a complete `data: <json>\n\n` frame.
    pub fn to_frame(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_default();
        format!("{DATA_PREFIX} {json}{FRAME_DELIMITER}")
    }
}
