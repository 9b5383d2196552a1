pub mod ask;
pub mod chat;
pub mod config_cmd;
pub mod serve;
pub mod tools;

use std::io::Write;
use std::path::Path;

use agentwire_config::AppConfig;
use agentwire_core::event::StreamEvent;
use tokio_stream::{Stream, StreamExt};

/// Load the config from `path`, or from the default location.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => AppConfig::load_with_env(path),
        None => AppConfig::load(),
    };
    config.map_err(|e| format!("Failed to load config: {e}").into())
}

/// Print one event for a terminal reader. Returns `true` on a terminal event.
///
/// Tokens go straight to `out`; tool activity and errors go on their own
/// lines so they stand apart from the reply.
pub fn render_event(event: &StreamEvent, out: &mut impl Write) -> std::io::Result<bool> {
    match event {
        StreamEvent::Token { token } => {
            write!(out, "{token}")?;
            out.flush()?;
        }
        StreamEvent::ToolStart { tool, input } => {
            writeln!(out, "\n  [{tool}] {}", display_value(input))?;
        }
        StreamEvent::ToolEnd { tool, output } => {
            writeln!(out, "  [{tool}] -> {}", preview(&display_value(output), 200))?;
        }
        StreamEvent::Error { error } => {
            writeln!(out, "\n  Error: {error}")?;
            return Ok(true);
        }
        StreamEvent::Done => {
            writeln!(out)?;
            return Ok(true);
        }
    }
    Ok(false)
}

/// Print a turn's events to stdout until a terminal event.
///
/// An `Error` event, or a stream that ends without `Done`, becomes an `Err`
/// so the process exits non-zero.
pub async fn print_stream(
    mut events: impl Stream<Item = StreamEvent> + Unpin,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut stdout = std::io::stdout();
    while let Some(event) = events.next().await {
        if render_event(&event, &mut stdout)? {
            return match event {
                StreamEvent::Error { error } => Err(error.into()),
                _ => Ok(()),
            };
        }
    }
    Err("stream ended before the turn finished".into())
}

fn display_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    let single_line = text.replace('\n', " ");
    if single_line.chars().count() <= max_chars {
        return single_line;
    }
    let cut: String = single_line.chars().take(max_chars).collect();
    format!("{cut}...")
}
