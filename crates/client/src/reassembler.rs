//! Turns an arbitrarily chunked event-stream body back into typed events.
//!
//! Network reads split frames anywhere, including inside a multi-byte UTF-8
//! character, so bytes are buffered until a complete `\n\n`-terminated frame
//! is available. Only complete frames are decoded.

use agentwire_core::event::{DATA_PREFIX, FRAME_DELIMITER, StreamEvent};
use tracing::trace;

#[derive(Debug, Default)]
pub struct StreamReassembler {
    buffer: Vec<u8>,
    /// Prefix of `buffer` already searched without finding a delimiter start.
    scanned: usize,
}

impl StreamReassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk and return every event it completed, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        if chunk.is_empty() {
            return Vec::new();
        }
        self.buffer.extend_from_slice(chunk);

        let delimiter = FRAME_DELIMITER.as_bytes();
        let mut events = Vec::new();
        let mut frame_start = 0;
        let mut search_from = self.scanned;
        while let Some(offset) = find(&self.buffer[search_from..], delimiter) {
            let end = search_from + offset;
            if let Some(event) = decode_frame(&self.buffer[frame_start..end]) {
                events.push(event);
            }
            frame_start = end + delimiter.len();
            search_from = frame_start;
        }
        self.buffer.drain(..frame_start);
        // The tail could still be the first half of a delimiter.
        self.scanned = self.buffer.len().saturating_sub(delimiter.len() - 1);
        events
    }

    /// Bytes held back waiting for the rest of a frame.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// End of stream: an incomplete trailing frame is discarded.
    pub fn finish(&mut self) {
        if !self.buffer.is_empty() {
            trace!(bytes = self.buffer.len(), "Discarding incomplete trailing frame");
            self.buffer.clear();
        }
        self.scanned = 0;
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Decode one frame without its delimiter. Malformed frames yield `None`.
fn decode_frame(frame: &[u8]) -> Option<StreamEvent> {
    let text = match std::str::from_utf8(frame) {
        Ok(text) => text,
        Err(e) => {
            trace!(error = %e, "Dropping frame with invalid UTF-8");
            return None;
        }
    };

    let data: Vec<&str> = text
        .lines()
        .filter(|line| !line.starts_with(':'))
        .filter_map(|line| line.strip_prefix(DATA_PREFIX))
        .map(|value| value.strip_prefix(' ').unwrap_or(value))
        .collect();
    if data.is_empty() {
        trace!(frame = %text, "Frame carries no data");
        return None;
    }

    let payload = data.join("\n");
    match serde_json::from_str(&payload) {
        Ok(event) => Some(event),
        Err(e) => {
            trace!(error = %e, data = %payload, "Dropping malformed frame");
            None
        }
    }
}
