//! Incremental decoder for the chat endpoint's streamed body.
//!
//! The body is plain text where every complete line starting with `data: `
//! carries one JSON object. Bytes arrive in arbitrary slices, so the decoder
//! keeps the trailing partial line until its newline shows up.

use serde_json::Value;

use crate::error::{Error, Result};
use crate::state::StreamChunk;

/// Marker that prefixes every payload line.
pub const DATA_PREFIX: &str = "data: ";

/// Line-buffering decoder with a consumed-offset cursor.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    pending: Vec<u8>,
    consumed: usize,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a newly arrived slice and return the chunks of every line it completed.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Result<StreamChunk>> {
        self.consumed += bytes.len();
        self.pending.extend_from_slice(bytes);
        self.drain_lines()
    }

    /// Feed the entire response received so far; only the part past the
    /// consumed offset is new.
    pub fn feed_cumulative(&mut self, response_so_far: &str) -> Vec<Result<StreamChunk>> {
        let tail = response_so_far
            .as_bytes()
            .get(self.consumed..)
            .unwrap_or_default();
        self.feed(tail)
    }

    /// Total bytes handed to the decoder.
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    /// End of stream. Returns the incomplete last line, which is never parsed.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(String::from_utf8_lossy(&rest).into_owned())
    }

    fn drain_lines(&mut self) -> Vec<Result<StreamChunk>> {
        let mut chunks = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line[..pos]);
            if let Some(parsed) = parse_line(&line) {
                chunks.push(parsed);
            }
        }
        chunks
    }
}

/// Parse one complete line. Lines without the marker yield `None`.
pub fn parse_line(line: &str) -> Option<Result<StreamChunk>> {
    let payload = line.strip_prefix(DATA_PREFIX)?;
    Some(parse_payload(payload))
}

fn parse_payload(payload: &str) -> Result<StreamChunk> {
    let malformed = |source: serde_json::Error| Error::MalformedChunk {
        payload: payload.to_string(),
        source,
    };

    match serde_json::from_str(payload).map_err(malformed)? {
        Value::Object(fields) => Ok(StreamChunk::from_fields(fields)),
        _ => Err(malformed(<serde_json::Error as serde::de::Error>::custom(
            "expected a JSON object",
        ))),
    }
}
