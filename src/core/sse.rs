//! SSE (Server-Sent Events) decoding for streamed completions
//!
//! Both providers stream `data: {json}` lines; Groq terminates with
//! `data: [DONE]`, Gemini simply closes the connection.

use serde::de::DeserializeOwned;

use crate::error::{ChatError, ChatResult};

/// SSE stream decoder with buffering
///
/// Handles partial chunks and extracts complete frames. The buffer is
/// bounded so a malformed stream cannot grow it without limit.
#[derive(Debug, Default)]
pub struct SseDecoder {
    // Raw bytes; lines are decoded only once complete so multi-byte
    // characters split across chunks survive
    buffer: Vec<u8>,
}

impl SseDecoder {
    /// 1MB
    const MAX_BUFFER_SIZE: usize = 1024 * 1024;

    pub fn new() -> Self {
        Self::default()
    }

    /// Push a chunk of bytes and extract complete frames
    ///
    /// Incomplete trailing data stays buffered for the next push.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend_from_slice(chunk);

        if self.buffer.len() > Self::MAX_BUFFER_SIZE {
            tracing::warn!(
                "SSE buffer exceeded {}KB limit, truncating",
                Self::MAX_BUFFER_SIZE / 1024
            );
            let keep_from = self.buffer.len() - (Self::MAX_BUFFER_SIZE / 2);
            self.buffer.drain(..keep_from);
        }

        let mut frames = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(frame) = SseFrame::from_line(&String::from_utf8_lossy(&line)) {
                frames.push(frame);
            }
        }

        frames
    }

    pub fn push_str(&mut self, s: &str) -> Vec<SseFrame> {
        self.push(s.as_bytes())
    }

    /// Flush a final unterminated line, if any
    pub fn finish(&mut self) -> Option<SseFrame> {
        let rest = std::mem::take(&mut self.buffer);
        SseFrame::from_line(&String::from_utf8_lossy(&rest))
    }

    pub fn has_remaining(&self) -> bool {
        !self.buffer.is_empty()
    }
}

/// A complete SSE data line
#[derive(Debug, Clone)]
pub struct SseFrame {
    /// Content without the `data:` prefix
    pub data: String,
}

impl SseFrame {
    fn from_line(line: &str) -> Option<Self> {
        line.trim().strip_prefix("data:").map(|data| SseFrame {
            data: data.trim_start().to_string(),
        })
    }

    pub fn is_done(&self) -> bool {
        self.data == "[DONE]"
    }

    pub fn parse<T: DeserializeOwned>(&self) -> ChatResult<T> {
        serde_json::from_str(&self.data).map_err(|e| {
            ChatError::Stream(format!("SSE JSON parse error: {}. Data: {}", e, self.preview()))
        })
    }

    /// First 200 chars, for error messages
    pub fn preview(&self) -> String {
        self.data.chars().take(200).collect()
    }
}
