//! Incremental parser for OpenAI-style SSE streams.
//!
//! Network chunks do not respect line boundaries (or UTF-8 boundaries), so
//! bytes are buffered until a full line is available. Only `data:` lines are
//! interpreted; comments, `event:` lines and JSON that fails to parse are
//! skipped.

use serde_json::Value;

/// Something worth reporting from a parsed line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// `choices[0].delta.content` of a chunk.
    Delta(String),
    /// `data: [DONE]`.
    Done,
}

#[derive(Debug, Default)]
pub struct SseDeltaParser {
    buffer: Vec<u8>,
    content: String,
    done: bool,
}

impl SseDeltaParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of the raw stream; returns events for every complete line.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(line_end) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=line_end).collect();
            if let Some(event) = self.parse_line(&line) {
                events.push(event);
            }
        }
        events
    }

    /// Flush a trailing line that was not newline-terminated.
    pub fn finish(&mut self) -> Vec<SseEvent> {
        if self.buffer.is_empty() {
            return Vec::new();
        }
        let line = std::mem::take(&mut self.buffer);
        self.parse_line(&line).into_iter().collect()
    }

    /// Reply text accumulated so far.
    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn into_content(self) -> String {
        self.content
    }

    /// Whether `[DONE]` has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    fn parse_line(&mut self, raw: &[u8]) -> Option<SseEvent> {
        let line = String::from_utf8_lossy(raw);
        let line = line.trim();

        if line.is_empty() || line.starts_with(':') {
            return None;
        }

        let data = line.strip_prefix("data:")?;
        let data = data.strip_prefix(' ').unwrap_or(data);

        if data.trim() == "[DONE]" {
            self.done = true;
            return Some(SseEvent::Done);
        }

        let parsed: Value = serde_json::from_str(data).ok()?;
        let delta = parsed["choices"][0]["delta"]["content"].as_str()?;
        if delta.is_empty() {
            return None;
        }
        self.content.push_str(delta);
        Some(SseEvent::Delta(delta.to_string()))
    }
}
