//! Incremental `text/event-stream` decoder.
//!
//! Chunks may split frames, lines or multi-byte characters anywhere. The
//! decoder buffers raw bytes, decodes one completed line at a time and only
//! yields a frame once its terminating blank line has been seen.

use serde_json::Value;

const DEFAULT_EVENT: &str = "message";

/// One dispatched SSE frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    /// Event name, `"message"` when the frame has no `event:` line.
    pub event: String,
    /// `data:` lines joined with `\n`.
    pub data: String,
    pub id: Option<String>,
    pub retry: Option<u64>,
}

impl SseFrame {
    pub fn payload(&self) -> Value {
        decode_payload(&self.data)
    }
}

/// JSON when the text parses, otherwise the raw text as a JSON string.
pub fn decode_payload(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

#[derive(Debug, Default)]
struct PendingFrame {
    event: Option<String>,
    data: Option<String>,
    id: Option<String>,
    retry: Option<u64>,
    seen_field: bool,
}

impl PendingFrame {
    fn take(&mut self) -> Option<SseFrame> {
        let pending = std::mem::take(self);
        if !pending.seen_field {
            return None;
        }
        Some(SseFrame {
            event: pending
                .event
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| DEFAULT_EVENT.to_string()),
            data: pending.data.unwrap_or_default(),
            id: pending.id,
            retry: pending.retry,
        })
    }
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    pending: PendingFrame,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk and return every frame it completed, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        let mut consumed = 0;
        while let Some(offset) = self.buffer[consumed..].iter().position(|b| *b == b'\n') {
            let end = consumed + offset;
            let mut line = &self.buffer[consumed..end];
            if line.last() == Some(&b'\r') {
                line = &line[..line.len() - 1];
            }
            let line = String::from_utf8_lossy(line).into_owned();
            consumed = end + 1;

            if let Some(frame) = self.process_line(&line) {
                frames.push(frame);
            }
        }
        self.buffer.drain(..consumed);
        frames
    }

    /// Bytes buffered without a line terminator yet.
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    /// Close the stream. An unterminated trailing frame is dropped.
    pub fn finish(&mut self) {
        if !self.buffer.is_empty() || self.pending.seen_field {
            tracing::debug!(
                bytes = self.buffer.len(),
                "discarding unterminated SSE data at end of stream"
            );
        }
        self.buffer.clear();
        self.pending = PendingFrame::default();
    }

    fn process_line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            return self.pending.take();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.pending.event = Some(value.to_string()),
            "data" => match self.pending.data.as_mut() {
                Some(data) => {
                    data.push('\n');
                    data.push_str(value);
                }
                None => self.pending.data = Some(value.to_string()),
            },
            "id" => self.pending.id = Some(value.to_string()),
            "retry" => match value.parse::<u64>() {
                Ok(ms) => self.pending.retry = Some(ms),
                Err(_) => tracing::trace!("ignoring invalid SSE retry value: {value}"),
            },
            other => {
                tracing::trace!("ignoring unknown SSE field: {other}");
                return None;
            }
        }
        self.pending.seen_field = true;
        None
    }
}
