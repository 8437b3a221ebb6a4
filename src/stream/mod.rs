//! Event ingestion: raw SSE bytes to typed [`ResearchEvent`]s.

pub mod decoder;
pub mod events;

pub use decoder::{decode_payload, SseDecoder, SseFrame};
pub use events::ResearchEvent;
