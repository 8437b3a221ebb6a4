//! Research backend HTTP API.
//!
//! Transports depend on the two source traits rather than on
//! [`ResearchApi`] directly, so tests can substitute in-memory sources.

pub mod client;
pub mod error;
pub mod types;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

use crate::core::snapshot::BackendSnapshot;

pub use client::ResearchApi;
pub use error::ApiError;
pub use types::{ProgressReport, Report, StartRequest, UserConfirm};

pub type ByteStream = BoxStream<'static, Result<Bytes, ApiError>>;

/// Opens the long-lived SSE request for a topic.
#[async_trait]
pub trait EventStreamSource: Send + Sync {
    async fn open_event_stream(&self, request: &StartRequest) -> Result<ByteStream, ApiError>;
}

/// Fetches one full session snapshot by plan id.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn fetch_status(&self, plan_id: &str) -> Result<BackendSnapshot, ApiError>;
}
