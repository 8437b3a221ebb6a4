//! Event sources for a research session.
//!
//! Each adapter runs on its own tokio task and reports through an
//! [`EventSink`]. The returned [`TransportHandle`] owns the task; cancelling
//! it stops the stream or timer before the next event is forwarded.

pub mod polling;
pub mod streaming;

use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::stream::events::ResearchEvent;

pub use polling::PollingTransport;
pub use streaming::StreamingTransport;

/// Receives events in arrival order from a single adapter task.
pub type EventSink = Arc<dyn Fn(ResearchEvent) + Send + Sync>;

pub trait ResearchTransport: Send + Sync {
    fn kind(&self) -> &'static str;

    /// Spawn the adapter for `key` (topic for streaming, plan id for
    /// polling). Must be called inside a tokio runtime.
    fn start(&self, key: &str, sink: EventSink) -> TransportHandle;
}

pub struct TransportHandle {
    kind: &'static str,
    key: String,
    token: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl TransportHandle {
    pub fn new(
        kind: &'static str,
        key: impl Into<String>,
        token: CancellationToken,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            kind,
            key: key.into(),
            token,
            task: Mutex::new(Some(task)),
        }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Idempotent; also safe after the adapter finished on its own.
    pub fn cancel(&self) {
        if !self.token.is_cancelled() {
            tracing::debug!(kind = self.kind, key = %self.key, "cancelling transport");
            self.token.cancel();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The adapter task has exited.
    pub fn is_finished(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or(true, JoinHandle::is_finished)
    }

    /// Wait for the adapter task to exit. After this returns no timer or
    /// open stream owned by the adapter remains.
    pub async fn finished(&self) {
        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                if e.is_panic() {
                    tracing::error!(kind = self.kind, key = %self.key, "transport task panicked");
                }
            }
        }
    }
}

impl std::fmt::Debug for TransportHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportHandle")
            .field("kind", &self.kind)
            .field("key", &self.key)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
