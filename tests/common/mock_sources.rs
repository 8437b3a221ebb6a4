// tests/common/mock_sources.rs
//! In-memory stand-ins for the research backend.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use futures::channel::mpsc;
use futures::StreamExt;
use tokio::sync::oneshot;

use research_client_lib::api::types::StartRequest;
use research_client_lib::api::{ApiError, ByteStream, EventStreamSource, SnapshotSource};
use research_client_lib::core::BackendSnapshot;

pub fn status(status: &str) -> BackendSnapshot {
    BackendSnapshot {
        status: Some(status.to_string()),
        ..Default::default()
    }
}

/// Replays queued status replies, then `fallback` forever.
pub struct ScriptedSnapshotSource {
    replies: Mutex<VecDeque<Result<BackendSnapshot, ApiError>>>,
    fallback: BackendSnapshot,
    gate: Mutex<Option<oneshot::Receiver<()>>>,
    calls: AtomicUsize,
}

impl ScriptedSnapshotSource {
    pub fn new(replies: Vec<Result<BackendSnapshot, ApiError>>, fallback: BackendSnapshot) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            fallback,
            gate: Mutex::new(None),
            calls: AtomicUsize::new(0),
        })
    }

    /// Make the next fetch block until the returned sender fires or is
    /// dropped.
    pub fn hold_next(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.gate.lock().unwrap() = Some(rx);
        tx
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SnapshotSource for ScriptedSnapshotSource {
    async fn fetch_status(&self, _plan_id: &str) -> Result<BackendSnapshot, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(self.fallback.clone()))
    }
}

/// Event streams fed by the test through unbounded channels, one per topic.
/// Opening a topic with no stream registered fails with 503.
#[derive(Default)]
pub struct ChannelStreamSource {
    receivers: Mutex<HashMap<String, mpsc::UnboundedReceiver<Result<Bytes, ApiError>>>>,
    requests: Mutex<Vec<StartRequest>>,
}

impl ChannelStreamSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_stream(&self, topic: &str) -> mpsc::UnboundedSender<Result<Bytes, ApiError>> {
        let (tx, rx) = mpsc::unbounded();
        self.receivers.lock().unwrap().insert(topic.to_string(), rx);
        tx
    }

    pub fn requests(&self) -> Vec<StartRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventStreamSource for ChannelStreamSource {
    async fn open_event_stream(&self, request: &StartRequest) -> Result<ByteStream, ApiError> {
        self.requests.lock().unwrap().push(request.clone());
        match self.receivers.lock().unwrap().remove(&request.topic) {
            Some(rx) => Ok(rx.boxed()),
            None => Err(ApiError::Http {
                status: 503,
                message: "stream unavailable".to_string(),
            }),
        }
    }
}
