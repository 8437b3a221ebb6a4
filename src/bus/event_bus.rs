use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::core::state::ResearchState;

const BUS_CAPACITY: usize = 256;

/// One accepted store mutation, in dispatch order.
#[derive(Debug, Clone, Serialize)]
pub struct StateChange {
    pub seq: i64,
    pub action: String,
    pub state: ResearchState,
    pub created_at: String,
}

/// Broadcast feed of accepted mutations for async consumers that need the
/// action name and ordering, not just the latest state.
pub struct ChangeBus {
    tx: broadcast::Sender<StateChange>,
    seq: AtomicI64,
}

impl Default for ChangeBus {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        Self {
            tx,
            seq: AtomicI64::new(0),
        }
    }

    /// Record a mutation. The sequence number advances even with no
    /// receivers so late subscribers can detect gaps.
    pub fn publish(&self, action: &str, state: &ResearchState) -> i64 {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        if self.tx.receiver_count() == 0 {
            return seq;
        }
        let change = StateChange {
            seq,
            action: action.to_string(),
            state: state.clone(),
            created_at: Utc::now().to_rfc3339(),
        };
        if let Err(e) = self.tx.send(change) {
            tracing::trace!("state change dropped: {e}");
        }
        seq
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.tx.subscribe()
    }
}
