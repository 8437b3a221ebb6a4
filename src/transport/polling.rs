//! Polling adapter: periodic status snapshots for a known plan id.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::{EventSink, ResearchTransport, TransportHandle};
use crate::api::SnapshotSource;
use crate::stream::events::ResearchEvent;

pub const KIND: &str = "polling";

/// Shortest accepted interval; tokio intervals cannot tick at zero.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Pull-based adapter over `GET /api/research/status/{plan_id}`.
pub struct PollingTransport {
    source: Arc<dyn SnapshotSource>,
    interval: Duration,
}

impl PollingTransport {
    /// An interval below [`MIN_INTERVAL`] is raised to it.
    pub fn new(source: Arc<dyn SnapshotSource>, interval: Duration) -> Self {
        if interval < MIN_INTERVAL {
            tracing::warn!(?interval, "poll interval too short, using {MIN_INTERVAL:?}");
        }
        Self {
            source,
            interval: interval.max(MIN_INTERVAL),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl ResearchTransport for PollingTransport {
    fn kind(&self) -> &'static str {
        KIND
    }

    fn start(&self, plan_id: &str, sink: EventSink) -> TransportHandle {
        let token = CancellationToken::new();
        let task = tokio::spawn(run_poll(
            self.source.clone(),
            plan_id.to_string(),
            self.interval,
            sink,
            token.clone(),
        ));
        TransportHandle::new(KIND, plan_id, token, task)
    }
}

async fn run_poll(
    source: Arc<dyn SnapshotSource>,
    plan_id: String,
    period: Duration,
    sink: EventSink,
    token: CancellationToken,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => return,
            _ = ticker.tick() => {}
        }

        let fetched = tokio::select! {
            biased;
            _ = token.cancelled() => {
                tracing::debug!(plan_id = %plan_id, "discarding in-flight status fetch");
                return;
            }
            result = source.fetch_status(&plan_id) => result,
        };

        match fetched {
            Ok(snapshot) => {
                let terminal = snapshot.is_terminal();
                sink(ResearchEvent::Snapshot(snapshot));
                if terminal {
                    tracing::info!(plan_id = %plan_id, "terminal status observed, polling stopped");
                    return;
                }
            }
            Err(e) => {
                tracing::warn!(plan_id = %plan_id, "status poll failed: {e}");
            }
        }
    }
}
