// tests/common/mock_transport.rs
//! Transport wrapper that counts how often a session opens it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use research_client_lib::transport::{EventSink, ResearchTransport, TransportHandle};

pub struct CountingTransport {
    inner: Arc<dyn ResearchTransport>,
    starts: AtomicUsize,
}

impl CountingTransport {
    pub fn new(inner: impl ResearchTransport + 'static) -> Arc<Self> {
        Arc::new(Self {
            inner: Arc::new(inner),
            starts: AtomicUsize::new(0),
        })
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }
}

impl ResearchTransport for CountingTransport {
    fn kind(&self) -> &'static str {
        self.inner.kind()
    }

    fn start(&self, key: &str, sink: EventSink) -> TransportHandle {
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.inner.start(key, sink)
    }
}

/// Yield to the runtime until `condition` holds. Panics after five seconds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let waited = tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "condition not reached within 5s");
}
