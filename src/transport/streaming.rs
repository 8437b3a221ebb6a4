//! Streaming adapter: one SSE request per research run.

use std::sync::Arc;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use super::{EventSink, ResearchTransport, TransportHandle};
use crate::api::types::StartRequest;
use crate::api::EventStreamSource;
use crate::stream::decoder::SseDecoder;
use crate::stream::events::ResearchEvent;

pub const KIND: &str = "streaming";

const ABORTED: &str = "research stream aborted";

/// Push-based adapter over `POST /api/research/start/stream`.
pub struct StreamingTransport {
    source: Arc<dyn EventStreamSource>,
    locale: String,
}

impl StreamingTransport {
    pub fn new(source: Arc<dyn EventStreamSource>, locale: impl Into<String>) -> Self {
        Self {
            source,
            locale: locale.into(),
        }
    }
}

impl ResearchTransport for StreamingTransport {
    fn kind(&self) -> &'static str {
        KIND
    }

    fn start(&self, topic: &str, sink: EventSink) -> TransportHandle {
        let token = CancellationToken::new();
        let request = StartRequest {
            topic: topic.to_string(),
            locale: self.locale.clone(),
        };
        let task = tokio::spawn(run_stream(
            self.source.clone(),
            request,
            sink,
            token.clone(),
        ));
        TransportHandle::new(KIND, topic, token, task)
    }
}

/// Failure and abort both end with exactly one `error` then one `done`.
fn emit_failure(sink: &EventSink, error: String) {
    sink(ResearchEvent::Error { error });
    sink(ResearchEvent::Done);
}

async fn run_stream(
    source: Arc<dyn EventStreamSource>,
    request: StartRequest,
    sink: EventSink,
    token: CancellationToken,
) {
    let opened = tokio::select! {
        biased;
        _ = token.cancelled() => None,
        result = source.open_event_stream(&request) => Some(result),
    };

    let mut stream = match opened {
        None => return emit_failure(&sink, ABORTED.to_string()),
        Some(Err(e)) => {
            tracing::warn!(topic = %request.topic, "failed to open research stream: {e}");
            return emit_failure(&sink, e.to_string());
        }
        Some(Ok(stream)) => stream,
    };

    let mut decoder = SseDecoder::new();
    loop {
        let next = tokio::select! {
            biased;
            _ = token.cancelled() => return emit_failure(&sink, ABORTED.to_string()),
            chunk = stream.next() => chunk,
        };

        match next {
            Some(Ok(bytes)) => {
                for frame in decoder.push(&bytes) {
                    if token.is_cancelled() {
                        return emit_failure(&sink, ABORTED.to_string());
                    }
                    let event = ResearchEvent::from_frame(&frame);
                    tracing::debug!(event = event.name(), "research stream event");
                    let done = matches!(event, ResearchEvent::Done);
                    sink(event);
                    if done {
                        return;
                    }
                }
            }
            Some(Err(e)) => {
                tracing::warn!(topic = %request.topic, "research stream read failed: {e}");
                return emit_failure(&sink, e.to_string());
            }
            None => {
                decoder.finish();
                tracing::debug!(topic = %request.topic, "research stream closed without done");
                sink(ResearchEvent::Done);
                return;
            }
        }
    }
}
