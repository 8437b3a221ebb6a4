//! Typed research events.
//!
//! Both transports produce [`ResearchEvent`]s: the streaming transport maps
//! decoded frames through [`ResearchEvent::from_frame`], the polling transport
//! wraps each fetched body in [`ResearchEvent::Snapshot`].

use serde::Deserialize;
use serde_json::Value;

use super::decoder::SseFrame;
use crate::core::plan::Plan;
use crate::core::snapshot::BackendSnapshot;

pub const EVENT_STARTED: &str = "started";
pub const EVENT_CHUNK: &str = "chunk";
pub const EVENT_COORDINATE: &str = "coordinate";
pub const EVENT_PLAN: &str = "plan";
pub const EVENT_INTERRUPT: &str = "interrupt";
pub const EVENT_RESEARCH: &str = "research";
pub const EVENT_DONE: &str = "done";
pub const EVENT_ERROR: &str = "error";

#[derive(Debug, Clone, PartialEq)]
pub enum ResearchEvent {
    Started {
        plan_id: String,
    },
    Chunk {
        plan_id: Option<String>,
        delta: String,
    },
    Coordinate {
        message: String,
        simple: bool,
    },
    Plan {
        plan: Plan,
    },
    Interrupt,
    Research {
        research_summary: Option<String>,
        step_results: Vec<Value>,
    },
    Done,
    Error {
        error: String,
    },
    /// Full snapshot from a status poll.
    Snapshot(BackendSnapshot),
    /// Unrecognised event name, or a payload that did not fit its event.
    Unknown {
        name: String,
        payload: Value,
    },
}

#[derive(Deserialize)]
struct StartedPayload {
    plan_id: String,
}

#[derive(Deserialize)]
struct ChunkPayload {
    #[serde(default)]
    plan_id: Option<String>,
    delta: String,
}

#[derive(Deserialize)]
struct CoordinatePayload {
    #[serde(default)]
    message: String,
    #[serde(default)]
    simple: bool,
}

#[derive(Deserialize)]
struct PlanPayload {
    current_plan: Plan,
}

#[derive(Deserialize)]
struct ResearchPayload {
    #[serde(default)]
    research_summary: Option<String>,
    #[serde(default)]
    step_results: Vec<Value>,
}

#[derive(Deserialize)]
struct ErrorPayload {
    error: String,
}

impl ResearchEvent {
    pub fn from_frame(frame: &SseFrame) -> Self {
        Self::from_parts(&frame.event, frame.payload())
    }

    pub fn from_parts(name: &str, payload: Value) -> Self {
        let parsed = match name {
            EVENT_STARTED => serde_json::from_value::<StartedPayload>(payload.clone())
                .ok()
                .map(|p| Self::Started { plan_id: p.plan_id }),
            EVENT_CHUNK => match &payload {
                Value::String(delta) => Some(Self::Chunk {
                    plan_id: None,
                    delta: delta.clone(),
                }),
                _ => serde_json::from_value::<ChunkPayload>(payload.clone())
                    .ok()
                    .map(|p| Self::Chunk {
                        plan_id: p.plan_id,
                        delta: p.delta,
                    }),
            },
            EVENT_COORDINATE => serde_json::from_value::<CoordinatePayload>(payload.clone())
                .ok()
                .map(|p| Self::Coordinate {
                    message: p.message,
                    simple: p.simple,
                }),
            EVENT_PLAN => serde_json::from_value::<PlanPayload>(payload.clone())
                .ok()
                .map(|p| Self::Plan {
                    plan: p.current_plan,
                }),
            EVENT_INTERRUPT => Some(Self::Interrupt),
            EVENT_RESEARCH => serde_json::from_value::<ResearchPayload>(payload.clone())
                .ok()
                .map(|p| Self::Research {
                    research_summary: p.research_summary,
                    step_results: p.step_results,
                }),
            EVENT_DONE => Some(Self::Done),
            EVENT_ERROR => match &payload {
                Value::String(error) => Some(Self::Error {
                    error: error.clone(),
                }),
                _ => Some(Self::Error {
                    error: serde_json::from_value::<ErrorPayload>(payload.clone())
                        .map(|p| p.error)
                        .unwrap_or_else(|_| "unknown stream error".to_string()),
                }),
            },
            _ => None,
        };

        parsed.unwrap_or_else(|| {
            tracing::debug!(event = name, "unrecognised research event");
            Self::Unknown {
                name: name.to_string(),
                payload,
            }
        })
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Started { .. } => EVENT_STARTED,
            Self::Chunk { .. } => EVENT_CHUNK,
            Self::Coordinate { .. } => EVENT_COORDINATE,
            Self::Plan { .. } => EVENT_PLAN,
            Self::Interrupt => EVENT_INTERRUPT,
            Self::Research { .. } => EVENT_RESEARCH,
            Self::Done => EVENT_DONE,
            Self::Error { .. } => EVENT_ERROR,
            Self::Snapshot(_) => "snapshot",
            Self::Unknown { name, .. } => name,
        }
    }
}
