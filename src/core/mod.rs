//! Session data model shared by the store, transports and controller.

pub mod patch;
pub mod plan;
pub mod snapshot;
pub mod state;

pub use patch::ResearchStatePatch;
pub use plan::{Plan, PlanStep, StepStatus};
pub use snapshot::BackendSnapshot;
pub use state::{Message, ResearchResult, ResearchState, ResearchStatus, Role, Source};
