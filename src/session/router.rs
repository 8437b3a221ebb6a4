//! Maps typed events to reducer actions.

use uuid::Uuid;

use crate::core::patch::ResearchStatePatch;
use crate::core::plan::Plan;
use crate::core::state::{Message, ResearchState, ResearchStatus, Role};
use crate::store::actions::ResearchAction;
use crate::stream::events::ResearchEvent;

pub const STAGE_COORDINATE: &str = "coordinate";
pub const STAGE_GENERATE_PLAN: &str = "generate_plan";
pub const STAGE_HUMAN_FEEDBACK: &str = "human_feedback";
pub const STAGE_RESEARCH: &str = "research_node";

/// Tracks the assistant message being built from consecutive `chunk`
/// events. The reducer replaces content verbatim, so the full text is kept
/// here.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ChunkAccumulator {
    message_id: Option<String>,
    text: String,
}

impl ChunkAccumulator {
    pub fn message_id(&self) -> Option<&str> {
        self.message_id.as_deref()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn reset(&mut self) {
        self.message_id = None;
        self.text.clear();
    }

    fn push(&mut self, delta: &str) -> ResearchAction {
        self.text.push_str(delta);
        match &self.message_id {
            Some(id) => ResearchAction::UpdateMessageContent {
                id: id.clone(),
                content: self.text.clone(),
            },
            None => {
                let id = Uuid::new_v4().to_string();
                self.message_id = Some(id.clone());
                ResearchAction::AddMessage(Message::new(id, Role::Assistant, self.text.clone()))
            }
        }
    }
}

/// Actions for one event, given the state it will be applied to.
///
/// Any event other than `chunk` closes the message being accumulated.
pub fn route_event(
    event: ResearchEvent,
    chunks: &mut ChunkAccumulator,
    state: &ResearchState,
) -> Vec<ResearchAction> {
    if let ResearchEvent::Chunk { delta, .. } = &event {
        if delta.is_empty() {
            return Vec::new();
        }
        return vec![chunks.push(delta)];
    }

    let streamed_message = chunks.message_id.take();
    chunks.text.clear();

    match event {
        ResearchEvent::Chunk { .. } => Vec::new(),
        ResearchEvent::Started { plan_id } => vec![ResearchAction::SetPlanId(plan_id)],
        ResearchEvent::Coordinate { message, simple } if simple => {
            let mut actions = vec![ResearchAction::UpdateFromBackend(ResearchStatePatch {
                status: Some(ResearchStatus::Completed),
                current_stage: Some(Some(STAGE_COORDINATE.to_string())),
                need_plan: Some(false),
                message: Some(Some(message.clone())),
                ..Default::default()
            })];
            if !message.is_empty() {
                actions.push(match streamed_message {
                    Some(id) => ResearchAction::UpdateMessageContent {
                        id,
                        content: message,
                    },
                    None => ResearchAction::AddMessage(Message::new(
                        Uuid::new_v4().to_string(),
                        Role::Assistant,
                        message,
                    )),
                });
            }
            actions
        }
        ResearchEvent::Coordinate { message, .. } => {
            vec![ResearchAction::UpdateFromBackend(ResearchStatePatch {
                status: Some(ResearchStatus::Coordinate),
                current_stage: Some(Some(STAGE_COORDINATE.to_string())),
                message: (!message.is_empty()).then_some(Some(message)),
                ..Default::default()
            })]
        }
        ResearchEvent::Plan { plan } => {
            let plan = Plan::reconcile(state.current_plan.as_ref(), plan);
            vec![
                ResearchAction::SetPlan(plan),
                ResearchAction::UpdateFromBackend(ResearchStatePatch {
                    status: Some(ResearchStatus::PlanGenerated),
                    current_stage: Some(Some(STAGE_GENERATE_PLAN.to_string())),
                    need_plan: Some(true),
                    ..Default::default()
                }),
            ]
        }
        ResearchEvent::Interrupt => vec![ResearchAction::UpdateFromBackend(ResearchStatePatch {
            status: Some(ResearchStatus::AwaitingConfirmation),
            current_stage: Some(Some(STAGE_HUMAN_FEEDBACK.to_string())),
            ..Default::default()
        })],
        ResearchEvent::Research {
            research_summary,
            step_results,
        } => vec![ResearchAction::UpdateFromBackend(ResearchStatePatch {
            status: Some(ResearchStatus::Completed),
            current_stage: Some(Some(STAGE_RESEARCH.to_string())),
            research_summary: research_summary.map(Some),
            step_results: Some(step_results),
            ..Default::default()
        })],
        ResearchEvent::Snapshot(snapshot) => {
            let incoming_plan = snapshot.plan();
            let mut patch = snapshot.into_patch();
            if let Some(plan) = incoming_plan {
                patch.current_plan = Some(Some(Plan::reconcile(state.current_plan.as_ref(), plan)));
            }
            vec![ResearchAction::UpdateFromBackend(patch)]
        }
        ResearchEvent::Error { error } => vec![ResearchAction::UpdateFromBackend(ResearchStatePatch {
            error: Some(Some(error)),
            is_loading: Some(false),
            ..Default::default()
        })],
        ResearchEvent::Done => vec![ResearchAction::SetLoading(false)],
        ResearchEvent::Unknown { name, .. } => {
            tracing::debug!(event = %name, "no route for event");
            Vec::new()
        }
    }
}
