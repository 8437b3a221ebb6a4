//! Pure state transitions.
//!
//! [`reduce`] is total: every action on every state yields a state. Rejected
//! writes (illegal status moves, out-of-range step indices, a second topic)
//! are logged and leave the affected field unchanged.

use super::actions::ResearchAction;
use crate::core::patch::ResearchStatePatch;
use crate::core::state::{ResearchState, ResearchStatus};

pub fn reduce(mut state: ResearchState, action: ResearchAction) -> ResearchState {
    match action {
        ResearchAction::SetTopic(topic) => {
            if !state.research_topic.is_empty()
                && !topic.is_empty()
                && state.research_topic != topic
            {
                tracing::warn!(
                    current = %state.research_topic,
                    rejected = %topic,
                    "research topic is fixed for the session; reset first"
                );
            } else {
                state.research_topic = topic;
            }
        }
        ResearchAction::SetLocale(locale) => state.locale = locale,
        ResearchAction::SetPlan(plan) => state.current_plan = Some(plan),
        ResearchAction::AddMessage(message) => state.messages.push(message),
        ResearchAction::UpdateMessageContent { id, content } => {
            match state.messages.iter_mut().find(|m| m.id == id) {
                Some(message) => message.content = content,
                None => tracing::debug!(id = %id, "no message to update"),
            }
        }
        ResearchAction::SetLoading(loading) => state.is_loading = loading,
        ResearchAction::SetCurrentStep(step) => state.current_step = step,
        ResearchAction::UpdateStepStatus {
            step_index,
            status,
            result,
        } => {
            let Some(plan) = state.current_plan.as_mut() else {
                return state;
            };
            let step_count = plan.steps.len();
            match plan.steps.get_mut(step_index) {
                Some(step) => {
                    step.status = status;
                    step.result = result;
                }
                None => tracing::warn!(
                    step_index,
                    step_count,
                    "ignoring status update for a step outside the plan"
                ),
            }
        }
        ResearchAction::AddResearchResult(result) => state.research_results.push(result),
        ResearchAction::SetResearchLoopCount(count) => state.research_loop_count = count,
        ResearchAction::ResetResearch => return ResearchState::default(),
        ResearchAction::SetPlanId(plan_id) => state.plan_id = Some(plan_id),
        ResearchAction::SetStatus(status) => apply_status(&mut state, status),
        ResearchAction::SetCurrentStage(stage) => state.current_stage = stage,
        ResearchAction::SetResearchSummary(summary) => state.research_summary = summary,
        ResearchAction::SetStepResults(results) => state.step_results = results,
        ResearchAction::SetNeedPlan(need_plan) => state.need_plan = need_plan,
        ResearchAction::UpdateFromBackend(patch) => apply_patch(&mut state, patch),
        ResearchAction::Unknown => {}
    }
    state
}

fn apply_status(state: &mut ResearchState, next: ResearchStatus) {
    if state.status.can_transition_to(next) {
        state.status = next;
    } else {
        tracing::warn!(
            from = %state.status,
            to = %next,
            "rejected backward status transition"
        );
    }
}

/// Shallow last-write-wins merge; only the status write is guarded.
fn apply_patch(state: &mut ResearchState, patch: ResearchStatePatch) {
    let ResearchStatePatch {
        locale,
        plan_id,
        status,
        current_stage,
        current_plan,
        research_summary,
        step_results,
        research_loop_count,
        max_research_loops,
        need_plan,
        is_loading,
        current_step,
        message,
        error,
    } = patch;

    if let Some(status) = status {
        apply_status(state, status);
    }
    if let Some(locale) = locale {
        state.locale = locale;
    }
    if let Some(plan_id) = plan_id {
        state.plan_id = plan_id;
    }
    if let Some(current_stage) = current_stage {
        state.current_stage = current_stage;
    }
    if let Some(current_plan) = current_plan {
        state.current_plan = current_plan;
    }
    if let Some(research_summary) = research_summary {
        state.research_summary = research_summary;
    }
    if let Some(step_results) = step_results {
        state.step_results = step_results;
    }
    if let Some(count) = research_loop_count {
        state.research_loop_count = count;
    }
    if let Some(max) = max_research_loops {
        state.max_research_loops = max;
    }
    if let Some(need_plan) = need_plan {
        state.need_plan = need_plan;
    }
    if let Some(is_loading) = is_loading {
        state.is_loading = is_loading;
    }
    if let Some(current_step) = current_step {
        state.current_step = current_step;
    }
    if let Some(message) = message {
        state.message = message;
    }
    if let Some(error) = error {
        state.error = error;
    }
}
