//! Full, non-incremental session view returned by the backend.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::patch::ResearchStatePatch;
use super::plan::Plan;
use super::state::ResearchStatus;

/// Snapshot body of `start`, `confirm-plan` and `status`.
///
/// Fields are kept loose (`status` as a string, `current_plan` as raw JSON)
/// so one malformed field never rejects the whole snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSnapshot {
    pub messages: String,
    pub need_plan: bool,
    pub plan_id: Option<String>,
    pub status: Option<String>,
    pub current_stage: Option<String>,
    pub current_plan: Option<serde_json::Value>,
    pub research_summary: Option<String>,
    pub step_results: Vec<serde_json::Value>,
    pub error: Option<String>,
    pub message: Option<String>,
}

impl BackendSnapshot {
    /// Parsed status, if present and recognised.
    pub fn research_status(&self) -> Option<ResearchStatus> {
        let raw = self.status.as_deref()?;
        match ResearchStatus::from_str(raw) {
            Ok(status) => Some(status),
            Err(e) => {
                tracing::warn!("ignoring snapshot status: {e}");
                None
            }
        }
    }

    pub fn plan(&self) -> Option<Plan> {
        let raw = self.current_plan.as_ref()?;
        if raw.is_null() {
            return None;
        }
        match serde_json::from_value::<Plan>(raw.clone()) {
            Ok(plan) => Some(plan),
            Err(e) => {
                tracing::warn!("ignoring malformed current_plan in snapshot: {e}");
                None
            }
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.research_status().is_some_and(|s| s.is_terminal())
    }

    /// Convert into a state patch. Only fields the snapshot actually carries
    /// are written, so a sparse status poll cannot wipe a plan or summary the
    /// client already holds.
    pub fn into_patch(self) -> ResearchStatePatch {
        let status = self.research_status();
        let plan = self.plan();
        let message = self
            .message
            .filter(|m| !m.trim().is_empty())
            .or_else(|| Some(self.messages).filter(|m| !m.trim().is_empty()));

        ResearchStatePatch {
            plan_id: self.plan_id.map(Some),
            status,
            current_stage: self.current_stage.map(Some),
            current_plan: plan.map(Some),
            research_summary: self.research_summary.map(Some),
            step_results: if self.step_results.is_empty() {
                None
            } else {
                Some(self.step_results)
            },
            need_plan: Some(self.need_plan),
            message: message.map(Some),
            error: self.error.map(Some),
            ..Default::default()
        }
    }
}
