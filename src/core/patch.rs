use serde::{Deserialize, Deserializer, Serialize};

use super::plan::Plan;
use super::state::ResearchStatus;

/// Shallow, field-level update merged by `UPDATE_FROM_BACKEND`.
///
/// `None` leaves a field untouched. Nullable state fields use a nested
/// option so a patch can also clear them (`Some(None)`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResearchStatePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ResearchStatus>,
    #[serde(deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub current_stage: Option<Option<String>>,
    #[serde(deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub current_plan: Option<Option<Plan>>,
    #[serde(deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub research_summary: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_results: Option<Vec<serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub research_loop_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_research_loops: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub need_plan: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_loading: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_step: Option<u32>,
    #[serde(deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub message: Option<Option<String>>,
    #[serde(deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub error: Option<Option<String>>,
}

impl ResearchStatePatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn status(status: ResearchStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }
}

/// Distinguishes an absent field (`None`) from an explicit `null`
/// (`Some(None)`).
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
