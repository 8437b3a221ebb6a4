use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::core::patch::ResearchStatePatch;
use crate::core::plan::{Plan, StepStatus};
use crate::core::state::{Message, ResearchResult, ResearchStatus};

/// Wire tags of every action the reducer understands.
pub const ACTION_TYPES: [&str; 18] = [
    "SET_TOPIC",
    "SET_LOCALE",
    "SET_PLAN",
    "ADD_MESSAGE",
    "UPDATE_MESSAGE_CONTENT",
    "SET_LOADING",
    "SET_CURRENT_STEP",
    "UPDATE_STEP_STATUS",
    "ADD_RESEARCH_RESULT",
    "SET_RESEARCH_LOOP_COUNT",
    "RESET_RESEARCH",
    "SET_PLAN_ID",
    "SET_STATUS",
    "SET_CURRENT_STAGE",
    "SET_RESEARCH_SUMMARY",
    "SET_STEP_RESULTS",
    "SET_NEED_PLAN",
    "UPDATE_FROM_BACKEND",
];

/// Typed reducer input.
///
/// Serialized as `{"type": "...", "payload": ...}` so UI layers can dispatch
/// plain JSON. Unrecognised `type`s deserialize to [`ResearchAction::Unknown`]
/// whatever their payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    remote = "Self",
    tag = "type",
    content = "payload",
    rename_all = "SCREAMING_SNAKE_CASE"
)]
pub enum ResearchAction {
    SetTopic(String),
    SetLocale(String),
    SetPlan(Plan),
    AddMessage(Message),
    UpdateMessageContent {
        id: String,
        content: String,
    },
    SetLoading(bool),
    SetCurrentStep(u32),
    UpdateStepStatus {
        #[serde(rename = "stepIndex")]
        step_index: usize,
        status: StepStatus,
        #[serde(default)]
        result: Option<String>,
    },
    AddResearchResult(ResearchResult),
    SetResearchLoopCount(u32),
    ResetResearch,
    SetPlanId(String),
    SetStatus(ResearchStatus),
    SetCurrentStage(Option<String>),
    SetResearchSummary(Option<String>),
    SetStepResults(Vec<Value>),
    SetNeedPlan(bool),
    UpdateFromBackend(ResearchStatePatch),
    #[serde(skip_deserializing)]
    Unknown,
}

impl Serialize for ResearchAction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        ResearchAction::serialize(self, serializer)
    }
}

impl<'de> Deserialize<'de> for ResearchAction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let Some(kind) = value.get("type").and_then(Value::as_str) else {
            return Err(D::Error::custom("action is missing its `type`"));
        };
        if !ACTION_TYPES.contains(&kind) {
            tracing::debug!(action = kind, "unrecognised action type");
            return Ok(Self::Unknown);
        }
        ResearchAction::deserialize(value).map_err(D::Error::custom)
    }
}

impl ResearchAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetTopic(_) => "SET_TOPIC",
            Self::SetLocale(_) => "SET_LOCALE",
            Self::SetPlan(_) => "SET_PLAN",
            Self::AddMessage(_) => "ADD_MESSAGE",
            Self::UpdateMessageContent { .. } => "UPDATE_MESSAGE_CONTENT",
            Self::SetLoading(_) => "SET_LOADING",
            Self::SetCurrentStep(_) => "SET_CURRENT_STEP",
            Self::UpdateStepStatus { .. } => "UPDATE_STEP_STATUS",
            Self::AddResearchResult(_) => "ADD_RESEARCH_RESULT",
            Self::SetResearchLoopCount(_) => "SET_RESEARCH_LOOP_COUNT",
            Self::ResetResearch => "RESET_RESEARCH",
            Self::SetPlanId(_) => "SET_PLAN_ID",
            Self::SetStatus(_) => "SET_STATUS",
            Self::SetCurrentStage(_) => "SET_CURRENT_STAGE",
            Self::SetResearchSummary(_) => "SET_RESEARCH_SUMMARY",
            Self::SetStepResults(_) => "SET_STEP_RESULTS",
            Self::SetNeedPlan(_) => "SET_NEED_PLAN",
            Self::UpdateFromBackend(_) => "UPDATE_FROM_BACKEND",
            Self::Unknown => "UNKNOWN",
        }
    }
}
