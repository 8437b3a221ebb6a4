//! Canonical client-side view of one research session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::plan::Plan;

pub const DEFAULT_LOCALE: &str = "zh-CN";
pub const DEFAULT_MAX_RESEARCH_LOOPS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResearchStatus {
    #[default]
    Pending,
    Coordinate,
    PlanGenerated,
    AwaitingConfirmation,
    ResearchCompleted,
    Completed,
}

impl ResearchStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Coordinate => "coordinate",
            Self::PlanGenerated => "plan_generated",
            Self::AwaitingConfirmation => "awaiting_confirmation",
            Self::ResearchCompleted => "research_completed",
            Self::Completed => "completed",
        }
    }

    const fn rank(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Coordinate => 1,
            Self::PlanGenerated => 2,
            Self::AwaitingConfirmation => 3,
            Self::ResearchCompleted => 4,
            Self::Completed => 5,
        }
    }

    /// Statuses after which no further transport activity is expected.
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::AwaitingConfirmation | Self::PlanGenerated
        )
    }

    /// Single legality check for status writes.
    ///
    /// Forward moves and same-status writes are legal. The only legal
    /// backward move is `awaiting_confirmation -> plan_generated`, which the
    /// backend reports after the user asks for the plan to be modified.
    /// Reset does not go through this check.
    pub fn can_transition_to(&self, next: ResearchStatus) -> bool {
        if next.rank() >= self.rank() {
            return true;
        }
        matches!(
            (self, next),
            (Self::AwaitingConfirmation, Self::PlanGenerated)
        )
    }
}

impl std::fmt::Display for ResearchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ResearchStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "pending" => Ok(Self::Pending),
            "coordinate" => Ok(Self::Coordinate),
            "plan_generated" => Ok(Self::PlanGenerated),
            "awaiting_confirmation" => Ok(Self::AwaitingConfirmation),
            "research_completed" => Ok(Self::ResearchCompleted),
            "completed" => Ok(Self::Completed),
            other => Err(format!("unknown research status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(id: impl Into<String>, role: Role, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub snippet: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchResult {
    pub step: u32,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub sources: Vec<Source>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchState {
    pub research_topic: String,
    pub locale: String,
    pub plan_id: Option<String>,
    pub status: ResearchStatus,
    pub current_stage: Option<String>,
    pub current_plan: Option<Plan>,
    pub messages: Vec<Message>,
    pub research_results: Vec<ResearchResult>,
    pub research_summary: Option<String>,
    pub step_results: Vec<serde_json::Value>,
    pub research_loop_count: u32,
    pub max_research_loops: u32,
    pub need_plan: bool,
    pub is_loading: bool,
    pub current_step: u32,
    /// Latest status text reported by the backend.
    pub message: Option<String>,
    /// Latest surfaced transport or backend error.
    pub error: Option<String>,
}

impl Default for ResearchState {
    fn default() -> Self {
        Self {
            research_topic: String::new(),
            locale: DEFAULT_LOCALE.to_string(),
            plan_id: None,
            status: ResearchStatus::Pending,
            current_stage: None,
            current_plan: None,
            messages: Vec::new(),
            research_results: Vec::new(),
            research_summary: None,
            step_results: Vec::new(),
            research_loop_count: 0,
            max_research_loops: DEFAULT_MAX_RESEARCH_LOOPS,
            need_plan: false,
            is_loading: false,
            current_step: 0,
            message: None,
            error: None,
        }
    }
}

impl ResearchState {
    pub fn message(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }
}
