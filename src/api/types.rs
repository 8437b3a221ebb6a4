use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartRequest {
    pub topic: String,
    pub locale: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserConfirm {
    Confirm,
    Modify,
}

impl UserConfirm {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Confirm => "confirm",
            Self::Modify => "modify",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmPlanRequest {
    pub plan_id: String,
    pub user_confirm: UserConfirm,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePlanRequest {
    pub topic: String,
}

/// Body of `GET /api/research/progress/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressReport {
    pub status: String,
    pub current_process: String,
    pub logs: Vec<String>,
}

impl ProgressReport {
    pub fn is_completed(&self) -> bool {
        self.status == "completed"
    }
}

/// Body of `GET /api/research/report/{id}`. Fields other than `content` are
/// backend-defined and kept as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Report {
    #[serde(default)]
    pub content: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}
