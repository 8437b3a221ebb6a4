use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for StepStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("unknown step status: {s}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

/// A research plan as shown to the user for confirmation.
///
/// The backend's plan model has no `id`; such plans deserialize with an empty
/// id and are given one by [`Plan::reconcile`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub thought: String,
    #[serde(default)]
    pub steps: Vec<PlanStep>,
}

impl Plan {
    /// Same title and same step titles in the same order.
    pub fn same_outline(&self, other: &Plan) -> bool {
        self.title == other.title
            && self.steps.len() == other.steps.len()
            && self
                .steps
                .iter()
                .zip(&other.steps)
                .all(|(a, b)| a.title == b.title)
    }

    /// Merge an incoming plan against the plan currently held in state.
    ///
    /// - incoming with an id is taken as-is (an explicit id change is a
    ///   regeneration)
    /// - incoming without an id that matches the current outline keeps the
    ///   current id, and steps the backend reports as `pending` keep their
    ///   locally tracked status and result
    /// - anything else is a regenerated plan and gets a fresh id
    pub fn reconcile(current: Option<&Plan>, mut incoming: Plan) -> Plan {
        if !incoming.id.is_empty() {
            return incoming;
        }

        match current {
            Some(current) if current.same_outline(&incoming) => {
                incoming.id = current.id.clone();
                for (step, known) in incoming.steps.iter_mut().zip(&current.steps) {
                    if step.status == StepStatus::Pending && step.result.is_none() {
                        step.status = known.status;
                        step.result = known.result.clone();
                    }
                }
                incoming
            }
            _ => {
                incoming.id = Uuid::new_v4().to_string();
                incoming
            }
        }
    }
}
