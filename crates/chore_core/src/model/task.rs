use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Claimed,
    InProgress,
    Completed,
    Approved,
    Rejected,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Claimed => "claimed",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "claimed" => Some(Self::Claimed),
            "in_progress" | "in-progress" | "started" => Some(Self::InProgress),
            "completed" | "done" => Some(Self::Completed),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// The full lifecycle table. Edges out of `Rejected` are additionally gated
/// by the engine configuration; everything not listed here is illegal.
pub fn transition_allowed(from: TaskStatus, to: TaskStatus) -> bool {
    use TaskStatus::*;
    matches!(
        (from, to),
        (Pending, Claimed)
            | (Claimed, InProgress)
            | (InProgress, Completed)
            | (Completed, Approved)
            | (Completed, Rejected)
            | (Rejected, InProgress)
            | (Rejected, Claimed)
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Normal,
    High,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "normal" => Some(Self::Normal),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::Normal
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_category")]
    pub category: String,
    pub points: u32,
    #[serde(default)]
    pub priority: Priority,
    pub status: TaskStatus,
    pub created_by: String,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub approver: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub due_at: Option<String>,
    #[serde(default)]
    pub claimed_at: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(default)]
    pub approved_at: Option<String>,
}

fn default_category() -> String {
    "general".to_string()
}

impl Task {
    /// Status/assignee coupling: an assignee exists exactly on the statuses
    /// a claim has passed through, an approver exactly on the reviewed ones.
    pub fn invariants_hold(&self) -> bool {
        let assignee_expected = !matches!(self.status, TaskStatus::Pending);
        let approver_expected =
            matches!(self.status, TaskStatus::Approved | TaskStatus::Rejected);
        self.assignee.is_some() == assignee_expected
            && self.approver.is_some() == approver_expected
    }
}
