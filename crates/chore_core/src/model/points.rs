use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    TaskApproved,
    ManualAdjustment,
}

impl ReasonCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TaskApproved => "task_approved",
            Self::ManualAdjustment => "manual_adjustment",
        }
    }
}

/// One immutable ledger record. Never edited or removed once written;
/// corrections are new entries with a compensating delta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointsEntry {
    pub id: u64,
    pub user_id: String,
    #[serde(default)]
    pub task_id: Option<String>,
    pub delta: i64,
    pub reason: ReasonCode,
    pub created_at: String,
}

/// An entry waiting for the store to assign its id and commit it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPointsEntry {
    pub user_id: String,
    pub task_id: Option<String>,
    pub delta: i64,
    pub reason: ReasonCode,
    /// Negative deltas are refused unless this administrative flag is set.
    pub allow_negative: bool,
}
