use serde::{Deserialize, Serialize};

use super::task::TaskStatus;

/// Audit record for a single transition. Written on every status change,
/// never read back by the engine; external auditors consume it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskHistoryRecord {
    pub task_id: String,
    pub actor: String,
    pub from_status: TaskStatus,
    pub to_status: TaskStatus,
    #[serde(default)]
    pub comment: Option<String>,
    pub created_at: String,
}
