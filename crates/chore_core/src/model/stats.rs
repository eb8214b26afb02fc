use serde::{Deserialize, Serialize};

/// Derived per-user aggregate. A cache row, never a source of truth: every
/// field is recomputed wholesale from the ledger and the task store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStats {
    pub user_id: String,
    pub total_points: i64,
    pub week_points: i64,
    pub month_points: i64,
    pub year_points: i64,
    pub total_tasks: u32,
    pub completed_tasks: u32,
    pub current_streak: u32,
    pub best_streak: u32,
    /// 0 means unranked; ranks are assigned only by a leaderboard query,
    /// relative to a cohort and a window.
    #[serde(default)]
    pub rank: u32,
    #[serde(default)]
    pub last_activity: Option<String>,
}

impl UserStats {
    pub fn empty(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            total_points: 0,
            week_points: 0,
            month_points: 0,
            year_points: 0,
            total_tasks: 0,
            completed_tasks: 0,
            current_streak: 0,
            best_streak: 0,
            rank: 0,
            last_activity: None,
        }
    }
}
