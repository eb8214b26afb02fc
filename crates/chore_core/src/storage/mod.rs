use crate::error::AppError;
use crate::model::{
    NewPointsEntry, PointsEntry, Task, TaskHistoryRecord, TaskStatus, UserStats,
    transition_allowed,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

pub mod json_store;
pub mod memory;

pub use json_store::JsonStore;
pub use memory::MemoryStore;

pub const SCHEMA_VERSION: u32 = 1;

/// Everything the engine persists: the task table, the append-only points
/// ledger, the append-only audit trail, the rebuildable stats cache, and the
/// ledger id counter. Both backends commit a whole `EngineState` at a time,
/// which is what makes a transition plus its ledger append one unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineState {
    pub schema_version: u32,
    pub tasks: Vec<Task>,
    pub points_entries: Vec<PointsEntry>,
    pub task_history: Vec<TaskHistoryRecord>,
    #[serde(default)]
    pub stats_cache: HashMap<String, UserStats>,
    #[serde(default = "first_entry_id")]
    pub next_entry_id: u64,
}

fn first_entry_id() -> u64 {
    1
}

impl Default for EngineState {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            tasks: Vec::new(),
            points_entries: Vec::new(),
            task_history: Vec::new(),
            stats_cache: HashMap::new(),
            next_entry_id: 1,
        }
    }
}

/// A conditional status update plus everything that must land with it.
/// `expected` is the optimistic-concurrency guard: the store refuses the
/// whole change when the task has moved on since the caller read it.
#[derive(Debug, Clone)]
pub struct TransitionChange {
    pub task_id: String,
    pub expected: TaskStatus,
    pub target: TaskStatus,
    pub actor: String,
    /// `Some` replaces the assignee (claim and re-claim edges).
    pub assignee: Option<String>,
    pub comment: Option<String>,
    /// Appended to the ledger in the same unit (the approve edge).
    pub award: Option<NewPointsEntry>,
    pub now: String,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub assignee: Option<String>,
}

impl TaskFilter {
    pub fn matches(&self, task: &Task) -> bool {
        if let Some(status) = self.status
            && task.status != status
        {
            return false;
        }
        if let Some(assignee) = self.assignee.as_deref()
            && task.assignee.as_deref() != Some(assignee)
        {
            return false;
        }
        true
    }
}

impl EngineState {
    pub fn find_task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    pub fn insert_task(&mut self, task: Task) -> Result<Task, AppError> {
        if self.find_task(&task.id).is_some() {
            return Err(AppError::conflict(format!(
                "task {} already exists",
                task.id
            )));
        }
        self.tasks.push(task.clone());
        Ok(task)
    }

    /// The conditional update. Checks the guard, then the transition table,
    /// then applies the status change, role updates, once-only timestamps,
    /// the optional ledger award, and the audit record together.
    pub fn apply_transition(&mut self, change: &TransitionChange) -> Result<Task, AppError> {
        let index = self
            .tasks
            .iter()
            .position(|task| task.id == change.task_id)
            .ok_or_else(|| AppError::not_found(format!("task {} not found", change.task_id)))?;

        let current = self.tasks[index].status;
        if current != change.expected {
            return Err(AppError::conflict(format!(
                "task {} is {}, expected {}",
                change.task_id,
                current.as_str(),
                change.expected.as_str()
            )));
        }
        if !transition_allowed(current, change.target) {
            return Err(AppError::invalid_transition(format!(
                "cannot move task {} from {} to {}",
                change.task_id,
                current.as_str(),
                change.target.as_str()
            )));
        }

        let award = match change.award.as_ref() {
            Some(new_entry) => Some(self.next_entry(new_entry, &change.now)?),
            None => None,
        };

        let task = &mut self.tasks[index];
        task.status = change.target;
        task.updated_at = change.now.clone();
        if let Some(assignee) = change.assignee.as_ref() {
            task.assignee = Some(assignee.clone());
        }
        match change.target {
            TaskStatus::Claimed => {
                if task.claimed_at.is_none() {
                    task.claimed_at = Some(change.now.clone());
                }
                task.approver = None;
            }
            TaskStatus::InProgress => {
                task.approver = None;
            }
            TaskStatus::Completed => {
                if task.completed_at.is_none() {
                    task.completed_at = Some(change.now.clone());
                }
            }
            TaskStatus::Approved => {
                task.approved_at = Some(change.now.clone());
                task.approver = Some(change.actor.clone());
            }
            TaskStatus::Rejected => {
                task.approver = Some(change.actor.clone());
            }
            TaskStatus::Pending => {}
        }
        let updated = task.clone();

        if let Some(entry) = award {
            self.points_entries.push(entry);
        }
        self.task_history.push(TaskHistoryRecord {
            task_id: change.task_id.clone(),
            actor: change.actor.clone(),
            from_status: change.expected,
            to_status: change.target,
            comment: change.comment.clone(),
            created_at: change.now.clone(),
        });

        Ok(updated)
    }

    pub fn append_entry(
        &mut self,
        new_entry: &NewPointsEntry,
        now: &str,
    ) -> Result<PointsEntry, AppError> {
        let entry = self.next_entry(new_entry, now)?;
        self.points_entries.push(entry.clone());
        Ok(entry)
    }

    fn next_entry(
        &mut self,
        new_entry: &NewPointsEntry,
        now: &str,
    ) -> Result<PointsEntry, AppError> {
        if new_entry.delta < 0 && !new_entry.allow_negative {
            return Err(AppError::validation(
                "negative point delta requires the admin override",
            ));
        }
        let entry = PointsEntry {
            id: self.next_entry_id,
            user_id: new_entry.user_id.clone(),
            task_id: new_entry.task_id.clone(),
            delta: new_entry.delta,
            reason: new_entry.reason,
            created_at: now.to_string(),
        };
        self.next_entry_id += 1;
        Ok(entry)
    }

    pub fn entries_for_user(&self, user_id: &str) -> Vec<PointsEntry> {
        self.points_entries
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Pure read: sum of deltas for a user, optionally bounded to
    /// `[from, to)` in RFC3339.
    pub fn sum_for(
        &self,
        user_id: &str,
        from: Option<&str>,
        to: Option<&str>,
    ) -> Result<i64, AppError> {
        let from = parse_bound(from)?;
        let to = parse_bound(to)?;

        let mut total = 0i64;
        for entry in &self.points_entries {
            if entry.user_id != user_id {
                continue;
            }
            let at = OffsetDateTime::parse(&entry.created_at, &Rfc3339).map_err(|_| {
                AppError::persistence(format!("ledger entry {} has a bad timestamp", entry.id))
            })?;
            if let Some(from) = from
                && at < from
            {
                continue;
            }
            if let Some(to) = to
                && at >= to
            {
                continue;
            }
            total += entry.delta;
        }
        Ok(total)
    }

    pub fn tasks_assigned_to(&self, user_id: &str) -> Vec<Task> {
        self.tasks
            .iter()
            .filter(|task| task.assignee.as_deref() == Some(user_id))
            .cloned()
            .collect()
    }
}

fn parse_bound(raw: Option<&str>) -> Result<Option<OffsetDateTime>, AppError> {
    match raw {
        Some(value) => OffsetDateTime::parse(value, &Rfc3339)
            .map(Some)
            .map_err(|_| AppError::validation("time bound must be RFC3339")),
        None => Ok(None),
    }
}

/// Storage-agnostic repository seam. The coordinator only ever talks to this
/// trait; all methods take `&self` and serialize internally, so one store can
/// be shared across worker threads.
pub trait Store: Send + Sync {
    fn insert_task(&self, task: Task) -> Result<Task, AppError>;
    fn get_task(&self, id: &str) -> Result<Task, AppError>;
    fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, AppError>;
    fn apply_transition(&self, change: &TransitionChange) -> Result<Task, AppError>;
    fn append_entry(&self, entry: &NewPointsEntry, now: &str) -> Result<PointsEntry, AppError>;
    fn entries_for_user(&self, user_id: &str) -> Result<Vec<PointsEntry>, AppError>;
    fn sum_for(
        &self,
        user_id: &str,
        from: Option<&str>,
        to: Option<&str>,
    ) -> Result<i64, AppError>;
    fn tasks_assigned_to(&self, user_id: &str) -> Result<Vec<Task>, AppError>;
    fn put_stats(&self, stats: UserStats) -> Result<(), AppError>;
    fn cached_stats(&self, user_id: &str) -> Result<Option<UserStats>, AppError>;
}

#[cfg(test)]
mod tests {
    use super::{EngineState, TaskFilter, TransitionChange};
    use crate::model::{NewPointsEntry, Priority, ReasonCode, Task, TaskStatus};

    pub(crate) fn sample_task(id: &str, status: TaskStatus) -> Task {
        let assignee = if matches!(status, TaskStatus::Pending) {
            None
        } else {
            Some("bob".to_string())
        };
        let approver = if matches!(status, TaskStatus::Approved | TaskStatus::Rejected) {
            Some("alice".to_string())
        } else {
            None
        };
        Task {
            id: id.to_string(),
            title: "dishes".to_string(),
            description: String::new(),
            category: "kitchen".to_string(),
            points: 10,
            priority: Priority::Normal,
            status,
            created_by: "alice".to_string(),
            assignee,
            approver,
            created_at: "2026-08-01T00:00:00Z".to_string(),
            updated_at: "2026-08-01T00:00:00Z".to_string(),
            due_at: None,
            claimed_at: None,
            completed_at: None,
            approved_at: None,
        }
    }

    fn claim_change(task_id: &str, user: &str) -> TransitionChange {
        TransitionChange {
            task_id: task_id.to_string(),
            expected: TaskStatus::Pending,
            target: TaskStatus::Claimed,
            actor: user.to_string(),
            assignee: Some(user.to_string()),
            comment: None,
            award: None,
            now: "2026-08-02T09:00:00Z".to_string(),
        }
    }

    #[test]
    fn insert_task_rejects_duplicate_ids() {
        let mut state = EngineState::default();
        state.insert_task(sample_task("task-1", TaskStatus::Pending)).unwrap();
        let err = state
            .insert_task(sample_task("task-1", TaskStatus::Pending))
            .unwrap_err();
        assert_eq!(err.code(), "conflict");
    }

    #[test]
    fn apply_transition_claims_pending_task() {
        let mut state = EngineState::default();
        state.insert_task(sample_task("task-1", TaskStatus::Pending)).unwrap();

        let updated = state.apply_transition(&claim_change("task-1", "bob")).unwrap();

        assert_eq!(updated.status, TaskStatus::Claimed);
        assert_eq!(updated.assignee.as_deref(), Some("bob"));
        assert_eq!(updated.claimed_at.as_deref(), Some("2026-08-02T09:00:00Z"));
        assert_eq!(updated.updated_at, "2026-08-02T09:00:00Z");
        assert!(updated.invariants_hold());
        assert_eq!(state.task_history.len(), 1);
        assert_eq!(state.task_history[0].from_status, TaskStatus::Pending);
        assert_eq!(state.task_history[0].to_status, TaskStatus::Claimed);
    }

    #[test]
    fn apply_transition_enforces_expected_status() {
        let mut state = EngineState::default();
        state.insert_task(sample_task("task-1", TaskStatus::Pending)).unwrap();
        state.apply_transition(&claim_change("task-1", "bob")).unwrap();

        let err = state.apply_transition(&claim_change("task-1", "carol")).unwrap_err();
        assert_eq!(err.code(), "conflict");

        let task = state.find_task("task-1").unwrap();
        assert_eq!(task.assignee.as_deref(), Some("bob"));
        assert_eq!(state.task_history.len(), 1);
    }

    #[test]
    fn apply_transition_rejects_illegal_edges() {
        let mut state = EngineState::default();
        state.insert_task(sample_task("task-1", TaskStatus::Pending)).unwrap();

        let mut change = claim_change("task-1", "bob");
        change.target = TaskStatus::Approved;
        let err = state.apply_transition(&change).unwrap_err();
        assert_eq!(err.code(), "invalid_transition");
        assert!(state.task_history.is_empty());
    }

    #[test]
    fn apply_transition_missing_task_is_not_found() {
        let mut state = EngineState::default();
        let err = state.apply_transition(&claim_change("task-9", "bob")).unwrap_err();
        assert_eq!(err.code(), "not_found");
    }

    #[test]
    fn approve_lands_award_and_history_together() {
        let mut state = EngineState::default();
        state.insert_task(sample_task("task-1", TaskStatus::Completed)).unwrap();

        let change = TransitionChange {
            task_id: "task-1".to_string(),
            expected: TaskStatus::Completed,
            target: TaskStatus::Approved,
            actor: "alice".to_string(),
            assignee: None,
            comment: None,
            award: Some(NewPointsEntry {
                user_id: "bob".to_string(),
                task_id: Some("task-1".to_string()),
                delta: 10,
                reason: ReasonCode::TaskApproved,
                allow_negative: false,
            }),
            now: "2026-08-02T10:00:00Z".to_string(),
        };

        let updated = state.apply_transition(&change).unwrap();

        assert_eq!(updated.status, TaskStatus::Approved);
        assert_eq!(updated.approver.as_deref(), Some("alice"));
        assert_eq!(updated.approved_at.as_deref(), Some("2026-08-02T10:00:00Z"));
        assert_eq!(state.points_entries.len(), 1);
        assert_eq!(state.points_entries[0].id, 1);
        assert_eq!(state.points_entries[0].delta, 10);
        assert_eq!(state.points_entries[0].task_id.as_deref(), Some("task-1"));
        assert_eq!(state.task_history.len(), 1);
        assert_eq!(state.next_entry_id, 2);
    }

    #[test]
    fn failed_guard_leaves_no_award_behind() {
        let mut state = EngineState::default();
        state.insert_task(sample_task("task-1", TaskStatus::InProgress)).unwrap();

        let change = TransitionChange {
            task_id: "task-1".to_string(),
            expected: TaskStatus::Completed,
            target: TaskStatus::Approved,
            actor: "alice".to_string(),
            assignee: None,
            comment: None,
            award: Some(NewPointsEntry {
                user_id: "bob".to_string(),
                task_id: Some("task-1".to_string()),
                delta: 10,
                reason: ReasonCode::TaskApproved,
                allow_negative: false,
            }),
            now: "2026-08-02T10:00:00Z".to_string(),
        };

        let err = state.apply_transition(&change).unwrap_err();
        assert_eq!(err.code(), "conflict");
        assert!(state.points_entries.is_empty());
        assert!(state.task_history.is_empty());
        assert_eq!(state.next_entry_id, 1);
    }

    #[test]
    fn rework_clears_the_approver() {
        let mut state = EngineState::default();
        state.insert_task(sample_task("task-1", TaskStatus::Rejected)).unwrap();

        let change = TransitionChange {
            task_id: "task-1".to_string(),
            expected: TaskStatus::Rejected,
            target: TaskStatus::InProgress,
            actor: "bob".to_string(),
            assignee: None,
            comment: None,
            award: None,
            now: "2026-08-03T08:00:00Z".to_string(),
        };

        let updated = state.apply_transition(&change).unwrap();
        assert_eq!(updated.status, TaskStatus::InProgress);
        assert_eq!(updated.approver, None);
        assert!(updated.invariants_hold());
    }

    #[test]
    fn claimed_at_is_set_exactly_once() {
        let mut state = EngineState::default();
        let mut task = sample_task("task-1", TaskStatus::Rejected);
        task.claimed_at = Some("2026-08-01T08:00:00Z".to_string());
        state.insert_task(task).unwrap();

        let change = TransitionChange {
            task_id: "task-1".to_string(),
            expected: TaskStatus::Rejected,
            target: TaskStatus::Claimed,
            actor: "carol".to_string(),
            assignee: Some("carol".to_string()),
            comment: None,
            award: None,
            now: "2026-08-03T08:00:00Z".to_string(),
        };

        let updated = state.apply_transition(&change).unwrap();
        assert_eq!(updated.assignee.as_deref(), Some("carol"));
        assert_eq!(updated.claimed_at.as_deref(), Some("2026-08-01T08:00:00Z"));
    }

    #[test]
    fn append_entry_assigns_sequential_ids() {
        let mut state = EngineState::default();
        let new_entry = NewPointsEntry {
            user_id: "bob".to_string(),
            task_id: None,
            delta: 5,
            reason: ReasonCode::ManualAdjustment,
            allow_negative: false,
        };

        let first = state.append_entry(&new_entry, "2026-08-01T10:00:00Z").unwrap();
        let second = state.append_entry(&new_entry, "2026-08-01T11:00:00Z").unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(state.points_entries.len(), 2);
    }

    #[test]
    fn append_entry_rejects_unflagged_negative_delta() {
        let mut state = EngineState::default();
        let new_entry = NewPointsEntry {
            user_id: "bob".to_string(),
            task_id: None,
            delta: -5,
            reason: ReasonCode::ManualAdjustment,
            allow_negative: false,
        };

        let err = state.append_entry(&new_entry, "2026-08-01T10:00:00Z").unwrap_err();
        assert_eq!(err.code(), "validation");
        assert!(state.points_entries.is_empty());

        let override_entry = NewPointsEntry {
            allow_negative: true,
            ..new_entry
        };
        let entry = state
            .append_entry(&override_entry, "2026-08-01T10:00:00Z")
            .unwrap();
        assert_eq!(entry.delta, -5);
    }

    #[test]
    fn sum_for_respects_bounds() {
        let mut state = EngineState::default();
        for (delta, at) in [
            (10, "2026-08-01T10:00:00Z"),
            (20, "2026-08-02T10:00:00Z"),
            (40, "2026-08-03T10:00:00Z"),
        ] {
            let new_entry = NewPointsEntry {
                user_id: "bob".to_string(),
                task_id: None,
                delta,
                reason: ReasonCode::ManualAdjustment,
                allow_negative: false,
            };
            state.append_entry(&new_entry, at).unwrap();
        }

        assert_eq!(state.sum_for("bob", None, None).unwrap(), 70);
        assert_eq!(
            state
                .sum_for("bob", Some("2026-08-02T00:00:00Z"), None)
                .unwrap(),
            60
        );
        assert_eq!(
            state
                .sum_for("bob", Some("2026-08-02T00:00:00Z"), Some("2026-08-03T00:00:00Z"))
                .unwrap(),
            20
        );
        assert_eq!(state.sum_for("carol", None, None).unwrap(), 0);
    }

    #[test]
    fn sum_for_rejects_bad_bounds() {
        let state = EngineState::default();
        let err = state.sum_for("bob", Some("yesterday"), None).unwrap_err();
        assert_eq!(err.code(), "validation");
    }

    #[test]
    fn filter_matches_status_and_assignee() {
        let claimed = sample_task("task-1", TaskStatus::Claimed);
        let pending = sample_task("task-2", TaskStatus::Pending);

        let by_status = TaskFilter {
            status: Some(TaskStatus::Claimed),
            assignee: None,
        };
        assert!(by_status.matches(&claimed));
        assert!(!by_status.matches(&pending));

        let by_assignee = TaskFilter {
            status: None,
            assignee: Some("bob".to_string()),
        };
        assert!(by_assignee.matches(&claimed));
        assert!(!by_assignee.matches(&pending));

        assert!(TaskFilter::default().matches(&claimed));
        assert!(TaskFilter::default().matches(&pending));
    }
}
