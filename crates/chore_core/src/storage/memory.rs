use crate::error::AppError;
use crate::model::{NewPointsEntry, PointsEntry, Task, UserStats};
use std::sync::Mutex;

use super::{EngineState, Store, TaskFilter, TransitionChange};

/// In-process store for embedding and tests. Same locking discipline as the
/// file-backed store, without the disk round trip.
pub struct MemoryStore {
    state: Mutex<EngineState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(EngineState::default()),
        }
    }

    pub fn with_state(state: EngineState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    /// Snapshot of the current state, for assertions.
    pub fn snapshot(&self) -> Result<EngineState, AppError> {
        Ok(self.locked()?.clone())
    }

    fn locked(&self) -> Result<std::sync::MutexGuard<'_, EngineState>, AppError> {
        self.state
            .lock()
            .map_err(|_| AppError::persistence("store lock poisoned"))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for MemoryStore {
    fn insert_task(&self, task: Task) -> Result<Task, AppError> {
        self.locked()?.insert_task(task)
    }

    fn get_task(&self, id: &str) -> Result<Task, AppError> {
        self.locked()?
            .find_task(id)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("task {id} not found")))
    }

    fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, AppError> {
        Ok(self
            .locked()?
            .tasks
            .iter()
            .filter(|task| filter.matches(task))
            .cloned()
            .collect())
    }

    fn apply_transition(&self, change: &TransitionChange) -> Result<Task, AppError> {
        self.locked()?.apply_transition(change)
    }

    fn append_entry(&self, entry: &NewPointsEntry, now: &str) -> Result<PointsEntry, AppError> {
        self.locked()?.append_entry(entry, now)
    }

    fn entries_for_user(&self, user_id: &str) -> Result<Vec<PointsEntry>, AppError> {
        Ok(self.locked()?.entries_for_user(user_id))
    }

    fn sum_for(
        &self,
        user_id: &str,
        from: Option<&str>,
        to: Option<&str>,
    ) -> Result<i64, AppError> {
        self.locked()?.sum_for(user_id, from, to)
    }

    fn tasks_assigned_to(&self, user_id: &str) -> Result<Vec<Task>, AppError> {
        Ok(self.locked()?.tasks_assigned_to(user_id))
    }

    fn put_stats(&self, stats: UserStats) -> Result<(), AppError> {
        self.locked()?
            .stats_cache
            .insert(stats.user_id.clone(), stats);
        Ok(())
    }

    fn cached_stats(&self, user_id: &str) -> Result<Option<UserStats>, AppError> {
        Ok(self.locked()?.stats_cache.get(user_id).cloned())
    }
}
