use crate::aggregate::compute_user_stats;
use crate::config::EngineConfig;
use crate::directory::UserDirectory;
use crate::error::AppError;
use crate::leaderboard::{LeaderboardEntry, Window, rank_users};
use crate::model::{
    NewPointsEntry, PointsEntry, Priority, ReasonCode, Task, TaskStatus, UserStats,
};
use crate::storage::{Store, TaskFilter, TransitionChange};
use std::sync::Arc;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{debug, info};

/// Input for task creation, validated before any store access.
#[derive(Debug, Clone)]
pub struct TaskSpec {
    pub title: String,
    pub description: String,
    pub category: String,
    pub points: u32,
    pub priority: Priority,
    pub due_at: Option<String>,
    pub created_by: String,
}

/// The transaction coordinator: the only component that mutates the task
/// store and the points ledger. It validates intent against the lifecycle
/// table, then hands the store a single conditional change; transitions with
/// point consequences carry their ledger entry inside that change, so a task
/// is never approved without its award or vice versa.
pub struct Engine {
    store: Arc<dyn Store>,
    directory: Box<dyn UserDirectory>,
    config: EngineConfig,
}

impl Engine {
    pub fn new(
        store: Arc<dyn Store>,
        directory: Box<dyn UserDirectory>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            directory,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn create_task(&self, spec: &TaskSpec) -> Result<Task, AppError> {
        let title = spec.title.trim();
        if title.is_empty() {
            return Err(AppError::validation("title is required"));
        }
        let created_by = self.require_user(&spec.created_by)?;
        if let Some(due_at) = spec.due_at.as_deref()
            && OffsetDateTime::parse(due_at, &Rfc3339).is_err()
        {
            return Err(AppError::validation("due date must be RFC3339"));
        }

        let now = now_rfc3339()?;
        let category = spec.category.trim();
        let task = Task {
            id: format!("task-{}", OffsetDateTime::now_utc().unix_timestamp_nanos()),
            title: title.to_string(),
            description: spec.description.trim().to_string(),
            category: if category.is_empty() {
                "general".to_string()
            } else {
                category.to_string()
            },
            points: spec.points,
            priority: spec.priority,
            status: TaskStatus::Pending,
            created_by,
            assignee: None,
            approver: None,
            created_at: now.clone(),
            updated_at: now,
            due_at: spec.due_at.clone(),
            claimed_at: None,
            completed_at: None,
            approved_at: None,
        };

        let task = self.store.insert_task(task)?;
        debug!(task_id = %task.id, points = task.points, "task created");
        Ok(task)
    }

    pub fn claim_task(&self, task_id: &str, user_id: &str) -> Result<Task, AppError> {
        let task_id = require_id(task_id)?;
        let user = self.require_user(user_id)?;
        let task = self.store.get_task(task_id)?;

        let expected = match task.status {
            TaskStatus::Pending => TaskStatus::Pending,
            TaskStatus::Rejected if self.config.reopen_to_claimed => TaskStatus::Rejected,
            TaskStatus::Rejected => {
                return Err(AppError::invalid_transition(
                    "rework via claim is disabled for this household",
                ));
            }
            _ => {
                let holder = task.assignee.as_deref().unwrap_or("someone");
                return Err(AppError::already_claimed(format!(
                    "task {task_id} is already assigned to {holder}"
                )));
            }
        };

        let updated = self.store.apply_transition(&TransitionChange {
            task_id: task_id.to_string(),
            expected,
            target: TaskStatus::Claimed,
            actor: user.clone(),
            assignee: Some(user),
            comment: None,
            award: None,
            now: now_rfc3339()?,
        })?;
        debug!(task_id = %updated.id, assignee = ?updated.assignee, "task claimed");
        Ok(updated)
    }

    pub fn start_task(&self, task_id: &str, user_id: &str) -> Result<Task, AppError> {
        let task_id = require_id(task_id)?;
        let user = self.require_user(user_id)?;
        let task = self.store.get_task(task_id)?;

        if task.assignee.as_deref() != Some(user.as_str()) {
            return Err(AppError::invalid_transition(
                "only the current assignee can start a task",
            ));
        }
        let expected = match task.status {
            TaskStatus::Claimed => TaskStatus::Claimed,
            TaskStatus::Rejected if self.config.reopen_to_in_progress => TaskStatus::Rejected,
            TaskStatus::Rejected => {
                return Err(AppError::invalid_transition(
                    "rework via start is disabled for this household",
                ));
            }
            other => {
                return Err(AppError::invalid_transition(format!(
                    "cannot start task {task_id} from {}",
                    other.as_str()
                )));
            }
        };

        let updated = self.store.apply_transition(&TransitionChange {
            task_id: task_id.to_string(),
            expected,
            target: TaskStatus::InProgress,
            actor: user,
            assignee: None,
            comment: None,
            award: None,
            now: now_rfc3339()?,
        })?;
        debug!(task_id = %updated.id, "task started");
        Ok(updated)
    }

    pub fn complete_task(&self, task_id: &str, user_id: &str) -> Result<Task, AppError> {
        let task_id = require_id(task_id)?;
        let user = self.require_user(user_id)?;
        let task = self.store.get_task(task_id)?;

        if task.assignee.as_deref() != Some(user.as_str()) {
            return Err(AppError::invalid_transition(
                "only the current assignee can complete a task",
            ));
        }
        if task.status != TaskStatus::InProgress {
            return Err(AppError::invalid_transition(format!(
                "cannot complete task {task_id} from {}",
                task.status.as_str()
            )));
        }

        let updated = self.store.apply_transition(&TransitionChange {
            task_id: task_id.to_string(),
            expected: TaskStatus::InProgress,
            target: TaskStatus::Completed,
            actor: user,
            assignee: None,
            comment: None,
            award: None,
            now: now_rfc3339()?,
        })?;
        debug!(task_id = %updated.id, "task completed, awaiting review");
        Ok(updated)
    }

    /// Approval is the point-bearing transition: the status change, the
    /// ledger award for the assignee, and the audit record land in one unit
    /// or not at all.
    pub fn approve_task(&self, task_id: &str, approver_id: &str) -> Result<Task, AppError> {
        let task_id = require_id(task_id)?;
        let approver = self.require_user(approver_id)?;
        let task = self.store.get_task(task_id)?;

        if task.status != TaskStatus::Completed {
            return Err(AppError::invalid_transition(format!(
                "cannot approve task {task_id} from {}",
                task.status.as_str()
            )));
        }
        let assignee = task.assignee.clone().ok_or_else(|| {
            AppError::persistence(format!("task {task_id} is completed without an assignee"))
        })?;
        if assignee == approver {
            return Err(AppError::invalid_transition(
                "the assignee cannot approve their own task",
            ));
        }

        let updated = self.store.apply_transition(&TransitionChange {
            task_id: task_id.to_string(),
            expected: TaskStatus::Completed,
            target: TaskStatus::Approved,
            actor: approver.clone(),
            assignee: None,
            comment: None,
            award: Some(NewPointsEntry {
                user_id: assignee.clone(),
                task_id: Some(task_id.to_string()),
                delta: i64::from(task.points),
                reason: ReasonCode::TaskApproved,
                allow_negative: false,
            }),
            now: now_rfc3339()?,
        })?;
        info!(
            task_id = %updated.id,
            user = %assignee,
            points = updated.points,
            approver = %approver,
            "task approved, points awarded"
        );
        Ok(updated)
    }

    pub fn reject_task(
        &self,
        task_id: &str,
        approver_id: &str,
        comment: Option<&str>,
    ) -> Result<Task, AppError> {
        let task_id = require_id(task_id)?;
        let approver = self.require_user(approver_id)?;
        let task = self.store.get_task(task_id)?;

        if task.status != TaskStatus::Completed {
            return Err(AppError::invalid_transition(format!(
                "cannot reject task {task_id} from {}",
                task.status.as_str()
            )));
        }
        if task.assignee.as_deref() == Some(approver.as_str()) {
            return Err(AppError::invalid_transition(
                "the assignee cannot reject their own task",
            ));
        }
        let comment = match comment {
            Some(value) => {
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    return Err(AppError::validation("comment is required"));
                }
                Some(trimmed.to_string())
            }
            None => None,
        };

        let updated = self.store.apply_transition(&TransitionChange {
            task_id: task_id.to_string(),
            expected: TaskStatus::Completed,
            target: TaskStatus::Rejected,
            actor: approver,
            assignee: None,
            comment,
            award: None,
            now: now_rfc3339()?,
        })?;
        info!(task_id = %updated.id, "task rejected, no points awarded");
        Ok(updated)
    }

    /// Administrative ledger adjustment. The only way points change outside
    /// an approval; negative deltas need the override flag.
    pub fn adjust_points(
        &self,
        user_id: &str,
        delta: i64,
        admin_override: bool,
    ) -> Result<PointsEntry, AppError> {
        let user = self.require_user(user_id)?;
        if delta == 0 {
            return Err(AppError::validation("delta must be non-zero"));
        }

        let entry = self.store.append_entry(
            &NewPointsEntry {
                user_id: user.clone(),
                task_id: None,
                delta,
                reason: ReasonCode::ManualAdjustment,
                allow_negative: admin_override,
            },
            &now_rfc3339()?,
        )?;
        info!(user = %user, delta, entry_id = entry.id, "manual points adjustment");
        Ok(entry)
    }

    pub fn get_task(&self, task_id: &str) -> Result<Task, AppError> {
        self.store.get_task(require_id(task_id)?)
    }

    pub fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, AppError> {
        self.store.list_tasks(filter)
    }

    /// Recomputes the aggregate from the ledger and the task store and
    /// replaces the cached row. Safe to call repeatedly and from concurrent
    /// readers; recomputation is deterministic over a snapshot, so the last
    /// writer wins without divergence.
    pub fn get_user_stats(&self, user_id: &str) -> Result<UserStats, AppError> {
        let user = self.require_user(user_id)?;
        let stats = self.compute_stats(&user)?;
        self.store.put_stats(stats.clone())?;
        Ok(stats)
    }

    pub fn get_leaderboard(
        &self,
        group_id: &str,
        window: Window,
    ) -> Result<Vec<LeaderboardEntry>, AppError> {
        let group_id = require_id(group_id)?;
        let members = self.directory.group_members(group_id)?;

        let mut cohort = Vec::with_capacity(members.len());
        for member in &members {
            let stats = self.compute_stats(member)?;
            self.store.put_stats(stats.clone())?;
            cohort.push(stats);
        }
        Ok(rank_users(&cohort, window))
    }

    fn compute_stats(&self, user_id: &str) -> Result<UserStats, AppError> {
        let entries = self.store.entries_for_user(user_id)?;
        let tasks = self.store.tasks_assigned_to(user_id)?;
        compute_user_stats(
            &entries,
            &tasks,
            user_id,
            OffsetDateTime::now_utc(),
            &self.config,
        )
    }

    fn require_user(&self, user_id: &str) -> Result<String, AppError> {
        let trimmed = user_id.trim();
        if trimmed.is_empty() {
            return Err(AppError::validation("user id is required"));
        }
        if !self.directory.user_exists(trimmed)? {
            return Err(AppError::not_found(format!("user {trimmed} not found")));
        }
        Ok(trimmed.to_string())
    }
}

fn require_id(id: &str) -> Result<&str, AppError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation("id is required"));
    }
    Ok(trimmed)
}

fn now_rfc3339() -> Result<String, AppError> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .map_err(|err| AppError::persistence(err.to_string()))
}

/// Whether a still-unapproved task is past its due time.
pub fn task_overdue(task: &Task) -> Result<bool, AppError> {
    let due_at = match task.due_at.as_deref() {
        Some(value) => value,
        None => return Ok(false),
    };
    if task.status == TaskStatus::Approved {
        return Ok(false);
    }
    let due = OffsetDateTime::parse(due_at, &Rfc3339)
        .map_err(|_| AppError::persistence(format!("task {} has a bad due date", task.id)))?;
    Ok(due < OffsetDateTime::now_utc())
}
