use crate::error::AppError;
use crate::model::{NewPointsEntry, PointsEntry, Task, UserStats};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::{EngineState, SCHEMA_VERSION, Store, TaskFilter, TransitionChange};

const STORE_FILE_NAME: &str = "chores.json";
const STORE_ENV_VAR: &str = "CHOREBOARD_STORE_PATH";

pub fn store_path() -> Result<PathBuf, AppError> {
    if let Ok(path) = std::env::var(STORE_ENV_VAR)
        && !path.trim().is_empty()
    {
        return Ok(PathBuf::from(path));
    }

    if cfg!(windows) {
        let appdata = std::env::var("APPDATA")
            .map_err(|_| AppError::persistence("APPDATA is not set"))?;
        Ok(PathBuf::from(appdata)
            .join("choreboard")
            .join(STORE_FILE_NAME))
    } else {
        let home = std::env::var("HOME")
            .map_err(|_| AppError::persistence("HOME is not set"))?;
        Ok(PathBuf::from(home)
            .join(".config")
            .join("choreboard")
            .join(STORE_FILE_NAME))
    }
}

pub fn load_state(path: &Path) -> Result<EngineState, AppError> {
    if !path.exists() {
        return Ok(EngineState::default());
    }

    let content =
        std::fs::read_to_string(path).map_err(|err| AppError::persistence(err.to_string()))?;
    let state: EngineState =
        serde_json::from_str(&content).map_err(|err| AppError::persistence(err.to_string()))?;

    if !(1..=SCHEMA_VERSION).contains(&state.schema_version) {
        return Err(AppError::persistence("schema_version mismatch"));
    }

    Ok(state)
}

pub fn save_state(path: &Path, state: &EngineState) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|err| AppError::persistence(err.to_string()))?;
    }

    let mut stored = state.clone();
    stored.schema_version = SCHEMA_VERSION;
    let content = serde_json::to_string_pretty(&stored)
        .map_err(|err| AppError::persistence(err.to_string()))?;
    std::fs::write(path, content).map_err(|err| AppError::persistence(err.to_string()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let permissions = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(path, permissions)
            .map_err(|err| AppError::persistence(err.to_string()))?;
    }

    Ok(())
}

/// File-backed store: one JSON document holding the whole [`EngineState`],
/// rewritten in full on every mutation. The mutex serializes load-mutate-save
/// cycles so the optimistic guard in `apply_transition` is evaluated against
/// the state that is actually committed.
pub struct JsonStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn from_env() -> Result<Self, AppError> {
        Ok(Self::open(store_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read<R>(
        &self,
        f: impl FnOnce(&EngineState) -> Result<R, AppError>,
    ) -> Result<R, AppError> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| AppError::persistence("store lock poisoned"))?;
        let state = load_state(&self.path)?;
        f(&state)
    }

    /// Mutations only reach disk when the closure succeeds, so a refused
    /// change leaves the stored state untouched.
    fn mutate<R>(
        &self,
        f: impl FnOnce(&mut EngineState) -> Result<R, AppError>,
    ) -> Result<R, AppError> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| AppError::persistence("store lock poisoned"))?;
        let mut state = load_state(&self.path)?;
        let result = f(&mut state)?;
        save_state(&self.path, &state)?;
        Ok(result)
    }
}

impl Store for JsonStore {
    fn insert_task(&self, task: Task) -> Result<Task, AppError> {
        self.mutate(|state| state.insert_task(task))
    }

    fn get_task(&self, id: &str) -> Result<Task, AppError> {
        self.read(|state| {
            state
                .find_task(id)
                .cloned()
                .ok_or_else(|| AppError::not_found(format!("task {id} not found")))
        })
    }

    fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, AppError> {
        self.read(|state| {
            Ok(state
                .tasks
                .iter()
                .filter(|task| filter.matches(task))
                .cloned()
                .collect())
        })
    }

    fn apply_transition(&self, change: &TransitionChange) -> Result<Task, AppError> {
        self.mutate(|state| state.apply_transition(change))
    }

    fn append_entry(&self, entry: &NewPointsEntry, now: &str) -> Result<PointsEntry, AppError> {
        self.mutate(|state| state.append_entry(entry, now))
    }

    fn entries_for_user(&self, user_id: &str) -> Result<Vec<PointsEntry>, AppError> {
        self.read(|state| Ok(state.entries_for_user(user_id)))
    }

    fn sum_for(
        &self,
        user_id: &str,
        from: Option<&str>,
        to: Option<&str>,
    ) -> Result<i64, AppError> {
        self.read(|state| state.sum_for(user_id, from, to))
    }

    fn tasks_assigned_to(&self, user_id: &str) -> Result<Vec<Task>, AppError> {
        self.read(|state| Ok(state.tasks_assigned_to(user_id)))
    }

    fn put_stats(&self, stats: UserStats) -> Result<(), AppError> {
        self.mutate(|state| {
            state.stats_cache.insert(stats.user_id.clone(), stats);
            Ok(())
        })
    }

    fn cached_stats(&self, user_id: &str) -> Result<Option<UserStats>, AppError> {
        self.read(|state| Ok(state.stats_cache.get(user_id).cloned()))
    }
}
