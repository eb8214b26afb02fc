use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

const USERS_FILE_NAME: &str = "users.json";
const USERS_ENV_VAR: &str = "CHOREBOARD_USERS_PATH";

/// Identity lookup collaborator. The engine only ever asks two questions:
/// does this user exist, and who is in this group.
pub trait UserDirectory: Send + Sync {
    fn user_exists(&self, user_id: &str) -> Result<bool, AppError>;

    fn group_members(&self, group_id: &str) -> Result<Vec<String>, AppError>;
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct StoredDirectory {
    #[serde(default)]
    users: Vec<String>,
    #[serde(default)]
    groups: HashMap<String, Vec<String>>,
}

/// Directory backed by a users.json file:
/// `{"users": ["alice", ...], "groups": {"household": ["alice", ...]}}`.
#[derive(Debug)]
pub struct JsonDirectory {
    users: Vec<String>,
    groups: HashMap<String, Vec<String>>,
}

impl JsonDirectory {
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let content = std::fs::read_to_string(path)
            .map_err(|err| AppError::persistence(format!("{}: {}", path.display(), err)))?;
        let stored: StoredDirectory = serde_json::from_str(&content).map_err(|err| {
            AppError::persistence(format!("invalid JSON in {}: {}", path.display(), err))
        })?;
        Ok(Self {
            users: stored.users,
            groups: stored.groups,
        })
    }
}

impl UserDirectory for JsonDirectory {
    fn user_exists(&self, user_id: &str) -> Result<bool, AppError> {
        Ok(self.users.iter().any(|user| user == user_id))
    }

    fn group_members(&self, group_id: &str) -> Result<Vec<String>, AppError> {
        self.groups
            .get(group_id)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("group {group_id} not found")))
    }
}

/// Fallback when no users file is configured: any user id is accepted, but
/// no groups resolve, so leaderboard queries report `not_found` until a real
/// directory is set up.
pub struct OpenDirectory;

impl UserDirectory for OpenDirectory {
    fn user_exists(&self, _user_id: &str) -> Result<bool, AppError> {
        Ok(true)
    }

    fn group_members(&self, group_id: &str) -> Result<Vec<String>, AppError> {
        Err(AppError::not_found(format!(
            "group {group_id} not found (no user directory configured)"
        )))
    }
}

/// In-memory directory for embedding and tests.
pub struct StaticDirectory {
    users: Vec<String>,
    groups: HashMap<String, Vec<String>>,
}

impl StaticDirectory {
    pub fn new(users: &[&str]) -> Self {
        Self {
            users: users.iter().map(|user| user.to_string()).collect(),
            groups: HashMap::new(),
        }
    }

    pub fn with_group(mut self, group_id: &str, members: &[&str]) -> Self {
        self.groups.insert(
            group_id.to_string(),
            members.iter().map(|member| member.to_string()).collect(),
        );
        self
    }
}

impl UserDirectory for StaticDirectory {
    fn user_exists(&self, user_id: &str) -> Result<bool, AppError> {
        Ok(self.users.iter().any(|user| user == user_id))
    }

    fn group_members(&self, group_id: &str) -> Result<Vec<String>, AppError> {
        self.groups
            .get(group_id)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("group {group_id} not found")))
    }
}

pub fn users_path() -> Result<PathBuf, AppError> {
    if let Ok(path) = std::env::var(USERS_ENV_VAR)
        && !path.trim().is_empty()
    {
        return Ok(PathBuf::from(path));
    }

    if cfg!(windows) {
        let appdata = std::env::var("APPDATA")
            .map_err(|_| AppError::persistence("APPDATA is not set"))?;
        Ok(PathBuf::from(appdata)
            .join("choreboard")
            .join(USERS_FILE_NAME))
    } else {
        let home = std::env::var("HOME")
            .map_err(|_| AppError::persistence("HOME is not set"))?;
        Ok(PathBuf::from(home)
            .join(".config")
            .join("choreboard")
            .join(USERS_FILE_NAME))
    }
}

pub fn directory_from_env() -> Result<Box<dyn UserDirectory>, AppError> {
    let path = users_path()?;
    if path.exists() {
        Ok(Box::new(JsonDirectory::load(&path)?))
    } else {
        Ok(Box::new(OpenDirectory))
    }
}
