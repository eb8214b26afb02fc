use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use time::{UtcOffset, Weekday};

const CONFIG_FILE_NAME: &str = "config.json";
const CONFIG_ENV_VAR: &str = "CHOREBOARD_CONFIG_PATH";

/// Raw on-disk configuration. Every field is optional; missing values fall
/// back to the engine defaults when parsed into an [`EngineConfig`].
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub week_start: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub reopen_to_claimed: Option<bool>,
    #[serde(default)]
    pub reopen_to_in_progress: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct ConfigLoad {
    pub config: Config,
    pub error: Option<AppError>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub week_start: Option<String>,
    pub timezone: Option<String>,
}

/// Validated engine configuration: calendar settings for window and streak
/// computation plus the rework edges permitted out of `rejected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub week_start: Weekday,
    pub utc_offset: UtcOffset,
    pub reopen_to_claimed: bool,
    pub reopen_to_in_progress: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            week_start: Weekday::Monday,
            utc_offset: UtcOffset::UTC,
            reopen_to_claimed: true,
            reopen_to_in_progress: true,
        }
    }
}

impl EngineConfig {
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let defaults = Self::default();

        let week_start = match config.week_start.as_deref() {
            Some(raw) => parse_week_start(raw).ok_or_else(|| {
                AppError::validation(format!("unknown week_start '{raw}'"))
            })?,
            None => defaults.week_start,
        };

        let utc_offset = match config.timezone.as_deref() {
            Some(raw) => parse_utc_offset(raw).ok_or_else(|| {
                AppError::validation(format!("unknown timezone offset '{raw}'"))
            })?,
            None => defaults.utc_offset,
        };

        Ok(Self {
            week_start,
            utc_offset,
            reopen_to_claimed: config
                .reopen_to_claimed
                .unwrap_or(defaults.reopen_to_claimed),
            reopen_to_in_progress: config
                .reopen_to_in_progress
                .unwrap_or(defaults.reopen_to_in_progress),
        })
    }
}

pub fn config_path() -> Result<PathBuf, AppError> {
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR)
        && !path.trim().is_empty()
    {
        return Ok(PathBuf::from(path));
    }

    if cfg!(windows) {
        let appdata = std::env::var("APPDATA")
            .map_err(|_| AppError::persistence("APPDATA is not set"))?;
        Ok(PathBuf::from(appdata)
            .join("choreboard")
            .join(CONFIG_FILE_NAME))
    } else {
        let home = std::env::var("HOME")
            .map_err(|_| AppError::persistence("HOME is not set"))?;
        Ok(PathBuf::from(home)
            .join(".config")
            .join("choreboard")
            .join(CONFIG_FILE_NAME))
    }
}

pub fn load_config() -> Result<Config, AppError> {
    let path = config_path()?;
    load_config_from_path(&path)
}

pub fn load_config_with_fallback() -> ConfigLoad {
    match config_path() {
        Ok(path) => load_config_with_fallback_from_path(&path),
        Err(err) => ConfigLoad {
            config: Config::default(),
            error: Some(err),
        },
    }
}

fn load_config_with_fallback_from_path(path: &Path) -> ConfigLoad {
    if !path.exists() {
        return ConfigLoad {
            config: Config::default(),
            error: None,
        };
    }

    match load_config_from_path(path) {
        Ok(config) => ConfigLoad {
            config,
            error: None,
        },
        Err(err) => ConfigLoad {
            config: Config::default(),
            error: Some(err),
        },
    }
}

fn load_config_from_path(path: &Path) -> Result<Config, AppError> {
    let content = std::fs::read_to_string(path)
        .map_err(|err| AppError::persistence(format!("{}: {}", path.display(), err)))?;
    serde_json::from_str(&content).map_err(|err| {
        AppError::persistence(format!("invalid JSON in {}: {}", path.display(), err))
    })
}

pub fn merge_overrides(base: &Config, overrides: &ConfigOverrides) -> Config {
    let mut merged = base.clone();
    if let Some(week_start) = overrides.week_start.as_ref() {
        merged.week_start = Some(week_start.clone());
    }
    if let Some(timezone) = overrides.timezone.as_ref() {
        merged.timezone = Some(timezone.clone());
    }
    merged
}

pub fn parse_week_start(raw: &str) -> Option<Weekday> {
    match canonical_value_name(raw)?.as_str() {
        "monday" | "mon" => Some(Weekday::Monday),
        "tuesday" | "tue" => Some(Weekday::Tuesday),
        "wednesday" | "wed" => Some(Weekday::Wednesday),
        "thursday" | "thu" => Some(Weekday::Thursday),
        "friday" | "fri" => Some(Weekday::Friday),
        "saturday" | "sat" => Some(Weekday::Saturday),
        "sunday" | "sun" => Some(Weekday::Sunday),
        _ => None,
    }
}

/// Accepts `UTC`, `Z`, or fixed offsets in `+HH:MM` / `-HH:MM` form.
pub fn parse_utc_offset(raw: &str) -> Option<UtcOffset> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.eq_ignore_ascii_case("utc") || trimmed == "Z" || trimmed == "z" {
        return Some(UtcOffset::UTC);
    }

    let (sign, rest) = if let Some(rest) = trimmed.strip_prefix('+') {
        (1i8, rest)
    } else if let Some(rest) = trimmed.strip_prefix('-') {
        (-1i8, rest)
    } else {
        return None;
    };

    let (hours_raw, minutes_raw) = rest.split_once(':')?;
    let hours: i8 = hours_raw.parse().ok()?;
    let minutes: i8 = minutes_raw.parse().ok()?;
    if !(0..=23).contains(&hours) || !(0..=59).contains(&minutes) {
        return None;
    }

    UtcOffset::from_hms(sign * hours, sign * minutes, 0).ok()
}

fn canonical_value_name(raw: &str) -> Option<String> {
    let mut cleaned = String::new();
    let mut previous_underscore = false;

    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() {
            cleaned.push(ch.to_ascii_lowercase());
            previous_underscore = false;
        } else if !previous_underscore && !cleaned.is_empty() {
            cleaned.push('_');
            previous_underscore = true;
        }
    }

    let trimmed = cleaned.trim_matches('_');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
