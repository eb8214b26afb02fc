use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Output JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Override configuration values (format KEY=VALUE)
    #[arg(long = "config-override", value_name = "KEY=VALUE", global = true)]
    pub config_override: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a new chore worth a number of points
    ///
    /// Example: chores create "Do the dishes" --points 10 --as alice
    Create {
        title: Option<String>,
        #[arg(long)]
        points: u32,
        #[arg(long = "as", value_name = "USER")]
        actor: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        priority: Option<String>,
        #[arg(long, value_name = "DATETIME")]
        due: Option<String>,
    },
    /// Claim a pending chore
    ///
    /// Example: chores claim task-1 --as bob
    Claim {
        id: String,
        #[arg(long = "as", value_name = "USER")]
        actor: String,
    },
    /// Start working on a claimed chore
    ///
    /// Example: chores start task-1 --as bob
    Start {
        id: String,
        #[arg(long = "as", value_name = "USER")]
        actor: String,
    },
    /// Mark a chore as completed, ready for review
    ///
    /// Example: chores done task-1 --as bob
    Done {
        id: String,
        #[arg(long = "as", value_name = "USER")]
        actor: String,
    },
    /// Approve a completed chore and award its points
    ///
    /// Example: chores approve task-1 --as alice
    Approve {
        id: String,
        #[arg(long = "as", value_name = "USER")]
        actor: String,
    },
    /// Send a completed chore back for rework
    ///
    /// Example: chores reject task-1 --as alice -m "still greasy"
    Reject {
        id: String,
        #[arg(long = "as", value_name = "USER")]
        actor: String,
        #[arg(short = 'm', long = "message", value_name = "MESSAGE")]
        message: Option<String>,
    },
    /// Apply a manual points adjustment
    ///
    /// Example: chores adjust bob 25
    /// Example: chores adjust bob -- -5 --override
    Adjust {
        user: String,
        #[arg(allow_hyphen_values = true)]
        delta: i64,
        #[arg(long = "override")]
        admin_override: bool,
    },
    /// Show details of a chore
    ///
    /// Example: chores show task-1
    Show {
        id: String,
    },
    /// List chores
    ///
    /// Example: chores list open
    /// Example: chores list review
    List {
        #[command(subcommand)]
        list: ListCommand,
    },
    /// Show a household member's points and streaks
    ///
    /// Example: chores stats bob
    Stats {
        user: String,
    },
    /// Show the ranked leaderboard for a group
    ///
    /// Example: chores leaderboard household --window week
    Leaderboard {
        group: String,
        #[arg(long, value_name = "week|month|all")]
        window: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ListCommand {
    /// Chores that still need work (pending, claimed, in progress, rejected)
    Open,
    /// Completed chores waiting for review
    Review,
    /// Approved chores
    Done,
    /// Every chore regardless of status
    All,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOverrideTarget {
    WeekStart,
    Timezone,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedConfigOverride {
    pub target: ConfigOverrideTarget,
    pub value: String,
}

/// Parse a raw `KEY=VALUE` override string into a structured target.
pub fn parse_config_override(raw: &str) -> Result<ParsedConfigOverride, String> {
    let trimmed = raw.trim();
    let (key_raw, value_raw) = trimmed
        .split_once('=')
        .ok_or_else(|| "override must be in KEY=VALUE format".to_string())?;

    let value = value_raw.trim().to_string();
    let canonical_field = canonicalize_flag_name(key_raw)
        .ok_or_else(|| "override key cannot be empty".to_string())?;

    match canonical_field.as_str() {
        "week_start" | "weekstart" => Ok(ParsedConfigOverride {
            target: ConfigOverrideTarget::WeekStart,
            value,
        }),
        "timezone" | "tz" => Ok(ParsedConfigOverride {
            target: ConfigOverrideTarget::Timezone,
            value,
        }),
        other => Err(format!("unknown config field '{other}'")),
    }
}

fn canonicalize_flag_name(name: &str) -> Option<String> {
    let mut cleaned = String::new();
    let mut previous_underscore = false;

    for ch in name.chars() {
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
