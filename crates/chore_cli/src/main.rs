use chore_cli::cli::{
    Cli, Command, ConfigOverrideTarget, ListCommand, parse_config_override,
};
use chore_core::config::{
    ConfigOverrides, EngineConfig, load_config_with_fallback, merge_overrides,
};
use chore_core::directory::directory_from_env;
use chore_core::engine::{Engine, TaskSpec, task_overdue};
use chore_core::error::AppError;
use chore_core::leaderboard::{LeaderboardEntry, Window};
use chore_core::model::{Priority, Task, TaskStatus, UserStats};
use chore_core::storage::{JsonStore, TaskFilter};
use clap::{CommandFactory, Parser};
use std::io::{self, BufRead};
use std::sync::Arc;
use tabled::{Table, Tabled};

fn build_engine(raw_overrides: &[String]) -> Result<Engine, AppError> {
    let mut overrides = ConfigOverrides::default();
    for raw in raw_overrides {
        let parsed = parse_config_override(raw).map_err(AppError::validation)?;
        match parsed.target {
            ConfigOverrideTarget::WeekStart => overrides.week_start = Some(parsed.value),
            ConfigOverrideTarget::Timezone => overrides.timezone = Some(parsed.value),
        }
    }

    let load = load_config_with_fallback();
    if let Some(err) = load.error {
        eprintln!("WARNING: using default configuration: {err}");
    }
    let merged = merge_overrides(&load.config, &overrides);
    let config = EngineConfig::from_config(&merged)?;

    let store = JsonStore::from_env()?;
    let directory = directory_from_env()?;
    Ok(Engine::new(Arc::new(store), directory, config))
}

fn status_label(task: &Task) -> Result<String, AppError> {
    let base = task.status.as_str();
    if task_overdue(task)? {
        Ok(format!("{base} (overdue)"))
    } else {
        Ok(base.to_string())
    }
}

fn print_task_plain(verb: &str, task: &Task) {
    println!("{} task: {} ({})", verb, task.title, task.id);
}

fn print_task_json(task: &Task) -> Result<(), AppError> {
    let json =
        serde_json::to_string(task).map_err(|err| AppError::persistence(err.to_string()))?;
    println!("{json}");
    Ok(())
}

fn print_tasks_plain(tasks: &[Task]) -> Result<(), AppError> {
    for task in tasks {
        let assignee = task.assignee.as_deref().unwrap_or("-");
        let due_at = task.due_at.as_deref().unwrap_or("-");
        println!(
            "{} | {} | {} | {}pt | {} | {}",
            task.id,
            task.title,
            status_label(task)?,
            task.points,
            assignee,
            due_at
        );
    }
    Ok(())
}

fn print_tasks_json(tasks: &[Task]) -> Result<(), AppError> {
    let json =
        serde_json::to_string(tasks).map_err(|err| AppError::persistence(err.to_string()))?;
    println!("{json}");
    Ok(())
}

fn print_stats_plain(stats: &UserStats) {
    println!("Stats for {}", stats.user_id);
    println!(
        "  points: {} total (week {}, month {}, year {})",
        stats.total_points, stats.week_points, stats.month_points, stats.year_points
    );
    println!(
        "  chores: {} approved of {} assigned",
        stats.completed_tasks, stats.total_tasks
    );
    println!(
        "  streak: {} current, {} best",
        stats.current_streak, stats.best_streak
    );
    let last_activity = stats.last_activity.as_deref().unwrap_or("-");
    println!("  last activity: {last_activity}");
}

#[derive(Tabled)]
struct LeaderboardRow {
    rank: u32,
    user: String,
    points: i64,
    completed: u32,
}

fn print_leaderboard_plain(entries: &[LeaderboardEntry]) {
    let rows: Vec<LeaderboardRow> = entries
        .iter()
        .map(|entry| LeaderboardRow {
            rank: entry.rank,
            user: entry.user_id.clone(),
            points: entry.points,
            completed: entry.completed_tasks,
        })
        .collect();
    println!("{}", Table::new(rows));
}

fn normalize_parse_error(err: clap::Error) -> AppError {
    let rendered = err.to_string();
    let first_line = rendered.lines().next().unwrap_or("invalid command").trim();
    let message = first_line
        .strip_prefix("error: ")
        .unwrap_or(first_line)
        .to_string();
    AppError::validation(message)
}

fn split_command_line(line: &str) -> Result<Vec<String>, AppError> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escape = false;

    for ch in line.chars() {
        if escape {
            if ch != '"' && ch != '\\' {
                current.push('\\');
            }
            current.push(ch);
            escape = false;
            continue;
        }

        if in_quotes && ch == '\\' {
            escape = true;
            continue;
        }

        if ch == '"' {
            in_quotes = !in_quotes;
            continue;
        }

        if ch.is_whitespace() && !in_quotes {
            if !current.is_empty() {
                args.push(current.clone());
                current.clear();
            }
            continue;
        }

        current.push(ch);
    }

    if in_quotes {
        return Err(AppError::validation("unterminated quote in command"));
    }

    if !current.is_empty() {
        args.push(current);
    }

    Ok(args)
}

fn print_help() {
    let mut cmd = Cli::command();
    let help = cmd.render_help();
    println!("{help}");
}

fn list_statuses(list: &ListCommand) -> Option<Vec<TaskStatus>> {
    match list {
        ListCommand::Open => Some(vec![
            TaskStatus::Pending,
            TaskStatus::Claimed,
            TaskStatus::InProgress,
            TaskStatus::Rejected,
        ]),
        ListCommand::Review => Some(vec![TaskStatus::Completed]),
        ListCommand::Done => Some(vec![TaskStatus::Approved]),
        ListCommand::All => None,
    }
}

fn run_command(cli: Cli) -> Result<(), AppError> {
    let engine = build_engine(&cli.config_override)?;

    match cli.command {
        Command::Create {
            title,
            points,
            actor,
            description,
            category,
            priority,
            due,
        } => {
            let title = match title {
                Some(value) if !value.trim().is_empty() => value,
                _ => return Err(AppError::validation("title is required")),
            };
            let priority = match priority.as_deref() {
                Some(raw) => Priority::parse(raw)
                    .ok_or_else(|| AppError::validation(format!("unknown priority '{raw}'")))?,
                None => Priority::Normal,
            };

            let task = engine.create_task(&TaskSpec {
                title,
                description: description.unwrap_or_default(),
                category: category.unwrap_or_default(),
                points,
                priority,
                due_at: due,
                created_by: actor,
            })?;
            if cli.json {
                print_task_json(&task)?;
            } else {
                print_task_plain("Created", &task);
            }
        }
        Command::Claim { id, actor } => {
            let task = engine.claim_task(&id, &actor)?;
            if cli.json {
                print_task_json(&task)?;
            } else {
                print_task_plain("Claimed", &task);
            }
        }
        Command::Start { id, actor } => {
            let task = engine.start_task(&id, &actor)?;
            if cli.json {
                print_task_json(&task)?;
            } else {
                print_task_plain("Started", &task);
            }
        }
        Command::Done { id, actor } => {
            let task = engine.complete_task(&id, &actor)?;
            if cli.json {
                print_task_json(&task)?;
            } else {
                print_task_plain("Completed", &task);
            }
        }
        Command::Approve { id, actor } => {
            let task = engine.approve_task(&id, &actor)?;
            if cli.json {
                print_task_json(&task)?;
            } else {
                println!(
                    "Approved task: {} ({}) - {} points to {}",
                    task.title,
                    task.id,
                    task.points,
                    task.assignee.as_deref().unwrap_or("-")
                );
            }
        }
        Command::Reject { id, actor, message } => {
            let task = engine.reject_task(&id, &actor, message.as_deref())?;
            if cli.json {
                print_task_json(&task)?;
            } else {
                print_task_plain("Rejected", &task);
            }
        }
        Command::Adjust {
            user,
            delta,
            admin_override,
        } => {
            let entry = engine.adjust_points(&user, delta, admin_override)?;
            if cli.json {
                let json = serde_json::to_string(&entry)
                    .map_err(|err| AppError::persistence(err.to_string()))?;
                println!("{json}");
            } else {
                println!(
                    "Adjusted points: {} {:+} (entry {})",
                    entry.user_id, entry.delta, entry.id
                );
            }
        }
        Command::Show { id } => {
            let task = engine.get_task(&id)?;
            if cli.json {
                print_task_json(&task)?;
            } else {
                print_tasks_plain(std::slice::from_ref(&task))?;
            }
        }
        Command::List { list } => {
            let mut tasks = engine.list_tasks(&TaskFilter::default())?;
            if let Some(statuses) = list_statuses(&list) {
                tasks.retain(|task| statuses.contains(&task.status));
            }
            if cli.json {
                print_tasks_json(&tasks)?;
            } else {
                print_tasks_plain(&tasks)?;
            }
        }
        Command::Stats { user } => {
            let stats = engine.get_user_stats(&user)?;
            if cli.json {
                let json = serde_json::to_string(&stats)
                    .map_err(|err| AppError::persistence(err.to_string()))?;
                println!("{json}");
            } else {
                print_stats_plain(&stats);
            }
        }
        Command::Leaderboard { group, window } => {
            let window = match window.as_deref() {
                Some(raw) => Window::parse(raw)
                    .ok_or_else(|| AppError::validation(format!("unknown window '{raw}'")))?,
                None => Window::Week,
            };
            let entries = engine.get_leaderboard(&group, window)?;
            if cli.json {
                let json = serde_json::to_string(&entries)
                    .map_err(|err| AppError::persistence(err.to_string()))?;
                println!("{json}");
            } else {
                print_leaderboard_plain(&entries);
            }
        }
    }

    Ok(())
}

fn run_interactive() -> Result<(), AppError> {
    let mut input = String::new();
    let stdin = io::stdin();
    let mut stdin_lock = stdin.lock();

    loop {
        input.clear();
        let bytes = stdin_lock
            .read_line(&mut input)
            .map_err(|err| AppError::persistence(err.to_string()))?;

        if bytes == 0 {
            break;
        }

        let line = input.trim();
        if line.is_empty() {
            continue;
        }

        if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
            break;
        }

        if line == "help" || line == "?" {
            print_help();
            continue;
        }

        let args = match split_command_line(line) {
            Ok(args) => args,
            Err(err) => {
                eprintln!("ERROR: {}", err);
                continue;
            }
        };

        if args.is_empty() {
            continue;
        }

        let mut argv = Vec::with_capacity(args.len() + 1);
        argv.push("chores".to_string());
        argv.extend(args);

        let cli = match Cli::try_parse_from(argv) {
            Ok(cli) => cli,
            Err(err) => {
                eprintln!("ERROR: {}", normalize_parse_error(err));
                continue;
            }
        };

        if let Err(err) = run_command(cli) {
            eprintln!("ERROR: {}", err);
        }
    }

    Ok(())
}

fn main() {
    let mut args = std::env::args_os();
    args.next();
    if args.next().is_none() {
        if let Err(err) = run_interactive() {
            eprintln!("ERROR: {}", err);
            std::process::exit(1);
        }
        return;
    }

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            eprintln!("ERROR: {}", normalize_parse_error(err));
            std::process::exit(1);
        }
    };

    if let Err(err) = run_command(cli) {
        eprintln!("ERROR: {}", err);
        std::process::exit(1);
    }
}
