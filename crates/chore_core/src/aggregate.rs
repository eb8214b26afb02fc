use crate::config::EngineConfig;
use crate::error::AppError;
use crate::model::{PointsEntry, Task, TaskStatus, UserStats};
use std::collections::BTreeSet;
use time::format_description::well_known::Rfc3339;
use time::{Date, Duration, Month, OffsetDateTime, Weekday};

/// Rebuild a user's aggregate from scratch. Pure: the result depends only on
/// the ledger entries, the assigned tasks, `now`, and the calendar settings,
/// so repeated calls over the same snapshot agree bit for bit.
pub fn compute_user_stats(
    entries: &[PointsEntry],
    tasks: &[Task],
    user_id: &str,
    now: OffsetDateTime,
    config: &EngineConfig,
) -> Result<UserStats, AppError> {
    let today = now.to_offset(config.utc_offset).date();
    let week_start = window_start(week_start_date(today, config.week_start), config);
    let month_start = window_start(
        today
            .replace_day(1)
            .map_err(|err| AppError::persistence(err.to_string()))?,
        config,
    );
    let year_start = window_start(
        Date::from_calendar_date(today.year(), Month::January, 1)
            .map_err(|err| AppError::persistence(err.to_string()))?,
        config,
    );

    let mut stats = UserStats::empty(user_id);
    let mut last_activity: Option<(OffsetDateTime, String)> = None;

    for entry in entries {
        if entry.user_id != user_id {
            continue;
        }
        let at = OffsetDateTime::parse(&entry.created_at, &Rfc3339).map_err(|_| {
            AppError::persistence(format!("ledger entry {} has a bad timestamp", entry.id))
        })?;

        stats.total_points += entry.delta;
        if at >= week_start {
            stats.week_points += entry.delta;
        }
        if at >= month_start {
            stats.month_points += entry.delta;
        }
        if at >= year_start {
            stats.year_points += entry.delta;
        }
        track_latest(&mut last_activity, at, &entry.created_at);
    }

    let mut approval_dates: BTreeSet<Date> = BTreeSet::new();
    for task in tasks {
        if task.assignee.as_deref() != Some(user_id) {
            continue;
        }
        stats.total_tasks += 1;
        if task.status == TaskStatus::Approved {
            stats.completed_tasks += 1;
            let approved_at = task.approved_at.as_deref().ok_or_else(|| {
                AppError::persistence(format!("task {} is approved without a timestamp", task.id))
            })?;
            let at = OffsetDateTime::parse(approved_at, &Rfc3339).map_err(|_| {
                AppError::persistence(format!("task {} has a bad approval timestamp", task.id))
            })?;
            approval_dates.insert(at.to_offset(config.utc_offset).date());
        }
        if let Some(completed_at) = task.completed_at.as_deref() {
            let at = OffsetDateTime::parse(completed_at, &Rfc3339).map_err(|_| {
                AppError::persistence(format!("task {} has a bad completion timestamp", task.id))
            })?;
            track_latest(&mut last_activity, at, completed_at);
        }
    }

    let (current_streak, best_streak) = streaks(&approval_dates, today);
    stats.current_streak = current_streak;
    stats.best_streak = best_streak;
    stats.last_activity = last_activity.map(|(_, raw)| raw);

    Ok(stats)
}

fn track_latest(
    latest: &mut Option<(OffsetDateTime, String)>,
    at: OffsetDateTime,
    raw: &str,
) {
    match latest {
        Some((best, _)) if *best >= at => {}
        _ => *latest = Some((at, raw.to_string())),
    }
}

/// First day of the week containing `today`, for the configured start day.
fn week_start_date(today: Date, week_start: Weekday) -> Date {
    let days_back = (i64::from(today.weekday().number_days_from_monday())
        - i64::from(week_start.number_days_from_monday()))
    .rem_euclid(7);
    today - Duration::days(days_back)
}

fn window_start(date: Date, config: &EngineConfig) -> OffsetDateTime {
    date.midnight().assume_offset(config.utc_offset)
}

/// Walks the distinct approval dates once. `best` is the longest consecutive
/// run anywhere in the set, not just the most recent one; `current` counts
/// back from the latest date and is zero when that date is older than
/// yesterday (the streak has gone cold).
fn streaks(dates: &BTreeSet<Date>, today: Date) -> (u32, u32) {
    let mut best = 0u32;
    let mut run = 0u32;
    let mut prev: Option<Date> = None;
    for &date in dates {
        run = match prev {
            Some(previous) if previous.next_day() == Some(date) => run + 1,
            _ => 1,
        };
        best = best.max(run);
        prev = Some(date);
    }

    let mut current = 0u32;
    if let Some(&latest) = dates.iter().next_back()
        && (latest == today || Some(latest) == today.previous_day())
    {
        current = 1;
        let mut cursor = latest;
        while let Some(previous) = cursor.previous_day() {
            if !dates.contains(&previous) {
                break;
            }
            current += 1;
            cursor = previous;
        }
    }

    (current, best)
}
