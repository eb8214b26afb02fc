use crate::model::UserStats;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Window {
    Week,
    Month,
    All,
}

impl Window {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Week => "week",
            Self::Month => "month",
            Self::All => "all",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "week" | "weekly" => Some(Self::Week),
            "month" | "monthly" => Some(Self::Month),
            "all" | "total" => Some(Self::All),
            _ => None,
        }
    }

    fn points_of(self, stats: &UserStats) -> i64 {
        match self {
            Self::Week => stats.week_points,
            Self::Month => stats.month_points,
            Self::All => stats.total_points,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub user_id: String,
    pub points: i64,
    pub completed_tasks: u32,
    pub rank: u32,
}

/// Order a cohort's stats for the requested window. Points descending, then
/// completed tasks descending, then user id ascending; the tie-break chain
/// fully orders the entries, so ranks are dense sequential 1..n and a rerun
/// over the same stats reproduces the same sequence.
pub fn rank_users(stats: &[UserStats], window: Window) -> Vec<LeaderboardEntry> {
    let mut rows: Vec<LeaderboardEntry> = stats
        .iter()
        .map(|user_stats| LeaderboardEntry {
            user_id: user_stats.user_id.clone(),
            points: window.points_of(user_stats),
            completed_tasks: user_stats.completed_tasks,
            rank: 0,
        })
        .collect();

    rows.sort_by(|a, b| {
        b.points
            .cmp(&a.points)
            .then(b.completed_tasks.cmp(&a.completed_tasks))
            .then(a.user_id.cmp(&b.user_id))
    });

    for (index, row) in rows.iter_mut().enumerate() {
        row.rank = index as u32 + 1;
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::{Window, rank_users};
    use crate::model::UserStats;

    fn stats(user: &str, total: i64, week: i64, completed: u32) -> UserStats {
        UserStats {
            total_points: total,
            week_points: week,
            month_points: total,
            completed_tasks: completed,
            ..UserStats::empty(user)
        }
    }

    #[test]
    fn equal_points_break_on_completed_tasks_with_dense_ranks() {
        let cohort = vec![
            stats("user-a", 30, 30, 2),
            stats("user-b", 30, 30, 5),
            stats("user-c", 10, 10, 1),
        ];

        let ranked = rank_users(&cohort, Window::All);

        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0].user_id, "user-b");
        assert_eq!(ranked[0].points, 30);
        assert_eq!(ranked[0].rank, 1);
        assert_eq!(ranked[1].user_id, "user-a");
        assert_eq!(ranked[1].rank, 2);
        assert_eq!(ranked[2].user_id, "user-c");
        assert_eq!(ranked[2].rank, 3);
    }

    #[test]
    fn full_ties_fall_back_to_user_id() {
        let cohort = vec![stats("zoe", 20, 20, 3), stats("amy", 20, 20, 3)];

        let ranked = rank_users(&cohort, Window::All);

        assert_eq!(ranked[0].user_id, "amy");
        assert_eq!(ranked[0].rank, 1);
        assert_eq!(ranked[1].user_id, "zoe");
        assert_eq!(ranked[1].rank, 2);
    }

    #[test]
    fn window_selects_the_right_points_column() {
        let cohort = vec![stats("user-a", 100, 5, 1), stats("user-b", 50, 40, 1)];

        let all_time = rank_users(&cohort, Window::All);
        assert_eq!(all_time[0].user_id, "user-a");

        let weekly = rank_users(&cohort, Window::Week);
        assert_eq!(weekly[0].user_id, "user-b");
        assert_eq!(weekly[0].points, 40);
    }

    #[test]
    fn rerun_is_deterministic() {
        let cohort = vec![
            stats("user-a", 30, 30, 2),
            stats("user-b", 30, 30, 2),
            stats("user-c", 30, 30, 2),
        ];

        let first = rank_users(&cohort, Window::All);
        let second = rank_users(&cohort, Window::All);
        assert_eq!(first, second);
    }

    #[test]
    fn empty_cohort_ranks_to_nothing() {
        assert!(rank_users(&[], Window::Week).is_empty());
    }

    #[test]
    fn window_parse_accepts_aliases() {
        assert_eq!(Window::parse("week"), Some(Window::Week));
        assert_eq!(Window::parse("Monthly"), Some(Window::Month));
        assert_eq!(Window::parse("ALL"), Some(Window::All));
        assert_eq!(Window::parse("decade"), None);
    }
}
