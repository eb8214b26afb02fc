mod history;
mod points;
mod stats;
mod task;

pub use history::TaskHistoryRecord;
pub use points::{NewPointsEntry, PointsEntry, ReasonCode};
pub use stats::UserStats;
pub use task::{Priority, Task, TaskStatus, transition_allowed};
