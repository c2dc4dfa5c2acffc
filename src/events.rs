use crate::models::Task;
use crate::view::TaskStats;

pub const EVENT_STATE_UPDATED: &str = "state_updated";

/// Pushed to the presentation layer after every mutation or view-parameter
/// change: the freshly derived view plus the dashboard statistics.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StatePayload {
    pub tasks: Vec<Task>,
    pub stats: TaskStats,
}
