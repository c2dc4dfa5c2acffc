//! Derivation engine: pure filter/sort/statistics computation over task
//! snapshots. Re-run on every input change; no hidden state, no caching.

use std::cmp::Ordering;

use chrono::{Days, NaiveDate};
use serde::Serialize;

use crate::models::{SortKey, Task, TaskPriority, ViewQuery};

/// Upcoming deadlines reach through the day exactly this many days out,
/// inclusive on both ends.
pub const UPCOMING_WINDOW_DAYS: u64 = 7;

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct PriorityBreakdown {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct TaskStats {
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub active_tasks: usize,
    pub overdue_tasks: usize,
    pub upcoming_tasks: Vec<Task>,
    pub tasks_by_priority: PriorityBreakdown,
}

/// Produces the filtered, ordered list the task list renders.
///
/// Ordering happens in two phases: the primary sort (with its newest-first
/// tie-break) is computed first, then a second stable pass sinks completed
/// tasks to the bottom while preserving the relative order already
/// established inside each completion group. Completed items land last no
/// matter which sort the user picked.
pub fn derive_view(tasks: &[Task], query: &ViewQuery) -> Vec<Task> {
    let mut out: Vec<(usize, &Task)> = tasks
        .iter()
        .enumerate()
        .filter(|(_, task)| query.filter.matches(task))
        .collect();

    // Final arbiter when even created_at ties: the later-inserted task wins,
    // extending the newest-first secondary rule to insertion order.
    out.sort_by(|(a_pos, a), (b_pos, b)| {
        compare_tasks(a, b, query.sort_key, query.ascending).then_with(|| b_pos.cmp(a_pos))
    });
    // Stable partition: false sorts before true, groups keep their order.
    out.sort_by_key(|(_, task)| task.completed);
    out.into_iter().map(|(_, task)| task.clone()).collect()
}

fn compare_tasks(a: &Task, b: &Task, sort_key: SortKey, ascending: bool) -> Ordering {
    let primary = match sort_key {
        SortKey::CreatedAt => directed(a.created_at.cmp(&b.created_at), ascending),
        SortKey::Priority => directed(a.priority.rank().cmp(&b.priority.rank()), ascending),
        SortKey::DueDate => match (a.due_date, b.due_date) {
            // An absent due date sorts as infinitely far out: after every dated
            // task in BOTH directions, so the direction toggle never applies.
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (None, None) => Ordering::Equal,
            (Some(a_due), Some(b_due)) => directed(a_due.cmp(&b_due), ascending),
        },
    };

    // Stable secondary key: newer first, regardless of the primary direction.
    primary.then_with(|| b.created_at.cmp(&a.created_at))
}

fn directed(ord: Ordering, ascending: bool) -> Ordering {
    if ascending {
        ord
    } else {
        ord.reverse()
    }
}

/// Aggregate statistics for the dashboard, computed against a reference
/// calendar day (the caller's local "today").
///
/// A task due exactly `today` is upcoming, never overdue; a task due exactly
/// `UPCOMING_WINDOW_DAYS` from today is the last one inside the window.
/// Completed tasks contribute to `completed_tasks` only.
pub fn summarize(tasks: &[Task], today: NaiveDate) -> TaskStats {
    let total_tasks = tasks.len();
    let completed_tasks = tasks.iter().filter(|t| t.completed).count();
    let active_tasks = total_tasks - completed_tasks;

    let horizon = today + Days::new(UPCOMING_WINDOW_DAYS);

    let overdue_tasks = tasks
        .iter()
        .filter(|t| !t.completed && t.due_date.is_some_and(|due| due < today))
        .count();

    let mut upcoming_tasks: Vec<Task> = tasks
        .iter()
        .filter(|t| {
            !t.completed
                && t.due_date
                    .is_some_and(|due| due >= today && due <= horizon)
        })
        .cloned()
        .collect();
    // Stable sort: tasks due the same day keep their storage order.
    upcoming_tasks.sort_by_key(|t| t.due_date);

    let mut tasks_by_priority = PriorityBreakdown::default();
    for task in tasks.iter().filter(|t| !t.completed) {
        match task.priority {
            TaskPriority::High => tasks_by_priority.high += 1,
            TaskPriority::Medium => tasks_by_priority.medium += 1,
            TaskPriority::Low => tasks_by_priority.low += 1,
        }
    }

    TaskStats {
        total_tasks,
        completed_tasks,
        active_tasks,
        overdue_tasks,
        upcoming_tasks,
        tasks_by_priority,
    }
}
