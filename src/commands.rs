//! Inbound command surface: the operations the presentation layer dispatches
//! into the core. Every mutation or view-parameter change synchronously
//! recomputes the view and statistics and pushes them to the event sink.

use chrono::{Local, NaiveDate};

use crate::events::StatePayload;
use crate::models::{SortKey, SuggestedTask, Task, TaskDraft, TaskFilter, TaskPriority};
use crate::state::TaskStore;
use crate::view::{derive_view, summarize, TaskStats};

#[derive(Debug, serde::Serialize)]
pub struct CommandResult<T> {
    pub ok: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

/// Outbound channel to the presentation layer. The embedding shell decides
/// what "emit" means (a UI event bus, a webview event, a test recorder).
pub trait EventSink {
    fn state_updated(&self, payload: StatePayload);
}

fn ok<T>(data: T) -> CommandResult<T> {
    CommandResult {
        ok: true,
        data: Some(data),
        error: None,
    }
}

fn err<T>(message: &str) -> CommandResult<T> {
    CommandResult {
        ok: false,
        data: None,
        error: Some(message.to_string()),
    }
}

fn today_local() -> NaiveDate {
    Local::now().date_naive()
}

fn notify(sink: &impl EventSink, store: &TaskStore) {
    let tasks = store.tasks();
    let query = store.view_query();
    sink.state_updated(StatePayload {
        tasks: derive_view(&tasks, &query),
        stats: summarize(&tasks, today_local()),
    });
}

/// Validates and adds a single user-entered task. A blank title is rejected
/// before the store is touched; no partial task is ever constructed.
pub fn create_task(
    sink: &impl EventSink,
    store: &TaskStore,
    title: &str,
    description: &str,
    priority: TaskPriority,
    due_date: Option<NaiveDate>,
) -> CommandResult<Task> {
    let title = title.trim();
    if title.is_empty() {
        return err("task title must not be empty");
    }
    let task = store.add(TaskDraft {
        title: title.to_string(),
        description: description.trim().to_string(),
        priority,
        due_date,
    });
    log::debug!("task created id={} priority={:?}", task.id, task.priority);
    notify(sink, store);
    ok(task)
}

/// Commits AI-suggested drafts as real tasks, all at the caller-supplied
/// priority and optional shared due date. The whole batch is rejected if any
/// draft carries a blank title.
pub fn add_suggested_tasks(
    sink: &impl EventSink,
    store: &TaskStore,
    drafts: Vec<SuggestedTask>,
    priority: TaskPriority,
    due_date: Option<NaiveDate>,
) -> CommandResult<Vec<Task>> {
    if drafts.iter().any(|draft| draft.title.trim().is_empty()) {
        return err("suggested task title must not be empty");
    }
    let count = drafts.len();
    let created = store.add_many(drafts, priority, due_date);
    if count > 0 {
        log::debug!("committed {count} suggested tasks");
        notify(sink, store);
    }
    ok(created)
}

/// Flips completion. A missing id is already-consistent state, not an error.
pub fn toggle_task(sink: &impl EventSink, store: &TaskStore, task_id: &str) -> CommandResult<bool> {
    store.toggle(task_id);
    notify(sink, store);
    ok(true)
}

/// Deletes by id; tolerant of ids that are already gone.
pub fn delete_task(sink: &impl EventSink, store: &TaskStore, task_id: &str) -> CommandResult<bool> {
    store.remove(task_id);
    notify(sink, store);
    ok(true)
}

/// Updates the active filter and returns the recomputed view.
pub fn set_filter(
    sink: &impl EventSink,
    store: &TaskStore,
    filter: TaskFilter,
) -> CommandResult<Vec<Task>> {
    store.set_filter(filter);
    notify(sink, store);
    ok(derive_view(&store.tasks(), &store.view_query()))
}

/// Updates the sort key/direction and returns the recomputed view.
pub fn set_sort(
    sink: &impl EventSink,
    store: &TaskStore,
    sort_key: SortKey,
    ascending: bool,
) -> CommandResult<Vec<Task>> {
    store.set_sort(sort_key, ascending);
    notify(sink, store);
    ok(derive_view(&store.tasks(), &store.view_query()))
}

/// Current filtered/ordered list under the stored view parameters.
pub fn current_view(store: &TaskStore) -> CommandResult<Vec<Task>> {
    ok(derive_view(&store.tasks(), &store.view_query()))
}

/// Dashboard statistics against the local calendar day.
pub fn dashboard_stats(store: &TaskStore) -> CommandResult<TaskStats> {
    ok(summarize(&store.tasks(), today_local()))
}
