use std::sync::{Arc, Mutex};

use chrono::{NaiveDate, Utc};

use crate::models::{
    SortKey, SuggestedTask, Task, TaskDraft, TaskFilter, TaskPriority, Timestamp, ViewQuery,
};

/// Owned, single-writer task store. Created at application start, dropped at
/// process exit; nothing survives a restart.
///
/// Storage order is always insertion order. Derived views impose their own
/// ordering without ever touching storage positions.
#[derive(Clone)]
pub struct TaskStore {
    inner: Arc<Mutex<StoreData>>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(StoreData {
                tasks: Vec::new(),
                view: ViewQuery::default(),
                next_seq: 0,
                last_created_at: 0,
            })),
        }
    }

    pub fn tasks(&self) -> Vec<Task> {
        let guard = self.inner.lock().expect("state poisoned");
        guard.tasks.clone()
    }

    pub fn len(&self) -> usize {
        let guard = self.inner.lock().expect("state poisoned");
        guard.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn view_query(&self) -> ViewQuery {
        let guard = self.inner.lock().expect("state poisoned");
        guard.view
    }

    pub fn set_filter(&self, filter: TaskFilter) {
        let mut guard = self.inner.lock().expect("state poisoned");
        guard.view.filter = filter;
    }

    pub fn set_sort(&self, sort_key: SortKey, ascending: bool) {
        let mut guard = self.inner.lock().expect("state poisoned");
        guard.view.sort_key = sort_key;
        guard.view.ascending = ascending;
    }

    /// Appends a new task and returns the created record. Ids are never reused;
    /// `created_at` is clamped so it never decreases across successive adds,
    /// which keeps it usable as a stable fallback ordering key.
    pub fn add(&self, draft: TaskDraft) -> Task {
        self.add_at(draft, Utc::now().timestamp_millis())
    }

    /// `add` once per draft, in input order, so ids and timestamps are assigned
    /// in that same order. Empty input is a no-op.
    pub fn add_many(
        &self,
        drafts: Vec<SuggestedTask>,
        priority: TaskPriority,
        due_date: Option<NaiveDate>,
    ) -> Vec<Task> {
        drafts
            .into_iter()
            .map(|draft| {
                self.add(TaskDraft {
                    title: draft.title,
                    description: draft.description,
                    priority,
                    due_date,
                })
            })
            .collect()
    }

    /// Flips `completed`. A missing id is a silent no-op: a toggle racing a
    /// just-finished delete is already-consistent state, not an error.
    pub fn toggle(&self, task_id: &str) {
        let mut guard = self.inner.lock().expect("state poisoned");
        if let Some(task) = guard.tasks.iter_mut().find(|t| t.id == task_id) {
            task.completed = !task.completed;
        }
    }

    /// Removes by id; silent no-op when absent.
    pub fn remove(&self, task_id: &str) {
        let mut guard = self.inner.lock().expect("state poisoned");
        guard.tasks.retain(|task| task.id != task_id);
    }

    fn add_at(&self, draft: TaskDraft, now: Timestamp) -> Task {
        let mut guard = self.inner.lock().expect("state poisoned");
        let created_at = now.max(guard.last_created_at);
        guard.last_created_at = created_at;
        let seq = guard.next_seq;
        guard.next_seq += 1;

        let task = Task {
            id: format!("{created_at}-{seq}"),
            title: draft.title,
            description: draft.description,
            priority: draft.priority,
            completed: false,
            due_date: draft.due_date,
            created_at,
        };
        guard.tasks.push(task.clone());
        task
    }
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
struct StoreData {
    tasks: Vec<Task>,
    view: ViewQuery,
    next_seq: u64,
    last_created_at: Timestamp,
}
