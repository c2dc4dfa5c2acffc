//! Core of a personal task manager with an AI assistant panel.
//!
//! Task state lives in memory for the life of the session ([`state::TaskStore`]);
//! the pure [`view`] module derives the filtered/ordered list and dashboard
//! statistics from snapshots of it; [`ai`] talks to the generative-language API
//! and turns free-form model output into task drafts. Presentation is an
//! external collaborator reached through [`commands`] and the
//! [`commands::EventSink`] trait.

pub mod ai;
pub mod commands;
pub mod events;
pub mod logging;
pub mod models;
pub mod state;
pub mod view;

pub use ai::{AiError, GeminiClient, RequestToken, ResponseSlot};
pub use models::{SortKey, SuggestedTask, Task, TaskFilter, TaskPriority, ViewQuery};
pub use state::TaskStore;
pub use view::{derive_view, summarize, TaskStats};
