//! Task persistence.
//!
//! `TaskStore` is the narrow contract the HTTP handlers and the reconciler
//! share. The SQLite implementation is the only production backend.

mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::task::{NewTask, Priority, Task, TaskUpdate};

pub use sqlite::SqliteTaskStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("corrupt row for task {id}: {reason}")]
    CorruptRow { id: String, reason: String },

    #[error("task {0} no longer exists")]
    Missing(Uuid),

    #[error("store worker failed: {0}")]
    Worker(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Read/write contract over the `tasks` table.
///
/// Each method is its own atomic unit; callers add no transaction boundary.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Every task, ordered High > Medium > Low.
    async fn fetch_all_tasks(&self) -> StoreResult<Vec<Task>>;

    /// Targeted write of the reconciler-owned fields. Also bumps `updated_at`.
    ///
    /// Fails with `StoreError::Missing` when the task was deleted meanwhile.
    async fn update_task_derived_state(
        &self,
        id: Uuid,
        priority: Priority,
        is_overdue: bool,
    ) -> StoreResult<()>;

    /// A task without a due date is stored as `Low` and not overdue.
    async fn create_task(&self, new_task: NewTask) -> StoreResult<Task>;

    async fn get_task(&self, id: Uuid) -> StoreResult<Option<Task>>;

    /// Returns `None` when no task has this id. Re-derives `is_overdue` from
    /// the new due date, and forces `Low` when the due date is cleared.
    async fn update_task(&self, id: Uuid, update: TaskUpdate) -> StoreResult<Option<Task>>;

    /// Returns whether a row was deleted.
    async fn delete_task(&self, id: Uuid) -> StoreResult<bool>;
}

/// Shared store handle for handlers and background loops.
pub type SharedTaskStore = Arc<dyn TaskStore>;
