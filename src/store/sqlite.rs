//! SQLite-backed task store.
//!
//! A single connection sits behind a mutex; every call runs on the blocking
//! pool so request handlers and the reconciler never stall the async runtime.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{StoreError, StoreResult, TaskStore};
use crate::task::{format_timestamp, state_on_edit, NewTask, Priority, Task, TaskUpdate};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS tasks (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    description TEXT,
    priority TEXT,
    due_date TEXT,
    labels TEXT,
    created_at TEXT,
    updated_at TEXT,
    is_overdue INTEGER NOT NULL DEFAULT 0
);
";

const SELECT_COLUMNS: &str =
    "SELECT id, title, description, priority, due_date, labels, created_at, updated_at, is_overdue FROM tasks";

const PRIORITY_ORDER: &str = "ORDER BY CASE priority
    WHEN 'High' THEN 1
    WHEN 'Medium' THEN 2
    WHEN 'Low' THEN 3
    ELSE 4
END, created_at";

pub struct SqliteTaskStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteTaskStore {
    /// Open (or create) the database at `path`. `":memory:"` opens an
    /// in-memory database.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let conn = if path == Path::new(":memory:") {
            Connection::open_in_memory()?
        } else {
            Connection::open(path)?
        };
        let store = Self::from_connection(conn)?;
        tracing::info!("Opened task database at {}", path.display());
        Ok(store)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> StoreResult<Self> {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| StoreError::Worker("connection mutex poisoned".to_string()))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| StoreError::Worker(e.to_string()))?
    }

    /// Overwrite the stored due date text verbatim, bypassing validation.
    #[cfg(test)]
    pub(crate) async fn set_raw_due_date(&self, id: Uuid, raw: &str) -> StoreResult<()> {
        let raw = raw.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "UPDATE tasks SET due_date = ?1 WHERE id = ?2",
                params![raw, id.to_string()],
            )?;
            Ok(())
        })
        .await
    }
}

/// Column values as stored, before validation.
struct RawTask {
    id: String,
    title: String,
    description: Option<String>,
    priority: Option<String>,
    due_date: Option<String>,
    labels: Option<String>,
    created_at: Option<String>,
    updated_at: Option<String>,
    is_overdue: bool,
}

impl RawTask {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            priority: row.get(3)?,
            due_date: row.get(4)?,
            labels: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
            is_overdue: row.get(8)?,
        })
    }

    fn into_task(self) -> StoreResult<Task> {
        let corrupt = |reason: String| StoreError::CorruptRow {
            id: self.id.clone(),
            reason,
        };

        let id = Uuid::parse_str(&self.id).map_err(|e| corrupt(format!("bad id: {}", e)))?;
        let priority = match self.priority.as_deref() {
            None | Some("") => Priority::default(),
            Some(p) => p.parse().map_err(corrupt)?,
        };
        let created_at = parse_stored_timestamp(self.created_at.as_deref()).map_err(corrupt)?;
        let updated_at = parse_stored_timestamp(self.updated_at.as_deref()).map_err(corrupt)?;

        Ok(Task {
            id,
            title: self.title,
            description: self.description.unwrap_or_default(),
            priority,
            due_date: self.due_date.filter(|d| !d.is_empty()),
            labels: split_labels(self.labels.as_deref()),
            is_overdue: self.is_overdue,
            created_at,
            updated_at,
        })
    }
}

fn parse_stored_timestamp(raw: Option<&str>) -> Result<DateTime<Utc>, String> {
    let raw = raw.ok_or_else(|| "missing timestamp".to_string())?;
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| format!("bad timestamp {:?}: {}", raw, e))
}

fn split_labels(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

fn join_labels(labels: &[String]) -> String {
    labels.join(",")
}

fn select_by_id(conn: &Connection, id: Uuid) -> StoreResult<Option<Task>> {
    let raw = conn
        .query_row(
            &format!("{} WHERE id = ?1", SELECT_COLUMNS),
            params![id.to_string()],
            RawTask::from_row,
        )
        .optional()?;
    raw.map(RawTask::into_task).transpose()
}

#[async_trait]
impl TaskStore for SqliteTaskStore {
    async fn fetch_all_tasks(&self) -> StoreResult<Vec<Task>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{} {}", SELECT_COLUMNS, PRIORITY_ORDER))?;
            let rows = stmt.query_map([], RawTask::from_row)?;

            let mut tasks = Vec::new();
            for row in rows {
                match row?.into_task() {
                    Ok(task) => tasks.push(task),
                    // One bad row must not hide the rest of the table.
                    Err(e) => tracing::warn!("Skipping unreadable task row: {}", e),
                }
            }
            Ok(tasks)
        })
        .await
    }

    async fn update_task_derived_state(
        &self,
        id: Uuid,
        priority: Priority,
        is_overdue: bool,
    ) -> StoreResult<()> {
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE tasks SET priority = ?1, is_overdue = ?2, updated_at = ?3 WHERE id = ?4",
                params![
                    priority.as_str(),
                    is_overdue,
                    format_timestamp(&Utc::now()),
                    id.to_string()
                ],
            )?;
            if changed == 0 {
                return Err(StoreError::Missing(id));
            }
            Ok(())
        })
        .await
    }

    async fn create_task(&self, new_task: NewTask) -> StoreResult<Task> {
        self.with_conn(move |conn| {
            let now = Utc::now();
            let (priority, is_overdue) = state_on_edit(new_task.priority, new_task.due_date, now);
            let task = Task {
                id: Uuid::new_v4(),
                title: new_task.title,
                description: new_task.description,
                priority,
                due_date: new_task.due_date.as_ref().map(format_timestamp),
                labels: new_task.labels,
                is_overdue,
                created_at: now,
                updated_at: now,
            };
            conn.execute(
                "INSERT INTO tasks (id, title, description, priority, due_date, labels, created_at, updated_at, is_overdue)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    task.id.to_string(),
                    task.title,
                    task.description,
                    task.priority.as_str(),
                    task.due_date,
                    join_labels(&task.labels),
                    format_timestamp(&task.created_at),
                    format_timestamp(&task.updated_at),
                    task.is_overdue,
                ],
            )?;
            // Round-trip through storage so the returned timestamps match what
            // later reads will see.
            select_by_id(conn, task.id)?.ok_or_else(|| StoreError::CorruptRow {
                id: task.id.to_string(),
                reason: "row missing after insert".to_string(),
            })
        })
        .await
    }

    async fn get_task(&self, id: Uuid) -> StoreResult<Option<Task>> {
        self.with_conn(move |conn| select_by_id(conn, id)).await
    }

    async fn update_task(&self, id: Uuid, update: TaskUpdate) -> StoreResult<Option<Task>> {
        self.with_conn(move |conn| {
            let now = Utc::now();
            let (priority, is_overdue) = state_on_edit(update.priority, update.due_date, now);
            let changed = conn.execute(
                "UPDATE tasks SET title = ?1, description = ?2, priority = ?3, due_date = ?4, labels = ?5,
                 is_overdue = ?6, updated_at = ?7
                 WHERE id = ?8",
                params![
                    update.title,
                    update.description,
                    priority.as_str(),
                    update.due_date.as_ref().map(format_timestamp),
                    join_labels(&update.labels),
                    is_overdue,
                    format_timestamp(&now),
                    id.to_string()
                ],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            select_by_id(conn, id)
        })
        .await
    }

    async fn delete_task(&self, id: Uuid) -> StoreResult<bool> {
        self.with_conn(move |conn| {
            let deleted = conn.execute("DELETE FROM tasks WHERE id = ?1", params![id.to_string()])?;
            Ok(deleted > 0)
        })
        .await
    }
}
