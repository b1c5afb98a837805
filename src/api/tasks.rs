//! Task CRUD endpoints.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::task::{derive_state, parse_due_date, NewTask, Priority, Task, TaskUpdate};

use super::export;
use super::routes::AppState;
use super::types::{ApiError, CreateTaskRequest, MessageResponse, UpdateTaskRequest};

/// Create the task routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_tasks).post(create_task))
        .route("/export", get(export::export_tasks))
        .route("/:id", get(get_task).put(update_task).delete(delete_task))
}

fn parse_priority(raw: Option<String>) -> Result<Option<Priority>, ApiError> {
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(p) => p.parse::<Priority>().map(Some).map_err(ApiError::BadRequest),
    }
}

fn parse_due(raw: Option<String>) -> Result<Option<DateTime<Utc>>, ApiError> {
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(d) => parse_due_date(d).map(Some).map_err(|e| {
            ApiError::BadRequest(format!(
                "invalid due_date {:?}: expected an RFC 3339 timestamp ({})",
                d, e
            ))
        }),
    }
}

fn require_title(title: &str) -> Result<String, ApiError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ApiError::BadRequest("title is required".to_string()));
    }
    Ok(title.to_string())
}

fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    // An id that is not a UUID cannot name a stored task.
    Uuid::parse_str(raw).map_err(|_| ApiError::NotFound)
}

/// POST /tasks - Create a task.
///
/// Without an explicit priority the task starts in the bucket its due date
/// implies. A task without a due date is always `Low`. The reconciler owns
/// priority from then on whenever a due date is set.
async fn create_task(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateTaskRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Task>), ApiError> {
    let Json(req) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let title = require_title(&req.title)?;
    let due_date = parse_due(req.due_date)?;
    let priority = match parse_priority(req.priority)? {
        Some(p) => p,
        None => due_date
            .map(|due| derive_state(due, Utc::now()).0)
            .unwrap_or_default(),
    };

    let task = state
        .store
        .create_task(NewTask {
            title,
            description: req.description,
            priority,
            due_date,
            labels: req.labels,
        })
        .await?;

    tracing::info!("Created task {} ({})", task.id, task.title);
    Ok((StatusCode::CREATED, Json(task)))
}

/// GET /tasks - List all tasks, highest priority first.
async fn list_tasks(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Task>>, ApiError> {
    Ok(Json(state.store.fetch_all_tasks().await?))
}

/// GET /tasks/:id
async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Task>, ApiError> {
    let id = parse_id(&id)?;
    state
        .store
        .get_task(id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

/// PUT /tasks/:id
async fn update_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateTaskRequest>, JsonRejection>,
) -> Result<Json<Task>, ApiError> {
    let id = parse_id(&id)?;
    let Json(req) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let title = require_title(&req.title)?;
    let due_date = parse_due(req.due_date)?;
    let priority = match parse_priority(req.priority)? {
        Some(p) => p,
        None => {
            state
                .store
                .get_task(id)
                .await?
                .ok_or(ApiError::NotFound)?
                .priority
        }
    };

    let task = state
        .store
        .update_task(
            id,
            TaskUpdate {
                title,
                description: req.description,
                priority,
                due_date,
                labels: req.labels,
            },
        )
        .await?
        .ok_or(ApiError::NotFound)?;

    tracing::info!("Updated task {}", task.id);
    Ok(Json(task))
}

/// DELETE /tasks/:id
async fn delete_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = parse_id(&id)?;
    if !state.store.delete_task(id).await? {
        return Err(ApiError::NotFound);
    }
    tracing::info!("Deleted task {}", id);
    Ok(Json(MessageResponse {
        message: "Task deleted".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_priority() {
        assert_eq!(parse_priority(None).unwrap(), None);
        assert_eq!(parse_priority(Some(" ".to_string())).unwrap(), None);
        assert_eq!(
            parse_priority(Some("Medium".to_string())).unwrap(),
            Some(Priority::Medium)
        );
        assert!(matches!(
            parse_priority(Some("urgent".to_string())),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn test_parse_due() {
        assert!(parse_due(None).unwrap().is_none());
        assert!(parse_due(Some("2026-10-20T12:00:00Z".to_string()))
            .unwrap()
            .is_some());
        assert!(matches!(
            parse_due(Some("tomorrow".to_string())),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn test_require_title() {
        assert_eq!(require_title("  plan  ").unwrap(), "plan");
        assert!(require_title("   ").is_err());
    }
}
