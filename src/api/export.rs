//! Task export as a JSON or CSV attachment.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
};

use crate::task::{format_timestamp, Task};

use super::routes::AppState;
use super::types::{ApiError, ExportQuery};

const CSV_HEADER: [&str; 9] = [
    "ID",
    "Title",
    "Description",
    "Priority",
    "DueDate",
    "Labels",
    "IsOverdue",
    "CreatedAt",
    "UpdatedAt",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    fn parse(raw: Option<&str>) -> Result<Self, ApiError> {
        match raw.map(str::trim) {
            None | Some("") | Some("json") => Ok(Self::Json),
            Some("csv") => Ok(Self::Csv),
            Some(_) => Err(ApiError::BadRequest(
                "Invalid format. Use 'json' or 'csv'".to_string(),
            )),
        }
    }
}

/// GET /tasks/export?format=json|csv
pub async fn export_tasks(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, ApiError> {
    let format = ExportFormat::parse(query.format.as_deref())?;
    let tasks = state.store.fetch_all_tasks().await?;

    let (content_type, filename, body) = match format {
        ExportFormat::Json => (
            "application/json",
            "tasks.json",
            serde_json::to_vec(&tasks)
                .map_err(|e| ApiError::Internal(format!("Failed to export tasks to JSON: {}", e)))?,
        ),
        ExportFormat::Csv => ("text/csv", "tasks.csv", tasks_to_csv(&tasks)?),
    };

    tracing::debug!("Exported {} tasks as {}", tasks.len(), filename);

    Ok((
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={}", filename),
            ),
        ],
        body,
    )
        .into_response())
}

fn tasks_to_csv(tasks: &[Task]) -> Result<Vec<u8>, ApiError> {
    let csv_error = |e: csv::Error| ApiError::Internal(format!("Failed to write CSV: {}", e));

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADER).map_err(csv_error)?;
    for task in tasks {
        writer
            .write_record([
                task.id.to_string(),
                task.title.clone(),
                task.description.clone(),
                task.priority.to_string(),
                task.due_date.clone().unwrap_or_default(),
                task.labels.join(","),
                task.is_overdue.to_string(),
                format_timestamp(&task.created_at),
                format_timestamp(&task.updated_at),
            ])
            .map_err(csv_error)?;
    }
    writer
        .into_inner()
        .map_err(|e| ApiError::Internal(format!("Failed to write CSV: {}", e)))
}
