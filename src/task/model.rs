//! Task record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Priority tier of a task.
///
/// Once a task has a due date this is derived state owned by the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Priority {
    #[default]
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Low" => Ok(Self::Low),
            "Medium" => Ok(Self::Medium),
            "High" => Ok(Self::High),
            other => Err(format!(
                "invalid priority: {}. Valid values are: Low, Medium, High",
                other
            )),
        }
    }
}

/// A task stored in the database.
///
/// `due_date` is kept as the stored RFC 3339 text so a malformed value written
/// by another client surfaces as a per-task parse failure rather than a failed
/// read of the whole table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub priority: Priority,
    pub due_date: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    pub is_overdue: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Parse the due date, if any.
    pub fn parsed_due_date(&self) -> Option<Result<DateTime<Utc>, chrono::ParseError>> {
        self.due_date.as_deref().filter(|d| !d.is_empty()).map(parse_due_date)
    }
}

/// Fields accepted when creating a task.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub due_date: Option<DateTime<Utc>>,
    pub labels: Vec<String>,
}

/// Full replacement of the user-editable fields of a task.
#[derive(Debug, Clone)]
pub struct TaskUpdate {
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub due_date: Option<DateTime<Utc>>,
    pub labels: Vec<String>,
}

pub fn parse_due_date(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw).map(|d| d.with_timezone(&Utc))
}

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_parses_known_values_only() {
        assert_eq!("High".parse::<Priority>(), Ok(Priority::High));
        assert_eq!("Low".parse::<Priority>(), Ok(Priority::Low));
        assert!("urgent".parse::<Priority>().is_err());
        assert!("high".parse::<Priority>().is_err());
    }

    #[test]
    fn priority_serializes_capitalized() {
        let json = serde_json::to_string(&Priority::Medium).unwrap();
        assert_eq!(json, "\"Medium\"");
    }

    #[test]
    fn empty_due_date_is_treated_as_absent() {
        let now = Utc::now();
        let task = Task {
            id: Uuid::new_v4(),
            title: "t".to_string(),
            description: String::new(),
            priority: Priority::Low,
            due_date: Some(String::new()),
            labels: Vec::new(),
            is_overdue: false,
            created_at: now,
            updated_at: now,
        };
        assert!(task.parsed_due_date().is_none());
    }

    #[test]
    fn timestamps_keep_utc_offset() {
        let ts = parse_due_date("2026-10-14T08:30:00+02:00").unwrap();
        assert_eq!(format_timestamp(&ts), "2026-10-14T06:30:00Z");
    }
}
