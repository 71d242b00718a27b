use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::AppError;
use crate::utils::decode_string_list;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Task {
    pub id: Uuid,
    pub project_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    #[schema(example = "IN_PROGRESS")]
    pub status: String,
    #[schema(example = "HIGH")]
    pub priority: String,
    pub assignee_id: Option<Uuid>,
    #[schema(format = DateTime, example = "2025-10-15T17:00:00Z")]
    pub deadline: Option<DateTime<Utc>>,
    pub estimated_hours: Option<f64>,
    pub logged_hours: f64,
    pub position: i64,
    pub cover_image: Option<String>,
    pub images: Vec<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbTask {
    pub id: Uuid,
    pub project_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub priority: String,
    pub assignee_id: Option<Uuid>,
    pub deadline: Option<DateTime<Utc>>,
    pub estimated_hours: Option<f64>,
    pub logged_hours: f64,
    pub position: i64,
    pub cover_image: Option<String>,
    pub images: String,
    pub updated_at: Option<DateTime<Utc>>,
}

pub const TASK_STATUSES: [&str; 4] = ["TODO", "IN_PROGRESS", "REVIEW", "DONE"];
pub const TASK_PRIORITIES: [&str; 4] = ["LOW", "MEDIUM", "HIGH", "URGENT"];

/// Column list matching [`DbTask`], qualified with the `t` alias.
pub const TASK_COLUMNS: &str = "t.id, t.project_id, t.title, t.description, t.status, t.priority, t.assignee_id, \
     t.deadline, t.estimated_hours, t.logged_hours, t.position, t.cover_image, t.images, t.updated_at";

impl TryFrom<DbTask> for Task {
    type Error = AppError;

    fn try_from(value: DbTask) -> Result<Self, Self::Error> {
        Ok(Task {
            id: value.id,
            project_id: value.project_id,
            title: value.title,
            description: value.description,
            status: value.status,
            priority: value.priority,
            assignee_id: value.assignee_id,
            deadline: value.deadline,
            estimated_hours: value.estimated_hours,
            logged_hours: value.logged_hours,
            position: value.position,
            cover_image: value.cover_image,
            images: decode_string_list(&value.images)?,
            updated_at: value.updated_at,
        })
    }
}

/// Partial task update. Absent keys are left untouched.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct TaskUpdateRequest {
    #[schema(example = "Wire up invoice export")]
    pub title: Option<String>,
    pub description: Option<String>,
    #[schema(example = "DONE")]
    pub status: Option<String>,
    #[schema(example = "LOW")]
    pub priority: Option<String>,
    pub assignee_id: Option<Uuid>,
    #[schema(format = DateTime, example = "2025-10-15T17:00:00Z")]
    pub deadline: Option<DateTime<Utc>>,
    pub estimated_hours: Option<f64>,
    pub logged_hours: Option<f64>,
    pub position: Option<i64>,
    pub cover_image: Option<String>,
    pub images: Option<Vec<String>>,
}

impl TaskUpdateRequest {
    /// Decodes a raw payload, reporting the offending key path on failure.
    pub fn from_payload(payload: &Map<String, Value>) -> Result<Self, AppError> {
        let value = Value::Object(payload.clone());
        serde_path_to_error::deserialize(value)
            .map_err(|err| AppError::bad_request(format!("invalid task update at `{}`: {}", err.path(), err.inner())))
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if matches!(self.logged_hours, Some(h) if h < 0.0) {
            return Err(AppError::bad_request("logged_hours must be >= 0"));
        }
        if matches!(self.estimated_hours, Some(h) if h < 0.0) {
            return Err(AppError::bad_request("estimated_hours must be >= 0"));
        }
        if let Some(status) = &self.status {
            if !TASK_STATUSES.contains(&status.as_str()) {
                return Err(AppError::bad_request(format!("unknown task status {status}")));
            }
        }
        if let Some(priority) = &self.priority {
            if !TASK_PRIORITIES.contains(&priority.as_str()) {
                return Err(AppError::bad_request(format!("unknown task priority {priority}")));
            }
        }
        if matches!(&self.title, Some(t) if t.trim().is_empty()) {
            return Err(AppError::bad_request("title must not be empty"));
        }
        Ok(())
    }
}
