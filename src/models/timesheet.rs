use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, ToSchema, FromRow)]
pub struct Timesheet {
    pub id: Uuid,
    pub user_id: Uuid,
    pub task_id: Uuid,
    pub hours: f64,
    #[schema(example = "2025-03-14")]
    pub work_date: String,
    pub status: String,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TimesheetStatusRequest {
    #[schema(example = "APPROVED")]
    pub status: String,
}

/// Hours per project over the caller's visible timesheets.
#[derive(Debug, Clone, Serialize, ToSchema, FromRow)]
pub struct ProjectHours {
    pub project_id: Uuid,
    pub hours: f64,
    pub entries: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HoursSummary {
    pub total_hours: f64,
    pub projects: Vec<ProjectHours>,
}
