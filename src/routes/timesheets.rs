use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use sqlx::{QueryBuilder, Sqlite};
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{Action, ResourceKind, ScopeQuery};
use crate::db::scope_sql::push_predicate;
use crate::errors::{AppError, AppResult};
use crate::models::timesheet::{Timesheet, TimesheetStatusRequest};

pub const TIMESHEET_STATUSES: [&str; 4] = ["DRAFT", "SUBMITTED", "APPROVED", "REJECTED"];

const TIMESHEET_SELECT: &str = "SELECT ts.id, ts.user_id, ts.task_id, ts.hours, ts.work_date, ts.status, ts.note \
     FROM timesheets ts JOIN tasks tk ON tk.id = ts.task_id WHERE tk.deleted_at IS NULL AND ";

#[utoipa::path(
    get,
    path = "/timesheets",
    tag = "Timesheets",
    params(
        ("user_id" = Option<Uuid>, Query, description = "Only this user's entries (ignored for team members)"),
        ("task_id" = Option<Uuid>, Query, description = "Only entries for this task"),
        ("project_id" = Option<Uuid>, Query, description = "Only entries for tasks of this project")
    ),
    responses((status = 200, description = "Visible timesheets, newest first", body = [Timesheet]))
)]
pub async fn list_timesheets(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ScopeQuery>,
) -> AppResult<Json<Vec<Timesheet>>> {
    let principal = state.gate.authorize(&headers, ResourceKind::Timesheets, Action::Read).await?;
    let predicate = state.scoper.scope_filter(&principal, ResourceKind::Timesheets, &query)?;

    let mut qb = QueryBuilder::<Sqlite>::new(TIMESHEET_SELECT);
    push_predicate(&mut qb, ResourceKind::Timesheets, &predicate)?;
    qb.push(" ORDER BY ts.work_date DESC");

    let rows = qb.build_query_as::<Timesheet>().fetch_all(&state.pool).await?;
    Ok(Json(rows))
}

#[utoipa::path(
    patch,
    path = "/timesheets/{id}/status",
    tag = "Timesheets",
    params(("id" = Uuid, Path, description = "Timesheet id")),
    request_body = TimesheetStatusRequest,
    responses(
        (status = 200, description = "Status changed", body = Timesheet),
        (status = 403, description = "Role may not set this status"),
        (status = 404, description = "Timesheet not visible")
    )
)]
pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(payload): Json<TimesheetStatusRequest>,
) -> AppResult<Json<Timesheet>> {
    let principal = state.gate.authorize(&headers, ResourceKind::Timesheets, Action::Update).await?;

    let status = payload.status.to_ascii_uppercase();
    if !TIMESHEET_STATUSES.contains(&status.as_str()) {
        return Err(AppError::bad_request(format!("unknown timesheet status {}", payload.status)));
    }

    let predicate = state
        .scoper
        .scope_filter(&principal, ResourceKind::Timesheets, &ScopeQuery::new())?;
    let mut qb = QueryBuilder::<Sqlite>::new(TIMESHEET_SELECT);
    push_predicate(&mut qb, ResourceKind::Timesheets, &predicate)?;
    qb.push(" AND ts.id = ").push_bind(id);
    let mut sheet = qb
        .build_query_as::<Timesheet>()
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| AppError::not_found("timesheet not found"))?;

    state
        .fields
        .authorize_status(&principal, ResourceKind::Timesheets, &sheet.status, &status)?;

    sqlx::query("UPDATE timesheets SET status = ? WHERE id = ?")
        .bind(&status)
        .bind(id)
        .execute(&state.pool)
        .await?;

    tracing::info!(timesheet_id = %id, user_id = %principal.id, from = %sheet.status, to = %status, "timesheet status changed");
    sheet.status = status;
    Ok(Json(sheet))
}
