use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use sqlx::{QueryBuilder, Sqlite};

use crate::app::AppState;
use crate::authz::{Action, ResourceKind, ScopeQuery};
use crate::db::scope_sql::push_predicate;
use crate::errors::AppResult;
use crate::models::timesheet::{HoursSummary, ProjectHours};

/// Logged hours per project, over the timesheets the caller may see.
#[utoipa::path(
    get,
    path = "/analytics/hours",
    tag = "Analytics",
    params(("project_id" = Option<uuid::Uuid>, Query, description = "Only this project")),
    responses((status = 200, description = "Hour totals", body = HoursSummary))
)]
pub async fn hours(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ScopeQuery>,
) -> AppResult<Json<HoursSummary>> {
    let principal = state.gate.authorize(&headers, ResourceKind::Analytics, Action::Read).await?;
    let predicate = state.scoper.scope_filter(&principal, ResourceKind::Analytics, &query)?;

    let mut qb = QueryBuilder::<Sqlite>::new(
        "SELECT tk.project_id AS project_id, COALESCE(SUM(ts.hours), 0.0) AS hours, COUNT(*) AS entries \
         FROM timesheets ts JOIN tasks tk ON tk.id = ts.task_id WHERE tk.deleted_at IS NULL AND ",
    );
    push_predicate(&mut qb, ResourceKind::Analytics, &predicate)?;
    qb.push(" GROUP BY tk.project_id ORDER BY hours DESC");

    let projects = qb.build_query_as::<ProjectHours>().fetch_all(&state.pool).await?;
    let total_hours: f64 = projects.iter().map(|p| p.hours).sum();

    Ok(Json(HoursSummary { total_hours, projects }))
}
