use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use sqlx::{QueryBuilder, Sqlite};
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{Action, Principal, ResourceKind, ScopeQuery};
use crate::db::scope_sql::push_predicate;
use crate::errors::{AppError, AppResult, Denial};
use crate::models::project::{Project, ProjectUpdateRequest};

const PROJECT_SELECT: &str = "SELECT p.id, p.name, p.description, p.status, p.manager_id FROM projects p WHERE p.deleted_at IS NULL AND ";

pub const PROJECT_STATUSES: [&str; 4] = ["ACTIVE", "ON_HOLD", "COMPLETED", "CANCELLED"];

#[utoipa::path(
    get,
    path = "/projects",
    tag = "Projects",
    responses(
        (status = 200, description = "Projects visible to the caller", body = [Project]),
        (status = 401, description = "No valid session"),
        (status = 403, description = "Pending approval or no read permission")
    )
)]
pub async fn list_projects(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ScopeQuery>,
) -> AppResult<Json<Vec<Project>>> {
    let principal = state.gate.authorize(&headers, ResourceKind::Projects, Action::Read).await?;
    let predicate = state.scoper.scope_filter(&principal, ResourceKind::Projects, &query)?;

    let mut qb = QueryBuilder::<Sqlite>::new(PROJECT_SELECT);
    push_predicate(&mut qb, ResourceKind::Projects, &predicate)?;
    if let Some(project_id) = query.project_id {
        qb.push(" AND p.id = ").push_bind(project_id);
    }
    qb.push(" ORDER BY p.name");

    let projects = qb.build_query_as::<Project>().fetch_all(&state.pool).await?;
    Ok(Json(projects))
}

#[utoipa::path(
    put,
    path = "/projects/{id}",
    tag = "Projects",
    params(("id" = Uuid, Path, description = "Project id")),
    request_body = ProjectUpdateRequest,
    responses(
        (status = 200, description = "Project updated", body = Project),
        (status = 403, description = "Caller does not own the project"),
        (status = 404, description = "Project not visible")
    )
)]
pub async fn update_project(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(payload): Json<ProjectUpdateRequest>,
) -> AppResult<Json<Project>> {
    let principal = state.gate.authorize(&headers, ResourceKind::Projects, Action::Update).await?;
    let project = fetch_visible(&state, &principal, id).await?;
    ensure_owner(&principal, &project)?;

    if let Some(status) = &payload.status {
        if !PROJECT_STATUSES.contains(&status.as_str()) {
            return Err(AppError::bad_request(format!("unknown project status {status}")));
        }
    }
    if matches!(&payload.name, Some(name) if name.trim().is_empty()) {
        return Err(AppError::bad_request("name must not be empty"));
    }

    sqlx::query(
        "UPDATE projects SET name = COALESCE(?, name), description = COALESCE(?, description), \
         status = COALESCE(?, status), manager_id = COALESCE(?, manager_id) WHERE id = ?",
    )
    .bind(payload.name)
    .bind(payload.description)
    .bind(payload.status)
    .bind(payload.manager_id)
    .bind(id)
    .execute(&state.pool)
    .await?;

    tracing::info!(project_id = %id, user_id = %principal.id, "project updated");

    // re-read unscoped: a manager handing the project over loses visibility
    let project = sqlx::query_as::<_, Project>(
        "SELECT id, name, description, status, manager_id FROM projects WHERE id = ?",
    )
    .bind(id)
    .fetch_one(&state.pool)
    .await?;
    Ok(Json(project))
}

async fn fetch_visible(state: &AppState, principal: &Principal, id: Uuid) -> AppResult<Project> {
    let predicate = state
        .scoper
        .scope_filter(principal, ResourceKind::Projects, &ScopeQuery::new().with_project(id))?;

    let mut qb = QueryBuilder::<Sqlite>::new(PROJECT_SELECT);
    push_predicate(&mut qb, ResourceKind::Projects, &predicate)?;
    qb.push(" AND p.id = ").push_bind(id);

    qb.build_query_as::<Project>()
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| AppError::not_found("project not found"))
}

fn ensure_owner(principal: &Principal, project: &Project) -> Result<(), Denial> {
    if principal.is_admin() || project.manager_id == Some(principal.id) {
        Ok(())
    } else {
        tracing::info!(user_id = %principal.id, project_id = %project.id, "project update by non-owner refused");
        Err(Denial::Forbidden)
    }
}
