use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use sqlx::{QueryBuilder, Sqlite};
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{Action, ResourceKind, ScopeQuery};
use crate::db::scope_sql::push_predicate;
use crate::errors::{AppError, AppResult};
use crate::models::comment::TaskComment;
use crate::routes::tasks::project_manager;

#[utoipa::path(
    get,
    path = "/tasks/{id}/comments",
    tag = "Tasks",
    params(("id" = Uuid, Path, description = "Task id")),
    responses(
        (status = 200, description = "Comments the caller may read, oldest first", body = [TaskComment]),
        (status = 404, description = "Task not found")
    )
)]
pub async fn list_comments(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
    headers: HeaderMap,
) -> AppResult<Json<Vec<TaskComment>>> {
    let principal = state
        .gate
        .authorize(&headers, ResourceKind::TaskComments, Action::Read)
        .await?;

    let project_id: Uuid = sqlx::query_scalar("SELECT project_id FROM tasks WHERE id = ? AND deleted_at IS NULL")
        .bind(task_id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| AppError::not_found("task not found"))?;

    let manager_id = project_manager(&state.pool, project_id).await?;
    let predicate = state.scoper.scope_filter(
        &principal,
        ResourceKind::TaskComments,
        &ScopeQuery::comments_on(task_id, manager_id),
    )?;

    let mut qb = QueryBuilder::<Sqlite>::new(
        "SELECT c.id, c.task_id, c.author_id, c.body, c.created_at FROM task_comments c \
         JOIN tasks tk ON tk.id = c.task_id WHERE ",
    );
    push_predicate(&mut qb, ResourceKind::TaskComments, &predicate)?;
    qb.push(" ORDER BY c.created_at");

    let comments = qb.build_query_as::<TaskComment>().fetch_all(&state.pool).await?;
    Ok(Json(comments))
}
