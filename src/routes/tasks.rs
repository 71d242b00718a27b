use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde_json::{Map, Value};
use sqlx::{Executor, QueryBuilder, Sqlite};
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{requested_fields, Action, FieldSet, Principal, ResourceKind, ScopeQuery, TaskContext, TaskField};
use crate::db::reorder::{self, MoveRequest};
use crate::db::scope_sql::push_predicate;
use crate::errors::{AppError, AppResult};
use crate::models::task::{DbTask, Task, TaskUpdateRequest, TASK_COLUMNS};
use crate::utils::{encode_string_list, utc_now};

#[utoipa::path(
    get,
    path = "/tasks",
    tag = "Tasks",
    params(
        ("project_id" = Option<Uuid>, Query, description = "Only tasks of this project"),
        ("task_id" = Option<Uuid>, Query, description = "Only this task")
    ),
    responses(
        (status = 200, description = "Tasks visible to the caller, in board order", body = [Task]),
        (status = 401, description = "No valid session"),
        (status = 403, description = "Pending approval or no read permission")
    )
)]
pub async fn list_tasks(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ScopeQuery>,
) -> AppResult<Json<Vec<Task>>> {
    let principal = state.gate.authorize(&headers, ResourceKind::Tasks, Action::Read).await?;
    let rows = fetch_scoped(&state, &principal, &query, &state.pool).await?;

    let tasks: Vec<Task> = rows.into_iter().map(Task::try_from).collect::<Result<_, _>>()?;
    Ok(Json(tasks))
}

/// Partial update. The payload keys decide which field rules apply, and a
/// status or position change re-orders the board in the same transaction.
#[utoipa::path(
    patch,
    path = "/tasks/{id}",
    tag = "Tasks",
    params(("id" = Uuid, Path, description = "Task id")),
    request_body = TaskUpdateRequest,
    responses(
        (status = 200, description = "Task updated", body = Task),
        (status = 400, description = "Payload carries fields the caller may not set"),
        (status = 403, description = "Caller may not update this task"),
        (status = 404, description = "Task not visible"),
        (status = 409, description = "Board changed concurrently")
    )
)]
pub async fn update_task(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(payload): Json<Map<String, Value>>,
) -> AppResult<Json<Task>> {
    let principal = state.gate.authorize(&headers, ResourceKind::Tasks, Action::Update).await?;

    // policy facts and the write share one snapshot
    let mut tx = state.pool.begin().await.map_err(reorder::classify)?;

    let project_id: Uuid = sqlx::query_scalar("SELECT project_id FROM tasks WHERE id = ? AND deleted_at IS NULL")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(reorder::classify)?
        .ok_or_else(|| AppError::not_found("task not found"))?;

    let scope = ScopeQuery::new().with_project(project_id).with_task(id);
    let task = fetch_scoped(&state, &principal, &scope, &mut *tx)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::not_found("task not found"))?;

    let context = TaskContext {
        project_manager_id: project_manager(&mut *tx, task.project_id).await?,
        assignee_id: task.assignee_id,
    };
    let fields = state
        .fields
        .authorized_task_fields(&principal, &context, &requested_fields(&payload))?;

    let request = TaskUpdateRequest::from_payload(&payload)?;
    request.validate()?;

    if fields.is_empty() {
        return Ok(Json(Task::try_from(task)?));
    }

    let mut qb = QueryBuilder::<Sqlite>::new("UPDATE tasks SET updated_at = ");
    qb.push_bind(utc_now());
    push_assignments(&mut qb, &fields, &request)?;
    qb.push(" WHERE id = ").push_bind(id);
    qb.build().execute(&mut *tx).await.map_err(reorder::classify)?;

    if fields.contains(&TaskField::Status) || fields.contains(&TaskField::Position) {
        let movement = MoveRequest {
            bucket: request.status.clone().filter(|_| fields.contains(&TaskField::Status)),
            position: request.position.filter(|_| fields.contains(&TaskField::Position)),
        };
        reorder::move_within(&mut *tx, id, movement).await?;
    }

    tx.commit().await.map_err(reorder::classify)?;

    tracing::info!(
        task_id = %id,
        user_id = %principal.id,
        fields = ?fields.iter().map(TaskField::as_str).collect::<Vec<_>>(),
        "task updated"
    );

    let updated = sqlx::query_as::<_, DbTask>(&format!("SELECT {TASK_COLUMNS} FROM tasks t WHERE t.id = ?"))
        .bind(id)
        .fetch_one(&state.pool)
        .await?;
    Ok(Json(Task::try_from(updated)?))
}

async fn fetch_scoped<'c, E>(state: &AppState, principal: &Principal, query: &ScopeQuery, executor: E) -> AppResult<Vec<DbTask>>
where
    E: Executor<'c, Database = Sqlite>,
{
    let predicate = state.scoper.scope_filter(principal, ResourceKind::Tasks, query)?;

    let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT {TASK_COLUMNS} FROM tasks t WHERE t.deleted_at IS NULL AND "));
    push_predicate(&mut qb, ResourceKind::Tasks, &predicate)?;
    qb.push(" ORDER BY t.status, t.position");

    qb.build_query_as::<DbTask>()
        .fetch_all(executor)
        .await
        .map_err(reorder::classify)
}

pub(crate) async fn project_manager<'c, E>(executor: E, project_id: Uuid) -> AppResult<Option<Uuid>>
where
    E: Executor<'c, Database = Sqlite>,
{
    let manager: Option<Option<Uuid>> = sqlx::query_scalar("SELECT manager_id FROM projects WHERE id = ?")
        .bind(project_id)
        .fetch_optional(executor)
        .await
        .map_err(reorder::classify)?;
    Ok(manager.flatten())
}

fn required<T>(value: Option<T>, field: TaskField) -> AppResult<T> {
    value.ok_or_else(|| AppError::bad_request(format!("{field} cannot be null")))
}

/// Appends `, column = ?` for every authorized non-board field. Status and
/// position are left to the reorder step.
fn push_assignments(qb: &mut QueryBuilder<'_, Sqlite>, fields: &FieldSet, request: &TaskUpdateRequest) -> AppResult<()> {
    for field in fields {
        match field {
            TaskField::Title => {
                qb.push(", title = ").push_bind(required(request.title.clone(), *field)?);
            }
            TaskField::Description => {
                qb.push(", description = ").push_bind(request.description.clone());
            }
            TaskField::Priority => {
                qb.push(", priority = ").push_bind(required(request.priority.clone(), *field)?);
            }
            TaskField::AssigneeId => {
                qb.push(", assignee_id = ").push_bind(request.assignee_id);
            }
            TaskField::Deadline => {
                qb.push(", deadline = ").push_bind(request.deadline);
            }
            TaskField::EstimatedHours => {
                qb.push(", estimated_hours = ").push_bind(request.estimated_hours);
            }
            TaskField::LoggedHours => {
                qb.push(", logged_hours = ").push_bind(required(request.logged_hours, *field)?);
            }
            TaskField::CoverImage => {
                qb.push(", cover_image = ").push_bind(request.cover_image.clone());
            }
            TaskField::Images => {
                let images = required(request.images.clone(), *field)?;
                qb.push(", images = ").push_bind(encode_string_list(&images)?);
            }
            TaskField::Status => {
                required(request.status.as_ref(), *field)?;
            }
            TaskField::Position => {
                required(request.position, *field)?;
            }
        }
    }
    Ok(())
}
