//! Transactional task moves on a (project, status) board partition.

use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::board::{clamp_position, is_dense, plan_move, Placement, Position, Shift};
use crate::errors::{AppError, AppResult, Denial};
use crate::utils::utc_now;

/// Where the caller wants the task to go. Missing bucket keeps the current
/// status. Missing position keeps the current slot when the status is
/// unchanged and appends to the end of a new column otherwise.
#[derive(Debug, Clone, Default)]
pub struct MoveRequest {
    pub bucket: Option<String>,
    pub position: Option<Position>,
}

/// True for SQLite BUSY/LOCKED, including extended codes.
pub fn is_contention(err: &sqlx::Error) -> bool {
    let sqlx::Error::Database(db) = err else {
        return false;
    };
    db.code()
        .and_then(|code| code.parse::<i32>().ok())
        .map(|code| matches!(code & 0xff, 5 | 6))
        .unwrap_or(false)
}

/// Maps lock contention to [`Denial::ReorderConflict`]; anything else passes through.
pub fn classify(err: sqlx::Error) -> AppError {
    if is_contention(&err) {
        tracing::info!(error = %err, "reorder lost a partition race");
        Denial::ReorderConflict.into()
    } else {
        AppError::Database(err)
    }
}

/// Moves a task in its own transaction.
pub async fn move_task(pool: &SqlitePool, task_id: Uuid, request: MoveRequest) -> AppResult<Placement<String>> {
    let mut tx = pool.begin().await.map_err(classify)?;
    let placement = move_within(&mut *tx, task_id, request).await?;
    tx.commit().await.map_err(classify)?;
    Ok(placement)
}

/// Moves a task using the caller's open transaction.
///
/// Reads the current placement, shifts siblings, writes the task, then
/// re-reads both partitions. A partition that is no longer dense aborts with
/// `ReorderConflict`; the caller's transaction must then be rolled back.
pub async fn move_within(conn: &mut SqliteConnection, task_id: Uuid, request: MoveRequest) -> AppResult<Placement<String>> {
    let current = sqlx::query_as::<_, (Uuid, String, Position)>(
        "SELECT project_id, status, position FROM tasks WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(task_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(classify)?
    .ok_or_else(|| AppError::not_found("task not found"))?;

    let (project_id, status, position) = current;
    let from = Placement::new(status, position);
    let bucket = request.bucket.unwrap_or_else(|| from.bucket.clone());

    let siblings: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM tasks WHERE project_id = ? AND status = ? AND id != ? AND deleted_at IS NULL",
    )
    .bind(project_id)
    .bind(&bucket)
    .bind(task_id)
    .fetch_one(&mut *conn)
    .await
    .map_err(classify)?;

    // staying in the same column without a position is not a move
    let requested = match request.position {
        Some(position) => position,
        None if bucket == from.bucket => from.position,
        None => siblings,
    };
    let to = Placement::new(bucket, clamp_position(requested, siblings as usize));
    let plan = plan_move(&from, &to);

    if plan.is_noop() {
        tracing::debug!(task_id = %task_id, "move is a no-op");
        return Ok(to);
    }

    for shift in &plan.shifts {
        apply_shift(conn, project_id, task_id, shift).await?;
    }

    sqlx::query("UPDATE tasks SET status = ?, position = ?, updated_at = ? WHERE id = ?")
        .bind(&plan.target.bucket)
        .bind(plan.target.position)
        .bind(utc_now())
        .bind(task_id)
        .execute(&mut *conn)
        .await
        .map_err(classify)?;

    let mut touched = vec![from.bucket.clone()];
    if plan.target.bucket != from.bucket {
        touched.push(plan.target.bucket.clone());
    }
    for bucket in &touched {
        ensure_dense(conn, project_id, bucket).await?;
    }

    tracing::debug!(
        task_id = %task_id,
        project_id = %project_id,
        from_bucket = %from.bucket,
        from_position = from.position,
        to_bucket = %plan.target.bucket,
        to_position = plan.target.position,
        "task moved"
    );

    Ok(plan.target)
}

async fn apply_shift(conn: &mut SqliteConnection, project_id: Uuid, task_id: Uuid, shift: &Shift<String>) -> AppResult<()> {
    let sql = match shift.to {
        Some(_) => "UPDATE tasks SET position = position + ? WHERE project_id = ? AND status = ? AND id != ? AND deleted_at IS NULL AND position >= ? AND position <= ?",
        None => "UPDATE tasks SET position = position + ? WHERE project_id = ? AND status = ? AND id != ? AND deleted_at IS NULL AND position >= ?",
    };

    let mut query = sqlx::query(sql)
        .bind(shift.delta)
        .bind(project_id)
        .bind(&shift.bucket)
        .bind(task_id)
        .bind(shift.from);
    if let Some(to) = shift.to {
        query = query.bind(to);
    }

    query.execute(&mut *conn).await.map_err(classify)?;
    Ok(())
}

async fn ensure_dense(conn: &mut SqliteConnection, project_id: Uuid, bucket: &str) -> AppResult<()> {
    let positions: Vec<Position> = sqlx::query_scalar(
        "SELECT position FROM tasks WHERE project_id = ? AND status = ? AND deleted_at IS NULL",
    )
    .bind(project_id)
    .bind(bucket)
    .fetch_all(&mut *conn)
    .await
    .map_err(classify)?;

    if is_dense(&positions) {
        Ok(())
    } else {
        tracing::warn!(project_id = %project_id, bucket = %bucket, "partition not dense after move, aborting");
        Err(Denial::ReorderConflict.into())
    }
}
