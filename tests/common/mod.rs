#![allow(dead_code)]

use std::path::Path;

use anyhow::Result;
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::util::ServiceExt;
use uuid::Uuid;

use projex::app::{router, AppState};
use projex::authz::PermissionMatrix;
use projex::jwt::JwtConfig;
use projex::utils::utc_now;

pub const SECRET: &str = "test-secret";

pub struct TestApp {
    pub router: Router,
    pub pool: SqlitePool,
    pub jwt: JwtConfig,
    _dir: TempDir,
}

/// Migrated SQLite file in a temp dir.
pub async fn test_pool() -> Result<(TempDir, SqlitePool)> {
    let dir = tempfile::tempdir()?;
    let opts = SqliteConnectOptions::new()
        .filename(dir.path().join("test.db"))
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePool::connect_with(opts).await?;

    let migrator = sqlx::migrate::Migrator::new(Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")).await?;
    migrator.run(&pool).await?;

    Ok((dir, pool))
}

pub async fn spawn() -> Result<TestApp> {
    spawn_with_matrix(PermissionMatrix::standard()).await
}

pub async fn spawn_with_matrix(matrix: PermissionMatrix) -> Result<TestApp> {
    let (dir, pool) = test_pool().await?;
    let state = AppState::new(pool.clone(), JwtConfig::new(SECRET, 24), matrix);

    Ok(TestApp {
        router: router(state),
        pool,
        jwt: JwtConfig::new(SECRET, 24),
        _dir: dir,
    })
}

impl TestApp {
    pub fn token(&self, user_id: Uuid) -> String {
        self.jwt.encode(user_id).expect("token")
    }

    /// Sends a request as `user` (or anonymously) and returns status and JSON body.
    pub async fn send(&self, method: &str, uri: &str, user: Option<Uuid>, body: Option<Value>) -> Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user_id) = user {
            builder = builder.header("authorization", format!("Bearer {}", self.token(user_id)));
        }
        let req = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))?,
            None => builder.body(Body::empty())?,
        };

        let resp = self.router.clone().oneshot(req).await?;
        let status = resp.status();
        let bytes = body::to_bytes(resp.into_body(), 10_485_760).await?;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok((status, value))
    }

    pub async fn get(&self, uri: &str, user: Uuid) -> Result<(StatusCode, Value)> {
        self.send("GET", uri, Some(user), None).await
    }
}

pub async fn insert_user(pool: &SqlitePool, role: &str, approved: bool) -> Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO users (id, name, email, role, approved) VALUES (?, ?, ?, ?, ?)")
        .bind(id)
        .bind(format!("{role} user"))
        .bind(format!("{id}@example.com"))
        .bind(role)
        .bind(approved)
        .execute(pool)
        .await?;
    Ok(id)
}

pub async fn insert_project(pool: &SqlitePool, name: &str, manager: Option<Uuid>) -> Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO projects (id, name, manager_id) VALUES (?, ?, ?)")
        .bind(id)
        .bind(name)
        .bind(manager)
        .execute(pool)
        .await?;
    Ok(id)
}

pub async fn add_member(pool: &SqlitePool, project: Uuid, user: Uuid, active: bool) -> Result<()> {
    sqlx::query("INSERT INTO project_members (project_id, user_id, is_active) VALUES (?, ?, ?)")
        .bind(project)
        .bind(user)
        .bind(active)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn insert_task(pool: &SqlitePool, project: Uuid, status: &str, position: i64, assignee: Option<Uuid>) -> Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO tasks (id, project_id, title, status, position, assignee_id) VALUES (?, ?, ?, ?, ?, ?)")
        .bind(id)
        .bind(project)
        .bind(format!("{status} #{position}"))
        .bind(status)
        .bind(position)
        .bind(assignee)
        .execute(pool)
        .await?;
    Ok(id)
}

/// Seeds `len` tasks at positions `0..len`.
pub async fn insert_column(pool: &SqlitePool, project: Uuid, status: &str, len: i64) -> Result<Vec<Uuid>> {
    let mut ids = Vec::new();
    for position in 0..len {
        ids.push(insert_task(pool, project, status, position, None).await?);
    }
    Ok(ids)
}

pub async fn insert_timesheet(pool: &SqlitePool, user: Uuid, task: Uuid, hours: f64) -> Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO timesheets (id, user_id, task_id, hours, work_date, status) VALUES (?, ?, ?, ?, '2025-03-14', 'SUBMITTED')")
        .bind(id)
        .bind(user)
        .bind(task)
        .bind(hours)
        .execute(pool)
        .await?;
    Ok(id)
}

pub async fn insert_comment(pool: &SqlitePool, task: Uuid, author: Uuid, body: &str) -> Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO task_comments (id, task_id, author_id, body, created_at) VALUES (?, ?, ?, ?, ?)")
        .bind(id)
        .bind(task)
        .bind(author)
        .bind(body)
        .bind(utc_now())
        .execute(pool)
        .await?;
    Ok(id)
}

/// Task ids of a column in position order, with their positions.
pub async fn column(pool: &SqlitePool, project: Uuid, status: &str) -> Result<Vec<(Uuid, i64)>> {
    Ok(sqlx::query_as::<_, (Uuid, i64)>(
        "SELECT id, position FROM tasks WHERE project_id = ? AND status = ? AND deleted_at IS NULL ORDER BY position",
    )
    .bind(project)
    .bind(status)
    .fetch_all(pool)
    .await?)
}

pub fn ids(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| items.iter().filter_map(|item| item["id"].as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}
