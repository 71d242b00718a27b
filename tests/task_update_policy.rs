use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;
use uuid::Uuid;

mod common;

use common::TestApp;

struct Fixture {
    app: TestApp,
    manager: Uuid,
    member: Uuid,
    project: Uuid,
    task: Uuid,
}

/// One project managed by `manager`, with a TODO task assigned to `member`
/// and a two-item DONE column.
async fn fixture() -> Result<Fixture> {
    let app = common::spawn().await?;
    let manager = common::insert_user(&app.pool, "PROJECT_MANAGER", true).await?;
    let member = common::insert_user(&app.pool, "TEAM_MEMBER", true).await?;
    let project = common::insert_project(&app.pool, "Apollo", Some(manager)).await?;
    common::add_member(&app.pool, project, member, true).await?;
    let task = common::insert_task(&app.pool, project, "TODO", 0, Some(member)).await?;
    common::insert_column(&app.pool, project, "DONE", 2).await?;

    Ok(Fixture {
        app,
        manager,
        member,
        project,
        task,
    })
}

async fn patch(f: &Fixture, user: Uuid, body: serde_json::Value) -> Result<(StatusCode, serde_json::Value)> {
    f.app
        .send("PATCH", &format!("/tasks/{}", f.task), Some(user), Some(body))
        .await
}

#[tokio::test]
async fn assignee_sets_status() -> Result<()> {
    let f = fixture().await?;

    let (status, body) = patch(&f, f.member, json!({"status": "DONE"})).await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "DONE");
    // appended behind the two existing DONE tasks
    assert_eq!(body["position"], 2);
    assert_eq!(body["priority"], "MEDIUM");

    assert!(common::column(&f.app.pool, f.project, "TODO").await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn resending_current_status_keeps_board_order() -> Result<()> {
    let f = fixture().await?;
    common::insert_task(&f.app.pool, f.project, "TODO", 1, None).await?;
    common::insert_task(&f.app.pool, f.project, "TODO", 2, None).await?;
    let before = common::column(&f.app.pool, f.project, "TODO").await?;
    assert_eq!(before[0].0, f.task);

    let (status, body) = patch(&f, f.manager, json!({"status": "TODO"})).await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["position"], 0);
    assert_eq!(common::column(&f.app.pool, f.project, "TODO").await?, before);

    let (status, body) = patch(&f, f.member, json!({"status": "TODO", "logged_hours": 2.0})).await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["position"], 0);
    assert_eq!(body["logged_hours"], 2.0);
    assert_eq!(common::column(&f.app.pool, f.project, "TODO").await?, before);

    Ok(())
}

#[tokio::test]
async fn assignee_with_priority_is_rejected_whole() -> Result<()> {
    let f = fixture().await?;

    let (status, body) = patch(&f, f.member, json!({"status": "DONE", "priority": "HIGH"})).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_field_set");
    assert!(body["message"].as_str().unwrap_or_default().contains("priority"), "{body}");

    let (current_status, priority): (String, String) = sqlx::query_as("SELECT status, priority FROM tasks WHERE id = ?")
        .bind(f.task)
        .fetch_one(&f.app.pool)
        .await?;
    assert_eq!(current_status, "TODO");
    assert_eq!(priority, "MEDIUM");

    Ok(())
}

#[tokio::test]
async fn assignee_logs_hours() -> Result<()> {
    let f = fixture().await?;

    let (status, body) = patch(&f, f.member, json!({"logged_hours": 3.5})).await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["logged_hours"], 3.5);
    assert_eq!(body["status"], "TODO");

    Ok(())
}

#[tokio::test]
async fn foreign_manager_is_forbidden() -> Result<()> {
    let f = fixture().await?;
    let outsider = common::insert_user(&f.app.pool, "PROJECT_MANAGER", true).await?;

    let (status, body) = patch(&f, outsider, json!({"status": "DONE"})).await?;
    assert_eq!(status, StatusCode::FORBIDDEN, "{body}");
    assert_eq!(body["error"], "forbidden");

    Ok(())
}

#[tokio::test]
async fn member_who_is_not_assignee_is_forbidden() -> Result<()> {
    let f = fixture().await?;
    let colleague = common::insert_user(&f.app.pool, "TEAM_MEMBER", true).await?;
    common::add_member(&f.app.pool, f.project, colleague, true).await?;

    let (status, _) = patch(&f, colleague, json!({"status": "DONE"})).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    Ok(())
}

#[tokio::test]
async fn reassignment_takes_effect_on_the_next_update() -> Result<()> {
    let f = fixture().await?;
    let newcomer = common::insert_user(&f.app.pool, "TEAM_MEMBER", true).await?;
    common::add_member(&f.app.pool, f.project, newcomer, true).await?;

    let (status, body) = patch(&f, f.manager, json!({"assignee_id": newcomer})).await?;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (status, _) = patch(&f, f.member, json!({"logged_hours": 1.0})).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = patch(&f, newcomer, json!({"logged_hours": 1.0})).await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["logged_hours"], 1.0);

    Ok(())
}

#[tokio::test]
async fn managing_pm_edits_anything() -> Result<()> {
    let f = fixture().await?;

    let body = json!({
        "title": "Ship the beta",
        "priority": "HIGH",
        "assignee_id": f.manager,
        "images": ["a.png", "b.png"],
        "deadline": "2025-10-15T17:00:00Z"
    });
    let (status, body) = patch(&f, f.manager, body).await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["title"], "Ship the beta");
    assert_eq!(body["priority"], "HIGH");
    assert_eq!(body["assignee_id"], f.manager.to_string());
    assert_eq!(body["images"], json!(["a.png", "b.png"]));

    Ok(())
}

#[tokio::test]
async fn admin_moves_task_to_explicit_slot() -> Result<()> {
    let f = fixture().await?;
    let admin = common::insert_user(&f.app.pool, "ADMIN", true).await?;

    let (status, body) = patch(&f, admin, json!({"status": "DONE", "position": 0})).await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["position"], 0);

    let done = common::column(&f.app.pool, f.project, "DONE").await?;
    assert_eq!(done.iter().map(|(_, p)| *p).collect::<Vec<_>>(), vec![0, 1, 2]);
    assert_eq!(done[0].0, f.task);

    Ok(())
}

#[tokio::test]
async fn sales_cannot_reach_the_field_policy() -> Result<()> {
    let f = fixture().await?;
    let sales = common::insert_user(&f.app.pool, "SALES", true).await?;

    let (status, body) = patch(&f, sales, json!({"status": "DONE"})).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    Ok(())
}

#[tokio::test]
async fn malformed_values_are_bad_requests() -> Result<()> {
    let f = fixture().await?;

    let (status, body) = patch(&f, f.manager, json!({"status": "ARCHIVED"})).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    let (status, body) = patch(&f, f.manager, json!({"estimated_hours": "many"})).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap_or_default().contains("estimated_hours"), "{body}");

    let (status, _) = patch(&f, f.manager, json!({"title": null})).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    Ok(())
}

#[tokio::test]
async fn unknown_task_is_not_found() -> Result<()> {
    let f = fixture().await?;

    let (status, _) = f
        .app
        .send("PATCH", &format!("/tasks/{}", Uuid::new_v4()), Some(f.manager), Some(json!({"status": "DONE"})))
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}
