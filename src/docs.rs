use axum::extract::State;
use axum::Json;
use serde_json::{json, Map, Value};
use utoipa::OpenApi;

use crate::app::AppState;
use crate::authz::{Principal, Role};
use crate::errors::AppResult;
use crate::models;
use crate::routes;

#[derive(OpenApi)]
#[openapi(
	paths(
		routes::health::health,
		routes::auth::me,
		routes::projects::list_projects,
		routes::projects::update_project,
		routes::tasks::list_tasks,
		routes::tasks::update_task,
		routes::comments::list_comments,
		routes::timesheets::list_timesheets,
		routes::timesheets::update_status,
		routes::analytics::hours
	),
	components(
		schemas(
			Role,
			Principal,
			routes::health::HealthResponse,
			models::user::Profile,
			models::project::Project,
			models::project::ProjectUpdateRequest,
			models::task::Task,
			models::task::TaskUpdateRequest,
			models::comment::TaskComment,
			models::timesheet::Timesheet,
			models::timesheet::TimesheetStatusRequest,
			models::timesheet::ProjectHours,
			models::timesheet::HoursSummary
		)
	),
	tags(
		(name = "Health", description = "Liveness"),
		(name = "Auth", description = "Session introspection"),
		(name = "Projects", description = "Projects visible to the caller"),
		(name = "Tasks", description = "Board tasks and comments"),
		(name = "Timesheets", description = "Time entries and approval"),
		(name = "Analytics", description = "Aggregates over visible timesheets")
	)
)]
pub struct ApiDoc;

pub fn build_openapi(port: u16) -> anyhow::Result<Value> {
	let mut doc = serde_json::to_value(ApiDoc::openapi())?;
	ensure_security_components(&mut doc);
	ensure_global_security(&mut doc);
	ensure_servers(&mut doc, port);
	Ok(doc)
}

pub async fn openapi_json(State(_state): State<AppState>) -> AppResult<Json<Value>> {
	let port = std::env::var("APP_PORT")
		.ok()
		.and_then(|value| value.parse::<u16>().ok())
		.unwrap_or(8000);
	Ok(Json(build_openapi(port)?))
}

fn ensure_security_components(doc: &mut Value) {
	let Some(root) = doc.as_object_mut() else { return };
	let components = root.entry("components").or_insert_with(|| Value::Object(Map::new()));
	let Some(components) = components.as_object_mut() else { return };
	let schemes = components
		.entry("securitySchemes")
		.or_insert_with(|| Value::Object(Map::new()));

	if let Some(schemes) = schemes.as_object_mut() {
		schemes.insert(
			"bearerAuth".to_string(),
			json!({
				"type": "http",
				"scheme": "bearer",
				"bearerFormat": "JWT"
			}),
		);
	}
}

fn ensure_global_security(doc: &mut Value) {
	if let Some(root) = doc.as_object_mut() {
		root.entry("security").or_insert_with(|| json!([{ "bearerAuth": [] }]));
	}
}

fn ensure_servers(doc: &mut Value, port: u16) {
	let server_url = format!("http://localhost:{}", port);

	match doc.get_mut("servers") {
		Some(Value::Array(arr)) => {
			let has = arr.iter().any(|v| v.get("url").and_then(Value::as_str) == Some(server_url.as_str()));
			if !has {
				arr.push(json!({ "url": server_url }));
			}
		}
		_ => {
			doc["servers"] = json!([{ "url": server_url }]);
		}
	}
}
