use std::sync::Arc;

use axum::http::Method;
use axum::routing::{get, patch, put};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::authz::{
    AuthorizationGate, FieldWritePolicy, JwtSessionResolver, MatrixPolicyEvaluator, PermissionMatrix, PolicyEvaluator,
    SessionResolver, VisibilityScoper,
};
use crate::docs;
use crate::errors::AppError;
use crate::jwt::JwtConfig;
use crate::routes::{analytics, auth, comments, health, projects, tasks, timesheets};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub jwt: Arc<JwtConfig>,
    pub sessions: Arc<dyn SessionResolver>,
    pub gate: AuthorizationGate,
    pub scoper: VisibilityScoper,
    pub fields: FieldWritePolicy,
}

impl AppState {
    pub fn new(pool: SqlitePool, jwt: JwtConfig, matrix: PermissionMatrix) -> Self {
        let jwt = Arc::new(jwt);
        let sessions: Arc<dyn SessionResolver> = Arc::new(JwtSessionResolver::new(Arc::clone(&jwt), pool.clone()));
        let evaluator: Arc<dyn PolicyEvaluator> = Arc::new(MatrixPolicyEvaluator::new(Arc::new(matrix)));

        Self {
            gate: AuthorizationGate::new(Arc::clone(&sessions), Arc::clone(&evaluator)),
            scoper: VisibilityScoper::new(evaluator),
            fields: FieldWritePolicy,
            pool,
            jwt,
            sessions,
        }
    }
}

/// Builds the router with the standard permission matrix and JWT settings
/// from the environment.
pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    create_app_with_matrix(pool, PermissionMatrix::standard()).await
}

pub async fn create_app_with_matrix(pool: SqlitePool, matrix: PermissionMatrix) -> Result<Router, AppError> {
    let jwt_config = JwtConfig::from_env()?;
    Ok(router(AppState::new(pool, jwt_config, matrix)))
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::PUT, Method::PATCH, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let auth_routes = Router::new().route("/me", get(auth::me));

    let project_routes = Router::new()
        .route("/", get(projects::list_projects))
        .route("/:id", put(projects::update_project));

    let task_routes = Router::new()
        .route("/", get(tasks::list_tasks))
        .route("/:id", patch(tasks::update_task))
        .route("/:id/comments", get(comments::list_comments));

    let timesheet_routes = Router::new()
        .route("/", get(timesheets::list_timesheets))
        .route("/:id/status", patch(timesheets::update_status));

    Router::new()
        .route("/api/health", get(health::health))
        .route("/api-docs/openapi.json", get(docs::openapi_json))
        .nest("/auth", auth_routes)
        .nest("/projects", project_routes)
        .nest("/tasks", task_routes)
        .nest("/timesheets", timesheet_routes)
        .route("/analytics/hours", get(analytics::hours))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
