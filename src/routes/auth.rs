use axum::extract::State;
use axum::Json;

use crate::app::AppState;
use crate::authz::{Role, SessionPrincipal};
use crate::errors::{AppError, AppResult};
use crate::models::user::{DbUser, Profile};

/// Own profile. Resolves the session only, so accounts still waiting for
/// approval can see where they stand.
#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "Auth",
    responses(
        (status = 200, description = "Current user", body = Profile),
        (status = 401, description = "No valid session")
    )
)]
pub async fn me(State(state): State<AppState>, SessionPrincipal(principal): SessionPrincipal) -> AppResult<Json<Profile>> {
    let user = sqlx::query_as::<_, DbUser>(
        "SELECT id, name, email, role, approved FROM users WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(principal.id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| AppError::not_found("user not found"))?;

    let role: Role = user
        .role
        .parse()
        .map_err(|err| AppError::configuration(format!("user {} has a bad role: {err}", user.id)))?;

    Ok(Json(Profile {
        id: user.id,
        name: user.name,
        email: user.email,
        role,
        approved: user.approved,
    }))
}
