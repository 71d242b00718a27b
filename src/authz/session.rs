use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::matrix::Role;
use super::principal::Principal;
use crate::app::AppState;
use crate::errors::{AppError, Denial};
use crate::jwt::{bearer_token, JwtConfig};

/// Identity lookup for the current request.
///
/// `Ok(None)` means "no session". `Err` is reserved for the identity store
/// itself failing and is passed through untouched.
#[async_trait]
pub trait SessionResolver: Send + Sync {
    async fn resolve(&self, headers: &HeaderMap) -> Result<Option<Principal>, AppError>;
}

/// Bearer JWT whose subject is looked up in `users` for role and approval.
#[derive(Debug, Clone)]
pub struct JwtSessionResolver {
    jwt: Arc<JwtConfig>,
    pool: SqlitePool,
}

impl JwtSessionResolver {
    pub fn new(jwt: Arc<JwtConfig>, pool: SqlitePool) -> Self {
        Self { jwt, pool }
    }

    async fn load(&self, user_id: Uuid) -> Result<Option<Principal>, AppError> {
        let row = sqlx::query_as::<_, (String, bool)>(
            "SELECT role, approved FROM users WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some((role, approved)) = row else {
            tracing::debug!(user_id = %user_id, "token subject has no user record");
            return Ok(None);
        };

        let role: Role = role.parse().map_err(|err| {
            tracing::warn!(user_id = %user_id, error = %err, "user carries unknown role");
            AppError::configuration(format!("user {user_id} has an unrecognised role"))
        })?;

        Ok(Some(Principal {
            id: user_id,
            role,
            approved,
        }))
    }
}

#[async_trait]
impl SessionResolver for JwtSessionResolver {
    async fn resolve(&self, headers: &HeaderMap) -> Result<Option<Principal>, AppError> {
        let Some(token) = bearer_token(headers) else {
            return Ok(None);
        };

        let claims = match self.jwt.decode(token) {
            Ok(claims) => claims,
            Err(err) => {
                tracing::debug!(error = %err, "rejecting bearer token");
                return Ok(None);
            }
        };

        self.load(claims.sub).await
    }
}

/// Session-only extractor. Resolves the caller without the approval or
/// permission steps, for self-service endpoints that unapproved users reach.
#[derive(Debug, Clone)]
pub struct SessionPrincipal(pub Principal);

#[async_trait]
impl FromRequestParts<AppState> for SessionPrincipal {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        state
            .sessions
            .resolve(&parts.headers)
            .await?
            .map(SessionPrincipal)
            .ok_or_else(|| Denial::Unauthenticated.into())
    }
}
