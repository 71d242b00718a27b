use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

pub type AppResult<T> = Result<T, AppError>;

/// Expected, user-facing authorization outcomes.
///
/// Carries only the kind of denial, never the allowed-action set.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Denial {
    #[error("authentication required")]
    Unauthenticated,
    #[error("account is pending approval")]
    PendingApproval,
    #[error("insufficient permissions")]
    Forbidden,
    #[error("fields not permitted: {}", .fields.join(", "))]
    InvalidFieldSet { fields: Vec<String> },
    #[error("position changed concurrently, retry the move")]
    ReorderConflict,
}

impl Denial {
    pub fn invalid_fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::InvalidFieldSet {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Denial::Unauthenticated => "unauthenticated",
            Denial::PendingApproval => "pending_approval",
            Denial::Forbidden => "forbidden",
            Denial::InvalidFieldSet { .. } => "invalid_field_set",
            Denial::ReorderConflict => "reorder_conflict",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Denial::Unauthenticated => StatusCode::UNAUTHORIZED,
            Denial::PendingApproval => StatusCode::FORBIDDEN,
            Denial::Forbidden => StatusCode::FORBIDDEN,
            Denial::InvalidFieldSet { .. } => StatusCode::BAD_REQUEST,
            Denial::ReorderConflict => StatusCode::CONFLICT,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Denied(#[from] Denial),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("token error: {0}")]
    Token(String),
    #[error("database error")]
    Database(#[from] sqlx::Error),
    #[error("internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn token(err: impl Into<String>) -> Self {
        Self::Token(err.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn denial(&self) -> Option<&Denial> {
        match self {
            AppError::Denied(denial) => Some(denial),
            _ => None,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = match &self {
            AppError::Denied(denial) => (denial.status(), denial.code()),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AppError::Configuration(_) => (StatusCode::INTERNAL_SERVER_ERROR, "configuration"),
            AppError::Token(_) => (StatusCode::UNAUTHORIZED, "token"),
            AppError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };

        if let AppError::Database(err) = &self {
            tracing::error!(error = %err, "database failure");
        }

        let payload = ErrorResponse {
            error: error.to_string(),
            message: self.to_string(),
        };

        (status, Json(payload)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        Self::Internal(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_denial_has_its_own_code() {
        let denials = [
            Denial::Unauthenticated,
            Denial::PendingApproval,
            Denial::Forbidden,
            Denial::invalid_fields(["priority"]),
            Denial::ReorderConflict,
        ];
        let mut codes: Vec<_> = denials.iter().map(Denial::code).collect();
        codes.dedup();
        assert_eq!(codes.len(), denials.len());
    }

    #[test]
    fn invalid_field_set_lists_fields() {
        let denial = Denial::invalid_fields(["priority", "title"]);
        assert_eq!(denial.to_string(), "fields not permitted: priority, title");
        assert_eq!(denial.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn denial_renders_with_its_status() {
        let resp = AppError::from(Denial::ReorderConflict).into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        let resp = AppError::from(Denial::Unauthenticated).into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}
