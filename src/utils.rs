use chrono::{DateTime, Utc};

use crate::errors::AppError;

pub fn utc_now() -> DateTime<Utc> {
    Utc::now()
}

/// Decodes a JSON array column such as `tasks.images`.
pub fn decode_string_list(raw: &str) -> Result<Vec<String>, AppError> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(raw).map_err(|err| AppError::internal(format!("malformed list column: {err}")))
}

pub fn encode_string_list(items: &[String]) -> Result<String, AppError> {
    serde_json::to_string(items).map_err(|err| AppError::internal(format!("failed to encode list: {err}")))
}
