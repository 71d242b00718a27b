use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub status: String,
    pub manager_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProjectUpdateRequest {
    #[schema(example = "Warehouse rollout")]
    pub name: Option<String>,
    #[schema(example = "Phase two of the warehouse rollout")]
    pub description: Option<String>,
    #[schema(example = "ON_HOLD")]
    pub status: Option<String>,
    pub manager_id: Option<Uuid>,
}
