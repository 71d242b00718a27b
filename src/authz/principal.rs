use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use super::matrix::Role;

/// Authenticated caller for one request. Owned by the identity store; never
/// persisted from here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Principal {
    pub id: Uuid,
    pub role: Role,
    pub approved: bool,
}

impl Principal {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self {
            id,
            role,
            approved: true,
        }
    }

    pub fn pending(mut self) -> Self {
        self.approved = false;
        self
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
