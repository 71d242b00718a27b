use std::sync::Arc;

use super::matrix::{Action, PermissionMatrix, ResourceKind, Role};

/// Coarse role permission check.
///
/// Deterministic and free of I/O; the authorization gate is its only caller.
pub trait PolicyEvaluator: Send + Sync {
    fn can(&self, role: Role, kind: ResourceKind, action: Action) -> bool;
}

/// Evaluates `action in allowed_actions(role, kind)` against an injected matrix.
#[derive(Debug, Clone)]
pub struct MatrixPolicyEvaluator {
    matrix: Arc<PermissionMatrix>,
}

impl MatrixPolicyEvaluator {
    pub fn new(matrix: Arc<PermissionMatrix>) -> Self {
        Self { matrix }
    }
}

impl PolicyEvaluator for MatrixPolicyEvaluator {
    fn can(&self, role: Role, kind: ResourceKind, action: Action) -> bool {
        let allowed = self.matrix.allowed_actions(role, kind).contains(action);
        tracing::debug!(
            role = %role,
            resource = %kind,
            action = %action,
            allowed,
            "policy evaluated"
        );
        allowed
    }
}
