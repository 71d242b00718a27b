use std::sync::Arc;

use axum::http::HeaderMap;

use super::evaluator::PolicyEvaluator;
use super::matrix::{Action, ResourceKind};
use super::principal::Principal;
use super::session::SessionResolver;
use crate::errors::{AppResult, Denial};

/// Gate progress. Each non-terminal state has exactly one check left to run;
/// the first failing check moves to `Denied` and nothing after it runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateState {
    SessionResolved(Principal),
    Approved(Principal),
    Granted(Principal),
    Denied(Denial),
}

impl GateState {
    pub fn start(session: Option<Principal>) -> Self {
        match session {
            Some(principal) => GateState::SessionResolved(principal),
            None => GateState::Denied(Denial::Unauthenticated),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, GateState::Granted(_) | GateState::Denied(_))
    }

    pub fn step(self, evaluator: &dyn PolicyEvaluator, kind: ResourceKind, action: Action) -> Self {
        match self {
            GateState::SessionResolved(principal) if principal.approved => GateState::Approved(principal),
            GateState::SessionResolved(_) => GateState::Denied(Denial::PendingApproval),
            GateState::Approved(principal) if evaluator.can(principal.role, kind, action) => {
                GateState::Granted(principal)
            }
            GateState::Approved(_) => GateState::Denied(Denial::Forbidden),
            terminal => terminal,
        }
    }

    pub fn into_result(self) -> Result<Principal, Denial> {
        match self {
            GateState::Granted(principal) => Ok(principal),
            GateState::Denied(denial) => Err(denial),
            // not reachable through `decide`; an unfinished gate never grants
            GateState::SessionResolved(_) | GateState::Approved(_) => Err(Denial::Forbidden),
        }
    }
}

/// Single entry point for coarse eligibility: session, approval, permission.
///
/// A granted principal proves only that the role may perform `action` on
/// `kind`. Record visibility and field writes are checked afterwards by the
/// caller through the scoper and the field policy.
#[derive(Clone)]
pub struct AuthorizationGate {
    sessions: Arc<dyn SessionResolver>,
    evaluator: Arc<dyn PolicyEvaluator>,
}

impl AuthorizationGate {
    pub fn new(sessions: Arc<dyn SessionResolver>, evaluator: Arc<dyn PolicyEvaluator>) -> Self {
        Self { sessions, evaluator }
    }

    /// Runs the gate on an already-resolved session.
    pub fn decide(&self, session: Option<Principal>, kind: ResourceKind, action: Action) -> Result<Principal, Denial> {
        let mut state = GateState::start(session);
        while !state.is_terminal() {
            state = state.step(self.evaluator.as_ref(), kind, action);
        }

        match &state {
            GateState::Granted(principal) => tracing::debug!(
                user_id = %principal.id,
                resource = %kind,
                action = %action,
                "access granted"
            ),
            GateState::Denied(denial) => tracing::info!(
                resource = %kind,
                action = %action,
                denial = denial.code(),
                "access denied"
            ),
            _ => {}
        }

        state.into_result()
    }

    pub async fn authorize(&self, headers: &HeaderMap, kind: ResourceKind, action: Action) -> AppResult<Principal> {
        let session = self.sessions.resolve(headers).await?;
        Ok(self.decide(session, kind, action)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::evaluator::MatrixPolicyEvaluator;
    use crate::authz::matrix::{PermissionMatrix, Role};
    use crate::errors::AppError;
    use async_trait::async_trait;
    use uuid::Uuid;

    struct FixedSession(Option<Principal>);

    #[async_trait]
    impl SessionResolver for FixedSession {
        async fn resolve(&self, _headers: &HeaderMap) -> Result<Option<Principal>, AppError> {
            Ok(self.0.clone())
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl SessionResolver for BrokenStore {
        async fn resolve(&self, _headers: &HeaderMap) -> Result<Option<Principal>, AppError> {
            Err(AppError::Database(sqlx::Error::PoolTimedOut))
        }
    }

    fn gate(session: Arc<dyn SessionResolver>) -> AuthorizationGate {
        let evaluator = MatrixPolicyEvaluator::new(Arc::new(PermissionMatrix::standard()));
        AuthorizationGate::new(session, Arc::new(evaluator))
    }

    fn fixed(principal: Option<Principal>) -> AuthorizationGate {
        gate(Arc::new(FixedSession(principal)))
    }

    #[test]
    fn no_session_is_unauthenticated() {
        let result = fixed(None).decide(None, ResourceKind::Projects, Action::Read);
        assert_eq!(result, Err(Denial::Unauthenticated));
    }

    #[test]
    fn approval_is_checked_before_permission() {
        // Sales has no timesheet access at all, but the pending state wins.
        let principal = Principal::new(Uuid::new_v4(), Role::Sales).pending();
        let result = fixed(None).decide(Some(principal), ResourceKind::Timesheets, Action::Read);
        assert_eq!(result, Err(Denial::PendingApproval));
    }

    #[test]
    fn missing_permission_is_forbidden() {
        let principal = Principal::new(Uuid::new_v4(), Role::TeamMember);
        let result = fixed(None).decide(Some(principal), ResourceKind::Invoices, Action::Read);
        assert_eq!(result, Err(Denial::Forbidden));
    }

    #[test]
    fn granted_returns_the_principal() {
        let principal = Principal::new(Uuid::new_v4(), Role::Finance);
        let result = fixed(None).decide(Some(principal.clone()), ResourceKind::Invoices, Action::Update);
        assert_eq!(result, Ok(principal));
    }

    #[test]
    fn terminal_states_do_not_advance() {
        let evaluator = MatrixPolicyEvaluator::new(Arc::new(PermissionMatrix::standard()));
        let denied = GateState::Denied(Denial::Forbidden);
        assert_eq!(
            denied.clone().step(&evaluator, ResourceKind::Projects, Action::Read),
            denied
        );
    }

    #[tokio::test]
    async fn authorize_resolves_the_session() {
        let principal = Principal::new(Uuid::new_v4(), Role::ProjectManager);
        let gate = fixed(Some(principal.clone()));
        let got = gate
            .authorize(&HeaderMap::new(), ResourceKind::Tasks, Action::Create)
            .await
            .unwrap();
        assert_eq!(got, principal);
    }

    #[tokio::test]
    async fn authorize_is_repeatable() {
        let principal = Principal::new(Uuid::new_v4(), Role::TeamMember);
        let gate = fixed(Some(principal));
        for _ in 0..3 {
            let err = gate
                .authorize(&HeaderMap::new(), ResourceKind::Tasks, Action::Delete)
                .await
                .unwrap_err();
            assert_eq!(err.denial(), Some(&Denial::Forbidden));
        }
    }

    #[tokio::test]
    async fn identity_store_failure_passes_through() {
        let gate = gate(Arc::new(BrokenStore));
        let err = gate
            .authorize(&HeaderMap::new(), ResourceKind::Projects, Action::Read)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Database(_)));
    }
}
