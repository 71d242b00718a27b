//! Row-level visibility.
//!
//! The scoper turns (principal, resource kind, caller filters) into a
//! [`Predicate`] that the persistence layer compiles into the query's WHERE
//! clause. Results are never filtered after fetching, so counts and pages only
//! ever reflect visible rows.

use std::sync::Arc;

use serde::Deserialize;
use uuid::Uuid;

use super::evaluator::PolicyEvaluator;
use super::matrix::{Action, ResourceKind, Role};
use super::principal::Principal;
use crate::errors::Denial;

/// Record columns a predicate can constrain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeField {
    ManagerId,
    AssigneeId,
    UserId,
    AuthorId,
    ProjectId,
    TaskId,
}

/// Filter over the records of one resource kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    All,
    Nothing,
    Eq(ScopeField, Uuid),
    /// The record's owning project is managed by this user.
    ProjectManagedBy(Uuid),
    /// This user holds an active membership on the record's owning project.
    ActiveMemberOf(Uuid),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl Predicate {
    /// Conjunction with the trivial cases folded away.
    pub fn all_of(parts: impl IntoIterator<Item = Predicate>) -> Predicate {
        let mut kept = Vec::new();
        for part in parts {
            match part {
                Predicate::All => {}
                Predicate::Nothing => return Predicate::Nothing,
                other => kept.push(other),
            }
        }
        match kept.len() {
            0 => Predicate::All,
            1 => kept.remove(0),
            _ => Predicate::And(kept),
        }
    }

    /// Disjunction with the trivial cases folded away.
    pub fn any_of(parts: impl IntoIterator<Item = Predicate>) -> Predicate {
        let mut kept = Vec::new();
        for part in parts {
            match part {
                Predicate::Nothing => {}
                Predicate::All => return Predicate::All,
                other => kept.push(other),
            }
        }
        match kept.len() {
            0 => Predicate::Nothing,
            1 => kept.remove(0),
            _ => Predicate::Or(kept),
        }
    }
}

/// Filters supplied by the caller, before scoping.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScopeQuery {
    pub project_id: Option<Uuid>,
    pub task_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    /// Manager of the task's project, resolved by the caller for comment scoping.
    #[serde(skip)]
    pub project_manager_id: Option<Uuid>,
}

impl ScopeQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_project(mut self, project_id: Uuid) -> Self {
        self.project_id = Some(project_id);
        self
    }

    pub fn with_task(mut self, task_id: Uuid) -> Self {
        self.task_id = Some(task_id);
        self
    }

    pub fn with_user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Scope for the comments of one task whose project is managed by `manager_id`.
    pub fn comments_on(task_id: Uuid, manager_id: Option<Uuid>) -> Self {
        Self {
            task_id: Some(task_id),
            project_manager_id: manager_id,
            ..Self::default()
        }
    }

    fn eq(field: ScopeField, value: Option<Uuid>) -> Predicate {
        value.map_or(Predicate::All, |id| Predicate::Eq(field, id))
    }
}

type ScopeRule = fn(&Principal, &ScopeQuery) -> Predicate;

fn rule_for(kind: ResourceKind) -> Option<ScopeRule> {
    match kind {
        ResourceKind::Projects => Some(projects as ScopeRule),
        ResourceKind::Tasks => Some(tasks as ScopeRule),
        ResourceKind::Timesheets => Some(timesheets as ScopeRule),
        ResourceKind::TaskComments => Some(task_comments as ScopeRule),
        ResourceKind::Analytics => Some(analytics as ScopeRule),
        _ => None,
    }
}

fn projects(principal: &Principal, _query: &ScopeQuery) -> Predicate {
    match principal.role {
        Role::Admin | Role::Sales | Role::Finance => Predicate::All,
        Role::ProjectManager => Predicate::Eq(ScopeField::ManagerId, principal.id),
        Role::TeamMember => Predicate::ActiveMemberOf(principal.id),
    }
}

// An explicit project filter skips the assignee restriction; see DESIGN.md.
fn tasks(principal: &Principal, query: &ScopeQuery) -> Predicate {
    let role_part = match (query.project_id, principal.role) {
        (None, Role::TeamMember) => Predicate::Eq(ScopeField::AssigneeId, principal.id),
        _ => Predicate::All,
    };
    Predicate::all_of([
        ScopeQuery::eq(ScopeField::ProjectId, query.project_id),
        ScopeQuery::eq(ScopeField::TaskId, query.task_id),
        role_part,
    ])
}

fn timesheets(principal: &Principal, query: &ScopeQuery) -> Predicate {
    // Team members always see their own sheets; a requested user id is replaced.
    let user = match principal.role {
        Role::TeamMember => Some(principal.id),
        _ => query.user_id,
    };
    Predicate::all_of([
        ScopeQuery::eq(ScopeField::UserId, user),
        ScopeQuery::eq(ScopeField::TaskId, query.task_id),
        ScopeQuery::eq(ScopeField::ProjectId, query.project_id),
    ])
}

fn task_comments(principal: &Principal, query: &ScopeQuery) -> Predicate {
    let authors = match principal.role {
        Role::Admin | Role::ProjectManager => Predicate::All,
        _ => Predicate::any_of(
            [Some(principal.id), query.project_manager_id]
                .into_iter()
                .flatten()
                .map(|author| Predicate::Eq(ScopeField::AuthorId, author)),
        ),
    };
    Predicate::all_of([ScopeQuery::eq(ScopeField::TaskId, query.task_id), authors])
}

fn analytics(principal: &Principal, query: &ScopeQuery) -> Predicate {
    let reach = match principal.role {
        Role::Admin => Predicate::All,
        _ => Predicate::any_of([
            Predicate::ProjectManagedBy(principal.id),
            Predicate::ActiveMemberOf(principal.id),
            Predicate::Eq(ScopeField::UserId, principal.id),
        ]),
    };
    Predicate::all_of([ScopeQuery::eq(ScopeField::ProjectId, query.project_id), reach])
}

/// Narrows "all records" of a kind to what a principal may see.
#[derive(Clone)]
pub struct VisibilityScoper {
    evaluator: Arc<dyn PolicyEvaluator>,
}

impl VisibilityScoper {
    pub fn new(evaluator: Arc<dyn PolicyEvaluator>) -> Self {
        Self { evaluator }
    }

    pub fn scope_filter(&self, principal: &Principal, kind: ResourceKind, query: &ScopeQuery) -> Result<Predicate, Denial> {
        if let Some(rule) = rule_for(kind) {
            return Ok(rule(principal, query));
        }

        // Unregistered kinds stay open only to roles the matrix lets read them.
        if self.evaluator.can(principal.role, kind, Action::Read) {
            Ok(Predicate::All)
        } else {
            tracing::warn!(
                user_id = %principal.id,
                role = %principal.role,
                resource = %kind,
                "no scoping rule and no read grant, failing closed"
            );
            Err(Denial::Forbidden)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::evaluator::MatrixPolicyEvaluator;
    use crate::authz::matrix::PermissionMatrix;

    fn scoper() -> VisibilityScoper {
        VisibilityScoper::new(Arc::new(MatrixPolicyEvaluator::new(Arc::new(
            PermissionMatrix::standard(),
        ))))
    }

    fn principal(role: Role) -> Principal {
        Principal::new(Uuid::new_v4(), role)
    }

    #[test]
    fn projects_by_role() {
        let s = scoper();
        let q = ScopeQuery::new();
        for role in [Role::Admin, Role::Sales, Role::Finance] {
            assert_eq!(s.scope_filter(&principal(role), ResourceKind::Projects, &q), Ok(Predicate::All));
        }

        let pm = principal(Role::ProjectManager);
        assert_eq!(
            s.scope_filter(&pm, ResourceKind::Projects, &q),
            Ok(Predicate::Eq(ScopeField::ManagerId, pm.id))
        );

        let tm = principal(Role::TeamMember);
        assert_eq!(
            s.scope_filter(&tm, ResourceKind::Projects, &q),
            Ok(Predicate::ActiveMemberOf(tm.id))
        );
    }

    #[test]
    fn team_member_tasks_without_project_are_assigned_only() {
        let tm = principal(Role::TeamMember);
        let got = scoper().scope_filter(&tm, ResourceKind::Tasks, &ScopeQuery::new());
        assert_eq!(got, Ok(Predicate::Eq(ScopeField::AssigneeId, tm.id)));
    }

    #[test]
    fn explicit_project_filter_drops_assignee_restriction() {
        let tm = principal(Role::TeamMember);
        let project = Uuid::new_v4();
        let got = scoper().scope_filter(&tm, ResourceKind::Tasks, &ScopeQuery::new().with_project(project));
        assert_eq!(got, Ok(Predicate::Eq(ScopeField::ProjectId, project)));
    }

    #[test]
    fn team_member_timesheet_user_filter_is_overridden() {
        let tm = principal(Role::TeamMember);
        let someone_else = Uuid::new_v4();
        let got = scoper().scope_filter(&tm, ResourceKind::Timesheets, &ScopeQuery::new().with_user(someone_else));
        assert_eq!(got, Ok(Predicate::Eq(ScopeField::UserId, tm.id)));
    }

    #[test]
    fn finance_timesheet_user_filter_is_honoured() {
        let fin = principal(Role::Finance);
        let user = Uuid::new_v4();
        let got = scoper().scope_filter(&fin, ResourceKind::Timesheets, &ScopeQuery::new().with_user(user));
        assert_eq!(got, Ok(Predicate::Eq(ScopeField::UserId, user)));
    }

    #[test]
    fn team_member_comments_include_project_manager() {
        let tm = principal(Role::TeamMember);
        let task = Uuid::new_v4();
        let manager = Uuid::new_v4();
        let got = scoper().scope_filter(&tm, ResourceKind::TaskComments, &ScopeQuery::comments_on(task, Some(manager)));
        assert_eq!(
            got,
            Ok(Predicate::And(vec![
                Predicate::Eq(ScopeField::TaskId, task),
                Predicate::Or(vec![
                    Predicate::Eq(ScopeField::AuthorId, tm.id),
                    Predicate::Eq(ScopeField::AuthorId, manager),
                ]),
            ]))
        );
    }

    #[test]
    fn manager_comments_are_whole_task() {
        let pm = principal(Role::ProjectManager);
        let task = Uuid::new_v4();
        let got = scoper().scope_filter(&pm, ResourceKind::TaskComments, &ScopeQuery::comments_on(task, Some(pm.id)));
        assert_eq!(got, Ok(Predicate::Eq(ScopeField::TaskId, task)));
    }

    #[test]
    fn analytics_union_for_non_admins() {
        let s = scoper();
        let q = ScopeQuery::new();
        assert_eq!(s.scope_filter(&principal(Role::Admin), ResourceKind::Analytics, &q), Ok(Predicate::All));

        let sales = principal(Role::Sales);
        assert_eq!(
            s.scope_filter(&sales, ResourceKind::Analytics, &q),
            Ok(Predicate::Or(vec![
                Predicate::ProjectManagedBy(sales.id),
                Predicate::ActiveMemberOf(sales.id),
                Predicate::Eq(ScopeField::UserId, sales.id),
            ]))
        );
    }

    #[test]
    fn unregistered_kind_follows_read_grant() {
        let s = scoper();
        let q = ScopeQuery::new();
        assert_eq!(s.scope_filter(&principal(Role::Finance), ResourceKind::Invoices, &q), Ok(Predicate::All));
        assert_eq!(
            s.scope_filter(&principal(Role::TeamMember), ResourceKind::Invoices, &q),
            Err(Denial::Forbidden)
        );
    }

    #[test]
    fn folding_rules() {
        let id = Uuid::new_v4();
        assert_eq!(Predicate::all_of(Vec::new()), Predicate::All);
        assert_eq!(Predicate::any_of(Vec::new()), Predicate::Nothing);
        assert_eq!(
            Predicate::all_of([Predicate::Eq(ScopeField::UserId, id), Predicate::Nothing]),
            Predicate::Nothing
        );
        assert_eq!(
            Predicate::any_of([Predicate::Nothing, Predicate::Eq(ScopeField::UserId, id)]),
            Predicate::Eq(ScopeField::UserId, id)
        );
    }
}
