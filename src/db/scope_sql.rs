//! Compiles visibility predicates into SQL.
//!
//! Each resource kind is queried under a fixed table alias; the predicate is
//! pushed into the WHERE clause with bound parameters so the database applies
//! it before any row is returned.

use sqlx::{QueryBuilder, Sqlite};

use crate::authz::{Predicate, ResourceKind, ScopeField};
use crate::errors::AppError;

/// Column mapping for one resource kind's base query.
#[derive(Debug, Clone, Copy)]
pub struct ScopeColumns {
    /// Expression yielding the owning project's id.
    pub project: &'static str,
    field: fn(ScopeField) -> Option<&'static str>,
}

impl ScopeColumns {
    pub fn column(&self, field: ScopeField) -> Option<&'static str> {
        (self.field)(field)
    }
}

/// `projects p`
const PROJECTS: ScopeColumns = ScopeColumns {
    project: "p.id",
    field: |field| match field {
        ScopeField::ManagerId => Some("p.manager_id"),
        ScopeField::ProjectId => Some("p.id"),
        _ => None,
    },
};

/// `tasks t`
const TASKS: ScopeColumns = ScopeColumns {
    project: "t.project_id",
    field: |field| match field {
        ScopeField::AssigneeId => Some("t.assignee_id"),
        ScopeField::ProjectId => Some("t.project_id"),
        ScopeField::TaskId => Some("t.id"),
        _ => None,
    },
};

/// `timesheets ts JOIN tasks tk ON tk.id = ts.task_id`
const TIMESHEETS: ScopeColumns = ScopeColumns {
    project: "tk.project_id",
    field: |field| match field {
        ScopeField::UserId => Some("ts.user_id"),
        ScopeField::TaskId => Some("ts.task_id"),
        ScopeField::ProjectId => Some("tk.project_id"),
        _ => None,
    },
};

/// `task_comments c JOIN tasks tk ON tk.id = c.task_id`
const TASK_COMMENTS: ScopeColumns = ScopeColumns {
    project: "tk.project_id",
    field: |field| match field {
        ScopeField::AuthorId => Some("c.author_id"),
        ScopeField::TaskId => Some("c.task_id"),
        ScopeField::ProjectId => Some("tk.project_id"),
        _ => None,
    },
};

pub fn columns_for(kind: ResourceKind) -> Option<ScopeColumns> {
    match kind {
        ResourceKind::Projects => Some(PROJECTS),
        ResourceKind::Tasks => Some(TASKS),
        ResourceKind::Timesheets | ResourceKind::Analytics => Some(TIMESHEETS),
        ResourceKind::TaskComments => Some(TASK_COMMENTS),
        _ => None,
    }
}

/// Appends `predicate` as a parenthesised boolean expression.
///
/// A predicate that references a column the kind does not have is a wiring
/// bug and fails the query instead of widening it.
pub fn push_predicate(qb: &mut QueryBuilder<'_, Sqlite>, kind: ResourceKind, predicate: &Predicate) -> Result<(), AppError> {
    let columns = columns_for(kind)
        .ok_or_else(|| AppError::configuration(format!("no scope columns for {kind}")))?;
    push(qb, kind, &columns, predicate)
}

fn push(qb: &mut QueryBuilder<'_, Sqlite>, kind: ResourceKind, columns: &ScopeColumns, predicate: &Predicate) -> Result<(), AppError> {
    match predicate {
        Predicate::All => {
            qb.push("1 = 1");
        }
        Predicate::Nothing => {
            qb.push("1 = 0");
        }
        Predicate::Eq(field, value) => {
            let column = columns
                .column(*field)
                .ok_or_else(|| AppError::configuration(format!("{kind} has no {field:?} column")))?;
            qb.push(column).push(" = ").push_bind(*value);
        }
        Predicate::ProjectManagedBy(user_id) => {
            qb.push("EXISTS (SELECT 1 FROM projects sp WHERE sp.id = ")
                .push(columns.project)
                .push(" AND sp.manager_id = ")
                .push_bind(*user_id)
                .push(" AND sp.deleted_at IS NULL)");
        }
        Predicate::ActiveMemberOf(user_id) => {
            qb.push("EXISTS (SELECT 1 FROM project_members sm WHERE sm.project_id = ")
                .push(columns.project)
                .push(" AND sm.user_id = ")
                .push_bind(*user_id)
                .push(" AND sm.is_active = 1)");
        }
        Predicate::And(parts) | Predicate::Or(parts) => {
            let joiner = if matches!(predicate, Predicate::And(_)) { " AND " } else { " OR " };
            qb.push("(");
            for (i, part) in parts.iter().enumerate() {
                if i > 0 {
                    qb.push(joiner);
                }
                push(qb, kind, columns, part)?;
            }
            qb.push(")");
        }
    }
    Ok(())
}
