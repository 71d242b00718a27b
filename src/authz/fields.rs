//! Field-level write policy, applied after the gate has granted `update`.

use std::collections::BTreeSet;
use std::fmt;

use serde_json::{Map, Value};
use uuid::Uuid;

use super::matrix::{ResourceKind, Role};
use super::principal::Principal;
use crate::errors::Denial;

/// Writable task attributes, keyed by their payload names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TaskField {
    Title,
    Description,
    Status,
    Priority,
    AssigneeId,
    Deadline,
    EstimatedHours,
    LoggedHours,
    Position,
    CoverImage,
    Images,
}

impl TaskField {
    pub const ALL: [TaskField; 11] = [
        TaskField::Title,
        TaskField::Description,
        TaskField::Status,
        TaskField::Priority,
        TaskField::AssigneeId,
        TaskField::Deadline,
        TaskField::EstimatedHours,
        TaskField::LoggedHours,
        TaskField::Position,
        TaskField::CoverImage,
        TaskField::Images,
    ];

    /// What an assignee without management rights may touch.
    pub const ASSIGNEE_WRITABLE: [TaskField; 2] = [TaskField::Status, TaskField::LoggedHours];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskField::Title => "title",
            TaskField::Description => "description",
            TaskField::Status => "status",
            TaskField::Priority => "priority",
            TaskField::AssigneeId => "assignee_id",
            TaskField::Deadline => "deadline",
            TaskField::EstimatedHours => "estimated_hours",
            TaskField::LoggedHours => "logged_hours",
            TaskField::Position => "position",
            TaskField::CoverImage => "cover_image",
            TaskField::Images => "images",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        TaskField::ALL.into_iter().find(|field| field.as_str() == key)
    }
}

impl fmt::Display for TaskField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type FieldSet = BTreeSet<TaskField>;

/// Recognised fields present in an update payload. Unknown keys are not
/// writable by anyone and are left out.
pub fn requested_fields(payload: &Map<String, Value>) -> FieldSet {
    payload
        .keys()
        .filter_map(|key| {
            let field = TaskField::from_key(key);
            if field.is_none() {
                tracing::debug!(key = %key, "ignoring unrecognised task field");
            }
            field
        })
        .collect()
}

/// Ownership facts about the task being updated.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskContext {
    pub project_manager_id: Option<Uuid>,
    pub assignee_id: Option<Uuid>,
}

impl TaskContext {
    fn manages(&self, principal: &Principal) -> bool {
        principal.role == Role::ProjectManager && self.project_manager_id == Some(principal.id)
    }

    fn is_assignee(&self, principal: &Principal) -> bool {
        self.assignee_id == Some(principal.id)
    }
}

/// Status values only some roles may set. Values not listed are open to any
/// role holding `update` on the resource.
const STATUS_GRANTS: &[(ResourceKind, &str, &[Role])] = &[
    (ResourceKind::Timesheets, "APPROVED", &[Role::Admin, Role::ProjectManager, Role::Finance]),
    (ResourceKind::Timesheets, "REJECTED", &[Role::Admin, Role::ProjectManager, Role::Finance]),
    (ResourceKind::Invoices, "PAID", &[Role::Admin, Role::Finance]),
    (ResourceKind::Invoices, "VOID", &[Role::Admin, Role::Finance]),
    (ResourceKind::SalesOrders, "CONFIRMED", &[Role::Admin, Role::Sales]),
    (ResourceKind::SalesOrders, "CANCELLED", &[Role::Admin, Role::Sales]),
    (ResourceKind::PurchaseOrders, "APPROVED", &[Role::Admin, Role::Finance]),
];

#[derive(Debug, Clone, Copy, Default)]
pub struct FieldWritePolicy;

impl FieldWritePolicy {
    /// Narrows a task update to the fields the principal may set.
    ///
    /// Admins and the managing project manager get everything. The assignee
    /// gets status and logged hours; any other recognised field in the payload
    /// rejects the whole update. Anyone else is refused outright.
    pub fn authorized_task_fields(
        &self,
        principal: &Principal,
        task: &TaskContext,
        requested: &FieldSet,
    ) -> Result<FieldSet, Denial> {
        if principal.is_admin() || task.manages(principal) {
            return Ok(requested.clone());
        }

        if !task.is_assignee(principal) {
            tracing::info!(user_id = %principal.id, role = %principal.role, "task update by non-assignee refused");
            return Err(Denial::Forbidden);
        }

        let disallowed: Vec<&str> = requested
            .iter()
            .filter(|field| !TaskField::ASSIGNEE_WRITABLE.contains(*field))
            .map(TaskField::as_str)
            .collect();

        if disallowed.is_empty() {
            Ok(requested.clone())
        } else {
            tracing::info!(user_id = %principal.id, fields = ?disallowed, "task update carries restricted fields");
            Err(Denial::invalid_fields(disallowed))
        }
    }

    /// Checks a status transition against the allow-list. Both ends count:
    /// leaving `APPROVED` takes the same roles as setting it.
    pub fn authorize_status(&self, principal: &Principal, kind: ResourceKind, from: &str, to: &str) -> Result<(), Denial> {
        for status in [from, to] {
            let allowed = gated_roles(kind, status).map_or(true, |roles| roles.contains(&principal.role));
            if !allowed {
                tracing::info!(
                    user_id = %principal.id,
                    resource = %kind,
                    from = %from,
                    to = %to,
                    "status transition refused"
                );
                return Err(Denial::Forbidden);
            }
        }
        Ok(())
    }
}

fn gated_roles(kind: ResourceKind, status: &str) -> Option<&'static [Role]> {
    STATUS_GRANTS
        .iter()
        .find(|(k, value, _)| *k == kind && value.eq_ignore_ascii_case(status))
        .map(|(_, _, roles)| *roles)
}
