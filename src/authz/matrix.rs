use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

const ROLE_COUNT: usize = 5;
const KIND_COUNT: usize = 9;

/// Roles a principal can hold. Exactly one per user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    ProjectManager,
    TeamMember,
    Sales,
    Finance,
}

impl Role {
    pub const ALL: [Role; ROLE_COUNT] = [
        Role::Admin,
        Role::ProjectManager,
        Role::TeamMember,
        Role::Sales,
        Role::Finance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::ProjectManager => "PROJECT_MANAGER",
            Role::TeamMember => "TEAM_MEMBER",
            Role::Sales => "SALES",
            Role::Finance => "FINANCE",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

/// Entity types an authorization check can target. Lookup keys only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResourceKind {
    Projects,
    Tasks,
    TaskComments,
    Timesheets,
    SalesOrders,
    PurchaseOrders,
    Invoices,
    Users,
    Analytics,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; KIND_COUNT] = [
        ResourceKind::Projects,
        ResourceKind::Tasks,
        ResourceKind::TaskComments,
        ResourceKind::Timesheets,
        ResourceKind::SalesOrders,
        ResourceKind::PurchaseOrders,
        ResourceKind::Invoices,
        ResourceKind::Users,
        ResourceKind::Analytics,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Projects => "projects",
            ResourceKind::Tasks => "tasks",
            ResourceKind::TaskComments => "taskComments",
            ResourceKind::Timesheets => "timesheets",
            ResourceKind::SalesOrders => "salesOrders",
            ResourceKind::PurchaseOrders => "purchaseOrders",
            ResourceKind::Invoices => "invoices",
            ResourceKind::Users => "users",
            ResourceKind::Analytics => "analytics",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
}

impl Action {
    pub const ALL: [Action; 4] = [Action::Read, Action::Create, Action::Update, Action::Delete];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Read => "read",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }

    fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compact set of actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ActionSet(u8);

impl ActionSet {
    pub const EMPTY: ActionSet = ActionSet(0);

    pub fn of(actions: &[Action]) -> Self {
        actions.iter().fold(Self::EMPTY, |set, action| set.with(*action))
    }

    pub fn all() -> Self {
        Self::of(&Action::ALL)
    }

    pub fn with(self, action: Action) -> Self {
        ActionSet(self.0 | action.bit())
    }

    pub fn contains(&self, action: Action) -> bool {
        self.0 & action.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Action> + '_ {
        Action::ALL.into_iter().filter(|a| self.contains(*a))
    }
}

/// One row of the grant table.
pub type Grant = (Role, ResourceKind, &'static [Action]);

use Action::{Create as C, Delete as D, Read as R, Update as U};

/// The standard grant table. Any (role, resource) pair missing here has no
/// actions.
pub const STANDARD_GRANTS: &[Grant] = &[
    (Role::Admin, ResourceKind::Projects, &[R, C, U, D]),
    (Role::Admin, ResourceKind::Tasks, &[R, C, U, D]),
    (Role::Admin, ResourceKind::TaskComments, &[R, C, U, D]),
    (Role::Admin, ResourceKind::Timesheets, &[R, C, U, D]),
    (Role::Admin, ResourceKind::SalesOrders, &[R, C, U, D]),
    (Role::Admin, ResourceKind::PurchaseOrders, &[R, C, U, D]),
    (Role::Admin, ResourceKind::Invoices, &[R, C, U, D]),
    (Role::Admin, ResourceKind::Users, &[R, C, U, D]),
    (Role::Admin, ResourceKind::Analytics, &[R]),
    //
    (Role::ProjectManager, ResourceKind::Projects, &[R, C, U]),
    (Role::ProjectManager, ResourceKind::Tasks, &[R, C, U, D]),
    (Role::ProjectManager, ResourceKind::TaskComments, &[R, C, U, D]),
    (Role::ProjectManager, ResourceKind::Timesheets, &[R, C, U]),
    (Role::ProjectManager, ResourceKind::SalesOrders, &[R]),
    (Role::ProjectManager, ResourceKind::PurchaseOrders, &[R, C]),
    (Role::ProjectManager, ResourceKind::Users, &[R]),
    (Role::ProjectManager, ResourceKind::Analytics, &[R]),
    //
    (Role::TeamMember, ResourceKind::Projects, &[R]),
    (Role::TeamMember, ResourceKind::Tasks, &[R, U]),
    (Role::TeamMember, ResourceKind::TaskComments, &[R, C]),
    (Role::TeamMember, ResourceKind::Timesheets, &[R, C, U, D]),
    (Role::TeamMember, ResourceKind::Analytics, &[R]),
    //
    (Role::Sales, ResourceKind::Projects, &[R]),
    (Role::Sales, ResourceKind::SalesOrders, &[R, C, U, D]),
    (Role::Sales, ResourceKind::Invoices, &[R, C]),
    (Role::Sales, ResourceKind::Analytics, &[R]),
    //
    (Role::Finance, ResourceKind::Projects, &[R]),
    (Role::Finance, ResourceKind::Timesheets, &[R, U]),
    (Role::Finance, ResourceKind::SalesOrders, &[R, U]),
    (Role::Finance, ResourceKind::PurchaseOrders, &[R, C, U, D]),
    (Role::Finance, ResourceKind::Invoices, &[R, C, U, D]),
    (Role::Finance, ResourceKind::Analytics, &[R]),
];

/// Immutable role x resource table of allowed actions.
///
/// Every cell exists; an ungranted cell is the empty set. Built once at
/// start-up and shared read-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionMatrix {
    cells: [[ActionSet; KIND_COUNT]; ROLE_COUNT],
}

impl PermissionMatrix {
    pub fn empty() -> Self {
        Self {
            cells: [[ActionSet::EMPTY; KIND_COUNT]; ROLE_COUNT],
        }
    }

    /// Builds a matrix from grant rows. Repeated rows for the same cell merge.
    pub fn from_grants(grants: &[Grant]) -> Self {
        let mut matrix = Self::empty();
        for (role, kind, actions) in grants {
            let cell = &mut matrix.cells[role.index()][kind.index()];
            *cell = actions.iter().fold(*cell, |set, action| set.with(*action));
        }
        matrix
    }

    pub fn standard() -> Self {
        Self::from_grants(STANDARD_GRANTS)
    }

    pub fn allowed_actions(&self, role: Role, kind: ResourceKind) -> ActionSet {
        self.cells[role.index()][kind.index()]
    }

    /// All cells in table order, for audit output.
    pub fn rows(&self) -> impl Iterator<Item = (Role, ResourceKind, ActionSet)> + '_ {
        Role::ALL.into_iter().flat_map(move |role| {
            ResourceKind::ALL
                .into_iter()
                .map(move |kind| (role, kind, self.allowed_actions(role, kind)))
        })
    }
}

impl Default for PermissionMatrix {
    fn default() -> Self {
        Self::standard()
    }
}
