//! Authorization module - permission matrix, gate and scoping
//!
//! Every protected operation goes through the same sequence:
//! - [`AuthorizationGate`]: session -> approval -> coarse role permission
//! - [`VisibilityScoper`]: row-level filter handed to the query
//! - [`FieldWritePolicy`]: per-field allow-list for mutations
//!
//! The [`PermissionMatrix`] is built once at start-up and injected; nothing
//! here keeps process-wide mutable state.

mod evaluator;
mod fields;
mod gate;
mod matrix;
mod principal;
mod scope;
mod session;

pub use evaluator::{MatrixPolicyEvaluator, PolicyEvaluator};
pub use fields::{requested_fields, FieldSet, FieldWritePolicy, TaskContext, TaskField};
pub use gate::{AuthorizationGate, GateState};
pub use matrix::{Action, ActionSet, Grant, PermissionMatrix, ResourceKind, Role, UnknownRole, STANDARD_GRANTS};
pub use principal::Principal;
pub use scope::{Predicate, ScopeField, ScopeQuery, VisibilityScoper};
pub use session::{JwtSessionResolver, SessionPrincipal, SessionResolver};
