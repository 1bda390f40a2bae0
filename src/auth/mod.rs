//! Actors, permission backends and the authorization policy.

pub mod backend;
pub mod policy;

pub use backend::{Actor, InMemoryPermissionBackend, PermissionBackend, PgPermissionBackend, User};
pub use policy::{authorization_check, authorize, entity_permission, permission_string, Action, GateMode};
