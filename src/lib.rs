//! Kernel SDK: declarative CRUD surfaces (site views, REST, admin, export) for PostgreSQL-backed entities.

pub mod auth;
pub mod case;
pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod migration;
pub mod response;
pub mod routes;
pub mod service;
pub mod settings;
pub mod sql;
pub mod state;
pub mod store;
pub mod surface;

pub use auth::{
    authorization_check, permission_string, Action, Actor, InMemoryPermissionBackend, PermissionBackend,
    PgPermissionBackend, User,
};
pub use config::{load_from_path, load_from_str, resolve, KernelConfig, ResolvedEntity, ResolvedModel};
pub use error::{AppError, ConfigError};
pub use migration::apply_migrations;
pub use routes::{admin_routes, api_routes, app, common_routes, site_routes};
pub use service::CrudService;
pub use settings::Settings;
pub use state::AppState;
pub use store::{ensure_auth_tables, ensure_database_exists};
pub use surface::{Adminable, RestExposable, Routable, Serializable};
