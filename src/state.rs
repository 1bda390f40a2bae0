//! Shared application state for all routes. Everything is immutable after startup.

use crate::auth::PermissionBackend;
use crate::config::ResolvedModel;
use crate::settings::Settings;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub model: Arc<ResolvedModel>,
    pub permissions: Arc<dyn PermissionBackend>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(
        pool: PgPool,
        model: ResolvedModel,
        permissions: Arc<dyn PermissionBackend>,
        settings: Settings,
    ) -> Self {
        AppState {
            pool,
            model: Arc::new(model),
            permissions,
            settings: Arc::new(settings),
        }
    }
}
