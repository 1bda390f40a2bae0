//! Site routes: every URL entry of every entity, bound to its view handler.
//!
//! Each entity gets its own router carrying the resolved descriptor as an
//! extension, so handlers never look the entity up by path.

use crate::state::AppState;
use crate::surface::view_handlers;
use axum::{Extension, Router};
use std::sync::Arc;

pub fn site_routes(state: AppState) -> Router {
    let mut router = Router::new();
    for entity in &state.model.entities {
        let mut entity_router = Router::new();
        for (entry, handler) in view_handlers(entity) {
            tracing::debug!(name = %entry.qualified_name(&entity.app_label), pattern = %entry.pattern, "site route");
            entity_router = entity_router.route(&entry.pattern, handler);
        }
        router = router.merge(entity_router.layer(Extension(Arc::clone(entity))));
    }
    router.with_state(state)
}
