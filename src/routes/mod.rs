//! Routers for every generated surface.

mod admin;
mod api;
mod common;
mod site;

pub use admin::admin_routes;
pub use api::api_routes;
pub use common::common_routes;
pub use site::site_routes;

use crate::state::AppState;
use axum::Router;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;

/// The whole application: common, site, REST and admin routes with a body size limit.
pub fn app(state: AppState) -> Router {
    let body_limit = state.settings.body_limit;
    Router::new()
        .merge(common_routes(state.clone()))
        .merge(site_routes(state.clone()))
        .merge(api_routes(state.clone()))
        .merge(admin_routes(state))
        .layer(ServiceBuilder::new().layer(RequestBodyLimitLayer::new(body_limit)))
}
