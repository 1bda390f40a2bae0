//! REST routes: `/api/<route_name>/<model_name>[/<pk>]`. Entities without the rest capability answer 404.

use crate::handlers::api::{create, destroy, list, partial_update, retrieve, update};
use crate::state::AppState;
use crate::surface::rest::API_PREFIX;
use axum::{routing::get, Router};

pub fn api_routes(state: AppState) -> Router {
    Router::new()
        .route(&format!("{}/:route_name/:model_name", API_PREFIX), get(list).post(create))
        .route(
            &format!("{}/:route_name/:model_name/:pk", API_PREFIX),
            get(retrieve).put(update).patch(partial_update).delete(destroy),
        )
        .with_state(state)
}
