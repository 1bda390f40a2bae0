//! Admin routes under `/admin/`.

use crate::handlers::admin::{
    add, add_form, change, change_form, changelist, delete, delete_confirm, index, ADMIN_PREFIX,
};
use crate::state::AppState;
use axum::{routing::get, Router};

pub fn admin_routes(state: AppState) -> Router {
    let model = format!("{}/:app_label/:model_name", ADMIN_PREFIX);
    Router::new()
        .route(&format!("{}/", ADMIN_PREFIX), get(index))
        .route(&format!("{}/", model), get(changelist))
        .route(&format!("{}/add/", model), get(add_form).post(add))
        .route(&format!("{}/:key/change/", model), get(change_form).post(change))
        .route(&format!("{}/:key/delete/", model), get(delete_confirm).post(delete))
        .with_state(state)
}
