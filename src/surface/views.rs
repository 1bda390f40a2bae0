//! View handlers bound to each site route kind.

use crate::auth::Action;
use crate::config::{ResolvedEntity, RouteKind};
use crate::handlers::{export, site};
use crate::state::AppState;
use crate::surface::{Routable, UrlEntry};
use axum::routing::{get, MethodRouter};

/// Permission a route kind checks before running.
pub fn required_action(kind: RouteKind) -> Action {
    match kind {
        RouteKind::List | RouteKind::Detail | RouteKind::Export | RouteKind::DetailExport => Action::View,
        RouteKind::Create => Action::Add,
        RouteKind::Update => Action::Change,
        RouteKind::Delete => Action::Delete,
    }
}

/// Form-style kinds answer GET with the form or confirmation and POST with the write.
fn view_handler(kind: RouteKind) -> MethodRouter<AppState> {
    match kind {
        RouteKind::List => get(site::list),
        RouteKind::Detail => get(site::detail),
        RouteKind::Create => get(site::create_form).post(site::create),
        RouteKind::Update => get(site::update_form).post(site::update),
        RouteKind::Delete => get(site::delete_confirm).post(site::delete),
        RouteKind::Export => get(export::export_list),
        RouteKind::DetailExport => get(export::export_detail),
    }
}

/// URL entries of `entity` paired with their handlers, in registration order.
pub fn view_handlers(entity: &ResolvedEntity) -> Vec<(UrlEntry, MethodRouter<AppState>)> {
    entity
        .url_entries()
        .into_iter()
        .map(|entry| {
            let handler = view_handler(entry.kind);
            (entry, handler)
        })
        .collect()
}
