//! Site URL entries, reverse lookup and permalinks.

use crate::config::{ResolvedEntity, ResolvedModel, RouteKind, PK_FIELD};
use crate::surface::Routable;
use serde::Serialize;
use serde_json::{Map, Value};

/// Path parameter of every keyed site route.
pub const KEY_PARAM: &str = ":key";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UrlEntry {
    /// `<model_name>_<suffix>`, e.g. `unit_list`.
    pub name: String,
    /// axum path, e.g. `/unit/:key/edit`.
    pub pattern: String,
    pub kind: RouteKind,
}

impl UrlEntry {
    /// `<app_label>:<name>`.
    pub fn qualified_name(&self, app_label: &str) -> String {
        format!("{}:{}", app_label, self.name)
    }
}

pub fn url_suffix(kind: RouteKind) -> &'static str {
    match kind {
        RouteKind::Create => "create",
        RouteKind::Delete => "delete",
        RouteKind::Detail => "view",
        RouteKind::DetailExport => "detail_export",
        RouteKind::Export => "export",
        RouteKind::List => "list",
        RouteKind::Update => "update",
    }
}

pub fn url_pattern(alias: &str, kind: RouteKind) -> String {
    match kind {
        RouteKind::List => format!("/{}/", alias),
        RouteKind::Create => format!("/{}/new", alias),
        RouteKind::Detail => format!("/{}/{}", alias, KEY_PARAM),
        RouteKind::Update => format!("/{}/{}/edit", alias, KEY_PARAM),
        RouteKind::Delete => format!("/{}/{}/delete", alias, KEY_PARAM),
        RouteKind::Export => format!("/{}/export", alias),
        RouteKind::DetailExport => format!("/{}/{}/export", alias, KEY_PARAM),
    }
}

impl Routable for ResolvedEntity {
    fn url_entries(&self) -> Vec<UrlEntry> {
        self.routes
            .iter()
            .map(|&kind| UrlEntry {
                name: format!("{}_{}", self.model_name, url_suffix(kind)),
                pattern: url_pattern(&self.alias, kind),
                kind,
            })
            .collect()
    }
}

/// Path of `kind` for `entity`, or `None` when that route is not registered.
/// `key` fills the `:key` segment; the detail route appends the entity's suffix.
pub fn entity_url(entity: &ResolvedEntity, kind: RouteKind, key: Option<&str>) -> Option<String> {
    if !entity.routes.contains(&kind) {
        return None;
    }
    let pattern = url_pattern(&entity.alias, kind);
    if !pattern.contains(KEY_PARAM) {
        return Some(pattern);
    }
    let key = key?;
    let key = if kind == RouteKind::Detail {
        format!("{}{}", key, entity.detail_suffix)
    } else {
        key.to_string()
    };
    Some(pattern.replace(KEY_PARAM, &key))
}

fn key_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Permalinks of one row: `absolute_url` (detail, by uri field), `update_url`,
/// `delete_url` and `export_url` (by primary key). Unregistered routes are left out.
pub fn links(entity: &ResolvedEntity, row: &Value) -> Map<String, Value> {
    let uri_key = row.get(&entity.uri_field).and_then(key_text);
    let pk = row.get(PK_FIELD).and_then(key_text);
    let mut out = Map::new();
    for (name, kind, key) in [
        ("absolute_url", RouteKind::Detail, &uri_key),
        ("update_url", RouteKind::Update, &pk),
        ("delete_url", RouteKind::Delete, &pk),
        ("export_url", RouteKind::DetailExport, &pk),
    ] {
        if let Some(url) = entity_url(entity, kind, key.as_deref()) {
            out.insert(name.to_string(), Value::String(url));
        }
    }
    out
}

impl ResolvedModel {
    /// Resolve `<app_label>:<url name>` to a path. Keyed routes need `key`.
    pub fn reverse(&self, qualified_name: &str, key: Option<&str>) -> Option<String> {
        let (app_label, name) = qualified_name.split_once(':')?;
        self.entities
            .iter()
            .filter(|e| e.app_label == app_label)
            .find_map(|e| {
                let entry = e.url_entries().into_iter().find(|u| u.name == name)?;
                entity_url(e, entry.kind, key)
            })
    }
}
