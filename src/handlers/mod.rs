//! HTTP handlers for the generated surfaces: site views, export, REST and admin.

pub mod admin;
pub mod api;
pub mod export;
pub mod site;

use crate::config::ResolvedEntity;
use crate::error::AppError;
use crate::service::CrudService;
use crate::sql::{OrderBy, PgBindValue};
use axum::body::Bytes;
use axum::extract::rejection::{BytesRejection, PathRejection};
use axum::extract::Path;
use axum::http::Uri;
use serde_json::{Map, Value};
use sqlx::PgPool;

/// Path and query of the request, as the `next` target of a login redirect.
pub(crate) fn request_path(uri: &Uri) -> String {
    uri.path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string())
}

/// Parse a request body as a JSON object. Parsing happens after the gate, so
/// anonymous requests are redirected whatever they send.
pub(crate) fn body_to_map(body: &Bytes) -> Result<Map<String, Value>, AppError> {
    if body.is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(m)) => Ok(m),
        Ok(_) => Err(AppError::BadRequest("body must be a JSON object".into())),
        Err(e) => Err(AppError::BadRequest(format!("invalid JSON body: {}", e))),
    }
}

/// Path key of a site route, decoded after the gate. A key that does not decode names no object.
pub(crate) fn path_key(path: Result<Path<String>, PathRejection>) -> Result<String, AppError> {
    path.map(|Path(key)| key).map_err(|e| AppError::NotFound(e.body_text()))
}

/// Request body of a site route, read after the gate.
pub(crate) fn request_body(body: Result<Bytes, BytesRejection>) -> Result<Map<String, Value>, AppError> {
    let body = body.map_err(|e| AppError::BadRequest(e.body_text()))?;
    body_to_map(&body)
}

/// Load one row by `column = raw`. Keys that cannot be a value of the column are not found.
pub(crate) async fn fetch_object(
    pool: &PgPool,
    entity: &ResolvedEntity,
    column: &str,
    raw: &str,
) -> Result<Value, AppError> {
    let not_found = || AppError::NotFound(format!("{} {}", entity.verbose_name, raw));
    let field = entity.field(column).ok_or_else(not_found)?;
    let key = Value::String(raw.to_string());
    if PgBindValue::from_field(&key, field).is_err() {
        return Err(not_found());
    }
    CrudService::read_by(pool, entity, column, &key)
        .await?
        .ok_or_else(not_found)
}

/// Configured `ordering` of the entity; empty means primary key order.
pub(crate) fn default_ordering(entity: &ResolvedEntity) -> Vec<OrderBy> {
    entity
        .overrides
        .ordering
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(|o| OrderBy::parse(o))
        .collect()
}

/// `name` / `-name` if `name` is one of `allowed`.
pub(crate) fn ordering_param(param: Option<&String>, allowed: &[String]) -> Option<OrderBy> {
    let order = OrderBy::parse(param?.trim());
    allowed.contains(&order.field).then_some(order)
}
