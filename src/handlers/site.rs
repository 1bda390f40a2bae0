//! Site view handlers: list, detail, create, update, delete.
//!
//! Every handler runs the authorization gate before touching the database.
//! Anonymous actors are redirected to the login URL; authenticated actors
//! without the permission get 403.

use crate::auth::{authorize, Actor, GateMode};
use crate::config::{ResolvedEntity, RouteKind, PK_FIELD};
use crate::error::AppError;
use crate::extractors::CurrentActor;
use crate::handlers::{default_ordering, export, fetch_object, path_key, request_body, request_path};
use crate::response::{success_many, success_one_ok, success_one_with, PageMeta};
use crate::service::{form_schema, CrudService, FormValidator};
use crate::sql::ListQuery;
use crate::state::AppState;
use crate::surface::{entity_url, links, project, project_all, required_action, Serializable};
use axum::{
    body::Bytes,
    extract::{
        rejection::{BytesRejection, PathRejection},
        OriginalUri, Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension,
};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

async fn gate(
    state: &AppState,
    actor: &Actor,
    entity: &ResolvedEntity,
    kind: RouteKind,
    uri: &OriginalUri,
) -> Result<(), AppError> {
    authorize(
        state.permissions.as_ref(),
        actor,
        entity,
        required_action(kind),
        GateMode::Redirect,
        &state.settings.login_url,
        &request_path(&uri.0),
    )
    .await
}

fn success_url(entity: &ResolvedEntity) -> Map<String, Value> {
    let mut meta = Map::new();
    if let Some(url) = entity_url(entity, RouteKind::List, None) {
        meta.insert("success_url".into(), Value::String(url));
    }
    meta
}

fn links_meta(entity: &ResolvedEntity, row: &Value) -> Map<String, Value> {
    let mut meta = Map::new();
    meta.insert("links".into(), Value::Object(links(entity, row)));
    meta
}

/// GET list. `page` is 1-based; `?export=` renders the filtered list as a file when export is enabled.
pub async fn list(
    State(state): State<AppState>,
    Extension(entity): Extension<Arc<ResolvedEntity>>,
    CurrentActor(actor): CurrentActor,
    uri: OriginalUri,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, AppError> {
    gate(&state, &actor, &entity, RouteKind::List, &uri).await?;
    if entity.capabilities.export && params.contains_key("export") {
        return export::render_list(&state, &entity, &params).await;
    }
    let page = params
        .get("page")
        .and_then(|p| p.trim().parse::<u32>().ok())
        .filter(|&p| p > 0)
        .unwrap_or(1);
    let page_size = state.settings.page_size;
    let query = ListQuery {
        filters: entity.filter_schema().parse(&params),
        ordering: default_ordering(&entity),
        limit: Some(page_size),
        offset: Some((page - 1).saturating_mul(page_size)),
        ..ListQuery::default()
    };
    let result = CrudService::page(&state.pool, &entity, &query).await?;
    if page > 1 && result.rows.is_empty() {
        return Err(AppError::NotFound(format!("page {}", page)));
    }
    let rows = project_all(&result.rows, &entity.list_serializer_schema());
    Ok(success_many(rows, PageMeta::new(result.count, page, page_size)).into_response())
}

/// GET detail, looked up by the uri field; the path key must end with the detail suffix.
pub async fn detail(
    State(state): State<AppState>,
    Extension(entity): Extension<Arc<ResolvedEntity>>,
    CurrentActor(actor): CurrentActor,
    uri: OriginalUri,
    path: Result<Path<String>, PathRejection>,
) -> Result<Response, AppError> {
    gate(&state, &actor, &entity, RouteKind::Detail, &uri).await?;
    let key = path_key(path)?;
    let lookup = key
        .strip_suffix(entity.detail_suffix.as_str())
        .ok_or_else(|| AppError::NotFound(key.clone()))?;
    let row = fetch_object(&state.pool, &entity, &entity.uri_field, lookup).await?;
    let meta = links_meta(&entity, &row);
    Ok(success_one_with(StatusCode::OK, project(&row, &entity.serializer_schema()), Some(meta)).into_response())
}

/// GET create: the empty form.
pub async fn create_form(
    State(state): State<AppState>,
    Extension(entity): Extension<Arc<ResolvedEntity>>,
    CurrentActor(actor): CurrentActor,
    uri: OriginalUri,
) -> Result<Response, AppError> {
    gate(&state, &actor, &entity, RouteKind::Create, &uri).await?;
    Ok(success_one_ok(json!({ "form": form_schema(&entity) })).into_response())
}

/// POST create.
pub async fn create(
    State(state): State<AppState>,
    Extension(entity): Extension<Arc<ResolvedEntity>>,
    CurrentActor(actor): CurrentActor,
    uri: OriginalUri,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, AppError> {
    gate(&state, &actor, &entity, RouteKind::Create, &uri).await?;
    let cleaned = FormValidator::clean(&entity, &request_body(body)?, false)?;
    let row = CrudService::create(&state.pool, &entity, &actor, cleaned).await?;
    let mut meta = success_url(&entity);
    meta.extend(links_meta(&entity, &row));
    Ok(success_one_with(StatusCode::CREATED, project(&row, &entity.serializer_schema()), Some(meta)).into_response())
}

/// GET update: the object and its form.
pub async fn update_form(
    State(state): State<AppState>,
    Extension(entity): Extension<Arc<ResolvedEntity>>,
    CurrentActor(actor): CurrentActor,
    uri: OriginalUri,
    path: Result<Path<String>, PathRejection>,
) -> Result<Response, AppError> {
    gate(&state, &actor, &entity, RouteKind::Update, &uri).await?;
    let key = path_key(path)?;
    let row = fetch_object(&state.pool, &entity, PK_FIELD, &key).await?;
    let data = json!({
        "object": project(&row, &entity.serializer_schema()),
        "form": form_schema(&entity),
    });
    Ok(success_one_ok(data).into_response())
}

/// POST update (full form).
pub async fn update(
    State(state): State<AppState>,
    Extension(entity): Extension<Arc<ResolvedEntity>>,
    CurrentActor(actor): CurrentActor,
    uri: OriginalUri,
    path: Result<Path<String>, PathRejection>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, AppError> {
    gate(&state, &actor, &entity, RouteKind::Update, &uri).await?;
    let key = path_key(path)?;
    let existing = fetch_object(&state.pool, &entity, PK_FIELD, &key).await?;
    let cleaned = FormValidator::clean(&entity, &request_body(body)?, false)?;
    let row = CrudService::update(&state.pool, &entity, &actor, &existing[PK_FIELD], cleaned)
        .await?
        .ok_or_else(|| AppError::NotFound(key.clone()))?;
    let meta = links_meta(&entity, &row);
    Ok(success_one_with(StatusCode::OK, project(&row, &entity.serializer_schema()), Some(meta)).into_response())
}

/// GET delete: the object to confirm.
pub async fn delete_confirm(
    State(state): State<AppState>,
    Extension(entity): Extension<Arc<ResolvedEntity>>,
    CurrentActor(actor): CurrentActor,
    uri: OriginalUri,
    path: Result<Path<String>, PathRejection>,
) -> Result<Response, AppError> {
    gate(&state, &actor, &entity, RouteKind::Delete, &uri).await?;
    let key = path_key(path)?;
    let row = fetch_object(&state.pool, &entity, PK_FIELD, &key).await?;
    Ok(success_one_ok(project(&row, &entity.serializer_schema())).into_response())
}

/// POST delete; answers with the list URL to continue at.
pub async fn delete(
    State(state): State<AppState>,
    Extension(entity): Extension<Arc<ResolvedEntity>>,
    CurrentActor(actor): CurrentActor,
    uri: OriginalUri,
    path: Result<Path<String>, PathRejection>,
) -> Result<Response, AppError> {
    gate(&state, &actor, &entity, RouteKind::Delete, &uri).await?;
    let key = path_key(path)?;
    let existing = fetch_object(&state.pool, &entity, PK_FIELD, &key).await?;
    let id = existing[PK_FIELD].clone();
    CrudService::delete(&state.pool, &entity, &id)
        .await?
        .ok_or_else(|| AppError::NotFound(key.clone()))?;
    Ok(success_one_with(StatusCode::OK, json!({ "id": id }), Some(success_url(&entity))).into_response())
}
