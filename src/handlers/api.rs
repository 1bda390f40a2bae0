//! REST handlers: list, create, retrieve, update, partial update, destroy.
//! Entities are addressed as `/api/<route_name>/<model_name>`.

use crate::auth::{authorize, Action, Actor, GateMode};
use crate::config::{ResolvedEntity, PK_FIELD};
use crate::error::AppError;
use crate::extractors::CurrentActor;
use crate::handlers::{body_to_map, default_ordering, fetch_object, ordering_param, request_path};
use crate::response::{success_many, success_one, success_one_ok, WindowMeta};
use crate::service::{CrudService, FormValidator, DEFAULT_LIMIT};
use crate::sql::{ListQuery, MAX_LIMIT};
use crate::state::AppState;
use crate::surface::{project, project_all, Serializable};
use axum::{
    body::Bytes,
    extract::{OriginalUri, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::collections::HashMap;
use std::sync::Arc;

fn entity_for(state: &AppState, route_name: &str, model_name: &str) -> Result<Arc<ResolvedEntity>, AppError> {
    state
        .model
        .entity_by_api_path(route_name, model_name)
        .cloned()
        .ok_or_else(|| AppError::NotFound(format!("{}/{}", route_name, model_name)))
}

async fn gate(
    state: &AppState,
    actor: &Actor,
    entity: &ResolvedEntity,
    action: Action,
    uri: &OriginalUri,
) -> Result<(), AppError> {
    authorize(
        state.permissions.as_ref(),
        actor,
        entity,
        action,
        GateMode::Status,
        &state.settings.login_url,
        &request_path(&uri.0),
    )
    .await
}

fn parse_window(params: &HashMap<String, String>) -> (u32, u32) {
    let limit = params
        .get("limit")
        .and_then(|v| v.trim().parse::<u32>().ok())
        .filter(|&n| n > 0)
        .unwrap_or(DEFAULT_LIMIT)
        .min(MAX_LIMIT);
    let offset = params
        .get("offset")
        .and_then(|v| v.trim().parse::<u32>().ok())
        .unwrap_or(0);
    (limit, offset)
}

pub async fn list(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    uri: OriginalUri,
    Path((route_name, model_name)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, AppError> {
    let entity = entity_for(&state, &route_name, &model_name)?;
    gate(&state, &actor, &entity, Action::View, &uri).await?;
    let (limit, offset) = parse_window(&params);
    let ordering = match ordering_param(params.get("ordering"), &entity.serializer_schema()) {
        Some(order) => vec![order],
        None => default_ordering(&entity),
    };
    let query = ListQuery {
        filters: entity.filter_schema().parse(&params),
        ordering,
        limit: Some(limit),
        offset: Some(offset),
        ..ListQuery::default()
    };
    let page = CrudService::page(&state.pool, &entity, &query).await?;
    let rows = project_all(&page.rows, &entity.list_serializer_schema());
    Ok(success_many(rows, WindowMeta { count: page.count, limit, offset }).into_response())
}

pub async fn create(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    uri: OriginalUri,
    Path((route_name, model_name)): Path<(String, String)>,
    body: Bytes,
) -> Result<Response, AppError> {
    let entity = entity_for(&state, &route_name, &model_name)?;
    gate(&state, &actor, &entity, Action::Add, &uri).await?;
    let cleaned = FormValidator::clean(&entity, &body_to_map(&body)?, false)?;
    let row = CrudService::create(&state.pool, &entity, &actor, cleaned).await?;
    Ok(success_one(project(&row, &entity.serializer_schema())).into_response())
}

pub async fn retrieve(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    uri: OriginalUri,
    Path((route_name, model_name, pk)): Path<(String, String, String)>,
) -> Result<Response, AppError> {
    let entity = entity_for(&state, &route_name, &model_name)?;
    gate(&state, &actor, &entity, Action::View, &uri).await?;
    let row = fetch_object(&state.pool, &entity, PK_FIELD, &pk).await?;
    Ok(success_one_ok(project(&row, &entity.serializer_schema())).into_response())
}

async fn write(
    state: AppState,
    actor: Actor,
    uri: OriginalUri,
    (route_name, model_name, pk): (String, String, String),
    body: Bytes,
    partial: bool,
) -> Result<Response, AppError> {
    let entity = entity_for(&state, &route_name, &model_name)?;
    gate(&state, &actor, &entity, Action::Change, &uri).await?;
    let existing = fetch_object(&state.pool, &entity, PK_FIELD, &pk).await?;
    let cleaned = FormValidator::clean(&entity, &body_to_map(&body)?, partial)?;
    let row = CrudService::update(&state.pool, &entity, &actor, &existing[PK_FIELD], cleaned)
        .await?
        .ok_or_else(|| AppError::NotFound(pk.clone()))?;
    Ok(success_one_ok(project(&row, &entity.serializer_schema())).into_response())
}

/// PUT: full validation.
pub async fn update(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    uri: OriginalUri,
    Path(path): Path<(String, String, String)>,
    body: Bytes,
) -> Result<Response, AppError> {
    write(state, actor, uri, path, body, false).await
}

/// PATCH: only the fields sent are validated and written.
pub async fn partial_update(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    uri: OriginalUri,
    Path(path): Path<(String, String, String)>,
    body: Bytes,
) -> Result<Response, AppError> {
    write(state, actor, uri, path, body, true).await
}

pub async fn destroy(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    uri: OriginalUri,
    Path((route_name, model_name, pk)): Path<(String, String, String)>,
) -> Result<Response, AppError> {
    let entity = entity_for(&state, &route_name, &model_name)?;
    gate(&state, &actor, &entity, Action::Delete, &uri).await?;
    let existing = fetch_object(&state.pool, &entity, PK_FIELD, &pk).await?;
    CrudService::delete(&state.pool, &entity, &existing[PK_FIELD])
        .await?
        .ok_or_else(|| AppError::NotFound(pk.clone()))?;
    Ok(StatusCode::NO_CONTENT.into_response())
}
