//! Admin handlers: index, changelist, add, change, delete.
//!
//! Only staff get past the gate; everyone else is sent to the login URL.
//! Staff without the entity permission get 403.

use crate::auth::{authorization_check, authorize, Action, Actor, GateMode};
use crate::config::{ResolvedEntity, PK_FIELD};
use crate::error::AppError;
use crate::extractors::CurrentActor;
use crate::handlers::{body_to_map, fetch_object, ordering_param, request_path};
use crate::response::{success_many, success_one_ok, success_one_with, PageMeta};
use crate::service::{form_schema, CrudService, FormValidator};
use crate::sql::{Filter, ListQuery, OrderBy, Search};
use crate::state::AppState;
use crate::surface::{project_all, AdminConfig, Adminable};
use axum::{
    body::Bytes,
    extract::{OriginalUri, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Mount point of the admin surface.
pub const ADMIN_PREFIX: &str = "/admin";

fn changelist_url(entity: &ResolvedEntity) -> String {
    format!("{}/{}/{}/", ADMIN_PREFIX, entity.app_label, entity.model_name)
}

fn entity_for(state: &AppState, app_label: &str, model_name: &str) -> Result<Arc<ResolvedEntity>, AppError> {
    state
        .model
        .entity_by_admin_key(app_label, model_name)
        .cloned()
        .ok_or_else(|| AppError::NotFound(format!("{}.{}", app_label, model_name)))
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
        GateMode::Staff,
        &state.settings.login_url,
        &request_path(&uri.0),
    )
    .await
}

#[derive(Debug, Serialize)]
pub struct IndexEntry {
    pub model_name: String,
    pub verbose_name: String,
    pub url: String,
    pub perms: BTreeMap<&'static str, bool>,
}

/// GET index: admin entities grouped by app label, with the actor's permissions on each.
/// Entities the actor can do nothing with are left out.
pub async fn index(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    OriginalUri(uri): OriginalUri,
) -> Result<Response, AppError> {
    if !actor.is_staff() {
        return Err(AppError::LoginRequired {
            login_url: state.settings.login_url.clone(),
            next: request_path(&uri),
        });
    }
    let mut apps: BTreeMap<String, Vec<IndexEntry>> = BTreeMap::new();
    for entity in state.model.entities.iter().filter(|e| e.capabilities.admin) {
        let mut perms = BTreeMap::new();
        for action in Action::ALL {
            let granted = authorization_check(state.permissions.as_ref(), &actor, entity, action).await;
            perms.insert(action.as_str(), granted);
        }
        if !perms.values().any(|&granted| granted) {
            continue;
        }
        apps.entry(entity.app_label.clone()).or_default().push(IndexEntry {
            model_name: entity.model_name.clone(),
            verbose_name: entity.verbose_name.clone(),
            url: changelist_url(entity),
            perms,
        });
    }
    Ok(success_one_ok(apps).into_response())
}

#[derive(Debug, Serialize)]
pub struct ChangelistMeta {
    #[serde(flatten)]
    pub page: PageMeta,
    pub admin: AdminConfig,
}

/// Changelist query: `q` searches the search fields, list filters match exactly,
/// `o` orders by a displayed column, `p` is the 0-based page.
pub fn changelist_query(config: &AdminConfig, params: &HashMap<String, String>) -> (ListQuery, u32) {
    let page = params
        .get("p")
        .and_then(|p| p.trim().parse::<u32>().ok())
        .unwrap_or(0);
    let search = params
        .get("q")
        .map(|q| q.trim())
        .filter(|q| !q.is_empty() && !config.search_fields.is_empty())
        .map(|q| Search {
            fields: config.search_fields.clone(),
            term: q.to_string(),
        });
    let filters = config
        .list_filter
        .iter()
        .filter_map(|f| {
            params
                .get(f)
                .filter(|v| !v.is_empty())
                .map(|v| Filter::eq(f.clone(), Value::String(v.clone())))
        })
        .collect();
    let ordering = match ordering_param(params.get("o"), &config.list_display) {
        Some(order) => vec![order],
        None => config.ordering.iter().map(|o| OrderBy::parse(o)).collect(),
    };
    let query = ListQuery {
        filters,
        search,
        ordering,
        limit: Some(config.list_per_page),
        offset: Some(page.saturating_mul(config.list_per_page)),
    };
    (query, page)
}

pub async fn changelist(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    uri: OriginalUri,
    Path((app_label, model_name)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, AppError> {
    let entity = entity_for(&state, &app_label, &model_name)?;
    gate(&state, &actor, &entity, Action::View, &uri).await?;
    let config = entity.admin_config();
    let (query, page) = changelist_query(&config, &params);
    let result = CrudService::page(&state.pool, &entity, &query).await?;
    let rows = project_all(&result.rows, &config.list_display);
    let meta = ChangelistMeta {
        page: PageMeta::new(result.count, page, config.list_per_page),
        admin: config,
    };
    Ok(success_many(rows, meta).into_response())
}

/// Values of `row` grouped by the configured fieldsets, in order.
pub fn group_by_fieldsets(config: &AdminConfig, row: &Value) -> Vec<Value> {
    config
        .fieldsets
        .iter()
        .map(|fs| {
            let fields: Vec<Value> = fs
                .fields
                .iter()
                .map(|name| json!({ "name": name, "value": row.get(name).cloned().unwrap_or(Value::Null) }))
                .collect();
            json!({ "title": fs.title, "fields": fields })
        })
        .collect()
}

fn change_view(entity: &ResolvedEntity, row: &Value) -> Value {
    json!({
        "id": row[PK_FIELD],
        "fieldsets": group_by_fieldsets(&entity.admin_config(), row),
        "form": form_schema(entity),
    })
}

pub async fn add_form(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    uri: OriginalUri,
    Path((app_label, model_name)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let entity = entity_for(&state, &app_label, &model_name)?;
    gate(&state, &actor, &entity, Action::Add, &uri).await?;
    Ok(success_one_ok(json!({ "form": form_schema(&entity) })).into_response())
}

pub async fn add(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    uri: OriginalUri,
    Path((app_label, model_name)): Path<(String, String)>,
    body: Bytes,
) -> Result<Response, AppError> {
    let entity = entity_for(&state, &app_label, &model_name)?;
    gate(&state, &actor, &entity, Action::Add, &uri).await?;
    let cleaned = FormValidator::clean(&entity, &body_to_map(&body)?, false)?;
    let row = CrudService::create(&state.pool, &entity, &actor, cleaned).await?;
    Ok(success_one_with(StatusCode::CREATED, change_view(&entity, &row), None).into_response())
}

/// An audited object saved from the admin with no owner becomes the actor's.
pub fn claim_owner(entity: &ResolvedEntity, actor: &Actor, existing: &Value, body: &mut Map<String, Value>) {
    let owned = existing.get("created_by").map_or(false, |v| !v.is_null())
        || body.get("created_by").map_or(false, |v| !v.is_null());
    if let (true, false, Some(user_id)) = (entity.audited, owned, actor.user_id()) {
        body.insert("created_by".into(), Value::from(user_id));
    }
}

pub async fn change_form(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    uri: OriginalUri,
    Path((app_label, model_name, key)): Path<(String, String, String)>,
) -> Result<Response, AppError> {
    let entity = entity_for(&state, &app_label, &model_name)?;
    gate(&state, &actor, &entity, Action::Change, &uri).await?;
    let row = fetch_object(&state.pool, &entity, PK_FIELD, &key).await?;
    Ok(success_one_ok(change_view(&entity, &row)).into_response())
}

pub async fn change(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    uri: OriginalUri,
    Path((app_label, model_name, key)): Path<(String, String, String)>,
    body: Bytes,
) -> Result<Response, AppError> {
    let entity = entity_for(&state, &app_label, &model_name)?;
    gate(&state, &actor, &entity, Action::Change, &uri).await?;
    let existing = fetch_object(&state.pool, &entity, PK_FIELD, &key).await?;
    let mut cleaned = FormValidator::clean(&entity, &body_to_map(&body)?, false)?;
    claim_owner(&entity, &actor, &existing, &mut cleaned);
    let row = CrudService::update(&state.pool, &entity, &actor, &existing[PK_FIELD], cleaned)
        .await?
        .ok_or_else(|| AppError::NotFound(key.clone()))?;
    Ok(success_one_ok(change_view(&entity, &row)).into_response())
}

pub async fn delete_confirm(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    uri: OriginalUri,
    Path((app_label, model_name, key)): Path<(String, String, String)>,
) -> Result<Response, AppError> {
    let entity = entity_for(&state, &app_label, &model_name)?;
    gate(&state, &actor, &entity, Action::Delete, &uri).await?;
    let row = fetch_object(&state.pool, &entity, PK_FIELD, &key).await?;
    Ok(success_one_ok(change_view(&entity, &row)).into_response())
}

pub async fn delete(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    uri: OriginalUri,
    Path((app_label, model_name, key)): Path<(String, String, String)>,
) -> Result<Response, AppError> {
    let entity = entity_for(&state, &app_label, &model_name)?;
    gate(&state, &actor, &entity, Action::Delete, &uri).await?;
    let existing = fetch_object(&state.pool, &entity, PK_FIELD, &key).await?;
    let id = existing[PK_FIELD].clone();
    CrudService::delete(&state.pool, &entity, &id)
        .await?
        .ok_or_else(|| AppError::NotFound(key.clone()))?;
    let mut meta = Map::new();
    meta.insert("success_url".into(), Value::String(changelist_url(&entity)));
    Ok(success_one_with(StatusCode::OK, json!({ "id": id }), Some(meta)).into_response())
}
