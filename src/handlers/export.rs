//! Export handlers: the filtered list or a single object as a CSV/XLSX attachment.

use crate::auth::{authorize, Actor, GateMode};
use crate::config::{ResolvedEntity, RouteKind, PK_FIELD};
use crate::error::AppError;
use crate::extractors::CurrentActor;
use crate::handlers::{default_ordering, fetch_object, path_key, request_path};
use crate::service::CrudService;
use crate::sql::ListQuery;
use crate::state::AppState;
use crate::surface::{export_fields, export_filename, required_action, ExportFormat, Serializable};
use axum::{
    extract::{rejection::PathRejection, OriginalUri, Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    Extension,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

fn format_of(params: &HashMap<String, String>) -> ExportFormat {
    ExportFormat::from_param(params.get("export").map(String::as_str))
}

fn attachment(entity: &ResolvedEntity, format: ExportFormat, rows: &[Value]) -> Result<Response, AppError> {
    let body = format.render(&export_fields(entity), rows)?;
    let disposition = format!("attachment; filename=\"{}\"", export_filename(entity, format));
    tracing::info!(entity = %entity.name, rows = rows.len(), format = format.extension(), "export");
    Ok((
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

/// Render every row matching the filter parameters. The caller has already run the gate.
pub(crate) async fn render_list(
    state: &AppState,
    entity: &ResolvedEntity,
    params: &HashMap<String, String>,
) -> Result<Response, AppError> {
    let query = ListQuery {
        filters: entity.filter_schema().parse(params),
        ordering: default_ordering(entity),
        ..ListQuery::default()
    };
    let rows = CrudService::list_all(&state.pool, entity, &query).await?;
    attachment(entity, format_of(params), &rows)
}

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

/// GET export: the filtered list.
pub async fn export_list(
    State(state): State<AppState>,
    Extension(entity): Extension<Arc<ResolvedEntity>>,
    CurrentActor(actor): CurrentActor,
    uri: OriginalUri,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, AppError> {
    gate(&state, &actor, &entity, RouteKind::Export, &uri).await?;
    render_list(&state, &entity, &params).await
}

/// GET detail export: one object by primary key.
pub async fn export_detail(
    State(state): State<AppState>,
    Extension(entity): Extension<Arc<ResolvedEntity>>,
    CurrentActor(actor): CurrentActor,
    uri: OriginalUri,
    path: Result<Path<String>, PathRejection>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, AppError> {
    gate(&state, &actor, &entity, RouteKind::DetailExport, &uri).await?;
    let key = path_key(path)?;
    let row = fetch_object(&state.pool, &entity, PK_FIELD, &key).await?;
    attachment(&entity, format_of(&params), &[row])
}
