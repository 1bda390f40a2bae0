//! Generic CRUD execution against PostgreSQL.

use crate::auth::Actor;
use crate::config::{FieldType, ResolvedEntity, ResolvedField, PK_FIELD};
use crate::error::AppError;
use crate::sql::{self, ListQuery, QueryBuf};
use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

/// Default and maximum rows per list call.
pub const DEFAULT_LIMIT: u32 = 100;

/// One page of a list query plus the total number of matching rows.
#[derive(Debug, Serialize)]
pub struct Page {
    pub rows: Vec<Value>,
    pub count: i64,
}

pub struct CrudService;

impl CrudService {
    /// List rows. `limit` defaults to 100 and is capped at 1000.
    pub async fn list(pool: &PgPool, entity: &ResolvedEntity, query: &ListQuery) -> Result<Vec<Value>, AppError> {
        let query = ListQuery {
            limit: Some(query.limit.unwrap_or(DEFAULT_LIMIT)),
            ..query.clone()
        };
        let q = sql::select_list(entity, &query)?;
        Self::fetch_all(pool, entity, &q).await
    }

    /// Every matching row, unpaginated (used by export).
    pub async fn list_all(pool: &PgPool, entity: &ResolvedEntity, query: &ListQuery) -> Result<Vec<Value>, AppError> {
        let query = ListQuery {
            limit: None,
            offset: None,
            ..query.clone()
        };
        let q = sql::select_list(entity, &query)?;
        Self::fetch_all(pool, entity, &q).await
    }

    pub async fn count(pool: &PgPool, entity: &ResolvedEntity, query: &ListQuery) -> Result<i64, AppError> {
        let q = sql::count(entity, query)?;
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query_scalar::<_, i64>(&q.sql);
        for p in &q.params {
            query = query.bind(p.clone());
        }
        Ok(query.fetch_one(pool).await?)
    }

    /// Rows of `query` plus the unpaginated count.
    pub async fn page(pool: &PgPool, entity: &ResolvedEntity, query: &ListQuery) -> Result<Page, AppError> {
        let rows = Self::list(pool, entity, query).await?;
        let count = Self::count(pool, entity, query).await?;
        Ok(Page { rows, count })
    }

    /// Fetch one row by primary key.
    pub async fn read(pool: &PgPool, entity: &ResolvedEntity, id: &Value) -> Result<Option<Value>, AppError> {
        Self::read_by(pool, entity, PK_FIELD, id).await
    }

    /// Fetch one row by any field (detail views look up by the entity's uri field).
    pub async fn read_by(
        pool: &PgPool,
        entity: &ResolvedEntity,
        column: &str,
        value: &Value,
    ) -> Result<Option<Value>, AppError> {
        let q = sql::select_by(entity, column, value)?;
        Self::fetch_optional(pool, entity, &q).await
    }

    /// Insert one row from a cleaned body. Audited entities record the actor as owner and last editor.
    pub async fn create(
        pool: &PgPool,
        entity: &ResolvedEntity,
        actor: &Actor,
        mut body: Map<String, Value>,
    ) -> Result<Value, AppError> {
        stamp_audit(entity, actor, &mut body, true);
        let q = sql::insert(entity, &body)?;
        let row = Self::fetch_optional(pool, entity, &q)
            .await?
            .ok_or(AppError::Db(sqlx::Error::RowNotFound))?;
        tracing::info!(entity = %entity.name, id = %row[PK_FIELD], user_id = ?actor.user_id(), "created");
        Ok(row)
    }

    /// Update one row by primary key. Returns `None` when the row does not exist.
    pub async fn update(
        pool: &PgPool,
        entity: &ResolvedEntity,
        actor: &Actor,
        id: &Value,
        mut body: Map<String, Value>,
    ) -> Result<Option<Value>, AppError> {
        stamp_audit(entity, actor, &mut body, false);
        let q = sql::update(entity, id, &body)?;
        let row = Self::fetch_optional(pool, entity, &q).await?;
        if row.is_some() {
            tracing::info!(entity = %entity.name, id = %id, user_id = ?actor.user_id(), "updated");
        }
        Ok(row)
    }

    /// Delete one row by primary key. Returns the deleted row, or `None` when it did not exist.
    pub async fn delete(pool: &PgPool, entity: &ResolvedEntity, id: &Value) -> Result<Option<Value>, AppError> {
        let q = sql::delete(entity, id)?;
        let row = Self::fetch_optional(pool, entity, &q).await?;
        if row.is_some() {
            tracing::info!(entity = %entity.name, id = %id, "deleted");
        }
        Ok(row)
    }

    async fn fetch_all(pool: &PgPool, entity: &ResolvedEntity, q: &QueryBuf) -> Result<Vec<Value>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(p.clone());
        }
        let rows = query.fetch_all(pool).await?;
        rows.iter().map(|r| row_to_json(entity, r)).collect()
    }

    async fn fetch_optional(pool: &PgPool, entity: &ResolvedEntity, q: &QueryBuf) -> Result<Option<Value>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(p.clone());
        }
        let row = query.fetch_optional(pool).await?;
        row.map(|r| row_to_json(entity, &r)).transpose()
    }
}

/// Owner/audit stamping for audited entities: `created_by` is filled on create
/// when the form left it empty; `modified_by` always becomes the acting user.
pub fn stamp_audit(entity: &ResolvedEntity, actor: &Actor, body: &mut Map<String, Value>, creating: bool) {
    if !entity.audited {
        return;
    }
    let Some(user_id) = actor.user_id() else {
        return;
    };
    if creating && body.get("created_by").map_or(true, Value::is_null) {
        body.insert("created_by".into(), Value::from(user_id));
    }
    body.insert("modified_by".into(), Value::from(user_id));
}

fn row_to_json(entity: &ResolvedEntity, row: &PgRow) -> Result<Value, AppError> {
    let mut map = Map::with_capacity(entity.fields.len());
    for f in &entity.fields {
        map.insert(f.name.clone(), cell_to_value(row, f)?);
    }
    Ok(Value::Object(map))
}

fn cell_to_value(row: &PgRow, f: &ResolvedField) -> Result<Value, AppError> {
    let name = f.name.as_str();
    Ok(match f.field_type {
        FieldType::Integer => row.try_get::<Option<i32>, _>(name)?.map(Value::from),
        FieldType::BigInteger | FieldType::ForeignKey => row.try_get::<Option<i64>, _>(name)?.map(Value::from),
        FieldType::Float => row
            .try_get::<Option<f64>, _>(name)?
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number),
        FieldType::Boolean => row.try_get::<Option<bool>, _>(name)?.map(Value::Bool),
        FieldType::Decimal | FieldType::Char | FieldType::Text | FieldType::File | FieldType::Image => {
            row.try_get::<Option<String>, _>(name)?.map(Value::String)
        }
        FieldType::Uuid => row
            .try_get::<Option<uuid::Uuid>, _>(name)?
            .map(|u| Value::String(u.to_string())),
        FieldType::Date => row
            .try_get::<Option<chrono::NaiveDate>, _>(name)?
            .map(|d| Value::String(d.format("%Y-%m-%d").to_string())),
        FieldType::Datetime => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name)?
            .map(|d| Value::String(d.to_rfc3339())),
        FieldType::Json => row.try_get::<Option<Value>, _>(name)?,
    }
    .unwrap_or(Value::Null))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::User;
    use crate::config::{resolve, EntityConfig, FieldConfig, KernelConfig};
    use serde_json::json;

    fn entity(audited: bool) -> ResolvedEntity {
        let mut e = EntityConfig::new("Page", "cms").field(FieldConfig::char("title", 80));
        e.audited = audited;
        let model = resolve(&KernelConfig { entities: vec![e] }, "kernel").unwrap();
        model.entities[0].as_ref().clone()
    }

    fn actor() -> Actor {
        Actor::User(User::new(42, "ed@example.com"))
    }

    #[test]
    fn create_stamps_owner_and_editor() {
        let mut body = Map::new();
        stamp_audit(&entity(true), &actor(), &mut body, true);
        assert_eq!(Value::Object(body), json!({"created_by": 42, "modified_by": 42}));
    }

    #[test]
    fn explicit_owner_is_kept_on_create() {
        let mut body = json!({"created_by": 7}).as_object().cloned().unwrap();
        stamp_audit(&entity(true), &actor(), &mut body, true);
        assert_eq!(body["created_by"], json!(7));
        assert_eq!(body["modified_by"], json!(42));
    }

    #[test]
    fn update_only_touches_modified_by() {
        let mut body = Map::new();
        stamp_audit(&entity(true), &actor(), &mut body, false);
        assert_eq!(Value::Object(body), json!({"modified_by": 42}));
    }

    #[test]
    fn unaudited_or_anonymous_is_untouched() {
        let mut body = Map::new();
        stamp_audit(&entity(false), &actor(), &mut body, true);
        stamp_audit(&entity(true), &Actor::Anonymous, &mut body, true);
        assert!(body.is_empty());
    }
}
