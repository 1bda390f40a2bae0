//! Builds parameterized INSERT, SELECT, UPDATE, DELETE from a resolved entity.

use crate::config::{FieldType, ResolvedEntity, ResolvedField, PK_FIELD};
use crate::error::AppError;
use crate::sql::params::PgBindValue;
use crate::store::quote_ident;
use serde_json::{Map, Value};

/// Hard cap on rows returned by one list query.
pub const MAX_LIMIT: u32 = 1000;

/// One condition of a list query's WHERE clause.
#[derive(Clone, Debug, PartialEq)]
pub enum FilterOp {
    Eq(Value),
    In(Vec<Value>),
    /// Case-insensitive containment (`ILIKE '%term%'`).
    IContains(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: Value) -> Self {
        Filter {
            field: field.into(),
            op: FilterOp::Eq(value),
        }
    }
}

/// Free-text search: OR of case-insensitive containment over `fields`.
#[derive(Clone, Debug, PartialEq)]
pub struct Search {
    pub fields: Vec<String>,
    pub term: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub descending: bool,
}

impl OrderBy {
    /// Parse `name` / `-name`.
    pub fn parse(spec: &str) -> Self {
        match spec.strip_prefix('-') {
            Some(field) => OrderBy {
                field: field.to_string(),
                descending: true,
            },
            None => OrderBy {
                field: spec.to_string(),
                descending: false,
            },
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ListQuery {
    pub filters: Vec<Filter>,
    pub search: Option<Search>,
    pub ordering: Vec<OrderBy>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<PgBindValue>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    /// Push a value for `field`; returns the cast placeholder (`$3::date`).
    fn push_typed(&mut self, field: &ResolvedField, v: &Value) -> Result<String, AppError> {
        self.params.push(PgBindValue::from_field(v, field)?);
        Ok(format!("${}::{}", self.params.len(), field.bind_type()))
    }

    fn push_text(&mut self, s: String) -> String {
        self.params.push(PgBindValue::Text(s));
        format!("${}", self.params.len())
    }
}

fn qualified_table(entity: &ResolvedEntity) -> String {
    format!("{}.{}", quote_ident(&entity.schema_name), quote_ident(&entity.table_name))
}

fn field<'a>(entity: &'a ResolvedEntity, name: &str) -> Result<&'a ResolvedField, AppError> {
    entity
        .field(name)
        .ok_or_else(|| AppError::BadRequest(format!("unknown field: {}", name)))
}

/// SELECT list: each field as-is, except numeric as `col::text` so decoding yields a string.
fn select_column_list(entity: &ResolvedEntity) -> String {
    entity
        .fields
        .iter()
        .map(|f| {
            let q = quote_ident(&f.name);
            if f.field_type == FieldType::Decimal {
                format!("{}::text AS {}", q, q)
            } else {
                q
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

fn where_clause(
    q: &mut QueryBuf,
    entity: &ResolvedEntity,
    filters: &[Filter],
    search: Option<&Search>,
) -> Result<String, AppError> {
    let mut parts = Vec::new();
    for filter in filters {
        let f = field(entity, &filter.field)?;
        let col = quote_ident(&f.name);
        match &filter.op {
            FilterOp::Eq(v) if v.is_null() => parts.push(format!("{} IS NULL", col)),
            FilterOp::Eq(v) => {
                let ph = q.push_typed(f, v)?;
                parts.push(format!("{} = {}", col, ph));
            }
            FilterOp::In(values) if values.is_empty() => parts.push("1 = 0".to_string()),
            FilterOp::In(values) => {
                let mut phs = Vec::with_capacity(values.len());
                for v in values {
                    phs.push(q.push_typed(f, v)?);
                }
                parts.push(format!("{} IN ({})", col, phs.join(", ")));
            }
            FilterOp::IContains(term) => {
                let ph = q.push_text(format!("%{}%", escape_like(term)));
                parts.push(format!("CAST({} AS text) ILIKE {}", col, ph));
            }
        }
    }
    if let Some(search) = search.filter(|s| !s.term.is_empty() && !s.fields.is_empty()) {
        let ph = q.push_text(format!("%{}%", escape_like(&search.term)));
        let mut ors = Vec::with_capacity(search.fields.len());
        for name in &search.fields {
            let f = field(entity, name)?;
            ors.push(format!("CAST({} AS text) ILIKE {}", quote_ident(&f.name), ph));
        }
        parts.push(format!("({})", ors.join(" OR ")));
    }
    Ok(if parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", parts.join(" AND "))
    })
}

fn order_clause(entity: &ResolvedEntity, ordering: &[OrderBy]) -> Result<String, AppError> {
    if ordering.is_empty() {
        return Ok(format!(" ORDER BY {}", quote_ident(PK_FIELD)));
    }
    let mut parts = Vec::with_capacity(ordering.len() + 1);
    for o in ordering {
        let f = field(entity, &o.field)?;
        parts.push(format!(
            "{} {}",
            quote_ident(&f.name),
            if o.descending { "DESC" } else { "ASC" }
        ));
    }
    if !ordering.iter().any(|o| o.field == PK_FIELD) {
        parts.push(quote_ident(PK_FIELD));
    }
    Ok(format!(" ORDER BY {}", parts.join(", ")))
}

/// SELECT with filters, search, ordering (pk as tie-breaker) and LIMIT/OFFSET.
pub fn select_list(entity: &ResolvedEntity, query: &ListQuery) -> Result<QueryBuf, AppError> {
    let mut q = QueryBuf::new();
    let where_sql = where_clause(&mut q, entity, &query.filters, query.search.as_ref())?;
    let order_sql = order_clause(entity, &query.ordering)?;
    let limit_sql = query
        .limit
        .map(|n| format!(" LIMIT {}", n.min(MAX_LIMIT)))
        .unwrap_or_default();
    let offset_sql = query.offset.map(|n| format!(" OFFSET {}", n)).unwrap_or_default();
    q.sql = format!(
        "SELECT {} FROM {}{}{}{}{}",
        select_column_list(entity),
        qualified_table(entity),
        where_sql,
        order_sql,
        limit_sql,
        offset_sql
    );
    Ok(q)
}

/// SELECT COUNT(*) with the same filters and search as `select_list`.
pub fn count(entity: &ResolvedEntity, query: &ListQuery) -> Result<QueryBuf, AppError> {
    let mut q = QueryBuf::new();
    let where_sql = where_clause(&mut q, entity, &query.filters, query.search.as_ref())?;
    q.sql = format!("SELECT COUNT(*) FROM {}{}", qualified_table(entity), where_sql);
    Ok(q)
}

/// SELECT one row by `column = value` (pk or the entity's uri field).
pub fn select_by(entity: &ResolvedEntity, column: &str, value: &Value) -> Result<QueryBuf, AppError> {
    let mut q = QueryBuf::new();
    let f = field(entity, column)?;
    let ph = q.push_typed(f, value)?;
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = {} LIMIT 1",
        select_column_list(entity),
        qualified_table(entity),
        quote_ident(&f.name),
        ph
    );
    Ok(q)
}

/// INSERT the body's known, non-auto fields; missing fields with a default are left to the database.
pub fn insert(entity: &ResolvedEntity, body: &Map<String, Value>) -> Result<QueryBuf, AppError> {
    let mut q = QueryBuf::new();
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for f in &entity.fields {
        if f.auto {
            continue;
        }
        let val = match body.get(&f.name) {
            Some(v) => v,
            None if f.has_default() || f.nullable => continue,
            None => &Value::Null,
        };
        placeholders.push(q.push_typed(f, val)?);
        cols.push(quote_ident(&f.name));
    }
    q.sql = if cols.is_empty() {
        format!(
            "INSERT INTO {} DEFAULT VALUES RETURNING {}",
            qualified_table(entity),
            select_column_list(entity)
        )
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            qualified_table(entity),
            cols.join(", "),
            placeholders.join(", "),
            select_column_list(entity)
        )
    };
    Ok(q)
}

/// UPDATE by pk: SET the body's known, non-auto fields and refresh `modified_date`.
pub fn update(entity: &ResolvedEntity, id: &Value, body: &Map<String, Value>) -> Result<QueryBuf, AppError> {
    let mut q = QueryBuf::new();
    let mut sets = Vec::new();
    for f in &entity.fields {
        if f.auto {
            continue;
        }
        if let Some(v) = body.get(&f.name) {
            let ph = q.push_typed(f, v)?;
            sets.push(format!("{} = {}", quote_ident(&f.name), ph));
        }
    }
    sets.push(format!("{} = NOW()", quote_ident("modified_date")));
    let pk = field(entity, PK_FIELD)?;
    let id_ph = q.push_typed(pk, id)?;
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = {} RETURNING {}",
        qualified_table(entity),
        sets.join(", "),
        quote_ident(PK_FIELD),
        id_ph,
        select_column_list(entity)
    );
    Ok(q)
}

/// DELETE by pk.
pub fn delete(entity: &ResolvedEntity, id: &Value) -> Result<QueryBuf, AppError> {
    let mut q = QueryBuf::new();
    let pk = field(entity, PK_FIELD)?;
    let ph = q.push_typed(pk, id)?;
    q.sql = format!(
        "DELETE FROM {} WHERE {} = {} RETURNING {}",
        qualified_table(entity),
        quote_ident(PK_FIELD),
        ph,
        select_column_list(entity)
    );
    Ok(q)
}
