//! Apply the resolved model to the database: schema, one table per entity, then foreign keys.
//! Tables are created before any constraint so entities may reference each other in any order.

use crate::config::{FieldDefault, FieldType, ResolvedEntity, ResolvedField, ResolvedModel, PK_FIELD};
use crate::error::AppError;
use crate::store::quote_ident;
use serde_json::Value;
use sha2::{Digest, Sha256};
use sqlx::PgPool;

/// PostgreSQL truncates identifiers to 63 bytes.
const MAX_IDENT: usize = 63;

/// Create the schema and every entity table (`IF NOT EXISTS`), then add missing FK constraints.
/// Idempotent: safe to run at every startup.
pub async fn apply_migrations(pool: &PgPool, model: &ResolvedModel) -> Result<(), AppError> {
    let mut schemas: Vec<&str> = model.entities.iter().map(|e| e.schema_name.as_str()).collect();
    schemas.dedup();
    for schema in schemas {
        sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", quote_ident(schema)))
            .execute(pool)
            .await?;
    }

    for entity in &model.entities {
        let sql = create_table_sql(entity);
        tracing::debug!(sql = %sql, "ddl");
        sqlx::query(&sql).execute(pool).await?;
    }

    for entity in &model.entities {
        for field in entity.fields.iter().filter(|f| f.is_relation()) {
            let Some(sql) = foreign_key_sql(entity, field) else {
                continue;
            };
            let name = constraint_name(&entity.table_name, &field.name);
            let exists: bool = sqlx::query_scalar(
                "SELECT EXISTS (SELECT 1 FROM pg_constraint c JOIN pg_namespace n ON n.oid = c.connamespace \
                 WHERE c.conname = $1 AND n.nspname = $2)",
            )
            .bind(&name)
            .bind(&entity.schema_name)
            .fetch_one(pool)
            .await?;
            if !exists {
                tracing::debug!(sql = %sql, "ddl");
                sqlx::query(&sql).execute(pool).await?;
            }
        }
    }
    tracing::info!(entities = model.entities.len(), "migrations applied");
    Ok(())
}

fn qualified(entity: &ResolvedEntity, table: &str) -> String {
    format!("{}.{}", quote_ident(&entity.schema_name), quote_ident(table))
}

/// `CREATE TABLE IF NOT EXISTS` for one entity, without foreign keys.
pub fn create_table_sql(entity: &ResolvedEntity) -> String {
    let cols: Vec<String> = entity.fields.iter().map(column_def).collect();
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
        qualified(entity, &entity.table_name),
        cols.join(",\n  ")
    )
}

fn column_def(f: &ResolvedField) -> String {
    let name = quote_ident(&f.name);
    if f.name == PK_FIELD {
        return format!("{} BIGSERIAL PRIMARY KEY", name);
    }
    let mut def = format!("{} {}", name, f.pg_type());
    if !f.nullable {
        def.push_str(" NOT NULL");
    }
    if f.unique {
        def.push_str(" UNIQUE");
    }
    let default = match &f.default {
        Some(d) => Some(default_sql(d, &f.field_type)),
        None if f.auto && f.field_type == FieldType::Datetime => Some("NOW()".to_string()),
        None => None,
    };
    if let Some(d) = default {
        def.push_str(" DEFAULT ");
        def.push_str(&d);
    }
    def
}

fn default_sql(d: &FieldDefault, field_type: &FieldType) -> String {
    match d {
        FieldDefault::Now => "NOW()".into(),
        FieldDefault::Uuid if *field_type == FieldType::Uuid => "gen_random_uuid()".into(),
        FieldDefault::Uuid => "gen_random_uuid()::text".into(),
        FieldDefault::Value(v) => match v {
            Value::Null => "NULL".into(),
            Value::Bool(b) => b.to_string().to_uppercase(),
            Value::Number(n) => n.to_string(),
            Value::String(s) => format!("'{}'", s.replace('\'', "''")),
            other => format!("'{}'::jsonb", other.to_string().replace('\'', "''")),
        },
    }
}

/// `fk_<table>_<field>`. Names over the identifier limit are cut and end in a
/// hash of (table, field), so distinct fields keep distinct constraints.
pub fn constraint_name(table: &str, field: &str) -> String {
    let name = format!("fk_{}_{}", table, field);
    if name.len() <= MAX_IDENT {
        return name;
    }
    let digest = Sha256::digest(format!("{}.{}", table, field).as_bytes());
    let suffix: String = digest[..4].iter().map(|b| format!("{:02x}", b)).collect();
    let mut cut = MAX_IDENT - suffix.len() - 1;
    while !name.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}_{}", &name[..cut], suffix)
}

/// `ALTER TABLE .. ADD CONSTRAINT .. FOREIGN KEY`. Nullable references are cleared when the
/// target row goes away; required ones block its deletion.
pub fn foreign_key_sql(entity: &ResolvedEntity, field: &ResolvedField) -> Option<String> {
    let target = field.related_table.as_deref()?;
    let on_delete = if field.nullable { "SET NULL" } else { "RESTRICT" };
    Some(format!(
        "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE {}",
        qualified(entity, &entity.table_name),
        quote_ident(&constraint_name(&entity.table_name, &field.name)),
        quote_ident(&field.name),
        qualified(entity, target),
        quote_ident(PK_FIELD),
        on_delete
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{resolve, EntityConfig, FieldConfig, KernelConfig};
    use serde_json::json;

    fn model() -> ResolvedModel {
        let mut unit = EntityConfig::new("Unit", "catalog")
            .field(FieldConfig::char("code", 20).unique().with_default(FieldDefault::Uuid))
            .field(FieldConfig::new("active", FieldType::Boolean).with_default(FieldDefault::Value(json!(true))))
            .field(FieldConfig::foreign_key("group", "UnitGroup"));
        unit.audited = true;
        let config = KernelConfig {
            entities: vec![unit, EntityConfig::new("UnitGroup", "catalog")],
        };
        resolve(&config, "kernel").unwrap()
    }

    #[test]
    fn table_ddl_has_kernel_columns_and_defaults() {
        let model = model();
        let sql = create_table_sql(model.entity_by_name("Unit").unwrap());
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS \"kernel\".\"catalog_unit\" ("));
        assert!(sql.contains("\"id\" BIGSERIAL PRIMARY KEY"));
        assert!(sql.contains("\"external_id\" varchar(120) NOT NULL DEFAULT gen_random_uuid()::text"));
        assert!(sql.contains("\"created_date\" timestamptz NOT NULL DEFAULT NOW()"));
        assert!(sql.contains("\"created_by\" bigint,"));
        assert!(sql.contains("\"code\" varchar(20) NOT NULL UNIQUE DEFAULT gen_random_uuid()::text"));
        assert!(sql.contains("\"active\" boolean NOT NULL DEFAULT TRUE"));
        assert!(!sql.contains("REFERENCES"));
    }

    #[test]
    fn foreign_keys_target_entity_and_user_tables() {
        let model = model();
        let unit = model.entity_by_name("Unit").unwrap();
        let group = foreign_key_sql(unit, unit.field("group").unwrap()).unwrap();
        assert_eq!(
            group,
            "ALTER TABLE \"kernel\".\"catalog_unit\" ADD CONSTRAINT \"fk_catalog_unit_group\" FOREIGN KEY (\"group\") \
             REFERENCES \"kernel\".\"catalog_unitgroup\" (\"id\") ON DELETE RESTRICT"
        );
        let owner = foreign_key_sql(unit, unit.field("created_by").unwrap()).unwrap();
        assert!(owner.contains("REFERENCES \"kernel\".\"_sys_users\" (\"id\") ON DELETE SET NULL"));
    }

    #[test]
    fn long_constraint_names_are_truncated() {
        let name = constraint_name(&"t".repeat(70), "owner");
        assert_eq!(name.len(), MAX_IDENT);
        assert!(name.starts_with("fk_ttt"));
        assert_eq!(name, constraint_name(&"t".repeat(70), "owner"));
    }

    #[test]
    fn long_constraint_names_stay_distinct_per_field() {
        let table = "catalog_".to_string() + &"x".repeat(60);
        let owner = constraint_name(&table, "owner");
        let group = constraint_name(&table, "group");
        assert_ne!(owner, group);
        assert!(owner.len() <= MAX_IDENT && group.len() <= MAX_IDENT);
    }
}
