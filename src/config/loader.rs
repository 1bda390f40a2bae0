//! Load entity config from JSON and resolve it into the runtime model.

use crate::case::{model_name, verbose_name};
use crate::config::resolved::{
    Capabilities, ResolvedEntity, ResolvedField, ResolvedModel, SurfaceOverrides, AUTH_USER, PK_FIELD,
};
use crate::config::types::*;
use crate::config::validate;
use crate::error::ConfigError;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Table backing `auth.user` foreign keys (see `store::ensure_auth_tables`).
pub const USERS_TABLE: &str = "_sys_users";

/// Parse an `entities.json` document.
pub fn load_from_str(raw: &str) -> Result<KernelConfig, ConfigError> {
    serde_json::from_str(raw).map_err(|e| ConfigError::Load(e.to_string()))
}

/// Read and parse an `entities.json` file.
pub async fn load_from_path(path: impl AsRef<Path>) -> Result<KernelConfig, ConfigError> {
    let path = path.as_ref();
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    load_from_str(&raw)
}

fn base_field(name: &str, field_type: FieldType, verbose: &str) -> ResolvedField {
    ResolvedField {
        name: name.to_string(),
        field_type,
        nullable: false,
        unique: false,
        default: None,
        editable: false,
        verbose_name: verbose.to_string(),
        max_length: None,
        related_table: None,
        validation: None,
        auto: false,
    }
}

/// Fields every entity starts with, plus the owner/audit pair when audited.
fn kernel_fields(audited: bool) -> Vec<ResolvedField> {
    let mut fields = vec![
        ResolvedField {
            auto: true,
            ..base_field(PK_FIELD, FieldType::BigInteger, "ID")
        },
        ResolvedField {
            max_length: Some(120),
            default: Some(FieldDefault::Uuid),
            ..base_field("external_id", FieldType::Char, "external id")
        },
        ResolvedField {
            auto: true,
            ..base_field("created_date", FieldType::Datetime, "created")
        },
        ResolvedField {
            auto: true,
            ..base_field("modified_date", FieldType::Datetime, "modified")
        },
    ];
    if audited {
        fields.push(ResolvedField {
            nullable: true,
            editable: true,
            related_table: Some(USERS_TABLE.to_string()),
            ..base_field("created_by", FieldType::ForeignKey, "created by")
        });
        fields.push(ResolvedField {
            nullable: true,
            related_table: Some(USERS_TABLE.to_string()),
            ..base_field("modified_by", FieldType::ForeignKey, "modified by")
        });
    }
    fields
}

fn table_name(e: &EntityConfig) -> String {
    e.table
        .clone()
        .unwrap_or_else(|| format!("{}_{}", e.app_label, model_name(&e.name)))
}

/// Build the resolved model (validates first). `schema` is the PostgreSQL schema holding entity tables.
pub fn resolve(config: &KernelConfig, schema: &str) -> Result<ResolvedModel, ConfigError> {
    validate(config)?;

    let tables_by_name: HashMap<&str, String> = config
        .entities
        .iter()
        .map(|e| (e.name.as_str(), table_name(e)))
        .collect();

    let mut model = ResolvedModel::default();
    for e in &config.entities {
        let mut fields = kernel_fields(e.audited);
        for f in &e.fields {
            let related_table = match (&f.type_, f.to.as_deref()) {
                (FieldType::ForeignKey, Some(AUTH_USER)) => Some(USERS_TABLE.to_string()),
                (FieldType::ForeignKey, Some(to)) => Some(tables_by_name.get(to).cloned().ok_or_else(|| {
                    ConfigError::MissingReference {
                        kind: "entity",
                        id: to.to_string(),
                    }
                })?),
                _ => None,
            };
            fields.push(ResolvedField {
                name: f.name.clone(),
                field_type: f.type_.clone(),
                nullable: f.nullable,
                unique: f.unique,
                default: f.default.clone(),
                editable: f.editable,
                verbose_name: f.verbose_name.clone().unwrap_or_else(|| f.name.replace('_', " ")),
                max_length: f.max_length.or(match f.type_ {
                    FieldType::Char | FieldType::File | FieldType::Image => Some(255),
                    _ => None,
                }),
                related_table,
                validation: f.validation.clone(),
                auto: false,
            });
        }

        let model_name = model_name(&e.name);
        let routes = match &e.routes {
            Some(routes) => routes.clone(),
            None => RouteKind::ALL
                .into_iter()
                .filter(|r| e.export || !r.is_export())
                .collect(),
        };
        let entity = ResolvedEntity {
            name: e.name.clone(),
            app_label: e.app_label.clone(),
            verbose_name: e.verbose_name.clone().unwrap_or_else(|| verbose_name(&e.name)),
            schema_name: schema.to_string(),
            table_name: table_name(e),
            alias: e.alias.clone().unwrap_or_else(|| model_name.clone()),
            route_name: e.route_name.clone().unwrap_or_else(|| "kernel".into()),
            uri_field: e.uri_field.clone().unwrap_or_else(|| PK_FIELD.into()),
            detail_suffix: e.detail_suffix.clone().unwrap_or_else(|| ".html".into()),
            capabilities: Capabilities {
                rest: e.rest,
                admin: e.admin,
                export: e.export,
            },
            audited: e.audited,
            fields,
            overrides: SurfaceOverrides {
                serializer_fields: e.serializer_fields.clone(),
                list_serializer_fields: e.list_serializer_fields.clone(),
                filter_fields: e.filter_fields.clone(),
                export_fields: e.export_fields.clone(),
                form_fields: e.form_fields.clone(),
                list_display: e.list_display.clone(),
                fieldsets: e.fieldsets.clone(),
                search_fields: e.search_fields.clone(),
                list_filter: e.list_filter.clone(),
                ordering: e.ordering.clone(),
            },
            routes,
            model_name,
        };

        let index = model.entities.len();
        model
            .entity_by_api_path
            .insert(format!("{}/{}", entity.route_name, entity.model_name), index);
        model.entity_by_admin_key.insert(entity.admin_key(), index);
        tracing::debug!(
            entity = %entity.name,
            table = %entity.table_name,
            rest = entity.capabilities.rest,
            admin = entity.capabilities.admin,
            "resolved entity"
        );
        model.entities.push(Arc::new(entity));
    }
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "entities": [
            {
                "name": "UnitGroup",
                "app_label": "catalog",
                "fields": [{"name": "name", "type": "char", "max_length": 100}]
            },
            {
                "name": "Unit",
                "app_label": "catalog",
                "rest": true,
                "admin": true,
                "export": true,
                "audited": true,
                "route_name": "unit",
                "fields": [
                    {"name": "code", "type": "char", "unique": true, "default": "uuid"},
                    {"name": "name", "type": "char"},
                    {"name": "group", "type": "foreign_key", "to": "UnitGroup", "nullable": true}
                ],
                "search_fields": ["code", "name"]
            }
        ]
    }"#;

    fn resolved() -> ResolvedModel {
        resolve(&load_from_str(SAMPLE).unwrap(), "kernel").unwrap()
    }

    #[test]
    fn injects_kernel_and_audit_fields_first() {
        let model = resolved();
        let unit = model.entity_by_name("Unit").unwrap();
        let names: Vec<&str> = unit.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(
            names,
            [
                "id",
                "external_id",
                "created_date",
                "modified_date",
                "created_by",
                "modified_by",
                "code",
                "name",
                "group"
            ]
        );
        let group = model.entity_by_name("UnitGroup").unwrap();
        assert_eq!(group.fields.len(), 5);
    }

    #[test]
    fn derives_names_and_defaults() {
        let model = resolved();
        let unit = model.entity_by_name("Unit").unwrap();
        assert_eq!(unit.model_name, "unit");
        assert_eq!(unit.alias, "unit");
        assert_eq!(unit.table_name, "catalog_unit");
        assert_eq!(unit.uri_field, "id");
        assert_eq!(unit.detail_suffix, ".html");
        assert_eq!(unit.field("name").unwrap().max_length, Some(255));
        assert_eq!(
            unit.field("group").unwrap().related_table.as_deref(),
            Some("catalog_unitgroup")
        );
        let group = model.entity_by_name("UnitGroup").unwrap();
        assert_eq!(group.verbose_name, "unit group");
        assert_eq!(group.route_name, "kernel");
    }

    #[test]
    fn default_routes_follow_export_capability() {
        let model = resolved();
        let unit = model.entity_by_name("Unit").unwrap();
        assert_eq!(unit.routes, RouteKind::ALL.to_vec());
        let group = model.entity_by_name("UnitGroup").unwrap();
        assert!(group.routes.iter().all(|r| !r.is_export()));
        assert_eq!(group.routes.len(), 5);
    }

    #[test]
    fn lookups_respect_capabilities() {
        let model = resolved();
        assert!(model.entity_by_api_path("unit", "unit").is_some());
        assert!(model.entity_by_api_path("kernel", "unitgroup").is_none());
        assert!(model.entity_by_admin_key("catalog", "unit").is_some());
        assert!(model.entity_by_admin_key("catalog", "unitgroup").is_none());
    }

    #[test]
    fn malformed_json_is_a_load_error() {
        assert!(matches!(load_from_str("{\"entities\": 3}"), Err(ConfigError::Load(_))));
    }
}
