//! Resolved entity model: config validated and flattened for runtime use.

use crate::config::{FieldDefault, FieldType, FieldsetConfig, RouteKind, ValidationRule};
use std::collections::HashMap;
use std::sync::Arc;

/// Primary key column of every entity.
pub const PK_FIELD: &str = "id";

/// Target name for foreign keys to the user table of the authorization subsystem.
pub const AUTH_USER: &str = "auth.user";

/// Fields every entity carries, in this order.
pub const KERNEL_FIELDS: [&str; 4] = [PK_FIELD, "external_id", "created_date", "modified_date"];

/// Owner/audit pair carried by audited entities.
pub const AUDIT_FIELDS: [&str; 2] = ["created_by", "modified_by"];

#[derive(Clone, Debug)]
pub struct ResolvedField {
    pub name: String,
    pub field_type: FieldType,
    pub nullable: bool,
    pub unique: bool,
    pub default: Option<FieldDefault>,
    pub editable: bool,
    pub verbose_name: String,
    pub max_length: Option<u32>,
    /// Table the foreign key points at (schema-qualified at DDL time).
    pub related_table: Option<String>,
    pub validation: Option<ValidationRule>,
    /// Set by the database on insert (`id`, `created_date`, ...).
    pub auto: bool,
}

impl ResolvedField {
    pub fn is_relation(&self) -> bool {
        self.field_type.is_relation()
    }

    pub fn pg_type(&self) -> String {
        self.field_type.pg_type(self.max_length)
    }

    /// Cast of a bind parameter. Lengths are left to the column: a cast to
    /// `varchar(n)` would silently cut longer values.
    pub fn bind_type(&self) -> String {
        match self.field_type {
            FieldType::Char | FieldType::File | FieldType::Image => "varchar".into(),
            _ => self.pg_type(),
        }
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some() || self.auto
    }
}

/// Capability flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub rest: bool,
    pub admin: bool,
    pub export: bool,
}

/// Explicit overrides of the generated surfaces. `None` means "derive the default".
#[derive(Clone, Debug, Default)]
pub struct SurfaceOverrides {
    pub serializer_fields: Option<Vec<String>>,
    pub list_serializer_fields: Option<Vec<String>>,
    pub filter_fields: Option<Vec<String>>,
    pub export_fields: Option<Vec<String>>,
    pub form_fields: Option<Vec<String>>,
    pub list_display: Option<Vec<String>>,
    pub fieldsets: Option<Vec<FieldsetConfig>>,
    pub search_fields: Vec<String>,
    pub list_filter: Vec<String>,
    pub ordering: Option<Vec<String>>,
}

#[derive(Clone, Debug)]
pub struct ResolvedEntity {
    pub name: String,
    pub app_label: String,
    pub model_name: String,
    pub verbose_name: String,
    pub schema_name: String,
    pub table_name: String,
    pub alias: String,
    pub route_name: String,
    pub uri_field: String,
    pub detail_suffix: String,
    pub capabilities: Capabilities,
    pub audited: bool,
    /// Kernel base fields first, then declared fields, in declaration order.
    pub fields: Vec<ResolvedField>,
    pub overrides: SurfaceOverrides,
    /// Site routes in registration order.
    pub routes: Vec<RouteKind>,
}

impl ResolvedEntity {
    pub fn field(&self, name: &str) -> Option<&ResolvedField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Fields that are not relations, in declaration order.
    pub fn scalar_fields(&self) -> impl Iterator<Item = &ResolvedField> {
        self.fields.iter().filter(|f| !f.is_relation())
    }

    pub fn editable_fields(&self) -> impl Iterator<Item = &ResolvedField> {
        self.fields.iter().filter(|f| f.editable)
    }

    /// Key of the admin registry: (app_label, model_name).
    pub fn admin_key(&self) -> (String, String) {
        (self.app_label.clone(), self.model_name.clone())
    }
}

#[derive(Clone, Debug, Default)]
pub struct ResolvedModel {
    pub entities: Vec<Arc<ResolvedEntity>>,
    /// `route_name/model_name` -> index.
    pub entity_by_api_path: HashMap<String, usize>,
    /// (app_label, model_name) -> index.
    pub entity_by_admin_key: HashMap<(String, String), usize>,
}

impl ResolvedModel {
    pub fn entity_by_api_path(&self, route_name: &str, model_name: &str) -> Option<&Arc<ResolvedEntity>> {
        self.entity_by_api_path
            .get(&format!("{}/{}", route_name, model_name))
            .map(|&i| &self.entities[i])
            .filter(|e| e.capabilities.rest)
    }

    pub fn entity_by_admin_key(&self, app_label: &str, model_name: &str) -> Option<&Arc<ResolvedEntity>> {
        self.entity_by_admin_key
            .get(&(app_label.to_string(), model_name.to_string()))
            .map(|&i| &self.entities[i])
            .filter(|e| e.capabilities.admin)
    }

    pub fn entity_by_name(&self, name: &str) -> Option<&Arc<ResolvedEntity>> {
        self.entities.iter().find(|e| e.name == name)
    }
}
