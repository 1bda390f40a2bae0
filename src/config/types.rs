//! Raw entity configuration, as written in `entities.json` or built in code.

use serde::{Deserialize, Serialize};

/// Storage type of a field. `ForeignKey` is the only relational type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Integer,
    BigInteger,
    Float,
    Decimal,
    Boolean,
    Char,
    Text,
    Date,
    Datetime,
    Uuid,
    Json,
    File,
    Image,
    ForeignKey,
}

impl FieldType {
    pub fn is_relation(&self) -> bool {
        matches!(self, FieldType::ForeignKey)
    }

    /// PostgreSQL type used for DDL and parameter casts.
    pub fn pg_type(&self, max_length: Option<u32>) -> String {
        match self {
            FieldType::Integer => "integer".into(),
            FieldType::BigInteger | FieldType::ForeignKey => "bigint".into(),
            FieldType::Float => "double precision".into(),
            FieldType::Decimal => "numeric".into(),
            FieldType::Boolean => "boolean".into(),
            FieldType::Char | FieldType::File | FieldType::Image => {
                format!("varchar({})", max_length.unwrap_or(255))
            }
            FieldType::Text => "text".into(),
            FieldType::Date => "date".into(),
            FieldType::Datetime => "timestamptz".into(),
            FieldType::Uuid => "uuid".into(),
            FieldType::Json => "jsonb".into(),
        }
    }
}

/// Database default for a field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldDefault {
    /// A literal JSON value (string, number, bool).
    Value(serde_json::Value),
    /// `gen_random_uuid()` (cast to the field type).
    Uuid,
    /// `NOW()`.
    Now,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationRule {
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub min_length: Option<u32>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub allowed: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub minimum: Option<f64>,
    #[serde(default)]
    pub maximum: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub type_: FieldType,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub default: Option<FieldDefault>,
    #[serde(default = "default_true")]
    pub editable: bool,
    #[serde(default)]
    pub verbose_name: Option<String>,
    #[serde(default)]
    pub max_length: Option<u32>,
    /// Target of a foreign key: an entity name from the same config, or `auth.user`.
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub validation: Option<ValidationRule>,
}

fn default_true() -> bool {
    true
}

impl FieldConfig {
    pub fn new(name: impl Into<String>, type_: FieldType) -> Self {
        FieldConfig {
            name: name.into(),
            type_,
            nullable: false,
            unique: false,
            default: None,
            editable: true,
            verbose_name: None,
            max_length: None,
            to: None,
            validation: None,
        }
    }

    pub fn char(name: impl Into<String>, max_length: u32) -> Self {
        FieldConfig {
            max_length: Some(max_length),
            ..FieldConfig::new(name, FieldType::Char)
        }
    }

    pub fn foreign_key(name: impl Into<String>, to: impl Into<String>) -> Self {
        FieldConfig {
            to: Some(to.into()),
            ..FieldConfig::new(name, FieldType::ForeignKey)
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn with_default(mut self, default: FieldDefault) -> Self {
        self.default = Some(default);
        self
    }

    pub fn read_only(mut self) -> Self {
        self.editable = false;
        self
    }

    pub fn with_validation(mut self, rule: ValidationRule) -> Self {
        self.validation = Some(rule);
        self
    }
}

/// Site routes an entity can register. Order in `EntityConfig::routes` is registration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteKind {
    Create,
    Delete,
    Detail,
    DetailExport,
    Export,
    List,
    Update,
}

impl RouteKind {
    /// Default registration order.
    pub const ALL: [RouteKind; 7] = [
        RouteKind::Create,
        RouteKind::Delete,
        RouteKind::Detail,
        RouteKind::DetailExport,
        RouteKind::Export,
        RouteKind::List,
        RouteKind::Update,
    ];

    pub fn is_export(&self) -> bool {
        matches!(self, RouteKind::Export | RouteKind::DetailExport)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldsetConfig {
    #[serde(default)]
    pub title: Option<String>,
    pub fields: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntityConfig {
    pub name: String,
    pub app_label: String,
    #[serde(default)]
    pub verbose_name: Option<String>,
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub rest: bool,
    #[serde(default)]
    pub admin: bool,
    #[serde(default)]
    pub export: bool,
    #[serde(default)]
    pub route_name: Option<String>,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub uri_field: Option<String>,
    #[serde(default)]
    pub detail_suffix: Option<String>,
    #[serde(default)]
    pub audited: bool,
    #[serde(default)]
    pub fields: Vec<FieldConfig>,
    #[serde(default)]
    pub serializer_fields: Option<Vec<String>>,
    #[serde(default)]
    pub list_serializer_fields: Option<Vec<String>>,
    #[serde(default)]
    pub filter_fields: Option<Vec<String>>,
    #[serde(default)]
    pub export_fields: Option<Vec<String>>,
    #[serde(default)]
    pub form_fields: Option<Vec<String>>,
    #[serde(default)]
    pub list_display: Option<Vec<String>>,
    #[serde(default)]
    pub fieldsets: Option<Vec<FieldsetConfig>>,
    #[serde(default)]
    pub search_fields: Vec<String>,
    #[serde(default)]
    pub list_filter: Vec<String>,
    #[serde(default)]
    pub ordering: Option<Vec<String>>,
    #[serde(default)]
    pub routes: Option<Vec<RouteKind>>,
}

impl EntityConfig {
    pub fn new(name: impl Into<String>, app_label: impl Into<String>) -> Self {
        EntityConfig {
            name: name.into(),
            app_label: app_label.into(),
            verbose_name: None,
            table: None,
            rest: false,
            admin: false,
            export: false,
            route_name: None,
            alias: None,
            uri_field: None,
            detail_suffix: None,
            audited: false,
            fields: Vec::new(),
            serializer_fields: None,
            list_serializer_fields: None,
            filter_fields: None,
            export_fields: None,
            form_fields: None,
            list_display: None,
            fieldsets: None,
            search_fields: Vec::new(),
            list_filter: Vec::new(),
            ordering: None,
            routes: None,
        }
    }

    pub fn field(mut self, field: FieldConfig) -> Self {
        self.fields.push(field);
        self
    }
}

/// All entities of an application, in declaration order.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct KernelConfig {
    #[serde(default)]
    pub entities: Vec<EntityConfig>,
}
