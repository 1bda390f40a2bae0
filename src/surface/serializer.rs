//! Serialization schemas: which fields an entity exposes, and projection of rows onto them.

use crate::config::ResolvedEntity;
use crate::surface::Serializable;
use crate::surface::filter::FilterSchema;
use serde_json::{Map, Value};

fn scalar_names(entity: &ResolvedEntity) -> Vec<String> {
    entity.scalar_fields().map(|f| f.name.clone()).collect()
}

impl Serializable for ResolvedEntity {
    /// Every non-relational field in declaration order, unless `serializer_fields` lists them
    /// (an explicit list may name relations).
    fn serializer_schema(&self) -> Vec<String> {
        self.overrides
            .serializer_fields
            .clone()
            .unwrap_or_else(|| scalar_names(self))
    }

    fn list_serializer_schema(&self) -> Vec<String> {
        self.overrides
            .list_serializer_fields
            .clone()
            .unwrap_or_else(|| self.serializer_schema())
    }

    fn filter_schema(&self) -> FilterSchema {
        let names = self
            .overrides
            .filter_fields
            .clone()
            .unwrap_or_else(|| self.serializer_schema());
        FilterSchema::for_fields(self, &names)
    }
}

/// Keep `fields` of `row`, in that order. Missing keys become null.
pub fn project(row: &Value, fields: &[String]) -> Value {
    let mut out = Map::with_capacity(fields.len());
    for name in fields {
        out.insert(name.clone(), row.get(name).cloned().unwrap_or(Value::Null));
    }
    Value::Object(out)
}

pub fn project_all(rows: &[Value], fields: &[String]) -> Vec<Value> {
    rows.iter().map(|r| project(r, fields)).collect()
}
