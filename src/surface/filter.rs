//! Filter schema: which query parameters narrow a list, and how.

use crate::config::{FieldType, ResolvedEntity, PK_FIELD};
use crate::sql::{Filter, FilterOp};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

/// Suffix of the IN variant of every filter parameter (`name_list=a,b`).
pub const LIST_SUFFIX: &str = "_list";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Lookup {
    Exact,
    IContains,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FilterField {
    pub name: String,
    pub lookup: Lookup,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FilterSchema {
    pub fields: Vec<FilterField>,
}

impl FilterSchema {
    /// File and image paths filter by containment, everything else by equality.
    pub fn for_fields(entity: &ResolvedEntity, names: &[String]) -> Self {
        let fields = names
            .iter()
            .filter_map(|n| entity.field(n))
            .map(|f| FilterField {
                name: f.name.clone(),
                lookup: match f.field_type {
                    FieldType::File | FieldType::Image => Lookup::IContains,
                    _ => Lookup::Exact,
                },
            })
            .collect();
        FilterSchema { fields }
    }

    /// Turn query parameters into filters. Unknown and empty parameters are ignored;
    /// `id_list` is always accepted.
    pub fn parse(&self, params: &HashMap<String, String>) -> Vec<Filter> {
        let mut filters = Vec::new();
        for field in &self.fields {
            if let Some(v) = params.get(&field.name).filter(|v| !v.is_empty()) {
                filters.push(Filter {
                    field: field.name.clone(),
                    op: match field.lookup {
                        Lookup::Exact => FilterOp::Eq(Value::String(v.clone())),
                        Lookup::IContains => FilterOp::IContains(v.clone()),
                    },
                });
            }
            if field.name != PK_FIELD {
                push_in_filter(&mut filters, &field.name, params);
            }
        }
        push_in_filter(&mut filters, PK_FIELD, params);
        filters
    }
}

fn push_in_filter(filters: &mut Vec<Filter>, name: &str, params: &HashMap<String, String>) {
    let Some(raw) = params.get(&format!("{}{}", name, LIST_SUFFIX)) else {
        return;
    };
    let values: Vec<Value> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| Value::String(s.to_string()))
        .collect();
    if !values.is_empty() {
        filters.push(Filter {
            field: name.to_string(),
            op: FilterOp::In(values),
        });
    }
}
