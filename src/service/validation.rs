//! Form validation: which fields a request may write and whether the values are acceptable.

use crate::config::{FieldType, ResolvedEntity, ResolvedField, ValidationRule};
use crate::error::AppError;
use crate::sql::PgBindValue;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

const REQUIRED: &str = "This field is required.";
const NOT_NULL: &str = "This field may not be null.";

/// Fields a form may write: the `form_fields` override, else every editable field.
/// Fields set by the database (`id`, timestamps) are never writable.
pub fn form_fields(entity: &ResolvedEntity) -> Vec<&ResolvedField> {
    match &entity.overrides.form_fields {
        Some(names) => names.iter().filter_map(|n| entity.field(n)).filter(|f| !f.auto).collect(),
        None => entity.editable_fields().filter(|f| !f.auto).collect(),
    }
}

/// Description of one form input, served by the create and update views.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FormFieldInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub verbose_name: String,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
}

pub fn form_schema(entity: &ResolvedEntity) -> Vec<FormFieldInfo> {
    form_fields(entity)
        .into_iter()
        .map(|f| FormFieldInfo {
            name: f.name.clone(),
            field_type: f.field_type.clone(),
            verbose_name: f.verbose_name.clone(),
            required: !f.nullable && !f.has_default(),
            max_length: f.max_length,
        })
        .collect()
}

pub struct FormValidator;

impl FormValidator {
    /// Keep the form fields present in `body` and check them. Unknown keys are dropped.
    ///
    /// With `partial` (PATCH) missing fields are not required. All field errors are
    /// collected into one `AppError::Validation`.
    pub fn clean(entity: &ResolvedEntity, body: &Map<String, Value>, partial: bool) -> Result<Map<String, Value>, AppError> {
        let mut cleaned = Map::new();
        let mut errors = BTreeMap::new();
        for f in form_fields(entity) {
            match body.get(&f.name) {
                None if partial || f.nullable || f.has_default() => {}
                None => {
                    errors.insert(f.name.clone(), REQUIRED.to_string());
                }
                Some(Value::Null) if !f.nullable => {
                    errors.insert(f.name.clone(), NOT_NULL.to_string());
                }
                Some(v) => match check_field(f, v) {
                    Ok(()) => {
                        cleaned.insert(f.name.clone(), v.clone());
                    }
                    Err(msg) => {
                        errors.insert(f.name.clone(), msg);
                    }
                },
            }
        }
        if errors.is_empty() {
            Ok(cleaned)
        } else {
            tracing::debug!(entity = %entity.name, fields = ?errors.keys().collect::<Vec<_>>(), "form rejected");
            Err(AppError::Validation(errors))
        }
    }
}

fn check_field(f: &ResolvedField, v: &Value) -> Result<(), String> {
    if v.is_null() {
        return Ok(());
    }
    if let Err(AppError::Validation(mut m)) = PgBindValue::from_field(v, f) {
        return Err(m.remove(&f.name).unwrap_or_else(|| "invalid value".into()));
    }
    if let (Some(max), Some(s)) = (f.max_length, v.as_str()) {
        if s.chars().count() > max as usize {
            return Err(format!("Ensure this field has no more than {} characters.", max));
        }
    }
    match &f.validation {
        Some(rule) => check_rule(v, rule),
        None => Ok(()),
    }
}

fn check_rule(v: &Value, rule: &ValidationRule) -> Result<(), String> {
    if let Some(format) = &rule.format {
        check_format(v, format)?;
    }
    if let Some(s) = v.as_str() {
        let len = s.chars().count();
        if let Some(max) = rule.max_length {
            if len > max as usize {
                return Err(format!("Ensure this field has no more than {} characters.", max));
            }
        }
        if let Some(min) = rule.min_length {
            if len < min as usize {
                return Err(format!("Ensure this field has at least {} characters.", min));
            }
        }
        if let Some(pattern) = &rule.pattern {
            let re = Regex::new(pattern).map_err(|_| "invalid pattern".to_string())?;
            if !re.is_match(s) {
                return Err("Enter a valid value.".into());
            }
        }
    }
    if let Some(allowed) = &rule.allowed {
        if !allowed.iter().any(|a| value_eq(v, a)) {
            return Err(format!("Select a valid choice. {} is not one of the available choices.", v));
        }
    }
    let number = v.as_f64().or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()));
    if let (Some(min), Some(n)) = (rule.minimum, number) {
        if n < min {
            return Err(format!("Ensure this value is greater than or equal to {}.", min));
        }
    }
    if let (Some(max), Some(n)) = (rule.maximum, number) {
        if n > max {
            return Err(format!("Ensure this value is less than or equal to {}.", max));
        }
    }
    Ok(())
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        _ => a == b,
    }
}

fn check_format(v: &Value, format: &str) -> Result<(), String> {
    let Some(s) = v.as_str() else {
        return Ok(());
    };
    match format.to_lowercase().as_str() {
        "email" => match s.split_once('@') {
            Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
            _ => Err("Enter a valid email address.".into()),
        },
        "uuid" => uuid::Uuid::parse_str(s)
            .map(|_| ())
            .map_err(|_| "Enter a valid UUID.".into()),
        "slug" => {
            if !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
                Ok(())
            } else {
                Err("Enter a valid slug.".into())
            }
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{resolve, EntityConfig, FieldConfig, KernelConfig};
    use serde_json::json;

    fn entity(fields: Vec<FieldConfig>) -> ResolvedEntity {
        let mut e = EntityConfig::new("Unit", "catalog");
        for f in fields {
            e = e.field(f);
        }
        let model = resolve(&KernelConfig { entities: vec![e] }, "kernel").unwrap();
        model.entities[0].as_ref().clone()
    }

    fn body(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn required_fields_are_reported_together() {
        let e = entity(vec![
            FieldConfig::char("name", 10),
            FieldConfig::new("qty", FieldType::Integer),
            FieldConfig::new("note", FieldType::Text).nullable(),
        ]);
        let err = FormValidator::clean(&e, &Map::new(), false).unwrap_err();
        let AppError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert_eq!(errors.len(), 2);
        assert_eq!(errors["name"], REQUIRED);
        assert!(FormValidator::clean(&e, &Map::new(), true).is_ok());
    }

    #[test]
    fn drops_unknown_and_non_editable_keys() {
        let e = entity(vec![FieldConfig::char("name", 10)]);
        let cleaned = FormValidator::clean(&e, &body(json!({"name": "kg", "id": 4, "bogus": 1})), false).unwrap();
        assert_eq!(Value::Object(cleaned), json!({"name": "kg"}));
    }

    #[test]
    fn checks_types_lengths_and_rules() {
        let e = entity(vec![
            FieldConfig::char("code", 3),
            FieldConfig::new("qty", FieldType::Integer).with_validation(ValidationRule {
                minimum: Some(1.0),
                ..ValidationRule::default()
            }),
            FieldConfig::char("email", 100).with_validation(ValidationRule {
                format: Some("email".into()),
                ..ValidationRule::default()
            }),
        ]);
        let err = FormValidator::clean(&e, &body(json!({"code": "abcd", "qty": 0, "email": "nope"})), false).unwrap_err();
        let AppError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert!(errors["code"].contains("no more than 3"));
        assert!(errors["qty"].contains("greater than or equal to 1"));
        assert_eq!(errors["email"], "Enter a valid email address.");

        let err = FormValidator::clean(&e, &body(json!({"qty": "many"})), true).unwrap_err();
        assert!(matches!(err, AppError::Validation(ref m) if m["qty"] == "expected an integer"));
    }

    #[test]
    fn integer_overflow_is_a_field_error() {
        let e = entity(vec![FieldConfig::new("qty", FieldType::Integer)]);
        let err = FormValidator::clean(&e, &body(json!({"qty": 3000000000i64})), false).unwrap_err();
        let AppError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert!(errors["qty"].starts_with("Ensure this value is between"));
    }

    #[test]
    fn null_only_for_nullable_fields() {
        let e = entity(vec![
            FieldConfig::char("name", 10),
            FieldConfig::new("born", FieldType::Date).nullable(),
        ]);
        let cleaned = FormValidator::clean(&e, &body(json!({"born": null})), true).unwrap();
        assert_eq!(cleaned["born"], Value::Null);
        let err = FormValidator::clean(&e, &body(json!({"name": null})), true).unwrap_err();
        assert!(matches!(err, AppError::Validation(ref m) if m["name"] == NOT_NULL));
    }

    #[test]
    fn form_schema_marks_required_inputs() {
        let e = entity(vec![
            FieldConfig::char("name", 10),
            FieldConfig::new("note", FieldType::Text).nullable(),
        ]);
        let schema = form_schema(&e);
        assert_eq!(schema.len(), 2);
        assert!(schema[0].required);
        assert_eq!(schema[0].max_length, Some(10));
        assert!(!schema[1].required);
        assert_eq!(
            serde_json::to_value(&schema[1]).unwrap(),
            json!({"name": "note", "type": "text", "verbose_name": "note", "required": false})
        );
    }

    #[test]
    fn form_fields_override_is_respected() {
        let mut e = entity(vec![FieldConfig::char("name", 10), FieldConfig::char("code", 10)]);
        e.overrides.form_fields = Some(vec!["code".into(), "id".into()]);
        let names: Vec<&str> = form_fields(&e).iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["code"]);
    }
}
