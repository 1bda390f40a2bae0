//! Convert serde_json::Value into values sqlx can bind, guided by the field type.

use crate::config::{FieldType, ResolvedField};
use crate::error::AppError;
use serde_json::Value;
use sqlx::encode::{Encode, IsNull};
use sqlx::postgres::{PgTypeInfo, Postgres};
use sqlx::Database;

/// A value that can be bound to a PostgreSQL query. Placeholders are always
/// cast to the column type (`$1::date`), so text carries dates, uuids and decimals.
#[derive(Clone, Debug, PartialEq)]
pub enum PgBindValue {
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    Text(String),
    Json(Value),
}

fn type_error(field: &ResolvedField, expected: &str) -> AppError {
    AppError::invalid(field.name.clone(), format!("expected {}", expected))
}

impl PgBindValue {
    /// Convert `v` for binding to `field`. Strings are accepted for numbers and booleans
    /// (query parameters arrive as text).
    pub fn from_field(v: &Value, field: &ResolvedField) -> Result<Self, AppError> {
        if v.is_null() {
            return Ok(PgBindValue::Null);
        }
        Ok(match field.field_type {
            FieldType::Integer | FieldType::BigInteger | FieldType::ForeignKey => {
                let n = match v {
                    Value::Number(n) => n.as_i64().ok_or_else(|| type_error(field, "an integer"))?,
                    Value::String(s) => s.trim().parse().map_err(|_| type_error(field, "an integer"))?,
                    _ => return Err(type_error(field, "an integer")),
                };
                // `integer` columns are 32-bit
                if field.field_type == FieldType::Integer && i32::try_from(n).is_err() {
                    return Err(AppError::invalid(
                        field.name.clone(),
                        format!("Ensure this value is between {} and {}.", i32::MIN, i32::MAX),
                    ));
                }
                PgBindValue::I64(n)
            }
            FieldType::Float => match v {
                Value::Number(n) => PgBindValue::F64(n.as_f64().ok_or_else(|| type_error(field, "a number"))?),
                Value::String(s) => PgBindValue::F64(s.trim().parse().map_err(|_| type_error(field, "a number"))?),
                _ => return Err(type_error(field, "a number")),
            },
            FieldType::Decimal => match v {
                Value::Number(n) => PgBindValue::Text(n.to_string()),
                Value::String(s) if s.trim().parse::<f64>().is_ok() => PgBindValue::Text(s.trim().to_string()),
                _ => return Err(type_error(field, "a decimal number")),
            },
            FieldType::Boolean => match v {
                Value::Bool(b) => PgBindValue::Bool(*b),
                Value::String(s) if s.eq_ignore_ascii_case("true") || s == "1" => PgBindValue::Bool(true),
                Value::String(s) if s.eq_ignore_ascii_case("false") || s == "0" => PgBindValue::Bool(false),
                _ => return Err(type_error(field, "a boolean")),
            },
            FieldType::Uuid => match v {
                Value::String(s) => {
                    let u = uuid::Uuid::parse_str(s.trim()).map_err(|_| type_error(field, "a UUID"))?;
                    PgBindValue::Text(u.to_string())
                }
                _ => return Err(type_error(field, "a UUID")),
            },
            FieldType::Date => match v {
                Value::String(s) => {
                    chrono::NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                        .map_err(|_| type_error(field, "a date (YYYY-MM-DD)"))?;
                    PgBindValue::Text(s.trim().to_string())
                }
                _ => return Err(type_error(field, "a date (YYYY-MM-DD)")),
            },
            FieldType::Datetime => match v {
                Value::String(s) => {
                    let s = s.trim();
                    let ok = chrono::DateTime::parse_from_rfc3339(s).is_ok()
                        || chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
                        || chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").is_ok();
                    if !ok {
                        return Err(type_error(field, "an RFC 3339 datetime"));
                    }
                    PgBindValue::Text(s.to_string())
                }
                _ => return Err(type_error(field, "an RFC 3339 datetime")),
            },
            FieldType::Json => PgBindValue::Json(v.clone()),
            FieldType::Char | FieldType::Text | FieldType::File | FieldType::Image => match v {
                Value::String(s) => PgBindValue::Text(s.clone()),
                Value::Number(n) => PgBindValue::Text(n.to_string()),
                Value::Bool(b) => PgBindValue::Text(b.to_string()),
                _ => return Err(type_error(field, "a string")),
            },
        })
    }
}

impl<'q> Encode<'q, Postgres> for PgBindValue {
    fn encode_by_ref(
        &self,
        buf: &mut <Postgres as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, Box<dyn std::error::Error + Send + Sync>> {
        Ok(match self {
            PgBindValue::Null => <Option<String> as Encode<Postgres>>::encode_by_ref(&None, buf)?,
            PgBindValue::Bool(b) => <bool as Encode<Postgres>>::encode_by_ref(b, buf)?,
            PgBindValue::I64(n) => <i64 as Encode<Postgres>>::encode_by_ref(n, buf)?,
            PgBindValue::F64(n) => <f64 as Encode<Postgres>>::encode_by_ref(n, buf)?,
            PgBindValue::Text(s) => <&str as Encode<Postgres>>::encode_by_ref(&s.as_str(), buf)?,
            PgBindValue::Json(v) => <Value as Encode<Postgres>>::encode_by_ref(v, buf)?,
        })
    }

    fn produces(&self) -> Option<PgTypeInfo> {
        Some(match self {
            PgBindValue::Null | PgBindValue::Text(_) => PgTypeInfo::with_name("TEXT"),
            PgBindValue::Bool(_) => PgTypeInfo::with_name("BOOL"),
            PgBindValue::I64(_) => PgTypeInfo::with_name("INT8"),
            PgBindValue::F64(_) => PgTypeInfo::with_name("FLOAT8"),
            PgBindValue::Json(_) => PgTypeInfo::with_name("JSONB"),
        })
    }
}

impl sqlx::Type<Postgres> for PgBindValue {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_name("TEXT")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{resolve, EntityConfig, FieldConfig, KernelConfig};
    use serde_json::json;

    fn field(f: FieldConfig) -> ResolvedField {
        let config = KernelConfig {
            entities: vec![EntityConfig::new("Thing", "t").field(f.clone())],
        };
        let model = resolve(&config, "kernel").unwrap();
        model.entities[0].field(&f.name).unwrap().clone()
    }

    #[test]
    fn integers_accept_numbers_and_numeric_strings() {
        let f = field(FieldConfig::new("qty", FieldType::Integer));
        assert_eq!(PgBindValue::from_field(&json!(5), &f).unwrap(), PgBindValue::I64(5));
        assert_eq!(PgBindValue::from_field(&json!(" 12 "), &f).unwrap(), PgBindValue::I64(12));
        assert!(PgBindValue::from_field(&json!("x"), &f).is_err());
        assert!(PgBindValue::from_field(&json!(1.5), &f).is_err());
    }

    #[test]
    fn integer_fields_stay_within_32_bits() {
        let f = field(FieldConfig::new("qty", FieldType::Integer));
        assert_eq!(PgBindValue::from_field(&json!(2147483647), &f).unwrap(), PgBindValue::I64(2147483647));
        assert!(PgBindValue::from_field(&json!(3000000000i64), &f).is_err());
        assert!(PgBindValue::from_field(&json!("-2147483649"), &f).is_err());

        let big = field(FieldConfig::new("total", FieldType::BigInteger));
        assert_eq!(PgBindValue::from_field(&json!(3000000000i64), &big).unwrap(), PgBindValue::I64(3000000000));
    }

    #[test]
    fn null_binds_as_null_for_any_type() {
        let f = field(FieldConfig::new("born", FieldType::Date));
        assert_eq!(PgBindValue::from_field(&Value::Null, &f).unwrap(), PgBindValue::Null);
    }

    #[test]
    fn dates_uuids_and_booleans_are_checked() {
        let d = field(FieldConfig::new("born", FieldType::Date));
        assert!(PgBindValue::from_field(&json!("2024-02-29"), &d).is_ok());
        assert!(PgBindValue::from_field(&json!("2023-02-29"), &d).is_err());

        let u = field(FieldConfig::new("token", FieldType::Uuid));
        assert!(PgBindValue::from_field(&json!("not-a-uuid"), &u).is_err());

        let b = field(FieldConfig::new("active", FieldType::Boolean));
        assert_eq!(PgBindValue::from_field(&json!("TRUE"), &b).unwrap(), PgBindValue::Bool(true));
        assert_eq!(PgBindValue::from_field(&json!("0"), &b).unwrap(), PgBindValue::Bool(false));
    }

    #[test]
    fn json_fields_bind_structured_values() {
        let f = field(FieldConfig::new("meta", FieldType::Json));
        assert_eq!(
            PgBindValue::from_field(&json!({"a": [1]}), &f).unwrap(),
            PgBindValue::Json(json!({"a": [1]}))
        );
    }
}
