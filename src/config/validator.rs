//! Config validation: referential integrity and surface consistency.

use crate::case::model_name;
use crate::config::resolved::{AUDIT_FIELDS, AUTH_USER, KERNEL_FIELDS};
use crate::config::{EntityConfig, FieldType, KernelConfig};
use crate::error::ConfigError;
use std::collections::HashSet;

/// First path segments owned by the generated routers; an alias may not shadow them.
pub const RESERVED_ALIASES: &[&str] = &["admin", "api", "health", "ready", "version", "info"];

/// Names of all fields an entity will carry after resolution.
pub fn field_names(entity: &EntityConfig) -> Vec<&str> {
    let mut names: Vec<&str> = KERNEL_FIELDS.to_vec();
    if entity.audited {
        names.extend(AUDIT_FIELDS);
    }
    names.extend(entity.fields.iter().map(|f| f.name.as_str()));
    names
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty()
        && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !s.starts_with(|c: char| c.is_ascii_digit())
}

pub fn validate(config: &KernelConfig) -> Result<(), ConfigError> {
    let entity_names: HashSet<&str> = config.entities.iter().map(|e| e.name.as_str()).collect();
    let mut seen_names = HashSet::new();
    let mut seen_admin_keys = HashSet::new();
    let mut seen_aliases = HashSet::new();
    let mut seen_api_paths = HashSet::new();

    for e in &config.entities {
        if !is_identifier(&e.name) || !is_identifier(&e.app_label) {
            return Err(ConfigError::Validation(format!(
                "entity '{}' / app '{}': names must be identifiers",
                e.name, e.app_label
            )));
        }
        if !seen_names.insert(e.name.as_str()) {
            return Err(ConfigError::DuplicateEntity(e.name.clone()));
        }
        let model = model_name(&e.name);
        if !seen_admin_keys.insert((e.app_label.clone(), model.clone())) {
            return Err(ConfigError::DuplicateEntity(format!("{}.{}", e.app_label, model)));
        }

        let alias = e.alias.clone().unwrap_or_else(|| model.clone());
        if alias.is_empty() || alias.contains('/') || alias.contains(':') || RESERVED_ALIASES.contains(&alias.as_str()) {
            return Err(ConfigError::Validation(format!("entity {}: invalid alias '{}'", e.name, alias)));
        }
        if !seen_aliases.insert(alias.clone()) {
            return Err(ConfigError::DuplicateRoute(format!("/{}/", alias)));
        }
        if e.rest {
            let route = e.route_name.as_deref().unwrap_or("kernel");
            let api_path = format!("{}/{}", route, model);
            if !seen_api_paths.insert(api_path.clone()) {
                return Err(ConfigError::DuplicateRoute(api_path));
            }
        }

        validate_fields(e, &entity_names)?;
        validate_overrides(e)?;
        validate_routes(e)?;
    }
    Ok(())
}

fn validate_fields(e: &EntityConfig, entity_names: &HashSet<&str>) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for name in field_names(e) {
        if !is_identifier(name) {
            return Err(ConfigError::Validation(format!("entity {}: invalid field name '{}'", e.name, name)));
        }
        if !seen.insert(name) {
            return Err(ConfigError::Validation(format!("entity {}: duplicate field '{}'", e.name, name)));
        }
    }
    for f in &e.fields {
        if f.type_ == FieldType::ForeignKey {
            let to = f.to.as_deref().ok_or_else(|| {
                ConfigError::Validation(format!("entity {}: foreign key '{}' has no target", e.name, f.name))
            })?;
            if to != AUTH_USER && !entity_names.contains(to) {
                return Err(ConfigError::MissingReference {
                    kind: "entity",
                    id: to.to_string(),
                });
            }
        }
        if let Some(pattern) = f.validation.as_ref().and_then(|r| r.pattern.as_deref()) {
            regex::Regex::new(pattern).map_err(|err| {
                ConfigError::Validation(format!("entity {}: field {}: bad pattern: {}", e.name, f.name, err))
            })?;
        }
    }
    Ok(())
}

fn validate_overrides(e: &EntityConfig) -> Result<(), ConfigError> {
    let known: HashSet<&str> = field_names(e).into_iter().collect();
    let check = |list: &'static str, names: &[String]| -> Result<(), ConfigError> {
        for n in names {
            let bare = n.strip_prefix('-').unwrap_or(n);
            if !known.contains(bare) {
                return Err(ConfigError::UnknownField {
                    entity: e.name.clone(),
                    list,
                    field: n.clone(),
                });
            }
        }
        Ok(())
    };

    let optional_lists: [(&'static str, &Option<Vec<String>>); 7] = [
        ("serializer_fields", &e.serializer_fields),
        ("list_serializer_fields", &e.list_serializer_fields),
        ("filter_fields", &e.filter_fields),
        ("export_fields", &e.export_fields),
        ("form_fields", &e.form_fields),
        ("list_display", &e.list_display),
        ("ordering", &e.ordering),
    ];
    for (list, names) in optional_lists {
        if let Some(names) = names {
            check(list, names)?;
        }
    }
    check("search_fields", &e.search_fields)?;
    check("list_filter", &e.list_filter)?;
    if let Some(fieldsets) = &e.fieldsets {
        for fs in fieldsets {
            check("fieldsets", &fs.fields)?;
        }
    }
    if let Some(uri) = &e.uri_field {
        check("uri_field", std::slice::from_ref(uri))?;
    }
    Ok(())
}

fn validate_routes(e: &EntityConfig) -> Result<(), ConfigError> {
    let Some(routes) = &e.routes else { return Ok(()) };
    let mut seen = HashSet::new();
    for r in routes {
        if !seen.insert(*r) {
            return Err(ConfigError::DuplicateRoute(format!("{}: {:?}", e.name, r)));
        }
        if r.is_export() && !e.export {
            return Err(ConfigError::Validation(format!(
                "entity {}: route {:?} requires export to be enabled",
                e.name, r
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FieldConfig, RouteKind};

    fn unit() -> EntityConfig {
        EntityConfig::new("Unit", "catalog")
            .field(FieldConfig::char("code", 255))
            .field(FieldConfig::char("name", 255))
    }

    fn config(entities: Vec<EntityConfig>) -> KernelConfig {
        KernelConfig { entities }
    }

    #[test]
    fn accepts_minimal_entity() {
        assert!(validate(&config(vec![unit()])).is_ok());
    }

    #[test]
    fn rejects_duplicate_alias() {
        let mut other = EntityConfig::new("Measure", "catalog");
        other.alias = Some("unit".into());
        let err = validate(&config(vec![unit(), other])).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateRoute(_)));
    }

    #[test]
    fn rejects_reserved_alias() {
        let mut e = unit();
        e.alias = Some("admin".into());
        assert!(validate(&config(vec![e])).is_err());
    }

    #[test]
    fn rejects_unknown_override_field() {
        let mut e = unit();
        e.list_display = Some(vec!["id".into(), "missing".into()]);
        let err = validate(&config(vec![e])).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownField { list: "list_display", .. }));
    }

    #[test]
    fn audit_fields_are_known_only_when_audited() {
        let mut e = unit();
        e.list_display = Some(vec!["created_by".into()]);
        assert!(validate(&config(vec![e.clone()])).is_err());
        e.audited = true;
        assert!(validate(&config(vec![e])).is_ok());
    }

    #[test]
    fn ordering_allows_descending_prefix() {
        let mut e = unit();
        e.ordering = Some(vec!["-name".into()]);
        assert!(validate(&config(vec![e])).is_ok());
    }

    #[test]
    fn foreign_key_target_must_exist() {
        let e = unit().field(FieldConfig::foreign_key("group", "UnitGroup"));
        let err = validate(&config(vec![e])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingReference { kind: "entity", .. }));

        let e = unit().field(FieldConfig::foreign_key("owner", AUTH_USER));
        assert!(validate(&config(vec![e])).is_ok());
    }

    #[test]
    fn base_field_names_cannot_be_redeclared() {
        let e = unit().field(FieldConfig::char("external_id", 10));
        assert!(validate(&config(vec![e])).is_err());
    }

    #[test]
    fn export_routes_need_export_capability() {
        let mut e = unit();
        e.routes = Some(vec![RouteKind::List, RouteKind::Export]);
        assert!(validate(&config(vec![e.clone()])).is_err());
        e.export = true;
        assert!(validate(&config(vec![e])).is_ok());
    }

    #[test]
    fn rejects_duplicate_route_registration() {
        let mut e = unit();
        e.routes = Some(vec![RouteKind::List, RouteKind::List]);
        assert!(matches!(
            validate(&config(vec![e])).unwrap_err(),
            ConfigError::DuplicateRoute(_)
        ));
    }
}
