use crate::config::ResolvedEntity;
use crate::surface::RestExposable;

/// Mount point of the REST surface.
pub const API_PREFIX: &str = "/api";

impl RestExposable for ResolvedEntity {
    fn router_api(&self) -> Option<String> {
        self.capabilities
            .rest
            .then(|| format!("{}/{}", self.route_name, self.model_name))
    }

    fn base_name(&self) -> Option<String> {
        self.capabilities
            .rest
            .then(|| format!("api-{}-{}", self.route_name, self.model_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{resolve, EntityConfig, KernelConfig};

    #[test]
    fn identity_only_for_rest_entities() {
        let mut unit = EntityConfig::new("Unit", "catalog");
        unit.rest = true;
        unit.route_name = Some("measure".into());
        let group = EntityConfig::new("UnitGroup", "catalog");
        let model = resolve(&KernelConfig { entities: vec![unit, group] }, "kernel").unwrap();

        let unit = model.entity_by_name("Unit").unwrap();
        assert_eq!(unit.router_api().as_deref(), Some("measure/unit"));
        assert_eq!(unit.base_name().as_deref(), Some("api-measure-unit"));
        let group = model.entity_by_name("UnitGroup").unwrap();
        assert_eq!(group.router_api(), None);
    }
}
