//! Admin-panel configuration derived from an entity.

use crate::config::{FieldsetConfig, ResolvedEntity};
use crate::surface::Adminable;
use serde::Serialize;

/// Rows per changelist page.
pub const LIST_PER_PAGE: u32 = 100;

const AUDITED_LIST_DISPLAY: [&str; 3] = ["id", "external_id", "created_by"];

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AdminConfig {
    pub list_display: Vec<String>,
    pub fieldsets: Vec<FieldsetConfig>,
    pub search_fields: Vec<String>,
    pub list_filter: Vec<String>,
    pub ordering: Vec<String>,
    pub list_per_page: u32,
}

/// Audited entities show their identity and owner; others show every scalar field.
fn default_list_display(entity: &ResolvedEntity) -> Vec<String> {
    if entity.audited {
        return AUDITED_LIST_DISPLAY.iter().map(|s| s.to_string()).collect();
    }
    entity.scalar_fields().map(|f| f.name.clone()).collect()
}

impl Adminable for ResolvedEntity {
    fn admin_config(&self) -> AdminConfig {
        let o = &self.overrides;
        AdminConfig {
            list_display: o.list_display.clone().unwrap_or_else(|| default_list_display(self)),
            fieldsets: o.fieldsets.clone().unwrap_or_else(|| {
                vec![FieldsetConfig {
                    title: None,
                    fields: self.editable_fields().map(|f| f.name.clone()).collect(),
                }]
            }),
            search_fields: o.search_fields.clone(),
            list_filter: o.list_filter.clone(),
            ordering: o.ordering.clone().unwrap_or_else(|| vec!["-id".to_string()]),
            list_per_page: LIST_PER_PAGE,
        }
    }
}
