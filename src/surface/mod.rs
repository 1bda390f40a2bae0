//! Generated surfaces of a resolved entity: serializer and filter schemas, admin
//! configuration, REST identity, site URL entries with their view handlers, and export.
//!
//! Each capability is a trait implemented for [`ResolvedEntity`](crate::config::ResolvedEntity); every surface is
//! derived on demand from the immutable descriptor.

pub mod admin;
pub mod export;
pub mod filter;
pub mod rest;
pub mod serializer;
pub mod urls;
pub mod views;

pub use admin::AdminConfig;
pub use export::{export_fields, export_filename, ExportFormat};
pub use filter::{FilterField, FilterSchema, Lookup};
pub use serializer::{project, project_all};
pub use urls::{entity_url, links, UrlEntry};
pub use views::{required_action, view_handlers};

/// API representation: detail and list field lists, and the filter schema.
pub trait Serializable {
    fn serializer_schema(&self) -> Vec<String>;
    fn list_serializer_schema(&self) -> Vec<String>;
    fn filter_schema(&self) -> FilterSchema;
}

/// Admin-panel configuration.
pub trait Adminable {
    fn admin_config(&self) -> AdminConfig;
}

/// REST identity; `None` unless the entity has the `rest` capability.
pub trait RestExposable {
    /// `<route_name>/<model_name>`.
    fn router_api(&self) -> Option<String>;
    /// `api-<route_name>-<model_name>`.
    fn base_name(&self) -> Option<String>;
}

/// Site URL entries in registration order.
pub trait Routable {
    fn url_entries(&self) -> Vec<UrlEntry>;
}
