//! CrudService: generic CRUD using the safe SQL builder, plus form validation.

mod crud;
mod validation;
pub use crud::{stamp_audit, CrudService, Page, DEFAULT_LIMIT};
pub use validation::{form_fields, form_schema, FormFieldInfo, FormValidator};
