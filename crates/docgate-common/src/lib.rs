//! Shared domain types for the docgate record gateway.
//!
//! - [`schema`]: record types, field descriptors and the closed [`FieldKind`] union
//! - [`envelope`]: the `{status_code, message, data}` response envelope

pub mod envelope;
pub mod schema;

pub use envelope::ApiResponse;
pub use schema::{
    CHILD_COLUMNS, FieldDescriptor, FieldKind, LayoutKind, Record, RecordSchema, STANDARD_COLUMNS,
    ScalarKind, SchemaError, StorageClass,
};
