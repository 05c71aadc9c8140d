//! Schema catalog, introspection, and storage/domain value conversion.
//!
//! [`SchemaCatalog`] resolves [`EntityTypeSchema`]s through a memo map, an
//! optional cache, and live introspection, in that order. [`convert`]
//! translates raw storage values into domain form and back, driven entirely
//! by column type strings.

pub mod catalog;
pub mod convert;
pub mod types;

pub use catalog::SchemaCatalog;
pub use convert::{from_storage, to_storage, ZERO_TIMESTAMP};
pub use types::{EntityTypeSchema, FieldDef};
