//! Core types and collaborator traits for the rowbound mapping engine.
//!
//! This crate has no opinion about schemas, queries, or entities; it defines
//! the vocabulary the rest of the workspace speaks:
//!
//! - [`Value`]: the scalar/list values entities carry and statements bind.
//! - [`Row`] and [`CompositeKey`]: joined-result rows and the identity
//!   tuples used to regroup them.
//! - [`Error`] / [`Result`]: the shared error taxonomy, including the
//!   [`FieldErrors`] validation accumulator.
//! - [`StorageConnector`] and [`CacheStore`]: the injected collaborators
//!   the engine runs against.

pub mod connector;
pub mod error;
pub mod key;
pub mod row;
pub mod value;

pub use connector::{CacheStore, ColumnInfo, KeyInfo, KeyKind, StorageConnector};
pub use error::{ConnectorRole, Error, FieldErrors, Result};
pub use key::CompositeKey;
pub use row::Row;
pub use value::Value;
