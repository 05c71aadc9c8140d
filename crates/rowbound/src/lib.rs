//! # rowbound
//!
//! A metadata-driven relational mapping engine. Schemas come from live
//! introspection (memoized and cacheable), entities track their own changes,
//! criteria compile to parameterized WHERE clauses, and joined result rows
//! are stitched back into nested entity graphs.
//!
//! The pieces:
//!
//! - [`SchemaCatalog`] resolves [`EntityTypeSchema`]s and converts values
//!   between storage and domain form by column type.
//! - [`Entity`] keeps clean/dirty/extra value maps plus pending relative
//!   shifts, and its new/deleting lifecycle flags.
//! - [`Criteria`] plus [`compile`] produce `(sql, params)` WHERE clauses
//!   with aliasable operators and IS NULL handling.
//! - [`Mapper`] ties it together: register [`RelationshipGraph`]s, then
//!   `load`, `load_many`, `create`, `update`, `delete`, or just `save`.
//! - [`ValidationEngine`] runs ordered validators and aggregates every
//!   problem into one [`FieldErrors`] report.
//!
//! Storage is abstract: implement [`StorageConnector`] for your engine and
//! optionally [`CacheStore`] to share introspected schemas across
//! processes.
//!
//! ```no_run
//! use std::rc::Rc;
//! use rowbound::prelude::*;
//!
//! fn run(connector: Rc<dyn StorageConnector>) -> rowbound::Result<()> {
//!     let catalog = SchemaCatalog::new().with_connector(connector);
//!     let mut mapper = Mapper::new(catalog);
//!     mapper.register(
//!         "ticket",
//!         RelationshipGraph::new().belongs_to("account").has_many("comment"),
//!     )?;
//!
//!     let mut ticket = mapper.load_by_id("ticket", 42, LoadOptions::default())?;
//!     ticket.set("subject", "update the docs");
//!     ticket.add("votes", 1)?;
//!     mapper.save("ticket", &mut ticket)?;
//!     Ok(())
//! }
//! ```

pub use rowbound_core::{
    CacheStore, ColumnInfo, CompositeKey, ConnectorRole, Error, FieldErrors, KeyInfo, KeyKind,
    Result, Row, StorageConnector, Value,
};
pub use rowbound_mapper::{
    AttrBag, Entity, KeyedBags, LoadOptions, Mapper, QueryOptions, Relation, RelationshipGraph,
    Requirement, Saved, Shift, ShiftOp, StitchContext, StitchedRecord, ValidationEngine,
};
pub use rowbound_query::{compile, Criteria, WhereClause};
pub use rowbound_schema::{
    from_storage, to_storage, EntityTypeSchema, FieldDef, SchemaCatalog, ZERO_TIMESTAMP,
};

/// Everything most callers need.
pub mod prelude {
    pub use rowbound_core::{
        CacheStore, Error, FieldErrors, Result, Row, StorageConnector, Value,
    };
    pub use rowbound_mapper::{
        Entity, LoadOptions, Mapper, QueryOptions, Relation, RelationshipGraph, Saved,
        ValidationEngine,
    };
    pub use rowbound_query::Criteria;
    pub use rowbound_schema::{EntityTypeSchema, FieldDef, SchemaCatalog};
}

/// Checks re-exported for custom validators.
pub mod checks {
    pub use rowbound_mapper::checks::{
        all_in_options, in_options, is_boolean, is_float, is_integer, is_positive, is_present,
        within_length,
    };
}
