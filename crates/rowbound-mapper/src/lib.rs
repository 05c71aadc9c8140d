//! The relational mapper: entities, relationship graphs, statement
//! generation, row stitching, and validation, tied together by [`Mapper`].
//!
//! A `Mapper` owns a [`SchemaCatalog`] and a registry of
//! [`RelationshipGraph`]s. Loads compile key criteria, run the joined
//! SELECT, and stitch the flat rows back into entity state; writes generate
//! INSERT/UPDATE/DELETE from an entity's pending changes and commit them on
//! success.

pub mod checks;
pub mod entity;
pub mod graph;
pub mod sql;
pub mod stitch;
pub mod validate;

use std::collections::HashMap;
use std::rc::Rc;

use rowbound_core::{Error, Result, Value};
use rowbound_query::{compile, Criteria};
use rowbound_schema::{EntityTypeSchema, SchemaCatalog};

pub use entity::{Entity, Shift, ShiftOp};
pub use graph::RelationshipGraph;
pub use stitch::{AttrBag, KeyedBags, Relation, StitchContext, StitchedRecord};
pub use validate::{Requirement, ValidationEngine};

/// What a save actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Saved {
    Created,
    Updated,
    /// An update with nothing dirty; no statement was issued.
    NothingChanged,
    Deleted,
}

/// Options for unique loads.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadOptions {
    /// A missing row leaves the entity untouched instead of failing.
    pub safe: bool,
    /// Read through the write connector, for read-after-write consistency.
    pub force_write: bool,
}

/// Options for criteria loads.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryOptions {
    pub force_write: bool,
    pub limit: Option<u64>,
}

/// The metadata-driven relational mapper.
pub struct Mapper {
    catalog: SchemaCatalog,
    graphs: HashMap<String, RelationshipGraph>,
}

impl Mapper {
    #[must_use]
    pub fn new(catalog: SchemaCatalog) -> Self {
        Self {
            catalog,
            graphs: HashMap::new(),
        }
    }

    #[must_use]
    pub fn catalog(&self) -> &SchemaCatalog {
        &self.catalog
    }

    pub fn catalog_mut(&mut self) -> &mut SchemaCatalog {
        &mut self.catalog
    }

    /// Register an entity type's relationship graph. Types never registered
    /// behave as if they declared no relationships.
    pub fn register(
        &mut self,
        entity_type: impl Into<String>,
        graph: RelationshipGraph,
    ) -> Result<()> {
        let entity_type = entity_type.into();
        graph.validate(&entity_type)?;
        self.graphs.insert(entity_type, graph);
        Ok(())
    }

    fn graph_of(&self, entity_type: &str) -> RelationshipGraph {
        self.graphs.get(entity_type).cloned().unwrap_or_default()
    }

    /// A blank entity of the given type.
    pub fn entity(&mut self, entity_type: &str) -> Result<Entity> {
        let schema = self.catalog.schema(entity_type)?;
        Ok(Entity::new(&schema))
    }

    /// A blank entity with the given values applied as changes.
    pub fn entity_from_attrs(
        &mut self,
        entity_type: &str,
        attrs: impl IntoIterator<Item = (String, Value)>,
    ) -> Result<Entity> {
        let schema = self.catalog.schema(entity_type)?;
        Ok(Entity::from_attrs(&schema, attrs))
    }

    fn related_schemas(
        &mut self,
        graph: &RelationshipGraph,
    ) -> Result<HashMap<String, Rc<EntityTypeSchema>>> {
        let mut schemas = HashMap::new();
        for related in graph.related_types() {
            let schema = self.catalog.schema(related)?;
            schemas.insert(related.to_string(), schema);
        }
        Ok(schemas)
    }

    /// The first key group whose columns all carry usable values, as
    /// equality criteria.
    fn key_criteria(
        schema: &EntityTypeSchema,
        value_of: impl Fn(&str) -> Option<Value>,
    ) -> Option<Criteria> {
        'groups: for group in &schema.key_groups {
            let mut criteria = Criteria::new();
            for column in group {
                match value_of(column) {
                    Some(value) if SchemaCatalog::is_populated(&value) => {
                        criteria = criteria.with(column.clone(), value);
                    }
                    _ => continue 'groups,
                }
            }
            if !criteria.is_empty() {
                return Some(criteria);
            }
        }
        None
    }

    fn run_select(
        &mut self,
        entity_type: &str,
        criteria: &Criteria,
        options: QueryOptions,
    ) -> Result<Vec<StitchedRecord>> {
        let schema = self.catalog.schema(entity_type)?;
        let graph = self.graph_of(entity_type);
        let schemas = self.related_schemas(&graph)?;

        let clause = compile(&schema, criteria)?;
        let mut statement = sql::select_sql(&schema, &graph, &schemas);
        if !clause.is_empty() {
            statement.push_str(" WHERE ");
            statement.push_str(&clause.sql);
        }
        if let Some(limit) = options.limit {
            statement.push_str(&format!(" LIMIT {limit}"));
        }

        let connector = self.catalog.connector(options.force_write)?;
        let rows = connector.query(&statement, &clause.params)?;
        tracing::debug!(entity_type, rows = rows.len(), "select returned");

        let ctx = StitchContext {
            base_schema: &schema,
            graph: &graph,
            schemas: &schemas,
        };
        Ok(stitch::stitch(&ctx, &rows))
    }

    /// Load one entity by its own key values.
    ///
    /// The first fully populated unique key group identifies the row. With
    /// no populated group this fails with [`Error::NoUniqueCriteria`]; with
    /// no matching row it fails with [`Error::RecordNotFound`] unless
    /// `options.safe` is set, in which case the entity is left untouched
    /// (and stays new).
    #[tracing::instrument(skip(self, entity, options))]
    pub fn load(
        &mut self,
        entity_type: &str,
        entity: &mut Entity,
        options: LoadOptions,
    ) -> Result<()> {
        let schema = self.catalog.schema(entity_type)?;
        let criteria = Self::key_criteria(&schema, |column| entity.get(column).cloned())
            .ok_or(Error::NoUniqueCriteria)?;

        // No row limit: the key bounds the base rows to one, but has-many
        // joins fan that row out and a LIMIT would truncate the collections.
        let records = self.run_select(
            entity_type,
            &criteria,
            QueryOptions {
                force_write: options.force_write,
                limit: None,
            },
        )?;
        let Some(record) = records.into_iter().next() else {
            if options.safe {
                return Ok(());
            }
            return Err(Error::RecordNotFound);
        };

        for (field, value) in record.attrs {
            entity.set(&field, value);
        }
        for (name, relation) in record.relations {
            entity.set_relation(name, relation);
        }
        entity.migrate_dirty_to_clean();
        entity.mark_as_new(false);
        Ok(())
    }

    /// Load one entity by its primary key value.
    ///
    /// Usable only on types whose primary key is a single column; a
    /// composite or missing primary key fails with
    /// [`Error::NoUniqueCriteria`].
    #[tracing::instrument(skip(self, id, options))]
    pub fn load_by_id(
        &mut self,
        entity_type: &str,
        id: impl Into<Value>,
        options: LoadOptions,
    ) -> Result<Entity> {
        let schema = self.catalog.schema(entity_type)?;
        let column = match schema.primary_group() {
            Some([column]) => column.clone(),
            _ => return Err(Error::NoUniqueCriteria),
        };

        let mut entity = Entity::new(&schema);
        entity.set(&column, id.into());
        self.load(entity_type, &mut entity, options)?;
        Ok(entity)
    }

    /// Load every record matching the criteria, stitched.
    #[tracing::instrument(skip(self, criteria, options))]
    pub fn load_many(
        &mut self,
        entity_type: &str,
        criteria: &Criteria,
        options: QueryOptions,
    ) -> Result<Vec<StitchedRecord>> {
        self.run_select(entity_type, criteria, options)
    }

    /// Insert the entity's pending values as a new row.
    ///
    /// Fields without a pending value take their column defaults. When the
    /// type has an auto-increment field that was not supplied, the generated
    /// id is written back onto the entity.
    #[tracing::instrument(skip(self, entity))]
    pub fn create(&mut self, entity_type: &str, entity: &mut Entity) -> Result<()> {
        let schema = self.catalog.schema(entity_type)?;
        let connector = self.catalog.write_connector()?;

        let (statement, params) = sql::insert_sql(&schema, entity);
        connector.execute(&statement, &params)?;

        if let Some(auto) = &schema.auto_field {
            if entity.dirty_value(auto).is_none() {
                let id = connector.last_insert_id()?;
                entity.set(auto, id);
            }
        }
        entity.migrate_dirty_to_clean();
        entity.mark_as_new(false);
        tracing::info!(entity_type, "created");
        Ok(())
    }

    /// Write the entity's pending changes to its row.
    ///
    /// With nothing dirty this is a no-op and reports
    /// [`Saved::NothingChanged`] without touching storage. The row is
    /// identified by the first key group fully populated from clean values
    /// (falling back to pending ones).
    #[tracing::instrument(skip(self, entity))]
    pub fn update(&mut self, entity_type: &str, entity: &mut Entity) -> Result<Saved> {
        if !entity.is_dirty() {
            return Ok(Saved::NothingChanged);
        }
        let schema = self.catalog.schema(entity_type)?;
        let criteria = Self::key_criteria(&schema, |column| {
            entity
                .clean_value(column)
                .or_else(|| entity.get(column))
                .cloned()
        })
        .ok_or(Error::NoUniqueCriteria)?;
        let clause = compile(&schema, &criteria)?;

        let Some((statement, params)) = sql::update_sql(&schema, entity, &clause) else {
            return Ok(Saved::NothingChanged);
        };
        let connector = self.catalog.write_connector()?;
        let affected = connector.execute(&statement, &params)?;
        entity.migrate_dirty_to_clean();
        tracing::info!(entity_type, affected, "updated");
        Ok(Saved::Updated)
    }

    /// Delete the entity's row, identified like [`Mapper::update`]. The
    /// entity reverts to new afterwards.
    #[tracing::instrument(skip(self, entity))]
    pub fn delete(&mut self, entity_type: &str, entity: &mut Entity) -> Result<()> {
        let schema = self.catalog.schema(entity_type)?;
        let criteria = Self::key_criteria(&schema, |column| {
            entity
                .clean_value(column)
                .or_else(|| entity.get(column))
                .cloned()
        })
        .ok_or(Error::NoUniqueCriteria)?;

        self.delete_many(entity_type, &criteria, Some(1))?;
        entity.mark_as_new(true);
        entity.delete_on_save(false);
        Ok(())
    }

    /// Delete every row matching the criteria; yields the affected count.
    /// Empty criteria delete unconditionally, so compose with care.
    #[tracing::instrument(skip(self, criteria))]
    pub fn delete_many(
        &mut self,
        entity_type: &str,
        criteria: &Criteria,
        limit: Option<u64>,
    ) -> Result<u64> {
        let schema = self.catalog.schema(entity_type)?;
        let clause = compile(&schema, criteria)?;
        let (statement, params) = sql::delete_sql(&schema, &clause, limit);

        let connector = self.catalog.write_connector()?;
        let affected = connector.execute(&statement, &params)?;
        tracing::info!(entity_type, affected, "deleted");
        Ok(affected)
    }

    /// Persist the entity according to its lifecycle state: armed for
    /// deletion deletes, new creates, everything else updates.
    #[tracing::instrument(skip(self, entity))]
    pub fn save(&mut self, entity_type: &str, entity: &mut Entity) -> Result<Saved> {
        if entity.is_deleting() {
            self.delete(entity_type, entity)?;
            return Ok(Saved::Deleted);
        }
        if entity.is_new() {
            self.create(entity_type, entity)?;
            return Ok(Saved::Created);
        }
        self.update(entity_type, entity)
    }

    /// Validate, then save. Deletions skip validation; there is nothing to
    /// check on the way out.
    pub fn save_validated(
        &mut self,
        entity_type: &str,
        entity: &mut Entity,
        engine: &ValidationEngine,
    ) -> Result<Saved> {
        if !entity.is_deleting() {
            let schema = self.catalog.schema(entity_type)?;
            engine.validate(entity, &schema, None)?;
        }
        self.save(entity_type, entity)
    }
}
