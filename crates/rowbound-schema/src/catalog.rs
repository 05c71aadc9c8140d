//! The schema catalog: memoized, cache-backed schema lookup.

use std::collections::HashMap;
use std::rc::Rc;

use rowbound_core::{
    CacheStore, ConnectorRole, Error, KeyKind, Result, StorageConnector, Value,
};

use crate::types::{EntityTypeSchema, FieldDef};

/// Looks up entity-type schemas, memoizing aggressively.
///
/// Resolution order for [`SchemaCatalog::schema`]:
///
/// 1. the in-process memo map,
/// 2. the injected [`CacheStore`] (schemas serialize as JSON),
/// 3. live introspection through the read connector.
///
/// Both later stages populate the earlier ones, so introspection runs at
/// most once per entity type per process, and at most once per cache
/// lifetime across processes. Schemas can also be registered directly,
/// bypassing introspection entirely.
pub struct SchemaCatalog {
    read: Option<Rc<dyn StorageConnector>>,
    write: Option<Rc<dyn StorageConnector>>,
    cache: Option<Rc<dyn CacheStore>>,
    memo: HashMap<String, Rc<EntityTypeSchema>>,
}

impl SchemaCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self {
            read: None,
            write: None,
            cache: None,
            memo: HashMap::new(),
        }
    }

    /// Wire one connector for both roles.
    #[must_use]
    pub fn with_connector(mut self, connector: Rc<dyn StorageConnector>) -> Self {
        self.read = Some(Rc::clone(&connector));
        self.write = Some(connector);
        self
    }

    #[must_use]
    pub fn with_read_connector(mut self, connector: Rc<dyn StorageConnector>) -> Self {
        self.read = Some(connector);
        self
    }

    #[must_use]
    pub fn with_write_connector(mut self, connector: Rc<dyn StorageConnector>) -> Self {
        self.write = Some(connector);
        self
    }

    #[must_use]
    pub fn with_cache(mut self, cache: Rc<dyn CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Register a schema directly, keyed by entity type.
    pub fn register_schema(&mut self, entity_type: impl Into<String>, schema: EntityTypeSchema) {
        self.memo.insert(entity_type.into(), Rc::new(schema));
    }

    /// The read-role connector, or the write connector standing in for it.
    pub fn read_connector(&self) -> Result<Rc<dyn StorageConnector>> {
        self.read
            .as_ref()
            .or(self.write.as_ref())
            .map(Rc::clone)
            .ok_or(Error::ConnectorUnavailable {
                role: ConnectorRole::Read,
            })
    }

    pub fn write_connector(&self) -> Result<Rc<dyn StorageConnector>> {
        self.write
            .as_ref()
            .map(Rc::clone)
            .ok_or(Error::ConnectorUnavailable {
                role: ConnectorRole::Write,
            })
    }

    /// Pick a connector for a read path. `force_write` routes the read to
    /// the write connector, for read-after-write consistency.
    pub fn connector(&self, force_write: bool) -> Result<Rc<dyn StorageConnector>> {
        if force_write {
            self.write_connector()
        } else {
            self.read_connector()
        }
    }

    /// Resolve the schema for an entity type.
    ///
    /// The entity type doubles as the table name on the introspection path;
    /// types registered via [`SchemaCatalog::register_schema`] may back onto
    /// any table.
    pub fn schema(&mut self, entity_type: &str) -> Result<Rc<EntityTypeSchema>> {
        if let Some(schema) = self.memo.get(entity_type) {
            return Ok(Rc::clone(schema));
        }
        if let Some(schema) = self.cached_schema(entity_type) {
            let schema = Rc::new(schema);
            self.memo.insert(entity_type.to_string(), Rc::clone(&schema));
            return Ok(schema);
        }
        let schema = Rc::new(self.introspect(entity_type)?);
        self.store_cached_schema(entity_type, &schema);
        self.memo.insert(entity_type.to_string(), Rc::clone(&schema));
        Ok(schema)
    }

    /// Convenience: the column type string of one field.
    pub fn field_type(&mut self, entity_type: &str, field: &str) -> Result<Option<String>> {
        Ok(self
            .schema(entity_type)?
            .field(field)
            .map(|f| f.column_type.clone()))
    }

    /// Convenience: the enum/set options of one field.
    pub fn field_options(&mut self, entity_type: &str, field: &str) -> Result<Vec<String>> {
        Ok(self
            .schema(entity_type)?
            .field(field)
            .map(FieldDef::options)
            .unwrap_or_default())
    }

    fn cache_key(entity_type: &str) -> String {
        format!("rowbound/schema/{entity_type}")
    }

    fn cached_schema(&self, entity_type: &str) -> Option<EntityTypeSchema> {
        let cache = self.cache.as_ref()?;
        let bytes = cache.get(&Self::cache_key(entity_type))?;
        match serde_json::from_slice(&bytes) {
            Ok(schema) => {
                tracing::debug!(entity_type, "schema cache hit");
                Some(schema)
            }
            Err(error) => {
                tracing::warn!(entity_type, %error, "discarding undecodable cached schema");
                None
            }
        }
    }

    fn store_cached_schema(&self, entity_type: &str, schema: &EntityTypeSchema) {
        let Some(cache) = self.cache.as_ref() else {
            return;
        };
        match serde_json::to_vec(schema) {
            Ok(bytes) => cache.set(&Self::cache_key(entity_type), &bytes),
            Err(error) => {
                tracing::warn!(entity_type, %error, "failed to serialize schema for cache");
            }
        }
    }

    #[tracing::instrument(skip(self))]
    fn introspect(&self, entity_type: &str) -> Result<EntityTypeSchema> {
        let connector = self.read_connector()?;
        let columns = connector.table_columns(entity_type)?;
        if columns.is_empty() {
            return Err(Error::SchemaNotFound {
                entity_type: entity_type.to_string(),
            });
        }

        let mut schema = EntityTypeSchema::new(entity_type);
        for column in columns {
            if column.auto_increment {
                schema.auto_field = Some(column.name.clone());
            }
            let mut field = FieldDef::new(column.name, column.column_type).nullable(column.nullable);
            if let Some(default) = column.default {
                field = field.default_value(default);
            }
            schema.fields.push(field);
        }

        let mut keys = connector.table_keys(entity_type)?;
        // Primary group leads regardless of how the engine orders its output.
        keys.sort_by_key(|k| match k.kind {
            KeyKind::Primary => 0,
            KeyKind::Unique => 1,
        });
        schema.key_groups = keys.into_iter().map(|k| k.columns).collect();

        tracing::info!(
            entity_type,
            fields = schema.fields.len(),
            key_groups = schema.key_groups.len(),
            "introspected schema"
        );
        Ok(schema)
    }

    /// True if a value would satisfy a key column: non-null, non-blank.
    #[must_use]
    pub fn is_populated(value: &Value) -> bool {
        match value {
            Value::Null => false,
            Value::Text(s) => !s.trim().is_empty(),
            _ => true,
        }
    }
}

impl Default for SchemaCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;

    use rowbound_core::{ColumnInfo, KeyInfo, Row};

    use super::*;

    struct CountingConnector {
        introspections: Cell<usize>,
    }

    impl StorageConnector for CountingConnector {
        fn execute(&self, _sql: &str, _params: &[Value]) -> Result<u64> {
            Ok(0)
        }

        fn query(&self, _sql: &str, _params: &[Value]) -> Result<Vec<Row>> {
            Ok(Vec::new())
        }

        fn last_insert_id(&self) -> Result<i64> {
            Ok(0)
        }

        fn table_columns(&self, table: &str) -> Result<Vec<ColumnInfo>> {
            self.introspections.set(self.introspections.get() + 1);
            if table != "users" {
                return Ok(Vec::new());
            }
            Ok(vec![
                ColumnInfo::new("id", "int(11)").auto_increment(true),
                ColumnInfo::new("email", "varchar(100)"),
            ])
        }

        fn table_keys(&self, _table: &str) -> Result<Vec<KeyInfo>> {
            Ok(vec![
                KeyInfo::unique(vec!["email".into()]),
                KeyInfo::primary(vec!["id".into()]),
            ])
        }
    }

    #[derive(Default)]
    struct MapCache {
        entries: RefCell<HashMap<String, Vec<u8>>>,
    }

    impl CacheStore for MapCache {
        fn get(&self, key: &str) -> Option<Vec<u8>> {
            self.entries.borrow().get(key).cloned()
        }

        fn set(&self, key: &str, bytes: &[u8]) {
            self.entries.borrow_mut().insert(key.to_string(), bytes.to_vec());
        }
    }

    #[test]
    fn introspects_once_per_type() {
        let connector = Rc::new(CountingConnector {
            introspections: Cell::new(0),
        });
        let mut catalog =
            SchemaCatalog::new().with_connector(Rc::clone(&connector) as Rc<dyn StorageConnector>);

        let first = catalog.schema("users").unwrap();
        let second = catalog.schema("users").unwrap();
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(connector.introspections.get(), 1);
    }

    #[test]
    fn primary_group_sorts_first() {
        let connector = Rc::new(CountingConnector {
            introspections: Cell::new(0),
        });
        let mut catalog = SchemaCatalog::new().with_connector(connector);

        let schema = catalog.schema("users").unwrap();
        assert_eq!(schema.primary_group(), Some(&["id".to_string()][..]));
        assert_eq!(schema.auto_field.as_deref(), Some("id"));
    }

    #[test]
    fn cache_spares_introspection() {
        let cache = Rc::new(MapCache::default());

        let first_connector = Rc::new(CountingConnector {
            introspections: Cell::new(0),
        });
        let mut catalog = SchemaCatalog::new()
            .with_connector(Rc::clone(&first_connector) as Rc<dyn StorageConnector>)
            .with_cache(Rc::clone(&cache) as Rc<dyn CacheStore>);
        catalog.schema("users").unwrap();
        assert_eq!(first_connector.introspections.get(), 1);

        // A fresh catalog sharing the cache never hits the connector.
        let second_connector = Rc::new(CountingConnector {
            introspections: Cell::new(0),
        });
        let mut catalog = SchemaCatalog::new()
            .with_connector(Rc::clone(&second_connector) as Rc<dyn StorageConnector>)
            .with_cache(cache as Rc<dyn CacheStore>);
        let schema = catalog.schema("users").unwrap();
        assert_eq!(second_connector.introspections.get(), 0);
        assert!(schema.has_field("email"));
    }

    #[test]
    fn unknown_table_is_schema_not_found() {
        let connector = Rc::new(CountingConnector {
            introspections: Cell::new(0),
        });
        let mut catalog = SchemaCatalog::new().with_connector(connector);

        let err = catalog.schema("missing").unwrap_err();
        assert_eq!(
            err,
            Error::SchemaNotFound {
                entity_type: "missing".into()
            }
        );
    }

    #[test]
    fn missing_connectors_are_reported_by_role() {
        let catalog = SchemaCatalog::new();
        assert_eq!(
            catalog.read_connector().unwrap_err(),
            Error::ConnectorUnavailable {
                role: ConnectorRole::Read
            }
        );
        assert_eq!(
            catalog.write_connector().unwrap_err(),
            Error::ConnectorUnavailable {
                role: ConnectorRole::Write
            }
        );
    }

    #[test]
    fn registered_schema_bypasses_introspection() {
        let mut catalog = SchemaCatalog::new();
        catalog.register_schema(
            "widget",
            EntityTypeSchema::new("widgets").with_field(FieldDef::new("id", "int(11)")),
        );
        let schema = catalog.schema("widget").unwrap();
        assert_eq!(schema.table, "widgets");
    }
}
