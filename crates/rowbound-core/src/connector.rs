//! Storage and cache collaborator traits.

use crate::error::Result;
use crate::row::Row;
use crate::value::Value;

/// One column as reported by schema introspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    /// Raw column type string, e.g. `int(11) unsigned` or `enum('a','b')`.
    pub column_type: String,
    pub nullable: bool,
    /// Declared default, verbatim from the engine, if any.
    pub default: Option<String>,
    pub auto_increment: bool,
}

impl ColumnInfo {
    #[must_use]
    pub fn new(name: impl Into<String>, column_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_type: column_type.into(),
            nullable: false,
            default: None,
            auto_increment: false,
        }
    }

    #[must_use]
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    #[must_use]
    pub fn default_value(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    #[must_use]
    pub fn auto_increment(mut self, auto: bool) -> Self {
        self.auto_increment = auto;
        self
    }
}

/// The kind of a uniqueness constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Primary,
    Unique,
}

/// One uniqueness constraint as reported by introspection. Composite
/// constraints list every member column, in constraint order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyInfo {
    pub kind: KeyKind,
    pub columns: Vec<String>,
}

impl KeyInfo {
    #[must_use]
    pub fn primary(columns: Vec<String>) -> Self {
        Self {
            kind: KeyKind::Primary,
            columns,
        }
    }

    #[must_use]
    pub fn unique(columns: Vec<String>) -> Self {
        Self {
            kind: KeyKind::Unique,
            columns,
        }
    }
}

/// A synchronous parameterized-SQL storage engine.
///
/// Every statement the engine emits uses `?` placeholders and carries its
/// parameters separately; connectors must never interpolate values into SQL
/// text. `query` returns rows keyed by qualified `table.column` names so
/// multi-table results can be split back apart.
pub trait StorageConnector {
    /// Run a statement that returns no rows; yields the affected-row count.
    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64>;

    /// Run a statement that returns rows.
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>>;

    /// The auto-generated id of the most recent INSERT on this connection.
    fn last_insert_id(&self) -> Result<i64>;

    /// Introspect the columns of a table. An unknown table yields an empty
    /// list, not an error.
    fn table_columns(&self, table: &str) -> Result<Vec<ColumnInfo>>;

    /// Introspect the uniqueness constraints of a table, primary key first.
    fn table_keys(&self, table: &str) -> Result<Vec<KeyInfo>>;
}

impl std::fmt::Debug for dyn StorageConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn StorageConnector")
    }
}

/// A byte-blob cache for memoized schema metadata.
///
/// Implementations use interior mutability; the catalog only holds `&self`
/// access. A miss is `None`; `set` failures are the implementation's problem
/// to swallow or log, the engine treats the cache as best-effort.
pub trait CacheStore {
    fn get(&self, key: &str) -> Option<Vec<u8>>;
    fn set(&self, key: &str, bytes: &[u8]);
}
