//! Field and entity-type schema descriptions.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

fn options_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"'([^']*)'").unwrap_or_else(|_| Regex::new("$^").unwrap()))
}

fn varchar_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^varchar\((\d+)\)").unwrap_or_else(|_| Regex::new("$^").unwrap()))
}

/// One field of an entity type, described by its raw column type string.
///
/// Behavior is driven entirely by the type string: `int(10) unsigned`,
/// `enum('a','b')`, `set('x','y')`, `timestamp`, `tinyint(1)` and so on are
/// classified by the `is_*` predicates rather than parsed into a closed enum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub column_type: String,
    pub nullable: bool,
    pub default: Option<String>,
}

impl FieldDef {
    #[must_use]
    pub fn new(name: impl Into<String>, column_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_type: column_type.into(),
            nullable: false,
            default: None,
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
    pub fn is_int(&self) -> bool {
        self.column_type.starts_with("int")
            || self.column_type.starts_with("bigint")
            || self.column_type.starts_with("smallint")
            || self.column_type.starts_with("mediumint")
    }

    #[must_use]
    pub fn is_tinyint(&self) -> bool {
        self.column_type.starts_with("tinyint")
    }

    #[must_use]
    pub fn is_float(&self) -> bool {
        self.column_type.starts_with("float")
            || self.column_type.starts_with("double")
            || self.column_type.starts_with("decimal")
    }

    #[must_use]
    pub fn is_timestamp(&self) -> bool {
        self.column_type.starts_with("timestamp") || self.column_type.starts_with("datetime")
    }

    #[must_use]
    pub fn is_enum(&self) -> bool {
        self.column_type.starts_with("enum(")
    }

    #[must_use]
    pub fn is_set(&self) -> bool {
        self.column_type.starts_with("set(")
    }

    #[must_use]
    pub fn is_varchar(&self) -> bool {
        self.column_type.starts_with("varchar(")
    }

    #[must_use]
    pub fn is_unsigned(&self) -> bool {
        self.column_type.contains("unsigned")
    }

    /// The allowed members of an `enum(...)` or `set(...)` column.
    #[must_use]
    pub fn options(&self) -> Vec<String> {
        if !self.is_enum() && !self.is_set() {
            return Vec::new();
        }
        options_pattern()
            .captures_iter(&self.column_type)
            .map(|c| c[1].to_string())
            .collect()
    }

    /// The declared size of a `varchar(N)` column.
    #[must_use]
    pub fn varchar_size(&self) -> Option<usize> {
        varchar_pattern()
            .captures(&self.column_type)
            .and_then(|c| c[1].parse().ok())
    }
}

/// The full schema of one entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityTypeSchema {
    /// Backing table name.
    pub table: String,
    /// Fields in declaration order.
    pub fields: Vec<FieldDef>,
    /// Unique key groups, primary key first. Each group lists its member
    /// columns in constraint order.
    pub key_groups: Vec<Vec<String>>,
    /// Auto-increment field, if the table has one.
    pub auto_field: Option<String>,
}

impl EntityTypeSchema {
    #[must_use]
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            fields: Vec::new(),
            key_groups: Vec::new(),
            auto_field: None,
        }
    }

    #[must_use]
    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    #[must_use]
    pub fn with_key_group(mut self, columns: Vec<String>) -> Self {
        self.key_groups.push(columns);
        self
    }

    #[must_use]
    pub fn with_auto_field(mut self, field: impl Into<String>) -> Self {
        self.auto_field = Some(field.into());
        self
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    #[must_use]
    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// The primary key group, when the table declared one.
    #[must_use]
    pub fn primary_group(&self) -> Option<&[String]> {
        self.key_groups.first().map(Vec::as_slice)
    }
}
