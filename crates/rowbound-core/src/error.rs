//! Error taxonomy shared by every rowbound crate.

use std::collections::BTreeMap;
use std::fmt;

/// Which connector role a caller asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectorRole {
    Read,
    Write,
}

impl fmt::Display for ConnectorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectorRole::Read => write!(f, "read"),
            ConnectorRole::Write => write!(f, "write"),
        }
    }
}

/// Per-field validation messages, accumulated across validators.
///
/// Field order is stable (sorted by field name) so error output is
/// deterministic; messages within a field keep validator order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors {
    errors: BTreeMap<String, Vec<String>>,
}

impl FieldErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one message against a field.
    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.entry(field.into()).or_default().push(message.into());
    }

    /// Absorb all messages from another accumulator.
    pub fn merge(&mut self, other: FieldErrors) {
        for (field, messages) in other.errors {
            self.errors.entry(field).or_default().extend(messages);
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.errors.get(field).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.errors.iter().map(|(f, m)| (f.as_str(), m.as_slice()))
    }

    /// Promote the accumulated messages to an [`Error::Validation`].
    #[must_use]
    pub fn into_error(self) -> Error {
        Error::Validation(self)
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.errors {
            for message in messages {
                if !first {
                    write!(f, "; ")?;
                }
                write!(f, "{field}: {message}")?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Everything that can go wrong inside the mapping engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// No schema could be produced for the named entity type.
    SchemaNotFound { entity_type: String },
    /// The catalog has no connector wired for the requested role.
    ConnectorUnavailable { role: ConnectorRole },
    /// A unique load matched no row.
    RecordNotFound,
    /// No key group was fully populated, so a unique operation cannot run.
    NoUniqueCriteria,
    /// A criteria field-spec named an operator the compiler does not know.
    UnknownOperator { token: String },
    /// A criteria operator received the wrong number of values.
    InvalidOperatorArity {
        operator: String,
        expected: usize,
        got: usize,
    },
    /// `add`/`sub` touched a field whose value is not numeric.
    NonNumericArithmetic { field: String },
    /// A `change` spec carried an unknown `:modifier` suffix.
    UnknownModifier { token: String },
    /// A relationship graph is malformed for the entity type it belongs to.
    InvalidRelationship { entity_type: String, detail: String },
    /// One or more validators rejected the entity.
    Validation(FieldErrors),
    /// The storage connector reported a failure.
    Storage(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::SchemaNotFound { entity_type } => {
                write!(f, "no schema found for entity type `{entity_type}`")
            }
            Error::ConnectorUnavailable { role } => {
                write!(f, "no {role} connector configured")
            }
            Error::RecordNotFound => write!(f, "record not found"),
            Error::NoUniqueCriteria => {
                write!(f, "no unique key group is fully populated")
            }
            Error::UnknownOperator { token } => {
                write!(f, "unknown criteria operator `{token}`")
            }
            Error::InvalidOperatorArity {
                operator,
                expected,
                got,
            } => write!(
                f,
                "operator `{operator}` expects {expected} value(s), got {got}"
            ),
            Error::NonNumericArithmetic { field } => {
                write!(f, "cannot apply arithmetic to non-numeric field `{field}`")
            }
            Error::UnknownModifier { token } => {
                write!(f, "unknown change modifier `{token}`")
            }
            Error::InvalidRelationship {
                entity_type,
                detail,
            } => {
                write!(f, "invalid relationship on `{entity_type}`: {detail}")
            }
            Error::Validation(errors) => write!(f, "validation failed: {errors}"),
            Error::Storage(message) => write!(f, "storage error: {message}"),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;
