//! Compiles field/operator criteria into parameterized WHERE clauses.
//!
//! A criteria entry pairs a field spec with a list of values. The spec is
//! either a bare field name or `field:operator`; with no operator, one value
//! compiles to `=` and several to `IN`. Values travel as `?` parameters,
//! never interpolated, and known fields are converted to storage form on the
//! way through.

use rowbound_core::{Error, Result, Value};
use rowbound_schema::{to_storage, EntityTypeSchema};

/// Ordered criteria entries. Entry order is clause order in the output.
#[derive(Debug, Clone, Default)]
pub struct Criteria {
    entries: Vec<(String, Vec<Value>)>,
}

impl Criteria {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry with a single value.
    #[must_use]
    pub fn with(self, field_spec: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with_all(field_spec, vec![value.into()])
    }

    /// Add an entry with a value list.
    #[must_use]
    pub fn with_all(mut self, field_spec: impl Into<String>, values: Vec<Value>) -> Self {
        self.entries.push((field_spec.into(), values));
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Value])> {
        self.entries.iter().map(|(f, v)| (f.as_str(), v.as_slice()))
    }
}

/// A compiled WHERE clause: SQL text with `?` placeholders plus its
/// parameters, in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct WhereClause {
    pub sql: String,
    pub params: Vec<Value>,
}

impl WhereClause {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }
}

/// How many values an operator consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Arity {
    One,
    Two,
    Any,
}

/// Map an operator token (case-insensitive, aliases allowed) to its SQL
/// spelling and arity.
fn normalize_operator(token: &str) -> Result<(&'static str, Arity)> {
    let lowered = token.to_ascii_lowercase();
    match lowered.as_str() {
        "=" | "eq" => Ok(("=", Arity::One)),
        "!=" | "neq" => Ok(("!=", Arity::One)),
        "<>" => Ok(("<>", Arity::One)),
        "<" | "lt" => Ok(("<", Arity::One)),
        "<=" | "lte" => Ok(("<=", Arity::One)),
        ">" | "gt" => Ok((">", Arity::One)),
        ">=" | "gte" => Ok((">=", Arity::One)),
        "<=>" => Ok(("<=>", Arity::One)),
        "like" => Ok(("LIKE", Arity::One)),
        "not like" => Ok(("NOT LIKE", Arity::One)),
        "between" => Ok(("BETWEEN", Arity::Two)),
        "not between" => Ok(("NOT BETWEEN", Arity::Two)),
        "in" => Ok(("IN", Arity::Any)),
        "not in" => Ok(("NOT IN", Arity::Any)),
        _ => Err(Error::UnknownOperator {
            token: token.to_string(),
        }),
    }
}

/// Compile criteria against an entity type's schema.
///
/// Entries with empty value lists are skipped. An all-empty result compiles
/// to an empty clause, which callers treat as "no WHERE".
pub fn compile(schema: &EntityTypeSchema, criteria: &Criteria) -> Result<WhereClause> {
    let mut clauses: Vec<String> = Vec::new();
    let mut params: Vec<Value> = Vec::new();

    for (field_spec, values) in criteria.iter() {
        if values.is_empty() {
            continue;
        }

        let (field, operator_token) = match field_spec.split_once(':') {
            Some((field, token)) => (field, Some(token)),
            None => (field_spec, None),
        };

        let (operator, arity) = match operator_token {
            Some(token) => normalize_operator(token)?,
            None if values.len() == 1 => ("=", Arity::One),
            None => ("IN", Arity::Any),
        };

        match arity {
            Arity::One if values.len() != 1 => {
                return Err(Error::InvalidOperatorArity {
                    operator: operator.to_string(),
                    expected: 1,
                    got: values.len(),
                });
            }
            Arity::Two if values.len() != 2 => {
                return Err(Error::InvalidOperatorArity {
                    operator: operator.to_string(),
                    expected: 2,
                    got: values.len(),
                });
            }
            _ => {}
        }

        let column = format!("`{}`.`{}`", schema.table, field);
        let converted: Vec<Value> = values
            .iter()
            .map(|v| match schema.field(field) {
                Some(def) => to_storage(def, v.clone()),
                None => v.clone(),
            })
            .collect();

        // Equality against NULL becomes an IS test and binds nothing.
        if arity == Arity::One && converted[0].is_null() {
            match operator {
                "=" => {
                    clauses.push(format!("{column} IS NULL"));
                    continue;
                }
                "!=" => {
                    clauses.push(format!("{column} IS NOT NULL"));
                    continue;
                }
                _ => {}
            }
        }

        match arity {
            Arity::One => {
                clauses.push(format!("{column} {operator} ?"));
            }
            Arity::Two => {
                clauses.push(format!("{column} {operator} ? AND ?"));
            }
            Arity::Any => {
                let placeholders = vec!["?"; converted.len()].join(", ");
                clauses.push(format!("{column} {operator} ({placeholders})"));
            }
        }
        params.extend(converted);
    }

    Ok(WhereClause {
        sql: clauses.join(" AND "),
        params,
    })
}
