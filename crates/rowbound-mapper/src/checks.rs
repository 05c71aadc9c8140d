//! Value predicates used by the validation engine.

use std::sync::OnceLock;

use regex::Regex;
use rowbound_core::Value;

fn integer_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^-?\d+$").unwrap_or_else(|_| Regex::new("$^").unwrap()))
}

fn float_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^-?\d*\.?\d*$").unwrap_or_else(|_| Regex::new("$^").unwrap()))
}

/// Whether a value counts as present for a required check.
///
/// NULL and blank text are always missing; with `zero_missing`, a numeric
/// zero is missing too (useful for required foreign keys, where 0 means
/// "not pointed anywhere").
#[must_use]
pub fn is_present(value: &Value, zero_missing: bool) -> bool {
    match value {
        Value::Null => false,
        Value::Text(s) => {
            if s.trim().is_empty() {
                return false;
            }
            !(zero_missing && value.numeric() == Some(0.0))
        }
        Value::List(items) => !items.is_empty(),
        Value::Bool(_) => true,
        _ => !(zero_missing && value.numeric() == Some(0.0)),
    }
}

#[must_use]
pub fn is_integer(value: &Value) -> bool {
    match value {
        Value::Int(_) => true,
        Value::Text(s) => integer_pattern().is_match(s),
        _ => false,
    }
}

#[must_use]
pub fn is_float(value: &Value) -> bool {
    match value {
        Value::Int(_) | Value::Float(_) => true,
        Value::Text(s) => s.contains(|c: char| c.is_ascii_digit()) && float_pattern().is_match(s),
        _ => false,
    }
}

/// Zero counts as positive; this backs unsigned-column checks.
#[must_use]
pub fn is_positive(value: &Value) -> bool {
    value.numeric().is_some_and(|n| n >= 0.0)
}

#[must_use]
pub fn is_boolean(value: &Value) -> bool {
    match value {
        Value::Bool(_) => true,
        Value::Int(i) => *i == 0 || *i == 1,
        Value::Text(s) => s == "0" || s == "1",
        _ => false,
    }
}

#[must_use]
pub fn in_options(value: &Value, options: &[String]) -> bool {
    let text = value.to_string();
    options.iter().any(|o| *o == text)
}

/// Every member of a list (or a single scalar) must be an allowed option.
#[must_use]
pub fn all_in_options(value: &Value, options: &[String]) -> bool {
    match value {
        Value::List(items) => items.iter().all(|i| options.iter().any(|o| o == i)),
        other => in_options(other, options),
    }
}

#[must_use]
pub fn within_length(value: &Value, max: usize) -> bool {
    value.to_string().chars().count() <= max
}
