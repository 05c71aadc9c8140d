//! Composite identity keys for grouping joined rows.

use std::fmt;

use crate::value::Value;

/// An ordered tuple of key-column values identifying one entity occurrence
/// inside a joined result set.
///
/// Keys are compared and hashed by value so rows belonging to the same
/// entity collapse into one group regardless of how many joined rows carried
/// them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompositeKey(Vec<Value>);

impl CompositeKey {
    #[must_use]
    pub fn new(components: Vec<Value>) -> Self {
        Self(components)
    }

    /// Number of key columns in the tuple.
    #[must_use]
    pub fn width(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn components(&self) -> &[Value] {
        &self.0
    }

    /// True when every component is NULL or blank text.
    ///
    /// A vacant key is what a LEFT JOIN produces for a missing related row;
    /// the stitcher discards such groups instead of materializing ghosts.
    #[must_use]
    pub fn is_vacant(&self) -> bool {
        self.0.iter().all(|v| match v {
            Value::Null => true,
            Value::Text(s) => s.trim().is_empty(),
            _ => false,
        })
    }
}

impl From<Vec<Value>> for CompositeKey {
    fn from(components: Vec<Value>) -> Self {
        Self::new(components)
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{v}")?;
        }
        write!(f, ")")
    }
}
