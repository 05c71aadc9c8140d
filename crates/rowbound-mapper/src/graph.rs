//! Relationship graphs between entity types.

use rowbound_core::{Error, Result};

/// The relationships one entity type declares against others.
///
/// All relationships are expressed by shared key columns and joined with
/// `LEFT JOIN ... USING`:
///
/// - `belongs_to`: this type carries the related type's key columns.
/// - `has_a`: the related type carries this type's key columns, at most
///   one related row.
/// - `has_many`: like `has_a`, any number of related rows.
/// - `has_many_through`: many related rows reached over a bridge type that
///   carries this type's keys and the child type's keys.
#[derive(Debug, Clone, Default)]
pub struct RelationshipGraph {
    belongs_to: Vec<String>,
    has_a: Vec<String>,
    has_many: Vec<String>,
    /// `(child, bridge)` pairs.
    has_many_through: Vec<(String, String)>,
}

impl RelationshipGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn belongs_to(mut self, entity_type: impl Into<String>) -> Self {
        self.belongs_to.push(entity_type.into());
        self
    }

    #[must_use]
    pub fn has_a(mut self, entity_type: impl Into<String>) -> Self {
        self.has_a.push(entity_type.into());
        self
    }

    #[must_use]
    pub fn has_many(mut self, entity_type: impl Into<String>) -> Self {
        self.has_many.push(entity_type.into());
        self
    }

    #[must_use]
    pub fn has_many_through(
        mut self,
        child: impl Into<String>,
        bridge: impl Into<String>,
    ) -> Self {
        self.has_many_through.push((child.into(), bridge.into()));
        self
    }

    /// Reject graphs that relate a type to itself; self-joins over USING
    /// are ambiguous.
    pub fn validate(&self, own_type: &str) -> Result<()> {
        let mut related = self.related_types();
        related.retain(|t| *t == own_type);
        if related.is_empty() {
            Ok(())
        } else {
            Err(Error::InvalidRelationship {
                entity_type: own_type.to_string(),
                detail: "a type cannot relate to itself".to_string(),
            })
        }
    }

    /// Every related type, deduplicated, in declaration-group order:
    /// belongs-to, has-a, has-many, then through children and bridges.
    #[must_use]
    pub fn related_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = Vec::new();
        for t in &self.belongs_to {
            if !types.contains(&t.as_str()) {
                types.push(t);
            }
        }
        for t in &self.has_a {
            if !types.contains(&t.as_str()) {
                types.push(t);
            }
        }
        for t in &self.has_many {
            if !types.contains(&t.as_str()) {
                types.push(t);
            }
        }
        for (child, bridge) in &self.has_many_through {
            if !types.contains(&child.as_str()) {
                types.push(child);
            }
            if !types.contains(&bridge.as_str()) {
                types.push(bridge);
            }
        }
        types
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.belongs_to.is_empty()
            && self.has_a.is_empty()
            && self.has_many.is_empty()
            && self.has_many_through.is_empty()
    }

    /// True when the related type yields a collection on this side.
    #[must_use]
    pub fn is_many(&self, entity_type: &str) -> bool {
        self.has_many.iter().any(|t| t == entity_type)
            || self
                .has_many_through
                .iter()
                .any(|(child, _)| child == entity_type)
    }

    pub fn belongs_to_types(&self) -> impl Iterator<Item = &str> {
        self.belongs_to.iter().map(String::as_str)
    }

    pub fn has_a_types(&self) -> impl Iterator<Item = &str> {
        self.has_a.iter().map(String::as_str)
    }

    pub fn has_many_types(&self) -> impl Iterator<Item = &str> {
        self.has_many.iter().map(String::as_str)
    }

    /// `(child, bridge)` pairs, in declaration order.
    pub fn through_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.has_many_through
            .iter()
            .map(|(c, b)| (c.as_str(), b.as_str()))
    }
}
