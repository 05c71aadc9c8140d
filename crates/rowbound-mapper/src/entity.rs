//! Change-tracked entities.
//!
//! An [`Entity`] keeps four value maps: `clean` (as loaded from storage),
//! `dirty` (modified, pending save), `extra` (values for fields the schema
//! does not know, never persisted), and `shifts` (pending relative
//! arithmetic). Reads prefer dirty over clean over extra; writes that land
//! back on the clean value revert the field instead of dirtying it.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use rowbound_core::{Error, Result, Value};
use rowbound_schema::EntityTypeSchema;

use crate::stitch::Relation;

/// Relative-arithmetic direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftOp {
    Add,
    Sub,
}

impl ShiftOp {
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            ShiftOp::Add => "+",
            ShiftOp::Sub => "-",
        }
    }
}

/// A pending relative update on one field. Only the most recent shift per
/// field is retained; the generated UPDATE applies that one.
#[derive(Debug, Clone, PartialEq)]
pub struct Shift {
    pub op: ShiftOp,
    pub magnitude: Value,
}

/// A change-tracked, schema-aware record.
#[derive(Debug, Clone, Default)]
pub struct Entity {
    known: BTreeSet<String>,
    clean: HashMap<String, Value>,
    dirty: HashMap<String, Value>,
    extra: HashMap<String, Value>,
    shifts: HashMap<String, Shift>,
    relations: HashMap<String, Relation>,
    new: bool,
    deleting: bool,
}

impl Entity {
    /// A blank entity knowing the given schema's fields. Starts new.
    #[must_use]
    pub fn new(schema: &EntityTypeSchema) -> Self {
        Self {
            known: schema.field_names().map(str::to_string).collect(),
            new: true,
            ..Self::default()
        }
    }

    /// A blank entity with every value applied through [`Entity::set`].
    #[must_use]
    pub fn from_attrs(
        schema: &EntityTypeSchema,
        attrs: impl IntoIterator<Item = (String, Value)>,
    ) -> Self {
        let mut entity = Self::new(schema);
        for (field, value) in attrs {
            entity.set(&field, value);
        }
        entity
    }

    #[must_use]
    pub fn knows(&self, field: &str) -> bool {
        self.known.contains(field)
    }

    /// Assign a value.
    ///
    /// Unknown fields land in the extra map untracked. Known fields compare
    /// against the clean value with numeric-string tolerance: writing the
    /// clean value back reverts the field. Any assignment cancels a pending
    /// shift on the field.
    pub fn set(&mut self, field: &str, value: impl Into<Value>) {
        let value = value.into();
        if !self.knows(field) {
            self.extra.insert(field.to_string(), value);
            return;
        }
        self.shifts.remove(field);
        match self.clean.get(field) {
            Some(clean) if clean.equivalent(&value) => {
                self.dirty.remove(field);
            }
            _ => {
                self.dirty.insert(field.to_string(), value);
            }
        }
    }

    /// Mark a field for clearing. Equivalent to assigning NULL.
    pub fn unset(&mut self, field: &str) {
        self.set(field, Value::Null);
    }

    /// The effective value of a field: dirty, then clean, then extra.
    ///
    /// A dirty NULL is visible as `Some(&Value::Null)` (the field is
    /// explicitly cleared); a clean or extra NULL reads as `None`.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.value_of(field, false)
    }

    /// The clean value of a field, ignoring pending changes.
    #[must_use]
    pub fn clean_value(&self, field: &str) -> Option<&Value> {
        self.value_of(field, true)
    }

    fn value_of(&self, field: &str, clean_only: bool) -> Option<&Value> {
        if !clean_only {
            if let Some(value) = self.dirty.get(field) {
                return Some(value);
            }
        }
        if let Some(value) = self.clean.get(field) {
            if !value.is_null() {
                return Some(value);
            }
        }
        self.extra.get(field).filter(|v| !v.is_null())
    }

    /// True when the field currently reads as a value.
    #[must_use]
    pub fn is_set(&self, field: &str) -> bool {
        self.get(field).is_some_and(|v| !v.is_null())
    }

    /// Shift a field up by `amount`.
    pub fn add(&mut self, field: &str, amount: impl Into<Value>) -> Result<()> {
        self.shift(field, ShiftOp::Add, amount.into())
    }

    /// Shift a field down by `amount`.
    pub fn sub(&mut self, field: &str, amount: impl Into<Value>) -> Result<()> {
        self.shift(field, ShiftOp::Sub, amount.into())
    }

    fn shift(&mut self, field: &str, op: ShiftOp, amount: Value) -> Result<()> {
        let Some(delta) = amount.numeric() else {
            return Err(Error::NonNumericArithmetic {
                field: field.to_string(),
            });
        };
        let current = match self.get(field) {
            None => 0.0,
            Some(value) => value.numeric().ok_or_else(|| Error::NonNumericArithmetic {
                field: field.to_string(),
            })?,
        };

        // Integer math when both sides read exactly as integers.
        let current_int = self.get(field).map_or(Some(0), Value::integer);
        let shifted = match (current_int, amount.integer()) {
            (Some(c), Some(a)) => {
                let result = match op {
                    ShiftOp::Add => c.checked_add(a),
                    ShiftOp::Sub => c.checked_sub(a),
                };
                result.map_or_else(
                    || {
                        Value::Float(match op {
                            ShiftOp::Add => current + delta,
                            ShiftOp::Sub => current - delta,
                        })
                    },
                    Value::Int,
                )
            }
            _ => Value::Float(match op {
                ShiftOp::Add => current + delta,
                ShiftOp::Sub => current - delta,
            }),
        };

        if self.knows(field) {
            self.dirty.insert(field.to_string(), shifted);
            self.shifts.insert(
                field.to_string(),
                Shift {
                    op,
                    magnitude: amount,
                },
            );
        } else {
            self.extra.insert(field.to_string(), shifted);
        }
        Ok(())
    }

    /// Dispatch a change by field spec: `field` or `field:modifier` where
    /// the modifier is `set`/`=`, `add`/`+`, or `sub`/`-`.
    pub fn change(&mut self, field_spec: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let (field, modifier) = match field_spec.split_once(':') {
            Some((field, modifier)) => (field, modifier),
            None => {
                self.set(field_spec, value);
                return Ok(());
            }
        };
        match modifier {
            "set" | "=" => {
                self.set(field, value);
                Ok(())
            }
            "add" | "+" => self.add(field, value),
            "sub" | "-" => self.sub(field, value),
            _ => Err(Error::UnknownModifier {
                token: modifier.to_string(),
            }),
        }
    }

    /// Apply a batch of change specs, in iteration order.
    pub fn apply(
        &mut self,
        changes: impl IntoIterator<Item = (String, Value)>,
    ) -> Result<()> {
        for (spec, value) in changes {
            self.change(&spec, value)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn has_changed(&self, field: &str) -> bool {
        self.dirty.contains_key(field)
    }

    /// True if any of the named fields has a pending change.
    #[must_use]
    pub fn have_changed<'a>(&self, fields: impl IntoIterator<Item = &'a str>) -> bool {
        fields.into_iter().any(|f| self.has_changed(f))
    }

    /// Names of all dirty fields, sorted.
    #[must_use]
    pub fn changed_fields(&self) -> Vec<&str> {
        let mut fields: Vec<&str> = self.dirty.keys().map(String::as_str).collect();
        fields.sort_unstable();
        fields
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    #[must_use]
    pub fn is_shifting(&self, field: &str) -> bool {
        self.shifts.contains_key(field)
    }

    #[must_use]
    pub fn shift_of(&self, field: &str) -> Option<&Shift> {
        self.shifts.get(field)
    }

    #[must_use]
    pub fn dirty_value(&self, field: &str) -> Option<&Value> {
        self.dirty.get(field)
    }

    /// Discard the pending change and shift on one field.
    pub fn clear_changed(&mut self, field: &str) {
        self.dirty.remove(field);
        self.shifts.remove(field);
    }

    /// Discard all pending changes and shifts.
    pub fn reset_changed(&mut self) {
        self.dirty.clear();
        self.shifts.clear();
    }

    /// Commit pending changes: dirty values become clean, shifts drop.
    /// Idempotent.
    pub fn migrate_dirty_to_clean(&mut self) {
        for (field, value) in self.dirty.drain() {
            self.clean.insert(field, value);
        }
        self.shifts.clear();
    }

    /// Snapshot the effective values (clean overlaid by dirty), optionally
    /// including extra values.
    #[must_use]
    pub fn to_attrs(&self, include_extra: bool) -> BTreeMap<String, Value> {
        let mut attrs: BTreeMap<String, Value> = BTreeMap::new();
        if include_extra {
            for (field, value) in &self.extra {
                attrs.insert(field.clone(), value.clone());
            }
        }
        for (field, value) in &self.clean {
            attrs.insert(field.clone(), value.clone());
        }
        for (field, value) in &self.dirty {
            attrs.insert(field.clone(), value.clone());
        }
        attrs
    }

    /// Load a clean value directly, bypassing change tracking. Used when
    /// hydrating from storage.
    pub fn load_clean(&mut self, field: &str, value: Value) {
        self.clean.insert(field.to_string(), value);
    }

    #[must_use]
    pub fn is_new(&self) -> bool {
        self.new
    }

    pub fn mark_as_new(&mut self, new: bool) {
        self.new = new;
    }

    #[must_use]
    pub fn is_deleting(&self) -> bool {
        self.deleting
    }

    /// Arm or disarm deletion on the next save.
    pub fn delete_on_save(&mut self, deleting: bool) {
        self.deleting = deleting;
    }

    pub fn set_relation(&mut self, name: impl Into<String>, relation: Relation) {
        self.relations.insert(name.into(), relation);
    }

    #[must_use]
    pub fn relation(&self, name: &str) -> Option<&Relation> {
        self.relations.get(name)
    }

    pub fn relations(&self) -> impl Iterator<Item = (&str, &Relation)> {
        self.relations.iter().map(|(n, r)| (n.as_str(), r))
    }
}
