//! Ordered entity validation.
//!
//! A [`ValidationEngine`] runs its validators in registration order and
//! merges everything they report into one [`FieldErrors`] aggregate, so the
//! caller sees every problem at once instead of fixing them one save at a
//! time. The required-fields check always runs last: a field that is both
//! missing and malformed reports its format problem first.

use std::collections::BTreeMap;

use rowbound_core::{FieldErrors, Result, Value};
use rowbound_schema::{EntityTypeSchema, FieldDef};

use crate::checks;
use crate::entity::Entity;

/// A named validation pass.
pub type Validator = Box<dyn Fn(&Entity, &EntityTypeSchema) -> FieldErrors>;

/// How a required field treats zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// NULL and blank text are missing.
    Present,
    /// NULL, blank text, and numeric zero are missing.
    PresentNonZero,
}

pub struct ValidationEngine {
    validators: Vec<(String, Validator)>,
    required: BTreeMap<String, Requirement>,
}

impl ValidationEngine {
    /// An engine preloaded with the schema-driven data-types pass.
    #[must_use]
    pub fn new() -> Self {
        let mut engine = Self {
            validators: Vec::new(),
            required: BTreeMap::new(),
        };
        engine.register("data_types", |entity, schema| {
            data_types_check(entity, schema)
        });
        engine
    }

    /// An engine with no built-in passes.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            validators: Vec::new(),
            required: BTreeMap::new(),
        }
    }

    /// Append a named validator. Registration order is execution order.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        validator: impl Fn(&Entity, &EntityTypeSchema) -> FieldErrors + 'static,
    ) {
        self.validators.push((name.into(), Box::new(validator)));
    }

    /// Mark a field required.
    pub fn require(&mut self, field: impl Into<String>) {
        self.required.insert(field.into(), Requirement::Present);
    }

    /// Mark a field required with zero counting as missing.
    pub fn require_nonzero(&mut self, field: impl Into<String>) {
        self.required
            .insert(field.into(), Requirement::PresentNonZero);
    }

    /// The name the required-fields pass answers to in a subset.
    pub const REQUIRED: &'static str = "required";

    #[must_use]
    pub fn validator_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.validators.iter().map(|(n, _)| n.as_str()).collect();
        names.push(Self::REQUIRED);
        names
    }

    /// Run the validators, then the required check, and aggregate.
    ///
    /// A `subset` intersects with the registered routine list by name:
    /// only the named validators run, and the required pass runs only when
    /// [`ValidationEngine::REQUIRED`] is among them. Unknown names are
    /// ignored.
    pub fn validate(
        &self,
        entity: &Entity,
        schema: &EntityTypeSchema,
        subset: Option<&[&str]>,
    ) -> Result<()> {
        let selected = |name: &str| subset.is_none_or(|names| names.contains(&name));

        let mut aggregate = FieldErrors::new();
        for (name, validator) in &self.validators {
            if !selected(name) {
                continue;
            }
            let reported = validator(entity, schema);
            if !reported.is_empty() {
                tracing::debug!(validator = %name, problems = reported.len(), "validator reported");
            }
            aggregate.merge(reported);
        }

        // Required fields last, so format problems lead.
        if selected(Self::REQUIRED) {
            for (field, requirement) in &self.required {
                let zero_missing = *requirement == Requirement::PresentNonZero;
                let present = entity
                    .get(field)
                    .is_some_and(|v| checks::is_present(v, zero_missing));
                if !present {
                    aggregate.push(field.clone(), format!("{field} is required"));
                }
            }
        }

        if aggregate.is_empty() {
            Ok(())
        } else {
            Err(aggregate.into_error())
        }
    }
}

impl Default for ValidationEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn check_field(field: &FieldDef, value: &Value, errors: &mut FieldErrors) {
    let name = &field.name;
    if field.is_int() || field.is_timestamp() {
        if !checks::is_integer(value) {
            errors.push(name.clone(), format!("{name} should be an Integer"));
        }
    } else if field.is_float() {
        if !checks::is_float(value) {
            errors.push(name.clone(), format!("{name} should be a Float"));
        }
    } else if field.is_tinyint() {
        if !checks::is_boolean(value) {
            errors.push(name.clone(), format!("{name} should be a Boolean"));
        }
    } else if field.is_enum() {
        if !checks::in_options(value, &field.options()) {
            errors.push(name.clone(), format!("{name} is not a valid option"));
        }
    } else if field.is_set() {
        if !checks::all_in_options(value, &field.options()) {
            errors.push(name.clone(), format!("{name} contains an invalid option"));
        }
    } else if field.is_varchar() {
        if let Some(size) = field.varchar_size() {
            if !checks::within_length(value, size) {
                errors.push(
                    name.clone(),
                    format!("{name} should be at most {size} characters"),
                );
            }
        }
    }
    if (field.is_unsigned() || field.is_timestamp()) && !checks::is_positive(value) {
        errors.push(name.clone(), format!("{name} should be a positive value"));
    }
}

/// Check every dirty, non-NULL field against its declared column type.
#[must_use]
pub fn data_types_check(entity: &Entity, schema: &EntityTypeSchema) -> FieldErrors {
    let mut errors = FieldErrors::new();
    for field in &schema.fields {
        let Some(value) = entity.dirty_value(&field.name) else {
            continue;
        };
        if value.is_null() {
            continue;
        }
        check_field(field, value, &mut errors);
    }
    errors
}

#[cfg(test)]
mod tests {
    use rowbound_core::Error;
    use rowbound_schema::FieldDef;

    use super::*;

    fn schema() -> EntityTypeSchema {
        EntityTypeSchema::new("tickets")
            .with_field(FieldDef::new("ticket_id", "int(11)"))
            .with_field(FieldDef::new("subject", "varchar(10)"))
            .with_field(FieldDef::new("votes", "int(11) unsigned"))
            .with_field(FieldDef::new("status", "enum('new','open','closed')"))
            .with_field(FieldDef::new("flags", "set('pinned','locked')"))
            .with_field(FieldDef::new("urgent", "tinyint(1)"))
            .with_key_group(vec!["ticket_id".into()])
    }

    fn validation_errors(err: Error) -> FieldErrors {
        match err {
            Error::Validation(errors) => errors,
            other => panic!("expected validation error, got {other}"),
        }
    }

    #[test]
    fn data_types_cover_column_kinds() {
        let schema = schema();
        let mut entity = Entity::new(&schema);
        entity.set("subject", "way too long for ten");
        entity.set("votes", -2);
        entity.set("status", "reopened");
        entity.set("flags", vec!["pinned".to_string(), "starred".to_string()]);
        entity.set("urgent", 3);

        let engine = ValidationEngine::new();
        let errors = validation_errors(engine.validate(&entity, &schema, None).unwrap_err());
        assert!(errors.get("subject").is_some());
        assert_eq!(
            errors.get("votes"),
            Some(&["votes should be a positive value".to_string()][..])
        );
        assert!(errors.get("status").is_some());
        assert!(errors.get("flags").is_some());
        assert!(errors.get("urgent").is_some());
    }

    #[test]
    fn clean_and_null_fields_are_not_type_checked() {
        let schema = schema();
        let mut entity = Entity::new(&schema);
        entity.load_clean("status", Value::Text("bogus".into()));
        entity.set("votes", Value::Null);

        let engine = ValidationEngine::new();
        assert!(engine.validate(&entity, &schema, None).is_ok());
    }

    #[test]
    fn required_check_runs_after_registered_validators() {
        let schema = schema();
        let entity = Entity::new(&schema);

        let mut engine = ValidationEngine::empty();
        engine.register("subject_present_twice", |_, _| {
            let mut errors = FieldErrors::new();
            errors.push("subject", "subject looks off");
            errors
        });
        engine.require("subject");

        let errors = validation_errors(engine.validate(&entity, &schema, None).unwrap_err());
        assert_eq!(
            errors.get("subject"),
            Some(
                &[
                    "subject looks off".to_string(),
                    "subject is required".to_string()
                ][..]
            )
        );
    }

    #[test]
    fn required_nonzero_rejects_zero() {
        let schema = schema();
        let mut entity = Entity::new(&schema);
        entity.set("ticket_id", 0);

        let mut engine = ValidationEngine::empty();
        engine.require_nonzero("ticket_id");
        assert!(engine.validate(&entity, &schema, None).is_err());

        entity.set("ticket_id", 5);
        assert!(engine.validate(&entity, &schema, None).is_ok());
    }

    #[test]
    fn subset_selects_validators_by_name() {
        let schema = schema();
        let mut entity = Entity::new(&schema);
        entity.set("votes", -1);

        let mut engine = ValidationEngine::new();
        engine.register("house_rule", |_, _| {
            let mut errors = FieldErrors::new();
            errors.push("subject", "house rule violated");
            errors
        });
        engine.require("status");

        // Only the named routine runs; format and required checks sit out.
        let errors = validation_errors(
            engine
                .validate(&entity, &schema, Some(&["house_rule"]))
                .unwrap_err(),
        );
        assert!(errors.get("subject").is_some());
        assert!(errors.get("votes").is_none());
        assert!(errors.get("status").is_none());

        // Dropping `data_types` from the subset skips format checks entirely.
        let errors = validation_errors(
            engine
                .validate(&entity, &schema, Some(&[ValidationEngine::REQUIRED]))
                .unwrap_err(),
        );
        assert!(errors.get("status").is_some());
        assert!(errors.get("votes").is_none());

        assert!(engine
            .validate(&entity, &schema, Some(&["data_types"]))
            .is_err());
        assert!(engine.validate(&entity, &schema, Some(&["unknown"])).is_ok());
    }

    #[test]
    fn aggregates_every_validator() {
        let schema = schema();
        let mut entity = Entity::new(&schema);
        entity.set("votes", -1);

        let mut engine = ValidationEngine::new();
        engine.register("house_rule", |_, _| {
            let mut errors = FieldErrors::new();
            errors.push("subject", "house rule violated");
            errors
        });
        engine.require("status");

        let errors = validation_errors(engine.validate(&entity, &schema, None).unwrap_err());
        assert_eq!(errors.len(), 3);
    }
}
