//! SQL statement generation for entity loads and writes.
//!
//! All statements use backtick-quoted identifiers and `?` placeholders.
//! Relationship joins are `LEFT JOIN ... USING`, so related tables must
//! share key column names with the side that owns the keys.

use std::collections::HashMap;
use std::rc::Rc;

use rowbound_core::Value;
use rowbound_query::WhereClause;
use rowbound_schema::{to_storage, EntityTypeSchema};

use crate::entity::Entity;
use crate::graph::RelationshipGraph;

fn quote(identifier: &str) -> String {
    format!("`{identifier}`")
}

fn using_clause(columns: &[String]) -> String {
    let quoted: Vec<String> = columns.iter().map(|c| quote(c)).collect();
    format!("USING ({})", quoted.join(", "))
}

/// Build the joined SELECT for an entity type and its relationship graph.
///
/// Every field of every involved table is projected with a qualified
/// `table.field` alias so result rows can be split back per table.
/// Relationships whose schemas are absent from `schemas` or lack a primary
/// key are skipped with a warning rather than producing broken joins.
#[must_use]
pub fn select_sql(
    base: &EntityTypeSchema,
    graph: &RelationshipGraph,
    schemas: &HashMap<String, Rc<EntityTypeSchema>>,
) -> String {
    let mut joined_tables: Vec<&EntityTypeSchema> = vec![base];
    let mut joins: Vec<String> = Vec::new();

    let join = |related: &str, key_owner_is_base: bool| {
        let Some(schema) = schemas.get(related) else {
            tracing::warn!(related, "no schema for related type, join skipped");
            return None;
        };
        let keys = if key_owner_is_base {
            base.primary_group()
        } else {
            schema.primary_group()
        };
        let Some(keys) = keys else {
            tracing::warn!(related, "no key group available, join skipped");
            return None;
        };
        Some(format!(
            "LEFT JOIN {} {}",
            quote(&schema.table),
            using_clause(keys)
        ))
    };

    for related in graph.belongs_to_types() {
        if let Some(sql) = join(related, false) {
            joins.push(sql);
            joined_tables.push(schemas[related].as_ref());
        }
    }
    for related in graph.has_a_types().chain(graph.has_many_types()) {
        if let Some(sql) = join(related, true) {
            joins.push(sql);
            joined_tables.push(schemas[related].as_ref());
        }
    }
    for (child, bridge) in graph.through_pairs() {
        let Some(bridge_sql) = join(bridge, true) else {
            continue;
        };
        // The bridge carries the child's key columns; join the child off it.
        let Some(child_schema) = schemas.get(child) else {
            tracing::warn!(child, "no schema for through child, join skipped");
            continue;
        };
        let Some(child_keys) = child_schema.primary_group() else {
            tracing::warn!(child, "through child has no key group, join skipped");
            continue;
        };
        joins.push(bridge_sql);
        joined_tables.push(schemas[bridge].as_ref());
        joins.push(format!(
            "LEFT JOIN {} {}",
            quote(&child_schema.table),
            using_clause(child_keys)
        ));
        joined_tables.push(child_schema.as_ref());
    }

    let mut seen_tables: Vec<&str> = Vec::new();
    let mut columns: Vec<String> = Vec::new();
    for schema in joined_tables {
        if seen_tables.contains(&schema.table.as_str()) {
            continue;
        }
        seen_tables.push(&schema.table);
        for field in schema.field_names() {
            columns.push(format!(
                "{}.{} AS {}",
                quote(&schema.table),
                quote(field),
                quote(&format!("{}.{}", schema.table, field))
            ));
        }
    }

    let mut sql = format!("SELECT {} FROM {}", columns.join(", "), quote(&base.table));
    for join_sql in joins {
        sql.push(' ');
        sql.push_str(&join_sql);
    }
    sql
}

/// Build the INSERT for an entity.
///
/// Every schema field is listed; fields without a pending value fall back
/// to the literal `DEFAULT` marker so column defaults apply.
#[must_use]
pub fn insert_sql(schema: &EntityTypeSchema, entity: &Entity) -> (String, Vec<Value>) {
    let mut columns: Vec<String> = Vec::new();
    let mut markers: Vec<&str> = Vec::new();
    let mut params: Vec<Value> = Vec::new();

    for field in &schema.fields {
        columns.push(quote(&field.name));
        match entity.dirty_value(&field.name) {
            Some(value) => {
                markers.push("?");
                params.push(to_storage(field, value.clone()));
            }
            None => markers.push("DEFAULT"),
        }
    }

    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote(&schema.table),
        columns.join(", "),
        markers.join(", ")
    );
    (sql, params)
}

/// Build the UPDATE for an entity's pending changes.
///
/// Shifted fields update relative to their stored value
/// (`` `f` = `f` + ? ``); other dirty fields assign directly. Returns
/// `None` when nothing is dirty.
#[must_use]
pub fn update_sql(
    schema: &EntityTypeSchema,
    entity: &Entity,
    clause: &WhereClause,
) -> Option<(String, Vec<Value>)> {
    let mut assignments: Vec<String> = Vec::new();
    let mut params: Vec<Value> = Vec::new();

    for field in &schema.fields {
        let Some(value) = entity.dirty_value(&field.name) else {
            continue;
        };
        if let Some(shift) = entity.shift_of(&field.name) {
            assignments.push(format!(
                "{col} = {col} {op} ?",
                col = quote(&field.name),
                op = shift.op.symbol()
            ));
            params.push(to_storage(field, shift.magnitude.clone()));
        } else {
            assignments.push(format!("{} = ?", quote(&field.name)));
            params.push(to_storage(field, value.clone()));
        }
    }

    if assignments.is_empty() {
        return None;
    }

    let mut sql = format!(
        "UPDATE {} SET {}",
        quote(&schema.table),
        assignments.join(", ")
    );
    if !clause.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clause.sql);
        params.extend(clause.params.iter().cloned());
    }
    sql.push_str(" LIMIT 1");
    Some((sql, params))
}

/// Build a DELETE constrained by a compiled clause and optional limit.
#[must_use]
pub fn delete_sql(
    schema: &EntityTypeSchema,
    clause: &WhereClause,
    limit: Option<u64>,
) -> (String, Vec<Value>) {
    let mut sql = format!("DELETE FROM {}", quote(&schema.table));
    let mut params = Vec::new();
    if !clause.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clause.sql);
        params.extend(clause.params.iter().cloned());
    }
    if let Some(limit) = limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }
    (sql, params)
}
