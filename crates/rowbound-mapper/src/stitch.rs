//! Reassembling nested entity graphs from joined result rows.
//!
//! A joined SELECT returns one flat row per combination of related rows;
//! the same base entity appears once per combination and the same related
//! entity can repeat across combinations. Stitching groups rows by the base
//! entity's key, deduplicates every related occurrence by its own key, and
//! discards the all-NULL slices a LEFT JOIN produces for missing relations.

use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use rowbound_core::{CompositeKey, Row, Value};
use rowbound_schema::{from_storage, EntityTypeSchema};

use crate::graph::RelationshipGraph;

/// One related entity occurrence: its converted attributes plus any bags
/// nested under it (used by has-many-through bridges, which carry their
/// child entity).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttrBag {
    pub attrs: BTreeMap<String, Value>,
    pub nested: BTreeMap<String, AttrBag>,
}

impl AttrBag {
    /// Extract a key over the named columns; missing columns read as NULL.
    #[must_use]
    pub fn key_over(&self, columns: &[String]) -> CompositeKey {
        CompositeKey::new(
            columns
                .iter()
                .map(|c| self.attrs.get(c).cloned().unwrap_or(Value::Null))
                .collect(),
        )
    }
}

/// A deduplicated, insertion-ordered collection of related entities.
///
/// The first occurrence of a key wins; later rows carrying the same related
/// entity are ignored. Iteration follows first-seen order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyedBags {
    entries: Vec<(CompositeKey, AttrBag)>,
}

impl KeyedBags {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert unless the key is already present.
    pub fn insert(&mut self, key: CompositeKey, bag: AttrBag) {
        if !self.contains(&key) {
            self.entries.push((key, bag));
        }
    }

    #[must_use]
    pub fn contains(&self, key: &CompositeKey) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    #[must_use]
    pub fn get(&self, key: &CompositeKey) -> Option<&AttrBag> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, b)| b)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CompositeKey, &AttrBag)> {
        self.entries.iter().map(|(k, b)| (k, b))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&CompositeKey, &mut AttrBag)> {
        self.entries.iter_mut().map(|(k, b)| (&*k, b))
    }
}

/// A related slot on a stitched record.
#[derive(Debug, Clone, PartialEq)]
pub enum Relation {
    One(AttrBag),
    Many(KeyedBags),
}

/// One base entity reassembled from joined rows: its own converted
/// attributes plus its relations, keyed by relation name (single relations
/// under the related type's name, collections under the pluralized name).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StitchedRecord {
    pub attrs: BTreeMap<String, Value>,
    pub relations: BTreeMap<String, Relation>,
}

/// Everything stitching needs to know about the shape of the result.
pub struct StitchContext<'a> {
    pub base_schema: &'a EntityTypeSchema,
    pub graph: &'a RelationshipGraph,
    pub schemas: &'a HashMap<String, Rc<EntityTypeSchema>>,
}

/// Naive pluralization for collection relation names.
#[must_use]
pub fn pluralize(name: &str) -> String {
    format!("{name}s")
}

struct Group {
    attrs: BTreeMap<String, Value>,
    ones: BTreeMap<String, AttrBag>,
    manys: BTreeMap<String, KeyedBags>,
    through_children: BTreeMap<String, KeyedBags>,
}

/// Convert a table's slice of a row into domain-form attributes.
fn convert_slice(
    schema: &EntityTypeSchema,
    columns: &BTreeMap<&str, &Value>,
) -> BTreeMap<String, Value> {
    let mut attrs = BTreeMap::new();
    for (column, value) in columns {
        match schema.field(column) {
            Some(field) => {
                attrs.insert((*column).to_string(), from_storage(field, (*value).clone()));
            }
            None => {
                attrs.insert((*column).to_string(), (*value).clone());
            }
        }
    }
    attrs
}

fn key_from_attrs(attrs: &BTreeMap<String, Value>, group: &[String]) -> CompositeKey {
    CompositeKey::new(
        group
            .iter()
            .map(|c| attrs.get(c).cloned().unwrap_or(Value::Null))
            .collect(),
    )
}

/// Stitch joined rows back into nested records, in first-seen base-key
/// order.
///
/// Rows whose base-key slice is entirely NULL/blank are discarded, as are
/// related slices produced by outer-join misses.
#[must_use]
pub fn stitch(ctx: &StitchContext<'_>, rows: &[Row]) -> Vec<StitchedRecord> {
    let Some(base_keys) = ctx.base_schema.primary_group() else {
        tracing::warn!(table = %ctx.base_schema.table, "base type has no key group");
        return Vec::new();
    };

    let mut order: Vec<CompositeKey> = Vec::new();
    let mut groups: HashMap<CompositeKey, Group> = HashMap::new();

    for row in rows {
        let tables = row.split_by_table();
        let Some(base_columns) = tables.get(ctx.base_schema.table.as_str()) else {
            tracing::warn!(table = %ctx.base_schema.table, "row carries no base columns");
            continue;
        };
        let base_attrs = convert_slice(ctx.base_schema, base_columns);
        let base_key = key_from_attrs(&base_attrs, base_keys);
        if base_key.is_vacant() {
            continue;
        }

        let group = groups.entry(base_key.clone()).or_insert_with(|| {
            order.push(base_key.clone());
            Group {
                attrs: base_attrs,
                ones: BTreeMap::new(),
                manys: BTreeMap::new(),
                through_children: BTreeMap::new(),
            }
        });

        let absorb = |related: &str, many: bool, child_pool: bool, group: &mut Group| {
            let Some(schema) = ctx.schemas.get(related) else {
                return;
            };
            let Some(columns) = tables.get(schema.table.as_str()) else {
                return;
            };
            let Some(keys) = schema.primary_group() else {
                return;
            };
            let attrs = convert_slice(schema, columns);
            let key = key_from_attrs(&attrs, keys);
            if key.is_vacant() {
                return;
            }
            let bag = AttrBag {
                attrs,
                nested: BTreeMap::new(),
            };
            if child_pool {
                group
                    .through_children
                    .entry(related.to_string())
                    .or_default()
                    .insert(key, bag);
            } else if many {
                group
                    .manys
                    .entry(related.to_string())
                    .or_default()
                    .insert(key, bag);
            } else {
                group.ones.entry(related.to_string()).or_insert(bag);
            }
        };

        for related in ctx.graph.belongs_to_types().chain(ctx.graph.has_a_types()) {
            absorb(related, false, false, group);
        }
        for related in ctx.graph.has_many_types() {
            absorb(related, true, false, group);
        }
        for (child, bridge) in ctx.graph.through_pairs() {
            absorb(bridge, true, false, group);
            absorb(child, false, true, group);
        }
    }

    order
        .into_iter()
        .filter_map(|key| groups.remove(&key))
        .map(|mut group| {
            // Re-attach through children under their bridge occurrences: the
            // bridge row carries the child's key columns.
            for (child, bridge) in ctx.graph.through_pairs() {
                let Some(child_schema) = ctx.schemas.get(child) else {
                    continue;
                };
                let Some(child_keys) = child_schema.primary_group() else {
                    continue;
                };
                let Some(pool) = group.through_children.get(child) else {
                    continue;
                };
                if let Some(bridges) = group.manys.get_mut(bridge) {
                    for (_, bridge_bag) in bridges.iter_mut() {
                        let child_key = bridge_bag.key_over(child_keys);
                        if let Some(child_bag) = pool.get(&child_key) {
                            bridge_bag
                                .nested
                                .insert(child.to_string(), child_bag.clone());
                        }
                    }
                }
            }

            let mut relations = BTreeMap::new();
            for (name, bag) in group.ones {
                relations.insert(name, Relation::One(bag));
            }
            for (name, bags) in group.manys {
                relations.insert(pluralize(&name), Relation::Many(bags));
            }
            StitchedRecord {
                attrs: group.attrs,
                relations,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use rowbound_schema::FieldDef;

    use super::*;

    fn schemas() -> HashMap<String, Rc<EntityTypeSchema>> {
        let mut map = HashMap::new();
        map.insert(
            "ticket".to_string(),
            Rc::new(
                EntityTypeSchema::new("tickets")
                    .with_field(FieldDef::new("ticket_id", "int(11)"))
                    .with_field(FieldDef::new("subject", "varchar(80)"))
                    .with_key_group(vec!["ticket_id".into()]),
            ),
        );
        map.insert(
            "account".to_string(),
            Rc::new(
                EntityTypeSchema::new("accounts")
                    .with_field(FieldDef::new("account_id", "int(11)"))
                    .with_field(FieldDef::new("email", "varchar(100)"))
                    .with_key_group(vec!["account_id".into()]),
            ),
        );
        map.insert(
            "comment".to_string(),
            Rc::new(
                EntityTypeSchema::new("comments")
                    .with_field(FieldDef::new("comment_id", "int(11)"))
                    .with_field(FieldDef::new("body", "text"))
                    .with_key_group(vec!["comment_id".into()]),
            ),
        );
        map.insert(
            "tag".to_string(),
            Rc::new(
                EntityTypeSchema::new("tags")
                    .with_field(FieldDef::new("tag_id", "int(11)"))
                    .with_field(FieldDef::new("label", "varchar(40)"))
                    .with_key_group(vec!["tag_id".into()]),
            ),
        );
        map.insert(
            "ticket_tag".to_string(),
            Rc::new(
                EntityTypeSchema::new("ticket_tags")
                    .with_field(FieldDef::new("ticket_id", "int(11)"))
                    .with_field(FieldDef::new("tag_id", "int(11)"))
                    .with_key_group(vec!["ticket_id".into(), "tag_id".into()]),
            ),
        );
        map
    }

    fn graph() -> RelationshipGraph {
        RelationshipGraph::new()
            .belongs_to("account")
            .has_many("comment")
            .has_many_through("tag", "ticket_tag")
    }

    fn row(
        ticket: i64,
        subject: &str,
        account: Option<i64>,
        comment: Option<(i64, &str)>,
        tag: Option<(i64, &str)>,
    ) -> Row {
        let mut row = Row::new();
        row.insert("tickets", "ticket_id", Value::Int(ticket));
        row.insert("tickets", "subject", Value::Text(subject.into()));
        row.insert("accounts", "account_id", account.map_or(Value::Null, Value::Int));
        row.insert(
            "accounts",
            "email",
            account.map_or(Value::Null, |a| Value::Text(format!("user{a}@example.org"))),
        );
        match comment {
            Some((id, body)) => {
                row.insert("comments", "comment_id", Value::Int(id));
                row.insert("comments", "body", Value::Text(body.into()));
            }
            None => {
                row.insert("comments", "comment_id", Value::Null);
                row.insert("comments", "body", Value::Null);
            }
        }
        match tag {
            Some((id, label)) => {
                row.insert("ticket_tags", "ticket_id", Value::Int(ticket));
                row.insert("ticket_tags", "tag_id", Value::Int(id));
                row.insert("tags", "tag_id", Value::Int(id));
                row.insert("tags", "label", Value::Text(label.into()));
            }
            None => {
                row.insert("ticket_tags", "ticket_id", Value::Null);
                row.insert("ticket_tags", "tag_id", Value::Null);
                row.insert("tags", "tag_id", Value::Null);
                row.insert("tags", "label", Value::Null);
            }
        }
        row
    }

    fn stitch_rows(rows: &[Row]) -> Vec<StitchedRecord> {
        let schemas = schemas();
        let graph = graph();
        let base = Rc::clone(&schemas["ticket"]);
        let ctx = StitchContext {
            base_schema: &base,
            graph: &graph,
            schemas: &schemas,
        };
        stitch(&ctx, rows)
    }

    #[test]
    fn fan_out_groups_and_dedups() {
        let rows = vec![
            row(1, "crash", Some(7), Some((100, "first")), Some((5, "bug"))),
            row(1, "crash", Some(7), Some((100, "first")), Some((6, "ui"))),
            row(1, "crash", Some(7), Some((101, "second")), Some((5, "bug"))),
            row(1, "crash", Some(7), Some((101, "second")), Some((6, "ui"))),
            row(2, "typo", None, None, None),
        ];
        let records = stitch_rows(&rows);
        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert_eq!(first.attrs["ticket_id"], Value::Int(1));

        let Some(Relation::One(account)) = first.relations.get("account") else {
            panic!("account relation missing");
        };
        assert_eq!(account.attrs["account_id"], Value::Int(7));

        let Some(Relation::Many(comments)) = first.relations.get("comments") else {
            panic!("comments relation missing");
        };
        assert_eq!(comments.len(), 2);
        let bodies: Vec<&Value> = comments.iter().map(|(_, b)| &b.attrs["body"]).collect();
        assert_eq!(
            bodies,
            vec![&Value::Text("first".into()), &Value::Text("second".into())]
        );
    }

    #[test]
    fn outer_join_miss_produces_no_relation() {
        let records = stitch_rows(&[row(2, "typo", None, None, None)]);
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert!(!record.relations.contains_key("account"));
        assert!(!record.relations.contains_key("comments"));
        assert!(!record.relations.contains_key("ticket_tags"));
    }

    #[test]
    fn through_children_nest_under_bridges() {
        let rows = vec![
            row(1, "crash", Some(7), None, Some((5, "bug"))),
            row(1, "crash", Some(7), None, Some((6, "ui"))),
        ];
        let records = stitch_rows(&rows);
        let Some(Relation::Many(bridges)) = records[0].relations.get("ticket_tags") else {
            panic!("bridge relation missing");
        };
        assert_eq!(bridges.len(), 2);
        for (_, bridge) in bridges.iter() {
            let tag = bridge.nested.get("tag").expect("nested tag");
            assert_eq!(tag.attrs["tag_id"], bridge.attrs["tag_id"]);
        }
        // Children live under their bridges, not as a top-level relation.
        assert!(!records[0].relations.contains_key("tags"));
    }

    #[test]
    fn vacant_base_rows_are_discarded() {
        let mut row = Row::new();
        row.insert("tickets", "ticket_id", Value::Null);
        row.insert("tickets", "subject", Value::Null);
        assert!(stitch_rows(&[row]).is_empty());
    }

    #[test]
    fn first_seen_order_is_preserved() {
        let rows = vec![
            row(3, "c", None, None, None),
            row(1, "a", None, None, None),
            row(3, "c", None, None, None),
            row(2, "b", None, None, None),
        ];
        let records = stitch_rows(&rows);
        let ids: Vec<&Value> = records.iter().map(|r| &r.attrs["ticket_id"]).collect();
        assert_eq!(ids, vec![&Value::Int(3), &Value::Int(1), &Value::Int(2)]);
    }
}
