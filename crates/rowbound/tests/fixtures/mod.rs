//! Scripted in-memory storage for integration tests.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};

use rowbound::{CacheStore, ColumnInfo, KeyInfo, Result, Row, StorageConnector, Value};

/// A connector that serves canned introspection data and queued query
/// results, recording every statement it is handed.
#[derive(Default)]
pub struct MemoryConnector {
    columns: HashMap<String, Vec<ColumnInfo>>,
    keys: HashMap<String, Vec<KeyInfo>>,
    results: RefCell<VecDeque<Vec<Row>>>,
    executed: RefCell<Vec<(String, Vec<Value>)>>,
    queried: RefCell<Vec<(String, Vec<Value>)>>,
    next_insert_id: Cell<i64>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self {
            next_insert_id: Cell::new(101),
            ..Self::default()
        }
    }

    pub fn with_table(
        mut self,
        table: &str,
        columns: Vec<ColumnInfo>,
        keys: Vec<KeyInfo>,
    ) -> Self {
        self.columns.insert(table.to_string(), columns);
        self.keys.insert(table.to_string(), keys);
        self
    }

    /// Queue the rows the next `query` call returns.
    pub fn push_result(&self, rows: Vec<Row>) {
        self.results.borrow_mut().push_back(rows);
    }

    pub fn executed(&self) -> Vec<(String, Vec<Value>)> {
        self.executed.borrow().clone()
    }

    pub fn queried(&self) -> Vec<(String, Vec<Value>)> {
        self.queried.borrow().clone()
    }

    pub fn last_executed(&self) -> (String, Vec<Value>) {
        self.executed
            .borrow()
            .last()
            .cloned()
            .expect("no statement executed")
    }

    pub fn last_queried(&self) -> (String, Vec<Value>) {
        self.queried
            .borrow()
            .last()
            .cloned()
            .expect("no query run")
    }
}

impl StorageConnector for MemoryConnector {
    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        self.executed
            .borrow_mut()
            .push((sql.to_string(), params.to_vec()));
        Ok(1)
    }

    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.queried
            .borrow_mut()
            .push((sql.to_string(), params.to_vec()));
        Ok(self.results.borrow_mut().pop_front().unwrap_or_default())
    }

    fn last_insert_id(&self) -> Result<i64> {
        Ok(self.next_insert_id.get())
    }

    fn table_columns(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        Ok(self.columns.get(table).cloned().unwrap_or_default())
    }

    fn table_keys(&self, table: &str) -> Result<Vec<KeyInfo>> {
        Ok(self.keys.get(table).cloned().unwrap_or_default())
    }
}

#[derive(Default)]
pub struct MemoryCache {
    entries: RefCell<HashMap<String, Vec<u8>>>,
}

impl MemoryCache {
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, bytes: &[u8]) {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), bytes.to_vec());
    }
}

/// A connector seeded with the ticket-tracker tables the suites share.
pub fn tracker_connector() -> MemoryConnector {
    MemoryConnector::new()
        .with_table(
            "ticket",
            vec![
                ColumnInfo::new("ticket_id", "int(11)").auto_increment(true),
                ColumnInfo::new("account_id", "int(11)"),
                ColumnInfo::new("subject", "varchar(80)"),
                ColumnInfo::new("votes", "int(11) unsigned").default_value("0"),
                ColumnInfo::new("opened_at", "timestamp"),
            ],
            vec![KeyInfo::primary(vec!["ticket_id".into()])],
        )
        .with_table(
            "account",
            vec![
                ColumnInfo::new("account_id", "int(11)").auto_increment(true),
                ColumnInfo::new("email", "varchar(100)"),
            ],
            vec![KeyInfo::primary(vec!["account_id".into()])],
        )
        .with_table(
            "comment",
            vec![
                ColumnInfo::new("comment_id", "int(11)").auto_increment(true),
                ColumnInfo::new("ticket_id", "int(11)"),
                ColumnInfo::new("body", "text"),
            ],
            vec![KeyInfo::primary(vec!["comment_id".into()])],
        )
        .with_table(
            "tag",
            vec![
                ColumnInfo::new("tag_id", "int(11)").auto_increment(true),
                ColumnInfo::new("label", "varchar(40)"),
            ],
            vec![KeyInfo::primary(vec!["tag_id".into()])],
        )
        .with_table(
            "ticket_tag",
            vec![
                ColumnInfo::new("ticket_id", "int(11)"),
                ColumnInfo::new("tag_id", "int(11)"),
            ],
            vec![KeyInfo::primary(vec!["ticket_id".into(), "tag_id".into()])],
        )
}
