use crate::keys::TableKey;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Canonical nanosecond initialization timestamp column.
pub const TS_INIT: &str = "ts_init";
/// Event timestamp column carried by most market data.
pub const TS_EVENT: &str = "ts_event";
/// Instrument identity column used for default partitioning.
pub const INSTRUMENT_ID: &str = "instrument_id";
/// Discriminator column written by instrument records.
pub const TYPE_COLUMN: &str = "type";

/// A flat row record: column name -> value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomainRecord {
    columns: BTreeMap<String, Value>,
}

impl DomainRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(column, value);
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.columns.insert(column.into(), value.into());
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns.get(column)
    }

    pub fn remove(&mut self, column: &str) -> Option<Value> {
        self.columns.remove(column)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.contains_key(column)
    }

    pub fn ts_init(&self) -> Option<i64> {
        self.get(TS_INIT).and_then(Value::as_i64)
    }

    /// The instrument key this row groups under, if it carries one.
    pub fn instrument_id(&self) -> Option<&str> {
        self.get(INSTRUMENT_ID).and_then(Value::as_str)
    }

    pub fn columns(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.columns.iter()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl FromIterator<(String, Value)> for DomainRecord {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            columns: iter.into_iter().collect(),
        }
    }
}

/// Capability every persistable object exposes: which logical table it
/// belongs to and the row records it expands into.
///
/// One object may expand into several rows (for example a generic data
/// wrapper carrying a batch of custom rows).
pub trait ToRecords {
    fn table_key(&self) -> TableKey;

    fn to_records(&self) -> Vec<DomainRecord>;
}

impl<T: ToRecords + ?Sized> ToRecords for &T {
    fn table_key(&self) -> TableKey {
        (**self).table_key()
    }

    fn to_records(&self) -> Vec<DomainRecord> {
        (**self).to_records()
    }
}
