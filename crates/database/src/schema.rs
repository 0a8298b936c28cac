//! Table registry: per logical table, the canonical Arrow schema, declared
//! partition keys, write mode and merge dedup key.
//!
//! Built once through [`SchemaRegistryBuilder`] and read-only afterwards, so
//! it can be shared freely between a writer and a compactor.

use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use lake_types::keys::{InstrumentKind, TableKey};
use lake_types::record::{INSTRUMENT_ID, TS_EVENT, TS_INIT, TYPE_COLUMN};
use lake_types::securities::security::INSTRUMENT_DEF_ID;
use std::collections::HashMap;
use std::sync::Arc;

/// How a table's files evolve across writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Event data: every write adds new range-named files.
    Append,
    /// Reference data: each write merges with what is stored and replaces it.
    SingleFileMutable,
}

/// Columns that identify a duplicate row when merging mutable data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DedupKey {
    /// Every schema column except the listed ones.
    AllExcept(Vec<String>),
    /// Exactly the listed columns.
    Columns(Vec<String>),
}

impl Default for DedupKey {
    fn default() -> Self {
        DedupKey::AllExcept(vec![
            TS_INIT.to_string(),
            TS_EVENT.to_string(),
            TYPE_COLUMN.to_string(),
        ])
    }
}

impl DedupKey {
    /// Resolve to concrete column names present in `schema`, in schema order.
    pub fn columns(&self, schema: &Schema) -> Vec<String> {
        match self {
            DedupKey::AllExcept(excluded) => schema
                .fields()
                .iter()
                .map(|f| f.name().clone())
                .filter(|n| !excluded.contains(n))
                .collect(),
            DedupKey::Columns(cols) => schema
                .fields()
                .iter()
                .map(|f| f.name().clone())
                .filter(|n| cols.contains(n))
                .collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TableSpec {
    pub schema: SchemaRef,
    /// Declared hive partition columns; `None` defers to the planner's default.
    pub partition_keys: Option<Vec<String>>,
    pub write_mode: WriteMode,
    pub dedup_key: DedupKey,
}

impl TableSpec {
    pub fn append(schema: SchemaRef) -> Self {
        Self {
            schema,
            partition_keys: None,
            write_mode: WriteMode::Append,
            dedup_key: DedupKey::default(),
        }
    }

    pub fn mutable(schema: SchemaRef) -> Self {
        Self {
            write_mode: WriteMode::SingleFileMutable,
            ..Self::append(schema)
        }
    }

    pub fn with_partition_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.partition_keys = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_dedup_key(mut self, key: DedupKey) -> Self {
        self.dedup_key = key;
        self
    }

    pub fn is_mutable(&self) -> bool {
        self.write_mode == WriteMode::SingleFileMutable
    }
}

#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    tables: HashMap<TableKey, TableSpec>,
}

impl SchemaRegistry {
    pub fn builder() -> SchemaRegistryBuilder {
        SchemaRegistryBuilder::default()
    }

    /// Registry holding every built-in record kind.
    pub fn with_builtin_types() -> Self {
        Self::builder().with_builtin_types().build()
    }

    pub fn get(&self, key: &TableKey) -> Option<&TableSpec> {
        self.tables.get(key)
    }

    pub fn schema_of(&self, key: &TableKey) -> Option<SchemaRef> {
        self.tables.get(key).map(|s| s.schema.clone())
    }

    pub fn partition_keys_of(&self, key: &TableKey) -> Option<&[String]> {
        self.tables
            .get(key)
            .and_then(|s| s.partition_keys.as_deref())
    }
}

#[derive(Debug, Default)]
pub struct SchemaRegistryBuilder {
    tables: HashMap<TableKey, TableSpec>,
}

impl SchemaRegistryBuilder {
    pub fn register(mut self, key: TableKey, spec: TableSpec) -> Self {
        self.tables.insert(key, spec);
        self
    }

    pub fn with_builtin_types(self) -> Self {
        self.register(TableKey::QuoteTick, TableSpec::append(quote_tick_schema()))
            .register(TableKey::TradeTick, TableSpec::append(trade_tick_schema()))
            .register(
                TableKey::Bar,
                TableSpec::append(bar_schema()).with_partition_keys(["bar_type"]),
            )
            .register_instruments()
    }

    fn register_instruments(mut self) -> Self {
        for kind in InstrumentKind::ALL {
            let spec = TableSpec::mutable(instrument_schema(kind))
                .with_dedup_key(DedupKey::Columns(vec![INSTRUMENT_DEF_ID.to_string()]));
            self = self.register(TableKey::Instrument(kind), spec);
        }
        self
    }

    pub fn build(self) -> SchemaRegistry {
        SchemaRegistry {
            tables: self.tables,
        }
    }
}

/// Low-cardinality identifier column.
pub fn categorical() -> DataType {
    DataType::Dictionary(Box::new(DataType::Int32), Box::new(DataType::Utf8))
}

fn quote_tick_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new(INSTRUMENT_ID, categorical(), false),
        Field::new("bid", DataType::Float64, false),
        Field::new("ask", DataType::Float64, false),
        Field::new("bid_size", DataType::Float64, false),
        Field::new("ask_size", DataType::Float64, false),
        Field::new(TS_EVENT, DataType::Int64, false),
        Field::new(TS_INIT, DataType::Int64, false),
    ]))
}

fn trade_tick_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new(INSTRUMENT_ID, categorical(), false),
        Field::new("price", DataType::Float64, false),
        Field::new("size", DataType::Float64, false),
        Field::new("aggressor_side", DataType::Utf8, false),
        Field::new("trade_id", DataType::Utf8, false),
        Field::new(TS_EVENT, DataType::Int64, false),
        Field::new(TS_INIT, DataType::Int64, false),
    ]))
}

fn bar_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("bar_type", DataType::Utf8, false),
        Field::new("open", DataType::Float64, false),
        Field::new("high", DataType::Float64, false),
        Field::new("low", DataType::Float64, false),
        Field::new("close", DataType::Float64, false),
        Field::new("volume", DataType::Float64, false),
        Field::new(TS_EVENT, DataType::Int64, false),
        Field::new(TS_INIT, DataType::Int64, false),
    ]))
}

fn instrument_schema(kind: InstrumentKind) -> SchemaRef {
    let mut fields = vec![
        Field::new(INSTRUMENT_DEF_ID, DataType::Utf8, false),
        Field::new("raw_symbol", DataType::Utf8, false),
    ];
    match kind {
        InstrumentKind::Equity => fields.extend([
            Field::new("currency", DataType::Utf8, false),
            Field::new("price_precision", DataType::UInt8, false),
            Field::new("price_increment", DataType::Float64, false),
            Field::new("lot_size", DataType::Float64, true),
            Field::new("isin", DataType::Utf8, true),
        ]),
        InstrumentKind::CurrencyPair => fields.extend([
            Field::new("base_currency", DataType::Utf8, false),
            Field::new("quote_currency", DataType::Utf8, false),
            Field::new("price_precision", DataType::UInt8, false),
            Field::new("size_precision", DataType::UInt8, false),
            Field::new("price_increment", DataType::Float64, false),
            Field::new("size_increment", DataType::Float64, false),
        ]),
        InstrumentKind::FuturesContract => fields.extend([
            Field::new("underlying", DataType::Utf8, false),
            Field::new("currency", DataType::Utf8, false),
            Field::new("price_precision", DataType::UInt8, false),
            Field::new("price_increment", DataType::Float64, false),
            Field::new("multiplier", DataType::Float64, false),
            Field::new("expiration_ns", DataType::Int64, false),
        ]),
    }
    fields.push(Field::new(TS_EVENT, DataType::Int64, false));
    fields.push(Field::new(TS_INIT, DataType::Int64, false));
    Arc::new(Schema::new(fields))
}
