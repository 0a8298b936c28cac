use arrow::array::{Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use lake_database::catalog::Catalog;
use lake_database::config::CatalogConfig;
use lake_database::frame::TableFrame;
use lake_database::fs::{LocalFileSystem, ObjectStore};
use lake_database::merge::{load_existing, merge_existing};
use lake_database::paths::dataset_root;
use lake_database::progress::NoopProgress;
use lake_database::schema::{SchemaRegistry, TableSpec};
use lake_types::base_data::{Data, GenericData};
use lake_types::data::core::QuoteTick;
use lake_types::keys::{InstrumentKind, TableKey};
use lake_types::record::{DomainRecord, ToRecords};
use lake_types::securities::security::{Equity, InstrumentAny};
use rust_decimal_macros::dec;
use std::sync::Arc;

fn equity(id: &str, price_precision: u8, ts: i64) -> InstrumentAny {
    InstrumentAny::Equity(Equity {
        id: id.to_string(),
        raw_symbol: id.split('.').next().unwrap_or(id).to_string(),
        currency: "USD".to_string(),
        price_precision,
        price_increment: dec!(0.01),
        lot_size: None,
        isin: None,
        ts_event: ts,
        ts_init: ts,
    })
}

fn frame_of(instruments: &[InstrumentAny]) -> TableFrame {
    let records: Vec<DomainRecord> = instruments.iter().flat_map(|i| i.to_records()).collect();
    TableFrame::from_records(&records).expect("frame")
}

fn strings(frame: &TableFrame, column: &str) -> Vec<String> {
    let col = frame
        .batch()
        .column_by_name(column)
        .expect("column")
        .as_any()
        .downcast_ref::<StringArray>()
        .expect("utf8");
    (0..col.len()).map(|i| col.value(i).to_string()).collect()
}

fn news_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("name", DataType::Utf8, false),
        Field::new("value", DataType::Int64, false),
        Field::new("ts_init", DataType::Int64, false),
    ]))
}

fn setting(name: &str, value: i64, ts: i64) -> DomainRecord {
    DomainRecord::new()
        .with("name", name)
        .with("value", value)
        .with("ts_init", ts)
}

#[test]
fn merge_is_idempotent() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let catalog = Catalog::new(CatalogConfig::new(tmp.path()));
    let instruments = vec![equity("AAPL.NASDAQ", 2, 1), equity("MSFT.NASDAQ", 2, 2)];
    let as_data: Vec<Data> = instruments.iter().cloned().map(Data::from).collect();

    catalog.write(as_data.clone()).expect("first");
    let once = catalog
        .instruments(InstrumentKind::Equity)
        .expect("read")
        .expect("rows");
    let report = catalog.write(as_data).expect("second");
    assert_eq!(report.rows_written, 2);
    let twice = catalog
        .instruments(InstrumentKind::Equity)
        .expect("read")
        .expect("rows");

    assert_eq!(once.num_rows(), 2);
    assert_eq!(once, twice);
}

#[test]
fn rows_written_counts_accepted_rows_not_stored_rows() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let catalog = Catalog::new(CatalogConfig::new(tmp.path()));
    catalog
        .write(vec![
            Data::from(equity("AAPL.NASDAQ", 2, 1)),
            Data::from(equity("MSFT.NASDAQ", 2, 2)),
        ])
        .expect("seed");

    let report = catalog
        .write(vec![Data::from(equity("AAPL.NASDAQ", 3, 3))])
        .expect("upsert");
    assert_eq!(report.rows_attempted, 1);
    assert_eq!(report.rows_written, 1);
    let stored = catalog
        .instruments(InstrumentKind::Equity)
        .expect("read")
        .expect("rows");
    assert_eq!(stored.num_rows(), 2);
}

#[test]
fn merge_against_stored_rows_replaces_on_key() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let catalog = Catalog::new(CatalogConfig::new(tmp.path()));
    catalog
        .write(vec![
            Data::from(equity("AAPL.NASDAQ", 2, 1)),
            Data::from(equity("MSFT.NASDAQ", 2, 2)),
        ])
        .expect("seed");

    let registry = SchemaRegistry::with_builtin_types();
    let key = TableKey::Instrument(InstrumentKind::Equity);
    let spec = registry.get(&key).expect("spec");
    let root = dataset_root(tmp.path(), &key);
    let store = LocalFileSystem::new();

    let merged = merge_existing(
        &store,
        &root,
        spec,
        frame_of(&[equity("AAPL.NASDAQ", 4, 3)]),
        &NoopProgress,
    )
    .expect("merge");

    assert_eq!(merged.num_rows(), 2);
    // sorted by ts_init, the replacement moves to the back
    assert_eq!(strings(&merged, "id"), vec!["MSFT.NASDAQ", "AAPL.NASDAQ"]);
    assert!(merged.batch().column_by_name("type").is_none());
}

#[test]
fn append_tables_pass_through_untouched() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let registry = SchemaRegistry::with_builtin_types();
    let spec = registry.get(&TableKey::QuoteTick).expect("spec");
    let quote = QuoteTick {
        instrument_id: "EUR/USD.SIM".to_string(),
        bid: dec!(1.1),
        ask: dec!(1.2),
        bid_size: dec!(1),
        ask_size: dec!(1),
        ts_event: 1,
        ts_init: 1,
    };
    let records = vec![quote.to_records(), quote.to_records()].concat();
    let frame = TableFrame::from_records(&records).expect("frame");

    let merged = merge_existing(
        &LocalFileSystem::new(),
        &tmp.path().join("quote_tick.parquet"),
        spec,
        frame.clone(),
        &NoopProgress,
    )
    .expect("merge");
    assert_eq!(merged, frame);
    assert_eq!(merged.num_rows(), 2);
}

#[test]
fn unreadable_existing_data_is_an_empty_baseline() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let catalog = Catalog::new(CatalogConfig::new(tmp.path()));
    let key = TableKey::Instrument(InstrumentKind::Equity);
    let root = catalog.dataset_root(&key);
    LocalFileSystem::new()
        .write(&root.join("0.parquet"), b"definitely not parquet")
        .expect("corrupt file");

    let registry = SchemaRegistry::with_builtin_types();
    let spec = registry.get(&key).expect("spec");
    assert!(load_existing(&LocalFileSystem::new(), &root, spec, &NoopProgress).is_err());

    catalog
        .write(vec![Data::from(equity("AAPL.NASDAQ", 2, 1))])
        .expect("write despite corrupt baseline");
    let stored = catalog
        .instruments(InstrumentKind::Equity)
        .expect("read")
        .expect("rows");
    assert_eq!(stored.num_rows(), 1);
}

#[test]
fn default_dedup_key_ignores_timestamps() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let key = TableKey::Custom("Setting".into());
    let registry = SchemaRegistry::builder()
        .register(key.clone(), TableSpec::mutable(news_schema()))
        .build();
    let catalog = Catalog::with_parts(
        CatalogConfig::new(tmp.path()),
        Arc::new(LocalFileSystem::new()),
        Arc::new(registry),
    );
    let write = |rows: Vec<DomainRecord>| {
        catalog
            .write(vec![Data::Generic(GenericData::new("Setting", rows))])
            .expect("write")
    };

    write(vec![setting("depth", 10, 1)]);
    write(vec![setting("depth", 10, 2)]);
    let table = catalog.read_table(&key).expect("read").expect("rows");
    assert_eq!(table.num_rows(), 1);
    let ts = table
        .column_by_name("ts_init")
        .expect("ts_init")
        .as_any()
        .downcast_ref::<Int64Array>()
        .expect("i64");
    assert_eq!(ts.value(0), 2);

    write(vec![setting("depth", 20, 3)]);
    let table = catalog.read_table(&key).expect("read").expect("rows");
    assert_eq!(table.num_rows(), 2);
}
