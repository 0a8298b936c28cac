//! Lake Database crate
//!
//! A partitioned, append-friendly Parquet store for trading records:
//! - Objects are split per logical table and instrument (`ingest`), built into
//!   `ts_init`-sorted Arrow batches (`frame`) and written as hive-partitioned
//!   ZSTD Parquet datasets (`writer`, `dataset`).
//! - Instrument definitions live in one mutable file per kind and are upserted
//!   against what is stored (`merge`).
//! - Path-unsafe partition values are encoded losslessly and recorded in a
//!   `_partition_mappings.json` side file that is only ever unioned (`mapping`).
//! - Many small range-named files are periodically folded into deduplicated
//!   time buckets (`compact`).
//!
//! Layout overview (see `paths`):
//! root/data/<table>.parquet/(col=value/)*{min_ts:019}-{max_ts:019}-{i}.parquet
//!
//! Start with [`catalog::Catalog`]; it wires the object store, schema registry,
//! config and progress observer together.

pub mod catalog;
pub mod compact;
pub mod config;
pub mod dataset;
pub mod frame;
pub mod fs;
pub mod ingest;
pub mod layout;
pub mod mapping;
pub mod merge;
pub mod models;
pub mod parquet;
pub mod paths;
pub mod progress;
pub mod schema;
pub mod writer;

pub use catalog::{Catalog, CatalogError};
pub use config::CatalogConfig;
pub use models::{CompactionReport, WriteReport};
