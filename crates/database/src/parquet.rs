//! Single-file Parquet encode/decode.
//!
//! Everything goes through byte buffers so the object store stays the only
//! thing touching storage.

use crate::fs::ObjectStore;
use crate::progress::ProgressObserver;
use arrow::array::{Array, Int64Array};
use arrow::compute::{concat_batches, max, min};
use arrow::datatypes::SchemaRef;
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use lake_types::record::TS_INIT;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::{ArrowWriter, ProjectionMask};
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::WriterProperties;
use parquet::format::KeyValue;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParquetError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("parquet: {0}")]
    Pq(#[from] parquet::errors::ParquetError),
    #[error("arrow: {0}")]
    Arrow(#[from] ArrowError),
}

fn zstd_props(level: i32, metadata: &[(String, String)]) -> WriterProperties {
    // Smaller data pages help RLE/dict.
    let mut builder = WriterProperties::builder()
        .set_compression(Compression::ZSTD(
            ZstdLevel::try_new(level).unwrap_or_default(),
        ))
        .set_dictionary_enabled(true)
        .set_data_page_size_limit(128 * 1024)
        .set_write_batch_size(32 * 1024);
    if !metadata.is_empty() {
        builder = builder.set_key_value_metadata(Some(
            metadata
                .iter()
                .map(|(k, v)| KeyValue::new(k.clone(), v.clone()))
                .collect(),
        ));
    }
    builder.build()
}

/// Encode `batch` as a ZSTD Parquet file, optionally tagging the footer with
/// key/value metadata.
pub fn encode_batch(
    batch: &RecordBatch,
    zstd_level: i32,
    metadata: &[(String, String)],
) -> Result<Vec<u8>, ParquetError> {
    let mut buf = Vec::new();
    let mut writer = ArrowWriter::try_new(
        &mut buf,
        batch.schema(),
        Some(zstd_props(zstd_level, metadata)),
    )?;
    writer.write(batch)?;
    writer.close()?;
    Ok(buf)
}

/// A Parquet file carrying only `schema`: no row groups, no column statistics.
pub fn encode_schema_only(schema: &SchemaRef) -> Result<Vec<u8>, ParquetError> {
    let mut buf = Vec::new();
    let writer = ArrowWriter::try_new(&mut buf, schema.clone(), None)?;
    writer.close()?;
    Ok(buf)
}

/// Decode a whole Parquet file into one batch.
pub fn decode_batch(bytes: Vec<u8>) -> Result<RecordBatch, ParquetError> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(Bytes::from(bytes))?;
    let schema = builder.schema().clone();
    let reader = builder.build()?;
    let batches = reader.collect::<Result<Vec<_>, ArrowError>>()?;
    Ok(concat_batches(&schema, &batches)?)
}

/// Footer key/value metadata, minus entries without a value.
pub fn decode_key_value_metadata(bytes: Vec<u8>) -> Result<BTreeMap<String, String>, ParquetError> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(Bytes::from(bytes))?;
    let mut out = BTreeMap::new();
    if let Some(kvs) = builder.metadata().file_metadata().key_value_metadata() {
        for kv in kvs {
            if let Some(v) = &kv.value {
                out.insert(kv.key.clone(), v.clone());
            }
        }
    }
    Ok(out)
}

/// Row count and `ts_init` bounds of a Parquet file, decoding only that
/// column. `Ok(None)` for files without rows or without the column.
pub fn ts_init_stats(bytes: Vec<u8>) -> Result<Option<(usize, i64, i64)>, ParquetError> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(Bytes::from(bytes))?;
    let Ok(idx) = builder.schema().index_of(TS_INIT) else {
        return Ok(None);
    };
    let mask = ProjectionMask::roots(builder.parquet_schema(), [idx]);
    let reader = builder.with_projection(mask).build()?;

    let mut count = 0usize;
    let mut bounds: Option<(i64, i64)> = None;
    for batch in reader {
        let batch = batch?;
        count += batch.num_rows();
        let Some(col) = batch.column(0).as_any().downcast_ref::<Int64Array>() else {
            return Ok(None);
        };
        if let (Some(lo), Some(hi)) = (min(col), max(col)) {
            bounds = Some(match bounds {
                Some((a, b)) => (a.min(lo), b.max(hi)),
                None => (lo, hi),
            });
        }
    }
    Ok(bounds.map(|(lo, hi)| (count, lo, hi)))
}

pub fn read_parquet(
    store: &dyn ObjectStore,
    path: &Path,
    progress: &dyn ProgressObserver,
) -> Result<RecordBatch, ParquetError> {
    let bytes = store.read(path)?;
    progress.on_bytes(path, bytes.len() as u64);
    decode_batch(bytes)
}

pub fn write_parquet(
    store: &dyn ObjectStore,
    path: &Path,
    batch: &RecordBatch,
    zstd_level: i32,
    metadata: &[(String, String)],
) -> Result<u64, ParquetError> {
    let bytes = encode_batch(batch, zstd_level, metadata)?;
    store.write(path, &bytes)?;
    tracing::debug!(path = %path.display(), rows = batch.num_rows(), bytes = bytes.len(), "parquet written");
    Ok(bytes.len() as u64)
}
