//! Hive-partitioned Parquet datasets.
//!
//! A dataset is a directory tree rooted at `root/data/<stem>.parquet`. Rows are
//! grouped by their partition values into `col=value` directories; partition
//! columns are stored in the path only and restored on read.

use crate::catalog::CatalogError;
use crate::frame::conform_batch;
use crate::fs::ObjectStore;
use crate::layout::partition_dir;
use crate::mapping::PartitionColumnMapping;
use crate::parquet::{encode_schema_only, read_parquet, write_parquet};
use crate::paths::{is_data_file, render_basename, COMMON_METADATA};
use crate::progress::ProgressObserver;
use arrow::array::{Array, ArrayRef, StringArray, UInt32Array};
use arrow::compute::{cast, concat_batches, take_record_batch};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use strum_macros::{Display, EnumIter, EnumString};

/// What to do when a file the writer is about to create already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum ExistingDataBehavior {
    /// Replace files whose names collide; leave every other file alone.
    OverwriteOrIgnore,
    /// Refuse to touch an existing file.
    Error,
}

#[derive(Debug, Clone)]
pub struct DatasetWriteOptions<'a> {
    pub partition_cols: &'a [String],
    /// Basename with a `{i}` placeholder for the per-write file counter.
    pub basename_template: &'a str,
    pub behavior: ExistingDataBehavior,
    pub zstd_level: i32,
}

/// Write `batch` below `base_dir`, one file per distinct partition-value tuple.
///
/// Partition values go through `mapping` so unsafe values become path-safe;
/// newly encoded values are recorded there for the caller to persist.
pub fn write_partitioned_dataset(
    store: &dyn ObjectStore,
    base_dir: &Path,
    batch: &RecordBatch,
    opts: &DatasetWriteOptions<'_>,
    mapping: &mut PartitionColumnMapping,
) -> Result<Vec<PathBuf>, CatalogError> {
    let schema = batch.schema();
    for col in opts.partition_cols {
        if schema.column_with_name(col).is_none() {
            return Err(CatalogError::InvalidPartitionColumn(col.clone()));
        }
    }

    let groups = group_by_partition(batch, opts.partition_cols)?;
    let payload_idx: Vec<usize> = schema
        .fields()
        .iter()
        .enumerate()
        .filter(|(_, f)| !opts.partition_cols.contains(f.name()))
        .map(|(i, _)| i)
        .collect();
    let payload = batch.project(&payload_idx)?;

    let mut targets = Vec::with_capacity(groups.len());
    for (counter, (values, rows)) in groups.into_iter().enumerate() {
        let values: Vec<Option<&str>> = values.iter().map(Option::as_deref).collect();
        let dir = partition_dir(base_dir, opts.partition_cols, &values, mapping);
        targets.push((dir.join(render_basename(opts.basename_template, counter)), rows));
    }
    // nothing is written unless every target is free
    if opts.behavior == ExistingDataBehavior::Error {
        for (path, _) in &targets {
            if store.exists(path)? {
                return Err(CatalogError::FileExists(path.clone()));
            }
        }
    }

    let mut written = Vec::with_capacity(targets.len());
    for (path, rows) in targets {
        let part = if rows.len() == payload.num_rows() {
            payload.clone()
        } else {
            take_record_batch(&payload, &UInt32Array::from(rows))?
        };
        write_parquet(store, &path, &part, opts.zstd_level, &[])?;
        written.push(path);
    }
    Ok(written)
}

type PartitionKey = Vec<Option<String>>;

fn group_by_partition(
    batch: &RecordBatch,
    cols: &[String],
) -> Result<BTreeMap<PartitionKey, Vec<u32>>, CatalogError> {
    let mut groups: BTreeMap<PartitionKey, Vec<u32>> = BTreeMap::new();
    if cols.is_empty() {
        groups.insert(Vec::new(), (0..batch.num_rows() as u32).collect());
        return Ok(groups);
    }

    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(cols.len());
    for col in cols {
        let column = batch
            .column_by_name(col)
            .ok_or_else(|| CatalogError::InvalidPartitionColumn(col.clone()))?;
        arrays.push(cast(column, &DataType::Utf8)?);
    }
    let strings: Vec<&StringArray> = arrays
        .iter()
        .filter_map(|a| a.as_any().downcast_ref::<StringArray>())
        .collect();

    for row in 0..batch.num_rows() {
        let key: PartitionKey = strings
            .iter()
            .map(|s| (!s.is_null(row)).then(|| s.value(row).to_string()))
            .collect();
        groups.entry(key).or_default().push(row as u32);
    }
    Ok(groups)
}

/// `col=value` segments between `base_dir` and the file.
fn hive_segments(base_dir: &Path, file: &Path) -> Vec<(String, String)> {
    let Ok(rel) = file.strip_prefix(base_dir) else {
        return Vec::new();
    };
    let Some(parent) = rel.parent() else {
        return Vec::new();
    };
    parent
        .components()
        .filter_map(|c| c.as_os_str().to_str())
        .filter_map(|seg| seg.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Every data file in the dataset, sorted by path.
pub fn dataset_files(store: &dyn ObjectStore, base_dir: &Path) -> Result<Vec<PathBuf>, CatalogError> {
    Ok(store
        .list_files(base_dir)?
        .into_iter()
        .filter(|p| is_data_file(p))
        .collect())
}

/// Read one data file and append its partition columns as decoded constants.
pub fn read_dataset_file(
    store: &dyn ObjectStore,
    base_dir: &Path,
    file: &Path,
    mapping: &PartitionColumnMapping,
    progress: &dyn ProgressObserver,
) -> Result<RecordBatch, CatalogError> {
    let batch = read_parquet(store, file, progress)?;
    let segments = hive_segments(base_dir, file);
    if segments.is_empty() {
        return Ok(batch);
    }

    let mut fields: Vec<Field> = batch
        .schema()
        .fields()
        .iter()
        .map(|f| f.as_ref().clone())
        .collect();
    let mut columns = batch.columns().to_vec();
    for (col, encoded) in segments {
        if fields.iter().any(|f| f.name() == &col) {
            continue;
        }
        let raw = mapping.decode(&col, &encoded);
        let values = StringArray::from(vec![raw; batch.num_rows()]);
        fields.push(Field::new(col, DataType::Utf8, true));
        columns.push(Arc::new(values));
    }
    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
}

/// Read a whole dataset. Files are conformed to `schema` when given, otherwise
/// to the first file's layout. `None` when the dataset has no data files.
pub fn read_dataset(
    store: &dyn ObjectStore,
    base_dir: &Path,
    schema: Option<&SchemaRef>,
    progress: &dyn ProgressObserver,
) -> Result<Option<RecordBatch>, CatalogError> {
    let files = dataset_files(store, base_dir)?;
    if files.is_empty() {
        return Ok(None);
    }
    let mapping = PartitionColumnMapping::load(store, base_dir)?;

    let mut batches = Vec::with_capacity(files.len());
    for file in &files {
        batches.push(read_dataset_file(store, base_dir, file, &mapping, progress)?);
    }
    let target = match schema {
        Some(s) => s.clone(),
        None => batches[0].schema(),
    };
    let conformed = batches
        .iter()
        .map(|b| conform_batch(b, &target))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Some(concat_batches(&target, &conformed)?))
}

/// (Re)write `<base_dir>/_common_metadata` holding only `schema`.
pub fn write_common_metadata(
    store: &dyn ObjectStore,
    base_dir: &Path,
    schema: &SchemaRef,
) -> Result<PathBuf, CatalogError> {
    let path = base_dir.join(COMMON_METADATA);
    let bytes = encode_schema_only(schema)?;
    store.write(&path, &bytes)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::LocalFileSystem;
    use crate::progress::NoopProgress;
    use arrow::array::{Float64Array, Int64Array};
    use std::str::FromStr;
    use tempfile::TempDir;

    fn batch() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("instrument_id", DataType::Utf8, false),
            Field::new("price", DataType::Float64, false),
            Field::new("ts_init", DataType::Int64, false),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(vec!["EUR/USD.SIM", "AAPL.NASDAQ", "EUR/USD.SIM"])),
                Arc::new(Float64Array::from(vec![1.1, 190.0, 1.2])),
                Arc::new(Int64Array::from(vec![1, 2, 3])),
            ],
        )
        .expect("batch")
    }

    fn opts<'a>(cols: &'a [String], behavior: ExistingDataBehavior) -> DatasetWriteOptions<'a> {
        DatasetWriteOptions {
            partition_cols: cols,
            basename_template: "part-{i}.parquet",
            behavior,
            zstd_level: 3,
        }
    }

    #[test]
    fn behavior_parses_snake_case() {
        assert_eq!(
            ExistingDataBehavior::from_str("overwrite_or_ignore").expect("parse"),
            ExistingDataBehavior::OverwriteOrIgnore
        );
        assert_eq!(ExistingDataBehavior::Error.to_string(), "error");
    }

    #[test]
    fn partitions_and_restores_columns() {
        let tmp = TempDir::new().expect("tmp");
        let store = LocalFileSystem::new();
        let base = tmp.path().join("quote_tick.parquet");
        let cols = vec!["instrument_id".to_string()];
        let mut mapping = PartitionColumnMapping::new();

        let files = write_partitioned_dataset(
            &store,
            &base,
            &batch(),
            &opts(&cols, ExistingDataBehavior::OverwriteOrIgnore),
            &mut mapping,
        )
        .expect("write");
        assert_eq!(files.len(), 2);
        assert!(files
            .iter()
            .any(|f| f.starts_with(base.join("instrument_id=EUR%2FUSD.SIM"))));
        mapping.persist(&store, &base).expect("persist");

        let schema = batch().schema();
        let back = read_dataset(&store, &base, Some(&schema), &NoopProgress)
            .expect("read")
            .expect("some");
        assert_eq!(back.num_rows(), 3);
        let iid = back
            .column(0)
            .as_any()
            .downcast_ref::<StringArray>()
            .expect("utf8");
        let mut ids: Vec<&str> = (0..iid.len()).map(|i| iid.value(i)).collect();
        ids.sort();
        assert_eq!(ids, vec!["AAPL.NASDAQ", "EUR/USD.SIM", "EUR/USD.SIM"]);
    }

    #[test]
    fn error_behavior_refuses_collisions() {
        let tmp = TempDir::new().expect("tmp");
        let store = LocalFileSystem::new();
        let mut mapping = PartitionColumnMapping::new();
        let cols: Vec<String> = Vec::new();

        write_partitioned_dataset(
            &store,
            tmp.path(),
            &batch(),
            &opts(&cols, ExistingDataBehavior::Error),
            &mut mapping,
        )
        .expect("first write");
        let err = write_partitioned_dataset(
            &store,
            tmp.path(),
            &batch(),
            &opts(&cols, ExistingDataBehavior::Error),
            &mut mapping,
        )
        .expect_err("collision");
        assert!(matches!(err, CatalogError::FileExists(_)));

        // overwrite_or_ignore replaces the file instead of adding another
        write_partitioned_dataset(
            &store,
            tmp.path(),
            &batch(),
            &opts(&cols, ExistingDataBehavior::OverwriteOrIgnore),
            &mut mapping,
        )
        .expect("overwrite");
        assert_eq!(dataset_files(&store, tmp.path()).expect("files").len(), 1);
    }

    #[test]
    fn collision_in_a_later_partition_writes_nothing() {
        let tmp = TempDir::new().expect("tmp");
        let store = LocalFileSystem::new();
        let cols = vec!["instrument_id".to_string()];
        // groups are ordered AAPL (part-0) then EUR/USD (part-1)
        let taken = tmp.path().join("instrument_id=EUR%2FUSD.SIM").join("part-1.parquet");
        store.write(&taken, b"existing").expect("seed");

        let err = write_partitioned_dataset(
            &store,
            tmp.path(),
            &batch(),
            &opts(&cols, ExistingDataBehavior::Error),
            &mut PartitionColumnMapping::new(),
        )
        .expect_err("collision");
        assert!(matches!(err, CatalogError::FileExists(p) if p == taken));
        assert!(!tmp
            .path()
            .join("instrument_id=AAPL.NASDAQ")
            .join("part-0.parquet")
            .exists());
        assert_eq!(std::fs::read(&taken).expect("read"), b"existing");
    }

    #[test]
    fn unknown_partition_column_is_rejected() {
        let tmp = TempDir::new().expect("tmp");
        let cols = vec!["venue".to_string()];
        let err = write_partitioned_dataset(
            &LocalFileSystem::new(),
            tmp.path(),
            &batch(),
            &opts(&cols, ExistingDataBehavior::OverwriteOrIgnore),
            &mut PartitionColumnMapping::new(),
        )
        .expect_err("missing column");
        assert!(matches!(err, CatalogError::InvalidPartitionColumn(c) if c == "venue"));
    }
}
