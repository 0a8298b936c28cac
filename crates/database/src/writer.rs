//! Persistence of frames into the catalog.
//!
//! `write_all` routes every (table, instrument) frame through schema lookup,
//! partition planning and merging, then `write_batch` writes it as a
//! partitioned dataset and fixes up the side files around it.

use crate::catalog::CatalogError;
use crate::config::CatalogConfig;
use crate::dataset::{
    write_common_metadata, write_partitioned_dataset, DatasetWriteOptions, ExistingDataBehavior,
};
use crate::frame::{has_ts_init, is_sorted_by_ts_init, sort_by_ts_init, TableFrame};
use crate::fs::ObjectStore;
use crate::ingest::{build_frames, split, FrameGroups};
use crate::layout::{partition_dir, plan_partitions};
use crate::mapping::PartitionColumnMapping;
use crate::merge::merge_existing;
use crate::models::{PartitionSpec, SkippedGroup, WriteReport};
use crate::parquet::{read_parquet, write_parquet};
use crate::paths::{
    bar_suffix, dataset_root, is_data_file, range_basename_template, MUTABLE_BASENAME,
};
use crate::progress::ProgressObserver;
use crate::schema::SchemaRegistry;
use arrow::array::{Array, StringArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, SchemaRef};
use lake_types::keys::TableKey;
use lake_types::record::{ToRecords, INSTRUMENT_ID};
use lake_types::securities::security::InstrumentAny;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

const BAR_TYPE: &str = "bar_type";
const DEFAULT_BASENAME: &str = "part-{i}.parquet";

/// Files produced by one `write_batch` call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchWrite {
    pub files: Vec<PathBuf>,
    pub resorted: usize,
}

pub struct Writer<'a> {
    store: &'a dyn ObjectStore,
    registry: &'a SchemaRegistry,
    config: &'a CatalogConfig,
    progress: &'a dyn ProgressObserver,
}

impl<'a> Writer<'a> {
    pub fn new(
        store: &'a dyn ObjectStore,
        registry: &'a SchemaRegistry,
        config: &'a CatalogConfig,
        progress: &'a dyn ProgressObserver,
    ) -> Self {
        Self {
            store,
            registry,
            config,
            progress,
        }
    }

    /// Persist every group. Groups whose table has no registered schema are
    /// skipped and reported, never fatal.
    pub fn write_all(&self, frames: FrameGroups) -> Result<WriteReport, CatalogError> {
        let mut report = WriteReport::default();
        for (key, by_instrument) in frames {
            for (instrument, frame) in by_instrument {
                let rows = frame.num_rows();
                report.rows_attempted += rows;

                let Some(spec) = self.registry.get(&key) else {
                    tracing::warn!(table = %key, instrument = ?instrument, rows, "no schema registered; skipping group");
                    report.skipped.push(SkippedGroup {
                        table: key.clone(),
                        instrument_id: instrument,
                        rows,
                        reason: "unknown schema".to_string(),
                    });
                    continue;
                };

                let partition = plan_partitions(self.registry, &key, instrument.as_deref());
                let root = dataset_root(&self.config.root, &key);
                let merged = merge_existing(self.store, &root, spec, frame, self.progress)?;
                let template = spec.is_mutable().then_some(MUTABLE_BASENAME);

                let written =
                    self.write_batch(&root, &merged, partition.as_ref(), &spec.schema, template)?;
                report.rows_written += rows;
                report.files_resorted += written.resorted;
                report.files_written.extend(written.files);
            }
        }
        tracing::info!(
            attempted = report.rows_attempted,
            written = report.rows_written,
            files = report.files_written.len(),
            skipped = report.skipped.len(),
            "catalog write finished"
        );
        Ok(report)
    }

    /// Write one frame as a partitioned dataset under `root`.
    ///
    /// Without an explicit `basename_template` the file names carry the
    /// frame's `ts_init` range (plus the bar-type suffix for bars).
    pub fn write_batch(
        &self,
        root: &Path,
        frame: &TableFrame,
        partition: Option<&PartitionSpec>,
        schema: &SchemaRef,
        basename_template: Option<&str>,
    ) -> Result<BatchWrite, CatalogError> {
        let table = frame.conform(schema)?;
        let template = match basename_template {
            Some(t) => t.to_string(),
            None => derive_basename_template(&table),
        };
        let partition_cols = partition.map(PartitionSpec::columns).unwrap_or_default();

        let before: BTreeSet<PathBuf> = self.store.list_files(root)?.into_iter().collect();

        let mut mapping = PartitionColumnMapping::new();
        let opts = DatasetWriteOptions {
            partition_cols,
            basename_template: &template,
            behavior: self.config.existing_data_behavior,
            zstd_level: self.config.zstd_level,
        };
        let files = write_partitioned_dataset(self.store, root, table.batch(), &opts, &mut mapping)?;

        let new_files: Vec<PathBuf> = self
            .store
            .list_files(root)?
            .into_iter()
            .filter(|p| is_data_file(p) && !before.contains(p))
            .collect();
        let mut resorted = 0;
        for file in &new_files {
            if self.repair_sort_order(file)? {
                resorted += 1;
            }
        }

        write_common_metadata(self.store, root, schema)?;
        mapping.persist(self.store, root)?;

        tracing::debug!(
            root = %root.display(),
            rows = table.num_rows(),
            files = files.len(),
            new_files = new_files.len(),
            "batch written"
        );
        Ok(BatchWrite { files, resorted })
    }

    /// Rewrite `file` sorted by `ts_init` if it is out of order. Unreadable
    /// files are logged and left as they are.
    fn repair_sort_order(&self, file: &Path) -> Result<bool, CatalogError> {
        let batch = match read_parquet(self.store, file, self.progress) {
            Ok(b) => b,
            Err(e) => {
                tracing::error!(path = %file.display(), error = %e, "failed to read new file; leaving unsorted");
                return Ok(false);
            }
        };
        if !has_ts_init(&batch) || is_sorted_by_ts_init(&batch) {
            return Ok(false);
        }
        let sorted = sort_by_ts_init(&batch)?;
        write_parquet(self.store, file, &sorted, self.config.zstd_level, &[])?;
        tracing::debug!(path = %file.display(), "resorted by ts_init");
        Ok(true)
    }

    /// Write quotes or trades for one instrument into a single file tagged
    /// with the instrument's precisions, then upsert the instrument itself.
    pub fn write_ticks_with_instrument<T: ToRecords>(
        &self,
        objects: &[T],
        instrument: &InstrumentAny,
    ) -> Result<WriteReport, CatalogError> {
        let Some(first) = objects.first() else {
            return Err(CatalogError::InvalidInput("empty tick batch".to_string()));
        };
        let key = first.table_key();
        if !matches!(key, TableKey::QuoteTick | TableKey::TradeTick) {
            return Err(CatalogError::InvalidInput(format!(
                "{key} is not a tick type"
            )));
        }
        if objects.iter().any(|o| o.table_key() != key) {
            return Err(CatalogError::InvalidInput("mixed tick types".to_string()));
        }
        let spec = self
            .registry
            .get(&key)
            .ok_or_else(|| CatalogError::UnknownSchema(key.clone()))?;

        let records: Vec<_> = objects.iter().flat_map(|o| o.to_records()).collect();
        if let Some(other) = records
            .iter()
            .find(|r| r.instrument_id() != Some(instrument.id()))
        {
            return Err(CatalogError::InvalidInput(format!(
                "tick for {:?} does not belong to {}",
                other.instrument_id(),
                instrument.id()
            )));
        }
        let frame = TableFrame::from_records(&records)?.conform(&spec.schema)?;
        let (min_ts, max_ts) = frame
            .ts_init_range()
            .ok_or_else(|| CatalogError::InvalidInput("ticks carry no ts_init".to_string()))?;

        let root = dataset_root(&self.config.root, &key);
        let mut mapping = PartitionColumnMapping::new();
        let dir = partition_dir(
            &root,
            &[INSTRUMENT_ID.to_string()],
            &[Some(instrument.id())],
            &mut mapping,
        );
        let path = dir.join(format!("{min_ts:019}-{max_ts:019}-0.parquet"));
        let schema = frame.schema();
        let payload_idx: Vec<usize> = (0..schema.fields().len())
            .filter(|&i| schema.field(i).name() != INSTRUMENT_ID)
            .collect();
        let payload = frame.batch().project(&payload_idx)?;
        let metadata = vec![
            (INSTRUMENT_ID.to_string(), instrument.id().to_string()),
            (
                "price_precision".to_string(),
                instrument.price_precision().to_string(),
            ),
            (
                "size_precision".to_string(),
                instrument.size_precision().to_string(),
            ),
        ];
        write_parquet(self.store, &path, &payload, self.config.zstd_level, &metadata)?;
        write_common_metadata(self.store, &root, &spec.schema)?;
        mapping.persist(self.store, &root)?;

        let mut report = WriteReport {
            rows_attempted: frame.num_rows(),
            rows_written: frame.num_rows(),
            files_written: vec![path],
            ..WriteReport::default()
        };

        let config = CatalogConfig {
            existing_data_behavior: ExistingDataBehavior::OverwriteOrIgnore,
            ..self.config.clone()
        };
        let writer = Writer::new(self.store, self.registry, &config, self.progress);
        let frames = build_frames(split([instrument]))?;
        report.absorb(writer.write_all(frames)?);
        Ok(report)
    }
}

/// `{min}-{max}[-suffix]-{i}.parquet` from the table's `ts_init` range; bars
/// add the last `.`-segment of their first row's bar type.
fn derive_basename_template(table: &TableFrame) -> String {
    let Some((min_ts, max_ts)) = table.ts_init_range() else {
        return DEFAULT_BASENAME.to_string();
    };
    let suffix = first_string(table, BAR_TYPE).map(|bt| bar_suffix(&bt));
    range_basename_template(min_ts, max_ts, suffix.as_deref())
}

fn first_string(table: &TableFrame, column: &str) -> Option<String> {
    let col = table.batch().column_by_name(column)?;
    let col = cast(col, &DataType::Utf8).ok()?;
    let col = col.as_any().downcast_ref::<StringArray>()?;
    (!col.is_empty() && !col.is_null(0)).then(|| col.value(0).to_string())
}
