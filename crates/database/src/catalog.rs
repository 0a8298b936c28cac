//! The catalog facade: one object store, one schema registry, one config.

use crate::compact::Compactor;
use crate::config::CatalogConfig;
use crate::dataset::{dataset_files, read_dataset};
use crate::frame::FrameError;
use crate::fs::{LocalFileSystem, ObjectStore};
use crate::ingest::{build_frames, split, FrameGroups};
use crate::mapping::MappingError;
use crate::models::{CompactionReport, WriteReport};
use crate::parquet::{ts_init_stats, ParquetError};
use crate::paths::{data_root, dataset_root, parse_filename_range, PARQUET_EXT};
use crate::progress::{NoopProgress, ProgressObserver};
use crate::schema::SchemaRegistry;
use crate::writer::Writer;
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use lake_types::keys::{InstrumentKind, TableKey};
use lake_types::record::ToRecords;
use lake_types::securities::security::InstrumentAny;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Parquet(#[from] ParquetError),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Mapping(#[from] MappingError),
    #[error("arrow: {0}")]
    Arrow(#[from] ArrowError),
    #[error("file already exists: {0}")]
    FileExists(PathBuf),
    #[error("partition column {0} is not in the table")]
    InvalidPartitionColumn(String),
    #[error("no schema registered for {0}")]
    UnknownSchema(TableKey),
    #[error("{0}")]
    InvalidInput(String),
}

#[derive(Debug, Clone)]
pub struct Catalog {
    store: Arc<dyn ObjectStore>,
    registry: Arc<SchemaRegistry>,
    config: CatalogConfig,
    progress: Arc<dyn ProgressObserver>,
}

impl Catalog {
    /// Local catalog with every built-in table registered.
    pub fn new(config: CatalogConfig) -> Self {
        Self::with_parts(
            config,
            Arc::new(LocalFileSystem::new()),
            Arc::new(SchemaRegistry::with_builtin_types()),
        )
    }

    pub fn with_parts(
        config: CatalogConfig,
        store: Arc<dyn ObjectStore>,
        registry: Arc<SchemaRegistry>,
    ) -> Self {
        Self {
            store,
            registry,
            config,
            progress: Arc::new(NoopProgress),
        }
    }

    pub fn from_env() -> Self {
        Self::new(CatalogConfig::from_env())
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressObserver>) -> Self {
        self.progress = progress;
        self
    }

    pub fn root(&self) -> &Path {
        &self.config.root
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn dataset_root(&self, key: &TableKey) -> PathBuf {
        dataset_root(&self.config.root, key)
    }

    fn writer(&self) -> Writer<'_> {
        Writer::new(
            self.store.as_ref(),
            &self.registry,
            &self.config,
            self.progress.as_ref(),
        )
    }

    /// Split, build and persist a batch of objects.
    pub fn write<I>(&self, objects: I) -> Result<WriteReport, CatalogError>
    where
        I: IntoIterator,
        I::Item: ToRecords,
    {
        let frames = build_frames(split(objects))?;
        self.write_frames(frames)
    }

    pub fn write_frames(&self, frames: FrameGroups) -> Result<WriteReport, CatalogError> {
        self.writer().write_all(frames)
    }

    pub fn write_ticks_with_instrument<T: ToRecords>(
        &self,
        ticks: &[T],
        instrument: &InstrumentAny,
    ) -> Result<WriteReport, CatalogError> {
        self.writer().write_ticks_with_instrument(ticks, instrument)
    }

    /// Compact every dataset in the catalog.
    pub fn compact(&self) -> Result<CompactionReport, CatalogError> {
        Compactor::new(self.store.as_ref(), &self.config, self.progress.as_ref()).compact_all()
    }

    /// Dataset directory stems under `root/data`, e.g. `quote_tick`.
    pub fn list_data_types(&self) -> Result<Vec<String>, CatalogError> {
        let suffix = format!(".{PARQUET_EXT}");
        Ok(self
            .store
            .list_dirs(&data_root(&self.config.root))?
            .iter()
            .filter_map(|d| d.file_name().and_then(|n| n.to_str()))
            .map(|n| n.strip_suffix(&suffix).unwrap_or(n).to_string())
            .collect())
    }

    /// Whole table with partition columns restored. Registered tables are
    /// conformed to their schema.
    pub fn read_table(&self, key: &TableKey) -> Result<Option<RecordBatch>, CatalogError> {
        let schema = self.registry.schema_of(key);
        read_dataset(
            self.store.as_ref(),
            &self.dataset_root(key),
            schema.as_ref(),
            self.progress.as_ref(),
        )
    }

    /// Overall `ts_init` bounds of a table. Range-named files answer from
    /// their name; anything else is read for its `ts_init` column.
    pub fn ts_init_bounds(&self, key: &TableKey) -> Result<Option<(i64, i64)>, CatalogError> {
        let mut bounds: Option<(i64, i64)> = None;
        for file in dataset_files(self.store.as_ref(), &self.dataset_root(key))? {
            let named = file
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(parse_filename_range);
            let range = match named {
                Some(r) => Some(r),
                None => {
                    let bytes = self.store.read(&file)?;
                    self.progress.on_bytes(&file, bytes.len() as u64);
                    ts_init_stats(bytes)?.map(|(_, lo, hi)| (lo, hi))
                }
            };
            if let Some((lo, hi)) = range {
                bounds = Some(match bounds {
                    Some((a, b)) => (a.min(lo), b.max(hi)),
                    None => (lo, hi),
                });
            }
        }
        Ok(bounds)
    }

    pub fn instruments(&self, kind: InstrumentKind) -> Result<Option<RecordBatch>, CatalogError> {
        self.read_table(&TableKey::Instrument(kind))
    }
}
