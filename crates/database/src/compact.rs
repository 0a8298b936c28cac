//! Re-bucketing of range-named data files into deduplicated time buckets.
//!
//! Every file whose name starts with a `ts_init` range is grouped with the
//! other files in its directory whose range starts in the same time bucket
//! (daily by default). Each group becomes a single `<bucket>.parquet` with
//! exact duplicate rows removed; the originals are deleted only after the
//! replacement is fully written. Files without a range prefix, including
//! earlier compaction output, are never grouped, so a second pass is a no-op.

use crate::catalog::CatalogError;
use crate::config::CatalogConfig;
use crate::dataset::dataset_files;
use crate::frame::{conform_batch, dedup_keep_last, sort_by_ts_init};
use crate::fs::ObjectStore;
use crate::models::CompactionReport;
use crate::parquet::{read_parquet, write_parquet};
use crate::paths::{bucket_file_name, data_root, parse_filename_start};
use crate::progress::ProgressObserver;
use arrow::compute::concat_batches;
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt::Write;
use std::path::{Path, PathBuf};

pub struct Compactor<'a> {
    store: &'a dyn ObjectStore,
    config: &'a CatalogConfig,
    progress: &'a dyn ProgressObserver,
}

impl<'a> Compactor<'a> {
    pub fn new(
        store: &'a dyn ObjectStore,
        config: &'a CatalogConfig,
        progress: &'a dyn ProgressObserver,
    ) -> Self {
        Self {
            store,
            config,
            progress,
        }
    }

    /// Compact every dataset under `root/data`.
    pub fn compact_all(&self) -> Result<CompactionReport, CatalogError> {
        let mut report = CompactionReport::default();
        for dataset in self.store.list_dirs(&data_root(&self.config.root))? {
            report.absorb(self.compact_dataset(&dataset)?);
        }
        tracing::info!(
            groups = report.groups_compacted,
            failed = report.groups_failed,
            removed = report.files_removed,
            duplicates = report.duplicates_removed(),
            "compaction finished"
        );
        Ok(report)
    }

    pub fn compact_dataset(&self, base_dir: &Path) -> Result<CompactionReport, CatalogError> {
        let mut report = CompactionReport::default();
        let mut groups: BTreeMap<(PathBuf, String), Vec<PathBuf>> = BTreeMap::new();

        for file in dataset_files(self.store, base_dir)? {
            let start = file
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(parse_filename_start);
            let (Some(start), Some(dir)) = (start, file.parent()) else {
                report.files_untouched += 1;
                continue;
            };
            let bucket = bucket_key(start, &self.config.compaction_bucket_format)?;
            groups
                .entry((dir.to_path_buf(), bucket))
                .or_default()
                .push(file);
        }

        for ((dir, bucket), members) in groups {
            let target = dir.join(bucket_file_name(&bucket));
            match self.compact_group(&target, &members)? {
                Some((rows_before, rows_after)) => {
                    for member in &members {
                        self.store.remove(member)?;
                    }
                    report.groups_compacted += 1;
                    report.files_removed += members.len();
                    report.rows_before += rows_before;
                    report.rows_after += rows_after;
                    report.files_written.push(target);
                }
                None => report.groups_failed += 1,
            }
        }
        Ok(report)
    }

    /// Read, dedup and write one bucket. `Ok(None)` when a member could not be
    /// decoded; the group is then left as it was.
    fn compact_group(
        &self,
        target: &Path,
        members: &[PathBuf],
    ) -> Result<Option<(usize, usize)>, CatalogError> {
        let mut sources: Vec<&Path> = Vec::with_capacity(members.len() + 1);
        // a bucket compacted earlier absorbs the late arrivals
        if self.store.exists(target)? {
            sources.push(target);
        }
        sources.extend(members.iter().map(PathBuf::as_path));

        let mut batches: Vec<RecordBatch> = Vec::with_capacity(sources.len());
        for src in &sources {
            match read_parquet(self.store, src, self.progress) {
                Ok(b) => batches.push(b),
                Err(e) => {
                    tracing::warn!(path = %src.display(), error = %e, "unreadable file; skipping bucket");
                    return Ok(None);
                }
            }
        }

        let merged = match unify(&batches) {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(target = %target.display(), error = %e, "incompatible files; skipping bucket");
                return Ok(None);
            }
        };
        let rows_before = merged.num_rows();
        let deduped = sort_by_ts_init(&dedup_keep_last(&merged, &[])?)?;
        write_parquet(self.store, target, &deduped, self.config.zstd_level, &[])?;
        tracing::debug!(
            target = %target.display(),
            members = members.len(),
            rows_before,
            rows_after = deduped.num_rows(),
            "bucket compacted"
        );
        Ok(Some((rows_before, deduped.num_rows())))
    }
}

/// Concatenate in order, conforming every batch to the first one's schema.
fn unify(batches: &[RecordBatch]) -> Result<RecordBatch, CatalogError> {
    let Some(first) = batches.first() else {
        return Err(CatalogError::InvalidInput("empty bucket".to_string()));
    };
    let schema = first.schema();
    let conformed = batches
        .iter()
        .map(|b| conform_batch(b, &schema))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(concat_batches(&schema, &conformed)?)
}

/// Render a nanosecond timestamp with a chrono format string.
pub fn bucket_key(ts_ns: i64, format: &str) -> Result<String, CatalogError> {
    let secs = ts_ns.div_euclid(1_000_000_000);
    let nsec = ts_ns.rem_euclid(1_000_000_000) as u32;
    let dt: DateTime<Utc> = DateTime::from_timestamp(secs, nsec)
        .ok_or_else(|| CatalogError::InvalidInput(format!("invalid ns timestamp: {ts_ns}")))?;
    let mut out = String::new();
    write!(out, "{}", dt.format(format))
        .map_err(|_| CatalogError::InvalidInput(format!("invalid bucket format {format:?}")))?;
    if out.is_empty() || out.contains(['/', '\\']) {
        return Err(CatalogError::InvalidInput(format!(
            "bucket format {format:?} does not yield a file name"
        )));
    }
    Ok(out)
}
