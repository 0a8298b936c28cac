//! Upserting new frames against what is already stored.
//!
//! Append-only tables pass straight through. Single-file mutable tables
//! (instrument definitions) are merged with the persisted rows so the stored
//! file never carries duplicates under the table's dedup key.

use crate::catalog::CatalogError;
use crate::dataset::read_dataset;
use crate::frame::TableFrame;
use crate::fs::ObjectStore;
use crate::progress::ProgressObserver;
use crate::schema::TableSpec;
use arrow::record_batch::RecordBatch;
use std::path::Path;

/// Persisted rows of a table, conformed to its schema. `Ok(None)` when the
/// table has no data yet.
pub fn load_existing(
    store: &dyn ObjectStore,
    dataset_root: &Path,
    spec: &TableSpec,
    progress: &dyn ProgressObserver,
) -> Result<Option<TableFrame>, CatalogError> {
    Ok(read_dataset(store, dataset_root, Some(&spec.schema), progress)?.map(TableFrame::from_batch))
}

/// Merge `new` into the stored rows of a mutable table.
///
/// Existing rows come first, so on a dedup-key collision the new row wins.
/// Volatile columns outside the schema (such as the `type` discriminator) are
/// dropped by conforming. Unreadable existing data counts as an empty baseline.
pub fn merge_existing(
    store: &dyn ObjectStore,
    dataset_root: &Path,
    spec: &TableSpec,
    new: TableFrame,
    progress: &dyn ProgressObserver,
) -> Result<TableFrame, CatalogError> {
    if !spec.is_mutable() {
        return Ok(new);
    }

    let new = new.conform(&spec.schema)?;
    let existing = match load_existing(store, dataset_root, spec, progress) {
        Ok(Some(frame)) => frame,
        Ok(None) => TableFrame::from_batch(RecordBatch::new_empty(spec.schema.clone())),
        Err(e) => {
            tracing::warn!(
                path = %dataset_root.display(),
                error = %e,
                "existing data unreadable; merging against an empty baseline"
            );
            TableFrame::from_batch(RecordBatch::new_empty(spec.schema.clone()))
        }
    };

    let before = existing.num_rows() + new.num_rows();
    let combined = TableFrame::concat(&spec.schema, &[existing, new])?;
    let key = spec.dedup_key.columns(&spec.schema);
    let merged = combined.dedup_keep_last(&key)?.sort_by_ts_init()?;
    tracing::debug!(
        path = %dataset_root.display(),
        rows_in = before,
        rows_out = merged.num_rows(),
        "merged mutable table"
    );
    Ok(merged)
}
