//! Partition planning and hive directory composition.

use crate::mapping::PartitionColumnMapping;
use crate::models::PartitionSpec;
use crate::schema::SchemaRegistry;
use lake_types::keys::TableKey;
use lake_types::record::INSTRUMENT_ID;
use std::path::{Path, PathBuf};

/// Partition columns for a table/instrument group.
///
/// Declared keys win; otherwise a group with an instrument key is partitioned
/// by `instrument_id`; otherwise nothing.
pub fn plan_partitions(
    registry: &SchemaRegistry,
    key: &TableKey,
    instrument_key: Option<&str>,
) -> Option<PartitionSpec> {
    if let Some(keys) = registry.partition_keys_of(key) {
        if !keys.is_empty() {
            return Some(PartitionSpec::new(keys.iter().cloned()));
        }
    }
    instrument_key.map(|_| PartitionSpec::new([INSTRUMENT_ID]))
}

/// `base/col1=v1/col2=v2`, with values made path-safe through `mapping`.
pub fn partition_dir(
    base: &Path,
    columns: &[String],
    values: &[Option<&str>],
    mapping: &mut PartitionColumnMapping,
) -> PathBuf {
    let mut dir = base.to_path_buf();
    for (col, value) in columns.iter().zip(values) {
        dir.push(format!("{col}={}", mapping.encode(col, *value)));
    }
    dir
}
