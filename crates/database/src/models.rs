use lake_types::keys::TableKey;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Ordered hive partition columns for one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionSpec(Vec<String>);

impl PartitionSpec {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(columns.into_iter().map(Into::into).collect())
    }

    pub fn columns(&self) -> &[String] {
        &self.0
    }
}

/// A (table, instrument) group that was not persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedGroup {
    pub table: TableKey,
    pub instrument_id: Option<String>,
    pub rows: usize,
    pub reason: String,
}

/// Outcome of one write call. Skipped groups mean `rows_written` can be lower
/// than `rows_attempted`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WriteReport {
    pub rows_attempted: usize,
    /// Input rows accepted into a registered table. For mutable tables this is
    /// not the size of the stored file, which also holds the merged-in rows.
    pub rows_written: usize,
    pub files_written: Vec<PathBuf>,
    /// New files whose on-disk order had to be repaired after the write.
    pub files_resorted: usize,
    pub skipped: Vec<SkippedGroup>,
}

impl WriteReport {
    pub fn absorb(&mut self, other: WriteReport) {
        self.rows_attempted += other.rows_attempted;
        self.rows_written += other.rows_written;
        self.files_written.extend(other.files_written);
        self.files_resorted += other.files_resorted;
        self.skipped.extend(other.skipped);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompactionReport {
    pub groups_compacted: usize,
    /// Groups left alone because a member file could not be decoded.
    pub groups_failed: usize,
    pub files_removed: usize,
    /// Data files whose names carry no parseable range.
    pub files_untouched: usize,
    pub rows_before: usize,
    pub rows_after: usize,
    pub files_written: Vec<PathBuf>,
}

impl CompactionReport {
    pub fn duplicates_removed(&self) -> usize {
        self.rows_before.saturating_sub(self.rows_after)
    }

    pub fn absorb(&mut self, other: CompactionReport) {
        self.groups_compacted += other.groups_compacted;
        self.groups_failed += other.groups_failed;
        self.files_removed += other.files_removed;
        self.files_untouched += other.files_untouched;
        self.rows_before += other.rows_before;
        self.rows_after += other.rows_after;
        self.files_written.extend(other.files_written);
    }
}
