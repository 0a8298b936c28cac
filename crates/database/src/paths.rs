//! Authoritative catalog layout and deterministic file naming.
//!
//! Layout overview:
//! `root/data/<table stem>.parquet/(<col>=<encoded value>/)*<basename>`
//!
//! Data file basenames start with the zero-padded `ts_init` range they cover,
//! `{min:019}-{max:019}-{i}.parquet`, so range pruning can work on names alone.
//! Compacted files are named after their time bucket instead.
//! This naming is part of the storage contract; changing it requires a migration.

use crate::mapping::encode_value;
use lake_types::keys::TableKey;
use std::path::{Path, PathBuf};

pub const DATA_DIR: &str = "data";
pub const PARQUET_EXT: &str = "parquet";
/// Schema-only metadata file at each dataset root.
pub const COMMON_METADATA: &str = "_common_metadata";
/// Placeholder substituted with the per-write file counter.
pub const FILE_COUNTER: &str = "{i}";
/// Basename for single-file mutable tables; each write replaces the file.
pub const MUTABLE_BASENAME: &str = "{i}.parquet";

const TS_DIGITS: usize = 19;

pub fn data_root(catalog_root: &Path) -> PathBuf {
    catalog_root.join(DATA_DIR)
}

/// `root/data/<stem>.parquet`, the directory holding one table's dataset.
pub fn dataset_root(catalog_root: &Path, key: &TableKey) -> PathBuf {
    data_root(catalog_root).join(format!("{}.{PARQUET_EXT}", key.file_stem()))
}

/// Last `.`-separated segment of a bar type, e.g. `SIM-1-MINUTE-BID-EXTERNAL`.
pub fn bar_suffix(bar_type: &str) -> String {
    let last = bar_type.rsplit('.').next().unwrap_or(bar_type);
    encode_value(Some(last))
}

/// `{min:019}-{max:019}[-{suffix}]-{i}.parquet` with `{i}` left for the dataset writer.
pub fn range_basename_template(min_ts: i64, max_ts: i64, suffix: Option<&str>) -> String {
    match suffix {
        Some(s) => format!("{min_ts:019}-{max_ts:019}-{s}-{FILE_COUNTER}.{PARQUET_EXT}"),
        None => format!("{min_ts:019}-{max_ts:019}-{FILE_COUNTER}.{PARQUET_EXT}"),
    }
}

pub fn render_basename(template: &str, counter: usize) -> String {
    template.replace(FILE_COUNTER, &counter.to_string())
}

/// `<bucket>.parquet`, the name of a compacted file.
pub fn bucket_file_name(bucket: &str) -> String {
    format!("{bucket}.{PARQUET_EXT}")
}

/// Parse the leading `ts_init` range from a data file name.
///
/// Only `^\d{19}-\d{19}` prefixes are accepted; anything else (metadata
/// files, compacted bucket files, foreign files) yields `None`.
pub fn parse_filename_range(file_name: &str) -> Option<(i64, i64)> {
    let bytes = file_name.as_bytes();
    if bytes.len() < TS_DIGITS * 2 + 1 {
        return None;
    }
    let start = &bytes[..TS_DIGITS];
    let end = &bytes[TS_DIGITS + 1..TS_DIGITS * 2 + 1];
    if bytes[TS_DIGITS] != b'-'
        || !start.iter().all(u8::is_ascii_digit)
        || !end.iter().all(u8::is_ascii_digit)
    {
        return None;
    }
    let start = std::str::from_utf8(start).ok()?.parse().ok()?;
    let end = std::str::from_utf8(end).ok()?.parse().ok()?;
    Some((start, end))
}

/// Leading `ts_init` of a data file name.
pub fn parse_filename_start(file_name: &str) -> Option<i64> {
    parse_filename_range(file_name).map(|(start, _)| start)
}

/// Parquet payload files, excluding `_`/`.`-prefixed metadata and staging files.
pub fn is_data_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    !name.starts_with('_')
        && !name.starts_with('.')
        && path.extension().and_then(|e| e.to_str()) == Some(PARQUET_EXT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lake_types::keys::InstrumentKind;
    use rstest::rstest;

    #[test]
    fn dataset_roots() {
        let root = Path::new("/cat");
        assert_eq!(
            dataset_root(root, &TableKey::QuoteTick),
            PathBuf::from("/cat/data/quote_tick.parquet")
        );
        assert_eq!(
            dataset_root(root, &TableKey::Instrument(InstrumentKind::Equity)),
            PathBuf::from("/cat/data/equity.parquet")
        );
    }

    #[test]
    fn basenames_are_zero_padded() {
        let t = range_basename_template(5, 1_672_531_200_000_000_000, None);
        assert_eq!(
            render_basename(&t, 0),
            "0000000000000000005-1672531200000000000-0.parquet"
        );
        let t = range_basename_template(1, 2, Some(&bar_suffix("EUR/USD.SIM-1-MINUTE-BID-EXTERNAL")));
        assert_eq!(
            render_basename(&t, 3),
            "0000000000000000001-0000000000000000002-SIM-1-MINUTE-BID-EXTERNAL-3.parquet"
        );
    }

    #[rstest]
    #[case("0000000000000000005-0000000000000000009-0.parquet", Some((5, 9)))]
    #[case("1672531200000000000-1672617599000000000-SIM-1-MINUTE-BID-EXTERNAL-0.parquet", Some((1_672_531_200_000_000_000, 1_672_617_599_000_000_000)))]
    #[case("20230101.parquet", None)]
    #[case("0.parquet", None)]
    #[case("_common_metadata", None)]
    #[case("000000000000000000x-0000000000000000009-0.parquet", None)]
    #[case("0000000000000000005_0000000000000000009-0.parquet", None)]
    fn parses_range_prefix(#[case] name: &str, #[case] expected: Option<(i64, i64)>) {
        assert_eq!(parse_filename_range(name), expected);
    }

    #[test]
    fn data_file_filter() {
        assert!(is_data_file(Path::new("/a/0-1-0.parquet")));
        assert!(!is_data_file(Path::new("/a/_common_metadata")));
        assert!(!is_data_file(Path::new("/a/_partition_mappings.json")));
        assert!(!is_data_file(Path::new("/a/.tmpXYZ.parquet")));
    }
}
