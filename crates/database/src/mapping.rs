//! Partition-value encoding and the `_partition_mappings.json` side file.
//!
//! Hive directories carry `column=value` segments, so raw values must be made
//! path-safe. The encoding is injective; the side file additionally records
//! every value whose encoded form differs from the raw one, keyed by column,
//! so tools that only see directory names can recover the original.

use crate::fs::ObjectStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const MAPPINGS_FILE: &str = "_partition_mappings.json";

/// Directory value used for a null partition value.
pub const NULL_PARTITION: &str = "__HIVE_DEFAULT_PARTITION__";

/// Encoded form of the empty string. A bare `%` never results from escaping.
const EMPTY_PARTITION: &str = "%";

#[derive(Debug, Error)]
pub enum MappingError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

fn needs_escape(c: char) -> bool {
    matches!(
        c,
        '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' | ' ' | '%' | '='
    ) || c.is_ascii_control()
}

fn push_escaped(out: &mut String, c: char) {
    let mut buf = [0u8; 4];
    for b in c.encode_utf8(&mut buf).bytes() {
        out.push_str(&format!("%{b:02X}"));
    }
}

/// Path-safe form of a partition value.
pub fn encode_value(raw: Option<&str>) -> String {
    let Some(raw) = raw else {
        return NULL_PARTITION.to_string();
    };
    if raw.is_empty() {
        return EMPTY_PARTITION.to_string();
    }
    let mut out = String::with_capacity(raw.len() + 8);
    for (i, c) in raw.chars().enumerate() {
        let leading_dot = i == 0 && c == '.';
        // keep a literal value from colliding with the null token
        let null_token = i == 0 && raw == NULL_PARTITION;
        if needs_escape(c) || leading_dot || null_token {
            push_escaped(&mut out, c);
        } else {
            out.push(c);
        }
    }
    out
}

/// Inverse of [`encode_value`].
pub fn decode_value(encoded: &str) -> Option<String> {
    if encoded == NULL_PARTITION {
        return None;
    }
    if encoded == EMPTY_PARTITION {
        return Some(String::new());
    }
    let bytes = encoded.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3])
                .ok()
                .and_then(|h| u8::from_str_radix(h, 16).ok());
            if let Some(b) = hex {
                out.push(b);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    Some(String::from_utf8_lossy(&out).into_owned())
}

/// Raw value -> encoded value, per partition column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartitionColumnMapping {
    columns: BTreeMap<String, BTreeMap<String, String>>,
}

impl PartitionColumnMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode `raw` for `column`, remembering it when the encoded form differs.
    pub fn encode(&mut self, column: &str, raw: Option<&str>) -> String {
        let encoded = encode_value(raw);
        if let Some(raw) = raw {
            if raw != encoded {
                self.columns
                    .entry(column.to_string())
                    .or_default()
                    .insert(raw.to_string(), encoded.clone());
            }
        }
        encoded
    }

    /// Recover the raw value behind a directory segment.
    pub fn decode(&self, column: &str, encoded: &str) -> Option<String> {
        if let Some(values) = self.columns.get(column) {
            if let Some((raw, _)) = values.iter().find(|(_, e)| e.as_str() == encoded) {
                return Some(raw.clone());
            }
        }
        decode_value(encoded)
    }

    pub fn get(&self, column: &str) -> Option<&BTreeMap<String, String>> {
        self.columns.get(column)
    }

    pub fn is_empty(&self) -> bool {
        self.columns.values().all(BTreeMap::is_empty)
    }

    /// Add every entry of `other`. Existing entries are never removed.
    pub fn union(&mut self, other: &PartitionColumnMapping) {
        for (column, values) in &other.columns {
            let dst = self.columns.entry(column.clone()).or_default();
            for (raw, encoded) in values {
                dst.entry(raw.clone()).or_insert_with(|| encoded.clone());
            }
        }
    }

    pub fn path(dataset_root: &Path) -> PathBuf {
        dataset_root.join(MAPPINGS_FILE)
    }

    /// Mapping stored under `dataset_root`, or an empty one if none was written yet.
    pub fn load(store: &dyn ObjectStore, dataset_root: &Path) -> Result<Self, MappingError> {
        let path = Self::path(dataset_root);
        if !store.exists(&path)? {
            return Ok(Self::default());
        }
        let bytes = store.read(&path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Union with whatever is already stored and write the result back.
    pub fn persist(&self, store: &dyn ObjectStore, dataset_root: &Path) -> Result<Self, MappingError> {
        let mut merged = Self::load(store, dataset_root)?;
        merged.union(self);
        if merged.is_empty() {
            return Ok(merged);
        }
        let json = serde_json::to_vec_pretty(&merged)?;
        store.write(&Self::path(dataset_root), &json)?;
        tracing::debug!(path = %Self::path(dataset_root).display(), "partition mappings persisted");
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::LocalFileSystem;
    use rstest::rstest;
    use tempfile::TempDir;

    #[rstest]
    #[case("EUR/USD.SIM")]
    #[case("BTC:USDT")]
    #[case("a b=c%d")]
    #[case(".hidden")]
    #[case("")]
    #[case("%")]
    #[case("%2F")]
    #[case("__HIVE_DEFAULT_PARTITION__")]
    #[case("ÄÖ/ü")]
    #[case("line\nbreak")]
    #[case("AAPL.NASDAQ")]
    fn round_trips(#[case] raw: &str) {
        let encoded = encode_value(Some(raw));
        assert!(!encoded.contains('/'));
        assert!(!encoded.contains(':'));
        assert_eq!(decode_value(&encoded).as_deref(), Some(raw));

        let mut m = PartitionColumnMapping::new();
        let enc = m.encode("instrument_id", Some(raw));
        assert_eq!(m.decode("instrument_id", &enc).as_deref(), Some(raw));
    }

    #[test]
    fn null_has_its_own_token() {
        assert_eq!(encode_value(None), NULL_PARTITION);
        assert_eq!(decode_value(NULL_PARTITION), None);
        assert_ne!(encode_value(Some(NULL_PARTITION)), NULL_PARTITION);
    }

    #[test]
    fn safe_values_are_not_recorded() {
        let mut m = PartitionColumnMapping::new();
        assert_eq!(m.encode("instrument_id", Some("AAPL.NASDAQ")), "AAPL.NASDAQ");
        assert!(m.is_empty());
        assert_eq!(m.encode("instrument_id", Some("EUR/USD")), "EUR%2FUSD");
        assert_eq!(
            m.get("instrument_id").and_then(|v| v.get("EUR/USD")).map(String::as_str),
            Some("EUR%2FUSD")
        );
    }

    #[test]
    fn persist_unions_with_stored_entries() -> anyhow::Result<()> {
        let tmp = TempDir::new()?;
        let store = LocalFileSystem::new();

        let mut first = PartitionColumnMapping::new();
        first.encode("instrument_id", Some("EUR/USD"));
        first.persist(&store, tmp.path())?;

        let mut second = PartitionColumnMapping::new();
        second.encode("instrument_id", Some("GBP/USD"));
        second.encode("venue", Some("a:b"));
        second.persist(&store, tmp.path())?;

        let loaded = PartitionColumnMapping::load(&store, tmp.path())?;
        let iid = loaded.get("instrument_id").expect("column");
        assert!(iid.contains_key("EUR/USD"));
        assert!(iid.contains_key("GBP/USD"));
        assert!(loaded.get("venue").expect("venue").contains_key("a:b"));
        Ok(())
    }
}
