use crate::dataset::ExistingDataBehavior;
use std::path::PathBuf;
use std::str::FromStr;
use strum::IntoEnumIterator;

pub const DEFAULT_ZSTD_LEVEL: i32 = 3;
pub const DEFAULT_COMPACTION_BUCKET: &str = "%Y%m%d";

/// Runtime knobs for a catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogConfig {
    pub root: PathBuf,
    pub zstd_level: i32,
    pub existing_data_behavior: ExistingDataBehavior,
    /// chrono format string; files whose start timestamps render to the same
    /// string are compacted together.
    pub compaction_bucket_format: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./catalog"),
            zstd_level: DEFAULT_ZSTD_LEVEL,
            existing_data_behavior: ExistingDataBehavior::OverwriteOrIgnore,
            compaction_bucket_format: DEFAULT_COMPACTION_BUCKET.to_string(),
        }
    }
}

/// Best-effort: load environment variables from .env, falling back to .env.example.
fn load_env_best_effort() {
    let _ = dotenvy::from_filename(".env").or_else(|_| dotenvy::from_filename(".env.example"));
}

impl CatalogConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Build from `LAKE_*` environment variables. Unset or unparseable values
    /// keep their defaults.
    pub fn from_env() -> Self {
        load_env_best_effort();
        let mut cfg = Self::default();

        if let Ok(root) = std::env::var("LAKE_CATALOG_PATH") {
            cfg.root = PathBuf::from(root);
        }
        if let Some(level) = std::env::var("LAKE_ZSTD_LEVEL")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            cfg.zstd_level = level;
        }
        if let Ok(raw) = std::env::var("LAKE_EXISTING_DATA") {
            match ExistingDataBehavior::from_str(raw.trim()) {
                Ok(b) => cfg.existing_data_behavior = b,
                Err(_) => {
                    let allowed: Vec<String> =
                        ExistingDataBehavior::iter().map(|b| b.to_string()).collect();
                    tracing::warn!(value = %raw, ?allowed, "LAKE_EXISTING_DATA not recognised; using default")
                }
            }
        }
        if let Ok(fmt) = std::env::var("LAKE_COMPACTION_BUCKET") {
            if !fmt.trim().is_empty() {
                cfg.compaction_bucket_format = fmt;
            }
        }
        cfg
    }

    pub fn with_zstd_level(mut self, level: i32) -> Self {
        self.zstd_level = level;
        self
    }

    pub fn with_existing_data_behavior(mut self, behavior: ExistingDataBehavior) -> Self {
        self.existing_data_behavior = behavior;
        self
    }

    pub fn with_compaction_bucket(mut self, format: impl Into<String>) -> Self {
        self.compaction_bucket_format = format.into();
        self
    }
}
