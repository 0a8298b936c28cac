use anyhow::{Context, Result};
use lake_database::{Catalog, CatalogConfig};
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;

/// Compact every dataset of a catalog into daily (or `LAKE_COMPACTION_BUCKET`) files.
///
/// Usage: `compact_catalog [CATALOG_ROOT]`; the root defaults to `LAKE_CATALOG_PATH`.
fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::INFO)
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .compact()
        .init();

    let mut config = CatalogConfig::from_env();
    if let Some(root) = std::env::args().nth(1) {
        config.root = PathBuf::from(root);
    }
    if !config.root.exists() {
        anyhow::bail!("catalog root {} does not exist", config.root.display());
    }

    let catalog = Catalog::new(config);
    let types = catalog
        .list_data_types()
        .context("listing catalog data types")?;
    tracing::info!(root = %catalog.root().display(), types = ?types, "compacting catalog");

    let report = catalog.compact().context("compaction failed")?;
    println!(
        "compacted {} bucket(s): {} file(s) removed, {} duplicate row(s) dropped, {} group(s) skipped, {} file(s) left untouched",
        report.groups_compacted,
        report.files_removed,
        report.duplicates_removed(),
        report.groups_failed,
        report.files_untouched,
    );
    Ok(())
}
