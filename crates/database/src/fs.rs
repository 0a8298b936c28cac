//! Object store seam.
//!
//! The pipeline only ever talks to storage through [`ObjectStore`], so a
//! remote backend can be dropped in without touching the writer or the
//! compactor. [`LocalFileSystem`] is the implementation used in practice.

use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub trait ObjectStore: fmt::Debug + Send + Sync {
    /// Every file below `prefix`, recursively. A missing prefix lists as empty.
    fn list_files(&self, prefix: &Path) -> io::Result<Vec<PathBuf>>;

    /// Immediate child directories of `prefix`. A missing prefix lists as empty.
    fn list_dirs(&self, prefix: &Path) -> io::Result<Vec<PathBuf>>;

    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Replace `path` with `contents`. Readers never observe a half-written file.
    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()>;

    fn remove(&self, path: &Path) -> io::Result<()>;

    fn exists(&self, path: &Path) -> io::Result<bool>;

    fn make_dirs(&self, path: &Path) -> io::Result<()>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFileSystem;

impl LocalFileSystem {
    pub fn new() -> Self {
        Self
    }
}

fn walk(dir: &Path, out: &mut Vec<PathBuf>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            walk(&path, out)?;
        } else {
            out.push(path);
        }
    }
    Ok(())
}

impl ObjectStore for LocalFileSystem {
    fn list_files(&self, prefix: &Path) -> io::Result<Vec<PathBuf>> {
        let mut out = Vec::new();
        match walk(prefix, &mut out) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        }
        out.sort();
        Ok(out)
    }

    fn list_dirs(&self, prefix: &Path) -> io::Result<Vec<PathBuf>> {
        let entries = match fs::read_dir(prefix) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut out = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                out.push(entry.path());
            }
        }
        out.sort();
        Ok(out)
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)?;
        // Stage next to the target so the final rename stays on one filesystem.
        let mut tmp = NamedTempFile::new_in(parent)?;
        tmp.write_all(contents)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn exists(&self, path: &Path) -> io::Result<bool> {
        path.try_exists()
    }

    fn make_dirs(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }
}
