//! Filesystem helpers for the generator.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Create `path` and its parents unless it already exists.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.is_dir() {
        fs::create_dir_all(path)
            .with_context(|| format!("failed to create directory: {}", path.display()))?;
    }
    Ok(())
}

pub fn read_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read file: {}", path.display()))
}

/// Write `contents` unless the file already holds exactly that, so that
/// build scripts including generated files don't rebuild needlessly.
/// Returns whether the file was written.
pub fn write_if_changed(path: &Path, contents: &str) -> Result<bool> {
    if fs::read_to_string(path).is_ok_and(|existing| existing == contents) {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    fs::write(path, contents).with_context(|| format!("failed to write file: {}", path.display()))?;
    Ok(true)
}

/// Every `.rs` file below `root`, sorted so scans are deterministic.
pub fn rust_sources(root: &Path) -> Result<Vec<PathBuf>> {
    let pattern = root.join("**").join("*.rs");
    let pattern = pattern.to_string_lossy();

    let mut files = Vec::new();
    for entry in glob::glob(&pattern).with_context(|| format!("invalid source root: {}", root.display()))? {
        match entry {
            Ok(path) if path.is_file() => files.push(path),
            Ok(_) => {}
            Err(e) => tracing::warn!("Skipping unreadable path: {}", e),
        }
    }
    files.sort();
    Ok(files)
}

/// `path` relative to `base`, or `path` itself when there is no relative form.
pub fn relative_path(base: &Path, path: &Path) -> PathBuf {
    pathdiff::diff_paths(path, base).unwrap_or_else(|| path.to_path_buf())
}
