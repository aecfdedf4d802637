//! Command implementations

pub mod describe;
pub mod generate;

use std::path::Path;

use anyhow::{Context, Result};

use buildchain::util::config::load_config;
use buildchain::{Cardinality, ChainConfig};

/// Configuration for the current directory, with `--item` flags added.
fn command_config(items: Vec<(String, Cardinality)>) -> Result<ChainConfig> {
    let cwd = std::env::current_dir().context("failed to get current directory")?;
    let mut config = load_config(&cwd);
    config.codegen.items.extend(items);
    Ok(config)
}

/// Fail early with a hint when the source root is missing.
fn check_src(src: &Path) -> Result<()> {
    if !src.is_dir() {
        anyhow::bail!(
            "source root {} is not a directory\nhelp: {}",
            src.display(),
            buildchain::util::diagnostic::suggestions::NO_SOURCES
        );
    }
    Ok(())
}
