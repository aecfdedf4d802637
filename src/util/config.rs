//! Configuration file support.
//!
//! Two configuration file locations are read:
//! - Global: `<config dir>/buildchain/config.toml` - user-wide defaults
//! - Project: `buildchain.toml` - project-specific overrides
//!
//! Project config takes precedence over global config, and the environment
//! (`BUILDCHAIN_THREADS`, `BUILDCHAIN_GRAPH_OUTPUT`) takes precedence over both.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::item::Cardinality;

/// Project configuration file name.
pub const CONFIG_FILE_NAME: &str = "buildchain.toml";

/// Environment variable overriding the worker count.
pub const THREADS_ENV: &str = "BUILDCHAIN_THREADS";

/// Environment variable naming a file to write the compiled chain graph to.
pub const GRAPH_OUTPUT_ENV: &str = "BUILDCHAIN_GRAPH_OUTPUT";

/// Build chain configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Execution settings
    pub execution: ExecutionConfig,

    /// Debug graph settings
    pub graph: GraphConfig,

    /// Registration generator settings
    pub codegen: CodegenConfig,
}

/// Execution settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Number of worker threads (default: available parallelism)
    pub threads: Option<usize>,
}

/// Debug graph settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Write the compiled chain as a Graphviz file to this path
    pub output: Option<PathBuf>,
}

/// Registration generator settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodegenConfig {
    /// Item types declared in other crates, by the name steps use for them
    pub items: BTreeMap<String, Cardinality>,

    /// Provider listing to merge into (default: inside the output directory)
    pub listing: Option<PathBuf>,
}

impl ChainConfig {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if the file doesn't exist
    /// or can't be read.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: ChainConfig) {
        if other.execution.threads.is_some() {
            self.execution.threads = other.execution.threads;
        }
        if other.graph.output.is_some() {
            self.graph.output = other.graph.output;
        }
        self.codegen.items.extend(other.codegen.items);
        if other.codegen.listing.is_some() {
            self.codegen.listing = other.codegen.listing;
        }
    }

    /// Defaults with environment overrides applied.
    pub fn from_env() -> Self {
        let mut config = ChainConfig::default();
        config.apply_env();
        config
    }

    /// Apply overrides from environment variables.
    pub fn apply_env(&mut self) {
        self.apply_overrides(
            std::env::var(THREADS_ENV).ok(),
            std::env::var(GRAPH_OUTPUT_ENV).ok(),
        );
    }

    fn apply_overrides(&mut self, threads: Option<String>, graph_output: Option<String>) {
        if let Some(threads) = threads {
            match threads.trim().parse::<usize>() {
                Ok(n) if n > 0 => self.execution.threads = Some(n),
                _ => tracing::warn!("Ignoring invalid {}={:?}", THREADS_ENV, threads),
            }
        }
        if let Some(output) = graph_output.filter(|o| !o.is_empty()) {
            self.graph.output = Some(PathBuf::from(output));
        }
    }

    /// Worker threads to use: the configured count, else available parallelism.
    pub fn worker_threads(&self) -> usize {
        self.execution
            .threads
            .filter(|&n| n > 0)
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1)
            })
    }
}

/// Load merged configuration from global and project locations, then the
/// environment.
///
/// Order of precedence (highest to lowest):
/// 1. Environment variables
/// 2. Project config (`buildchain.toml`)
/// 3. Global config (`<config dir>/buildchain/config.toml`)
/// 4. Defaults
pub fn load_config(project_root: &Path) -> ChainConfig {
    let mut config = ChainConfig::default();

    if let Some(global) = global_config_path() {
        config.merge(ChainConfig::load_or_default(&global));
    }

    config.merge(ChainConfig::load_or_default(
        &project_root.join(CONFIG_FILE_NAME),
    ));

    config.apply_env();
    config
}

/// Get the global config path.
pub fn global_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "buildchain")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}
