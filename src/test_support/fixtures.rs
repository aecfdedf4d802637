//! Source-tree fixtures for generator tests.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Items shared by the step crate fixtures.
pub const ITEMS_SOURCE: &str = r#"pub mod web;

use buildchain::{BuildItem, Multi, Simple};

pub struct AppConfig {
    pub port: u16,
}

impl BuildItem for AppConfig {
    type Kind = Simple;
}

pub struct Route(pub String);

impl BuildItem for Route {
    type Kind = Multi;
}

pub struct Router {
    pub routes: Vec<String>,
}

impl BuildItem for Router {
    type Kind = Simple;
}
"#;

/// A step owner with a producer-handle step and a returning step.
pub const WEB_STEPS_SOURCE: &str = r#"use std::sync::Arc;

use buildchain::{build_step, BuildProducer};

use crate::{AppConfig, Route, Router};

#[derive(Default)]
pub struct WebSteps;

impl WebSteps {
    #[build_step]
    pub fn health_route(&self, routes: &mut BuildProducer<Route>) {
        routes.produce(Route("/health".to_string()));
    }

    #[build_step(capability = "web")]
    pub fn router(&self, config: &AppConfig, routes: Vec<Arc<Route>>) -> Router {
        let _ = config.port;
        Router {
            routes: routes.iter().map(|r| r.0.clone()).collect(),
        }
    }
}
"#;

/// A source tree below some root.
#[derive(Debug, Clone, Default)]
pub struct SourceTreeFixture {
    /// Files relative to the source root
    pub files: BTreeMap<PathBuf, String>,
}

impl SourceTreeFixture {
    pub fn new() -> Self {
        Self::default()
    }

    /// The `web` step crate: items in `lib.rs`, steps in `web.rs`.
    pub fn step_crate() -> Self {
        SourceTreeFixture::new()
            .with_file("lib.rs", ITEMS_SOURCE)
            .with_file("web.rs", WEB_STEPS_SOURCE)
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        self.files.insert(path.into(), contents.into());
        self
    }

    /// Write the tree to `<root>/src` and return that directory.
    pub fn write(&self, root: &Path) -> PathBuf {
        let src = root.join("src");
        for (path, contents) in &self.files {
            let full = src.join(path);
            if let Some(parent) = full.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(&full, contents).unwrap();
        }
        src
    }
}

/// Write the `web` step crate below `root`; returns its `src` directory.
pub fn write_step_crate(root: &Path) -> PathBuf {
    SourceTreeFixture::step_crate().write(root)
}
