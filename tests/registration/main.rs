//! Registration code generated from `web.rs`, compiled and run.
//!
//! `generated/` holds the generator output for this directory, regenerated
//! with `buildchain generate --src tests/registration --out tests/registration/generated`.

mod web;

use std::path::{Path, PathBuf};

use buildchain::codegen::{self, GenerateOptions};
use buildchain::{
    BuildChainBuilder, BuildError, BuildItem, CapabilityItem, Multi, Simple, StaticRecorderItem,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

pub struct AppConfig {
    pub port: u16,
}

impl BuildItem for AppConfig {
    type Kind = Simple;
}

pub struct Banner(pub String);

impl BuildItem for Banner {
    type Kind = Simple;
}

pub struct Route(pub String);

impl BuildItem for Route {
    type Kind = Multi;
}

pub struct Router {
    pub paths: Vec<String>,
    pub banner: Option<String>,
}

impl BuildItem for Router {
    type Kind = Simple;
}

pub struct RouteCount(pub usize);

impl BuildItem for RouteCount {
    type Kind = Simple;
}

include!("generated/providers.rs");

fn registration_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("registration")
}

fn chain_builder() -> BuildChainBuilder {
    let mut builder = BuildChainBuilder::new();
    builder
        .add_initial::<AppConfig>()
        .add_initial::<Banner>()
        .add_final::<Router>()
        .add_final::<RouteCount>()
        .add_final::<StaticRecorderItem>()
        .add_final::<CapabilityItem>();
    builder.load_providers(&build_providers()).unwrap();
    builder
}

fn normalize(code: &str) -> String {
    prettyplease::unparse(&syn::parse_file(code).unwrap())
}

#[test]
fn test_generated_steps_run() {
    let chain = chain_builder().build().unwrap();
    assert_eq!(chain.step_count(), 5);

    let result = chain
        .execution("registration")
        .produce(AppConfig { port: 8 })
        .unwrap()
        .produce(Banner("hello".to_string()))
        .unwrap()
        .execute()
        .unwrap();

    let router = result.get::<Router>().unwrap();
    assert_eq!(router.paths, vec!["/metrics", "8:/health"]);
    assert_eq!(router.banner.as_deref(), Some("hello"));
    assert_eq!(result.get::<RouteCount>().unwrap().0, 2);

    let recorders = result.get_all::<StaticRecorderItem>().unwrap();
    assert_eq!(recorders.len(), 1);
    let recorder = recorders[0].recorder();
    assert_eq!(recorder.step(), "web::WebSteps::serve");
    assert_eq!(recorder.calls()[0].name, "serve");
    assert_eq!(recorder.calls()[0].args, vec!["/metrics", "8:/health"]);

    let capabilities = result.get_all::<CapabilityItem>().unwrap();
    assert_eq!(capabilities.len(), 1);
    assert_eq!(capabilities[0].name(), "web");
}

#[test]
fn test_optional_item_absent() {
    let chain = chain_builder().build().unwrap();
    let result = chain
        .execution("no-banner")
        .produce(AppConfig { port: 9 })
        .unwrap()
        .execute()
        .unwrap();
    assert_eq!(result.get::<Router>().unwrap().banner, None);
}

#[test]
fn test_missing_required_item_fails_its_step() {
    let err = chain_builder().build().unwrap().execute().unwrap_err();
    assert!(matches!(err, BuildError::StepsFailed { .. }));
    assert_eq!(err.failed_steps(), vec!["web::WebSteps::health_route"]);
}

#[test]
fn test_committed_code_is_current() {
    let dir = registration_dir();
    let tmp = TempDir::new().unwrap();

    let report = codegen::generate(&GenerateOptions::new(&dir, tmp.path())).unwrap();
    assert_eq!(report.steps, 5);
    assert_eq!(report.providers, vec!["crate::web::WebStepsBuildProvider".to_string()]);

    for name in ["web.steps.rs", "providers.rs"] {
        let fresh = std::fs::read_to_string(tmp.path().join(name)).unwrap();
        let committed = std::fs::read_to_string(dir.join("generated").join(name)).unwrap();
        assert!(committed.starts_with(codegen::emit::GENERATED_HEADER));
        assert_eq!(normalize(&committed), normalize(&fresh), "{} is out of date", name);
    }
}
