use std::sync::Arc;

use buildchain::{build_step, record, BuildProducer, Recorder};

use crate::{AppConfig, Banner, Route, RouteCount, Router};

#[derive(Default)]
pub struct WebSteps;

impl WebSteps {
    #[build_step]
    pub fn health_route(&self, config: &AppConfig, routes: &mut BuildProducer<Route>) {
        routes.produce(Route(format!("{}:/health", config.port)));
    }

    #[build_step]
    pub fn metrics_route(&self) -> Vec<Route> {
        vec![Route("/metrics".to_string())]
    }

    #[build_step(capability = "web")]
    pub fn router(
        &self,
        routes: Vec<Arc<Route>>,
        banner: Option<&Banner>,
    ) -> anyhow::Result<Router> {
        anyhow::ensure!(!routes.is_empty(), "no routes registered");
        let mut paths: Vec<String> = routes.iter().map(|r| r.0.clone()).collect();
        paths.sort();
        Ok(Router {
            paths,
            banner: banner.map(|b| b.0.clone()),
        })
    }

    #[build_step]
    #[record(static_init)]
    pub fn serve(&self, recorder: &mut Recorder, router: Arc<Router>) {
        recorder.record("serve", router.paths.clone());
    }

    #[build_step]
    pub fn r#match(&self, router: &Router) -> Option<RouteCount> {
        (!router.paths.is_empty()).then(|| RouteCount(router.paths.len()))
    }
}

include!("generated/web.steps.rs");
