//! Accumulation of steps, providers and chain boundaries.

use std::sync::Arc;

use anyhow::Result;

use crate::builder::chain::BuildChain;
use crate::builder::context::BuildContext;
use crate::builder::errors::ChainBuildError;
use crate::builder::graph;
use crate::builder::provider::{BuildProvider, ProviderRegistry};
use crate::builder::step_builder::BuildStepBuilder;
use crate::core::item::{BuildItem, ItemId};
use crate::core::step::{BuildStep, FnStep, StepDescriptor};
use crate::util::config::ChainConfig;

/// Builder for a [`BuildChain`].
///
/// One builder is used per augmentation run. Steps are added through
/// [`add_build_step`](Self::add_build_step) or providers; the chain
/// boundaries are the initial items (supplied by the caller) and the final
/// items (returned to the caller).
#[derive(Debug, Default)]
pub struct BuildChainBuilder {
    steps: Vec<StepDescriptor>,
    initial: Vec<ItemId>,
    finals: Vec<ItemId>,
    config: ChainConfig,
}

impl BuildChainBuilder {
    /// A builder configured from the environment only
    /// (`BUILDCHAIN_THREADS`, `BUILDCHAIN_GRAPH_OUTPUT`).
    pub fn new() -> Self {
        BuildChainBuilder {
            config: ChainConfig::from_env(),
            ..BuildChainBuilder::default()
        }
    }

    /// Use `config` for the worker pool and debug graph output.
    pub fn with_config(mut self, config: ChainConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    /// Start registering a step.
    pub fn add_build_step<S: BuildStep + 'static>(&mut self, step: S) -> BuildStepBuilder<'_> {
        BuildStepBuilder::new(self, Arc::new(step))
    }

    /// Start registering a step backed by a closure.
    pub fn add_step_fn<F>(&mut self, id: impl Into<String>, f: F) -> BuildStepBuilder<'_>
    where
        F: Fn(&mut BuildContext<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.add_build_step(FnStep::new(id, f))
    }

    /// Declare `T` as supplied by the caller at execution time.
    pub fn add_initial<T: BuildItem>(&mut self) -> &mut Self {
        self.add_initial_id(ItemId::of::<T>())
    }

    pub fn add_initial_id(&mut self, item: ItemId) -> &mut Self {
        if !self.initial.contains(&item) {
            self.initial.push(item);
        }
        self
    }

    /// Declare `T` as an item the caller retrieves from the result.
    ///
    /// Final items are the roots the chain is built from: only steps that
    /// contribute to one of them, directly or transitively, are scheduled.
    pub fn add_final<T: BuildItem>(&mut self) -> &mut Self {
        self.add_final_id(ItemId::of::<T>())
    }

    pub fn add_final_id(&mut self, item: ItemId) -> &mut Self {
        if !self.finals.contains(&item) {
            self.finals.push(item);
        }
        self
    }

    /// Install the steps of a single provider.
    pub fn add_provider(&mut self, provider: &dyn BuildProvider) -> Result<&mut Self, ChainBuildError> {
        let before = self.steps.len();
        provider
            .install_into(self)
            .map_err(|e| ChainBuildError::Provider {
                provider: provider.name().to_string(),
                source: Box::new(e),
            })?;
        tracing::debug!(
            "Provider `{}` registered {} step(s)",
            provider.name(),
            self.steps.len() - before
        );
        Ok(self)
    }

    /// Install every provider in `registry`, in registration order.
    pub fn load_providers(&mut self, registry: &ProviderRegistry) -> Result<&mut Self, ChainBuildError> {
        for provider in registry.iter() {
            self.add_provider(provider)?;
        }
        Ok(self)
    }

    /// Registered steps, in registration order.
    pub fn steps(&self) -> &[StepDescriptor] {
        &self.steps
    }

    pub fn initial_items(&self) -> &[ItemId] {
        &self.initial
    }

    pub fn final_items(&self) -> &[ItemId] {
        &self.finals
    }

    /// Validate the registered steps and compile them into a chain.
    ///
    /// The builder is left untouched, so it can be compiled again after more
    /// steps are added.
    pub fn build(&self) -> Result<BuildChain, ChainBuildError> {
        let compiled = graph::compile(&self.steps, &self.initial, &self.finals)?;

        for pruned in &compiled.pruned {
            tracing::debug!("Step `{}` is not needed by any final item; pruned", pruned);
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.worker_threads())
            .thread_name(|i| format!("build-step-{}", i))
            .build()?;

        let chain = BuildChain::new(
            compiled,
            self.initial.iter().copied().collect(),
            self.finals.iter().copied().collect(),
            Arc::new(pool),
        );

        if let Some(path) = &self.config.graph.output {
            chain.write_dot(path)?;
            tracing::info!("Wrote build chain graph to {}", path.display());
        }

        tracing::info!(
            "Compiled build chain: {} of {} step(s) included, {} worker thread(s)",
            chain.step_count(),
            self.steps.len(),
            chain.worker_threads()
        );
        Ok(chain)
    }

    pub(crate) fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub(crate) fn push_step(&mut self, step: StepDescriptor) {
        self.steps.push(step);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::item::Simple;
    use tempfile::TempDir;

    struct Banner(String);
    impl BuildItem for Banner {
        type Kind = Simple;
    }

    struct BannerProvider;

    impl BuildProvider for BannerProvider {
        fn name(&self) -> &str {
            "banner"
        }

        fn install_into(&self, builder: &mut BuildChainBuilder) -> Result<(), ChainBuildError> {
            builder
                .add_step_fn("banner", |ctx| Ok(ctx.produce(Banner("ready".to_string()))?))
                .produces::<Banner>()
                .build()
        }
    }

    struct BrokenProvider;

    impl BuildProvider for BrokenProvider {
        fn name(&self) -> &str {
            "broken"
        }

        fn install_into(&self, builder: &mut BuildChainBuilder) -> Result<(), ChainBuildError> {
            builder
                .add_step_fn("", |_ctx| Ok(()))
                .produces::<Banner>()
                .build()
        }
    }

    fn banner_chain(config: ChainConfig) -> BuildChainBuilder {
        let mut builder = BuildChainBuilder::new().with_config(config);
        builder.add_final::<Banner>();
        builder.add_provider(&BannerProvider).unwrap();
        builder
    }

    #[test]
    fn test_load_providers_installs_steps() {
        let mut registry = ProviderRegistry::new();
        registry.register(Box::new(BannerProvider));

        let mut builder = BuildChainBuilder::new();
        builder.add_final::<Banner>();
        builder.load_providers(&registry).unwrap();
        assert_eq!(builder.step_count(), 1);

        let result = builder.build().unwrap().execute().unwrap();
        assert_eq!(result.get::<Banner>().unwrap().0, "ready");
    }

    #[test]
    fn test_provider_failure_names_provider() {
        let mut registry = ProviderRegistry::new();
        registry
            .register(Box::new(BannerProvider))
            .register(Box::new(BrokenProvider));

        let mut builder = BuildChainBuilder::new();
        let err = builder.load_providers(&registry).unwrap_err();
        match &err {
            ChainBuildError::Provider { provider, source } => {
                assert_eq!(provider, "broken");
                assert!(matches!(**source, ChainBuildError::InvalidStep { .. }));
            }
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(err.to_string(), "provider `broken` failed to install its steps");
        assert_eq!(builder.steps()[0].id(), "banner");
    }

    #[test]
    fn test_graph_written_when_configured() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("chain.dot");
        let mut config = ChainConfig::default();
        config.graph.output = Some(path.clone());

        let chain = banner_chain(config).build().unwrap();
        let dot = std::fs::read_to_string(&path).unwrap();
        assert_eq!(dot, chain.to_dot());
        assert!(dot.contains("\"banner\""));
    }

    #[test]
    fn test_unwritable_graph_output_fails_build() {
        let tmp = TempDir::new().unwrap();
        let mut config = ChainConfig::default();
        config.graph.output = Some(tmp.path().join("missing").join("chain.dot"));

        let err = banner_chain(config).build().unwrap_err();
        assert!(matches!(err, ChainBuildError::GraphOutput { .. }));
    }
}
