//! Build providers and the provider registry.
//!
//! A provider installs a group of related steps into a chain builder. The
//! code generator emits one provider per type that owns step methods, and an
//! aggregate `build_providers()` function returning a [`ProviderRegistry`]
//! with every provider of a crate.

use crate::builder::chain_builder::BuildChainBuilder;
use crate::builder::errors::ChainBuildError;

/// A source of build steps.
pub trait BuildProvider: Send + Sync {
    /// Name the provider is registered under.
    fn name(&self) -> &str;

    /// Register this provider's steps with `builder`.
    fn install_into(&self, builder: &mut BuildChainBuilder) -> Result<(), ChainBuildError>;
}

/// Append-only set of providers, keyed by name.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: Vec<Box<dyn BuildProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        ProviderRegistry::default()
    }

    /// Add a provider. A second provider with an existing name is ignored.
    pub fn register(&mut self, provider: Box<dyn BuildProvider>) -> &mut Self {
        if self.contains(provider.name()) {
            tracing::debug!("Provider `{}` already registered", provider.name());
        } else {
            self.providers.push(provider);
        }
        self
    }

    /// Merge every provider of `other` that is not already present.
    pub fn merge(&mut self, other: ProviderRegistry) -> &mut Self {
        for provider in other.providers {
            self.register(provider);
        }
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.providers.iter().any(|p| p.name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn BuildProvider> {
        self.providers.iter().map(|p| p.as_ref())
    }

    pub fn names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.names())
            .finish()
    }
}
