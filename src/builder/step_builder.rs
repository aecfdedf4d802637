//! Registration of a single build step.

use std::panic::Location;
use std::sync::Arc;

use crate::builder::chain_builder::BuildChainBuilder;
use crate::builder::errors::ChainBuildError;
use crate::core::item::{BuildItem, CapabilityItem, ItemId};
use crate::core::recorder::ExecutionTime;
use crate::core::step::{BuildStep, Consume, Produce, StepDescriptor};

/// Builder for one step's consume/produce contract.
///
/// Nothing is added to the chain builder until [`build`](Self::build) is
/// called; the configuration at that moment is what the chain sees.
#[must_use = "a step is only registered once `build` is called"]
pub struct BuildStepBuilder<'a> {
    chain: &'a mut BuildChainBuilder,
    step: Arc<dyn BuildStep>,
    id: String,
    consumes: Vec<Consume>,
    produces: Vec<Produce>,
    recording: Option<ExecutionTime>,
    capabilities: Vec<String>,
    conflict: Option<String>,
}

impl<'a> BuildStepBuilder<'a> {
    pub(crate) fn new(chain: &'a mut BuildChainBuilder, step: Arc<dyn BuildStep>) -> Self {
        let id = step.id();
        BuildStepBuilder {
            chain,
            step,
            id,
            consumes: Vec::new(),
            produces: Vec::new(),
            recording: None,
            capabilities: Vec::new(),
            conflict: None,
        }
    }

    /// Declare a required consumption of `T`.
    pub fn consumes<T: BuildItem>(self) -> Self {
        self.consume(ItemId::of::<T>(), false)
    }

    /// Declare an optional consumption of `T`.
    pub fn consumes_optional<T: BuildItem>(self) -> Self {
        self.consume(ItemId::of::<T>(), true)
    }

    /// Declare a consumption by item id.
    pub fn consume(mut self, item: ItemId, optional: bool) -> Self {
        match self.consumes.iter_mut().find(|c| c.item == item) {
            // Required wins over optional.
            Some(existing) => existing.optional &= optional,
            None => self.consumes.push(Consume { item, optional }),
        }
        self
    }

    /// Declare that this step produces `T`.
    pub fn produces<T: BuildItem>(self) -> Self {
        self.produce(ItemId::of::<T>(), false, false)
    }

    /// Declare a weak production: producing `T` does not pull this step into
    /// the chain on its own.
    pub fn produces_weak<T: BuildItem>(self) -> Self {
        self.produce(ItemId::of::<T>(), true, false)
    }

    /// Declare an overridable production: it is only used when no other step
    /// produces `T` non-overridably.
    pub fn produces_overridable<T: BuildItem>(self) -> Self {
        self.produce(ItemId::of::<T>(), false, true)
    }

    /// Declare a production by item id.
    pub fn produce(mut self, item: ItemId, weak: bool, overridable: bool) -> Self {
        let produce = Produce {
            item,
            weak,
            overridable,
        };
        match self.produces.iter().find(|p| p.item == item) {
            Some(existing) if *existing != produce => {
                self.conflict.get_or_insert_with(|| {
                    format!("`{}` is declared as produced with conflicting flags", item)
                });
            }
            Some(_) => {}
            None => self.produces.push(produce),
        }
        self
    }

    /// Declare that this step records deferred work for `phase`.
    ///
    /// The step implicitly produces the phase marker item; the recorder is
    /// available through [`BuildContext::recorder`](crate::builder::BuildContext::recorder).
    pub fn recording(mut self, phase: ExecutionTime) -> Self {
        if let Some(existing) = self.recording {
            if existing != phase {
                self.conflict.get_or_insert_with(|| {
                    format!("records for both {} and {}", existing, phase)
                });
            }
            return self;
        }
        self.recording = Some(phase);
        self.produce(phase.marker_id(), false, false)
    }

    /// Declare a capability this step contributes.
    pub fn provides_capability(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.capabilities.contains(&name) {
            self.capabilities.push(name);
        }
        self.produce(ItemId::of::<CapabilityItem>(), false, false)
    }

    /// Finish registering the step.
    ///
    /// The caller's location is kept for duplicate-producer diagnostics.
    #[track_caller]
    pub fn build(self) -> Result<(), ChainBuildError> {
        let location = Location::caller();

        if self.id.trim().is_empty() {
            return Err(ChainBuildError::InvalidStep {
                step: format!("<unnamed step at {}>", location),
                reason: "step id must not be empty".to_string(),
            });
        }
        if let Some(reason) = self.conflict {
            return Err(ChainBuildError::InvalidStep {
                step: self.id,
                reason,
            });
        }
        if self.produces.is_empty() {
            tracing::debug!(
                "Step `{}` declares no produced items and will never be scheduled",
                self.id
            );
        }

        let index = self.chain.step_count();
        self.chain.push_step(StepDescriptor {
            index,
            id: self.id,
            step: self.step,
            consumes: self.consumes,
            produces: self.produces,
            recording: self.recording,
            capabilities: self.capabilities,
            location,
        });
        Ok(())
    }
}
