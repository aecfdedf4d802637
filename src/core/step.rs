//! Build steps and their descriptors.
//!
//! A [`BuildStep`] is an opaque unit of work. What the chain builder knows
//! about it lives in a [`StepDescriptor`]: the items it consumes and produces,
//! whether it records deferred work, and the capabilities it contributes.

use std::fmt;
use std::panic::Location;
use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;

use crate::builder::context::BuildContext;
use crate::core::item::{BuildItem, Cardinality, ItemId};
use crate::core::recorder::ExecutionTime;

/// A unit of build work.
pub trait BuildStep: Send + Sync {
    /// Stable, human-readable identity used in diagnostics and events.
    fn id(&self) -> String;

    /// Run the step, consuming and producing items through `ctx`.
    fn execute(&self, ctx: &mut BuildContext<'_>) -> Result<()>;
}

/// A build step backed by a closure.
pub struct FnStep<F> {
    id: String,
    f: F,
}

impl<F> FnStep<F> {
    pub fn new(id: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut BuildContext<'_>) -> Result<()> + Send + Sync,
    {
        FnStep { id: id.into(), f }
    }
}

impl<F> BuildStep for FnStep<F>
where
    F: Fn(&mut BuildContext<'_>) -> Result<()> + Send + Sync,
{
    fn id(&self) -> String {
        self.id.clone()
    }

    fn execute(&self, ctx: &mut BuildContext<'_>) -> Result<()> {
        (self.f)(ctx)
    }
}

/// A declared consumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Consume {
    pub item: ItemId,
    pub optional: bool,
}

/// A declared production.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Produce {
    pub item: ItemId,
    /// Producing this item does not pull the step into the chain.
    pub weak: bool,
    /// Only used when no non-overridable producer exists.
    pub overridable: bool,
}

/// Everything the chain builder needs to know about one step.
#[derive(Clone)]
pub struct StepDescriptor {
    pub(crate) index: usize,
    pub(crate) id: String,
    pub(crate) step: Arc<dyn BuildStep>,
    pub(crate) consumes: Vec<Consume>,
    pub(crate) produces: Vec<Produce>,
    pub(crate) recording: Option<ExecutionTime>,
    pub(crate) capabilities: Vec<String>,
    pub(crate) location: &'static Location<'static>,
}

impl StepDescriptor {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Registration order within the builder.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn consumes(&self) -> &[Consume] {
        &self.consumes
    }

    pub fn produces(&self) -> &[Produce] {
        &self.produces
    }

    pub fn recording(&self) -> Option<ExecutionTime> {
        self.recording
    }

    pub fn capabilities(&self) -> &[String] {
        &self.capabilities
    }

    /// Source location of the registration call.
    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }

    pub fn consume_of(&self, item: ItemId) -> Option<&Consume> {
        self.consumes.iter().find(|c| c.item == item)
    }

    pub fn produce_of(&self, item: ItemId) -> Option<&Produce> {
        self.produces.iter().find(|p| p.item == item)
    }

    /// Serializable summary of the descriptor.
    pub fn summary(&self) -> StepSummary {
        StepSummary {
            id: self.id.clone(),
            consumes: self
                .consumes
                .iter()
                .map(|c| ItemRef {
                    item: c.item.short_name().to_string(),
                    cardinality: c.item.cardinality(),
                    optional: c.optional,
                })
                .collect(),
            produces: self
                .produces
                .iter()
                .map(|p| ItemRef {
                    item: p.item.short_name().to_string(),
                    cardinality: p.item.cardinality(),
                    optional: false,
                })
                .collect(),
            recording: self.recording,
            capabilities: self.capabilities.clone(),
        }
    }
}

impl fmt::Debug for StepDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepDescriptor")
            .field("id", &self.id)
            .field("consumes", &self.consumes)
            .field("produces", &self.produces)
            .field("recording", &self.recording)
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

impl fmt::Display for StepDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// Item reference inside a [`StepSummary`].
#[derive(Debug, Clone, Serialize)]
pub struct ItemRef {
    pub item: String,
    pub cardinality: Cardinality,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub optional: bool,
}

/// Serializable view of a step descriptor.
#[derive(Debug, Clone, Serialize)]
pub struct StepSummary {
    pub id: String,
    pub consumes: Vec<ItemRef>,
    pub produces: Vec<ItemRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recording: Option<ExecutionTime>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub capabilities: Vec<String>,
}

/// Producer handle injected into generated steps.
///
/// Items are buffered and handed to the build context once the step method
/// returns.
#[derive(Debug)]
pub struct BuildProducer<T: BuildItem> {
    items: Vec<T>,
}

impl<T: BuildItem> BuildProducer<T> {
    pub fn new() -> Self {
        BuildProducer { items: Vec::new() }
    }

    pub fn produce(&mut self, item: T) {
        self.items.push(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }
}

impl<T: BuildItem> Default for BuildProducer<T> {
    fn default() -> Self {
        BuildProducer::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::item::Multi;

    struct Bean(&'static str);
    impl BuildItem for Bean {
        type Kind = Multi;
    }

    #[test]
    fn test_build_producer_buffers_items() {
        let mut producer = BuildProducer::<Bean>::new();
        assert!(producer.is_empty());

        producer.produce(Bean("a"));
        producer.produce(Bean("b"));

        let items = producer.into_items();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].0, "b");
    }

    #[test]
    fn test_fn_step_id() {
        let step = FnStep::new("ext.setup", |_ctx| Ok(()));
        assert_eq!(step.id(), "ext.setup");
    }
}
