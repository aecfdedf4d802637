//! Core data structures for build chains.
//!
//! This module contains the foundational types everything else builds on:
//! - Build items and their identities
//! - Step descriptors and the step trait
//! - Deferred-execution recorders

pub mod item;
pub mod recorder;
pub mod step;

pub use item::{
    BuildItem, CapabilityItem, Cardinality, ItemId, ItemKind, Multi, MultiBuildItem, Simple,
    SimpleBuildItem,
};
pub use recorder::{ExecutionTime, MainRecorderItem, RecordedCall, Recorder, StaticRecorderItem};
pub use step::{BuildProducer, BuildStep, Consume, FnStep, Produce, StepDescriptor, StepSummary};
