//! Build chain construction and execution.
//!
//! This module turns registered steps into a validated chain and runs it:
//! - `chain_builder` / `step_builder`: step registration
//! - `graph`: inclusion, validation and dependency counts
//! - `executor` / `context` / `result`: parallel execution and item storage
//! - `provider`: grouped step registration

pub mod chain;
pub mod chain_builder;
pub mod context;
pub mod errors;
pub mod events;
pub mod executor;
mod graph;
pub mod provider;
pub mod result;
pub mod step_builder;

pub use chain::{BuildChain, StepInfo};
pub use chain_builder::BuildChainBuilder;
pub use context::BuildContext;
pub use errors::{BuildError, ChainBuildError, StepError, StepFailure};
pub use events::BuildEvent;
pub use executor::Execution;
pub use provider::{BuildProvider, ProviderRegistry};
pub use result::BuildResult;
pub use step_builder::BuildStepBuilder;
