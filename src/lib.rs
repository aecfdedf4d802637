//! buildchain - build-time dependency graph processing
//!
//! Build steps declare the typed build items they consume and produce. The
//! chain builder wires producers to consumers, drops steps nobody needs,
//! rejects duplicate producers, missing producers and cycles, and the
//! executor then runs every step exactly once on a worker pool, as soon as
//! all of its inputs exist.
//!
//! ```
//! use buildchain::{BuildChainBuilder, BuildItem, Simple};
//!
//! struct Greeting(String);
//! impl BuildItem for Greeting {
//!     type Kind = Simple;
//! }
//!
//! let mut builder = BuildChainBuilder::new();
//! builder.add_final::<Greeting>();
//! builder
//!     .add_step_fn("greet", |ctx| {
//!         ctx.produce(Greeting("hello".to_string()))?;
//!         Ok(())
//!     })
//!     .produces::<Greeting>()
//!     .build()?;
//!
//! let result = builder.build()?.execute()?;
//! assert_eq!(result.get::<Greeting>()?.0, "hello");
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! Steps written as `#[build_step]` methods are registered by generated code;
//! see [`codegen`].

pub mod builder;
pub mod codegen;
pub mod core;
pub mod ops;
pub mod util;

#[cfg(test)]
pub mod test_support;

pub use builder::{
    BuildChain, BuildChainBuilder, BuildContext, BuildError, BuildEvent, BuildProvider,
    BuildResult, BuildStepBuilder, ChainBuildError, Execution, ProviderRegistry, StepError,
    StepFailure,
};
pub use core::{
    BuildItem, BuildProducer, BuildStep, CapabilityItem, Cardinality, ExecutionTime, ItemId,
    MainRecorderItem, Multi, MultiBuildItem, Recorder, Simple, SimpleBuildItem,
    StaticRecorderItem, StepDescriptor,
};
pub use util::config::ChainConfig;

pub use buildchain_macros::{build_step, consume, produce, produce_weak, record};

// Used by generated code.
pub use anyhow;
pub use rayon::ThreadPool;
