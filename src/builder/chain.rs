//! The compiled, immutable build chain.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use rayon::ThreadPool;

use crate::builder::errors::{BuildError, ChainBuildError};
use crate::builder::executor::Execution;
use crate::builder::graph::{self, CompiledGraph};
use crate::builder::result::BuildResult;
use crate::core::item::ItemId;
use crate::core::step::StepDescriptor;

/// A step as scheduled by the chain.
#[derive(Debug, Clone)]
pub struct StepInfo {
    descriptor: StepDescriptor,
    dependency_count: usize,
    pub(crate) dependents: Vec<usize>,
}

impl StepInfo {
    pub(crate) fn new(descriptor: StepDescriptor, dependency_count: usize) -> Self {
        StepInfo {
            descriptor,
            dependency_count,
            dependents: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        self.descriptor.id()
    }

    pub fn descriptor(&self) -> &StepDescriptor {
        &self.descriptor
    }

    /// Number of distinct steps that must finish before this one starts.
    pub fn dependency_count(&self) -> usize {
        self.dependency_count
    }

    /// Chain indices of the steps waiting on this one.
    pub fn dependents(&self) -> &[usize] {
        &self.dependents
    }
}

/// A validated chain, ready to be executed any number of times.
pub struct BuildChain {
    steps: Vec<StepInfo>,
    items: Vec<ItemId>,
    initial: HashSet<ItemId>,
    finals: HashSet<ItemId>,
    pool: Arc<ThreadPool>,
}

impl BuildChain {
    pub(crate) fn new(
        compiled: CompiledGraph,
        initial: HashSet<ItemId>,
        finals: HashSet<ItemId>,
        pool: Arc<ThreadPool>,
    ) -> Self {
        BuildChain {
            steps: compiled.steps,
            items: compiled.items,
            initial,
            finals,
            pool,
        }
    }

    /// Scheduled steps, in registration order.
    pub fn steps(&self) -> &[StepInfo] {
        &self.steps
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn contains_step(&self, id: &str) -> bool {
        self.steps.iter().any(|s| s.id() == id)
    }

    /// Steps with no upstream dependency.
    pub fn start_steps(&self) -> impl Iterator<Item = &StepInfo> {
        self.steps.iter().filter(|s| s.dependency_count == 0)
    }

    /// Steps nothing in the chain waits on.
    pub fn end_steps(&self) -> impl Iterator<Item = &StepInfo> {
        self.steps.iter().filter(|s| s.dependents.is_empty())
    }

    pub fn is_initial(&self, item: ItemId) -> bool {
        self.initial.contains(&item)
    }

    pub fn is_final(&self, item: ItemId) -> bool {
        self.finals.contains(&item)
    }

    pub fn worker_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Start configuring an execution.
    pub fn execution(&self, name: impl Into<String>) -> Execution<'_> {
        Execution::new(self, name.into())
    }

    /// Execute the chain with no initial items.
    pub fn execute(&self) -> Result<BuildResult, BuildError> {
        self.execution("main").execute()
    }

    /// Render the chain as a Graphviz digraph.
    pub fn to_dot(&self) -> String {
        graph::render_dot(&self.steps)
    }

    /// Write [`to_dot`](Self::to_dot) output to `path`.
    pub fn write_dot(&self, path: &Path) -> Result<(), ChainBuildError> {
        std::fs::write(path, self.to_dot()).map_err(|source| ChainBuildError::GraphOutput {
            path: path.to_path_buf(),
            source,
        })
    }

    pub(crate) fn items(&self) -> &[ItemId] {
        &self.items
    }

    pub(crate) fn finals(&self) -> &HashSet<ItemId> {
        &self.finals
    }

    pub(crate) fn pool(&self) -> &ThreadPool {
        &self.pool
    }
}

impl fmt::Debug for BuildChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildChain")
            .field("steps", &self.steps.iter().map(|s| s.id()).collect::<Vec<_>>())
            .field("workers", &self.worker_threads())
            .finish()
    }
}
