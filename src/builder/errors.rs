//! Chain build and execution error types.

use std::fmt;
use std::path::PathBuf;

use miette::Diagnostic as MietteDiagnostic;
use thiserror::Error;

use crate::util::diagnostic::Diagnostic;

/// Error while compiling a build chain. No partial chain is ever produced.
#[derive(Debug, Error, MietteDiagnostic)]
pub enum ChainBuildError {
    #[error("multiple {}producers of item `{item}`: `{first}` and `{second}`", overridable_prefix(.overridable))]
    #[diagnostic(
        code(buildchain::chain::duplicate_producer),
        help("A simple item may have only one producer; make it a multi item or remove one producer")
    )]
    DuplicateProducer {
        item: String,
        first: String,
        first_location: String,
        second: String,
        second_location: String,
        overridable: bool,
    },

    #[error("item `{item}` cannot be produced by `{step}`: it is an initial item")]
    #[diagnostic(code(buildchain::chain::initial_produced))]
    InitialProduced {
        item: String,
        step: String,
        location: String,
    },

    #[error("no producers for required item `{item}`, consumed by `{step}`")]
    #[diagnostic(
        code(buildchain::chain::missing_producer),
        help("Register a step producing the item, declare it initial, or consume it optionally")
    )]
    MissingProducer { item: String, step: String },

    #[error("cycle detected between build steps: {}", .steps.join(", "))]
    #[diagnostic(code(buildchain::chain::cycle))]
    Cycle {
        steps: Vec<String>,
        /// (producing step, item) pairs along the cycle
        path: Vec<(String, String)>,
    },

    #[error("invalid build step `{step}`: {reason}")]
    #[diagnostic(code(buildchain::chain::invalid_step))]
    InvalidStep { step: String, reason: String },

    #[error("provider `{provider}` failed to install its steps")]
    #[diagnostic(code(buildchain::chain::provider))]
    Provider {
        provider: String,
        #[source]
        source: Box<ChainBuildError>,
    },

    #[error("failed to create the build worker pool")]
    #[diagnostic(code(buildchain::chain::thread_pool))]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("failed to write debug graph to {}", .path.display())]
    #[diagnostic(code(buildchain::chain::graph_output))]
    GraphOutput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ChainBuildError {
    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            ChainBuildError::DuplicateProducer {
                item,
                first,
                first_location,
                second,
                second_location,
                ..
            } => Diagnostic::error(format!("item `{}` has more than one producer", item))
                .with_context(format!("`{}` registered at {}", first, first_location))
                .with_context(format!("`{}` registered at {}", second, second_location))
                .with_suggestion("Make the item a multi item if several producers are intended")
                .with_suggestion("Mark one producer overridable to let the other win"),

            ChainBuildError::InitialProduced {
                item,
                step,
                location,
            } => Diagnostic::error(format!(
                "`{}` produces `{}`, which is supplied as an initial item",
                step, item
            ))
            .with_context(format!("registered at {}", location))
            .with_suggestion(format!("Stop declaring `{}` as initial", item)),

            ChainBuildError::MissingProducer { item, step } => {
                Diagnostic::error(format!("nothing produces `{}`", item))
                    .with_context(format!("`{}` requires it", step))
                    .with_suggestion(format!("Register a step producing `{}`", item))
                    .with_suggestion(format!("Consume `{}` optionally in `{}`", item, step))
            }

            ChainBuildError::Cycle { steps, path } => {
                let mut diag = Diagnostic::error("cycle detected between build steps");
                for (step, item) in path {
                    diag = diag.with_context(format!("`{}` produces `{}`", step, item));
                }
                diag.with_context(format!("members: {}", steps.join(", ")))
                    .with_suggestion("Break the cycle by splitting one of the steps")
            }

            ChainBuildError::Provider { provider, source } => {
                let mut diag = source.to_diagnostic();
                diag = diag.with_context(format!("while installing provider `{}`", provider));
                diag
            }

            other => Diagnostic::error(other.to_string()),
        }
    }
}

/// Error raised inside a running step through its [`BuildContext`](crate::builder::BuildContext).
#[derive(Debug, Error)]
pub enum StepError {
    #[error("step `{step}` did not declare that it {action} `{item}`")]
    Undeclared {
        step: String,
        item: String,
        action: &'static str,
    },

    #[error("required item `{item}` was not produced for step `{step}`")]
    Absent { step: String, item: String },

    #[error("simple item `{item}` produced more than once (by `{step}`)")]
    AlreadyProduced { step: String, item: String },
}

/// A failed step and the error it raised.
#[derive(Debug)]
pub struct StepFailure {
    pub step: String,
    pub error: anyhow::Error,
}

impl fmt::Display for StepFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:#}", self.step, self.error)
    }
}

/// Error while executing a compiled chain.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("build failed: {} step(s) failed\n{}", .failures.len(), format_failures(.failures))]
    StepsFailed { failures: Vec<StepFailure> },

    #[error("item `{item}` is not an initial item of this chain")]
    NotInitial { item: String },

    #[error("simple initial item `{item}` supplied more than once")]
    DuplicateInitial { item: String },

    #[error("item `{item}` is not a final item of this chain")]
    NotFinal { item: String },

    #[error("final item `{item}` was not produced")]
    Missing { item: String },
}

impl BuildError {
    /// Ids of every failed step, in failure order.
    pub fn failed_steps(&self) -> Vec<&str> {
        match self {
            BuildError::StepsFailed { failures } => {
                failures.iter().map(|f| f.step.as_str()).collect()
            }
            _ => Vec::new(),
        }
    }

    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            BuildError::StepsFailed { failures } => {
                let mut diag =
                    Diagnostic::error(format!("{} build step(s) failed", failures.len()));
                for failure in failures {
                    diag = diag.with_context(failure.to_string());
                }
                diag
            }
            other => Diagnostic::error(other.to_string()),
        }
    }
}

fn overridable_prefix(overridable: &bool) -> &'static str {
    if *overridable {
        "overridable "
    } else {
        ""
    }
}

fn format_failures(failures: &[StepFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("  {}", f))
        .collect::<Vec<_>>()
        .join("\n")
}
