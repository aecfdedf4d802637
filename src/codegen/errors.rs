//! Step registration errors found while analysing sources.

use std::path::PathBuf;

use thiserror::Error;

use crate::core::item::Cardinality;
use crate::util::diagnostic::{suggestions, Diagnostic};

/// What is wrong with a step method.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepIssue {
    #[error("step methods must be `pub`")]
    NotPublic,

    #[error("step methods must take `&self`")]
    InvalidReceiver,

    #[error("step methods cannot be generic")]
    Generic,

    #[error("owner type `{0}` cannot be generic")]
    GenericOwner(String),

    #[error("primitive return type `{0}` is not a build item")]
    PrimitiveReturn(String),

    #[error("`{0}` is not a known build item")]
    UnknownItem(String),

    #[error("`{item}` is a {cardinality} item and cannot be {usage}")]
    CardinalityMismatch {
        item: String,
        cardinality: Cardinality,
        usage: &'static str,
    },

    #[error("unsupported parameter type `{0}`")]
    UnsupportedParameter(String),

    #[error("unsupported return type `{0}`")]
    UnsupportedReturn(String),

    #[error("`#[record]` requires a `&mut Recorder` parameter")]
    RecordWithoutRecorder,

    #[error("a `&mut Recorder` parameter requires `#[record(...)]`")]
    RecorderWithoutRecord,

    #[error("{0}")]
    InvalidAttribute(String),
}

/// A registration error. Every one is fatal to generation.
#[derive(Debug, Clone, Error)]
pub enum RegistrationError {
    #[error("{location}: invalid build step `{owner}::{method}`: {issue}")]
    Step {
        owner: String,
        method: String,
        location: String,
        issue: StepIssue,
    },

    #[error("{}:{line}:{column}: failed to parse source: {message}", .path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        column: usize,
        message: String,
    },

    #[error(
        "{} and {} both define module `{}`",
        .first.display(),
        .second.display(),
        module_label(.module)
    )]
    ModuleConflict {
        module: String,
        first: PathBuf,
        second: PathBuf,
    },
}

fn module_label(module: &str) -> &str {
    if module.is_empty() {
        "crate"
    } else {
        module
    }
}

impl RegistrationError {
    /// The step issue, for step errors.
    pub fn issue(&self) -> Option<&StepIssue> {
        match self {
            RegistrationError::Step { issue, .. } => Some(issue),
            RegistrationError::Parse { .. } | RegistrationError::ModuleConflict { .. } => None,
        }
    }

    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            RegistrationError::Step {
                owner,
                method,
                location,
                issue,
            } => {
                let diag = Diagnostic::error(format!(
                    "invalid build step `{}::{}`: {}",
                    owner, method, issue
                ))
                .with_location(location.clone());
                match issue {
                    StepIssue::UnknownItem(_) => diag.with_suggestion(suggestions::UNKNOWN_ITEM),
                    StepIssue::CardinalityMismatch {
                        cardinality: Cardinality::Multi,
                        ..
                    } => diag.with_suggestion("Consume multi items as `Vec<Arc<T>>`"),
                    StepIssue::CardinalityMismatch { .. } => {
                        diag.with_suggestion("Consume simple items as `&T` or `Arc<T>`")
                    }
                    _ => diag.with_suggestion(suggestions::STEP_SIGNATURE),
                }
            }
            RegistrationError::Parse {
                path,
                line,
                column,
                message,
            } => {
                Diagnostic::error(format!("failed to parse source: {}", message))
                    .with_location(format!("{}:{}:{}", path.display(), line, column))
            }
            RegistrationError::ModuleConflict {
                module,
                first,
                second,
            } => Diagnostic::error(format!(
                "two files define build steps for module `{}`",
                module_label(module)
            ))
            .with_context(first.display().to_string())
            .with_context(second.display().to_string())
            .with_suggestion("Keep the step owners of a module in one file"),
        }
    }
}

/// Every registration error found in one generation run.
#[derive(Debug, Error)]
#[error("{} build step registration error(s)", .0.len())]
pub struct RegistrationErrors(pub Vec<RegistrationError>);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_error_message() {
        let err = RegistrationError::Step {
            owner: "WebSteps".to_string(),
            method: "routes".to_string(),
            location: "src/web.rs:12".to_string(),
            issue: StepIssue::NotPublic,
        };
        assert_eq!(
            err.to_string(),
            "src/web.rs:12: invalid build step `WebSteps::routes`: step methods must be `pub`"
        );
    }

    #[test]
    fn test_unknown_item_suggests_build_item() {
        let err = RegistrationError::Step {
            owner: "WebSteps".to_string(),
            method: "routes".to_string(),
            location: "src/web.rs:12".to_string(),
            issue: StepIssue::UnknownItem("Config".to_string()),
        };
        let output = err.to_diagnostic().format(false);
        assert!(output.contains("`Config` is not a known build item"));
        assert!(output.contains("type Kind = Simple"));
    }

    #[test]
    fn test_module_conflict_names_both_files() {
        let err = RegistrationError::ModuleConflict {
            module: String::new(),
            first: PathBuf::from("src/lib.rs"),
            second: PathBuf::from("src/other.rs"),
        };
        assert_eq!(
            err.to_string(),
            "src/lib.rs and src/other.rs both define module `crate`"
        );
        assert!(err.issue().is_none());
    }
}
