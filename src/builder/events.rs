//! Execution event types.
//!
//! Listeners registered on an execution receive one event per step
//! transition, serializable as one JSON object per line.
//!
//! # Event Types
//!
//! - `step-started`: A step was handed to a worker
//! - `step-finished`: A step completed successfully
//! - `step-failed`: A step returned an error or panicked
//! - `build-finished`: The execution completed (success or failure)

use serde::Serialize;

/// An event emitted while a chain executes.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "reason")]
pub enum BuildEvent {
    /// A step started running.
    #[serde(rename = "step-started")]
    StepStarted {
        /// Execution name
        execution: String,
        /// Step identifier
        step: String,
    },

    /// A step completed successfully.
    #[serde(rename = "step-finished")]
    StepFinished {
        execution: String,
        step: String,
        /// Step duration in milliseconds
        duration_ms: u64,
    },

    /// A step failed.
    #[serde(rename = "step-failed")]
    StepFailed {
        execution: String,
        step: String,
        /// Rendered error chain
        message: String,
    },

    /// Execution completed (success or failure).
    #[serde(rename = "build-finished")]
    BuildFinished {
        execution: String,
        /// Whether every scheduled step succeeded
        success: bool,
        /// Total duration in milliseconds
        duration_ms: u64,
        /// Number of steps that completed
        steps_run: usize,
    },
}

impl BuildEvent {
    /// Create a step started event.
    pub fn started(execution: impl Into<String>, step: impl Into<String>) -> Self {
        BuildEvent::StepStarted {
            execution: execution.into(),
            step: step.into(),
        }
    }

    /// Create a step finished event.
    pub fn step_finished(
        execution: impl Into<String>,
        step: impl Into<String>,
        duration_ms: u64,
    ) -> Self {
        BuildEvent::StepFinished {
            execution: execution.into(),
            step: step.into(),
            duration_ms,
        }
    }

    /// Create a step failed event.
    pub fn failed(
        execution: impl Into<String>,
        step: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        BuildEvent::StepFailed {
            execution: execution.into(),
            step: step.into(),
            message: message.into(),
        }
    }

    /// Create a build finished event.
    pub fn finished(
        execution: impl Into<String>,
        success: bool,
        duration_ms: u64,
        steps_run: usize,
    ) -> Self {
        BuildEvent::BuildFinished {
            execution: execution.into(),
            success,
            duration_ms,
            steps_run,
        }
    }

    /// Step this event concerns, if any.
    pub fn step(&self) -> Option<&str> {
        match self {
            BuildEvent::StepStarted { step, .. }
            | BuildEvent::StepFinished { step, .. }
            | BuildEvent::StepFailed { step, .. } => Some(step),
            BuildEvent::BuildFinished { .. } => None,
        }
    }

    /// Serialize this event to a JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_started_serialization() {
        let event = BuildEvent::started("main", "web.routes");
        let json = event.to_json();
        assert!(json.contains("\"reason\":\"step-started\""));
        assert!(json.contains("\"step\":\"web.routes\""));
        assert_eq!(event.step(), Some("web.routes"));
    }

    #[test]
    fn test_finished_serialization() {
        let event = BuildEvent::finished("main", true, 2340, 12);
        let json = event.to_json();
        assert!(json.contains("\"reason\":\"build-finished\""));
        assert!(json.contains("\"success\":true"));
        assert!(json.contains("\"duration_ms\":2340"));
        assert!(json.contains("\"steps_run\":12"));
        assert_eq!(event.step(), None);
    }

    #[test]
    fn test_failed_serialization() {
        let event = BuildEvent::failed("main", "db.schema", "connection refused");
        let json = event.to_json();
        assert!(json.contains("\"reason\":\"step-failed\""));
        assert!(json.contains("connection refused"));
    }
}
