//! Deferred-execution recorders.
//!
//! A step that emits initialization logic for a later phase asks for a
//! [`Recorder`]. What gets recorded is opaque to the chain; the chain only
//! creates the recorder, hands it to the step, and publishes it afterwards as a
//! phase marker item so downstream steps can tell that deferred work exists.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::item::{BuildItem, ItemId, Multi};

/// The phase recorded work runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionTime {
    /// Early, static initialization.
    StaticInit,
    /// Later, main/runtime initialization.
    RuntimeInit,
}

impl ExecutionTime {
    /// The marker item announcing recorded work for this phase.
    pub fn marker_id(self) -> ItemId {
        match self {
            ExecutionTime::StaticInit => ItemId::of::<StaticRecorderItem>(),
            ExecutionTime::RuntimeInit => ItemId::of::<MainRecorderItem>(),
        }
    }

    /// Parse the spelling used in `#[record(...)]` attributes.
    pub fn from_attr(s: &str) -> Option<Self> {
        match s {
            "static_init" | "StaticInit" | "STATIC_INIT" => Some(ExecutionTime::StaticInit),
            "runtime_init" | "RuntimeInit" | "RUNTIME_INIT" => Some(ExecutionTime::RuntimeInit),
            _ => None,
        }
    }
}

impl fmt::Display for ExecutionTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionTime::StaticInit => write!(f, "static_init"),
            ExecutionTime::RuntimeInit => write!(f, "runtime_init"),
        }
    }
}

/// A single recorded invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedCall {
    pub name: String,
    pub args: Vec<String>,
}

/// Opaque sink for deferred initialization logic.
#[derive(Debug, Clone)]
pub struct Recorder {
    phase: ExecutionTime,
    step: String,
    calls: Vec<RecordedCall>,
}

impl Recorder {
    pub fn new(phase: ExecutionTime, step: impl Into<String>) -> Self {
        Recorder {
            phase,
            step: step.into(),
            calls: Vec::new(),
        }
    }

    /// Record an invocation to replay in this recorder's phase.
    pub fn record<I, S>(&mut self, name: impl Into<String>, args: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.calls.push(RecordedCall {
            name: name.into(),
            args: args.into_iter().map(Into::into).collect(),
        });
    }

    pub fn phase(&self) -> ExecutionTime {
        self.phase
    }

    /// Id of the step that owns this recorder.
    pub fn step(&self) -> &str {
        &self.step
    }

    pub fn calls(&self) -> &[RecordedCall] {
        &self.calls
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}

/// Recorded work for [`ExecutionTime::StaticInit`].
#[derive(Debug, Clone)]
pub struct StaticRecorderItem {
    recorder: Arc<Recorder>,
}

impl StaticRecorderItem {
    pub fn new(recorder: Recorder) -> Self {
        StaticRecorderItem {
            recorder: Arc::new(recorder),
        }
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }
}

impl BuildItem for StaticRecorderItem {
    type Kind = Multi;
}

/// Recorded work for [`ExecutionTime::RuntimeInit`].
#[derive(Debug, Clone)]
pub struct MainRecorderItem {
    recorder: Arc<Recorder>,
}

impl MainRecorderItem {
    pub fn new(recorder: Recorder) -> Self {
        MainRecorderItem {
            recorder: Arc::new(recorder),
        }
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }
}

impl BuildItem for MainRecorderItem {
    type Kind = Multi;
}
