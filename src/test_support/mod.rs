//! Test utilities for buildchain unit tests.
//!
//! Source-tree fixtures for the generator, plus an item, a step helper and
//! an event collector shared by the execution tests.

pub mod fixtures;

use std::sync::{Arc, Mutex};

use crate::builder::{BuildChainBuilder, BuildContext, BuildEvent};
use crate::core::item::{BuildItem, Multi};

pub use fixtures::*;

/// A multi item; each step contributes its own.
#[derive(Debug, Clone, PartialEq)]
pub struct Contribution(pub String);

impl BuildItem for Contribution {
    type Kind = Multi;
}

/// Register a step producing one `Contribution` named after the step.
pub fn contribute(builder: &mut BuildChainBuilder, id: &str) {
    let name = id.to_string();
    builder
        .add_step_fn(id, move |ctx: &mut BuildContext<'_>| {
            ctx.produce(Contribution(name.clone()))?;
            Ok(())
        })
        .produces::<Contribution>()
        .build()
        .unwrap();
}

/// Collects every event an execution emits.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<BuildEvent>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listener(&self) -> impl Fn(&BuildEvent) + Send + Sync + 'static {
        let events = Arc::clone(&self.events);
        move |event: &BuildEvent| events.lock().unwrap().push(event.clone())
    }

    pub fn events(&self) -> Vec<BuildEvent> {
        self.events.lock().unwrap().clone()
    }
}
