//! Parallel execution of a compiled chain.
//!
//! Steps run on the chain's worker pool inside one `rayon` scope. Each step
//! has a counter of unfinished upstream steps; a finishing step decrements the
//! counters of its dependents and spawns every dependent that reaches zero.
//! The scope returns once no spawned step is left, which is the completion
//! barrier for the whole execution.
//!
//! After the first failure no new step is started. Steps already running
//! finish normally and their failures are collected too.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use anyhow::anyhow;
use rayon::Scope;

use crate::builder::chain::BuildChain;
use crate::builder::context::{BuildContext, ItemStore, ItemValue};
use crate::builder::errors::{BuildError, StepFailure};
use crate::builder::events::BuildEvent;
use crate::builder::result::BuildResult;
use crate::core::item::{BuildItem, ItemId};

type Listener = Arc<dyn Fn(&BuildEvent) + Send + Sync>;

/// One run of a [`BuildChain`], configured before it starts.
#[must_use = "an execution does nothing until `execute` is called"]
pub struct Execution<'c> {
    chain: &'c BuildChain,
    name: String,
    initial: HashMap<ItemId, Vec<ItemValue>>,
    listener: Option<Listener>,
}

impl<'c> Execution<'c> {
    pub(crate) fn new(chain: &'c BuildChain, name: String) -> Self {
        Execution {
            chain,
            name,
            initial: HashMap::new(),
            listener: None,
        }
    }

    /// Supply a value of an item declared initial on the chain builder.
    pub fn produce<T: BuildItem>(mut self, item: T) -> Result<Self, BuildError> {
        let id = ItemId::of::<T>();
        if !self.chain.is_initial(id) {
            return Err(BuildError::NotInitial {
                item: id.to_string(),
            });
        }
        let values = self.initial.entry(id).or_default();
        if !id.is_multi() && !values.is_empty() {
            return Err(BuildError::DuplicateInitial {
                item: id.to_string(),
            });
        }
        values.push(Arc::new(item));
        Ok(self)
    }

    /// Receive an event for every step transition and for completion.
    pub fn on_event<F>(mut self, listener: F) -> Self
    where
        F: Fn(&BuildEvent) + Send + Sync + 'static,
    {
        self.listener = Some(Arc::new(listener));
        self
    }

    /// Run every step of the chain and collect the final items.
    pub fn execute(self) -> Result<BuildResult, BuildError> {
        let chain = self.chain;
        let started = Instant::now();
        tracing::debug!(
            "Executing `{}`: {} step(s) on {} worker(s)",
            self.name,
            chain.step_count(),
            chain.worker_threads()
        );

        let store = ItemStore::new(chain.items().iter().copied());
        for (id, values) in self.initial {
            for value in values {
                store.put(id, value);
            }
        }

        let state = ExecutionState {
            chain,
            name: self.name,
            store,
            remaining: chain
                .steps()
                .iter()
                .map(|s| AtomicUsize::new(s.dependency_count()))
                .collect(),
            failed: AtomicBool::new(false),
            failures: Mutex::new(Vec::new()),
            completed: AtomicUsize::new(0),
            listener: self.listener,
        };

        chain.pool().scope(|scope| {
            let state = &state;
            for (idx, step) in chain.steps().iter().enumerate() {
                if step.dependency_count() == 0 {
                    scope.spawn(move |scope| run_step(scope, state, idx));
                }
            }
        });

        let ExecutionState {
            name,
            store,
            failures,
            completed,
            listener,
            ..
        } = state;
        let failures = failures.into_inner().unwrap_or_else(PoisonError::into_inner);
        let steps_run = completed.into_inner();
        let duration = started.elapsed();
        let success = failures.is_empty();

        if let Some(listener) = &listener {
            listener(&BuildEvent::finished(
                name.as_str(),
                success,
                duration.as_millis() as u64,
                steps_run,
            ));
        }

        if !success {
            tracing::debug!("Execution `{}` failed in {} step(s)", name, failures.len());
            return Err(BuildError::StepsFailed { failures });
        }

        tracing::info!(
            "Execution `{}` finished: {} step(s) in {:.2}s",
            name,
            steps_run,
            duration.as_secs_f64()
        );
        Ok(BuildResult::new(
            store.into_values(chain.finals()),
            chain.finals().clone(),
            duration,
            steps_run,
        ))
    }
}

struct ExecutionState<'c> {
    chain: &'c BuildChain,
    name: String,
    store: ItemStore,
    remaining: Vec<AtomicUsize>,
    failed: AtomicBool,
    failures: Mutex<Vec<StepFailure>>,
    completed: AtomicUsize,
    listener: Option<Listener>,
}

impl ExecutionState<'_> {
    fn emit(&self, event: BuildEvent) {
        if let Some(listener) = &self.listener {
            listener(&event);
        }
    }

    fn fail(&self, step: &str, error: anyhow::Error) {
        self.failed.store(true, Ordering::Release);
        self.emit(BuildEvent::failed(
            self.name.as_str(),
            step,
            format!("{:#}", error),
        ));
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(StepFailure {
                step: step.to_string(),
                error,
            });
    }
}

fn run_step<'s, 'c: 's>(scope: &Scope<'s>, state: &'s ExecutionState<'c>, idx: usize) {
    if state.failed.load(Ordering::Acquire) {
        return;
    }

    let info = &state.chain.steps()[idx];
    let descriptor = info.descriptor();
    let step_id = descriptor.id();
    tracing::debug!("Running step `{}`", step_id);
    state.emit(BuildEvent::started(state.name.as_str(), step_id));
    let started = Instant::now();

    let mut ctx = BuildContext::new(descriptor, &state.store, &state.name, state.chain.pool());
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| descriptor.step.execute(&mut ctx)));
    let result = match outcome {
        Ok(Ok(())) => ctx.finish().map_err(anyhow::Error::from),
        Ok(Err(e)) => Err(e),
        Err(payload) => Err(anyhow!("step panicked: {}", panic_message(payload.as_ref()))),
    };

    if let Err(e) = result {
        tracing::debug!("Step `{}` failed: {:#}", step_id, e);
        state.fail(step_id, e);
        return;
    }

    state.completed.fetch_add(1, Ordering::Relaxed);
    state.emit(BuildEvent::step_finished(
        state.name.as_str(),
        step_id,
        started.elapsed().as_millis() as u64,
    ));

    for &dependent in info.dependents() {
        if state.remaining[dependent].fetch_sub(1, Ordering::AcqRel) == 1 {
            scope.spawn(move |scope| run_step(scope, state, dependent));
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "unknown panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::chain_builder::BuildChainBuilder;
    use crate::builder::errors::StepError;
    use crate::core::item::{CapabilityItem, Multi, Simple};
    use crate::core::recorder::{ExecutionTime, MainRecorderItem, StaticRecorderItem};
    use crate::test_support::{contribute, Contribution, EventLog};

    #[derive(Debug)]
    struct Input(u32);
    impl BuildItem for Input {
        type Kind = Simple;
    }

    #[derive(Debug)]
    struct Output(u32);
    impl BuildItem for Output {
        type Kind = Simple;
    }

    struct Part(u32);
    impl BuildItem for Part {
        type Kind = Multi;
    }

    #[test]
    fn test_initial_item_flows_to_final() {
        let mut builder = BuildChainBuilder::new();
        builder.add_initial::<Input>().add_final::<Output>();
        builder
            .add_step_fn("double", |ctx| {
                let input = ctx.consume::<Input>()?;
                ctx.produce(Output(input.0 * 2))?;
                Ok(())
            })
            .consumes::<Input>()
            .produces::<Output>()
            .build()
            .unwrap();

        let chain = builder.build().unwrap();
        let result = chain
            .execution("test")
            .produce(Input(21))
            .unwrap()
            .execute()
            .unwrap();
        assert_eq!(result.get::<Output>().unwrap().0, 42);
        assert_eq!(result.steps_run(), 1);
    }

    #[test]
    fn test_non_initial_item_rejected() {
        let mut builder = BuildChainBuilder::new();
        builder.add_final::<Output>();
        builder
            .add_step_fn("out", |ctx| Ok(ctx.produce(Output(1))?))
            .produces::<Output>()
            .build()
            .unwrap();

        let chain = builder.build().unwrap();
        let err = chain.execution("test").produce(Input(1)).err().unwrap();
        assert!(matches!(err, BuildError::NotInitial { .. }));
    }

    #[test]
    fn test_duplicate_simple_initial_rejected() {
        let mut builder = BuildChainBuilder::new();
        builder.add_initial::<Input>();
        let chain = builder.build().unwrap();

        let err = chain
            .execution("test")
            .produce(Input(1))
            .unwrap()
            .produce(Input(2))
            .err()
            .unwrap();
        assert!(matches!(err, BuildError::DuplicateInitial { .. }));
    }

    #[test]
    fn test_panicking_step_reported() {
        let mut builder = BuildChainBuilder::new();
        builder.add_final::<Output>();
        builder
            .add_step_fn("explode", |_ctx| panic!("kaboom"))
            .produces::<Output>()
            .build()
            .unwrap();

        let err = builder.build().unwrap().execute().unwrap_err();
        assert_eq!(err.failed_steps(), vec!["explode"]);
        assert!(err.to_string().contains("kaboom"));
    }

    #[test]
    fn test_dependents_not_started_after_failure() {
        let ran = Arc::new(AtomicUsize::new(0));
        let mut builder = BuildChainBuilder::new();
        builder.add_final::<Output>();
        builder
            .add_step_fn("parts", |_ctx| anyhow::bail!("no parts"))
            .produces::<Part>()
            .build()
            .unwrap();
        let counter = Arc::clone(&ran);
        builder
            .add_step_fn("assemble", move |ctx| {
                counter.fetch_add(1, Ordering::SeqCst);
                ctx.produce(Output(0))?;
                Ok(())
            })
            .consumes::<Part>()
            .produces::<Output>()
            .build()
            .unwrap();

        let err = builder.build().unwrap().execute().unwrap_err();
        assert_eq!(err.failed_steps(), vec!["parts"]);
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_undeclared_produce_fails_step() {
        let mut builder = BuildChainBuilder::new();
        builder.add_final::<Output>();
        builder
            .add_step_fn("sneaky", |ctx| {
                ctx.produce(Input(1))?;
                Ok(())
            })
            .produces::<Output>()
            .build()
            .unwrap();

        let err = builder.build().unwrap().execute().unwrap_err();
        assert!(err.to_string().contains("did not declare that it produces `Input`"));
    }

    #[test]
    fn test_events_delivered() {
        let log = EventLog::new();
        let mut builder = BuildChainBuilder::new();
        builder.add_final::<Output>();
        builder
            .add_step_fn("out", |ctx| Ok(ctx.produce(Output(1))?))
            .produces::<Output>()
            .build()
            .unwrap();

        builder
            .build()
            .unwrap()
            .execution("events")
            .on_event(log.listener())
            .execute()
            .unwrap();

        let events: Vec<String> = log.events().iter().map(BuildEvent::to_json).collect();
        assert_eq!(events.len(), 3);
        assert!(events[0].contains("step-started"));
        assert!(events[1].contains("step-finished"));
        assert!(events[2].contains("build-finished"));
    }

    #[test]
    fn test_multi_contributions_collected() {
        let mut builder = BuildChainBuilder::new();
        builder.add_final::<Contribution>();
        for id in ["a", "b", "c", "d"] {
            contribute(&mut builder, id);
        }

        let result = builder.build().unwrap().execute().unwrap();
        let mut names: Vec<String> = result
            .get_all::<Contribution>()
            .unwrap()
            .iter()
            .map(|c| c.0.clone())
            .collect();
        names.sort();
        assert_eq!(names, vec!["a", "b", "c", "d"]);
        assert_eq!(result.steps_run(), 4);
    }

    #[test]
    fn test_recording_steps_publish_recorders() {
        let mut builder = BuildChainBuilder::new();
        builder
            .add_final::<StaticRecorderItem>()
            .add_final::<MainRecorderItem>();
        builder
            .add_step_fn("setup", |ctx| {
                let recorder = ctx.recorder()?;
                recorder.record("open_pool", ["8".to_string()]);
                recorder.record("warm_cache", Vec::<String>::new());
                Ok(())
            })
            .recording(ExecutionTime::StaticInit)
            .build()
            .unwrap();
        builder
            .add_step_fn("idle", |_ctx| Ok(()))
            .recording(ExecutionTime::RuntimeInit)
            .build()
            .unwrap();

        let result = builder.build().unwrap().execute().unwrap();

        let statics = result.get_all::<StaticRecorderItem>().unwrap();
        assert_eq!(statics.len(), 1);
        let recorder = statics[0].recorder();
        assert_eq!(recorder.step(), "setup");
        assert_eq!(recorder.phase(), ExecutionTime::StaticInit);
        let calls: Vec<&str> = recorder.calls().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(calls, vec!["open_pool", "warm_cache"]);

        let mains = result.get_all::<MainRecorderItem>().unwrap();
        assert_eq!(mains.len(), 1);
        assert_eq!(mains[0].recorder().step(), "idle");
        assert!(mains[0].recorder().is_empty());
    }

    #[test]
    fn test_capability_items_produced() {
        let mut builder = BuildChainBuilder::new();
        builder.add_final::<CapabilityItem>();
        builder
            .add_step_fn("web", |_ctx| Ok(()))
            .provides_capability("io.web")
            .provides_capability("io.tls")
            .build()
            .unwrap();
        builder
            .add_step_fn("db", |_ctx| Ok(()))
            .provides_capability("io.db")
            .build()
            .unwrap();

        let result = builder.build().unwrap().execute().unwrap();
        let mut names: Vec<String> = result
            .get_all::<CapabilityItem>()
            .unwrap()
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        names.sort();
        assert_eq!(names, vec!["io.db", "io.tls", "io.web"]);
    }

    #[test]
    fn test_recorder_requires_recording_declaration() {
        let mut builder = BuildChainBuilder::new();
        builder.add_final::<Output>();
        builder
            .add_step_fn("plain", |ctx| {
                ctx.recorder()?.record("never", Vec::<String>::new());
                ctx.produce(Output(1))?;
                Ok(())
            })
            .produces::<Output>()
            .build()
            .unwrap();

        match builder.build().unwrap().execute().unwrap_err() {
            BuildError::StepsFailed { failures } => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].step, "plain");
                assert!(matches!(
                    failures[0].error.downcast_ref::<StepError>(),
                    Some(StepError::Undeclared { item, .. }) if item == "Recorder"
                ));
            }
            other => panic!("unexpected error: {}", other),
        }
    }
}
