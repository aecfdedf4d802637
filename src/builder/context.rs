//! Per-execution item storage and the per-step build context.
//!
//! The [`ItemStore`] is the only state shared between running steps. It is
//! created with one slot per item type known to the chain, so no lock guards
//! the map itself:
//! - simple items live in a `OnceLock` (written at most once)
//! - multi items live in a `Mutex<Vec<_>>` (appended to by many producers)
//!
//! A consumer only reads a slot after the executor has seen every producer of
//! that item complete, which gives the happens-before edge for the read.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use rayon::ThreadPool;

use crate::builder::errors::StepError;
use crate::core::item::{
    BuildItem, CapabilityItem, Cardinality, ItemId, MultiBuildItem, SimpleBuildItem,
};
use crate::core::recorder::{ExecutionTime, MainRecorderItem, Recorder, StaticRecorderItem};
use crate::core::step::StepDescriptor;

pub(crate) type ItemValue = Arc<dyn Any + Send + Sync>;

enum Slot {
    Simple(OnceLock<ItemValue>),
    Multi(Mutex<Vec<ItemValue>>),
}

/// Shared result store for one chain execution.
pub(crate) struct ItemStore {
    slots: HashMap<ItemId, Slot>,
}

impl ItemStore {
    pub(crate) fn new(items: impl IntoIterator<Item = ItemId>) -> Self {
        let slots = items
            .into_iter()
            .map(|id| {
                let slot = match id.cardinality() {
                    Cardinality::Simple => Slot::Simple(OnceLock::new()),
                    Cardinality::Multi => Slot::Multi(Mutex::new(Vec::new())),
                };
                (id, slot)
            })
            .collect();
        ItemStore { slots }
    }

    /// Store a value. Returns `false` when a simple slot was already filled.
    pub(crate) fn put(&self, id: ItemId, value: ItemValue) -> bool {
        match self.slots.get(&id) {
            Some(Slot::Simple(cell)) => cell.set(value).is_ok(),
            Some(Slot::Multi(values)) => {
                values
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(value);
                true
            }
            None => {
                // Every declared item gets a slot; an unknown id means a bug in
                // chain compilation, not a step error.
                tracing::error!("No slot for item `{}`; value dropped", id);
                true
            }
        }
    }

    fn get_simple(&self, id: ItemId) -> Option<ItemValue> {
        match self.slots.get(&id) {
            Some(Slot::Simple(cell)) => cell.get().cloned(),
            _ => None,
        }
    }

    fn get_multi(&self, id: ItemId) -> Vec<ItemValue> {
        match self.slots.get(&id) {
            Some(Slot::Multi(values)) => values
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
            _ => Vec::new(),
        }
    }

    /// Keep only the values of `keep`, dropping every intermediate item.
    pub(crate) fn into_values(self, keep: &HashSet<ItemId>) -> HashMap<ItemId, Vec<ItemValue>> {
        self.slots
            .into_iter()
            .filter(|(id, _)| keep.contains(id))
            .map(|(id, slot)| {
                let values = match slot {
                    Slot::Simple(cell) => cell.into_inner().into_iter().collect(),
                    Slot::Multi(values) => {
                        values.into_inner().unwrap_or_else(PoisonError::into_inner)
                    }
                };
                (id, values)
            })
            .collect()
    }
}

pub(crate) fn downcast<T: BuildItem>(value: ItemValue) -> Option<Arc<T>> {
    value.downcast::<T>().ok()
}

/// The view a running step has of its execution.
///
/// Every consume and produce is checked against the step's declared contract.
pub struct BuildContext<'a> {
    descriptor: &'a StepDescriptor,
    store: &'a ItemStore,
    execution: &'a str,
    pool: &'a ThreadPool,
    recorder: Option<Recorder>,
}

impl<'a> BuildContext<'a> {
    pub(crate) fn new(
        descriptor: &'a StepDescriptor,
        store: &'a ItemStore,
        execution: &'a str,
        pool: &'a ThreadPool,
    ) -> Self {
        BuildContext {
            descriptor,
            store,
            execution,
            pool,
            recorder: None,
        }
    }

    /// Id of the running step.
    pub fn step_id(&self) -> &str {
        self.descriptor.id()
    }

    /// Name of the execution this step runs in.
    pub fn execution_name(&self) -> &str {
        self.execution
    }

    /// Consume a required simple item.
    pub fn consume<T: SimpleBuildItem>(&self) -> Result<Arc<T>, StepError> {
        let id = ItemId::of::<T>();
        self.check_consumes(id)?;
        self.store
            .get_simple(id)
            .and_then(downcast::<T>)
            .ok_or_else(|| StepError::Absent {
                step: self.descriptor.id().to_string(),
                item: id.to_string(),
            })
    }

    /// Consume a simple item that may not have been produced.
    pub fn consume_optional<T: SimpleBuildItem>(&self) -> Result<Option<Arc<T>>, StepError> {
        let id = ItemId::of::<T>();
        self.check_consumes(id)?;
        Ok(self.store.get_simple(id).and_then(downcast::<T>))
    }

    /// Consume every contributed value of a multi item, in no particular order.
    pub fn consume_multi<T: MultiBuildItem>(&self) -> Result<Vec<Arc<T>>, StepError> {
        let id = ItemId::of::<T>();
        self.check_consumes(id)?;
        Ok(self
            .store
            .get_multi(id)
            .into_iter()
            .filter_map(downcast::<T>)
            .collect())
    }

    /// Produce an item. Simple items may be produced once per execution.
    pub fn produce<T: BuildItem>(&mut self, item: T) -> Result<(), StepError> {
        let id = ItemId::of::<T>();
        self.check_produces(id)?;
        self.put(id, Arc::new(item))
    }

    /// Produce several items of the same type.
    pub fn produce_all<T, I>(&mut self, items: I) -> Result<(), StepError>
    where
        T: BuildItem,
        I: IntoIterator<Item = T>,
    {
        for item in items {
            self.produce(item)?;
        }
        Ok(())
    }

    /// The recorder for this step's deferred work, created on first use.
    pub fn recorder(&mut self) -> Result<&mut Recorder, StepError> {
        let phase = self.descriptor.recording().ok_or_else(|| StepError::Undeclared {
            step: self.descriptor.id().to_string(),
            item: "Recorder".to_string(),
            action: "records deferred work with",
        })?;
        let step = self.descriptor.id();
        Ok(self
            .recorder
            .get_or_insert_with(|| Recorder::new(phase, step)))
    }

    /// The shared worker pool, for steps that fan out work of their own.
    pub fn executor(&self) -> &'a ThreadPool {
        self.pool
    }

    /// Publish what the chain produces on the step's behalf: the phase marker
    /// for recording steps and one capability item per declared capability.
    pub(crate) fn finish(mut self) -> Result<(), StepError> {
        if let Some(phase) = self.descriptor.recording() {
            let recorder = self
                .recorder
                .take()
                .unwrap_or_else(|| Recorder::new(phase, self.descriptor.id()));
            let marker: ItemValue = match phase {
                ExecutionTime::StaticInit => Arc::new(StaticRecorderItem::new(recorder)),
                ExecutionTime::RuntimeInit => Arc::new(MainRecorderItem::new(recorder)),
            };
            self.put(phase.marker_id(), marker)?;
        }
        for capability in self.descriptor.capabilities() {
            self.put(
                ItemId::of::<CapabilityItem>(),
                Arc::new(CapabilityItem::new(capability.clone())),
            )?;
        }
        Ok(())
    }

    fn put(&self, id: ItemId, value: ItemValue) -> Result<(), StepError> {
        if self.store.put(id, value) {
            Ok(())
        } else {
            Err(StepError::AlreadyProduced {
                step: self.descriptor.id().to_string(),
                item: id.to_string(),
            })
        }
    }

    fn check_consumes(&self, id: ItemId) -> Result<(), StepError> {
        match self.descriptor.consume_of(id) {
            Some(_) => Ok(()),
            None => Err(StepError::Undeclared {
                step: self.descriptor.id().to_string(),
                item: id.to_string(),
                action: "consumes",
            }),
        }
    }

    fn check_produces(&self, id: ItemId) -> Result<(), StepError> {
        match self.descriptor.produce_of(id) {
            Some(_) => Ok(()),
            None => Err(StepError::Undeclared {
                step: self.descriptor.id().to_string(),
                item: id.to_string(),
                action: "produces",
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::item::{Multi, Simple};

    struct Name(&'static str);
    impl BuildItem for Name {
        type Kind = Simple;
    }

    struct Tag(u32);
    impl BuildItem for Tag {
        type Kind = Multi;
    }

    #[test]
    fn test_simple_slot_written_once() {
        let store = ItemStore::new([ItemId::of::<Name>()]);
        assert!(store.put(ItemId::of::<Name>(), Arc::new(Name("a"))));
        assert!(!store.put(ItemId::of::<Name>(), Arc::new(Name("b"))));

        let value = store
            .get_simple(ItemId::of::<Name>())
            .and_then(downcast::<Name>)
            .unwrap();
        assert_eq!(value.0, "a");
    }

    #[test]
    fn test_multi_slot_accumulates() {
        let store = ItemStore::new([ItemId::of::<Tag>()]);
        for i in 0..3 {
            assert!(store.put(ItemId::of::<Tag>(), Arc::new(Tag(i))));
        }
        assert_eq!(store.get_multi(ItemId::of::<Tag>()).len(), 3);
    }

    #[test]
    fn test_multi_slot_concurrent_appends() {
        let store = ItemStore::new([ItemId::of::<Tag>()]);
        std::thread::scope(|s| {
            for t in 0..8 {
                let store = &store;
                s.spawn(move || {
                    for i in 0..100 {
                        store.put(ItemId::of::<Tag>(), Arc::new(Tag(t * 100 + i)));
                    }
                });
            }
        });
        assert_eq!(store.get_multi(ItemId::of::<Tag>()).len(), 800);
    }

    #[test]
    fn test_into_values_keeps_only_requested() {
        let store = ItemStore::new([ItemId::of::<Name>(), ItemId::of::<Tag>()]);
        store.put(ItemId::of::<Name>(), Arc::new(Name("kept")));
        store.put(ItemId::of::<Tag>(), Arc::new(Tag(1)));

        let keep: HashSet<ItemId> = [ItemId::of::<Name>()].into_iter().collect();
        let values = store.into_values(&keep);
        assert_eq!(values.len(), 1);
        assert_eq!(values[&ItemId::of::<Name>()].len(), 1);
    }
}
