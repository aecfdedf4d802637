//! Read-only view of a successful execution.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use crate::builder::context::{downcast, ItemValue};
use crate::builder::errors::BuildError;
use crate::core::item::{BuildItem, ItemId, MultiBuildItem, SimpleBuildItem};

/// Final items of a successful execution.
///
/// Only items declared final on the chain builder are retained; every
/// intermediate item is dropped when the execution ends.
#[derive(Debug)]
pub struct BuildResult {
    values: HashMap<ItemId, Vec<ItemValue>>,
    finals: HashSet<ItemId>,
    duration: Duration,
    steps_run: usize,
}

impl BuildResult {
    pub(crate) fn new(
        values: HashMap<ItemId, Vec<ItemValue>>,
        finals: HashSet<ItemId>,
        duration: Duration,
        steps_run: usize,
    ) -> Self {
        BuildResult {
            values,
            finals,
            duration,
            steps_run,
        }
    }

    /// The value of a final simple item.
    pub fn get<T: SimpleBuildItem>(&self) -> Result<Arc<T>, BuildError> {
        self.get_optional::<T>()?.ok_or_else(|| BuildError::Missing {
            item: ItemId::of::<T>().to_string(),
        })
    }

    /// The value of a final simple item, if one was produced.
    pub fn get_optional<T: SimpleBuildItem>(&self) -> Result<Option<Arc<T>>, BuildError> {
        Ok(self.values_of::<T>()?.next())
    }

    /// Every value of a final multi item.
    pub fn get_all<T: MultiBuildItem>(&self) -> Result<Vec<Arc<T>>, BuildError> {
        Ok(self.values_of::<T>()?.collect())
    }

    /// Wall-clock duration of the execution.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Number of steps that ran to completion.
    pub fn steps_run(&self) -> usize {
        self.steps_run
    }

    fn values_of<T: BuildItem>(&self) -> Result<impl Iterator<Item = Arc<T>> + '_, BuildError> {
        let id = ItemId::of::<T>();
        if !self.finals.contains(&id) {
            return Err(BuildError::NotFinal {
                item: id.to_string(),
            });
        }
        Ok(self
            .values
            .get(&id)
            .into_iter()
            .flatten()
            .cloned()
            .filter_map(downcast::<T>))
    }
}
