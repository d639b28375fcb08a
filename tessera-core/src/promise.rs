//! Per-path handles over the read tasks of one batch.

use std::ops::Index;

use indexmap::IndexMap;
use tokio::task::JoinHandle;

use crate::{
    error::{TesseraError, TesseraResult},
    parser::Dataset,
};

static EMPTY_DATASET: Dataset = Dataset {
    meta: crate::metadata::MetadataRecord {
        is_attribute: false,
        datatype: None,
        element_size: 0,
        dimensions: Vec::new(),
        fill_value: None,
        address: None,
    },
    values: None,
};

fn dataset_or_empty(outcome: &TesseraResult<Dataset>) -> &Dataset {
    outcome.as_ref().unwrap_or(&EMPTY_DATASET)
}

enum Slot {
    Pending(JoinHandle<TesseraResult<Dataset>>),
    Resolved(TesseraResult<Dataset>),
}

impl Slot {
    async fn resolve(&mut self, path: &str) {
        if let Slot::Pending(handle) = self {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(join_error) => {
                    tracing::warn!("Read task for {} did not complete: {}", path, join_error);
                    Err(TesseraError::TaskFailed {
                        path: path.to_string(),
                        reason: join_error.to_string(),
                    })
                }
            };
            *self = Slot::Resolved(outcome);
        }
    }

    fn is_resolved(&self) -> bool {
        match self {
            Slot::Pending(handle) => handle.is_finished(),
            Slot::Resolved(_) => true,
        }
    }
}

/// Handle over the read tasks of one batch, addressed by path.
///
/// Dropping the promise aborts the tasks that are still running.
pub struct ReadPromise {
    slots: IndexMap<String, Slot>,
}

impl std::fmt::Debug for ReadPromise {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(
                self.slots
                    .iter()
                    .map(|(path, slot)| (path, slot.is_resolved())),
            )
            .finish()
    }
}

impl ReadPromise {
    pub(crate) fn new(tasks: IndexMap<String, JoinHandle<TesseraResult<Dataset>>>) -> Self {
        Self {
            slots: tasks
                .into_iter()
                .map(|(path, handle)| (path, Slot::Pending(handle)))
                .collect(),
        }
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.slots.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Non-blocking check whether the task for `path` has finished.
    pub fn is_resolved(&self, path: &str) -> bool {
        self.slots.get(path).is_some_and(Slot::is_resolved)
    }

    /// Non-blocking check over every task.
    pub fn is_complete(&self) -> bool {
        self.slots.values().all(Slot::is_resolved)
    }

    /// Waits for the task reading `path` and returns its result, the empty
    /// dataset if it failed. `None` if `path` was not part of the batch.
    pub async fn get(&mut self, path: &str) -> Option<&Dataset> {
        self.outcome(path).await.map(dataset_or_empty)
    }

    /// Waits for the task reading `path` and returns its full outcome.
    pub async fn outcome(&mut self, path: &str) -> Option<&TesseraResult<Dataset>> {
        let slot = self.slots.get_mut(path)?;
        slot.resolve(path).await;
        match &*slot {
            Slot::Resolved(outcome) => Some(outcome),
            Slot::Pending(_) => None,
        }
    }

    pub(crate) async fn resolve_all(&mut self) {
        for (path, slot) in self.slots.iter_mut() {
            slot.resolve(path).await;
        }
    }

    /// Waits for every task of the batch.
    pub async fn wait(mut self) -> ReadResults {
        self.resolve_all().await;
        let outcomes = std::mem::take(&mut self.slots)
            .into_iter()
            .filter_map(|(path, slot)| match slot {
                Slot::Resolved(outcome) => Some((path, outcome)),
                Slot::Pending(_) => None,
            })
            .collect();
        ReadResults { outcomes }
    }
}

impl Drop for ReadPromise {
    fn drop(&mut self) {
        for slot in self.slots.values() {
            if let Slot::Pending(handle) = slot {
                handle.abort();
            }
        }
    }
}

/// Resolved outcomes of a batch, in request order.
#[derive(Debug, Default)]
pub struct ReadResults {
    outcomes: IndexMap<String, TesseraResult<Dataset>>,
}

impl ReadResults {
    /// Result for `path`, the empty dataset if its read failed.
    pub fn get(&self, path: &str) -> Option<&Dataset> {
        self.outcomes.get(path).map(dataset_or_empty)
    }

    pub fn outcome(&self, path: &str) -> Option<&TesseraResult<Dataset>> {
        self.outcomes.get(path)
    }

    pub fn error(&self, path: &str) -> Option<&TesseraError> {
        self.outcomes.get(path).and_then(|outcome| outcome.as_ref().err())
    }

    /// Removes and returns the outcome for `path`.
    pub fn take(&mut self, path: &str) -> Option<TesseraResult<Dataset>> {
        self.outcomes.shift_remove(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.outcomes.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Dataset)> {
        self.outcomes
            .iter()
            .map(|(path, outcome)| (path.as_str(), dataset_or_empty(outcome)))
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &TesseraError)> {
        self.outcomes
            .iter()
            .filter_map(|(path, outcome)| outcome.as_ref().err().map(|e| (path.as_str(), e)))
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

impl Index<&str> for ReadResults {
    type Output = Dataset;

    /// # Panics
    /// If `path` was not part of the batch.
    fn index(&self, path: &str) -> &Dataset {
        match self.get(path) {
            Some(dataset) => dataset,
            None => panic!("{path} was not part of this read"),
        }
    }
}
