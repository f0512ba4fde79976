//! MetricStore — latest-sample cache keyed by metric definition.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use gatewatch_core::{MetricDefinition, MetricSample};
use tracing::trace;

/// One `(definition, sample)` pair of a snapshot.
pub type SnapshotEntry = (Arc<MetricDefinition>, MetricSample);

/// Thread-safe latest-sample cache.
///
/// Lock sections are plain map operations; the lock is never held across an
/// `.await` or a backend call.
#[derive(Clone, Default)]
pub struct MetricStore {
    samples: Arc<RwLock<HashMap<Arc<MetricDefinition>, MetricSample>>>,
}

impl MetricStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest sample for `definition`, or `None` if it was never fetched.
    pub fn get(&self, definition: &MetricDefinition) -> Option<MetricSample> {
        let samples = self.samples.read().unwrap_or_else(PoisonError::into_inner);
        samples.get(definition).copied()
    }

    /// Replace the sample for `definition` (last writer wins).
    pub fn set(&self, definition: Arc<MetricDefinition>, sample: MetricSample) {
        trace!(series = %definition.series(), value = sample.value, "sample stored");
        let mut samples = self.samples.write().unwrap_or_else(PoisonError::into_inner);
        samples.insert(definition, sample);
    }

    /// Flag the cached sample for `definition` as stale, keeping its value
    /// and timestamp. Returns `false` if there is no sample yet.
    pub fn mark_stale(&self, definition: &MetricDefinition) -> bool {
        let mut samples = self.samples.write().unwrap_or_else(PoisonError::into_inner);
        match samples.get_mut(definition) {
            Some(sample) => {
                sample.stale = true;
                true
            }
            None => false,
        }
    }

    /// Drop the sample for a metric that is no longer exported.
    pub fn remove(&self, definition: &MetricDefinition) -> bool {
        let mut samples = self.samples.write().unwrap_or_else(PoisonError::into_inner);
        samples.remove(definition).is_some()
    }

    /// Consistent copy of every cached sample, taken under one read lock.
    pub fn snapshot(&self) -> Vec<SnapshotEntry> {
        let samples = self.samples.read().unwrap_or_else(PoisonError::into_inner);
        samples
            .iter()
            .map(|(definition, sample)| (Arc::clone(definition), *sample))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.samples.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for MetricStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricStore").field("len", &self.len()).finish()
    }
}
