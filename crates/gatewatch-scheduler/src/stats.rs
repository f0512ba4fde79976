//! Refresh counters shared with the HTTP layer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use gatewatch_fetcher::QueryError;
use serde::Serialize;
use tokio::sync::watch;

use crate::scheduler::SchedulerState;

/// Lock-free counters updated by the scheduler.
#[derive(Debug, Default)]
pub struct SchedulerStats {
    ticks: AtomicU64,
    last_tick_epoch: AtomicU64,
    no_data: AtomicU64,
    throttled: AtomicU64,
    transport: AtomicU64,
    backend: AtomicU64,
    lost: AtomicU64,
}

impl SchedulerStats {
    /// Count a fetch error. `NotFound` is absence of data, not a failure,
    /// and is counted apart from the failure classes.
    pub fn record_failure(&self, err: &QueryError) {
        let counter = match err {
            QueryError::NotFound(_) => &self.no_data,
            QueryError::Throttled(_) => &self.throttled,
            QueryError::Transport(_) => &self.transport,
            QueryError::Backend(_) => &self.backend,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a fetch task that panicked or was aborted.
    pub fn record_lost(&self) {
        self.lost.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        self.last_tick_epoch.store(epoch_secs(), Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            last_tick_epoch: match self.last_tick_epoch.load(Ordering::Relaxed) {
                0 => None,
                secs => Some(secs),
            },
            no_data: self.no_data.load(Ordering::Relaxed),
            failures: FailureCounts {
                throttled: self.throttled.load(Ordering::Relaxed),
                transport: self.transport.load(Ordering::Relaxed),
                backend: self.backend.load(Ordering::Relaxed),
                lost: self.lost.load(Ordering::Relaxed),
            },
        }
    }
}

/// Point-in-time copy of [`SchedulerStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Completed ticks.
    pub ticks: u64,
    /// Unix time the last tick completed.
    pub last_tick_epoch: Option<u64>,
    /// Fetches that found no datapoints and reported zero.
    pub no_data: u64,
    pub failures: FailureCounts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct FailureCounts {
    pub throttled: u64,
    pub transport: u64,
    pub backend: u64,
    /// Fetch tasks that panicked or were aborted.
    pub lost: u64,
}

/// Read-only view of a running scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerStatus {
    pub(crate) state: watch::Receiver<SchedulerState>,
    pub(crate) stats: Arc<SchedulerStats>,
}

impl SchedulerStatus {
    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Wait until the scheduler reaches `target` (or its owner is dropped).
    pub async fn wait_for(&mut self, target: SchedulerState) {
        let _ = self.state.wait_for(|s| *s == target).await;
    }
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
