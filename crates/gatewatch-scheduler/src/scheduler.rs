//! Scheduler — owns the refresh loop.
//!
//! The first tick fires as soon as [`Scheduler::run`] starts, so the exporter
//! has data after one round of fetches instead of one full interval. Later
//! ticks follow every `interval`; a tick that overruns delays the next one
//! rather than triggering a burst.

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use gatewatch_core::{MetricDefinition, MetricSample};
use gatewatch_fetcher::{FetchOutcome, MetricFetcher, QueryError};
use gatewatch_store::MetricStore;
use serde::Serialize;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::discovery::RouteDiscovery;
use crate::stats::{SchedulerStats, SchedulerStatus};

/// Lifecycle of the refresh loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    Idle,
    Running,
    Stopped,
}

/// Per-outcome counts for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub fresh: usize,
    pub no_data: usize,
    pub throttled: usize,
    pub transport: usize,
    pub backend: usize,
    /// Tasks that panicked or were cancelled.
    pub lost: usize,
}

impl TickReport {
    fn record(&mut self, result: &Result<(), QueryError>) {
        match result {
            Ok(()) => self.fresh += 1,
            Err(QueryError::NotFound(_)) => self.no_data += 1,
            Err(QueryError::Throttled(_)) => self.throttled += 1,
            Err(QueryError::Transport(_)) => self.transport += 1,
            Err(QueryError::Backend(_)) => self.backend += 1,
        }
    }

    /// Fetches that left their metric stale.
    pub fn failed(&self) -> usize {
        self.throttled + self.transport + self.backend + self.lost
    }
}

/// Drives bounded-concurrency metric refreshes on a fixed interval.
pub struct Scheduler {
    fetcher: MetricFetcher,
    store: MetricStore,
    /// Fetched on every tick.
    definitions: Vec<Arc<MetricDefinition>>,
    /// Per-route definitions, re-listed on every tick when enabled.
    routes: Option<RouteDiscovery>,
    interval: Duration,
    max_workers: usize,
    /// Worker pool bound; one permit per in-flight fetch.
    workers: Arc<Semaphore>,
    stats: Arc<SchedulerStats>,
    state: watch::Sender<SchedulerState>,
}

impl Scheduler {
    /// Create a scheduler. `max_workers` is clamped to at least one.
    pub fn new(
        fetcher: MetricFetcher,
        store: MetricStore,
        definitions: Vec<MetricDefinition>,
        interval: Duration,
        max_workers: usize,
    ) -> Self {
        let max_workers = max_workers.max(1);
        let (state, _) = watch::channel(SchedulerState::Idle);
        Self {
            fetcher,
            store,
            definitions: definitions.into_iter().map(Arc::new).collect(),
            routes: None,
            interval,
            max_workers,
            workers: Arc::new(Semaphore::new(max_workers)),
            stats: Arc::new(SchedulerStats::default()),
            state,
        }
    }

    /// Also export per-route metrics, listing the routes before every tick.
    pub fn with_route_discovery(mut self, discovery: RouteDiscovery) -> Self {
        self.routes = Some(discovery);
        self
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    /// Read-only handle for the status endpoint.
    pub fn status(&self) -> SchedulerStatus {
        SchedulerStatus {
            state: self.state.subscribe(),
            stats: Arc::clone(&self.stats),
        }
    }

    /// Fixed definitions; per-route ones come from discovery.
    pub fn definitions(&self) -> &[Arc<MetricDefinition>] {
        &self.definitions
    }

    /// Run one refresh cycle across every definition.
    ///
    /// Each result is written to the store as soon as its task finishes.
    /// Dropping the returned future aborts the tick's outstanding tasks.
    pub async fn run_tick(&self) -> TickReport {
        let started = Instant::now();
        let mut definitions = self.definitions.clone();
        if let Some(routes) = &self.routes {
            definitions.extend(routes.refresh(&self.store).await);
        }

        let mut tasks = JoinSet::new();
        for definition in &definitions {
            let definition = Arc::clone(definition);
            let fetcher = self.fetcher.clone();
            let store = self.store.clone();
            let workers = Arc::clone(&self.workers);

            tasks.spawn(async move {
                let mut guard = StaleOnDrop::new(store.clone(), Arc::clone(&definition));
                // Excess tasks queue here until a worker frees up.
                let permit = workers
                    .acquire_owned()
                    .await
                    .map_err(|_| QueryError::Transport("worker pool closed".to_string()))?;
                let outcome = fetcher.fetch(&definition).await;
                drop(permit);
                guard.disarm();
                apply_outcome(&store, definition, outcome)
            });
        }

        let mut report = TickReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => {
                    if let Err(ref e) = result {
                        self.stats.record_failure(e);
                    }
                    report.record(&result);
                }
                Err(e) => {
                    error!(error = %e, "fetch task failed");
                    self.stats.record_lost();
                    report.lost += 1;
                }
            }
        }

        self.stats.record_tick();
        info!(
            metrics = definitions.len(),
            fresh = report.fresh,
            no_data = report.no_data,
            failed = report.failed(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "refresh tick complete"
        );
        report
    }

    /// Run the refresh loop until the shutdown signal fires.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        if *shutdown.borrow() {
            self.state.send_replace(SchedulerState::Stopped);
            return;
        }

        self.state.send_replace(SchedulerState::Running);
        info!(
            interval_secs = self.interval.as_secs(),
            metrics = self.definitions.len(),
            max_workers = self.max_workers,
            route_discovery = self.routes.is_some(),
            "scheduler started"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    tokio::select! {
                        _ = self.run_tick() => {}
                        _ = shutdown.changed() => {
                            info!("shutdown during refresh; abandoning in-flight fetches");
                            break;
                        }
                    }
                }
                _ = shutdown.changed() => {
                    info!("scheduler shutting down");
                    break;
                }
            }
        }

        self.state.send_replace(SchedulerState::Stopped);
    }
}

/// Marks a definition stale if its fetch task ends without publishing a
/// result, i.e. it panicked or was aborted.
struct StaleOnDrop {
    store: MetricStore,
    definition: Arc<MetricDefinition>,
    armed: bool,
}

impl StaleOnDrop {
    fn new(store: MetricStore, definition: Arc<MetricDefinition>) -> Self {
        Self {
            store,
            definition,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for StaleOnDrop {
    fn drop(&mut self) {
        if self.armed {
            self.store.mark_stale(&self.definition);
        }
    }
}

/// Publish a fetch outcome. Failures never remove a cached sample.
fn apply_outcome(
    store: &MetricStore,
    definition: Arc<MetricDefinition>,
    outcome: FetchOutcome,
) -> Result<(), QueryError> {
    match outcome {
        FetchOutcome::Success(sample) => {
            store.set(definition, sample);
            Ok(())
        }
        FetchOutcome::Failure(QueryError::NotFound(reason)) => {
            debug!(series = %definition.series(), "no datapoints; reporting zero");
            store.set(definition, MetricSample::fresh(0.0, SystemTime::now()));
            Err(QueryError::NotFound(reason))
        }
        FetchOutcome::Failure(e) => {
            let cached = store.mark_stale(&definition);
            warn!(
                series = %definition.series(),
                reason = e.reason(),
                error = %e,
                cached,
                "metric fetch failed"
            );
            Err(e)
        }
    }
}
