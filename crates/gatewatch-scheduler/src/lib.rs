//! gatewatch-scheduler — the refresh loop.
//!
//! On every tick the scheduler fans one fetch task per metric definition out
//! to a worker pool bounded by `max_workers`, and writes each result into the
//! [`MetricStore`](gatewatch_store::MetricStore) as soon as it completes.
//!
//! # Architecture
//!
//! ```text
//! Scheduler (Idle → Running → Stopped)
//!   ├── RouteDiscovery (optional: per-route definitions, re-listed each tick)
//!   ├── interval ticker (first tick immediate, overruns delay the next)
//!   ├── JoinSet of fetch tasks, gated by Semaphore(max_workers)
//!   │   └── MetricFetcher::fetch() → FetchOutcome → MetricStore
//!   └── SchedulerStatus (state + counters, read by /healthz)
//! ```

pub mod discovery;
pub mod scheduler;
pub mod stats;

pub use discovery::RouteDiscovery;
pub use scheduler::{Scheduler, SchedulerState, TickReport};
pub use stats::{FailureCounts, SchedulerStats, SchedulerStatus, StatsSnapshot};
