//! gatewatch-store — in-memory cache of the latest sample per metric.
//!
//! The scheduler writes into a [`MetricStore`] as fetches complete and the
//! `/metrics` handler reads point-in-time snapshots out of it, so scrape
//! cadence is independent of fetch cadence.
//!
//! The store is `Clone` + `Send` + `Sync` (backed by `Arc<RwLock<..>>`) and
//! is created once per process and handed to both sides.

pub mod store;

pub use store::{MetricStore, SnapshotEntry};
