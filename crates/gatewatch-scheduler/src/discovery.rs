//! Per-route metric definitions, re-listed on every tick.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use gatewatch_core::{route_metrics, ExporterConfig, MetricDefinition};
use gatewatch_fetcher::RouteSource;
use gatewatch_store::MetricStore;
use tracing::{info, warn};

/// Tracks the API's routes and the definitions derived from them.
///
/// A failed listing keeps the last known routes, so a transient error never
/// drops per-route metrics. Routes that disappear from a successful listing
/// have their samples removed from the store.
pub struct RouteDiscovery {
    source: Arc<dyn RouteSource>,
    config: ExporterConfig,
    known: Mutex<Vec<Arc<MetricDefinition>>>,
}

impl RouteDiscovery {
    pub fn new(source: Arc<dyn RouteSource>, config: ExporterConfig) -> Self {
        Self {
            source,
            config,
            known: Mutex::new(Vec::new()),
        }
    }

    /// Definitions from the last successful listing.
    pub fn known(&self) -> Vec<Arc<MetricDefinition>> {
        self.known.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// List routes and return the per-route definitions for this tick.
    pub(crate) async fn refresh(&self, store: &MetricStore) -> Vec<Arc<MetricDefinition>> {
        let routes = match self.source.list_routes().await {
            Ok(routes) => routes,
            Err(e) => {
                let known = self.known();
                warn!(
                    error = %format!("{e:#}"),
                    definitions = known.len(),
                    "route listing failed; keeping last known routes"
                );
                return known;
            }
        };

        let listed: Vec<Arc<MetricDefinition>> = route_metrics(&self.config, &routes)
            .into_iter()
            .map(Arc::new)
            .collect();

        let mut known = self.known.lock().unwrap_or_else(PoisonError::into_inner);
        let current: HashSet<&MetricDefinition> = listed.iter().map(|d| &**d).collect();
        let mut removed = 0;
        for gone in known.iter().filter(|d| !current.contains(&***d)) {
            store.remove(gone);
            removed += 1;
        }
        if removed > 0 || known.len() != listed.len() {
            info!(routes = routes.len(), removed, "route set changed");
        }
        *known = listed.clone();
        listed
    }
}
