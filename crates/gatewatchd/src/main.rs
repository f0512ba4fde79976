//! gatewatchd — API Gateway metrics exporter.
//!
//! Periodically pulls API Gateway metrics from CloudWatch and serves the
//! latest values on `/metrics` for Prometheus to scrape.
//!
//! # Usage
//!
//! ```text
//! API_ID=a1b2c3d4 gatewatchd --port 8200 --refresh-interval 60
//! ```
//!
//! Every flag can also be set through the environment variable shown in
//! `--help`.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use gatewatch_core::config::{
    DEFAULT_MAX_WORKERS, DEFAULT_PORT, DEFAULT_REFRESH_INTERVAL_SECS, DEFAULT_REGION,
    DEFAULT_STAGE,
};
use gatewatch_core::{api_metrics, ExporterConfig};
use gatewatch_fetcher::{load_sdk_config, ApiGatewayRoutes, CloudWatchQuery, MetricFetcher};
use gatewatch_scheduler::{RouteDiscovery, Scheduler};
use gatewatch_store::MetricStore;
use tokio::sync::watch;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "gatewatchd", about = "API Gateway CloudWatch exporter for Prometheus", version)]
struct Cli {
    /// AWS region of the API.
    #[arg(long, env = "AWS_REGION", default_value = DEFAULT_REGION)]
    region: String,

    /// API Gateway API id (required).
    #[arg(long, env = "API_ID")]
    api_id: Option<String>,

    /// API stage.
    #[arg(long, env = "API_STAGE", default_value = DEFAULT_STAGE)]
    stage: String,

    /// Seconds between metric refreshes.
    #[arg(long, env = "REFRESH_INTERVAL", default_value_t = DEFAULT_REFRESH_INTERVAL_SECS)]
    refresh_interval: u64,

    /// Port for the metrics endpoint.
    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Maximum concurrent CloudWatch queries.
    #[arg(long, env = "MAX_WORKERS", default_value_t = DEFAULT_MAX_WORKERS)]
    max_workers: usize,

    /// Also export per-route metrics, re-listing the API's routes every tick.
    #[arg(long, env = "DISCOVER_ROUTES", default_value_t = false)]
    discover_routes: bool,

    /// Address for the metrics endpoint.
    #[arg(long, env = "BIND_ADDRESS", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    bind_address: IpAddr,

    /// Log output format.
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

impl Cli {
    fn exporter_config(&self) -> Result<ExporterConfig, gatewatch_core::ConfigError> {
        gatewatch_core::config::ExporterConfigBuilder::empty()
            .api_id(self.api_id.clone())
            .region(&self.region)
            .stage(&self.stage)
            .refresh_interval_secs(self.refresh_interval)
            .port(self.port)
            .max_workers(self.max_workers)
            .build()
    }
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,gatewatch=debug"));

    match format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    // Configuration errors are fatal and happen before anything is bound.
    let config = cli.exporter_config()?;

    run(config, cli.bind_address, cli.discover_routes).await
}

async fn run(config: ExporterConfig, bind_address: IpAddr, discover: bool) -> anyhow::Result<()> {
    info!(
        api_id = %config.api_id,
        stage = %config.stage,
        region = %config.region,
        "gatewatch starting"
    );

    let sdk_config = load_sdk_config(&config.region).await;

    // ── Core ───────────────────────────────────────────────────

    let store = MetricStore::new();
    let fetcher = MetricFetcher::new(
        Arc::new(CloudWatchQuery::from_config(&sdk_config)),
        config.refresh_interval,
    );
    let mut scheduler = Scheduler::new(
        fetcher,
        store.clone(),
        api_metrics(&config),
        config.refresh_interval,
        config.max_workers,
    );
    if discover {
        let routes = ApiGatewayRoutes::new(&sdk_config, config.api_id.clone());
        scheduler =
            scheduler.with_route_discovery(RouteDiscovery::new(Arc::new(routes), config.clone()));
        info!("per-route metrics enabled");
    }
    let scheduler = Arc::new(scheduler);

    // ── Metrics endpoint ───────────────────────────────────────

    let router = gatewatch_api::build_router(store, scheduler.status());
    let addr = SocketAddr::new(bind_address, config.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind metrics endpoint on {addr}"))?;
    info!(%addr, "metrics endpoint listening");

    // ── Refresh loop ───────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler_handle = {
        let scheduler = Arc::clone(&scheduler);
        tokio::spawn(async move { scheduler.run(shutdown_rx).await })
    };

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        })
        .await?;

    if let Err(e) = scheduler_handle.await {
        error!(error = %e, "scheduler task failed");
    }

    info!("gatewatch stopped");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
