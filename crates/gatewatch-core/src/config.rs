//! Validated exporter configuration.

use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_STAGE: &str = "$default";
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_PORT: u16 = 8200;
pub const DEFAULT_MAX_WORKERS: usize = 20;

/// Startup configuration errors. All of them are fatal.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("API_ID is required")]
    MissingApiId,

    #[error("refresh interval must be greater than zero")]
    ZeroInterval,

    #[error("max workers must be greater than zero")]
    ZeroWorkers,
}

/// Configuration the exporter core needs at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExporterConfig {
    pub region: String,
    pub api_id: String,
    pub stage: String,
    pub refresh_interval: Duration,
    pub port: u16,
    pub max_workers: usize,
}

impl ExporterConfig {
    pub fn builder(api_id: impl Into<String>) -> ExporterConfigBuilder {
        ExporterConfigBuilder {
            region: DEFAULT_REGION.to_string(),
            api_id: Some(api_id.into()),
            stage: DEFAULT_STAGE.to_string(),
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
            port: DEFAULT_PORT,
            max_workers: DEFAULT_MAX_WORKERS,
        }
    }
}

/// Builder that validates on [`build`](ExporterConfigBuilder::build).
#[derive(Debug, Clone)]
pub struct ExporterConfigBuilder {
    region: String,
    api_id: Option<String>,
    stage: String,
    refresh_interval_secs: u64,
    port: u16,
    max_workers: usize,
}

impl ExporterConfigBuilder {
    /// Builder with no API id set; `build` fails unless one is supplied.
    pub fn empty() -> Self {
        Self {
            api_id: None,
            ..ExporterConfig::builder(String::new())
        }
    }

    pub fn api_id(mut self, api_id: Option<String>) -> Self {
        self.api_id = api_id;
        self
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = stage.into();
        self
    }

    pub fn refresh_interval_secs(mut self, secs: u64) -> Self {
        self.refresh_interval_secs = secs;
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    pub fn build(self) -> Result<ExporterConfig, ConfigError> {
        let api_id = self
            .api_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or(ConfigError::MissingApiId)?;

        if self.refresh_interval_secs == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        if self.max_workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }

        Ok(ExporterConfig {
            region: self.region,
            api_id,
            stage: self.stage,
            refresh_interval: Duration::from_secs(self.refresh_interval_secs),
            port: self.port,
            max_workers: self.max_workers,
        })
    }
}
