// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::constants::{
    DEFAULT_GELF_PORT, QUEUE_CAPACITY, TIME_FORMAT_UNIX, TIME_FORMAT_UNIX_MICRO,
    TIME_FORMAT_UNIX_MS,
};
use crate::errors::SinkError;
use crate::transport::TransportMode;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Configuration for the GELF sink
#[derive(Debug, Clone)]
pub struct SinkConfig {
    /// Value of the `host` field stamped into every frame
    pub host: String,
    /// Collector address as `host:port`
    pub endpoint: String,
    /// Transport used to reach the collector
    pub transport: TransportMode,
    /// Directory for frames that failed to send; `None` disables the spool
    pub temp_log_path: Option<PathBuf>,
    /// Encoding of the records' `time` field: `""` (seconds), `UNIXMS` or `UNIXMICRO`
    pub time_format: String,
    /// Capacity of the ingestion queue
    pub queue_capacity: usize,
    /// Overrides the transport's periodic flush interval
    pub flush_interval: Option<Duration>,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            endpoint: format!("127.0.0.1:{DEFAULT_GELF_PORT}"),
            transport: TransportMode::Udp,
            temp_log_path: None,
            time_format: TIME_FORMAT_UNIX.to_string(),
            queue_capacity: QUEUE_CAPACITY,
            flush_interval: None,
        }
    }
}

impl SinkConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, SinkError> {
        let defaults = Self::default();

        let host = env::var("GELF_HOST").unwrap_or(defaults.host);
        let endpoint = env::var("GELF_ENDPOINT").unwrap_or(defaults.endpoint);
        let transport = match env::var("GELF_TRANSPORT") {
            Ok(mode) => mode.parse().map_err(SinkError::InvalidConfig)?,
            Err(_) => defaults.transport,
        };
        let temp_log_path = env::var("GELF_TEMP_LOG_PATH")
            .ok()
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);
        let time_format = env::var("GELF_TIME_FORMAT").unwrap_or(defaults.time_format);
        let queue_capacity = env::var("GELF_QUEUE_CAPACITY")
            .ok()
            .and_then(|capacity| capacity.parse::<usize>().ok())
            .unwrap_or(defaults.queue_capacity);
        let flush_interval = env::var("GELF_FLUSH_INTERVAL_SECS")
            .ok()
            .and_then(|secs| secs.parse::<u64>().ok())
            .map(Duration::from_secs);

        let config = Self {
            host,
            endpoint,
            transport,
            temp_log_path,
            time_format,
            queue_capacity,
            flush_interval,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), SinkError> {
        if self.host.trim().is_empty() {
            return Err(SinkError::InvalidConfig("host cannot be empty".to_string()));
        }

        if self.endpoint.trim().is_empty() {
            return Err(SinkError::InvalidConfig(
                "endpoint cannot be empty".to_string(),
            ));
        }

        if self.queue_capacity == 0 {
            return Err(SinkError::InvalidConfig(
                "queue capacity must be greater than 0".to_string(),
            ));
        }

        if self.flush_interval == Some(Duration::ZERO) {
            return Err(SinkError::InvalidConfig(
                "flush interval must be greater than 0".to_string(),
            ));
        }

        // Unknown formats are accepted: every timestamp is then omitted.
        let known_formats = [TIME_FORMAT_UNIX, TIME_FORMAT_UNIX_MS, TIME_FORMAT_UNIX_MICRO];
        if !known_formats.contains(&self.time_format.as_str()) {
            warn!(
                "Unknown time format '{}', timestamps will be omitted",
                self.time_format
            );
        }

        Ok(())
    }
}
