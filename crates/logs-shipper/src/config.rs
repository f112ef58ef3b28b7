// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::compression::CompressionCodec;
use crate::constants;
use crate::error::ConfigError;

/// Configuration for a [`LogShipper`](crate::shipper::LogShipper).
#[derive(Debug, Clone)]
pub struct ShipperConfig {
    /// Collector endpoint receiving `POST` requests with a JSON array body.
    pub api_url: String,
    /// Sent as `Authorization: Bearer <api_key>` when present.
    pub api_key: Option<String>,
    /// Maximum records per batch; reaching it in the queue triggers a flush.
    pub batch_size: usize,
    /// Period of the flush timer.
    pub flush_interval: Duration,
    /// Attempts per chunk in each retry cycle before falling back to backup.
    pub retry_limit: u32,
    /// Base delay of the exponential backoff, `backoff_factor * 2^attempt`.
    pub backoff_factor: Duration,
    /// Period of the retry timer.
    pub retry_interval: Duration,
    pub backup_file_path: PathBuf,
    pub request_timeout: Duration,
    /// Cap on batches sent concurrently by the flush scheduler.
    pub max_concurrent_batches: usize,
    pub use_compression: bool,
    pub compression_codec: CompressionCodec,
    /// Codec-specific level; the codec default is used when unset.
    pub compression_level: Option<i32>,
    /// How long `close()` waits for in-flight batches.
    pub drain_timeout: Duration,
    /// HTTPS proxy URL
    pub https_proxy: Option<String>,
}

impl Default for ShipperConfig {
    fn default() -> Self {
        Self {
            api_url: String::new(),
            api_key: None,
            batch_size: constants::DEFAULT_BATCH_SIZE,
            flush_interval: constants::DEFAULT_FLUSH_INTERVAL,
            retry_limit: constants::DEFAULT_RETRY_LIMIT,
            backoff_factor: constants::DEFAULT_BACKOFF_FACTOR,
            retry_interval: constants::DEFAULT_RETRY_INTERVAL,
            backup_file_path: PathBuf::from(constants::DEFAULT_BACKUP_FILE_PATH),
            request_timeout: constants::DEFAULT_REQUEST_TIMEOUT,
            max_concurrent_batches: constants::DEFAULT_MAX_CONCURRENT_BATCHES,
            use_compression: false,
            compression_codec: CompressionCodec::default(),
            compression_level: None,
            drain_timeout: constants::DEFAULT_DRAIN_TIMEOUT,
            https_proxy: None,
        }
    }
}

impl ShipperConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let api_url =
            env::var("LOGS_SHIPPER_API_URL").map_err(|_| ConfigError::Missing("LOGS_SHIPPER_API_URL"))?;
        let api_key = env::var("LOGS_SHIPPER_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());

        let config = Self {
            api_url,
            api_key,
            batch_size: parse_var("LOGS_SHIPPER_BATCH_SIZE")?.unwrap_or(defaults.batch_size),
            flush_interval: parse_millis("LOGS_SHIPPER_FLUSH_INTERVAL_MS")?
                .unwrap_or(defaults.flush_interval),
            retry_limit: parse_var("LOGS_SHIPPER_RETRY_LIMIT")?.unwrap_or(defaults.retry_limit),
            backoff_factor: parse_millis("LOGS_SHIPPER_BACKOFF_FACTOR_MS")?
                .unwrap_or(defaults.backoff_factor),
            retry_interval: parse_millis("LOGS_SHIPPER_RETRY_INTERVAL_MS")?
                .unwrap_or(defaults.retry_interval),
            backup_file_path: env::var("LOGS_SHIPPER_BACKUP_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.backup_file_path),
            request_timeout: parse_millis("LOGS_SHIPPER_REQUEST_TIMEOUT_MS")?
                .unwrap_or(defaults.request_timeout),
            max_concurrent_batches: parse_var("LOGS_SHIPPER_MAX_CONCURRENT_BATCHES")?
                .unwrap_or(defaults.max_concurrent_batches),
            use_compression: env::var("LOGS_SHIPPER_USE_COMPRESSION")
                .map(|val| val.to_lowercase() == "true")
                .unwrap_or(defaults.use_compression),
            compression_codec: parse_var("LOGS_SHIPPER_COMPRESSION")?
                .unwrap_or(defaults.compression_codec),
            compression_level: parse_var("LOGS_SHIPPER_COMPRESSION_LEVEL")?,
            drain_timeout: parse_millis("LOGS_SHIPPER_DRAIN_TIMEOUT_MS")?
                .unwrap_or(defaults.drain_timeout),
            https_proxy: env::var("LOGS_SHIPPER_PROXY_HTTPS")
                .or_else(|_| env::var("HTTPS_PROXY"))
                .ok(),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.api_url.trim();
        if url.is_empty() {
            return Err(ConfigError::Invalid("api_url cannot be empty".to_string()));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "api_url '{url}' must use http or https"
            )));
        }

        if self.batch_size == 0 {
            return Err(ConfigError::Invalid(
                "batch_size must be greater than 0".to_string(),
            ));
        }
        if self.max_concurrent_batches == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrent_batches must be greater than 0".to_string(),
            ));
        }
        if self.retry_limit == 0 {
            return Err(ConfigError::Invalid(
                "retry_limit must be greater than 0".to_string(),
            ));
        }

        for (name, interval) in [
            ("flush_interval", self.flush_interval),
            ("retry_interval", self.retry_interval),
            ("request_timeout", self.request_timeout),
        ] {
            if interval.is_zero() {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be greater than 0"
                )));
            }
        }

        if self.drain_timeout < self.request_timeout {
            return Err(ConfigError::Invalid(
                "drain_timeout must not be shorter than request_timeout".to_string(),
            ));
        }

        if self.backup_file_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "backup_file_path cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

fn parse_var<T: FromStr>(var: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(var) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::Parse { var, value }),
        Err(_) => Ok(None),
    }
}

fn parse_millis(var: &'static str) -> Result<Option<Duration>, ConfigError> {
    Ok(parse_var::<u64>(var)?.map(Duration::from_millis))
}
