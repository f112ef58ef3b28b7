// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

/// Outcome of a failed delivery attempt, classified by whether retrying can help.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    #[error("Collector rejected the credentials (401)")]
    Unauthorized,

    #[error("Collector denied access (403)")]
    Forbidden,

    #[error("Collector rejected the payload with status {0}")]
    Permanent(u16),

    #[error("Failed to prepare payload: {0}")]
    Payload(String),

    #[error("Transient delivery failure: {0}")]
    Transient(String),
}

impl SendError {
    /// Permanent failures are never retried; their records go straight to backup.
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        !matches!(self, SendError::Transient(_))
    }
}

/// Errors raised while persisting records to the backup file.
#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    #[error("Backup file I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize backup records: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors that can occur when loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("{0} environment variable is not set")]
    Missing(&'static str),

    #[error("Could not parse {var}={value:?}")]
    Parse { var: &'static str, value: String },
}

/// Errors returned when building a shipper.
#[derive(Debug, thiserror::Error)]
pub enum ShipperError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}
