// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! # Logs Shipper
//!
//! Reliable batching log shipper. An application pushes raw records
//! synchronously; the shipper validates them, groups them into batches and
//! delivers them over HTTP in the background, retrying transient failures and
//! persisting what cannot be delivered to a local backup file that is replayed
//! on the next start.
//!
//! ```text
//!     enqueue(record)
//!           │
//!           v
//!   ┌─────────────────┐   size trigger / flush timer
//!   │ Ingestion queue │──────────────────────────────┐
//!   └─────────────────┘                              │
//!           ^                                        v
//!           │ init()                        ┌─────────────────┐
//!           │                               │     Flusher     │ (≤ max_concurrent_batches)
//!   ┌─────────────────┐                     └────────┬────────┘
//!   │   Backup file   │<──── permanent ──────────────┤
//!   └─────────────────┘                              │ transient
//!           ^                                        v
//!           │                               ┌─────────────────┐
//!           └──── permanent / exhausted ────│  Retry engine   │ (backoff, retry timer)
//!                                           └─────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```no_run
//! # async fn run() -> Result<(), logs_shipper::ShipperError> {
//! use logs_shipper::{LogShipper, ShipperConfig};
//!
//! let shipper = LogShipper::new(ShipperConfig {
//!     api_url: "https://logs.example.com/ingest".to_string(),
//!     ..Default::default()
//! })?;
//! shipper.init().await;
//! shipper.enqueue(serde_json::json!({
//!     "level": "info",
//!     "message": "request completed",
//!     "timestamp": "2024-05-01T12:00:00Z",
//! }));
//! shipper.close().await;
//! # Ok(())
//! # }
//! ```

#![deny(clippy::all)]
#![deny(clippy::unwrap_used)]
#![deny(unused_extern_crates)]
#![deny(unused_allocation)]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]

pub mod backup;
pub mod compression;
pub mod config;
pub mod constants;
pub mod error;
mod flusher;
pub mod http_utils;
mod pipeline;
pub mod record;
pub mod retry;
pub mod sender;
pub mod shipper;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use config::ShipperConfig;
pub use error::{BackupError, ConfigError, SendError, ShipperError};
pub use pipeline::{ShipperEvent, ShipperStats};
pub use record::{LogRecord, RawRecord};
pub use sender::{HttpSender, LogSender};
pub use shipper::LogShipper;
pub use transport::LogTransport;
