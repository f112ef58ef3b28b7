// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Limits and defaults for the log shipping pipeline.
//!
//! Record limits bound the size of a single sanitized record so that one
//! oversized message cannot dominate a batch or the backup file. Defaults are
//! the values used by [`ShipperConfig::default`](crate::config::ShipperConfig).

use std::time::Duration;

/// Maximum number of characters kept from a record's `level`.
pub const MAX_LEVEL_CHARS: usize = 32;

/// Maximum number of characters kept from a record's `message`.
///
/// Longer messages are truncated on a character boundary, never inside a
/// multi-byte code point.
pub const MAX_MESSAGE_CHARS: usize = 32_768;

pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(5_000);
pub const DEFAULT_RETRY_LIMIT: u32 = 3;
pub const DEFAULT_BACKOFF_FACTOR: Duration = Duration::from_millis(1_000);
pub const DEFAULT_BACKUP_FILE_PATH: &str = "./unsent-logs.json";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(5_000);
pub const DEFAULT_MAX_CONCURRENT_BATCHES: usize = 3;
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(10_000);

/// Upper bound on how long `close()` waits for in-flight batches before it
/// runs the final flush anyway.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Polling period used while waiting for in-flight batches to settle.
pub(crate) const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Capacity of the engine event channel. Slow subscribers lag, they never
/// block the pipeline.
pub(crate) const EVENT_CHANNEL_CAPACITY: usize = 64;
