// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Helper functions for integration tests

use logs_shipper::{LogRecord, RawRecord, ShipperConfig};
use serde_json::json;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

/// Create a valid raw record carrying `message`
pub fn raw_record(message: &str) -> RawRecord {
    json!({
        "level": "info",
        "message": message,
        "timestamp": "2024-05-01T12:00:00.000Z",
    })
}

/// Configuration with timers long enough that only the size trigger and
/// `close()` cause sends, unless a test shortens them.
pub fn test_config(dir: &TempDir) -> ShipperConfig {
    ShipperConfig {
        api_url: "http://127.0.0.1:1/logs".to_string(),
        batch_size: 2,
        flush_interval: Duration::from_secs(60),
        retry_interval: Duration::from_secs(60),
        backoff_factor: Duration::from_millis(1),
        drain_timeout: Duration::from_secs(5),
        backup_file_path: dir.path().join("unsent-logs.json"),
        ..Default::default()
    }
}

#[allow(dead_code)]
pub fn read_backup(path: &Path) -> Vec<LogRecord> {
    let raw = std::fs::read_to_string(path).expect("Failed to read backup file");
    serde_json::from_str(&raw).expect("Backup file is not a JSON array of records")
}

/// Poll `condition` until it holds, failing the test after five seconds
#[allow(dead_code)]
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("Condition not met within 5 seconds");
}
