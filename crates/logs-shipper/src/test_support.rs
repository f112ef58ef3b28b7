// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![allow(clippy::unwrap_used)]

use async_trait::async_trait;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use crate::config::ShipperConfig;
use crate::error::SendError;
use crate::pipeline::Pipeline;
use crate::record::{LogRecord, RawRecord};
use crate::sender::LogSender;

/// Sender that replays scripted outcomes and records every batch it sees.
/// Once the script runs out every call succeeds.
pub(crate) struct ScriptedSender {
    responses: Mutex<VecDeque<Result<(), SendError>>>,
    batches: Mutex<Vec<Vec<LogRecord>>>,
}

impl ScriptedSender {
    pub fn new(responses: Vec<Result<(), SendError>>) -> Self {
        ScriptedSender {
            responses: Mutex::new(responses.into()),
            batches: Mutex::new(Vec::new()),
        }
    }

    pub fn ok() -> Self {
        Self::new(Vec::new())
    }

    pub fn batches(&self) -> Vec<Vec<LogRecord>> {
        self.batches.lock().unwrap().clone()
    }

    pub fn messages(&self) -> Vec<Vec<String>> {
        self.batches()
            .into_iter()
            .map(|batch| batch.into_iter().map(|r| r.message).collect())
            .collect()
    }
}

#[async_trait]
impl LogSender for ScriptedSender {
    async fn send(&self, batch: &[LogRecord]) -> Result<(), SendError> {
        self.batches.lock().unwrap().push(batch.to_vec());
        self.responses.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }
}

pub(crate) fn raw(message: &str) -> RawRecord {
    json!({
        "level": "info",
        "message": message,
        "timestamp": "2024-05-01T12:00:00Z",
    })
}

/// Timers are long enough to stay out of the way unless a test shortens them.
pub(crate) fn test_config(dir: &TempDir) -> ShipperConfig {
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

pub(crate) fn pipeline(config: ShipperConfig, sender: Arc<dyn LogSender>) -> Arc<Pipeline> {
    Arc::new(Pipeline::new(Arc::new(config), sender))
}

pub(crate) async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
}
