// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Delivery of a single batch to the collector.
//!
//! ```text
//!   [LogRecord]
//!       │
//!       v
//!   ┌─────────────┐
//!   │  Serialize  │ (JSON array)
//!   └──────┬──────┘
//!          │
//!          v
//!   ┌─────────────┐
//!   │  Compress   │ (gzip or zstd, optional)
//!   └──────┬──────┘
//!          │
//!          v
//!   ┌─────────────┐
//!   │  HTTP POST  │ (bearer auth, request timeout)
//!   └──────┬──────┘
//!          │
//!          v
//!   ┌─────────────┐
//!   │  Classify   │ (success / permanent / transient)
//!   └─────────────┘
//! ```
//!
//! A sender performs exactly one attempt. Retrying and backoff belong to the
//! retry engine.

use async_trait::async_trait;
use reqwest::header::{CONTENT_ENCODING, CONTENT_TYPE};
use std::time::{Duration, Instant};
use tracing::{debug, error};

use crate::compression::CompressionCodec;
use crate::config::ShipperConfig;
use crate::error::{SendError, ShipperError};
use crate::http_utils::{build_client, classify_status};
use crate::record::LogRecord;

/// Capability to deliver one batch, consumed by the flush scheduler and the retry engine.
#[async_trait]
pub trait LogSender: Send + Sync {
    /// Performs a single delivery attempt for `batch`.
    async fn send(&self, batch: &[LogRecord]) -> Result<(), SendError>;
}

struct Payload {
    body: Vec<u8>,
    content_type: &'static str,
    content_encoding: Option<&'static str>,
}

/// [`LogSender`] that `POST`s batches to an HTTP collector.
#[derive(Debug, Clone)]
pub struct HttpSender {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    timeout: Duration,
    compression: Option<(CompressionCodec, Option<i32>)>,
}

impl HttpSender {
    pub fn new(config: &ShipperConfig) -> Result<Self, ShipperError> {
        let client = build_client(config.https_proxy.as_deref(), config.request_timeout)?;
        Ok(HttpSender {
            client,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            timeout: config.request_timeout,
            compression: config
                .use_compression
                .then_some((config.compression_codec, config.compression_level)),
        })
    }

    fn build_payload(&self, batch: &[LogRecord]) -> Result<Payload, SendError> {
        let json = serde_json::to_vec(batch).map_err(|e| SendError::Payload(e.to_string()))?;

        let Some((codec, level)) = self.compression else {
            return Ok(Payload {
                body: json,
                content_type: "application/json",
                content_encoding: None,
            });
        };

        match codec.encode(&json, level) {
            Ok(compressed) => Ok(Payload {
                body: compressed,
                content_type: "application/octet-stream",
                content_encoding: Some(codec.content_encoding()),
            }),
            Err(e) => {
                debug!("LOGS | Failed to compress batch, sending it uncompressed: {}", e);
                Ok(Payload {
                    body: json,
                    content_type: "application/json",
                    content_encoding: None,
                })
            }
        }
    }
}

#[async_trait]
impl LogSender for HttpSender {
    async fn send(&self, batch: &[LogRecord]) -> Result<(), SendError> {
        let payload = self.build_payload(batch)?;

        let mut request = self
            .client
            .post(&self.api_url)
            .timeout(self.timeout)
            .header(CONTENT_TYPE, payload.content_type)
            .body(payload.body);
        if let Some(encoding) = payload.content_encoding {
            request = request.header(CONTENT_ENCODING, encoding);
        }
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let time = Instant::now();
        match request.send().await {
            Ok(resp) => {
                let status = resp.status();
                let result = classify_status(status);
                match &result {
                    Ok(()) => debug!(
                        "LOGS | Sent {} records in {} ms",
                        batch.len(),
                        time.elapsed().as_millis()
                    ),
                    Err(SendError::Unauthorized | SendError::Forbidden) => error!(
                        "LOGS | Request was denied by the collector ({}). Please verify that your API key is valid.",
                        status
                    ),
                    Err(e) => debug!("LOGS | Request failed: {}", e),
                }
                result
            }
            Err(e) => {
                debug!(
                    "LOGS | Failed to send request after {} ms: {}",
                    time.elapsed().as_millis(),
                    e
                );
                Err(SendError::Transient(e.to_string()))
            }
        }
    }
}
