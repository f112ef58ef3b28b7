// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Retry engine for batches that failed with a transient error.
//!
//! Each cycle snapshots and clears the retry queue, re-chunks it by
//! `batch_size` and works through the chunks one after another. A chunk gets
//! up to `retry_limit` attempts, each preceded by an exponential backoff
//! sleep. A chunk that is rejected permanently or runs out of attempts is
//! written to the backup store.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::pipeline::Pipeline;
use crate::record::LogRecord;

/// Delay before attempt `attempt` (zero based): `factor * 2^attempt`.
#[must_use]
pub fn backoff_delay(factor: Duration, attempt: u32) -> Duration {
    factor.saturating_mul(2u32.saturating_pow(attempt))
}

#[derive(Clone)]
pub(crate) struct RetryEngine {
    pipeline: Arc<Pipeline>,
}

impl RetryEngine {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        RetryEngine { pipeline }
    }

    pub async fn process_retry_queue(&self) {
        let pending = std::mem::take(&mut self.pipeline.state().retry);
        if pending.is_empty() {
            return;
        }
        debug!("LOGS | Retrying {} records", pending.len());

        for chunk in pending.chunks(self.pipeline.config.batch_size) {
            self.retry_chunk(chunk.to_vec()).await;
        }
    }

    async fn retry_chunk(&self, chunk: Vec<LogRecord>) {
        let config = &self.pipeline.config;
        for attempt in 0..config.retry_limit {
            tokio::time::sleep(backoff_delay(config.backoff_factor, attempt)).await;

            match self.pipeline.sender.send(&chunk).await {
                Ok(()) => return,
                Err(e) if e.is_permanent() => {
                    warn!(
                        "LOGS | Retry of {} records rejected permanently: {}",
                        chunk.len(),
                        e
                    );
                    break;
                }
                Err(e) => debug!(
                    "LOGS | Retry attempt {}/{} failed: {}",
                    attempt + 1,
                    config.retry_limit,
                    e
                ),
            }
        }

        self.pipeline.back_up(chunk).await;
    }

    /// Runs retry cycles every `retry_interval` until `cancel` fires. A cycle
    /// that has started always runs to completion.
    pub async fn run(self, cancel: CancellationToken) {
        let period = self.pipeline.config.retry_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = ticker.tick() => self.process_retry_queue().await,
            }
        }
        debug!("LOGS | Retry timer stopped");
    }
}
