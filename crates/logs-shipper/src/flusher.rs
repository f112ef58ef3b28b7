// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Flush scheduler: drains the ingestion queue into batches and hands them
//! to the sender, bounded by `max_concurrent_batches`.
//!
//! A flush is started either by the size trigger on enqueue or by the
//! periodic flush timer. When the cap is reached the flush simply declines
//! and records keep accumulating in the queue; callers are never blocked.

use std::sync::Arc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::pipeline::{InFlightGuard, Pipeline};
use crate::record::{sanitize_batch, RawRecord};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Size,
    Timer,
    Shutdown,
}

#[derive(Clone)]
pub(crate) struct Flusher {
    pipeline: Arc<Pipeline>,
}

impl Flusher {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Flusher { pipeline }
    }

    /// Sends at most one batch from the head of the ingestion queue, even a
    /// partial one. Used by the flush timer.
    pub async fn flush(&self) {
        let Some((raw, _in_flight)) = self.take_batch(Trigger::Timer) else {
            return;
        };
        self.dispatch(raw).await;
    }

    /// Sends full batches for as long as the queue holds at least
    /// `batch_size` records and the cap allows. Used by the size trigger.
    pub async fn flush_full_batches(&self) {
        while let Some((raw, _in_flight)) = self.take_batch(Trigger::Size) {
            self.dispatch(raw).await;
        }
    }

    /// Drains the whole ingestion queue batch by batch, ignoring the
    /// concurrency cap and the armed flag. Used on shutdown.
    pub async fn flush_all(&self) {
        while let Some((raw, _in_flight)) = self.take_batch(Trigger::Shutdown) {
            self.dispatch(raw).await;
        }
    }

    fn take_batch(&self, trigger: Trigger) -> Option<(Vec<RawRecord>, InFlightGuard)> {
        let config = &self.pipeline.config;
        let raw = {
            let mut state = self.pipeline.state();
            if state.ingestion.is_empty() {
                return None;
            }
            if trigger != Trigger::Shutdown
                && (!state.armed || state.in_flight >= config.max_concurrent_batches)
            {
                return None;
            }
            if trigger == Trigger::Size && state.ingestion.len() < config.batch_size {
                return None;
            }
            let count = config.batch_size.min(state.ingestion.len());
            let raw: Vec<RawRecord> = state.ingestion.drain(..count).collect();
            state.in_flight += 1;
            raw
        };
        Some((raw, InFlightGuard::adopt(Arc::clone(&self.pipeline))))
    }

    async fn dispatch(&self, raw: Vec<RawRecord>) {
        let batch = sanitize_batch(raw);
        if batch.is_empty() {
            return;
        }

        match self.pipeline.sender.send(&batch).await {
            Ok(()) => {}
            Err(e) if e.is_permanent() => {
                error!(
                    "LOGS | Batch of {} records rejected permanently: {}",
                    batch.len(),
                    e
                );
                self.pipeline.back_up(batch).await;
            }
            Err(e) => {
                debug!(
                    "LOGS | Batch of {} records failed transiently: {}",
                    batch.len(),
                    e
                );
                let late = {
                    let mut state = self.pipeline.state();
                    if state.closed {
                        Some(batch)
                    } else {
                        state.retry.extend(batch);
                        None
                    }
                };
                if let Some(batch) = late {
                    self.pipeline.back_up(batch).await;
                }
            }
        }
    }

    /// Runs the flush timer until `cancel` fires. Each tick spawns a flush so
    /// a slow send never delays the next tick.
    pub async fn run(self, cancel: CancellationToken) {
        let period = self.pipeline.config.flush_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let flusher = self.clone();
                    tokio::spawn(async move { flusher.flush().await });
                }
            }
        }
        debug!("LOGS | Flush timer stopped");
    }
}
