// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Mock senders for driving the shipper without a network

use logs_shipper::{LogRecord, LogSender, SendError};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Sender replaying a script of outcomes, then succeeding forever. Every call
/// is recorded, and the highest number of overlapping calls is tracked.
#[allow(dead_code)]
pub struct MockSender {
    script: Mutex<VecDeque<Result<(), SendError>>>,
    calls: Mutex<Vec<Vec<LogRecord>>>,
    delivered: Mutex<Vec<LogRecord>>,
    delay: Duration,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

#[allow(dead_code)]
impl MockSender {
    pub fn new(script: Vec<Result<(), SendError>>) -> Self {
        MockSender {
            script: Mutex::new(script.into()),
            calls: Mutex::new(Vec::new()),
            delivered: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }

    pub fn succeeding() -> Self {
        Self::new(Vec::new())
    }

    /// Makes every call take `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<Vec<LogRecord>> {
        self.calls.lock().unwrap().clone()
    }

    /// Records from calls that reported success.
    pub fn delivered(&self) -> Vec<LogRecord> {
        self.delivered.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn messages(&self) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .map(|batch| batch.into_iter().map(|r| r.message).collect())
            .collect()
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl LogSender for MockSender {
    async fn send(&self, batch: &[LogRecord]) -> Result<(), SendError> {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);
        self.calls.lock().unwrap().push(batch.to_vec());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let outcome = self.script.lock().unwrap().pop_front().unwrap_or(Ok(()));
        if outcome.is_ok() {
            self.delivered.lock().unwrap().extend_from_slice(batch);
        }
        self.active.fetch_sub(1, Ordering::SeqCst);
        outcome
    }
}
