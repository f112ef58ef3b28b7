// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Lifecycle controller owning one shipping pipeline.

use std::sync::{Arc, OnceLock};
use tokio::runtime::Handle;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ShipperConfig;
use crate::constants::DRAIN_POLL_INTERVAL;
use crate::error::ShipperError;
use crate::flusher::Flusher;
use crate::pipeline::{Pipeline, ShipperEvent, ShipperStats};
use crate::record::RawRecord;
use crate::retry::RetryEngine;
use crate::sender::{HttpSender, LogSender};

#[derive(Default)]
struct Lifecycle {
    cancel: Option<CancellationToken>,
    tasks: Vec<JoinHandle<()>>,
}

/// Accepts raw records synchronously and ships them in batches.
///
/// Records enqueued before [`LogShipper::init`] accumulate and are only
/// flushed once initialization has loaded the backup file, so that recovered
/// records go out first. [`LogShipper::close`] must be awaited before the
/// process exits for pending records to be delivered or backed up.
pub struct LogShipper {
    pipeline: Arc<Pipeline>,
    flusher: Flusher,
    retry: RetryEngine,
    lifecycle: Mutex<Lifecycle>,
    runtime: OnceLock<Handle>,
}

impl LogShipper {
    /// Creates a shipper delivering over HTTP.
    pub fn new(config: ShipperConfig) -> Result<Self, ShipperError> {
        config.validate()?;
        let sender = HttpSender::new(&config)?;
        Self::with_sender(config, Arc::new(sender))
    }

    /// Creates a shipper delivering through a custom [`LogSender`].
    pub fn with_sender(
        config: ShipperConfig,
        sender: Arc<dyn LogSender>,
    ) -> Result<Self, ShipperError> {
        config.validate()?;
        let pipeline = Arc::new(Pipeline::new(Arc::new(config), sender));
        Ok(LogShipper {
            flusher: Flusher::new(Arc::clone(&pipeline)),
            retry: RetryEngine::new(Arc::clone(&pipeline)),
            pipeline,
            lifecycle: Mutex::new(Lifecycle::default()),
            runtime: OnceLock::new(),
        })
    }

    /// Appends a record to the ingestion queue. Never blocks on I/O and never
    /// fails; invalid records are dropped later, at flush time.
    ///
    /// Records enqueued after [`LogShipper::close`] stay in memory: nothing
    /// flushes or backs them up any more.
    pub fn enqueue(&self, record: RawRecord) {
        let size_reached = {
            let mut state = self.pipeline.state();
            state.ingestion.push_back(record);
            if state.closed {
                debug!(
                    "LOGS | Record enqueued after close, {} records will not be shipped",
                    state.ingestion.len()
                );
            }
            state.armed && state.ingestion.len() >= self.pipeline.config.batch_size
        };
        if size_reached {
            self.spawn_size_flush();
        }
    }

    fn spawn_size_flush(&self) {
        let Some(runtime) = self.runtime.get() else {
            return;
        };
        let flusher = self.flusher.clone();
        runtime.spawn(async move { flusher.flush_full_batches().await });
    }

    /// Recovers backed up records and starts the flush and retry timers.
    /// Only the first call has an effect, and none once the shipper is closed.
    pub async fn init(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        {
            let state = self.pipeline.state();
            if state.closed {
                debug!("LOGS | Ignoring init on a closed shipper");
                return;
            }
            if state.initialized {
                return;
            }
        }
        let _ = self.runtime.set(Handle::current());

        match self.pipeline.backup.take_all().await {
            Ok(recovered) if !recovered.is_empty() => {
                info!(
                    "LOGS | Recovered {} records from {}",
                    recovered.len(),
                    self.pipeline.backup.path().display()
                );
                let mut state = self.pipeline.state();
                for record in recovered.into_iter().rev() {
                    state.ingestion.push_front(record.into());
                }
            }
            Ok(_) => {}
            Err(e) => error!("LOGS | Unable to recover backed up records: {}", e),
        }

        {
            let mut state = self.pipeline.state();
            state.initialized = true;
            state.armed = true;
        }

        let cancel = CancellationToken::new();
        lifecycle.tasks.push(tokio::spawn(
            self.flusher.clone().run(cancel.child_token()),
        ));
        lifecycle
            .tasks
            .push(tokio::spawn(self.retry.clone().run(cancel.child_token())));
        lifecycle.cancel = Some(cancel);
        debug!("LOGS | Shipper initialized");

        // Records enqueued before init may already fill a batch.
        self.spawn_size_flush();
    }

    /// Stops the timers, waits for in-flight batches and makes a final
    /// delivery attempt for everything still in memory. Whatever cannot be
    /// delivered ends up in the backup file. Safe to call more than once.
    pub async fn close(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        self.pipeline.state().armed = false;

        if let Some(cancel) = lifecycle.cancel.take() {
            cancel.cancel();
        }
        for task in lifecycle.tasks.drain(..) {
            if let Err(e) = task.await {
                error!("LOGS | Timer task failed: {}", e);
            }
        }

        self.drain_in_flight().await;
        self.flusher.flush_all().await;
        self.retry.process_retry_queue().await;

        // From here on a batch still in flight backs itself up on transient
        // failure. Anything that reached the retry queue before the flag was
        // set is backed up now.
        let late = {
            let mut state = self.pipeline.state();
            state.closed = true;
            std::mem::take(&mut state.retry)
        };
        if !late.is_empty() {
            self.pipeline.back_up(late).await;
        }

        let stats = self.pipeline.stats();
        if stats.retrying > 0 {
            warn!(
                "LOGS | {} records could not be delivered nor backed up",
                stats.retrying
            );
        }
        debug!("LOGS | Shipper closed");
    }

    async fn drain_in_flight(&self) {
        let timeout = self.pipeline.config.drain_timeout;
        let drained = tokio::time::timeout(timeout, async {
            loop {
                let in_flight = self.pipeline.state().in_flight;
                if in_flight == 0 {
                    break;
                }
                tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
            }
        })
        .await;
        if drained.is_err() {
            warn!(
                "LOGS | {} batches still in flight after {} ms",
                self.pipeline.state().in_flight,
                timeout.as_millis()
            );
        }
    }

    #[must_use]
    pub fn stats(&self) -> ShipperStats {
        self.pipeline.stats()
    }

    /// Subscribes to backup notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ShipperEvent> {
        self.pipeline.subscribe()
    }

    #[must_use]
    pub fn config(&self) -> &ShipperConfig {
        &self.pipeline.config
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::SendError;
    use crate::record::{sanitize, LogRecord};
    use crate::test_support::{raw, test_config, wait_until, ScriptedSender};
    use std::time::Duration;
    use tracing_test::traced_test;

    fn shipper(config: ShipperConfig, sender: Arc<ScriptedSender>) -> LogShipper {
        LogShipper::with_sender(config, sender).unwrap()
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = ShipperConfig {
            batch_size: 0,
            ..test_config(&dir)
        };
        let result = LogShipper::with_sender(config, Arc::new(ScriptedSender::ok()));
        assert!(matches!(result, Err(ShipperError::Config(_))));
    }

    #[tokio::test]
    async fn test_size_trigger_is_armed_by_init() {
        let dir = tempfile::tempdir().unwrap();
        let sender = Arc::new(ScriptedSender::ok());
        let shipper = shipper(test_config(&dir), sender.clone());

        shipper.enqueue(raw("a"));
        shipper.enqueue(raw("b"));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(sender.batches().is_empty());
        assert_eq!(shipper.stats().queued, 2);

        shipper.init().await;
        wait_until(|| !sender.batches().is_empty()).await;
        assert_eq!(sender.messages(), vec![vec!["a", "b"]]);

        shipper.close().await;
    }

    #[tokio::test]
    async fn test_init_prepends_recovered_records() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir);
        let recovered: Vec<LogRecord> = ["old-1", "old-2"]
            .map(|m| sanitize(&raw(m)).unwrap())
            .to_vec();
        std::fs::write(
            &config.backup_file_path,
            serde_json::to_vec(&recovered).unwrap(),
        )
        .unwrap();
        let path = config.backup_file_path.clone();

        let sender = Arc::new(ScriptedSender::ok());
        let shipper = shipper(config, sender.clone());
        shipper.enqueue(raw("new"));
        shipper.init().await;

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[]");
        wait_until(|| !sender.batches().is_empty()).await;
        assert_eq!(sender.messages()[0], vec!["old-1", "old-2"]);

        shipper.close().await;
        assert_eq!(
            sender.messages(),
            vec![vec!["old-1", "old-2"], vec!["new"]]
        );
    }

    #[tokio::test]
    async fn test_init_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let shipper = shipper(test_config(&dir), Arc::new(ScriptedSender::ok()));

        shipper.init().await;
        shipper.init().await;

        assert_eq!(shipper.lifecycle.lock().await.tasks.len(), 2);
        assert!(shipper.stats().initialized);
        shipper.close().await;
    }

    #[tokio::test]
    async fn test_close_backs_up_undeliverable_records() {
        let dir = tempfile::tempdir().unwrap();
        let config = ShipperConfig {
            retry_limit: 2,
            ..test_config(&dir)
        };
        let path = config.backup_file_path.clone();
        let failures = (0..3)
            .map(|_| Err(SendError::Transient("offline".to_string())))
            .collect();
        let sender = Arc::new(ScriptedSender::new(failures));
        let shipper = shipper(config, sender.clone());

        shipper.init().await;
        shipper.enqueue(raw("pending"));
        shipper.close().await;

        // One flush attempt plus two retry attempts.
        assert_eq!(sender.batches().len(), 3);
        let stored: Vec<LogRecord> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].message, "pending");

        let stats = shipper.stats();
        assert_eq!((stats.queued, stats.retrying, stats.in_flight), (0, 0, 0));
    }

    #[tokio::test]
    async fn test_close_twice_is_safe() {
        let dir = tempfile::tempdir().unwrap();
        let sender = Arc::new(ScriptedSender::ok());
        let shipper = shipper(test_config(&dir), sender.clone());

        shipper.init().await;
        shipper.enqueue(raw("a"));
        shipper.close().await;
        shipper.close().await;

        assert_eq!(sender.messages(), vec![vec!["a"]]);
    }

    #[tokio::test]
    async fn test_close_without_init_flushes_queue() {
        let dir = tempfile::tempdir().unwrap();
        let sender = Arc::new(ScriptedSender::ok());
        let shipper = shipper(test_config(&dir), sender.clone());

        shipper.enqueue(raw("a"));
        shipper.close().await;

        assert_eq!(sender.messages(), vec![vec!["a"]]);
    }

    #[tokio::test]
    async fn test_init_after_close_stays_closed() {
        let dir = tempfile::tempdir().unwrap();
        let config = ShipperConfig {
            flush_interval: Duration::from_millis(20),
            ..test_config(&dir)
        };
        let sender = Arc::new(ScriptedSender::ok());
        let shipper = shipper(config, sender.clone());

        shipper.close().await;
        shipper.init().await;
        shipper.enqueue(raw("late"));
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(sender.batches().is_empty());
        assert!(!shipper.stats().initialized);
        assert!(shipper.lifecycle.lock().await.tasks.is_empty());
    }

    #[tokio::test]
    #[traced_test]
    async fn test_enqueue_after_close_is_traced() {
        let dir = tempfile::tempdir().unwrap();
        let sender = Arc::new(ScriptedSender::ok());
        let shipper = shipper(test_config(&dir), sender.clone());
        shipper.init().await;
        shipper.close().await;

        shipper.enqueue(raw("late"));

        assert!(logs_contain("Record enqueued after close"));
        assert_eq!(shipper.stats().queued, 1);
        assert!(sender.batches().is_empty());
    }
}
