// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! State shared by the flush scheduler, the retry engine and the lifecycle
//! controller of one shipper instance.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tracing::{error, warn};

use crate::backup::BackupStore;
use crate::config::ShipperConfig;
use crate::constants::EVENT_CHANNEL_CAPACITY;
use crate::record::{LogRecord, RawRecord};
use crate::sender::LogSender;

/// Notifications about records leaving the in-memory pipeline through the backup path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShipperEvent {
    /// `count` records were persisted to the backup file.
    BackedUp { count: usize },
    /// Persisting `count` records failed; they were returned to the retry queue.
    BackupFailed { count: usize, error: String },
}

/// Point-in-time view of where records currently are.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShipperStats {
    pub queued: usize,
    pub retrying: usize,
    pub in_flight: usize,
    pub initialized: bool,
}

#[derive(Debug, Default)]
pub(crate) struct QueueState {
    pub ingestion: VecDeque<RawRecord>,
    pub retry: Vec<LogRecord>,
    pub in_flight: usize,
    /// Size trigger and timer flushes only run while armed: after `init()`
    /// and until `close()`.
    pub armed: bool,
    pub initialized: bool,
    /// Set once `close()` has made its final retry pass. Transient failures
    /// that complete afterwards are backed up instead of queued for retry.
    pub closed: bool,
}

pub(crate) struct Pipeline {
    pub config: Arc<ShipperConfig>,
    pub sender: Arc<dyn LogSender>,
    pub backup: BackupStore,
    state: Mutex<QueueState>,
    events: broadcast::Sender<ShipperEvent>,
}

impl Pipeline {
    pub fn new(config: Arc<ShipperConfig>, sender: Arc<dyn LogSender>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Pipeline {
            backup: BackupStore::new(config.backup_file_path.clone()),
            config,
            sender,
            state: Mutex::new(QueueState::default()),
            events,
        }
    }

    /// Never held across an `.await`.
    pub fn state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ShipperEvent> {
        self.events.subscribe()
    }

    pub fn stats(&self) -> ShipperStats {
        let state = self.state();
        ShipperStats {
            queued: state.ingestion.len(),
            retrying: state.retry.len(),
            in_flight: state.in_flight,
            initialized: state.initialized,
        }
    }

    /// Persists records that cannot be delivered. On I/O failure the records
    /// go back to the retry queue and a [`ShipperEvent::BackupFailed`] is emitted.
    pub async fn back_up(&self, records: Vec<LogRecord>) {
        let count = records.len();
        if count == 0 {
            return;
        }
        match self.backup.backup_all(&records).await {
            Ok(()) => {
                warn!(
                    "LOGS | Backed up {} undeliverable records to {}",
                    count,
                    self.backup.path().display()
                );
                self.emit(ShipperEvent::BackedUp { count });
            }
            Err(e) => {
                error!("LOGS | Failed to back up {} records: {}", count, e);
                self.state().retry.extend(records);
                self.emit(ShipperEvent::BackupFailed {
                    count,
                    error: e.to_string(),
                });
            }
        }
    }

    pub fn emit(&self, event: ShipperEvent) {
        // No subscribers is not an error.
        let _ = self.events.send(event);
    }
}

/// Counts one batch as in flight for as long as it is alive.
pub(crate) struct InFlightGuard {
    pipeline: Arc<Pipeline>,
}

impl InFlightGuard {
    /// Pairs with an `in_flight` increment already made by the caller. The
    /// guard must not be dropped while the caller still holds the state lock.
    pub fn adopt(pipeline: Arc<Pipeline>) -> Self {
        InFlightGuard { pipeline }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut state = self.pipeline.state();
        state.in_flight = state.in_flight.saturating_sub(1);
    }
}
