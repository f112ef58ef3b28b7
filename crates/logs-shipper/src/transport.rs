// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;

use crate::record::RawRecord;
use crate::shipper::LogShipper;

/// Narrow interface a host logging framework adapter talks to.
#[async_trait]
pub trait LogTransport: Send + Sync {
    /// Hands over one record. `on_accepted` runs as soon as the record is
    /// queued, before it is delivered.
    fn log(&self, record: RawRecord, on_accepted: Box<dyn FnOnce() + Send>);

    /// Flushes what is pending and stops background work.
    async fn close(&self);
}

#[async_trait]
impl LogTransport for LogShipper {
    fn log(&self, record: RawRecord, on_accepted: Box<dyn FnOnce() + Send>) {
        self.enqueue(record);
        on_accepted();
    }

    async fn close(&self) {
        LogShipper::close(self).await;
    }
}
