// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Validation and sanitization of raw log records.
//!
//! The host hands the shipper loosely typed JSON values. Before a record is
//! sent or persisted it is reduced to exactly three fields:
//!
//! ```json
//! {"level": "info", "message": "request completed", "timestamp": "2024-05-01T12:00:00.000Z"}
//! ```
//!
//! Any other field on the raw value is dropped. A `serde_json::Value` is an
//! owned tree, so cyclic structures cannot reach the network or the backup
//! file.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::constants::{MAX_LEVEL_CHARS, MAX_MESSAGE_CHARS};

/// A record as delivered by the host, before validation.
pub type RawRecord = Value;

/// A sanitized log record, the unit of delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub level: String,
    pub message: String,
    /// RFC 3339 with millisecond precision in UTC, e.g. `2024-05-01T12:00:00.000Z`.
    pub timestamp: String,
}

impl LogRecord {
    #[must_use]
    pub fn new(level: &str, message: &str, timestamp: DateTime<Utc>) -> Self {
        LogRecord {
            level: truncate_chars(level, MAX_LEVEL_CHARS),
            message: truncate_chars(message, MAX_MESSAGE_CHARS),
            timestamp: format_timestamp(timestamp),
        }
    }
}

impl From<LogRecord> for RawRecord {
    fn from(record: LogRecord) -> Self {
        serde_json::json!({
            "level": record.level,
            "message": record.message,
            "timestamp": record.timestamp,
        })
    }
}

/// Returns true iff `level` and `message` are strings and `timestamp` is a valid instant.
#[must_use]
pub fn validate(record: &RawRecord) -> bool {
    let Some(fields) = record.as_object() else {
        return false;
    };
    fields.get("level").is_some_and(Value::is_string)
        && fields.get("message").is_some_and(Value::is_string)
        && fields.get("timestamp").and_then(parse_timestamp).is_some()
}

/// Reduces a raw record to a bounded [`LogRecord`], or `None` if it is invalid.
#[must_use]
pub fn sanitize(record: &RawRecord) -> Option<LogRecord> {
    let fields = record.as_object()?;
    let level = fields.get("level")?.as_str()?;
    let message = fields.get("message")?.as_str()?;
    let timestamp = fields.get("timestamp").and_then(parse_timestamp)?;
    Some(LogRecord::new(level, message, timestamp))
}

/// Sanitizes a batch taken from the ingestion queue, dropping invalid records.
pub(crate) fn sanitize_batch(raw: Vec<RawRecord>) -> Vec<LogRecord> {
    let total = raw.len();
    let batch: Vec<LogRecord> = raw.iter().filter_map(sanitize).collect();
    if batch.len() < total {
        debug!(
            "LOGS | Dropped {} invalid records out of {}",
            total - batch.len(),
            total
        );
    }
    batch
}

/// Accepts RFC 3339 strings and integer milliseconds since the Unix epoch.
fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|ts| ts.with_timezone(&Utc)),
        Value::Number(n) => n
            .as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
        _ => None,
    }
}

#[must_use]
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
