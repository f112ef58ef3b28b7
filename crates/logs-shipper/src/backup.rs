// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Durable file-backed store for records that could not be delivered.
//!
//! The file holds a single JSON array of [`LogRecord`]. Every mutation is a
//! read-modify-write of the whole file performed under an async mutex, so
//! concurrent writers from the flush path and the retry path queue up behind
//! each other instead of interleaving. The new content is written to a sibling
//! temporary file and renamed over the original, which means a reader never
//! sees a partially written array.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::BackupError;
use crate::record::LogRecord;

#[derive(Debug)]
pub struct BackupStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl BackupStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        BackupStore {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the backed up records. A missing, unreadable, empty or invalid
    /// file yields an empty sequence.
    pub async fn load(&self) -> Vec<LogRecord> {
        let _guard = self.write_lock.lock().await;
        match self.read_records().await {
            Ok(records) => records,
            Err(e) => {
                warn!("LOGS | {}", e);
                Vec::new()
            }
        }
    }

    /// Appends one record to the backup file.
    pub async fn backup(&self, record: LogRecord) -> Result<(), BackupError> {
        self.backup_all(&[record]).await
    }

    /// Appends `records` to the backup file, preserving their order.
    ///
    /// A file that exists but cannot be read is left untouched and reported
    /// as an error.
    pub async fn backup_all(&self, records: &[LogRecord]) -> Result<(), BackupError> {
        if records.is_empty() {
            return Ok(());
        }
        let _guard = self.write_lock.lock().await;
        let mut stored = self.read_records().await?;
        stored.extend_from_slice(records);
        self.write_records(&stored).await?;
        debug!(
            "LOGS | Backup file {} now holds {} records",
            self.path.display(),
            stored.len()
        );
        Ok(())
    }

    /// Resets the backup file to an empty array.
    pub async fn truncate(&self) -> Result<(), BackupError> {
        let _guard = self.write_lock.lock().await;
        self.write_records(&[]).await
    }

    /// Loads every backed up record and truncates the file in one step.
    ///
    /// If the truncation fails the records are left in the file and an error
    /// is returned, so they are neither lost nor delivered twice.
    pub async fn take_all(&self) -> Result<Vec<LogRecord>, BackupError> {
        let _guard = self.write_lock.lock().await;
        let records = self.read_records().await?;
        self.write_records(&[]).await?;
        Ok(records)
    }

    /// Missing, blank and invalid files read as empty. Any other I/O error is
    /// returned so callers never overwrite a file they could not read.
    async fn read_records(&self) -> Result<Vec<LogRecord>, BackupError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_error(e)),
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }

        match serde_json::from_slice::<Vec<LogRecord>>(&bytes) {
            Ok(records) => Ok(records),
            Err(e) => {
                warn!(
                    "LOGS | Ignoring invalid backup file {}: {}",
                    self.path.display(),
                    e
                );
                Ok(Vec::new())
            }
        }
    }

    async fn write_records(&self, records: &[LogRecord]) -> Result<(), BackupError> {
        let data = serde_json::to_vec(records)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| self.io_error(source))?;
        }

        let tmp_path = self.tmp_path();
        tokio::fs::write(&tmp_path, data)
            .await
            .map_err(|source| self.io_error(source))?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|source| self.io_error(source))
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(&self, source: std::io::Error) -> BackupError {
        BackupError::Io {
            path: self.path.clone(),
            source,
        }
    }
}
