//! Lifecycle status file.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::atomic::write_json_atomic;
use crate::error::{MailboxError, MailboxResult};
use vendbridge_core::{DaemonPhase, StatusRecord};

/// Writes the singleton `card_reader_status.json`.
///
/// The file is replaced through a rename, so an observer polling it never
/// reads a torn record.
#[derive(Debug, Clone)]
pub struct StatusReporter {
    path: PathBuf,
    serial_port: String,
}

impl StatusReporter {
    pub fn new(path: impl Into<PathBuf>, serial_port: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            serial_port: serial_port.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Overwrite the status record with `phase` and `message`.
    ///
    /// # Errors
    ///
    /// Returns `MailboxError::Io` if the record cannot be written.
    pub fn set_status(
        &self,
        phase: DaemonPhase,
        message: impl Into<String>,
    ) -> MailboxResult<StatusRecord> {
        let record = StatusRecord::new(phase, message, &self.serial_port);
        write_json_atomic(&self.path, &record)?;
        debug!(status = %record.status, message = %record.message, "Status written");
        Ok(record)
    }

    /// Read the current status record.
    ///
    /// # Errors
    ///
    /// Returns `MailboxError::Io` if the file cannot be read and
    /// `MailboxError::Parse` if it does not hold a status record.
    pub fn read(&self) -> MailboxResult<StatusRecord> {
        let bytes = fs::read(&self.path).map_err(|e| MailboxError::io(&self.path, e))?;
        serde_json::from_slice(&bytes).map_err(|e| MailboxError::Parse {
            path: self.path.clone(),
            message: e.to_string(),
        })
    }
}
