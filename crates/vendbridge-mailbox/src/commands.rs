//! Dispense command queue backed by a directory.
//!
//! # Delivery Semantics
//!
//! - **Ordered**: [`CommandQueue::pending`] sorts entries by modification
//!   time, then by file name, instead of trusting directory order.
//! - **At-least-once**: a file stays on disk until it is acknowledged. A
//!   daemon that dies mid-dispense sees the same command again on restart.
//! - **Explicit acknowledgment**: [`CommandQueue::ack`] deletes an executed
//!   command, [`CommandQueue::reject`] deletes one that will never run. No
//!   other state is ever written back.
//!
//! # Example
//!
//! ```no_run
//! use vendbridge_core::{DispenseCommand, ProductType};
//! use vendbridge_mailbox::CommandQueue;
//!
//! # fn example() -> vendbridge_mailbox::MailboxResult<()> {
//! let queue = CommandQueue::new("dispense_commands");
//! queue.submit(&DispenseCommand::new("1700000000000", ProductType::Pad))?;
//!
//! for entry in queue.pending()? {
//!     match queue.load(&entry) {
//!         Ok(command) => println!("{} -> {}", entry.file_name(), command.product_type),
//!         Err(e) if e.is_rejection() => { queue.reject(&entry)?; }
//!         Err(e) => return Err(e),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde_json::Value;
use tracing::{debug, info};

use crate::atomic::write_json_atomic;
use crate::error::{MailboxError, MailboxResult};
use vendbridge_core::constants::{COMMAND_FILE_PREFIX, RECORD_EXTENSION, command_file_name};
use vendbridge_core::{CommandStatus, DispenseCommand, ProductType};

/// A command file waiting in the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    path: PathBuf,
    file_name: String,
    modified: SystemTime,
}

impl QueueEntry {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Modification time used for ordering.
    pub fn modified(&self) -> SystemTime {
        self.modified
    }

    /// Id encoded in the file name (`dispense_<id>.json`).
    pub fn file_id(&self) -> &str {
        self.file_name
            .strip_prefix(COMMAND_FILE_PREFIX)
            .and_then(|rest| rest.strip_suffix(RECORD_EXTENSION))
            .unwrap_or(&self.file_name)
    }
}

/// Directory of pending `dispense_*.json` files.
#[derive(Debug, Clone)]
pub struct CommandQueue {
    dir: PathBuf,
}

impl CommandQueue {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// List pending commands, oldest first.
    ///
    /// Files that vanish between listing and inspection are skipped.
    ///
    /// # Errors
    ///
    /// Returns `MailboxError::Io` if the directory cannot be read.
    pub fn pending(&self) -> MailboxResult<Vec<QueueEntry>> {
        let read_dir = fs::read_dir(&self.dir).map_err(|e| MailboxError::io(&self.dir, e))?;
        let mut entries = Vec::new();

        for item in read_dir {
            let item = item.map_err(|e| MailboxError::io(&self.dir, e))?;
            let Some(file_name) = item.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            if !is_command_file(&file_name) {
                continue;
            }

            let metadata = match item.metadata() {
                Ok(metadata) => metadata,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(MailboxError::io(item.path(), e)),
            };
            if !metadata.is_file() {
                continue;
            }

            entries.push(QueueEntry {
                path: item.path(),
                file_name,
                modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            });
        }

        entries.sort_by(|a, b| {
            a.modified
                .cmp(&b.modified)
                .then_with(|| a.file_name.cmp(&b.file_name))
        });
        Ok(entries)
    }

    /// Read and validate one command.
    ///
    /// Decoding is lenient about everything except the product:
    /// `command_id` may be a string or a number (and falls back to the id in
    /// the file name), `timestamp` and `status` may be missing.
    ///
    /// # Errors
    ///
    /// - `MailboxError::Io` if the file cannot be read
    /// - `MailboxError::Parse` if the content is not a JSON object
    /// - `MailboxError::InvalidProductType` if `product_type` is missing or
    ///   not a product the dispenser carries
    pub fn load(&self, entry: &QueueEntry) -> MailboxResult<DispenseCommand> {
        let bytes = fs::read(&entry.path).map_err(|e| MailboxError::io(&entry.path, e))?;

        let value: Value = serde_json::from_slice(&bytes).map_err(|e| MailboxError::Parse {
            path: entry.path.clone(),
            message: e.to_string(),
        })?;
        let Value::Object(fields) = value else {
            return Err(MailboxError::Parse {
                path: entry.path.clone(),
                message: "expected a JSON object".to_string(),
            });
        };

        let product_value = fields.get("product_type").and_then(Value::as_str);
        let product_type = product_value
            .and_then(|raw| raw.parse::<ProductType>().ok())
            .ok_or_else(|| MailboxError::InvalidProductType {
                path: entry.path.clone(),
                value: fields.get("product_type").map(render_value),
            })?;

        let command_id = match fields.get("command_id") {
            Some(Value::String(id)) => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            _ => entry.file_id().to_string(),
        };

        let timestamp = fields
            .get("timestamp")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        Ok(DispenseCommand {
            command_id,
            product_type,
            timestamp,
            status: CommandStatus::Pending,
        })
    }

    /// Delete an executed command.
    ///
    /// Returns `false` if the file was already gone.
    ///
    /// # Errors
    ///
    /// Returns `MailboxError::Io` if deletion fails for another reason.
    pub fn ack(&self, entry: &QueueEntry) -> MailboxResult<bool> {
        let removed = remove_if_present(&entry.path)?;
        if removed {
            info!(file = %entry.file_name, "Command acknowledged");
        } else {
            debug!(file = %entry.file_name, "Command already removed before ack");
        }
        Ok(removed)
    }

    /// Delete a command that will not be executed.
    ///
    /// Returns `false` if the file was already gone.
    ///
    /// # Errors
    ///
    /// Returns `MailboxError::Io` if deletion fails for another reason.
    pub fn reject(&self, entry: &QueueEntry) -> MailboxResult<bool> {
        let removed = remove_if_present(&entry.path)?;
        debug!(file = %entry.file_name, removed, "Command rejected");
        Ok(removed)
    }

    /// Enqueue a command atomically (consumer side of the protocol).
    ///
    /// # Errors
    ///
    /// Returns `MailboxError::Io` if the file cannot be written.
    pub fn submit(&self, command: &DispenseCommand) -> MailboxResult<PathBuf> {
        let path = self.dir.join(command_file_name(&command.command_id));
        write_json_atomic(&path, command)?;
        info!(
            command_id = %command.command_id,
            product = %command.product_type,
            "Command submitted"
        );
        Ok(path)
    }
}

fn is_command_file(name: &str) -> bool {
    name.starts_with(COMMAND_FILE_PREFIX) && name.ends_with(RECORD_EXTENSION)
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn remove_if_present(path: &Path) -> MailboxResult<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(MailboxError::io(path, e)),
    }
}
