//! File mailbox shared between the bridge and the consumer application.
//!
//! Both sides only ever exchange whole files inside a base directory:
//!
//! ```text
//! <base_dir>/
//! ├── card_scans/                 bridge writes, consumer reads
//! │   └── card_<scan_id>.json
//! ├── dispense_commands/          consumer writes, bridge reads and deletes
//! │   └── dispense_<id>.json
//! └── card_reader_status.json     bridge writes
//! ```
//!
//! # Components
//!
//! - [`ScanPublisher`] - one record per card event
//! - [`CommandQueue`] - ordered, at-least-once command intake
//! - [`StatusReporter`] - lifecycle status singleton
//! - [`RetentionSweeper`] - age-based cleanup of both directories
//!
//! Every write goes through [`atomic::write_json_atomic`], so a reader never
//! observes a partially written record.
//!
//! # Example
//!
//! ```no_run
//! use vendbridge_core::BridgeConfig;
//! use vendbridge_mailbox::Mailbox;
//!
//! # fn example() -> vendbridge_mailbox::MailboxResult<()> {
//! let mailbox = Mailbox::open(&BridgeConfig::new("/dev/ttyUSB0").base_dir("/srv/kiosk"))?;
//! let record = mailbox.scans.publish("04A1B2C3")?;
//! println!("published scan {}", record.scan_id);
//! # Ok(())
//! # }
//! ```

pub mod atomic;
pub mod commands;
pub mod error;
pub mod retention;
pub mod scans;
pub mod status;

use std::fs;

use tracing::debug;

use vendbridge_core::BridgeConfig;

pub use commands::{CommandQueue, QueueEntry};
pub use error::{MailboxError, MailboxResult};
pub use retention::{RetentionSweeper, SweepReport};
pub use scans::ScanPublisher;
pub use status::StatusReporter;

/// All mailbox endpoints for one base directory.
#[derive(Debug, Clone)]
pub struct Mailbox {
    pub scans: ScanPublisher,
    pub commands: CommandQueue,
    pub status: StatusReporter,
    pub sweeper: RetentionSweeper,
}

impl Mailbox {
    /// Build the endpoints described by `config` without touching the disk.
    pub fn new(config: &BridgeConfig) -> Self {
        Self {
            scans: ScanPublisher::new(config.scan_dir()),
            commands: CommandQueue::new(config.command_dir()),
            status: StatusReporter::new(config.status_file(), &config.serial_port),
            sweeper: RetentionSweeper::new(
                config.scan_dir(),
                config.command_dir(),
                config.scan_retention,
                config.command_retention,
            ),
        }
    }

    /// Build the endpoints and create both mailbox directories.
    ///
    /// # Errors
    ///
    /// Returns `MailboxError::Io` if a directory cannot be created.
    pub fn open(config: &BridgeConfig) -> MailboxResult<Self> {
        let mailbox = Self::new(config);
        mailbox.ensure_dirs()?;
        Ok(mailbox)
    }

    /// Create the scan and command directories if they are missing.
    ///
    /// # Errors
    ///
    /// Returns `MailboxError::Io` if a directory cannot be created.
    pub fn ensure_dirs(&self) -> MailboxResult<()> {
        for dir in [self.scans.dir(), self.commands.dir()] {
            fs::create_dir_all(dir).map_err(|e| MailboxError::io(dir, e))?;
            debug!(dir = %dir.display(), "Mailbox directory ready");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_creates_directories() {
        let root = tempfile::tempdir().unwrap();
        let config = BridgeConfig::new("COM3").base_dir(root.path().join("nested"));

        let mailbox = Mailbox::open(&config).unwrap();

        assert!(config.scan_dir().is_dir());
        assert!(config.command_dir().is_dir());
        assert_eq!(mailbox.status.path(), config.status_file());
        assert!(!config.status_file().exists());
    }

    #[test]
    fn test_open_is_idempotent() {
        let root = tempfile::tempdir().unwrap();
        let config = BridgeConfig::new("COM3").base_dir(root.path());

        Mailbox::open(&config).unwrap();
        Mailbox::open(&config).unwrap();
    }

    #[test]
    fn test_open_fails_when_base_is_a_file() {
        let root = tempfile::tempdir().unwrap();
        let base = root.path().join("occupied");
        fs::write(&base, "x").unwrap();

        let err = Mailbox::open(&BridgeConfig::new("COM3").base_dir(&base)).unwrap_err();
        assert!(matches!(err, MailboxError::Io { .. }));
    }
}
