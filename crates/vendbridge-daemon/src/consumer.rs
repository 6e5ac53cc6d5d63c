//! Dispense lane: pulls commands from the queue and drives the motor.
//!
//! The consumer holds at most one command in flight. Dispatching writes
//! `DISPENSE:<product>` and arms a deadline `now + dwell`; the command file is
//! acknowledged (deleted) only once that deadline has passed. Until then every
//! poll returns [`PollOutcome::Busy`] without touching the directory, while
//! the main loop keeps reading the serial link.
//!
//! If the daemon stops during a dwell the command file stays on disk and is
//! dispatched again on the next start.
//!
//! A dispensed command whose file cannot be deleted is held back: later polls
//! retry the delete before anything else and never dispatch it a second time.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::error::{BridgeError, Result};
use vendbridge_core::DispenseCommand;
use vendbridge_hardware::SerialLink;
use vendbridge_mailbox::{CommandQueue, QueueEntry};

/// Result of one [`CommandConsumer::poll`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// A command is in flight; the directory was not read.
    Busy,

    /// Nothing dispatchable was pending.
    Idle { rejected: usize },

    /// A command was written to the firmware and is now in flight.
    Dispatched {
        command: DispenseCommand,
        rejected: usize,
    },
}

impl PollOutcome {
    pub fn rejected(&self) -> usize {
        match self {
            Self::Busy => 0,
            Self::Idle { rejected } | Self::Dispatched { rejected, .. } => *rejected,
        }
    }
}

#[derive(Debug)]
struct InFlight {
    entry: QueueEntry,
    command: DispenseCommand,
    deadline: Instant,
}

/// Polling consumer of the dispense command queue.
#[derive(Debug)]
pub struct CommandConsumer {
    queue: CommandQueue,
    dwell: Duration,
    in_flight: Option<InFlight>,
    /// Dispensed, but the ack failed.
    unacked: Option<InFlight>,
}

impl CommandConsumer {
    pub fn new(queue: CommandQueue, dwell: Duration) -> Self {
        Self {
            queue,
            dwell,
            in_flight: None,
            unacked: None,
        }
    }

    /// Returns `true` while a command is in flight.
    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// The command currently in flight.
    pub fn in_flight(&self) -> Option<&DispenseCommand> {
        self.in_flight.as_ref().map(|f| &f.command)
    }

    /// The dispensed command whose file is still waiting to be deleted.
    pub fn unacked(&self) -> Option<&DispenseCommand> {
        self.unacked.as_ref().map(|f| &f.command)
    }

    /// Inspect the queue and dispatch the oldest valid command.
    ///
    /// Entries that cannot be decoded or name an unknown product are deleted
    /// on the way. At most one command is dispatched per call.
    ///
    /// # Errors
    ///
    /// - `BridgeError::Filesystem` if the queue directory cannot be listed,
    ///   or a held-back command still cannot be deleted
    /// - `BridgeError::SerialIo` if the dispense request cannot be written;
    ///   the command file is left in place
    pub async fn poll<L: SerialLink>(&mut self, link: &mut L) -> Result<PollOutcome> {
        if self.in_flight.is_some() {
            return Ok(PollOutcome::Busy);
        }
        self.retry_ack()?;

        let mut rejected = 0;
        for entry in self.queue.pending()? {
            let command = match self.queue.load(&entry) {
                Ok(command) => command,
                Err(e) if e.is_not_found() => {
                    debug!(file = %entry.file_name(), "Command vanished before load");
                    continue;
                }
                Err(e) => {
                    self.reject(&entry, BridgeError::from(e));
                    rejected += 1;
                    continue;
                }
            };

            info!(
                command_id = %command.command_id,
                product = %command.product_type,
                "Dispensing"
            );
            link.write_command(command.product_type)
                .await
                .map_err(BridgeError::SerialIo)?;

            self.in_flight = Some(InFlight {
                entry,
                command: command.clone(),
                deadline: Instant::now() + self.dwell,
            });
            return Ok(PollOutcome::Dispatched { command, rejected });
        }

        Ok(PollOutcome::Idle { rejected })
    }

    /// Acknowledge the in-flight command once its dwell has elapsed.
    ///
    /// Returns the completed command, or `None` if nothing was due.
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::Filesystem` if the command file cannot be
    /// deleted. The lane is freed and the command is held back until a later
    /// poll manages to delete it.
    pub fn complete_due(&mut self, now: Instant) -> Result<Option<DispenseCommand>> {
        let Some(done) = self.in_flight.take_if(|f| now >= f.deadline) else {
            return Ok(None);
        };

        if let Err(e) = self.queue.ack(&done.entry) {
            error!(
                command_id = %done.command.command_id,
                file = %done.entry.file_name(),
                error = %e,
                "Dispensed command could not be acknowledged, holding it back"
            );
            self.unacked = Some(done);
            return Err(e.into());
        }
        info!(command_id = %done.command.command_id, "Dispense complete");
        Ok(Some(done.command))
    }

    fn retry_ack(&mut self) -> Result<()> {
        let Some(held) = self.unacked.take() else {
            return Ok(());
        };
        match self.queue.ack(&held.entry) {
            Ok(_) => {
                info!(command_id = %held.command.command_id, "Held-back command acknowledged");
                Ok(())
            }
            Err(e) => {
                debug!(command_id = %held.command.command_id, error = %e, "Ack retry failed");
                self.unacked = Some(held);
                Err(e.into())
            }
        }
    }

    /// Drop the in-flight command without acknowledging it.
    pub fn abandon(&mut self) -> Option<DispenseCommand> {
        let in_flight = self.in_flight.take()?;
        warn!(
            command_id = %in_flight.command.command_id,
            file = %in_flight.entry.file_name(),
            "Dispense interrupted, command left in queue"
        );
        Some(in_flight.command)
    }

    fn reject(&self, entry: &QueueEntry, reason: BridgeError) {
        warn!(file = %entry.file_name(), error = %reason, "Rejecting command");
        if let Err(e) = self.queue.reject(entry) {
            warn!(file = %entry.file_name(), error = %e, "Failed to delete rejected command");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use vendbridge_core::ProductType;
    use vendbridge_hardware::mock::MockSerial;

    const DWELL: Duration = Duration::from_secs(5);

    fn write_raw(dir: &Path, name: &str, body: &str) {
        fs::write(dir.join(name), body).unwrap();
    }

    fn consumer(dir: &Path) -> CommandConsumer {
        CommandConsumer::new(CommandQueue::new(dir), DWELL)
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatch_then_ack_after_dwell() {
        let dir = tempfile::tempdir().unwrap();
        write_raw(dir.path(), "dispense_1.json", r#"{"command_id":"1","product_type":"pad"}"#);
        let (mut link, handle) = MockSerial::new();
        let mut consumer = consumer(dir.path());

        let start = Instant::now();
        let outcome = consumer.poll(&mut link).await.unwrap();
        assert!(matches!(outcome, PollOutcome::Dispatched { .. }));
        assert_eq!(handle.written(), vec!["DISPENSE:pad\n"]);
        assert!(consumer.is_busy());

        assert_eq!(consumer.complete_due(start + Duration::from_millis(4999)).unwrap(), None);
        assert!(dir.path().join("dispense_1.json").exists());

        let done = consumer.complete_due(start + DWELL).unwrap().unwrap();
        assert_eq!(done.command_id, "1");
        assert!(!dir.path().join("dispense_1.json").exists());
        assert!(!consumer.is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn test_busy_lane_does_not_dispatch_again() {
        let dir = tempfile::tempdir().unwrap();
        write_raw(dir.path(), "dispense_1.json", r#"{"product_type":"pad"}"#);
        let (mut link, handle) = MockSerial::new();
        let mut consumer = consumer(dir.path());

        consumer.poll(&mut link).await.unwrap();
        write_raw(dir.path(), "dispense_2.json", r#"{"product_type":"tampon"}"#);

        tokio::time::advance(Duration::from_secs(1)).await;
        let outcome = consumer.poll(&mut link).await.unwrap();
        assert_eq!(outcome, PollOutcome::Busy);
        assert_eq!(handle.written().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dwell_counts_from_completed_write() {
        let dir = tempfile::tempdir().unwrap();
        write_raw(dir.path(), "dispense_1.json", r#"{"product_type":"pad"}"#);
        let (mut link, handle) = MockSerial::new();
        handle.delay_writes(Duration::from_millis(300));
        let mut consumer = consumer(dir.path());

        let start = Instant::now();
        consumer.poll(&mut link).await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_millis(300));

        assert_eq!(consumer.complete_due(start + DWELL).unwrap(), None);
        assert!(dir.path().join("dispense_1.json").exists());

        let written_at = start + Duration::from_millis(300);
        assert!(consumer.complete_due(written_at + DWELL).unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_ack_is_retried_without_dispatching_again() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dispense_1.json");
        write_raw(dir.path(), "dispense_1.json", r#"{"command_id":"1","product_type":"pad"}"#);
        let (mut link, handle) = MockSerial::new();
        let mut consumer = consumer(dir.path());

        consumer.poll(&mut link).await.unwrap();

        // A non-empty directory in place of the file makes the delete fail.
        fs::remove_file(&path).unwrap();
        fs::create_dir(&path).unwrap();
        fs::write(path.join("lock"), "").unwrap();

        let err = consumer.complete_due(Instant::now() + DWELL).unwrap_err();
        assert!(matches!(err, BridgeError::Filesystem(_)));
        assert!(!consumer.is_busy());
        assert_eq!(consumer.unacked().unwrap().command_id, "1");

        let err = consumer.poll(&mut link).await.unwrap_err();
        assert!(matches!(err, BridgeError::Filesystem(_)));
        assert!(consumer.unacked().is_some());

        fs::remove_dir_all(&path).unwrap();
        write_raw(dir.path(), "dispense_1.json", r#"{"command_id":"1","product_type":"pad"}"#);

        let outcome = consumer.poll(&mut link).await.unwrap();
        assert_eq!(outcome, PollOutcome::Idle { rejected: 0 });
        assert!(consumer.unacked().is_none());
        assert!(!path.exists());
        assert_eq!(handle.written(), vec!["DISPENSE:pad\n"]);
    }

    #[tokio::test]
    async fn test_invalid_product_rejected_without_write() {
        let dir = tempfile::tempdir().unwrap();
        write_raw(dir.path(), "dispense_1.json", r#"{"product_type":"soda"}"#);
        let (mut link, handle) = MockSerial::new();
        let mut consumer = consumer(dir.path());

        let outcome = consumer.poll(&mut link).await.unwrap();

        assert_eq!(outcome, PollOutcome::Idle { rejected: 1 });
        assert!(handle.written().is_empty());
        assert!(!dir.path().join("dispense_1.json").exists());
    }

    #[tokio::test]
    async fn test_rejects_before_dispatching_next_valid() {
        let dir = tempfile::tempdir().unwrap();
        write_raw(dir.path(), "dispense_1.json", "{broken");
        write_raw(dir.path(), "dispense_2.json", r#"{"product_type":"tampon"}"#);
        let (mut link, handle) = MockSerial::new();
        let mut consumer = consumer(dir.path());

        let outcome = consumer.poll(&mut link).await.unwrap();

        assert_eq!(outcome.rejected(), 1);
        assert_eq!(consumer.in_flight().unwrap().product_type, ProductType::Tampon);
        assert_eq!(handle.written(), vec!["DISPENSE:tampon\n"]);
        assert!(dir.path().join("dispense_2.json").exists());
    }

    #[tokio::test]
    async fn test_write_failure_keeps_command_file() {
        let dir = tempfile::tempdir().unwrap();
        write_raw(dir.path(), "dispense_1.json", r#"{"product_type":"pad"}"#);
        let (mut link, handle) = MockSerial::new();
        handle.fail_writes(true);
        let mut consumer = consumer(dir.path());

        let err = consumer.poll(&mut link).await.unwrap_err();

        assert!(err.is_fatal());
        assert!(!consumer.is_busy());
        assert!(dir.path().join("dispense_1.json").exists());
    }

    #[tokio::test]
    async fn test_missing_directory_is_filesystem_error() {
        let dir = tempfile::tempdir().unwrap();
        let (mut link, _handle) = MockSerial::new();
        let mut consumer = consumer(&dir.path().join("missing"));

        let err = consumer.poll(&mut link).await.unwrap_err();
        assert!(matches!(err, BridgeError::Filesystem(_)));
        assert!(!err.is_fatal());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ack_of_vanished_file_completes() {
        let dir = tempfile::tempdir().unwrap();
        write_raw(dir.path(), "dispense_1.json", r#"{"product_type":"pad"}"#);
        let (mut link, _handle) = MockSerial::new();
        let mut consumer = consumer(dir.path());

        let start = Instant::now();
        consumer.poll(&mut link).await.unwrap();
        fs::remove_file(dir.path().join("dispense_1.json")).unwrap();

        assert!(consumer.complete_due(start + DWELL).unwrap().is_some());
        assert!(!consumer.is_busy());
    }

    #[tokio::test]
    async fn test_abandon_leaves_file() {
        let dir = tempfile::tempdir().unwrap();
        write_raw(dir.path(), "dispense_1.json", r#"{"product_type":"pad"}"#);
        let (mut link, _handle) = MockSerial::new();
        let mut consumer = consumer(dir.path());

        consumer.poll(&mut link).await.unwrap();
        assert!(consumer.abandon().is_some());
        assert!(consumer.abandon().is_none());
        assert!(dir.path().join("dispense_1.json").exists());
    }
}
