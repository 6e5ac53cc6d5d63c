//! Scan record publication.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::atomic::write_json_atomic;
use crate::error::{MailboxError, MailboxResult};
use vendbridge_core::constants::scan_file_name;
use vendbridge_core::{ScanId, ScanRecord};

/// Fresh ids drawn before giving up on a colliding scan.
const MAX_ID_ATTEMPTS: usize = 4;

/// Publishes one `card_<scan_id>.json` file per card event.
///
/// Every call produces a new record, even for a card that was just
/// scanned: the consumer decides what a repeated scan means.
#[derive(Debug, Clone)]
pub struct ScanPublisher {
    dir: PathBuf,
}

impl ScanPublisher {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Final path of the record with the given id.
    pub fn path_for(&self, scan_id: &ScanId) -> PathBuf {
        self.dir.join(scan_file_name(scan_id.as_str()))
    }

    /// Publish a scan record for `card_uid`.
    ///
    /// # Errors
    ///
    /// Returns `MailboxError::Io` if the record cannot be written and
    /// `MailboxError::ScanIdExhausted` if every drawn id was taken. The
    /// caller drops the event; there is no retry.
    pub fn publish(&self, card_uid: &str) -> MailboxResult<ScanRecord> {
        for _ in 0..MAX_ID_ATTEMPTS {
            let record = ScanRecord::new(card_uid);
            let path = self.path_for(&record.scan_id);

            if path.exists() {
                debug!(scan_id = %record.scan_id, "Scan id collision, drawing another");
                continue;
            }

            write_json_atomic(&path, &record)?;
            info!(
                card_uid = %record.card_uid,
                scan_id = %record.scan_id,
                path = %path.display(),
                "Card scan published"
            );
            return Ok(record);
        }

        Err(MailboxError::ScanIdExhausted {
            attempts: MAX_ID_ATTEMPTS,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use vendbridge_core::ScanStatus;

    fn read_record(path: &Path) -> ScanRecord {
        serde_json::from_slice(&fs::read(path).unwrap()).unwrap()
    }

    #[test]
    fn test_publish_writes_complete_record() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = ScanPublisher::new(dir.path());

        let record = publisher.publish("X").unwrap();
        let path = publisher.path_for(&record.scan_id);

        let on_disk = read_record(&path);
        assert_eq!(on_disk.card_uid, "X");
        assert_eq!(on_disk.status, ScanStatus::New);
        assert_eq!(on_disk.scan_id, record.scan_id);
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            format!("card_{}.json", record.scan_id)
        );
    }

    #[test]
    fn test_publish_exact_field_set() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = ScanPublisher::new(dir.path());

        let record = publisher.publish("04A1B2C3").unwrap();
        let value: serde_json::Value =
            serde_json::from_slice(&fs::read(publisher.path_for(&record.scan_id)).unwrap())
                .unwrap();

        let mut keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, vec!["card_uid", "scan_id", "status", "timestamp"]);
    }

    #[test]
    fn test_repeated_scans_are_distinct() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = ScanPublisher::new(dir.path());

        let first = publisher.publish("SAME").unwrap();
        let second = publisher.publish("SAME").unwrap();

        assert_ne!(first.scan_id, second.scan_id);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn test_publish_into_missing_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = ScanPublisher::new(dir.path().join("gone"));

        let err = publisher.publish("X").unwrap_err();
        assert!(matches!(err, MailboxError::Io { .. }));
    }
}
