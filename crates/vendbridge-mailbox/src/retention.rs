//! Age-based cleanup of the mailbox directories.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::{debug, info, warn};

use vendbridge_core::constants::{
    COMMAND_FILE_PREFIX, RECORD_EXTENSION, SCAN_FILE_PREFIX, TEMP_SUFFIX,
};

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub scans_removed: usize,
    pub commands_removed: usize,
    /// Temporary files abandoned by an interrupted write.
    pub temp_removed: usize,
    pub failures: usize,
}

impl SweepReport {
    pub fn total_removed(&self) -> usize {
        self.scans_removed + self.commands_removed + self.temp_removed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileClass {
    Scan,
    Command,
    Temp,
}

/// Deletes scan and command files older than their retention age.
///
/// A file is removed when `now - mtime` is strictly greater than the
/// retention of its directory. Files with an mtime in the future are kept.
#[derive(Debug, Clone)]
pub struct RetentionSweeper {
    scan_dir: PathBuf,
    command_dir: PathBuf,
    scan_retention: Duration,
    command_retention: Duration,
}

impl RetentionSweeper {
    pub fn new(
        scan_dir: impl Into<PathBuf>,
        command_dir: impl Into<PathBuf>,
        scan_retention: Duration,
        command_retention: Duration,
    ) -> Self {
        Self {
            scan_dir: scan_dir.into(),
            command_dir: command_dir.into(),
            scan_retention,
            command_retention,
        }
    }

    /// Sweep both directories against the current wall clock.
    pub fn sweep(&self) -> SweepReport {
        self.sweep_at(SystemTime::now())
    }

    /// Sweep both directories against `now`.
    ///
    /// Failures are counted and logged; one bad file never stops the sweep.
    pub fn sweep_at(&self, now: SystemTime) -> SweepReport {
        let mut report = SweepReport::default();

        self.sweep_dir(&self.scan_dir, SCAN_FILE_PREFIX, self.scan_retention, now, &mut report);
        self.sweep_dir(
            &self.command_dir,
            COMMAND_FILE_PREFIX,
            self.command_retention,
            now,
            &mut report,
        );
        Self::log_report(&report);
        report
    }

    /// Sweep the scan directory only, leaving queued commands alone.
    pub fn sweep_scans(&self) -> SweepReport {
        self.sweep_scans_at(SystemTime::now())
    }

    /// Sweep the scan directory only, against `now`.
    pub fn sweep_scans_at(&self, now: SystemTime) -> SweepReport {
        let mut report = SweepReport::default();
        self.sweep_dir(&self.scan_dir, SCAN_FILE_PREFIX, self.scan_retention, now, &mut report);
        Self::log_report(&report);
        report
    }

    fn log_report(report: &SweepReport) {
        if report.total_removed() > 0 || report.failures > 0 {
            info!(
                scans = report.scans_removed,
                commands = report.commands_removed,
                temp = report.temp_removed,
                failures = report.failures,
                "Retention sweep finished"
            );
        }
    }

    fn sweep_dir(
        &self,
        dir: &Path,
        prefix: &str,
        retention: Duration,
        now: SystemTime,
        report: &mut SweepReport,
    ) {
        let read_dir = match fs::read_dir(dir) {
            Ok(read_dir) => read_dir,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Cannot list directory for sweep");
                report.failures += 1;
                return;
            }
        };

        for item in read_dir.flatten() {
            let Some(name) = item.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            let Some(class) = classify(&name, prefix) else {
                continue;
            };

            let path = item.path();
            let modified = match item.metadata().and_then(|m| m.modified()) {
                Ok(modified) => modified,
                Err(e) => {
                    debug!(file = %name, error = %e, "Skipping file without mtime");
                    continue;
                }
            };

            let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
            let limit = match class {
                FileClass::Temp => self.scan_retention,
                _ => retention,
            };
            if age <= limit {
                continue;
            }

            match fs::remove_file(&path) {
                Ok(()) => {
                    debug!(file = %name, age_secs = age.as_secs(), "Removed stale file");
                    match class {
                        FileClass::Scan => report.scans_removed += 1,
                        FileClass::Command => report.commands_removed += 1,
                        FileClass::Temp => report.temp_removed += 1,
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "Failed to remove stale file");
                    report.failures += 1;
                }
            }
        }
    }
}

fn classify(name: &str, prefix: &str) -> Option<FileClass> {
    if !name.starts_with(prefix) {
        return None;
    }
    if name.ends_with(TEMP_SUFFIX) {
        return Some(FileClass::Temp);
    }
    if !name.ends_with(RECORD_EXTENSION) {
        return None;
    }
    if prefix == SCAN_FILE_PREFIX {
        Some(FileClass::Scan)
    } else {
        Some(FileClass::Command)
    }
}
