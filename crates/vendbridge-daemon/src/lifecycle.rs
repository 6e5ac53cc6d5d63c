//! Daemon lifecycle and its status file.
//!
//! # Phases
//!
//! - Starting → Running (serial link opened)
//! - Starting → Error (startup failure)
//! - Running → Error (fatal fault, or a non-fatal error surfaced by the loop)
//! - Error → Running (next clean iteration after a non-fatal error)
//! - any → Stopped (always, on every exit path)
//!
//! Each accepted transition overwrites `card_reader_status.json`. A failed
//! status write is logged and otherwise ignored: observers lose an update,
//! the daemon keeps running.
//!
//! `Stopped` is written by [`Lifecycle::finish`] or, if the lifecycle is
//! dropped without it (early return, unwinding), by its `Drop` impl.

use std::collections::VecDeque;

use chrono::{DateTime, Local};
use tracing::{debug, info, warn};

use vendbridge_core::DaemonPhase;
use vendbridge_mailbox::StatusReporter;

/// Message written with the final `stopped` status.
pub const STOPPED_MESSAGE: &str = "Card reader stopped";

/// Transitions kept for inspection.
const MAX_HISTORY_SIZE: usize = 32;

/// A recorded phase change.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseChange {
    pub from: DaemonPhase,
    pub to: DaemonPhase,
    pub message: String,
    pub at: DateTime<Local>,
}

/// Tracks the daemon phase and mirrors it into the status file.
#[derive(Debug)]
pub struct Lifecycle {
    phase: DaemonPhase,
    reporter: StatusReporter,
    history: VecDeque<PhaseChange>,
}

impl Lifecycle {
    /// Enter `Starting` and write the initial status.
    pub fn start(reporter: StatusReporter, message: impl Into<String>) -> Self {
        let lifecycle = Self {
            phase: DaemonPhase::Starting,
            reporter,
            history: VecDeque::with_capacity(MAX_HISTORY_SIZE),
        };
        lifecycle.write(DaemonPhase::Starting, &message.into());
        lifecycle
    }

    pub fn phase(&self) -> DaemonPhase {
        self.phase
    }

    /// Recorded transitions, oldest first. `Starting` itself is not listed.
    pub fn history(&self) -> impl Iterator<Item = &PhaseChange> {
        self.history.iter()
    }

    /// Move to `to` and write the status file.
    ///
    /// Returns `false` and leaves the phase unchanged if the transition is
    /// not allowed from the current phase.
    pub fn transition(&mut self, to: DaemonPhase, message: impl Into<String>) -> bool {
        let from = self.phase;
        if !from.can_transition_to(to) {
            debug!(%from, %to, "Ignoring invalid phase transition");
            return false;
        }

        let message = message.into();
        self.write(to, &message);
        self.phase = to;

        if self.history.len() >= MAX_HISTORY_SIZE {
            self.history.pop_front();
        }
        self.history.push_back(PhaseChange {
            from,
            to,
            message,
            at: Local::now(),
        });
        true
    }

    /// Record an error.
    ///
    /// While already in `Error` only the status message is refreshed, so the
    /// file always names the latest cause.
    pub fn fail(&mut self, message: impl Into<String>) -> bool {
        if self.phase == DaemonPhase::Error {
            self.write(DaemonPhase::Error, &message.into());
            return true;
        }
        self.transition(DaemonPhase::Error, message)
    }

    /// Write the final `stopped` status.
    pub fn finish(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if self.transition(DaemonPhase::Stopped, STOPPED_MESSAGE) {
            info!("Card reader stopped");
        }
    }

    fn write(&self, phase: DaemonPhase, message: &str) {
        if let Err(e) = self.reporter.set_status(phase, message) {
            warn!(
                status = %phase,
                path = %self.reporter.path().display(),
                error = %e,
                "Failed to write status"
            );
        }
    }
}

impl Drop for Lifecycle {
    fn drop(&mut self) {
        if !self.phase.is_terminal() {
            self.stop();
        }
    }
}
