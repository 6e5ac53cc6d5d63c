//! Bridge daemon between a serial dispensing controller and a file mailbox.
//!
//! Card scans read from the controller are published as files for the
//! consumer application; dispense commands the consumer drops into the
//! command directory are sent to the controller. See [`daemon`] for the loop
//! itself.
//!
//! # Modules
//!
//! - [`consumer`] - single-lane dispense command consumer
//! - [`daemon`] - main loop and startup sequence
//! - [`error`] - fatal / non-fatal error classification
//! - [`lifecycle`] - phase tracking mirrored into the status file

pub mod consumer;
pub mod daemon;
pub mod error;
pub mod lifecycle;

pub use consumer::{CommandConsumer, PollOutcome};
pub use daemon::run;
pub use error::{BridgeError, Result};
pub use lifecycle::Lifecycle;
