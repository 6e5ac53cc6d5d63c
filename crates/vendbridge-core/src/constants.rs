//! Core constants for the dispenser bridge.
//!
//! This module defines the wire prefixes, file naming rules and timing
//! defaults shared by every crate in the workspace. Runtime values are
//! carried by [`BridgeConfig`](crate::BridgeConfig); the constants here are
//! its defaults and the fixed parts of the protocol.
//!
//! # Serial Protocol
//!
//! The firmware speaks newline-terminated ASCII at a fixed baud rate:
//!
//! | Direction | Format | Meaning |
//! |-----------|--------|---------|
//! | in | `CARDUID:<uid>` | card scan event |
//! | in | `SYSTEM:<msg>` | informational |
//! | in | `DISPENSING:<product>` | telemetry |
//! | in | `COMPLETE:<product>` | telemetry |
//! | in | `ERROR:<msg>` | firmware error |
//! | out | `DISPENSE:<product>\n` | dispense request |
//!
//! # Mailbox Layout
//!
//! ```text
//! <base_dir>/
//! ├── card_scans/card_<8-hex>.json
//! ├── dispense_commands/dispense_<id>.json
//! └── card_reader_status.json
//! ```
//!
//! # Usage
//!
//! ```
//! use vendbridge_core::constants::*;
//!
//! assert_eq!(DEFAULT_BAUD_RATE, 9600);
//! assert_eq!(scan_file_name("0a1b2c3d"), "card_0a1b2c3d.json");
//! ```

use std::time::Duration;

// ============================================================================
// Serial Protocol
// ============================================================================

/// Baud rate of the dispensing controller.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Serial device used when none is configured.
pub const DEFAULT_SERIAL_PORT: &str = "/dev/ttyUSB0";

/// Prefix of a card scan event.
pub const PREFIX_CARD_UID: &str = "CARDUID:";

/// Prefix of an informational firmware message.
pub const PREFIX_SYSTEM: &str = "SYSTEM:";

/// Prefix of the firmware's "motor started" telemetry.
pub const PREFIX_DISPENSING: &str = "DISPENSING:";

/// Prefix of the firmware's "motor finished" telemetry.
pub const PREFIX_COMPLETE: &str = "COMPLETE:";

/// Prefix of a firmware-side error report.
pub const PREFIX_ERROR: &str = "ERROR:";

/// Prefix of the outbound dispense request.
pub const PREFIX_DISPENSE: &str = "DISPENSE:";

/// Line terminator used in both directions.
pub const LINE_TERMINATOR: u8 = b'\n';

/// Longest inbound line accepted before it is discarded as garbage.
pub const MAX_LINE_LENGTH: usize = 1024;

// ============================================================================
// Mailbox Layout
// ============================================================================

/// Directory receiving scan records, relative to the base directory.
pub const SCAN_DIR_NAME: &str = "card_scans";

/// Directory receiving dispense commands, relative to the base directory.
pub const COMMAND_DIR_NAME: &str = "dispense_commands";

/// Status file name, relative to the base directory.
pub const STATUS_FILE_NAME: &str = "card_reader_status.json";

/// File name prefix of scan records.
pub const SCAN_FILE_PREFIX: &str = "card_";

/// File name prefix of dispense commands.
pub const COMMAND_FILE_PREFIX: &str = "dispense_";

/// Extension of every published record.
pub const RECORD_EXTENSION: &str = ".json";

/// Suffix appended to a record path while it is being written.
pub const TEMP_SUFFIX: &str = ".tmp";

/// Length of a scan id in hex characters.
pub const SCAN_ID_LENGTH: usize = 8;

/// Build the file name of a scan record.
pub fn scan_file_name(scan_id: &str) -> String {
    format!("{SCAN_FILE_PREFIX}{scan_id}{RECORD_EXTENSION}")
}

/// Build the file name of a dispense command.
pub fn command_file_name(command_id: &str) -> String {
    format!("{COMMAND_FILE_PREFIX}{command_id}{RECORD_EXTENSION}")
}

// ============================================================================
// Timing
// ============================================================================

/// Upper bound on a single serial read inside the main loop.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Minimum spacing between two command directory polls.
pub const DEFAULT_COMMAND_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Minimum spacing between two retention sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Age after which a scan record is swept.
pub const DEFAULT_SCAN_RETENTION: Duration = Duration::from_secs(120);

/// Age after which a command file is swept.
pub const DEFAULT_COMMAND_RETENTION: Duration = Duration::from_secs(300);

/// Duration of one motor cycle.
///
/// A dispatched command is in flight for this long before its file is
/// acknowledged (deleted).
pub const DEFAULT_DWELL_TIME: Duration = Duration::from_secs(5);

/// Pause after a non-fatal error reaches the main loop.
pub const DEFAULT_ERROR_BACKOFF: Duration = Duration::from_secs(1);
