//! Classification of inbound lines and rendering of outbound frames.
//!
//! # Examples
//!
//! ```
//! use vendbridge_core::ProductType;
//! use vendbridge_protocol::{InboundLine, OutboundFrame};
//!
//! assert_eq!(
//!     InboundLine::parse("CARDUID:04A1B2C3"),
//!     InboundLine::CardUid("04A1B2C3".to_string())
//! );
//!
//! let frame = OutboundFrame::Dispense(ProductType::Pad);
//! assert_eq!(frame.to_wire(), "DISPENSE:pad\n");
//! ```

use std::fmt;

use vendbridge_core::ProductType;
use vendbridge_core::constants::{
    PREFIX_CARD_UID, PREFIX_COMPLETE, PREFIX_DISPENSE, PREFIX_DISPENSING, PREFIX_ERROR,
    PREFIX_SYSTEM,
};

/// A decoded line received from the firmware.
///
/// Only [`InboundLine::CardUid`] changes bridge state; every other variant
/// is telemetry and is only logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundLine {
    /// Card presented to the reader.
    CardUid(String),

    /// Informational message (`SYSTEM:`).
    System(String),

    /// Motor started for a product (`DISPENSING:`).
    Dispensing(String),

    /// Motor finished for a product (`COMPLETE:`).
    Complete(String),

    /// Firmware-side error report (`ERROR:`).
    FirmwareError(String),

    /// Anything else, including a `CARDUID:` line with no uid.
    Unrecognized(String),
}

impl InboundLine {
    /// Classify a line by its prefix.
    ///
    /// The line and its payload are trimmed. Prefix matching is
    /// case-sensitive, as emitted by the firmware.
    pub fn parse(line: &str) -> Self {
        let line = line.trim();

        if let Some(uid) = line.strip_prefix(PREFIX_CARD_UID) {
            let uid = uid.trim();
            if uid.is_empty() {
                return InboundLine::Unrecognized(line.to_string());
            }
            return InboundLine::CardUid(uid.to_string());
        }
        if let Some(msg) = line.strip_prefix(PREFIX_SYSTEM) {
            return InboundLine::System(msg.trim().to_string());
        }
        if let Some(product) = line.strip_prefix(PREFIX_DISPENSING) {
            return InboundLine::Dispensing(product.trim().to_string());
        }
        if let Some(product) = line.strip_prefix(PREFIX_COMPLETE) {
            return InboundLine::Complete(product.trim().to_string());
        }
        if let Some(msg) = line.strip_prefix(PREFIX_ERROR) {
            return InboundLine::FirmwareError(msg.trim().to_string());
        }
        InboundLine::Unrecognized(line.to_string())
    }

    /// Uid of a card event, if this line is one.
    pub fn card_uid(&self) -> Option<&str> {
        match self {
            InboundLine::CardUid(uid) => Some(uid),
            _ => None,
        }
    }
}

/// A request sent to the firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboundFrame {
    /// Run the motor for one product.
    Dispense(ProductType),
}

impl OutboundFrame {
    /// Render the frame exactly as written to the port, terminator included.
    pub fn to_wire(&self) -> String {
        format!("{self}\n")
    }
}

impl fmt::Display for OutboundFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutboundFrame::Dispense(product) => write!(f, "{PREFIX_DISPENSE}{product}"),
        }
    }
}
