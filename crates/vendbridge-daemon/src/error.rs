//! Error classification for the bridge main loop.
//!
//! Every failure that reaches the loop is one of the variants below, and
//! [`BridgeError::is_fatal`] decides what happens next:
//!
//! | Variant | Fatal | Effect |
//! |---|---|---|
//! | `SerialOpen` | yes | startup aborted |
//! | `SerialIo` | yes | loop ends, status `error` |
//! | `Decode` | no | line dropped |
//! | `CommandParse` | no | command file deleted |
//! | `InvalidProductType` | no | command file deleted |
//! | `Filesystem` | no | operation abandoned, loop continues |

use thiserror::Error;

use vendbridge_hardware::SerialError;
use vendbridge_mailbox::MailboxError;

/// Result type alias for bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;

#[derive(Debug, Error)]
pub enum BridgeError {
    /// The serial port could not be opened.
    #[error("Serial open failed: {0}")]
    SerialOpen(#[source] SerialError),

    /// The serial link failed after it was opened.
    #[error("Serial error: {0}")]
    SerialIo(#[source] SerialError),

    /// A line could not be classified.
    #[error("Undecodable line: {0:?}")]
    Decode(String),

    /// A command file is not valid JSON or not an object.
    #[error("{0}")]
    CommandParse(#[source] MailboxError),

    /// A command file names an unknown product.
    #[error("{0}")]
    InvalidProductType(#[source] MailboxError),

    /// A mailbox file or directory operation failed.
    #[error("{0}")]
    Filesystem(#[source] MailboxError),
}

impl BridgeError {
    /// Returns `true` if the main loop must stop.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::SerialOpen(_) | Self::SerialIo(_))
    }

    /// Returns `true` if the error leads to deleting a command file.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::CommandParse(_) | Self::InvalidProductType(_))
    }
}

/// `OpenFailed` maps to `SerialOpen`, every other serial failure to `SerialIo`.
impl From<SerialError> for BridgeError {
    fn from(err: SerialError) -> Self {
        if err.is_open_failure() {
            Self::SerialOpen(err)
        } else {
            Self::SerialIo(err)
        }
    }
}

impl From<MailboxError> for BridgeError {
    fn from(err: MailboxError) -> Self {
        match err {
            MailboxError::Parse { .. } => Self::CommandParse(err),
            MailboxError::InvalidProductType { .. } => Self::InvalidProductType(err),
            other => Self::Filesystem(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io;
    use std::path::PathBuf;

    fn parse_error() -> MailboxError {
        MailboxError::Parse {
            path: PathBuf::from("dispense_1.json"),
            message: "expected value".to_string(),
        }
    }

    fn product_error() -> MailboxError {
        MailboxError::InvalidProductType {
            path: PathBuf::from("dispense_2.json"),
            value: Some("soda".to_string()),
        }
    }

    fn io_error() -> MailboxError {
        MailboxError::Io {
            path: PathBuf::from("card_scans"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        }
    }

    #[rstest]
    #[case(BridgeError::SerialOpen(SerialError::open_failed("/dev/ttyUSB0", "busy")), true)]
    #[case(BridgeError::SerialIo(SerialError::disconnected("/dev/ttyUSB0")), true)]
    #[case(BridgeError::Decode("\u{fffd}".to_string()), false)]
    #[case(BridgeError::CommandParse(parse_error()), false)]
    #[case(BridgeError::InvalidProductType(product_error()), false)]
    #[case(BridgeError::Filesystem(io_error()), false)]
    fn test_fatal_classification(#[case] err: BridgeError, #[case] fatal: bool) {
        assert_eq!(err.is_fatal(), fatal);
    }

    #[test]
    fn test_serial_conversion() {
        let err: BridgeError = SerialError::open_failed("COM3", "access denied").into();
        assert!(matches!(err, BridgeError::SerialOpen(_)));

        let err: BridgeError = SerialError::communication("framing").into();
        assert!(matches!(err, BridgeError::SerialIo(_)));
        assert_eq!(err.to_string(), "Serial error: Communication error: framing");
    }

    #[test]
    fn test_mailbox_conversion() {
        let err: BridgeError = parse_error().into();
        assert!(matches!(err, BridgeError::CommandParse(_)));
        assert!(err.is_rejection());

        let err: BridgeError = product_error().into();
        assert!(matches!(err, BridgeError::InvalidProductType(_)));
        assert!(err.is_rejection());

        let err: BridgeError = io_error().into();
        assert!(matches!(err, BridgeError::Filesystem(_)));
        assert!(!err.is_rejection());
        assert!(!err.is_fatal());
    }
}
