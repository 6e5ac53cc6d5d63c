//! Error types for serial link operations.
//!
//! Every variant is fatal for the bridge: the link is never reopened
//! automatically, so any failure here ends the main loop.

/// Result type alias for serial link operations.
pub type Result<T> = std::result::Result<T, SerialError>;

/// Errors that can occur while opening or using the serial link.
#[derive(Debug, thiserror::Error)]
pub enum SerialError {
    /// The port could not be opened.
    #[error("Failed to open {port}: {message}")]
    OpenFailed { port: String, message: String },

    /// The device went away or the line stream ended.
    #[error("Device disconnected: {device}")]
    Disconnected { device: String },

    /// Framing or driver-level communication error.
    #[error("Communication error: {message}")]
    CommunicationError { message: String },

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SerialError {
    /// Create a new open failure.
    pub fn open_failed(port: impl Into<String>, message: impl Into<String>) -> Self {
        Self::OpenFailed {
            port: port.into(),
            message: message.into(),
        }
    }

    /// Create a new disconnected error.
    pub fn disconnected(device: impl Into<String>) -> Self {
        Self::Disconnected {
            device: device.into(),
        }
    }

    /// Create a new communication error.
    pub fn communication(message: impl Into<String>) -> Self {
        Self::CommunicationError {
            message: message.into(),
        }
    }

    /// Returns `true` if the error happened while opening the port.
    pub fn is_open_failure(&self) -> bool {
        matches!(self, Self::OpenFailed { .. })
    }
}

impl From<vendbridge_protocol::ProtocolError> for SerialError {
    fn from(err: vendbridge_protocol::ProtocolError) -> Self {
        match err {
            vendbridge_protocol::ProtocolError::Io(io) => Self::Io(io),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_failed_error() {
        let error = SerialError::open_failed("/dev/ttyUSB0", "No such file or directory");
        assert!(error.is_open_failure());
        assert_eq!(
            error.to_string(),
            "Failed to open /dev/ttyUSB0: No such file or directory"
        );
    }

    #[test]
    fn test_disconnected_error() {
        let error = SerialError::disconnected("/dev/ttyACM0");
        assert!(!error.is_open_failure());
        assert_eq!(error.to_string(), "Device disconnected: /dev/ttyACM0");
    }

    #[test]
    fn test_communication_error() {
        let error = SerialError::communication("Serial port closed");
        assert!(matches!(error, SerialError::CommunicationError { .. }));
        assert_eq!(error.to_string(), "Communication error: Serial port closed");
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe");
        let error: SerialError = io.into();
        assert!(matches!(error, SerialError::Io(_)));
    }
}
