use crate::constants::{
    COMMAND_DIR_NAME, DEFAULT_BAUD_RATE, DEFAULT_COMMAND_POLL_INTERVAL,
    DEFAULT_COMMAND_RETENTION, DEFAULT_DWELL_TIME, DEFAULT_ERROR_BACKOFF, DEFAULT_READ_TIMEOUT,
    DEFAULT_SCAN_RETENTION, DEFAULT_SERIAL_PORT, DEFAULT_SWEEP_INTERVAL, SCAN_DIR_NAME,
    STATUS_FILE_NAME,
};
use crate::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Immutable runtime configuration for the bridge.
///
/// Every component receives the values it needs from this struct at
/// construction time; nothing reads configuration from global state.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use vendbridge_core::BridgeConfig;
///
/// let config = BridgeConfig::new("/dev/ttyACM0")
///     .base_dir("/var/lib/vending")
///     .dwell_time(Duration::from_secs(4));
///
/// assert!(config.scan_dir().ends_with("card_scans"));
/// config.validate().unwrap();
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Serial device path
    pub serial_port: String,

    /// Serial line speed
    pub baud_rate: u32,

    /// Upper bound on one serial read inside the main loop
    pub read_timeout: Duration,

    /// Directory holding the mailbox directories and the status file
    pub base_dir: PathBuf,

    /// Minimum spacing between command directory polls
    pub command_poll_interval: Duration,

    /// Minimum spacing between retention sweeps
    pub sweep_interval: Duration,

    /// Age after which scan records are removed
    pub scan_retention: Duration,

    /// Age after which command files are removed
    pub command_retention: Duration,

    /// Motor cycle duration a command stays in flight
    pub dwell_time: Duration,

    /// Pause after a non-fatal error surfaces in the main loop
    pub error_backoff: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            serial_port: DEFAULT_SERIAL_PORT.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: DEFAULT_READ_TIMEOUT,
            base_dir: PathBuf::from("."),
            command_poll_interval: DEFAULT_COMMAND_POLL_INTERVAL,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            scan_retention: DEFAULT_SCAN_RETENTION,
            command_retention: DEFAULT_COMMAND_RETENTION,
            dwell_time: DEFAULT_DWELL_TIME,
            error_backoff: DEFAULT_ERROR_BACKOFF,
        }
    }
}

impl BridgeConfig {
    /// Create a configuration for the given serial device with defaults
    pub fn new(serial_port: impl Into<String>) -> Self {
        Self {
            serial_port: serial_port.into(),
            ..Default::default()
        }
    }

    /// Set the mailbox base directory
    pub fn base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = dir.into();
        self
    }

    /// Set the serial line speed
    pub fn baud_rate(mut self, baud: u32) -> Self {
        self.baud_rate = baud;
        self
    }

    /// Set the bound on one serial read
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set the command poll interval
    pub fn command_poll_interval(mut self, interval: Duration) -> Self {
        self.command_poll_interval = interval;
        self
    }

    /// Set the retention sweep interval
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Set scan and command retention ages
    pub fn retention(mut self, scans: Duration, commands: Duration) -> Self {
        self.scan_retention = scans;
        self.command_retention = commands;
        self
    }

    /// Set the motor cycle duration
    pub fn dwell_time(mut self, dwell: Duration) -> Self {
        self.dwell_time = dwell;
        self
    }

    /// Set the pause applied after a non-fatal loop error
    pub fn error_backoff(mut self, backoff: Duration) -> Self {
        self.error_backoff = backoff;
        self
    }

    pub fn scan_dir(&self) -> PathBuf {
        self.base_dir.join(SCAN_DIR_NAME)
    }

    pub fn command_dir(&self) -> PathBuf {
        self.base_dir.join(COMMAND_DIR_NAME)
    }

    pub fn status_file(&self) -> PathBuf {
        self.base_dir.join(STATUS_FILE_NAME)
    }

    /// Reject configurations the main loop cannot run with.
    ///
    /// # Errors
    /// Returns `Error::Config` when the port name is empty, the baud rate is
    /// zero, or a timing value that paces the loop is zero.
    pub fn validate(&self) -> Result<()> {
        if self.serial_port.trim().is_empty() {
            return Err(Error::Config("serial port must not be empty".to_string()));
        }
        if self.baud_rate == 0 {
            return Err(Error::Config("baud rate must be positive".to_string()));
        }
        if self.read_timeout.is_zero() {
            return Err(Error::Config("read timeout must be positive".to_string()));
        }
        if self.command_poll_interval.is_zero() || self.sweep_interval.is_zero() {
            return Err(Error::Config(
                "poll and sweep intervals must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.serial_port, "/dev/ttyUSB0");
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.dwell_time, Duration::from_secs(5));
        assert_eq!(config.scan_retention, Duration::from_secs(120));
        assert_eq!(config.command_retention, Duration::from_secs(300));
        assert_eq!(config.sweep_interval, Duration::from_secs(30));
        assert_eq!(config.command_poll_interval, Duration::from_millis(100));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_derived_paths() {
        let config = BridgeConfig::new("/dev/ttyS0").base_dir("/srv/kiosk");
        assert_eq!(config.scan_dir(), PathBuf::from("/srv/kiosk/card_scans"));
        assert_eq!(config.command_dir(), PathBuf::from("/srv/kiosk/dispense_commands"));
        assert_eq!(
            config.status_file(),
            PathBuf::from("/srv/kiosk/card_reader_status.json")
        );
    }

    #[test]
    fn test_validate_rejects_empty_port() {
        let config = BridgeConfig::new("  ");
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_timing() {
        let config = BridgeConfig::default().read_timeout(Duration::ZERO);
        assert!(config.validate().is_err());

        let config = BridgeConfig::default().command_poll_interval(Duration::ZERO);
        assert!(config.validate().is_err());
    }
}
