use crate::{Result, constants::SCAN_ID_LENGTH, error::Error};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a single scan event (8 lowercase hex characters).
///
/// Ids are drawn from a random v4 UUID and truncated, so two scans can in
/// principle collide. The publisher checks for an existing file before
/// committing a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ScanId(String);

impl ScanId {
    /// Generate a fresh random scan id.
    #[must_use]
    pub fn generate() -> Self {
        let simple = uuid::Uuid::new_v4().simple().to_string();
        ScanId(simple[..SCAN_ID_LENGTH].to_string())
    }

    /// Create a scan id from an existing string with validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidScanId` unless the value is exactly 8 lowercase
    /// hex characters.
    pub fn new(id: &str) -> Result<Self> {
        let valid = id.len() == SCAN_ID_LENGTH
            && id
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));
        if !valid {
            return Err(Error::InvalidScanId(id.to_string()));
        }
        Ok(ScanId(id.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScanId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for ScanId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        ScanId::new(&value)
    }
}

impl From<ScanId> for String {
    fn from(id: ScanId) -> Self {
        id.0
    }
}

/// Product that the dispenser can vend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductType {
    Pad,
    Tampon,
}

impl ProductType {
    /// Wire name of the product, as used in commands and serial frames.
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ProductType::Pad => "pad",
            ProductType::Tampon => "tampon",
        }
    }
}

impl fmt::Display for ProductType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProductType {
    type Err = Error;

    /// Parse the exact lowercase wire name. `"Pad"` or `" pad"` are rejected,
    /// the firmware only understands the lowercase form.
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pad" => Ok(ProductType::Pad),
            "tampon" => Ok(ProductType::Tampon),
            other => Err(Error::InvalidProductType(other.to_string())),
        }
    }
}

/// Status literal carried by every scan record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    #[default]
    New,
}

/// Status literal carried by every command file.
///
/// Commands never change state on disk: a file is pending while it exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandStatus {
    #[default]
    Pending,
}

/// One card-read event, published as `card_<scan_id>.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRecord {
    pub card_uid: String,
    pub timestamp: DateTime<Local>,
    pub scan_id: ScanId,
    pub status: ScanStatus,
}

impl ScanRecord {
    /// Build a record for `card_uid` with a fresh id and the current time.
    pub fn new(card_uid: impl Into<String>) -> Self {
        Self::with_id(card_uid, ScanId::generate())
    }

    /// Build a record with a caller-chosen id.
    pub fn with_id(card_uid: impl Into<String>, scan_id: ScanId) -> Self {
        Self {
            card_uid: card_uid.into(),
            timestamp: Local::now(),
            scan_id,
            status: ScanStatus::New,
        }
    }
}

/// A validated dispense request, stored as `dispense_<command_id>.json`.
///
/// The timestamp is kept verbatim: consumers write ISO-8601 with or without
/// an offset and the bridge never interprets it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispenseCommand {
    pub command_id: String,
    pub product_type: ProductType,
    pub timestamp: String,
    pub status: CommandStatus,
}

impl DispenseCommand {
    /// Build a pending command stamped with the current local time.
    pub fn new(command_id: impl Into<String>, product_type: ProductType) -> Self {
        Self {
            command_id: command_id.into(),
            product_type,
            timestamp: Local::now().to_rfc3339(),
            status: CommandStatus::Pending,
        }
    }
}

/// Lifecycle phase of the daemon as published in the status file.
///
/// # Valid Transitions
///
/// - Starting → Running | Error | Stopped
/// - Running → Error | Stopped
/// - Error → Running | Stopped
///
/// `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DaemonPhase {
    Starting,
    Running,
    Error,
    Stopped,
}

impl DaemonPhase {
    /// Check if transition to `target` is allowed from this phase.
    ///
    /// # Examples
    ///
    /// ```
    /// use vendbridge_core::DaemonPhase;
    ///
    /// assert!(DaemonPhase::Starting.can_transition_to(DaemonPhase::Running));
    /// assert!(!DaemonPhase::Stopped.can_transition_to(DaemonPhase::Running));
    /// ```
    pub fn can_transition_to(self, target: DaemonPhase) -> bool {
        matches!(
            (self, target),
            (
                DaemonPhase::Starting,
                DaemonPhase::Running | DaemonPhase::Error | DaemonPhase::Stopped
            ) | (DaemonPhase::Running, DaemonPhase::Error | DaemonPhase::Stopped)
                | (DaemonPhase::Error, DaemonPhase::Running | DaemonPhase::Stopped)
        )
    }

    /// Returns `true` once no further transition is possible.
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, DaemonPhase::Stopped)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DaemonPhase::Starting => "starting",
            DaemonPhase::Running => "running",
            DaemonPhase::Error => "error",
            DaemonPhase::Stopped => "stopped",
        }
    }
}

impl fmt::Display for DaemonPhase {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Singleton status record, `card_reader_status.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub status: DaemonPhase,
    pub message: String,
    pub timestamp: DateTime<Local>,
    pub serial_port: String,
}

impl StatusRecord {
    pub fn new(
        status: DaemonPhase,
        message: impl Into<String>,
        serial_port: impl Into<String>,
    ) -> Self {
        Self {
            status,
            message: message.into(),
            timestamp: Local::now(),
            serial_port: serial_port.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_scan_id_generate_is_lowercase_hex() {
        for _ in 0..64 {
            let id = ScanId::generate();
            assert_eq!(id.as_str().len(), 8);
            assert!(ScanId::new(id.as_str()).is_ok());
        }
    }

    #[test]
    fn test_scan_ids_differ() {
        assert_ne!(ScanId::generate(), ScanId::generate());
    }

    #[rstest]
    #[case("")]
    #[case("abc")]
    #[case("ABCDEF12")]
    #[case("0123456g")]
    #[case("012345678")]
    fn test_scan_id_rejects(#[case] raw: &str) {
        assert!(matches!(ScanId::new(raw), Err(Error::InvalidScanId(_))));
    }

    #[rstest]
    #[case("pad", ProductType::Pad)]
    #[case("tampon", ProductType::Tampon)]
    fn test_product_type_parse(#[case] raw: &str, #[case] expected: ProductType) {
        assert_eq!(raw.parse::<ProductType>().unwrap(), expected);
        assert_eq!(expected.to_string(), raw);
    }

    #[rstest]
    #[case("soda")]
    #[case("Pad")]
    #[case("")]
    #[case(" tampon")]
    fn test_product_type_rejects(#[case] raw: &str) {
        assert!(matches!(
            raw.parse::<ProductType>(),
            Err(Error::InvalidProductType(_))
        ));
    }

    #[test]
    fn test_scan_record_field_order() {
        let record = ScanRecord::with_id("04AB12CD", ScanId::new("0a1b2c3d").unwrap());
        let json = serde_json::to_string(&record).unwrap();

        let uid = json.find("\"card_uid\"").unwrap();
        let ts = json.find("\"timestamp\"").unwrap();
        let id = json.find("\"scan_id\"").unwrap();
        let status = json.find("\"status\"").unwrap();
        assert!(uid < ts && ts < id && id < status);
        assert!(json.contains("\"status\":\"new\""));
        assert!(json.contains("\"scan_id\":\"0a1b2c3d\""));
    }

    #[test]
    fn test_scan_record_rejects_bad_id_on_deserialize() {
        let json = r#"{"card_uid":"X","timestamp":"2024-01-01T00:00:00+00:00","scan_id":"nothex!!","status":"new"}"#;
        assert!(serde_json::from_str::<ScanRecord>(json).is_err());
    }

    #[test]
    fn test_dispense_command_serialization() {
        let command = DispenseCommand::new("1700000000000", ProductType::Tampon);
        let value = serde_json::to_value(&command).unwrap();

        assert_eq!(value["command_id"], "1700000000000");
        assert_eq!(value["product_type"], "tampon");
        assert_eq!(value["status"], "pending");
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn test_status_record_serialization() {
        let record = StatusRecord::new(DaemonPhase::Running, "Connected", "/dev/ttyUSB0");
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["status"], "running");
        assert_eq!(value["message"], "Connected");
        assert_eq!(value["serial_port"], "/dev/ttyUSB0");
        assert_eq!(value.as_object().unwrap().len(), 4);
    }

    #[rstest]
    #[case(DaemonPhase::Starting, DaemonPhase::Running, true)]
    #[case(DaemonPhase::Starting, DaemonPhase::Error, true)]
    #[case(DaemonPhase::Starting, DaemonPhase::Stopped, true)]
    #[case(DaemonPhase::Running, DaemonPhase::Error, true)]
    #[case(DaemonPhase::Running, DaemonPhase::Stopped, true)]
    #[case(DaemonPhase::Error, DaemonPhase::Running, true)]
    #[case(DaemonPhase::Error, DaemonPhase::Stopped, true)]
    #[case(DaemonPhase::Running, DaemonPhase::Starting, false)]
    #[case(DaemonPhase::Stopped, DaemonPhase::Running, false)]
    #[case(DaemonPhase::Stopped, DaemonPhase::Stopped, false)]
    fn test_phase_transitions(
        #[case] from: DaemonPhase,
        #[case] to: DaemonPhase,
        #[case] allowed: bool,
    ) {
        assert_eq!(from.can_transition_to(to), allowed);
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(DaemonPhase::Error.to_string(), "error");
        assert!(DaemonPhase::Stopped.is_terminal());
        assert!(!DaemonPhase::Error.is_terminal());
    }
}
