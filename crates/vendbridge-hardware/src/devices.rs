//! Enum wrapper for serial link dispatch.
//!
//! Native `async fn` in traits (RPITIT) is not object-safe, so
//! `Box<dyn SerialLink>` is unavailable. [`AnySerialLink`] provides concrete
//! dispatch instead, letting the binary pick a real port or the mock at
//! runtime while the main loop stays generic.
//!
//! # Examples
//!
//! ```
//! use vendbridge_hardware::devices::AnySerialLink;
//! use vendbridge_hardware::mock::MockSerial;
//! use vendbridge_hardware::traits::SerialLink;
//!
//! let (link, _handle) = MockSerial::new();
//! let any_link = AnySerialLink::Mock(link);
//! assert_eq!(any_link.port_name(), "MOCK");
//! ```

use crate::Result;
use crate::mock::MockSerial;
use crate::port::SerialPortLink;
use crate::traits::SerialLink;
use vendbridge_protocol::OutboundFrame;

/// Enum wrapper for serial link dispatch.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnySerialLink {
    /// Physical or virtual serial port.
    Port(SerialPortLink),

    /// Mock link for development and testing.
    Mock(MockSerial),
}

impl SerialLink for AnySerialLink {
    async fn read_line(&mut self) -> Result<Option<String>> {
        match self {
            Self::Port(link) => link.read_line().await,
            Self::Mock(link) => link.read_line().await,
        }
    }

    async fn write_frame(&mut self, frame: OutboundFrame) -> Result<()> {
        match self {
            Self::Port(link) => link.write_frame(frame).await,
            Self::Mock(link) => link.write_frame(frame).await,
        }
    }

    fn port_name(&self) -> &str {
        match self {
            Self::Port(link) => link.port_name(),
            Self::Mock(link) => link.port_name(),
        }
    }
}

impl From<SerialPortLink> for AnySerialLink {
    fn from(link: SerialPortLink) -> Self {
        Self::Port(link)
    }
}

impl From<MockSerial> for AnySerialLink {
    fn from(link: MockSerial) -> Self {
        Self::Mock(link)
    }
}
