//! Serial link abstraction for the dispensing controller.
//!
//! The [`SerialLink`] trait is the only way the bridge talks to hardware:
//! it yields decoded text lines with a bounded wait and accepts outbound
//! frames. Two implementations exist:
//!
//! - [`SerialPortLink`](port::SerialPortLink): a real port opened through
//!   the `serialport` crate, read on a dedicated thread.
//! - [`MockSerial`](mock::MockSerial): a programmable link for tests and
//!   development without the device attached.
//!
//! [`AnySerialLink`](devices::AnySerialLink) wraps both for runtime choice.
//!
//! # Error Handling
//!
//! All operations return [`Result<T>`][error::Result] with
//! [`SerialError`]. Every serial error is fatal to the bridge; there is no
//! automatic reconnect.
//!
//! ```no_run
//! use vendbridge_core::BridgeConfig;
//! use vendbridge_hardware::port::SerialPortLink;
//! use vendbridge_hardware::traits::SerialLink;
//!
//! # async fn example() -> vendbridge_hardware::Result<()> {
//! let mut link = SerialPortLink::open(&BridgeConfig::new("/dev/ttyUSB0"))?;
//! while let Some(line) = link.read_line().await? {
//!     println!("{line}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod devices;
pub mod error;
pub mod mock;
pub mod port;
pub mod traits;

pub use devices::AnySerialLink;
pub use error::{Result, SerialError};
pub use traits::SerialLink;
