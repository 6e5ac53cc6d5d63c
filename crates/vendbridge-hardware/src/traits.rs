//! Serial link trait definition.
//!
//! The trait uses native `async fn` methods (Rust 1.90 + Edition 2024
//! RPITIT), eliminating the need for the `async_trait` macro.

#![allow(async_fn_in_trait)]

use crate::error::Result;
use vendbridge_core::ProductType;
use vendbridge_protocol::OutboundFrame;

/// Line-oriented connection to the dispensing controller.
///
/// # Object Safety and Dynamic Dispatch
///
/// **NOTE**: This trait is NOT object-safe because `async fn` methods return
/// `impl Future`. Use generic parameters, or the
/// [`AnySerialLink`](crate::devices::AnySerialLink) enum wrapper when the
/// concrete device is chosen at runtime.
///
/// # Examples
///
/// ```no_run
/// use vendbridge_hardware::traits::SerialLink;
/// use vendbridge_hardware::Result;
///
/// async fn print_lines<L: SerialLink>(link: &mut L) -> Result<()> {
///     loop {
///         if let Some(line) = link.read_line().await? {
///             println!("{line}");
///         }
///     }
/// }
/// ```
pub trait SerialLink: Send {
    /// Read the next decoded line.
    ///
    /// Waits at most the link's read timeout and returns `Ok(None)` if no
    /// complete line arrived in that window.
    ///
    /// # Errors
    ///
    /// Returns an error if the device is disconnected or the port fails.
    /// Callers must treat every error as fatal.
    async fn read_line(&mut self) -> Result<Option<String>>;

    /// Write one frame to the firmware.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    async fn write_frame(&mut self, frame: OutboundFrame) -> Result<()>;

    /// Ask the firmware to dispense one product (`DISPENSE:<product>\n`).
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    async fn write_command(&mut self, product: ProductType) -> Result<()> {
        self.write_frame(OutboundFrame::Dispense(product)).await
    }

    /// Name of the underlying port, as reported in the status file.
    fn port_name(&self) -> &str;
}
