//! Mock serial link for testing and development.
//!
//! This module provides a simulated firmware connection that can be driven
//! programmatically: inbound lines are pushed through a handle, outbound
//! frames are recorded for inspection.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;

use crate::error::{Result, SerialError};
use crate::traits::SerialLink;
use vendbridge_core::constants::DEFAULT_READ_TIMEOUT;
use vendbridge_protocol::OutboundFrame;

/// Mock serial link.
///
/// # Examples
///
/// ```
/// use vendbridge_core::ProductType;
/// use vendbridge_hardware::mock::MockSerial;
/// use vendbridge_hardware::traits::SerialLink;
///
/// #[tokio::main]
/// async fn main() -> vendbridge_hardware::Result<()> {
///     let (mut link, handle) = MockSerial::new();
///
///     handle.push_line("CARDUID:04A1B2C3")?;
///     assert_eq!(link.read_line().await?.as_deref(), Some("CARDUID:04A1B2C3"));
///
///     link.write_command(ProductType::Pad).await?;
///     assert_eq!(handle.written(), vec!["DISPENSE:pad\n"]);
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockSerial {
    /// Channel receiver for simulated firmware output
    event_rx: mpsc::Receiver<MockEvent>,

    /// Frames written by the bridge, in wire format
    written: Arc<Mutex<Vec<String>>>,

    /// When set, writes fail with a communication error
    fail_writes: Arc<AtomicBool>,

    /// Time one write takes to reach the device
    write_delay: Arc<Mutex<Duration>>,

    /// Device name
    name: String,

    /// Upper bound on one `read_line` call
    read_timeout: Duration,
}

impl MockSerial {
    /// Create a new mock link with the default name and read timeout.
    pub fn new() -> (Self, MockSerialHandle) {
        Self::with_name("MOCK".to_string())
    }

    /// Create a new mock link with a custom port name.
    pub fn with_name(name: String) -> (Self, MockSerialHandle) {
        let (event_tx, event_rx) = mpsc::channel(64);
        let written = Arc::new(Mutex::new(Vec::new()));
        let fail_writes = Arc::new(AtomicBool::new(false));
        let write_delay = Arc::new(Mutex::new(Duration::ZERO));

        let link = Self {
            event_rx,
            written: Arc::clone(&written),
            fail_writes: Arc::clone(&fail_writes),
            write_delay: Arc::clone(&write_delay),
            name,
            read_timeout: DEFAULT_READ_TIMEOUT,
        };

        let handle = MockSerialHandle {
            event_tx,
            written,
            fail_writes,
            write_delay,
        };

        (link, handle)
    }

    /// Set the upper bound on one `read_line` call.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }
}

impl SerialLink for MockSerial {
    async fn read_line(&mut self) -> Result<Option<String>> {
        match tokio::time::timeout(self.read_timeout, self.event_rx.recv()).await {
            Err(_elapsed) => Ok(None),
            Ok(Some(MockEvent::Line(line))) => Ok(Some(line)),
            Ok(Some(MockEvent::Fault(message))) => Err(SerialError::communication(message)),
            Ok(None) => Err(SerialError::disconnected(&self.name)),
        }
    }

    async fn write_frame(&mut self, frame: OutboundFrame) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SerialError::communication("mock write failure"));
        }
        let delay = *self.write_delay.lock().unwrap_or_else(PoisonError::into_inner);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.written
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(frame.to_wire());
        Ok(())
    }

    fn port_name(&self) -> &str {
        &self.name
    }
}

/// Internal event type for the mock link.
#[derive(Debug, Clone)]
enum MockEvent {
    Line(String),
    Fault(String),
}

/// Handle for driving a [`MockSerial`] from tests.
///
/// Dropping the handle simulates unplugging the device: the next read that
/// finds no buffered line fails with `SerialError::Disconnected`.
#[derive(Debug, Clone)]
pub struct MockSerialHandle {
    event_tx: mpsc::Sender<MockEvent>,
    written: Arc<Mutex<Vec<String>>>,
    fail_writes: Arc<AtomicBool>,
    write_delay: Arc<Mutex<Duration>>,
}

impl MockSerialHandle {
    /// Simulate the firmware emitting one line.
    ///
    /// # Errors
    ///
    /// Returns an error if the link was dropped or the buffer is full.
    pub fn push_line(&self, line: impl Into<String>) -> Result<()> {
        self.event_tx
            .try_send(MockEvent::Line(line.into()))
            .map_err(|_| SerialError::disconnected("mock link closed or full"))
    }

    /// Make the next read fail as if the port reported an I/O error.
    ///
    /// # Errors
    ///
    /// Returns an error if the link was dropped or the buffer is full.
    pub fn inject_fault(&self, message: impl Into<String>) -> Result<()> {
        self.event_tx
            .try_send(MockEvent::Fault(message.into()))
            .map_err(|_| SerialError::disconnected("mock link closed or full"))
    }

    /// Push every line of `reader` as firmware output, waiting for buffer
    /// space as needed. Returns the number of lines pushed once `reader` ends.
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails or the link was dropped.
    pub async fn replay<R: AsyncBufRead + Unpin>(&self, reader: R) -> Result<usize> {
        let mut lines = reader.lines();
        let mut pushed = 0;
        while let Some(line) = lines.next_line().await? {
            self.event_tx
                .send(MockEvent::Line(line))
                .await
                .map_err(|_| SerialError::disconnected("mock link closed"))?;
            pushed += 1;
        }
        Ok(pushed)
    }

    /// Make subsequent writes fail (or succeed again).
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make each write take `delay` before it completes.
    pub fn delay_writes(&self, delay: Duration) {
        *self.write_delay.lock().unwrap_or_else(PoisonError::into_inner) = delay;
    }

    /// Frames written by the bridge so far, in wire format.
    pub fn written(&self) -> Vec<String> {
        self.written
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
