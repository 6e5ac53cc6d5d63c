//! Serial link backed by a real port through the `serialport` crate.
//!
//! # Architecture
//!
//! `serialport` is a blocking API. A dedicated reader thread performs the
//! blocking reads, frames the bytes with [`LineCodec`] and forwards each
//! line over a bounded channel. The async side only awaits that channel, so
//! a slow or silent device never blocks the main loop for longer than the
//! configured read timeout.
//!
//! ```text
//! ┌──────────────┐  Result<String>  ┌──────────────────┐
//! │ reader thread│─────────────────►│ SerialPortLink   │──► main loop
//! │ (blocking)   │      (mpsc)      │ read_line()      │
//! └──────────────┘                  └──────────────────┘
//!        ▲                                   │
//!        │ try_clone                         ▼ write_all (spawn_blocking)
//!        └────────────── port ◄──────────────┘
//! ```
//!
//! Writes run on the blocking pool so a stalled port never holds up the
//! runtime. The reader thread exits on the first read error (after
//! forwarding it) or once the link is dropped; a final unterminated line is
//! delivered before the disconnect.

use std::io::{ErrorKind, Read, Write};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bytes::BytesMut;
use serialport::SerialPort;
use tokio::sync::mpsc;
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, info, warn};

use crate::error::{Result, SerialError};
use crate::traits::SerialLink;
use vendbridge_core::BridgeConfig;
use vendbridge_protocol::{LineCodec, OutboundFrame};

/// Blocking read timeout of the reader thread.
///
/// Bounds how long the thread takes to notice that the link was dropped.
const PORT_POLL_TIMEOUT: Duration = Duration::from_millis(250);

/// Lines buffered between the reader thread and the main loop.
const LINE_CHANNEL_CAPACITY: usize = 64;

/// Bytes requested per blocking read.
const READ_CHUNK_SIZE: usize = 256;

/// Serial link to a physical or virtual port.
pub struct SerialPortLink {
    /// Write half (the reader thread owns a clone).
    writer: Arc<Mutex<Box<dyn SerialPort>>>,

    /// Lines or the terminal error produced by the reader thread.
    lines: mpsc::Receiver<Result<String>>,

    /// Encoder for outbound frames.
    codec: LineCodec,

    /// Port path, for logs and the status file.
    name: String,

    /// Upper bound on one `read_line` call.
    read_timeout: Duration,
}

impl std::fmt::Debug for SerialPortLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialPortLink")
            .field("name", &self.name)
            .field("read_timeout", &self.read_timeout)
            .finish_non_exhaustive()
    }
}

impl SerialPortLink {
    /// Open the port named in `config` and start the reader thread.
    ///
    /// # Errors
    ///
    /// Returns `SerialError::OpenFailed` if the port cannot be opened or
    /// cloned, or the reader thread cannot be spawned.
    pub fn open(config: &BridgeConfig) -> Result<Self> {
        info!(
            port = %config.serial_port,
            baud_rate = config.baud_rate,
            "Opening serial port"
        );

        let writer = serialport::new(&config.serial_port, config.baud_rate)
            .timeout(PORT_POLL_TIMEOUT)
            .open()
            .map_err(|e| SerialError::open_failed(&config.serial_port, e.to_string()))?;

        let reader = writer
            .try_clone()
            .map_err(|e| SerialError::open_failed(&config.serial_port, e.to_string()))?;

        let (tx, rx) = mpsc::channel(LINE_CHANNEL_CAPACITY);
        let device = config.serial_port.clone();

        std::thread::Builder::new()
            .name("serial-reader".to_string())
            .spawn(move || reader_loop(reader, tx, device))
            .map_err(|e| SerialError::open_failed(&config.serial_port, e.to_string()))?;

        info!(port = %config.serial_port, "Serial port opened");

        Ok(Self {
            writer: Arc::new(Mutex::new(writer)),
            lines: rx,
            codec: LineCodec::new(),
            name: config.serial_port.clone(),
            read_timeout: config.read_timeout,
        })
    }
}

impl SerialLink for SerialPortLink {
    async fn read_line(&mut self) -> Result<Option<String>> {
        match tokio::time::timeout(self.read_timeout, self.lines.recv()).await {
            Err(_elapsed) => Ok(None),
            Ok(Some(Ok(line))) => Ok(Some(line)),
            Ok(Some(Err(e))) => Err(e),
            Ok(None) => Err(SerialError::disconnected(&self.name)),
        }
    }

    async fn write_frame(&mut self, frame: OutboundFrame) -> Result<()> {
        let mut buffer = BytesMut::new();
        self.codec.encode(frame, &mut buffer)?;

        let writer = Arc::clone(&self.writer);
        tokio::task::spawn_blocking(move || {
            let mut port = writer.lock().unwrap_or_else(PoisonError::into_inner);
            port.write_all(&buffer)?;
            port.flush()
        })
        .await
        .map_err(|e| SerialError::communication(format!("serial write task failed: {e}")))??;

        debug!(port = %self.name, frame = %frame, "Frame written");
        Ok(())
    }

    fn port_name(&self) -> &str {
        &self.name
    }
}

/// Blocking read loop run on the reader thread.
fn reader_loop<R: Read>(mut port: R, tx: mpsc::Sender<Result<String>>, device: String) {
    let mut codec = LineCodec::new();
    let mut buffer = BytesMut::with_capacity(READ_CHUNK_SIZE * 4);
    let mut chunk = [0u8; READ_CHUNK_SIZE];

    loop {
        if tx.is_closed() {
            debug!(port = %device, "Serial link dropped, reader exiting");
            return;
        }

        match port.read(&mut chunk) {
            // Readiness with no data means the device went away.
            Ok(0) => {
                if let Ok(Some(line)) = codec.decode_eof(&mut buffer)
                    && tx.blocking_send(Ok(line)).is_err()
                {
                    return;
                }
                let _ = tx.blocking_send(Err(SerialError::disconnected(&device)));
                return;
            }
            Ok(n) => {
                buffer.extend_from_slice(&chunk[..n]);
                loop {
                    match codec.decode(&mut buffer) {
                        Ok(Some(line)) => {
                            if tx.blocking_send(Ok(line)).is_err() {
                                return;
                            }
                        }
                        Ok(None) => break,
                        Err(e) => {
                            let _ = tx.blocking_send(Err(e.into()));
                            return;
                        }
                    }
                }
            }
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::Interrupted) => {}
            Err(e) => {
                warn!(port = %device, error = %e, "Serial read failed");
                let _ = tx.blocking_send(Err(SerialError::Io(e)));
                return;
            }
        }
    }
}
