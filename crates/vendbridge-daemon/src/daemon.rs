//! The bridge main loop.
//!
//! One cooperative task sequences every component. Each iteration:
//!
//! 1. acknowledge the in-flight command if its dwell has elapsed
//! 2. poll the command queue, at most once per poll interval
//! 3. one bounded serial read, dispatched by prefix
//! 4. sweep stale files, at most once per sweep interval
//!
//! Command files are only swept while the dispense lane is idle and the last
//! poll found nothing to dispatch, so a backlog waiting behind the dwell is
//! never expired unexecuted.
//!
//! Fatal errors (serial open or I/O) end the loop. Any other error that
//! surfaces here sets the status to `error`, pauses for the configured
//! backoff and lets the loop continue; the next clean iteration restores
//! `running`.
//!
//! # Examples
//!
//! ```no_run
//! use tokio_util::sync::CancellationToken;
//! use vendbridge_core::BridgeConfig;
//! use vendbridge_hardware::port::SerialPortLink;
//!
//! # async fn example() -> vendbridge_daemon::Result<()> {
//! let config = BridgeConfig::new("/dev/ttyUSB0").base_dir("/srv/kiosk");
//! let shutdown = CancellationToken::new();
//!
//! vendbridge_daemon::run(config, SerialPortLink::open, shutdown).await
//! # }
//! ```

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::consumer::{CommandConsumer, PollOutcome};
use crate::error::{BridgeError, Result};
use crate::lifecycle::Lifecycle;
use vendbridge_core::{BridgeConfig, DaemonPhase};
use vendbridge_hardware::SerialLink;
use vendbridge_mailbox::Mailbox;
use vendbridge_protocol::InboundLine;

/// Run the bridge until `shutdown` is cancelled or a fatal error occurs.
///
/// `open` connects the serial link; it is called once, after the mailbox
/// directories exist and `starting` has been written. Whatever the outcome,
/// the status file ends in `stopped`.
///
/// # Errors
///
/// - `BridgeError::Filesystem` if the mailbox directories cannot be created
/// - `BridgeError::SerialOpen` if `open` fails
/// - `BridgeError::SerialIo` if the link fails while running
pub async fn run<L, F>(config: BridgeConfig, open: F, shutdown: CancellationToken) -> Result<()>
where
    L: SerialLink,
    F: FnOnce(&BridgeConfig) -> vendbridge_hardware::Result<L>,
{
    info!(
        port = %config.serial_port,
        base_dir = %config.base_dir.display(),
        "Starting card reader bridge"
    );

    let mailbox = Mailbox::new(&config);
    let dirs = mailbox.ensure_dirs();
    let mut lifecycle = Lifecycle::start(mailbox.status.clone(), "Initializing card reader");

    if let Err(e) = dirs {
        let err = BridgeError::Filesystem(e);
        error!(error = %err, "Cannot prepare mailbox directories");
        lifecycle.fail(format!("Startup error: {err}"));
        lifecycle.finish();
        return Err(err);
    }

    let link = match open(&config) {
        Ok(link) => link,
        Err(e) => {
            let err = BridgeError::SerialOpen(e);
            error!(port = %config.serial_port, error = %err, "Cannot open serial port");
            lifecycle.fail(err.to_string());
            lifecycle.finish();
            return Err(err);
        }
    };

    lifecycle.transition(
        DaemonPhase::Running,
        format!("Connected to {}", config.serial_port),
    );

    let mut main_loop = MainLoop::new(config, link, mailbox, lifecycle);
    let result = main_loop.run_until(&shutdown).await;

    let MainLoop {
        mut lifecycle,
        mut consumer,
        ..
    } = main_loop;
    consumer.abandon();
    if let Err(e) = &result {
        error!(error = %e, "Card reader terminated");
        lifecycle.fail(e.to_string());
    }
    lifecycle.finish();
    result
}

struct MainLoop<L> {
    config: BridgeConfig,
    link: L,
    mailbox: Mailbox,
    consumer: CommandConsumer,
    lifecycle: Lifecycle,
    last_poll: Option<Instant>,
    last_sweep: Instant,
    queue_drained: bool,
}

impl<L: SerialLink> MainLoop<L> {
    fn new(config: BridgeConfig, link: L, mailbox: Mailbox, lifecycle: Lifecycle) -> Self {
        let consumer = CommandConsumer::new(mailbox.commands.clone(), config.dwell_time);
        Self {
            config,
            link,
            mailbox,
            consumer,
            lifecycle,
            last_poll: None,
            last_sweep: Instant::now(),
            queue_drained: false,
        }
    }

    async fn run_until(&mut self, shutdown: &CancellationToken) -> Result<()> {
        while !shutdown.is_cancelled() {
            match self.step(shutdown).await {
                Ok(()) => self.recover(),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(error = %e, "Error in main loop");
                    self.lifecycle.fail(format!("Unexpected error: {e}"));
                    tokio::select! {
                        () = shutdown.cancelled() => {}
                        () = tokio::time::sleep(self.config.error_backoff) => {}
                    }
                }
            }
        }
        info!("Shutdown requested");
        Ok(())
    }

    async fn step(&mut self, shutdown: &CancellationToken) -> Result<()> {
        let now = Instant::now();

        self.consumer.complete_due(now)?;

        let poll_due = self
            .last_poll
            .is_none_or(|last| now.duration_since(last) >= self.config.command_poll_interval);
        if poll_due {
            self.last_poll = Some(now);
            self.queue_drained = false;
            let outcome = self.consumer.poll(&mut self.link).await?;
            self.queue_drained = matches!(outcome, PollOutcome::Idle { .. });
        }

        let line = tokio::select! {
            biased;
            () = shutdown.cancelled() => return Ok(()),
            read = self.link.read_line() => read.map_err(BridgeError::SerialIo)?,
        };
        if let Some(line) = line {
            self.handle_line(&line);
        }

        if now.duration_since(self.last_sweep) >= self.config.sweep_interval {
            self.last_sweep = now;
            if self.queue_drained && !self.consumer.is_busy() {
                self.mailbox.sweeper.sweep();
            } else {
                self.mailbox.sweeper.sweep_scans();
            }
        }

        Ok(())
    }

    fn recover(&mut self) {
        if self.lifecycle.phase() == DaemonPhase::Error {
            info!("Main loop recovered");
            self.lifecycle.transition(
                DaemonPhase::Running,
                format!("Connected to {}", self.config.serial_port),
            );
        }
    }

    fn handle_line(&self, line: &str) {
        debug!(line, "Received");
        match InboundLine::parse(line) {
            InboundLine::CardUid(uid) => {
                info!(card_uid = %uid, "Card scanned");
                if let Err(e) = self.mailbox.scans.publish(&uid) {
                    let err = BridgeError::from(e);
                    warn!(card_uid = %uid, error = %err, "Scan dropped");
                }
            }
            InboundLine::System(message) => info!(%message, "Firmware system message"),
            InboundLine::Dispensing(product) => info!(%product, "Firmware dispensing"),
            InboundLine::Complete(product) => info!(%product, "Firmware dispensing complete"),
            InboundLine::FirmwareError(message) => warn!(%message, "Firmware error"),
            InboundLine::Unrecognized(raw) => {
                debug!(error = %BridgeError::Decode(raw), "Line ignored");
            }
        }
    }
}
