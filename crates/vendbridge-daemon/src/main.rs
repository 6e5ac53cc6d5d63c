//! `vendbridge` - card reader and dispenser bridge.

use std::path::PathBuf;

use anyhow::Context;
use chrono::Local;
use clap::{Parser, Subcommand};
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use vendbridge_core::constants::{DEFAULT_BAUD_RATE, DEFAULT_SERIAL_PORT};
use vendbridge_core::{BridgeConfig, DispenseCommand, ProductType};
use vendbridge_hardware::AnySerialLink;
use vendbridge_hardware::mock::{MockSerial, MockSerialHandle};
use vendbridge_hardware::port::SerialPortLink;
use vendbridge_mailbox::Mailbox;

#[derive(Parser)]
#[command(name = "vendbridge")]
#[command(about = "Bridge between a serial card reader / dispenser and a file mailbox")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Serial device of the controller
    #[arg(short, long, env = "VENDBRIDGE_PORT", default_value = DEFAULT_SERIAL_PORT, global = true)]
    port: String,

    /// Directory holding card_scans/, dispense_commands/ and the status file
    #[arg(long, env = "VENDBRIDGE_BASE_DIR", default_value = ".", global = true)]
    base_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bridge (default)
    Run {
        /// Serial line speed
        #[arg(long, default_value_t = DEFAULT_BAUD_RATE)]
        baud: u32,

        /// Use a simulated controller fed with firmware lines from stdin
        #[arg(long)]
        mock: bool,
    },
    /// Print the status last written by the bridge
    Status,
    /// Queue a dispense command
    Dispense {
        /// Product to dispense (pad or tampon)
        product: ProductType,
    },
    /// List pending dispense commands in processing order
    Pending,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let config = BridgeConfig::new(cli.port).base_dir(cli.base_dir);

    match cli.command {
        None => run_bridge(config, false).await,
        Some(Commands::Run { baud, mock }) => run_bridge(config.baud_rate(baud), mock).await,
        Some(Commands::Status) => print_status(&config),
        Some(Commands::Dispense { product }) => enqueue(&config, product),
        Some(Commands::Pending) => list_pending(&config),
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn run_bridge(config: BridgeConfig, mock: bool) -> anyhow::Result<()> {
    config.validate().context("invalid configuration")?;

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received, stopping card reader");
                signal.cancel();
            }
            Err(e) => warn!(error = %e, "Cannot listen for interrupt signal"),
        }
    });

    let simulated = mock.then(|| {
        let (link, handle) = MockSerial::with_name(config.serial_port.clone());
        tokio::spawn(feed_mock(handle, shutdown.clone()));
        link
    });
    let open = move |config: &BridgeConfig| -> vendbridge_hardware::Result<AnySerialLink> {
        match simulated {
            Some(link) => Ok(link.into()),
            None => SerialPortLink::open(config).map(Into::into),
        }
    };

    vendbridge_daemon::run(config, open, shutdown).await?;
    Ok(())
}

/// Forward stdin to the simulated controller, one firmware line per line.
async fn feed_mock(handle: MockSerialHandle, shutdown: CancellationToken) {
    info!("Simulated controller reading firmware lines from stdin");
    match handle.replay(BufReader::new(tokio::io::stdin())).await {
        Ok(lines) => info!(lines, "Simulated controller input ended"),
        Err(e) => warn!(error = %e, "Simulated controller input failed"),
    }
    // The handle must outlive the bridge, or the link reports a disconnect.
    shutdown.cancelled().await;
}

fn print_status(config: &BridgeConfig) -> anyhow::Result<()> {
    let record = Mailbox::new(config)
        .status
        .read()
        .context("no status available, has the bridge run in this directory?")?;

    println!("status:      {}", record.status);
    println!("message:     {}", record.message);
    println!("timestamp:   {}", record.timestamp.to_rfc3339());
    println!("serial_port: {}", record.serial_port);
    Ok(())
}

fn enqueue(config: &BridgeConfig, product: ProductType) -> anyhow::Result<()> {
    let mailbox = Mailbox::open(config)?;
    let command_id = Local::now().timestamp_millis().to_string();
    let path = mailbox
        .commands
        .submit(&DispenseCommand::new(command_id, product))?;

    println!("{}", path.display());
    Ok(())
}

fn list_pending(config: &BridgeConfig) -> anyhow::Result<()> {
    let queue = Mailbox::new(config).commands;
    let entries = queue
        .pending()
        .with_context(|| format!("cannot list {}", queue.dir().display()))?;

    for entry in entries {
        let product = match queue.load(&entry) {
            Ok(command) => command.product_type.to_string(),
            Err(e) => format!("invalid ({e})"),
        };
        println!("{}\t{}", entry.file_name(), product);
    }
    Ok(())
}
