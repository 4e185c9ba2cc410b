//! lxps: serial device hotplug monitor
//!
//! Watches the kernel for serial devices being plugged in, opens and
//! configures each new one, and forgets it again when it is removed.

mod cycle;
mod privilege;
mod settings;
mod terminal;

use std::io::BufRead;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lxps_detect::PortScanner;
use lxps_hotplug::{HotplugMonitor, MonitorConfig};
use lxps_serial::{
    read_frame, write_frame, DeviceOpener, LineConfigurator, LineHandle, SerialOpener, StatusSink,
};
use settings::Settings;
use terminal::TerminalSink;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_FILTER: &str = "lxps=info,lxps_serial=info,lxps_detect=info,lxps_hotplug=info";

#[derive(Parser, Debug)]
#[command(name = "lxps")]
#[command(about = "Serial device hotplug monitor")]
#[command(version)]
struct Cli {
    /// Settings file (default: $XDG_CONFIG_HOME/lxps/settings.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Baud rate applied to serial devices
    #[arg(long, global = true)]
    baud: Option<u32>,

    /// Seconds a read waits for data before giving up
    #[arg(long, global = true, value_name = "SECS")]
    timeout: Option<u64>,

    /// Skip the startup scan of existing device nodes
    #[arg(long)]
    no_scan: bool,

    /// Run a single cycle without the repeat prompt
    #[arg(long)]
    once: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Watch for serial devices being attached and removed (default)
    Watch,
    /// Open and configure a port, then read one frame from it
    Read {
        /// Device path, e.g. /dev/ttyUSB0
        port: String,
    },
    /// Open and configure a port, then write text to it
    Write {
        /// Device path, e.g. /dev/ttyUSB0
        port: String,
        /// Text to send
        text: String,
    },
    /// List serial ports known to the operating system
    List,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings_path = cli.config.clone().or_else(Settings::default_path);
    let mut settings = Settings::load(settings_path.as_deref());
    if let Some(baud) = cli.baud {
        settings.baud_rate = baud;
    }
    if let Some(timeout) = cli.timeout {
        settings.read_timeout_secs = timeout;
    }
    if cli.no_scan {
        settings.initial_scan = false;
    }
    if cli.once {
        settings.repeat_prompt = false;
    }

    let default_filter = settings
        .log_filter
        .clone()
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Starting lxps");

    if let Some(path) = settings_path.filter(|p| !p.exists()) {
        match Settings::default().save(&path) {
            Ok(()) => tracing::info!("Wrote default settings to {}", path.display()),
            Err(e) => tracing::warn!("Could not write default settings: {:#}", e),
        }
    }

    match cli.command.unwrap_or(Commands::Watch) {
        Commands::Watch => watch(&settings).await,
        Commands::Read { port } => read_port(&port, &settings),
        Commands::Write { port, text } => write_port(&port, &text, &settings),
        Commands::List => list_ports(),
    }
}

/// Run monitor cycles until the user declines another
async fn watch(settings: &Settings) -> Result<()> {
    let sink = TerminalSink;
    privilege::warn_if_unprivileged(privilege::is_elevated(), &sink);

    let scanner = PortScanner::with_config(settings.scan_config());
    let config = MonitorConfig {
        baud_rate: settings.baud_rate,
    };

    loop {
        let end = cycle::run_cycle(
            || HotplugMonitor::new(SerialOpener::new(settings.read_timeout()), sink, config),
            settings.initial_scan.then_some(&scanner),
            &sink,
            async {
                // A failed handler install leaves the loop to end on its own
                if tokio::signal::ctrl_c().await.is_err() {
                    std::future::pending::<()>().await;
                }
            },
        )
        .await;
        tracing::debug!("Cycle ended: {:?}", end);

        if !settings.repeat_prompt {
            break;
        }

        sink.info("Application finished this cycle. Go again (Y/N)?");
        let mut answer = String::new();
        std::io::stdin()
            .lock()
            .read_line(&mut answer)
            .context("Failed to read answer")?;
        if !cycle::wants_repeat(&answer) {
            break;
        }
    }

    sink.info("Goodbye...");
    Ok(())
}

/// Open `port` and apply the line configuration
fn open_configured(port: &str, settings: &Settings) -> Result<impl LineHandle> {
    let opener = SerialOpener::new(settings.read_timeout());
    let mut handle = opener
        .open(port)
        .with_context(|| format!("Failed to open {}", port))?;

    LineConfigurator::new(TerminalSink)
        .configure(&mut handle, settings.baud_rate)
        .with_context(|| format!("Failed to configure {}", port))?;

    Ok(handle)
}

fn read_port(port: &str, settings: &Settings) -> Result<()> {
    let mut handle = open_configured(port, settings)?;
    let frame = read_frame(&mut handle, &TerminalSink);
    handle.close();

    let frame = frame.with_context(|| format!("Failed to read from {}", port))?;
    println!("{}", String::from_utf8_lossy(&frame));
    Ok(())
}

fn write_port(port: &str, text: &str, settings: &Settings) -> Result<()> {
    let mut handle = open_configured(port, settings)?;
    let written = write_frame(&mut handle, text.as_bytes(), &TerminalSink);
    handle.close();

    let written = written.with_context(|| format!("Failed to write to {}", port))?;
    if written < text.len() {
        TerminalSink.error(&format!(
            "Short write to {}: {} of {} bytes",
            port,
            written,
            text.len()
        ));
    }
    Ok(())
}

fn list_ports() -> Result<()> {
    let ports = PortScanner::new()
        .enumerate_ports()
        .context("Failed to enumerate serial ports")?;

    if ports.is_empty() {
        println!("No serial ports found");
    }
    for port in ports {
        println!("{}", port.display_label());
    }
    Ok(())
}
