//! The hotplug monitor
//!
//! [`HotplugMonitor`] owns the notification source, the registry and the
//! dispatcher. [`HotplugMonitor::run`] waits for the source to become
//! readable, drains it one record at a time and applies each record in
//! arrival order until a shutdown is requested or the source fails.

use std::io::ErrorKind;

use lxps_detect::{PortScanner, ScanReport};
use lxps_serial::{DeviceOpener, StatusSink, DEFAULT_BAUD_RATE};
use tokio::io::unix::AsyncFd;
use tokio::io::Interest;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::dispatch::Dispatcher;
use crate::error::{HotplugError, SetupStage};
use crate::events::DevicePath;
use crate::registry::DeviceRegistry;
use crate::source::{NotificationSource, UdevSource};

/// Commands that can be sent to a running monitor
#[derive(Debug)]
pub enum MonitorCommand {
    /// Stop the event loop
    Shutdown,
}

/// Why [`HotplugMonitor::run`] returned
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopExit {
    /// Shutdown was requested or the monitor was already torn down
    Cancelled,
    /// Waiting on or reading from the source failed
    Failed(String),
}

/// Monitor settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Baud rate applied to attached devices
    pub baud_rate: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
        }
    }
}

/// Cloneable handle used to stop a running monitor from elsewhere
#[derive(Debug, Clone)]
pub struct StopHandle {
    tx: mpsc::Sender<MonitorCommand>,
}

impl StopHandle {
    /// Ask the monitor to stop; returns false if it is already gone
    pub async fn shutdown(&self) -> bool {
        self.tx.send(MonitorCommand::Shutdown).await.is_ok()
    }

    /// Non-async variant of [`StopHandle::shutdown`]
    pub fn try_shutdown(&self) -> bool {
        self.tx.try_send(MonitorCommand::Shutdown).is_ok()
    }
}

/// Watches a notification source and keeps the device registry current
pub struct HotplugMonitor<N, O, S>
where
    N: NotificationSource,
    O: DeviceOpener,
    S: StatusSink + Clone,
{
    source: Option<AsyncFd<N>>,
    registry: DeviceRegistry,
    dispatcher: Dispatcher<O, S>,
    sink: S,
    cmd_tx: mpsc::Sender<MonitorCommand>,
    cmd_rx: mpsc::Receiver<MonitorCommand>,
}

impl<O, S> HotplugMonitor<UdevSource, O, S>
where
    O: DeviceOpener,
    S: StatusSink + Clone,
{
    /// Open the udev monitor and register it with the runtime.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(opener: O, sink: S, config: MonitorConfig) -> Result<Self, HotplugError> {
        let source = UdevSource::open(&sink)?;
        if !source.is_filtered() {
            warn!("Monitor receives every subsystem; non-tty records are discarded");
        }
        Self::with_source(source, opener, sink, config)
    }
}

impl<N, O, S> HotplugMonitor<N, O, S>
where
    N: NotificationSource,
    O: DeviceOpener,
    S: StatusSink + Clone,
{
    /// Build a monitor over an already opened source.
    ///
    /// The source is dropped if it cannot be registered.
    pub fn with_source(
        source: N,
        opener: O,
        sink: S,
        config: MonitorConfig,
    ) -> Result<Self, HotplugError> {
        let source = AsyncFd::with_interest(source, Interest::READABLE).map_err(|e| {
            sink.error(&format!("Failed to register udev monitor descriptor: {}", e));
            HotplugError::unavailable(SetupStage::Reactor, e)
        })?;

        let (cmd_tx, cmd_rx) = mpsc::channel(4);
        sink.info("Udev monitor started, listening for new serial devices.");

        Ok(Self {
            source: Some(source),
            registry: DeviceRegistry::new(),
            dispatcher: Dispatcher::new(opener, sink.clone(), config.baud_rate),
            sink,
            cmd_tx,
            cmd_rx,
        })
    }

    /// Probe the device nodes that already exist.
    ///
    /// Probed devices are reported but not added to the registry; they
    /// become known only through an attach event.
    pub fn scan_initial_ports(&self, scanner: &PortScanner) -> ScanReport {
        scanner.scan_initial_ports(self.dispatcher.opener(), &self.sink)
    }

    /// Handle for stopping [`HotplugMonitor::run`]
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            tx: self.cmd_tx.clone(),
        }
    }

    /// Paths currently known, sorted
    pub fn known_devices(&self) -> Vec<DevicePath> {
        self.registry.snapshot()
    }

    /// Whether `path` is currently known
    pub fn is_known(&self, path: &str) -> bool {
        self.registry.contains(path)
    }

    /// Whether the source is still held
    pub fn is_running(&self) -> bool {
        self.source.is_some()
    }

    /// Process records until shutdown or failure
    pub async fn run(&mut self) -> LoopExit {
        let Some(source) = self.source.as_mut() else {
            return LoopExit::Cancelled;
        };

        info!("Hotplug event loop started");

        loop {
            tokio::select! {
                cmd = self.cmd_rx.recv() => {
                    match cmd {
                        Some(MonitorCommand::Shutdown) | None => {
                            info!("Shutdown requested for hotplug monitor");
                            return LoopExit::Cancelled;
                        }
                    }
                }

                ready = source.readable_mut() => {
                    let mut guard = match ready {
                        Ok(guard) => guard,
                        Err(e) => {
                            self.sink.error(&format!("Error reading udev events: {}", e));
                            return LoopExit::Failed(e.to_string());
                        }
                    };

                    match guard.get_inner_mut().receive() {
                        Ok(Some(record)) => {
                            let outcome = self.dispatcher.handle_record(&mut self.registry, &record);
                            debug!("Dispatched {:?}", outcome);
                        }
                        Ok(None) => guard.clear_ready(),
                        Err(e) if e.kind() == ErrorKind::WouldBlock => guard.clear_ready(),
                        Err(e) => {
                            self.sink.error(&format!("Error reading udev events: {}", e));
                            return LoopExit::Failed(e.to_string());
                        }
                    }
                }
            }
        }
    }

    /// Release the source and forget every known device.
    ///
    /// Safe to call any number of times.
    pub fn teardown(&mut self) {
        let Some(source) = self.source.take() else {
            return;
        };

        drop(source.into_inner());
        self.registry.clear();
        self.cmd_rx.close();
        self.sink.info("Udev monitor stopped.");
    }
}

impl<N, O, S> Drop for HotplugMonitor<N, O, S>
where
    N: NotificationSource,
    O: DeviceOpener,
    S: StatusSink + Clone,
{
    fn drop(&mut self) {
        self.teardown();
    }
}
