//! One monitor lifecycle: build, scan, watch, tear down

use std::future::Future;

use lxps_detect::PortScanner;
use lxps_hotplug::{HotplugError, HotplugMonitor, LoopExit, NotificationSource};
use lxps_serial::{DeviceOpener, StatusSink};
use tracing::info;

/// How a cycle ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleEnd {
    /// The shutdown future fired (Ctrl-C)
    Interrupted,
    /// The event loop returned on its own
    Stopped(LoopExit),
    /// The monitor could not be built; ran without hotplug
    NoHotplug,
}

/// Run one monitor lifecycle.
///
/// `build` constructs the monitor. A construction failure is reported and
/// the cycle ends without watching. Otherwise the startup scan runs (when a
/// scanner is given), then the event loop runs until it stops or `shutdown`
/// completes. The monitor is torn down before returning.
pub async fn run_cycle<N, O, S, B, F>(
    build: B,
    scanner: Option<&PortScanner>,
    sink: &S,
    shutdown: F,
) -> CycleEnd
where
    N: NotificationSource,
    O: DeviceOpener,
    S: StatusSink + Clone,
    B: FnOnce() -> Result<HotplugMonitor<N, O, S>, HotplugError>,
    F: Future<Output = ()>,
{
    let mut monitor = match build() {
        Ok(monitor) => monitor,
        Err(e) => {
            sink.error(&format!("Hotplug monitoring unavailable: {}", e));
            sink.error("Continuing without hotplug support.");
            return CycleEnd::NoHotplug;
        }
    };

    if let Some(scanner) = scanner {
        let report = monitor.scan_initial_ports(scanner);
        info!(
            "Startup scan: {} opened, {} unopenable",
            report.opened().count(),
            report.unopenable().count()
        );
    }

    sink.info("Application started. Waiting for new serial connections...");
    sink.info("Plug in a serial device to trigger a connection attempt.");

    let end = tokio::select! {
        exit = monitor.run() => CycleEnd::Stopped(exit),
        _ = shutdown => CycleEnd::Interrupted,
    };

    let known = monitor.known_devices();
    if !known.is_empty() {
        let names: Vec<_> = known.iter().map(|p| p.as_str()).collect();
        info!("Devices known at end of cycle: {}", names.join(", "));
    }

    monitor.teardown();
    end
}

/// Whether a prompt answer asks for another cycle
pub fn wants_repeat(answer: &str) -> bool {
    matches!(answer.trim_start().chars().next(), Some('y' | 'Y'))
}
