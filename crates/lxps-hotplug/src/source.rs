//! Kernel notification sources
//!
//! The monitor waits on a pollable descriptor and pulls one record at a time
//! once it turns readable. [`UdevSource`] is the production source; tests
//! substitute anything else that implements [`NotificationSource`].

use std::io;
use std::os::fd::{AsRawFd, RawFd};

use lxps_serial::StatusSink;
use tracing::{debug, warn};

use crate::error::{HotplugError, SetupStage};
use crate::events::{RawDeviceRecord, TTY_SUBSYSTEM};

/// A non-blocking stream of device records behind a pollable descriptor
pub trait NotificationSource: AsRawFd {
    /// Pull the next pending record.
    ///
    /// `Ok(None)` means nothing is pending right now.
    fn receive(&mut self) -> io::Result<Option<RawDeviceRecord>>;
}

/// The steps of bringing up a kernel device monitor.
///
/// Each step consumes the output of the one before it, so dropping an
/// intermediate value releases everything acquired up to that point.
pub trait SubsystemBuilder {
    /// Library context
    type Context;
    /// Monitor that is not yet receiving
    type Monitor;
    /// Receiving socket
    type Socket: AsRawFd;

    /// Create the library context
    fn context(&self) -> io::Result<Self::Context>;

    /// Create a monitor on `context`
    fn monitor(&self, context: Self::Context) -> io::Result<Self::Monitor>;

    /// Install a kernel-side filter for `subsystem`
    fn match_subsystem(&self, monitor: Self::Monitor, subsystem: &str) -> io::Result<Self::Monitor>;

    /// Start receiving
    fn listen(&self, monitor: Self::Monitor) -> io::Result<Self::Socket>;
}

/// [`SubsystemBuilder`] backed by libudev
#[derive(Debug, Clone, Copy, Default)]
pub struct UdevBuilder;

impl SubsystemBuilder for UdevBuilder {
    type Context = udev::Udev;
    type Monitor = udev::MonitorBuilder;
    type Socket = udev::MonitorSocket;

    fn context(&self) -> io::Result<udev::Udev> {
        udev::Udev::new()
    }

    fn monitor(&self, context: udev::Udev) -> io::Result<udev::MonitorBuilder> {
        // `with_udev` is pub(crate) in udev 0.9; `new()` builds the same udev-source monitor
        drop(context);
        udev::MonitorBuilder::new()
    }

    fn match_subsystem(
        &self,
        monitor: udev::MonitorBuilder,
        subsystem: &str,
    ) -> io::Result<udev::MonitorBuilder> {
        monitor.match_subsystem(subsystem)
    }

    fn listen(&self, monitor: udev::MonitorBuilder) -> io::Result<udev::MonitorSocket> {
        monitor.listen()
    }
}

/// A receiving socket and whether the tty filter made it in
#[derive(Debug)]
pub struct OpenedMonitor<T> {
    /// The receiving socket
    pub socket: T,
    /// Whether the kernel-side tty filter is installed
    pub filtered: bool,
}

/// Run the setup steps of `builder`, filtered to the tty subsystem when
/// possible.
///
/// A failed filter is reported and the monitor is rebuilt without one.
/// Every other failure is reported and returned with the stage it hit.
pub fn open_monitor<B, S>(builder: &B, sink: &S) -> Result<OpenedMonitor<B::Socket>, HotplugError>
where
    B: SubsystemBuilder,
    S: StatusSink,
{
    let monitor = new_monitor(builder, sink)?;
    let (monitor, filtered) = match builder.match_subsystem(monitor, TTY_SUBSYSTEM) {
        Ok(monitor) => (monitor, true),
        Err(e) => {
            sink.error(&format!(
                "Failed to add tty subsystem filter to udev monitor: {}",
                e
            ));
            warn!("Continuing with an unfiltered udev monitor");
            (new_monitor(builder, sink)?, false)
        }
    };

    let socket = builder.listen(monitor).map_err(|e| {
        sink.error(&format!("Failed to enable udev monitor receiving: {}", e));
        HotplugError::unavailable(SetupStage::EnableReceiving, e)
    })?;

    let fd = socket.as_raw_fd();
    if fd < 0 {
        sink.error("Failed to get udev monitor file descriptor");
        return Err(HotplugError::unavailable(
            SetupStage::Descriptor,
            format!("invalid descriptor {}", fd),
        ));
    }

    debug!("udev monitor listening on fd {} (filtered: {})", fd, filtered);

    Ok(OpenedMonitor { socket, filtered })
}

fn new_monitor<B, S>(builder: &B, sink: &S) -> Result<B::Monitor, HotplugError>
where
    B: SubsystemBuilder,
    S: StatusSink,
{
    let context = builder.context().map_err(|e| {
        sink.error(&format!("Failed to create udev context: {}", e));
        HotplugError::unavailable(SetupStage::Context, e)
    })?;

    builder.monitor(context).map_err(|e| {
        sink.error(&format!("Failed to create udev monitor: {}", e));
        HotplugError::unavailable(SetupStage::Monitor, e)
    })
}

/// Netlink monitor on the udev event stream
pub struct UdevSource {
    socket: udev::MonitorSocket,
    filtered: bool,
}

impl UdevSource {
    /// Open the udev monitor, filtered to the tty subsystem when possible
    pub fn open<S: StatusSink>(sink: &S) -> Result<Self, HotplugError> {
        let OpenedMonitor { socket, filtered } = open_monitor(&UdevBuilder, sink)?;
        Ok(Self { socket, filtered })
    }

    /// Whether the kernel-side tty filter is installed
    pub fn is_filtered(&self) -> bool {
        self.filtered
    }
}

impl AsRawFd for UdevSource {
    fn as_raw_fd(&self) -> RawFd {
        self.socket.as_raw_fd()
    }
}

impl NotificationSource for UdevSource {
    fn receive(&mut self) -> io::Result<Option<RawDeviceRecord>> {
        Ok(self
            .socket
            .iter()
            .next()
            .map(|event| RawDeviceRecord::from_udev(&event)))
    }
}
