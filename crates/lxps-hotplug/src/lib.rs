//! Serial device hotplug monitoring
//!
//! This crate listens to kernel device notifications, decodes the tty
//! attach and detach events and keeps a registry of the serial devices
//! that were successfully opened and configured.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   readable   ┌────────────────┐  DeviceEvent  ┌────────────┐
//! │ udev monitor │ ───────────► │ HotplugMonitor │ ────────────► │ Dispatcher │
//! └──────────────┘   (AsyncFd)  └────────────────┘               └─────┬──────┘
//!                                                                       │
//!                                       open / configure / close        ▼
//!                                  ┌──────────────┐             ┌────────────────┐
//!                                  │ DeviceOpener │ ◄────────── │ DeviceRegistry │
//!                                  └──────────────┘             └────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use lxps_hotplug::{HotplugMonitor, MonitorConfig};
//! use lxps_serial::{SerialOpener, TracingSink};
//!
//! # async fn example() -> Result<(), lxps_hotplug::HotplugError> {
//! let mut monitor = HotplugMonitor::new(SerialOpener::default(), TracingSink, MonitorConfig::default())?;
//! monitor.run().await;
//! monitor.teardown();
//! # Ok(())
//! # }
//! ```

pub mod dispatch;
pub mod error;
pub mod events;
pub mod monitor;
pub mod registry;
pub mod source;

pub use dispatch::{ConnectionAttempt, DispatchOutcome, Dispatcher};
pub use error::{HotplugError, SetupStage};
pub use events::{DeviceEvent, DevicePath, Discard, RawDeviceRecord, TTY_SUBSYSTEM};
pub use monitor::{HotplugMonitor, LoopExit, MonitorCommand, MonitorConfig, StopHandle};
pub use registry::{DeviceRegistry, DeviceState};
pub use source::{open_monitor, NotificationSource, OpenedMonitor, SubsystemBuilder, UdevBuilder, UdevSource};
