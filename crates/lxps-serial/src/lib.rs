//! Serial device handling for lxps
//!
//! This crate owns everything that touches a serial device node directly:
//! opening handles, applying the fixed line configuration and single-shot
//! raw reads and writes. Progress and failures are reported through a
//! [`StatusSink`].
//!
//! # Example
//!
//! ```rust,no_run
//! use lxps_serial::{DeviceOpener, LineConfigurator, SerialOpener, TracingSink};
//!
//! let opener = SerialOpener::default();
//! let configurator = LineConfigurator::new(TracingSink);
//!
//! let mut handle = opener.open("/dev/ttyUSB0").unwrap();
//! configurator.configure(&mut handle, 9600).unwrap();
//! ```

pub mod error;
pub mod handle;
pub mod io;
pub mod line;
pub mod mock;
pub mod status;

pub use error::LineError;
pub use handle::{DeviceOpener, LineHandle, SerialHandle, SerialOpener, DEFAULT_READ_TIMEOUT};
pub use io::{read_frame, write_frame, FRAME_CAPACITY};
pub use line::{LineConfig, LineConfigurator, LineSetting, DEFAULT_BAUD_RATE};
pub use mock::{MockDevice, MockLine, MockOpener};
pub use status::{MemorySink, StatusReport, StatusSink, TracingSink};
