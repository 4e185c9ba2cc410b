//! Serial Port Detection Library
//!
//! This crate finds serial device nodes that already exist when lxps
//! starts and checks whether they can be opened.
//!
//! # Example
//!
//! ```rust,no_run
//! use lxps_detect::PortScanner;
//! use lxps_serial::{SerialOpener, TracingSink};
//!
//! let scanner = PortScanner::new();
//! let report = scanner.scan_initial_ports(&SerialOpener::default(), &TracingSink);
//!
//! for path in report.opened() {
//!     println!("Found port: {}", path);
//! }
//! ```

pub mod error;
pub mod probe;
pub mod scanner;

pub use error::DetectError;
pub use probe::{probe_port, ProbeResult};
pub use scanner::{
    PortScanner, ScanConfig, ScanReport, ScannedPort, SerialPortInfo, DEFAULT_MAX_INDEX,
    DEFAULT_PREFIXES,
};
