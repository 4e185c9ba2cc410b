//! Serial port scanner
//!
//! Two ways of finding ports live here. [`PortScanner::scan_initial_ports`]
//! walks the conventional Linux device names and probes whatever exists;
//! it is what the monitor runs once at startup. [`PortScanner::enumerate_ports`]
//! asks the `serialport` crate instead and returns USB metadata as well.

use std::path::Path;

use lxps_serial::{DeviceOpener, StatusSink};
use serialport::{available_ports, SerialPortType};
use tracing::{debug, info};

use crate::error::DetectError;
use crate::probe::{probe_port, ProbeResult};

/// Device-name prefixes probed at startup
pub const DEFAULT_PREFIXES: [&str; 3] = ["/dev/ttyS", "/dev/ttyUSB", "/dev/ttyACM"];

/// Exclusive upper bound of the index appended to each prefix
pub const DEFAULT_MAX_INDEX: u32 = 32;

/// Information about a serial port
#[derive(Debug, Clone)]
pub struct SerialPortInfo {
    /// Port name (e.g., /dev/ttyUSB0)
    pub port: String,
    /// USB Vendor ID (if USB)
    pub vid: Option<u16>,
    /// USB Product ID (if USB)
    pub pid: Option<u16>,
    /// USB serial number (if available)
    pub serial_number: Option<String>,
    /// USB manufacturer string
    pub manufacturer: Option<String>,
    /// USB product string
    pub product: Option<String>,
}

impl SerialPortInfo {
    /// Create from serialport crate's port info
    fn from_serialport(name: String, port_type: &SerialPortType) -> Self {
        match port_type {
            SerialPortType::UsbPort(usb) => Self {
                port: name,
                vid: Some(usb.vid),
                pid: Some(usb.pid),
                serial_number: usb.serial_number.clone(),
                manufacturer: usb.manufacturer.clone(),
                product: usb.product.clone(),
            },
            _ => Self {
                port: name,
                vid: None,
                pid: None,
                serial_number: None,
                manufacturer: None,
                product: None,
            },
        }
    }

    /// "ttyUSB0 (Product)" or just the port name
    pub fn display_label(&self) -> String {
        match &self.product {
            Some(product) => format!("{} ({})", self.port, product),
            None => self.port.clone(),
        }
    }
}

/// Scanner configuration
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Path prefixes; each gets indices `0..max_index` appended
    pub prefixes: Vec<String>,
    /// Exclusive upper bound on the index
    pub max_index: u32,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            prefixes: DEFAULT_PREFIXES.iter().map(|p| p.to_string()).collect(),
            max_index: DEFAULT_MAX_INDEX,
        }
    }
}

/// A device node found during the startup scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedPort {
    /// Device path
    pub path: String,
    /// Outcome of the liveness probe
    pub probe: ProbeResult,
}

/// Everything the startup scan found
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    /// Existing device nodes, in scan order
    pub ports: Vec<ScannedPort>,
}

impl ScanReport {
    /// Paths whose probe succeeded
    pub fn opened(&self) -> impl Iterator<Item = &str> {
        self.ports
            .iter()
            .filter(|p| p.probe.is_opened())
            .map(|p| p.path.as_str())
    }

    /// Paths that exist but could not be opened
    pub fn unopenable(&self) -> impl Iterator<Item = &str> {
        self.ports
            .iter()
            .filter(|p| !p.probe.is_opened())
            .map(|p| p.path.as_str())
    }
}

/// Serial port scanner
pub struct PortScanner {
    config: ScanConfig,
}

impl PortScanner {
    /// Create a scanner over the conventional device names
    pub fn new() -> Self {
        Self {
            config: ScanConfig::default(),
        }
    }

    /// Create a scanner with custom configuration
    pub fn with_config(config: ScanConfig) -> Self {
        Self { config }
    }

    /// Every candidate path, prefix-major
    pub fn candidate_paths(&self) -> Vec<String> {
        self.config
            .prefixes
            .iter()
            .flat_map(|prefix| (0..self.config.max_index).map(move |i| format!("{}{}", prefix, i)))
            .collect()
    }

    /// Probe every candidate path that exists on the filesystem
    ///
    /// Probing opens and closes the node; it never configures it.
    pub fn scan_initial_ports<O, S>(&self, opener: &O, sink: &S) -> ScanReport
    where
        O: DeviceOpener,
        S: StatusSink,
    {
        let mut report = ScanReport::default();

        for path in self.candidate_paths() {
            if !Path::new(&path).exists() {
                continue;
            }

            sink.info(&format!("Initial scan: Found filesystem entry {}", path));
            let probe = probe_port(opener, &path, sink);
            if probe.is_opened() {
                sink.info(&format!(
                    "Ports found with initial scan: {} (successfully opened)",
                    path
                ));
            } else {
                sink.info(&format!(
                    "Ports found with initial scan: {} (failed to open for testing)",
                    path
                ));
            }
            report.ports.push(ScannedPort { path, probe });
        }

        debug!(
            "Initial scan complete: {} found, {} opened",
            report.ports.len(),
            report.opened().count()
        );
        report
    }

    /// Enumerate ports known to the operating system
    pub fn enumerate_ports(&self) -> Result<Vec<SerialPortInfo>, DetectError> {
        info!("Enumerating serial ports...");
        let ports = available_ports().map_err(|e| DetectError::EnumerationFailed(e.to_string()))?;

        let result: Vec<_> = ports
            .into_iter()
            .map(|p| SerialPortInfo::from_serialport(p.port_name, &p.port_type))
            .collect();

        if result.is_empty() {
            info!("No serial ports found");
        } else {
            info!("Found {} serial port(s)", result.len());
        }

        Ok(result)
    }
}

impl Default for PortScanner {
    fn default() -> Self {
        Self::new()
    }
}
