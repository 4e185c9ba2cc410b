//! Scripted devices for tests
//!
//! [`MockOpener`] stands in for the device filesystem: paths are registered
//! up front with the behaviour they should exhibit, and every open, setting
//! and close is logged so tests can assert on what was (or was not)
//! attempted. Handles produced by one opener share its log.

use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex, MutexGuard};

use serialport::{DataBits, FlowControl, Parity, StopBits};

use crate::error::LineError;
use crate::handle::{DeviceOpener, LineHandle};
use crate::line::LineSetting;

/// Behaviour of one scripted device
#[derive(Debug, Clone, Default)]
pub struct MockDevice {
    /// Open fails with this reason
    pub open_error: Option<String>,
    /// This setting fails during configuration
    pub fail_at: Option<LineSetting>,
    /// Bytes returned by reads
    pub incoming: Vec<u8>,
}

#[derive(Debug, Default)]
struct MockBus {
    devices: HashMap<String, MockDevice>,
    opens: Vec<String>,
    settings: Vec<(String, LineSetting)>,
    closes: Vec<String>,
}

/// Opener over a set of scripted devices
#[derive(Debug, Clone, Default)]
pub struct MockOpener {
    bus: Arc<Mutex<MockBus>>,
}

fn lock(bus: &Mutex<MockBus>) -> MutexGuard<'_, MockBus> {
    bus.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockOpener {
    /// Opener with no devices; every open fails
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a device that opens and configures cleanly
    pub fn add_device(&self, path: &str) -> &Self {
        self.insert(path, MockDevice::default())
    }

    /// Register a device whose open fails
    pub fn add_unopenable(&self, path: &str, reason: &str) -> &Self {
        self.insert(
            path,
            MockDevice {
                open_error: Some(reason.to_string()),
                ..Default::default()
            },
        )
    }

    /// Register a device that rejects one line setting
    pub fn add_misconfigured(&self, path: &str, setting: LineSetting) -> &Self {
        self.insert(
            path,
            MockDevice {
                fail_at: Some(setting),
                ..Default::default()
            },
        )
    }

    /// Register a device with full control over its behaviour
    pub fn insert(&self, path: &str, device: MockDevice) -> &Self {
        lock(&self.bus).devices.insert(path.to_string(), device);
        self
    }

    /// Every path passed to `open`, in order
    pub fn open_attempts(&self) -> Vec<String> {
        lock(&self.bus).opens.clone()
    }

    /// Number of open attempts for `path`
    pub fn open_count(&self, path: &str) -> usize {
        lock(&self.bus).opens.iter().filter(|p| *p == path).count()
    }

    /// Settings attempted on handles for `path`, in order
    pub fn setting_attempts(&self, path: &str) -> Vec<LineSetting> {
        lock(&self.bus)
            .settings
            .iter()
            .filter(|(p, _)| p == path)
            .map(|(_, s)| *s)
            .collect()
    }

    /// Number of times a handle for `path` was closed
    pub fn close_count(&self, path: &str) -> usize {
        lock(&self.bus).closes.iter().filter(|p| *p == path).count()
    }
}

impl DeviceOpener for MockOpener {
    type Handle = MockLine;

    fn open(&self, path: &str) -> Result<MockLine, LineError> {
        let mut bus = lock(&self.bus);
        bus.opens.push(path.to_string());

        let device = match bus.devices.get(path) {
            Some(device) => device.clone(),
            None => {
                return Err(LineError::DeviceOpenFailed {
                    path: path.to_string(),
                    reason: "No such file or directory".to_string(),
                })
            }
        };

        if let Some(reason) = device.open_error {
            return Err(LineError::DeviceOpenFailed {
                path: path.to_string(),
                reason,
            });
        }

        let mut line = MockLine::new(path);
        line.fail_at = device.fail_at;
        line.incoming = device.incoming;
        line.bus = Some(Arc::clone(&self.bus));
        Ok(line)
    }
}

/// Scripted serial handle
#[derive(Debug, Default)]
pub struct MockLine {
    pub path: String,
    pub open: bool,
    /// This setting fails when applied
    pub fail_at: Option<LineSetting>,
    /// Settings attempted on this handle
    pub attempts: Vec<LineSetting>,
    /// Bytes handed out by reads
    pub incoming: Vec<u8>,
    /// Bytes accepted by writes
    pub written: Vec<u8>,
    /// Reads and writes fail
    pub io_error: bool,
    /// Cap on bytes accepted per write
    pub write_limit: Option<usize>,
    bus: Option<Arc<Mutex<MockBus>>>,
}

impl MockLine {
    /// An open, standalone handle
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            open: true,
            ..Default::default()
        }
    }

    fn step(&mut self, setting: LineSetting) -> serialport::Result<()> {
        self.attempts.push(setting);
        if let Some(bus) = &self.bus {
            lock(bus).settings.push((self.path.clone(), setting));
        }

        if self.fail_at == Some(setting) {
            Err(serialport::Error::new(
                serialport::ErrorKind::InvalidInput,
                "scripted failure",
            ))
        } else {
            Ok(())
        }
    }
}

impl Read for MockLine {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.io_error {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "scripted failure"));
        }
        let n = buf.len().min(self.incoming.len());
        buf[..n].copy_from_slice(&self.incoming[..n]);
        self.incoming.drain(..n);
        Ok(n)
    }
}

impl Write for MockLine {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.io_error {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "scripted failure"));
        }
        let n = self.write_limit.map_or(buf.len(), |limit| buf.len().min(limit));
        self.written.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl LineHandle for MockLine {
    fn path(&self) -> &str {
        &self.path
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn set_baud_rate(&mut self, _baud_rate: u32) -> serialport::Result<()> {
        self.step(LineSetting::BaudRate)
    }

    fn set_data_bits(&mut self, _data_bits: DataBits) -> serialport::Result<()> {
        self.step(LineSetting::DataBits)
    }

    fn set_flow_control(&mut self, _flow_control: FlowControl) -> serialport::Result<()> {
        self.step(LineSetting::FlowControl)
    }

    fn set_parity(&mut self, _parity: Parity) -> serialport::Result<()> {
        self.step(LineSetting::Parity)
    }

    fn set_stop_bits(&mut self, _stop_bits: StopBits) -> serialport::Result<()> {
        self.step(LineSetting::StopBits)
    }

    fn close(&mut self) {
        if !self.open {
            return;
        }
        self.open = false;
        if let Some(bus) = &self.bus {
            lock(bus).closes.push(self.path.clone());
        }
    }
}
