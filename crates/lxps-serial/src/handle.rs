//! Device handles
//!
//! [`LineHandle`] is the seam between line configuration and the operating
//! system: the real implementation wraps a `serialport` port, tests plug in
//! scripted handles. [`DeviceOpener`] produces handles from device paths.
//!
//! Opening never touches the termios settings of a node. Only
//! [`LineConfigurator`](crate::LineConfigurator) changes them.

use std::fs::OpenOptions;
use std::io::{self, Read, Write};
use std::os::fd::{AsRawFd, FromRawFd, IntoRawFd};
use std::os::unix::fs::OpenOptionsExt;
use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits, TTYPort};
use tracing::{debug, trace};

use crate::error::LineError;

/// An open (or closed) serial device
pub trait LineHandle: Read + Write {
    /// Device path this handle was opened from
    fn path(&self) -> &str;

    /// Whether the underlying descriptor is still open
    fn is_open(&self) -> bool;

    /// Set the baud rate
    fn set_baud_rate(&mut self, baud_rate: u32) -> serialport::Result<()>;

    /// Set the character size
    fn set_data_bits(&mut self, data_bits: DataBits) -> serialport::Result<()>;

    /// Set the flow control mode
    fn set_flow_control(&mut self, flow_control: FlowControl) -> serialport::Result<()>;

    /// Set the parity mode
    fn set_parity(&mut self, parity: Parity) -> serialport::Result<()>;

    /// Set the number of stop bits
    fn set_stop_bits(&mut self, stop_bits: StopBits) -> serialport::Result<()>;

    /// Close the descriptor; closing twice is a no-op
    fn close(&mut self);
}

/// Opens device paths into handles
pub trait DeviceOpener {
    /// Handle type produced by this opener
    type Handle: LineHandle;

    /// Open the device node at `path`
    fn open(&self, path: &str) -> Result<Self::Handle, LineError>;
}

impl<O: DeviceOpener + ?Sized> DeviceOpener for &O {
    type Handle = O::Handle;

    fn open(&self, path: &str) -> Result<Self::Handle, LineError> {
        (**self).open(path)
    }
}

/// Serial port handle backed by the `serialport` crate
pub struct SerialHandle {
    path: String,
    port: Option<Box<dyn SerialPort>>,
}

impl SerialHandle {
    /// Wrap an already-open port
    pub fn new(path: impl Into<String>, port: Box<dyn SerialPort>) -> Self {
        Self {
            path: path.into(),
            port: Some(port),
        }
    }

    fn port_mut(&mut self) -> serialport::Result<&mut Box<dyn SerialPort>> {
        self.port.as_mut().ok_or_else(|| {
            serialport::Error::new(serialport::ErrorKind::NoDevice, "device is closed")
        })
    }
}

impl std::fmt::Debug for SerialHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialHandle")
            .field("path", &self.path)
            .field("open", &self.port.is_some())
            .finish()
    }
}

fn closed_error() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "device is closed")
}

impl Read for SerialHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.port.as_mut() {
            Some(port) => port.read(buf),
            None => Err(closed_error()),
        }
    }
}

impl Write for SerialHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.port.as_mut() {
            Some(port) => port.write(buf),
            None => Err(closed_error()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.port.as_mut() {
            Some(port) => port.flush(),
            None => Err(closed_error()),
        }
    }
}

impl LineHandle for SerialHandle {
    fn path(&self) -> &str {
        &self.path
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn set_baud_rate(&mut self, baud_rate: u32) -> serialport::Result<()> {
        self.port_mut()?.set_baud_rate(baud_rate)
    }

    fn set_data_bits(&mut self, data_bits: DataBits) -> serialport::Result<()> {
        self.port_mut()?.set_data_bits(data_bits)
    }

    fn set_flow_control(&mut self, flow_control: FlowControl) -> serialport::Result<()> {
        self.port_mut()?.set_flow_control(flow_control)
    }

    fn set_parity(&mut self, parity: Parity) -> serialport::Result<()> {
        self.port_mut()?.set_parity(parity)
    }

    fn set_stop_bits(&mut self, stop_bits: StopBits) -> serialport::Result<()> {
        self.port_mut()?.set_stop_bits(stop_bits)
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            trace!("Closed {}", self.path);
        }
    }
}

/// Read/write timeout used when none is configured
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Opens real serial devices
#[derive(Debug, Clone)]
pub struct SerialOpener {
    /// Read/write timeout for the opened port
    pub timeout: Duration,
}

impl SerialOpener {
    /// Create an opener whose handles wait up to `timeout` for I/O
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for SerialOpener {
    fn default() -> Self {
        Self::new(DEFAULT_READ_TIMEOUT)
    }
}

impl DeviceOpener for SerialOpener {
    type Handle = SerialHandle;

    fn open(&self, path: &str) -> Result<SerialHandle, LineError> {
        debug!("Opening {} (timeout {:?})", path, self.timeout);

        let open_failed = |reason: String| LineError::DeviceOpenFailed {
            path: path.to_string(),
            reason,
        };

        // O_NONBLOCK keeps open() from waiting on carrier detect
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NOCTTY | libc::O_NONBLOCK)
            .open(path)
            .map_err(|e| open_failed(e.to_string()))?;

        // SAFETY: isatty only inspects the descriptor, which `file` owns
        if unsafe { libc::isatty(file.as_raw_fd()) } != 1 {
            return Err(open_failed("not a terminal device".to_string()));
        }

        // SAFETY: F_SETFL on a descriptor owned by `file`
        if unsafe { libc::fcntl(file.as_raw_fd(), libc::F_SETFL, 0) } == -1 {
            return Err(open_failed(io::Error::last_os_error().to_string()));
        }

        // SAFETY: the descriptor is open and ownership moves into the port
        let mut port = unsafe { TTYPort::from_raw_fd(file.into_raw_fd()) };
        port.set_timeout(self.timeout)
            .map_err(|e| open_failed(e.to_string()))?;

        Ok(SerialHandle::new(path, Box::new(port)))
    }
}
