//! Serial line configuration
//!
//! Every attached device gets the same line setup: the requested baud rate,
//! 8 data bits, no flow control, no parity and one stop bit. Settings are
//! applied one at a time in that fixed order and the first failure aborts
//! the rest. A handle that failed part-way is not usable and must be
//! closed by the caller.

use std::fmt;

use serialport::{DataBits, FlowControl, Parity, StopBits};
use tracing::debug;

use crate::error::LineError;
use crate::handle::LineHandle;
use crate::status::StatusSink;

/// Baud rate applied to hotplugged devices
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// One step of the configuration sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineSetting {
    BaudRate,
    DataBits,
    FlowControl,
    Parity,
    StopBits,
}

impl LineSetting {
    /// Application order
    pub const ORDER: [LineSetting; 5] = [
        LineSetting::BaudRate,
        LineSetting::DataBits,
        LineSetting::FlowControl,
        LineSetting::Parity,
        LineSetting::StopBits,
    ];

    /// Human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            Self::BaudRate => "baud rate",
            Self::DataBits => "data bits",
            Self::FlowControl => "flow control",
            Self::Parity => "parity",
            Self::StopBits => "stop bits",
        }
    }
}

impl fmt::Display for LineSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Complete line configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineConfig {
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub flow_control: FlowControl,
    pub parity: Parity,
    pub stop_bits: StopBits,
}

impl LineConfig {
    /// 8N1 without flow control at the given baud rate
    pub fn with_baud_rate(baud_rate: u32) -> Self {
        Self {
            baud_rate,
            data_bits: DataBits::Eight,
            flow_control: FlowControl::None,
            parity: Parity::None,
            stop_bits: StopBits::One,
        }
    }

    /// Short description, e.g. "9600 8N1, no flow control"
    pub fn summary(&self) -> String {
        let bits = match self.data_bits {
            DataBits::Five => '5',
            DataBits::Six => '6',
            DataBits::Seven => '7',
            DataBits::Eight => '8',
        };
        let parity = match self.parity {
            Parity::None => 'N',
            Parity::Odd => 'O',
            Parity::Even => 'E',
        };
        let stop = match self.stop_bits {
            StopBits::One => '1',
            StopBits::Two => '2',
        };
        let flow = match self.flow_control {
            FlowControl::None => "no flow control",
            FlowControl::Software => "software flow control",
            FlowControl::Hardware => "hardware flow control",
        };
        format!("{} {}{}{}, {}", self.baud_rate, bits, parity, stop, flow)
    }
}

impl Default for LineConfig {
    fn default() -> Self {
        Self::with_baud_rate(DEFAULT_BAUD_RATE)
    }
}

/// Applies [`LineConfig`] to open handles, reporting each outcome
pub struct LineConfigurator<S> {
    sink: S,
}

impl<S: StatusSink> LineConfigurator<S> {
    /// Create a configurator reporting to `sink`
    pub fn new(sink: S) -> Self {
        Self { sink }
    }

    /// Apply 8N1 without flow control at `baud_rate`
    pub fn configure<H>(&self, handle: &mut H, baud_rate: u32) -> Result<(), LineError>
    where
        H: LineHandle + ?Sized,
    {
        self.apply(handle, &LineConfig::with_baud_rate(baud_rate))
    }

    /// Apply `config` step by step, stopping at the first failure
    pub fn apply<H>(&self, handle: &mut H, config: &LineConfig) -> Result<(), LineError>
    where
        H: LineHandle + ?Sized,
    {
        let path = handle.path().to_string();

        if !handle.is_open() {
            self.sink.error(&format!(
                "Error: configure called with a closed serial port for {}",
                path
            ));
            return Err(LineError::InvalidHandle { path });
        }

        debug!("Applying {} to {}", config.summary(), path);

        for setting in LineSetting::ORDER {
            let result = match setting {
                LineSetting::BaudRate => handle.set_baud_rate(config.baud_rate),
                LineSetting::DataBits => handle.set_data_bits(config.data_bits),
                LineSetting::FlowControl => handle.set_flow_control(config.flow_control),
                LineSetting::Parity => handle.set_parity(config.parity),
                LineSetting::StopBits => handle.set_stop_bits(config.stop_bits),
            };

            match result {
                Ok(()) if setting == LineSetting::BaudRate => {
                    self.sink.info(&format!(
                        "Setting baud rate to {} for {}: Success",
                        config.baud_rate, path
                    ));
                }
                Ok(()) => debug!("Set {} for {}", setting, path),
                Err(e) => {
                    let message = if setting == LineSetting::BaudRate {
                        format!(
                            "Setting baud rate to {} for {}: Fail. Error: {}",
                            config.baud_rate, path, e
                        )
                    } else {
                        format!("Error setting {} for {}: {}", setting, path, e)
                    };
                    self.sink.error(&message);
                    return Err(LineError::DeviceConfigureFailed {
                        path,
                        setting,
                        reason: e.to_string(),
                    });
                }
            }
        }

        self.sink.info(&format!(
            "Other serial options (8N1, no flow) set for {}: Success",
            path
        ));
        Ok(())
    }
}
