//! Error types for serial device handling

use thiserror::Error;

use crate::line::LineSetting;

/// Errors that can occur while opening, configuring or talking to a device
#[derive(Debug, Error)]
pub enum LineError {
    /// Handle used before open or after close
    #[error("invalid handle for {path}: device is not open")]
    InvalidHandle { path: String },

    /// Failed to open the device node
    #[error("failed to open {path}: {reason}")]
    DeviceOpenFailed { path: String, reason: String },

    /// A line setting could not be applied
    #[error("failed to set {setting} for {path}: {reason}")]
    DeviceConfigureFailed {
        path: String,
        setting: LineSetting,
        reason: String,
    },

    /// Read or write primitive failed
    #[error("I/O error on {path}: {reason}")]
    IoFailure { path: String, reason: String },
}

impl LineError {
    /// Device path this error refers to
    pub fn path(&self) -> &str {
        match self {
            Self::InvalidHandle { path }
            | Self::DeviceOpenFailed { path, .. }
            | Self::DeviceConfigureFailed { path, .. }
            | Self::IoFailure { path, .. } => path,
        }
    }

    /// Underlying cause, without the device path
    pub fn reason(&self) -> &str {
        match self {
            Self::InvalidHandle { .. } => "device is not open",
            Self::DeviceOpenFailed { reason, .. }
            | Self::DeviceConfigureFailed { reason, .. }
            | Self::IoFailure { reason, .. } => reason,
        }
    }

    /// The line setting that failed, for configuration errors
    pub fn failed_setting(&self) -> Option<LineSetting> {
        match self {
            Self::DeviceConfigureFailed { setting, .. } => Some(*setting),
            _ => None,
        }
    }
}
