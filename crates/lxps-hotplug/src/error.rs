//! Error types for the hotplug monitor

use std::fmt;

use thiserror::Error;

/// Step of monitor construction that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupStage {
    /// Opening the device subsystem context
    Context,
    /// Creating the netlink monitor
    Monitor,
    /// Enabling event reception
    EnableReceiving,
    /// Retrieving the pollable descriptor
    Descriptor,
    /// Registering the descriptor with the runtime
    Reactor,
}

impl fmt::Display for SetupStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Context => "udev context",
            Self::Monitor => "udev monitor",
            Self::EnableReceiving => "enable receiving",
            Self::Descriptor => "monitor descriptor",
            Self::Reactor => "reactor registration",
        };
        f.write_str(name)
    }
}

/// Errors that can occur in the hotplug monitor
#[derive(Debug, Error)]
pub enum HotplugError {
    /// The notification subsystem could not be set up
    #[error("device subsystem unavailable ({stage}): {reason}")]
    SubsystemUnavailable { stage: SetupStage, reason: String },
}

impl HotplugError {
    pub(crate) fn unavailable(stage: SetupStage, reason: impl fmt::Display) -> Self {
        Self::SubsystemUnavailable {
            stage,
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_message_names_stage() {
        let err = HotplugError::unavailable(SetupStage::EnableReceiving, "Operation not permitted");
        assert_eq!(
            err.to_string(),
            "device subsystem unavailable (enable receiving): Operation not permitted"
        );
    }
}
