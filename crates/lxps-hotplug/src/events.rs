//! Device events
//!
//! Raw notification records carry free-form strings. They are decoded once,
//! here, into a closed [`DeviceEvent`]; anything that is not a tty add or
//! remove is discarded with a [`Discard`] reason and never reaches dispatch.

use std::borrow::Borrow;
use std::fmt;

/// Subsystem class the monitor cares about
pub const TTY_SUBSYSTEM: &str = "tty";

/// Path of a device node, e.g. `/dev/ttyUSB0`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DevicePath(String);

impl DevicePath {
    /// Wrap a path
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// The path as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DevicePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DevicePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for DevicePath {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DevicePath {
    fn from(path: &str) -> Self {
        Self(path.to_string())
    }
}

impl From<String> for DevicePath {
    fn from(path: String) -> Self {
        Self(path)
    }
}

/// One undecoded notification record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawDeviceRecord {
    /// Action string ("add", "remove", "change", ...)
    pub action: Option<String>,
    /// Device node path
    pub devnode: Option<String>,
    /// Subsystem class
    pub subsystem: Option<String>,
}

impl RawDeviceRecord {
    /// Build a record from optional string parts
    pub fn new(action: Option<&str>, devnode: Option<&str>, subsystem: Option<&str>) -> Self {
        Self {
            action: action.map(str::to_string),
            devnode: devnode.map(str::to_string),
            subsystem: subsystem.map(str::to_string),
        }
    }

    /// Shorthand for a record with every field present
    pub fn complete(action: &str, devnode: &str, subsystem: &str) -> Self {
        Self::new(Some(action), Some(devnode), Some(subsystem))
    }

    pub(crate) fn from_udev(event: &udev::Event) -> Self {
        let device = event.device();
        Self {
            action: device.action().map(|a| a.to_string_lossy().into_owned()),
            devnode: device.devnode().map(|p| p.to_string_lossy().into_owned()),
            subsystem: device.subsystem().map(|s| s.to_string_lossy().into_owned()),
        }
    }
}

/// Why a record produced no event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discard {
    /// No device node path
    MissingDevnode,
    /// No subsystem
    MissingSubsystem,
    /// Subsystem other than tty
    ForeignSubsystem(String),
    /// Action other than add/remove
    UnsupportedAction(Option<String>),
}

impl fmt::Display for Discard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingDevnode => f.write_str("record has no device node"),
            Self::MissingSubsystem => f.write_str("record has no subsystem"),
            Self::ForeignSubsystem(s) => write!(f, "subsystem {} is not tty", s),
            Self::UnsupportedAction(Some(a)) => write!(f, "action {} is ignored", a),
            Self::UnsupportedAction(None) => f.write_str("record has no action"),
        }
    }
}

/// A decoded attach or detach
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    /// A tty device node appeared
    Attached(DevicePath),
    /// A tty device node went away
    Detached(DevicePath),
}

impl DeviceEvent {
    /// Decode a raw record
    pub fn decode(record: &RawDeviceRecord) -> Result<Self, Discard> {
        let devnode = record.devnode.as_deref().ok_or(Discard::MissingDevnode)?;
        let subsystem = record.subsystem.as_deref().ok_or(Discard::MissingSubsystem)?;

        if subsystem != TTY_SUBSYSTEM {
            return Err(Discard::ForeignSubsystem(subsystem.to_string()));
        }

        match record.action.as_deref() {
            Some("add") => Ok(Self::Attached(DevicePath::from(devnode))),
            Some("remove") => Ok(Self::Detached(DevicePath::from(devnode))),
            other => Err(Discard::UnsupportedAction(other.map(str::to_string))),
        }
    }

    /// Path the event refers to
    pub fn path(&self) -> &DevicePath {
        match self {
            Self::Attached(path) | Self::Detached(path) => path,
        }
    }

    /// "add" or "remove"
    pub fn action(&self) -> &'static str {
        match self {
            Self::Attached(_) => "add",
            Self::Detached(_) => "remove",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_add_and_remove() {
        let add = RawDeviceRecord::complete("add", "/dev/ttyACM0", "tty");
        let remove = RawDeviceRecord::complete("remove", "/dev/ttyACM0", "tty");

        assert_eq!(
            DeviceEvent::decode(&add),
            Ok(DeviceEvent::Attached("/dev/ttyACM0".into()))
        );
        assert_eq!(
            DeviceEvent::decode(&remove),
            Ok(DeviceEvent::Detached("/dev/ttyACM0".into()))
        );
    }

    #[test]
    fn test_decode_discards() {
        let cases = [
            (
                RawDeviceRecord::new(Some("add"), None, Some("tty")),
                Discard::MissingDevnode,
            ),
            (
                RawDeviceRecord::new(Some("add"), Some("/dev/ttyUSB0"), None),
                Discard::MissingSubsystem,
            ),
            (
                RawDeviceRecord::complete("add", "/dev/sda", "block"),
                Discard::ForeignSubsystem("block".to_string()),
            ),
            (
                RawDeviceRecord::complete("change", "/dev/ttyUSB0", "tty"),
                Discard::UnsupportedAction(Some("change".to_string())),
            ),
            (
                RawDeviceRecord::new(None, Some("/dev/ttyUSB0"), Some("tty")),
                Discard::UnsupportedAction(None),
            ),
        ];

        for (record, expected) in cases {
            assert_eq!(DeviceEvent::decode(&record), Err(expected));
        }
    }

    #[test]
    fn test_event_accessors() {
        let event = DeviceEvent::Detached(DevicePath::new("/dev/ttyS4"));
        assert_eq!(event.path().as_str(), "/dev/ttyS4");
        assert_eq!(event.action(), "remove");
    }
}
