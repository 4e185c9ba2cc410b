//! Event dispatch and device lifecycle
//!
//! A path is either unknown or known. An attach for an unknown path opens
//! the node, applies the line configuration and closes it again; only a
//! fully configured device becomes known. A detach always forgets the path.
//! Every failure is reported and folded into the registry decision, never
//! returned to the caller.

use lxps_serial::{DeviceOpener, LineConfigurator, LineHandle, StatusSink};
use tracing::debug;

use crate::events::{DeviceEvent, DevicePath, Discard, RawDeviceRecord};
use crate::registry::{DeviceRegistry, DeviceState};

/// Outcome of trying to open and configure a newly attached device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionAttempt {
    /// Opened, configured and closed again
    Opened,
    /// The node could not be opened
    OpenFailed(String),
    /// A line setting could not be applied
    ConfigureFailed(String),
}

/// What dispatching one record did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Record did not decode to an event
    Discarded(Discard),
    /// Attach for a path that is already known
    AlreadyKnown(DevicePath),
    /// Attach for an unknown path
    Attempted(DevicePath, ConnectionAttempt),
    /// Detach; `was_known` tells whether anything changed
    Removed { path: DevicePath, was_known: bool },
}

/// Applies device events to a registry
pub struct Dispatcher<O, S> {
    opener: O,
    configurator: LineConfigurator<S>,
    sink: S,
    baud_rate: u32,
}

impl<O, S> Dispatcher<O, S>
where
    O: DeviceOpener,
    S: StatusSink + Clone,
{
    /// Create a dispatcher configuring attached devices at `baud_rate`
    pub fn new(opener: O, sink: S, baud_rate: u32) -> Self {
        Self {
            opener,
            configurator: LineConfigurator::new(sink.clone()),
            sink,
            baud_rate,
        }
    }

    /// The opener used for attached devices
    pub fn opener(&self) -> &O {
        &self.opener
    }

    /// Decode and dispatch one raw record
    pub fn handle_record(
        &self,
        registry: &mut DeviceRegistry,
        record: &RawDeviceRecord,
    ) -> DispatchOutcome {
        if let (Some(devnode), Some(subsystem)) = (&record.devnode, &record.subsystem) {
            self.sink.info(&format!(
                "UDEV raw event: Action={}, Devnode={}, Subsystem={}",
                record.action.as_deref().unwrap_or("NULL"),
                devnode,
                subsystem
            ));
        }

        match DeviceEvent::decode(record) {
            Ok(event) => {
                self.sink.info(&format!(
                    "EVENT (tty subsystem): Action={}, Device={}",
                    event.action(),
                    event.path()
                ));
                self.dispatch(registry, event)
            }
            Err(reason) => {
                debug!("Discarding record {:?}: {}", record, reason);
                DispatchOutcome::Discarded(reason)
            }
        }
    }

    /// Apply one decoded event
    pub fn dispatch(&self, registry: &mut DeviceRegistry, event: DeviceEvent) -> DispatchOutcome {
        match event {
            DeviceEvent::Attached(path) => {
                if registry.state(path.as_str()) == DeviceState::Known {
                    self.sink.info(&format!("Device {} already known.", path));
                    return DispatchOutcome::AlreadyKnown(path);
                }

                let attempt = self.connect(&path);
                if attempt == ConnectionAttempt::Opened {
                    registry.insert(path.clone());
                }
                DispatchOutcome::Attempted(path, attempt)
            }
            DeviceEvent::Detached(path) => {
                self.sink.info(&format!("Serial device removed: {}", path));
                let was_known = registry.remove(path.as_str());
                DispatchOutcome::Removed { path, was_known }
            }
        }
    }

    /// Open, configure and close `path`
    fn connect(&self, path: &DevicePath) -> ConnectionAttempt {
        self.sink
            .info(&format!("Attempting connection to new device: {}", path));

        let mut handle = match self.opener.open(path.as_str()) {
            Ok(handle) => handle,
            Err(e) => {
                self.sink.error(&format!(
                    "Failed to open new device {}: {}",
                    path,
                    e.reason()
                ));
                return ConnectionAttempt::OpenFailed(e.reason().to_string());
            }
        };

        self.sink.info(&format!(
            "Device {} opened. Now attempting configuration.",
            path
        ));

        let configured = self.configurator.configure(&mut handle, self.baud_rate);
        handle.close();

        match configured {
            Ok(()) => {
                self.sink
                    .info(&format!("Successfully connected to new device: {}", path));
                ConnectionAttempt::Opened
            }
            Err(e) => {
                self.sink
                    .error(&format!("Failed to configure new device: {}", path));
                ConnectionAttempt::ConfigureFailed(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use lxps_serial::{LineSetting, MemorySink, MockOpener};

    use super::*;

    fn setup() -> (Dispatcher<MockOpener, MemorySink>, MockOpener, MemorySink) {
        let opener = MockOpener::new();
        let sink = MemorySink::new();
        let dispatcher = Dispatcher::new(opener.clone(), sink.clone(), 9600);
        (dispatcher, opener, sink)
    }

    #[test]
    fn test_attach_success_registers() {
        let (dispatcher, opener, sink) = setup();
        opener.add_device("/dev/ttyACM0");
        let mut registry = DeviceRegistry::new();

        let outcome = dispatcher.dispatch(&mut registry, DeviceEvent::Attached("/dev/ttyACM0".into()));

        assert_eq!(
            outcome,
            DispatchOutcome::Attempted("/dev/ttyACM0".into(), ConnectionAttempt::Opened)
        );
        assert!(registry.contains("/dev/ttyACM0"));
        assert_eq!(opener.setting_attempts("/dev/ttyACM0"), LineSetting::ORDER.to_vec());
        assert_eq!(opener.close_count("/dev/ttyACM0"), 1);
        assert!(sink.contains("Successfully connected to new device: /dev/ttyACM0"));
        assert!(sink.errors().is_empty());
    }

    #[test]
    fn test_open_failure_stays_unknown() {
        let (dispatcher, opener, sink) = setup();
        opener.add_unopenable("/dev/ttyUSB2", "Permission denied");
        let mut registry = DeviceRegistry::new();

        let outcome = dispatcher.dispatch(&mut registry, DeviceEvent::Attached("/dev/ttyUSB2".into()));

        assert_eq!(
            outcome,
            DispatchOutcome::Attempted(
                "/dev/ttyUSB2".into(),
                ConnectionAttempt::OpenFailed("Permission denied".to_string())
            )
        );
        assert!(registry.is_empty());
        assert!(opener.setting_attempts("/dev/ttyUSB2").is_empty());
        assert_eq!(
            sink.errors(),
            vec!["Failed to open new device /dev/ttyUSB2: Permission denied".to_string()]
        );
    }

    #[test]
    fn test_configure_failure_closes_and_stays_unknown() {
        let (dispatcher, opener, sink) = setup();
        opener.add_misconfigured("/dev/ttyACM0", LineSetting::StopBits);
        let mut registry = DeviceRegistry::new();

        let outcome = dispatcher.dispatch(&mut registry, DeviceEvent::Attached("/dev/ttyACM0".into()));

        assert!(matches!(
            outcome,
            DispatchOutcome::Attempted(_, ConnectionAttempt::ConfigureFailed(_))
        ));
        assert!(registry.is_empty());
        assert_eq!(opener.close_count("/dev/ttyACM0"), 1);
        assert!(sink.contains("Failed to configure new device: /dev/ttyACM0"));
    }

    #[test]
    fn test_record_without_devnode_is_silent() {
        let (dispatcher, _opener, sink) = setup();
        let mut registry = DeviceRegistry::new();

        let outcome = dispatcher.handle_record(
            &mut registry,
            &RawDeviceRecord::new(Some("add"), None, Some("tty")),
        );

        assert_eq!(outcome, DispatchOutcome::Discarded(Discard::MissingDevnode));
        assert!(sink.reports().is_empty());
    }

    #[test]
    fn test_foreign_subsystem_traced_but_ignored() {
        let (dispatcher, opener, sink) = setup();
        opener.add_device("/dev/input/event3");
        let mut registry = DeviceRegistry::new();

        let outcome = dispatcher.handle_record(
            &mut registry,
            &RawDeviceRecord::complete("add", "/dev/input/event3", "input"),
        );

        assert!(matches!(outcome, DispatchOutcome::Discarded(Discard::ForeignSubsystem(_))));
        assert!(opener.open_attempts().is_empty());
        assert!(sink.contains("UDEV raw event: Action=add, Devnode=/dev/input/event3, Subsystem=input"));
        assert!(!sink.contains("EVENT (tty subsystem)"));
    }
}
