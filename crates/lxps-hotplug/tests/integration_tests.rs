//! Integration tests for the hotplug monitor
//!
//! These tests drive a real `HotplugMonitor` event loop over a datagram
//! socket standing in for the kernel notification stream:
//! - Attach, configure and detach of serial devices
//! - Duplicate and unknown events
//! - Subsystem filtering
//! - Shutdown and teardown
//! - Startup scan interaction with the registry

use std::time::Duration;

use lxps_detect::{PortScanner, ScanConfig};
use lxps_hotplug::{DevicePath, HotplugMonitor, LoopExit, MonitorConfig};
use lxps_serial::{LineSetting, MemorySink, MockOpener};

// ============================================================================
// Helper Functions
// ============================================================================

mod helpers {
    use std::io::{self, ErrorKind};
    use std::os::fd::{AsRawFd, RawFd};
    use std::os::unix::net::UnixDatagram;

    use lxps_hotplug::{NotificationSource, RawDeviceRecord};

    use super::*;

    /// Notification source reading "action devnode subsystem" datagrams;
    /// a "-" field is absent
    pub struct DatagramSource {
        socket: UnixDatagram,
        pub fail: bool,
    }

    impl AsRawFd for DatagramSource {
        fn as_raw_fd(&self) -> RawFd {
            self.socket.as_raw_fd()
        }
    }

    impl NotificationSource for DatagramSource {
        fn receive(&mut self) -> io::Result<Option<RawDeviceRecord>> {
            let mut buf = [0u8; 512];
            let n = match self.socket.recv(&mut buf) {
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(None),
                Err(e) => return Err(e),
            };
            if self.fail {
                return Err(io::Error::new(ErrorKind::Other, "netlink buffer overrun"));
            }

            let text = String::from_utf8_lossy(&buf[..n]);
            let fields: Vec<Option<&str>> = text
                .split_whitespace()
                .map(|f| if f == "-" { None } else { Some(f) })
                .collect();
            let field = |i: usize| fields.get(i).copied().flatten();
            Ok(Some(RawDeviceRecord::new(field(0), field(1), field(2))))
        }
    }

    /// Feeds records into a [`DatagramSource`]
    pub struct Feeder {
        socket: UnixDatagram,
    }

    impl Feeder {
        pub fn send(&self, record: &str) {
            self.socket.send(record.as_bytes()).unwrap();
        }
    }

    pub fn source_pair() -> (DatagramSource, Feeder) {
        let (rx, tx) = UnixDatagram::pair().unwrap();
        rx.set_nonblocking(true).unwrap();
        (
            DatagramSource {
                socket: rx,
                fail: false,
            },
            Feeder { socket: tx },
        )
    }

    pub type TestMonitor = HotplugMonitor<DatagramSource, MockOpener, MemorySink>;

    pub fn monitor() -> (TestMonitor, Feeder, MockOpener, MemorySink) {
        let (source, feeder) = source_pair();
        let opener = MockOpener::new();
        let sink = MemorySink::new();
        let monitor = HotplugMonitor::with_source(
            source,
            opener.clone(),
            sink.clone(),
            MonitorConfig::default(),
        )
        .unwrap();
        (monitor, feeder, opener, sink)
    }

    /// Run the event loop long enough to drain everything already sent.
    /// The loop must still be running when time is up.
    pub async fn pump(monitor: &mut TestMonitor) {
        let result = tokio::time::timeout(Duration::from_millis(150), monitor.run()).await;
        assert!(result.is_err(), "event loop exited early: {:?}", result);
    }
}

use helpers::*;

// ============================================================================
// Attach / Detach
// ============================================================================

mod lifecycle_tests {
    use super::*;

    #[tokio::test]
    async fn test_attach_configures_and_registers() {
        let (mut monitor, feeder, opener, sink) = monitor();
        opener.add_device("/dev/ttyACM0");

        feeder.send("add /dev/ttyACM0 tty");
        pump(&mut monitor).await;

        assert!(monitor.is_known("/dev/ttyACM0"));
        assert_eq!(opener.setting_attempts("/dev/ttyACM0"), LineSetting::ORDER.to_vec());
        assert_eq!(opener.close_count("/dev/ttyACM0"), 1);
        assert!(sink.contains("Successfully connected to new device: /dev/ttyACM0"));
        assert!(sink.errors().is_empty());
    }

    #[tokio::test]
    async fn test_baud_failure_leaves_device_unknown() {
        let (mut monitor, feeder, opener, sink) = monitor();
        opener.add_misconfigured("/dev/ttyACM0", LineSetting::BaudRate);

        feeder.send("add /dev/ttyACM0 tty");
        pump(&mut monitor).await;

        assert!(!monitor.is_known("/dev/ttyACM0"));
        assert_eq!(opener.setting_attempts("/dev/ttyACM0"), vec![LineSetting::BaudRate]);
        assert_eq!(opener.close_count("/dev/ttyACM0"), 1);
        assert!(!sink.errors().is_empty());
    }

    #[tokio::test]
    async fn test_remove_of_unseen_path() {
        let (mut monitor, feeder, _opener, sink) = monitor();

        feeder.send("remove /dev/ttyACM0 tty");
        pump(&mut monitor).await;

        assert!(monitor.known_devices().is_empty());
        assert!(sink.contains("Serial device removed: /dev/ttyACM0"));
        assert!(sink.errors().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_attach_is_noop() {
        let (mut monitor, feeder, opener, sink) = monitor();
        opener.add_device("/dev/ttyUSB0");

        feeder.send("add /dev/ttyUSB0 tty");
        feeder.send("add /dev/ttyUSB0 tty");
        pump(&mut monitor).await;

        assert!(monitor.is_known("/dev/ttyUSB0"));
        assert_eq!(opener.open_count("/dev/ttyUSB0"), 1);
        assert_eq!(opener.setting_attempts("/dev/ttyUSB0").len(), 5);
        assert!(sink.contains("Device /dev/ttyUSB0 already known."));
    }

    #[tokio::test]
    async fn test_detach_then_reattach_reconnects() {
        let (mut monitor, feeder, opener, _sink) = monitor();
        opener.add_device("/dev/ttyUSB1");

        feeder.send("add /dev/ttyUSB1 tty");
        feeder.send("remove /dev/ttyUSB1 tty");
        pump(&mut monitor).await;
        assert!(!monitor.is_known("/dev/ttyUSB1"));

        feeder.send("add /dev/ttyUSB1 tty");
        pump(&mut monitor).await;
        assert!(monitor.is_known("/dev/ttyUSB1"));
        assert_eq!(opener.open_count("/dev/ttyUSB1"), 2);
    }

    #[tokio::test]
    async fn test_events_applied_in_order() {
        let (mut monitor, feeder, opener, _sink) = monitor();
        opener.add_device("/dev/ttyUSB0");
        opener.add_device("/dev/ttyUSB1");

        feeder.send("add /dev/ttyUSB0 tty");
        feeder.send("add /dev/ttyUSB1 tty");
        feeder.send("remove /dev/ttyUSB0 tty");
        pump(&mut monitor).await;

        assert_eq!(monitor.known_devices(), vec![DevicePath::from("/dev/ttyUSB1")]);
        assert_eq!(opener.open_attempts(), vec!["/dev/ttyUSB0", "/dev/ttyUSB1"]);
    }

    #[tokio::test]
    async fn test_unopenable_device_reported() {
        let (mut monitor, feeder, opener, sink) = monitor();
        opener.add_unopenable("/dev/ttyS3", "Permission denied");

        feeder.send("add /dev/ttyS3 tty");
        pump(&mut monitor).await;

        assert!(!monitor.is_known("/dev/ttyS3"));
        assert!(sink
            .errors()
            .iter()
            .any(|e| e.starts_with("Failed to open new device /dev/ttyS3")));
    }
}

// ============================================================================
// Filtering
// ============================================================================

mod filter_tests {
    use super::*;

    #[tokio::test]
    async fn test_foreign_subsystem_ignored() {
        let (mut monitor, feeder, opener, _sink) = monitor();
        opener.add_device("/dev/ttyUSB0");

        feeder.send("add /dev/ttyUSB0 usb");
        feeder.send("add /dev/sda block");
        pump(&mut monitor).await;

        assert!(monitor.known_devices().is_empty());
        assert!(opener.open_attempts().is_empty());
    }

    #[tokio::test]
    async fn test_incomplete_records_ignored() {
        let (mut monitor, feeder, opener, _sink) = monitor();
        opener.add_device("/dev/ttyUSB0");

        feeder.send("add - tty");
        feeder.send("add /dev/ttyUSB0 -");
        feeder.send("change /dev/ttyUSB0 tty");
        feeder.send("- /dev/ttyUSB0 tty");
        pump(&mut monitor).await;

        assert!(monitor.known_devices().is_empty());
        assert!(opener.open_attempts().is_empty());
    }

    #[tokio::test]
    async fn test_raw_event_trace() {
        let (mut monitor, feeder, _opener, sink) = monitor();

        feeder.send("bind /dev/input/event2 input");
        pump(&mut monitor).await;

        assert!(sink.contains("UDEV raw event: Action=bind, Devnode=/dev/input/event2, Subsystem=input"));
    }
}

// ============================================================================
// Shutdown and teardown
// ============================================================================

mod shutdown_tests {
    use super::*;

    #[tokio::test]
    async fn test_stop_handle_cancels_loop() {
        let (mut monitor, _feeder, _opener, _sink) = monitor();
        let stop = monitor.stop_handle();

        assert!(stop.try_shutdown());
        let exit = tokio::time::timeout(Duration::from_secs(1), monitor.run())
            .await
            .unwrap();

        assert_eq!(exit, LoopExit::Cancelled);
    }

    #[tokio::test]
    async fn test_source_failure_ends_loop() {
        let (mut source, feeder) = source_pair();
        source.fail = true;
        let sink = MemorySink::new();
        let mut monitor =
            HotplugMonitor::with_source(source, MockOpener::new(), sink.clone(), MonitorConfig::default())
                .unwrap();

        feeder.send("add /dev/ttyUSB0 tty");
        let exit = tokio::time::timeout(Duration::from_secs(1), monitor.run())
            .await
            .unwrap();

        assert!(matches!(exit, LoopExit::Failed(_)));
        assert!(sink.contains("Error reading udev events"));
    }

    #[tokio::test]
    async fn test_teardown_is_idempotent() {
        let (mut monitor, feeder, opener, sink) = monitor();
        opener.add_device("/dev/ttyACM0");
        feeder.send("add /dev/ttyACM0 tty");
        pump(&mut monitor).await;
        assert!(monitor.is_known("/dev/ttyACM0"));

        monitor.teardown();
        monitor.teardown();

        assert!(!monitor.is_running());
        assert!(monitor.known_devices().is_empty());
        assert_eq!(
            sink.messages().iter().filter(|m| *m == "Udev monitor stopped.").count(),
            1
        );
        assert_eq!(monitor.run().await, LoopExit::Cancelled);
    }

    #[tokio::test]
    async fn test_stop_handle_after_teardown() {
        let (mut monitor, _feeder, _opener, _sink) = monitor();
        let stop = monitor.stop_handle();

        monitor.teardown();

        assert!(!stop.shutdown().await);
    }
}

// ============================================================================
// Startup scan
// ============================================================================

mod scan_tests {
    use super::*;

    // Current behaviour: devices found by the startup scan are probed but
    // never registered, so they stay unknown until the kernel reports them.
    #[tokio::test]
    async fn test_scanned_devices_are_not_registered() {
        let dir = tempfile::tempdir().unwrap();
        let node = dir.path().join("ttyUSB0");
        std::fs::write(&node, b"").unwrap();
        let node = node.to_string_lossy().into_owned();

        let (monitor, _feeder, opener, sink) = monitor();
        opener.add_device(&node);

        let scanner = PortScanner::with_config(ScanConfig {
            prefixes: vec![dir.path().join("ttyUSB").to_string_lossy().into_owned()],
            max_index: 32,
        });
        let report = monitor.scan_initial_ports(&scanner);

        assert_eq!(report.opened().collect::<Vec<_>>(), vec![node.as_str()]);
        assert!(sink.contains("(successfully opened)"));
        assert!(!monitor.is_known(&node));
        assert!(opener.setting_attempts(&node).is_empty());
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

mod proptest_tests {
    use lxps_hotplug::{DeviceEvent, DeviceRegistry, Dispatcher, RawDeviceRecord};
    use proptest::prelude::*;

    use super::*;

    fn record_strategy() -> impl Strategy<Value = (String, u8, String)> {
        (
            prop_oneof![Just("add"), Just("remove"), Just("change")].prop_map(String::from),
            0u8..4,
            prop_oneof![Just("tty"), Just("usb"), Just("block")].prop_map(String::from),
        )
    }

    proptest! {
        #[test]
        fn non_tty_records_never_change_registry(records in prop::collection::vec(record_strategy(), 0..40)) {
            let opener = MockOpener::new();
            for i in 0..4 {
                opener.add_device(&format!("/dev/ttyUSB{}", i));
            }
            let dispatcher = Dispatcher::new(opener, MemorySink::new(), 9600);
            let mut registry = DeviceRegistry::new();

            for (action, idx, subsystem) in records {
                let path = format!("/dev/ttyUSB{}", idx);
                let before = registry.snapshot();
                let record = RawDeviceRecord::complete(&action, &path, &subsystem);
                dispatcher.handle_record(&mut registry, &record);

                if subsystem != "tty" {
                    prop_assert_eq!(registry.snapshot(), before);
                }
            }
        }

        #[test]
        fn detach_always_forgets(attach_first in any::<bool>(), fail_at in prop::option::of(0usize..5)) {
            let opener = MockOpener::new();
            match fail_at {
                Some(k) => { opener.add_misconfigured("/dev/ttyACM0", LineSetting::ORDER[k]); }
                None => { opener.add_device("/dev/ttyACM0"); }
            }
            let dispatcher = Dispatcher::new(opener, MemorySink::new(), 9600);
            let mut registry = DeviceRegistry::new();

            if attach_first {
                dispatcher.dispatch(&mut registry, DeviceEvent::Attached("/dev/ttyACM0".into()));
                prop_assert_eq!(registry.contains("/dev/ttyACM0"), fail_at.is_none());
            }
            dispatcher.dispatch(&mut registry, DeviceEvent::Detached("/dev/ttyACM0".into()));

            prop_assert!(!registry.contains("/dev/ttyACM0"));
        }

        #[test]
        fn known_attach_makes_no_attempt(repeats in 1usize..5) {
            let opener = MockOpener::new();
            opener.add_device("/dev/ttyUSB0");
            let dispatcher = Dispatcher::new(opener.clone(), MemorySink::new(), 9600);
            let mut registry = DeviceRegistry::new();

            for _ in 0..=repeats {
                dispatcher.dispatch(&mut registry, DeviceEvent::Attached("/dev/ttyUSB0".into()));
            }

            prop_assert_eq!(opener.open_count("/dev/ttyUSB0"), 1);
            prop_assert_eq!(opener.setting_attempts("/dev/ttyUSB0").len(), LineSetting::ORDER.len());
        }
    }
}
