//! Status reporting
//!
//! Every component reports human-readable progress and failures through a
//! [`StatusSink`]. Sinks are fire-and-forget: they return nothing and must
//! swallow their own failures so a broken display never stops monitoring.

use std::sync::{Arc, Mutex};

use tracing::{error, info};

/// Receiver of status and error messages
pub trait StatusSink {
    /// Report a message; `is_error` selects error styling
    fn report(&self, message: &str, is_error: bool);

    /// Report an informational message
    fn info(&self, message: &str) {
        self.report(message, false);
    }

    /// Report an error message
    fn error(&self, message: &str) {
        self.report(message, true);
    }
}

impl<S: StatusSink + ?Sized> StatusSink for &S {
    fn report(&self, message: &str, is_error: bool) {
        (**self).report(message, is_error);
    }
}

impl<S: StatusSink + ?Sized> StatusSink for Arc<S> {
    fn report(&self, message: &str, is_error: bool) {
        (**self).report(message, is_error);
    }
}

/// Sink that forwards every report to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl StatusSink for TracingSink {
    fn report(&self, message: &str, is_error: bool) {
        if is_error {
            error!(target: "lxps_serial::status", "{}", message);
        } else {
            info!(target: "lxps_serial::status", "{}", message);
        }
    }
}

/// A single recorded status report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    /// Message text
    pub message: String,
    /// Whether this was reported as an error
    pub is_error: bool,
}

/// Sink that keeps every report in memory
///
/// Clones share the same buffer, so one clone can be handed to a component
/// while another is inspected afterwards.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    reports: Arc<Mutex<Vec<StatusReport>>>,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all reports so far
    pub fn reports(&self) -> Vec<StatusReport> {
        self.reports
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// Error reports only
    pub fn errors(&self) -> Vec<String> {
        self.reports()
            .into_iter()
            .filter(|r| r.is_error)
            .map(|r| r.message)
            .collect()
    }

    /// Informational reports only
    pub fn messages(&self) -> Vec<String> {
        self.reports()
            .into_iter()
            .filter(|r| !r.is_error)
            .map(|r| r.message)
            .collect()
    }

    /// True if any report contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.reports().iter().any(|r| r.message.contains(needle))
    }

    /// Drop all recorded reports
    pub fn clear(&self) {
        if let Ok(mut reports) = self.reports.lock() {
            reports.clear();
        }
    }
}

impl StatusSink for MemorySink {
    fn report(&self, message: &str, is_error: bool) {
        // A poisoned buffer is ignored rather than propagated into the caller
        if let Ok(mut reports) = self.reports.lock() {
            reports.push(StatusReport {
                message: message.to_string(),
                is_error,
            });
        }
    }
}
