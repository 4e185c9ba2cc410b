//! Liveness probing
//!
//! A probe opens a device node and closes it straight away. It never
//! touches the line settings: it only answers "can this node be opened
//! right now".

use lxps_serial::{DeviceOpener, LineHandle, StatusSink};
use tracing::trace;

/// Result of probing a device node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeResult {
    /// Opened and closed again
    Opened,
    /// Could not be opened
    OpenFailed(String),
}

impl ProbeResult {
    /// True if the node opened
    pub fn is_opened(&self) -> bool {
        matches!(self, ProbeResult::Opened)
    }
}

/// Open `path` and close it immediately, reporting the outcome
pub fn probe_port<O, S>(opener: &O, path: &str, sink: &S) -> ProbeResult
where
    O: DeviceOpener,
    S: StatusSink,
{
    trace!("Probing {}", path);

    match opener.open(path) {
        Ok(mut handle) => {
            handle.close();
            sink.info(&format!("Probe: successfully opened and closed {}", path));
            ProbeResult::Opened
        }
        Err(e) => {
            sink.error(&format!("Probe: {}", e));
            ProbeResult::OpenFailed(e.reason().to_string())
        }
    }
}
