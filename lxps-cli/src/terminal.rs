//! Colored terminal status output

use std::io::Write;

use colored::Colorize;
use lxps_serial::StatusSink;
use tracing::debug;

/// Prints informational reports in green on stdout and errors in red on
/// stderr. Write failures are dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalSink;

impl StatusSink for TerminalSink {
    fn report(&self, message: &str, is_error: bool) {
        debug!(target: "lxps::status", is_error, "{}", message);

        if is_error {
            let _ = writeln!(std::io::stderr(), "{}", message.red());
        } else {
            let _ = writeln!(std::io::stdout(), "{}", message.green());
        }
    }
}
