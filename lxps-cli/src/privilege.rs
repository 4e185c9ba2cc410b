//! Effective-user check

use lxps_serial::StatusSink;

/// True when running as root
pub fn is_elevated() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail
    unsafe { libc::geteuid() == 0 }
}

/// Warn that device access may fail without root
pub fn warn_if_unprivileged<S: StatusSink>(elevated: bool, sink: &S) {
    if elevated {
        return;
    }

    sink.error("Warning: Application not running with root privileges. Device access may be limited.");
    sink.error("Consider running with 'sudo lxps'");
}
