//! Known-device tracking

use std::collections::HashSet;

use crate::events::DevicePath;

/// Lifecycle state of a device path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    /// Not tracked; the next attach will try to connect
    Unknown,
    /// Connected and configured without a detach since
    Known,
}

/// Set of device paths the monitor considers connected
///
/// Owned by a single monitor; dispatch receives it by `&mut`.
#[derive(Debug, Clone, Default)]
pub struct DeviceRegistry {
    known: HashSet<DevicePath>,
}

impl DeviceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// State of `path`
    pub fn state(&self, path: &str) -> DeviceState {
        if self.known.contains(path) {
            DeviceState::Known
        } else {
            DeviceState::Unknown
        }
    }

    /// Whether `path` is known
    pub fn contains(&self, path: &str) -> bool {
        self.known.contains(path)
    }

    /// Mark `path` known; returns false if it already was
    pub fn insert(&mut self, path: DevicePath) -> bool {
        self.known.insert(path)
    }

    /// Forget `path`; returns whether it was known
    pub fn remove(&mut self, path: &str) -> bool {
        self.known.remove(path)
    }

    /// Forget everything
    pub fn clear(&mut self) {
        self.known.clear();
    }

    /// Number of known paths
    pub fn len(&self) -> usize {
        self.known.len()
    }

    /// True if nothing is known
    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }

    /// Known paths, sorted
    pub fn snapshot(&self) -> Vec<DevicePath> {
        let mut paths: Vec<_> = self.known.iter().cloned().collect();
        paths.sort();
        paths
    }
}
