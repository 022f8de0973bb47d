//! Reentrancy guard for recursive device resolution.
//!
//! Resolving a name can lead back to device enumeration, and a logical device
//! may describe itself in terms of its own name (a virtual disk whose backing
//! file lives on `vhd0`, for instance). The guard records the name currently
//! being resolved so that [`DeviceManager::iterate`] skips it.
//!
//! The guard is a plain value handed to `iterate`; the manager only reads it.
//! Whoever sets a name is responsible for clearing it.
//!
//! [`DeviceManager::iterate`]: crate::device::DeviceManager::iterate

/// Tracks the name of the device currently being opened.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionGuard {
    current: Option<String>,
}

impl ResolutionGuard {
    /// Creates a guard with no name set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a guard tracking `name`.
    pub fn with_current(name: impl Into<String>) -> Self {
        Self {
            current: Some(name.into()),
        }
    }

    /// Replaces the tracked name. `None` clears it.
    pub fn set_current(&mut self, name: Option<&str>) {
        self.current = name.map(str::to_string);
    }

    /// Returns the tracked name, if any.
    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Returns true if `disk_name` is the tracked name, ignoring ASCII case.
    pub fn matches(&self, disk_name: &str) -> bool {
        self.current
            .as_deref()
            .is_some_and(|current| current.eq_ignore_ascii_case(disk_name))
    }

    /// Tracks `name` until the returned scope is dropped, then restores the
    /// previously tracked name.
    pub fn scoped(&mut self, name: &str) -> GuardScope<'_> {
        let previous = self.current.replace(name.to_string());
        GuardScope {
            guard: self,
            previous,
        }
    }
}

/// Restores the previous guard value on drop. See [`ResolutionGuard::scoped`].
#[derive(Debug)]
pub struct GuardScope<'a> {
    guard: &'a mut ResolutionGuard,
    previous: Option<String>,
}

impl GuardScope<'_> {
    /// Read access to the guard while the scope is active.
    pub fn guard(&self) -> &ResolutionGuard {
        &*self.guard
    }
}

impl Drop for GuardScope<'_> {
    fn drop(&mut self) {
        self.guard.current = self.previous.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_clear() {
        let mut guard = ResolutionGuard::new();
        assert_eq!(guard.current(), None);

        guard.set_current(Some("a"));
        assert_eq!(guard.current(), Some("a"));

        guard.set_current(Some("b"));
        assert_eq!(guard.current(), Some("b"));

        guard.set_current(None);
        assert_eq!(guard.current(), None);
        assert!(!guard.matches("b"));
    }

    #[test]
    fn test_matches_ignores_case() {
        let guard = ResolutionGuard::with_current("Vhd0");
        assert!(guard.matches("vhd0"));
        assert!(guard.matches("VHD0"));
        assert!(!guard.matches("vhd1"));
    }

    #[test]
    fn test_scoped_restores_previous() {
        let mut guard = ResolutionGuard::with_current("outer");
        {
            let scope = guard.scoped("inner");
            assert!(scope.guard().matches("inner"));
        }
        assert_eq!(guard.current(), Some("outer"));

        let mut empty = ResolutionGuard::new();
        drop(empty.scoped("x"));
        assert_eq!(empty.current(), None);
    }
}
