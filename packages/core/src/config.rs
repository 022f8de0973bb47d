//! Device manager configuration.

use std::path::Path;

use serde::Deserialize;
use snafu::ResultExt;

use crate::error::{ConfigParseSnafu, ConfigReadSnafu, Result};

/// Environment variable naming the default device.
pub const DEFAULT_ROOT_VARIABLE: &str = "root";

/// Order in which the partitions of one disk are handed to the hook.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayOrder {
    /// Last discovered partition first.
    #[default]
    Reverse,
    /// Partition table order.
    Discovery,
}

/// Configuration for a [`DeviceManager`](crate::device::DeviceManager).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Variable consulted when `open` is called without a name.
    pub root_variable: String,
    /// Partition replay order during iteration.
    pub replay_order: ReplayOrder,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            root_variable: DEFAULT_ROOT_VARIABLE.to_string(),
            replay_order: ReplayOrder::default(),
        }
    }
}

impl ManagerConfig {
    /// Creates a new config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a config from a JSON file. Missing fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).context(ConfigReadSnafu { path })?;
        serde_json::from_str(&content).context(ConfigParseSnafu { path })
    }

    /// Sets the variable naming the default device.
    pub fn with_root_variable(mut self, name: impl Into<String>) -> Self {
        self.root_variable = name.into();
        self
    }

    /// Sets the partition replay order.
    pub fn with_replay_order(mut self, order: ReplayOrder) -> Self {
        self.replay_order = order;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = ManagerConfig::new();
        assert_eq!(config.root_variable, "root");
        assert_eq!(config.replay_order, ReplayOrder::Reverse);
    }

    #[test]
    fn test_load_partial() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{ "replay_order": "discovery" }}"#).unwrap();

        let config = ManagerConfig::load(file.path()).unwrap();
        assert_eq!(config.root_variable, "root");
        assert_eq!(config.replay_order, ReplayOrder::Discovery);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ManagerConfig::load(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, Error::ConfigRead { .. }));
    }

    #[test]
    fn test_load_invalid() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{ "replay_order": "sideways" }}"#).unwrap();

        let err = ManagerConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, Error::ConfigParse { .. }));
    }

    #[test]
    fn test_builder() {
        let config = ManagerConfig::new()
            .with_root_variable("boot_device")
            .with_replay_order(ReplayOrder::Discovery);
        assert_eq!(config.root_variable, "boot_device");
        assert_eq!(config.replay_order, ReplayOrder::Discovery);
    }
}
