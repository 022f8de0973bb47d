//! Unified error types for the bootdev-core library.
//!
//! Uses SNAFU for context-rich error handling. Subsystem failures are kept in
//! their own [`DiskError`] type so the device layer can carry them as the
//! source of its own errors.

use snafu::{ResultExt, Snafu};
use std::path::PathBuf;

/// Result type alias using the library's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors reported by a disk or partition subsystem.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum DiskError {
    /// No disk with this name is known to the subsystem.
    #[snafu(display("no such disk '{name}'"))]
    UnknownDisk { name: String },

    /// The disk exists but has no matching partition.
    #[snafu(display("no partition '{partition}' on disk '{disk}'"))]
    UnknownPartition { disk: String, partition: String },

    /// Failed to execute a system command.
    #[snafu(display("failed to execute command '{command}'"))]
    CommandExecution {
        command: String,
        source: std::io::Error,
    },

    /// Command executed but returned non-zero exit code.
    #[snafu(display("command '{command}' exited with code {code}: {stderr}"))]
    CommandExit {
        command: String,
        code: i32,
        stderr: String,
    },

    /// Failed to parse lsblk JSON output.
    #[snafu(display("failed to parse lsblk output: {message}"))]
    LsblkParse { message: String },

    /// A partition name could not be produced.
    #[snafu(display("failed to format partition name: {message}"))]
    PartitionName { message: String },

    /// Releasing a disk failed.
    #[snafu(display("failed to release disk '{name}': {message}"))]
    Release { name: String, message: String },
}

/// Error type for device manager operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// No name was given and the root variable is empty.
    #[snafu(display("no device is set"))]
    NoDeviceSet,

    /// The underlying disk could not be opened.
    #[snafu(display("failed to open device '{name}'"))]
    DeviceOpenFailed { name: String, source: DiskError },

    /// Memory for a partition entry could not be reserved.
    #[snafu(display("allocation failed: {message}"))]
    AllocationFailed { message: String },

    /// The disk enumerator itself failed.
    #[snafu(display("disk enumeration failed"))]
    Enumeration { source: DiskError },

    /// The disk was released but the subsystem reported a failure.
    #[snafu(display("failed to close device '{name}'"))]
    CloseFailed { name: String, source: DiskError },

    /// Config file cannot be read.
    #[snafu(display("failed to read config at {}", path.display()))]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Config file is not valid JSON for the expected shape.
    #[snafu(display("failed to parse config at {}", path.display()))]
    ConfigParse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Extension trait for adding device context to subsystem results.
pub trait DiskResultExt<T> {
    /// Add context for a failed disk open.
    fn open_context(self, name: impl Into<String>) -> Result<T>;

    /// Add context for a failed disk release.
    fn release_context(self, name: impl Into<String>) -> Result<T>;
}

impl<T> DiskResultExt<T> for std::result::Result<T, DiskError> {
    fn open_context(self, name: impl Into<String>) -> Result<T> {
        self.context(DeviceOpenFailedSnafu { name: name.into() })
    }

    fn release_context(self, name: impl Into<String>) -> Result<T> {
        self.context(CloseFailedSnafu { name: name.into() })
    }
}
