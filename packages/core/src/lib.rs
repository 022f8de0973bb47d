//! bootdev-core: Device resolution and enumeration for boot environments.
//!
//! This library turns a textual device name into an open device handle and
//! walks every reachable device (disks, then the partitions on each disk)
//! for a caller-supplied hook.
//!
//! # Modules
//!
//! - [`device`]: Device handles and the device manager (open, close, iterate)
//! - [`disk`]: Disk and partition subsystem traits, plus an lsblk backend
//! - [`partition`]: Composite partition names and the replay buffer
//! - [`guard`]: Reentrancy guard for recursive resolution
//! - [`env`]: Environment variable store
//! - [`config`]: Manager configuration
//! - [`error`]: Error types
//!
//! # Example
//!
//! ```no_run
//! use std::ops::ControlFlow;
//! use bootdev_core::{DeviceManager, EnvStore, LsblkDisks, ResolutionGuard};
//!
//! let disks = LsblkDisks::scan().unwrap();
//! let manager = DeviceManager::new(disks, EnvStore::new().with_var("root", "sda,gpt2"));
//!
//! // Print every disk and partition
//! manager
//!     .iterate(&ResolutionGuard::new(), |name| {
//!         println!("{name}");
//!         ControlFlow::Continue(())
//!     })
//!     .unwrap();
//!
//! // Open the root device
//! let root = manager.open(None).unwrap();
//! println!("root has partitions: {}", root.has_partitions());
//! root.close().unwrap();
//! ```

pub mod config;
pub mod device;
pub mod disk;
pub mod env;
pub mod error;
pub mod guard;
pub mod partition;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use config::{ManagerConfig, ReplayOrder};
pub use device::{Device, DeviceManager};
pub use disk::{BlockSubsystem, Disk, DiskSubsystem, LsblkDisks, Partition, PartitionSubsystem};
pub use env::{EnvStore, Environment};
pub use error::{DiskError, Error, Result};
pub use guard::ResolutionGuard;
