//! Device handles and the device manager.
//!
//! A [`Device`] is an open handle owning exactly one disk resource. The
//! [`DeviceManager`] resolves names into devices and walks every reachable
//! device: each disk, then the partitions found on it.

use std::borrow::Cow;
use std::fmt;
use std::ops::ControlFlow;

use snafu::{ResultExt, ensure};
use tracing::{debug, warn};

use crate::config::ManagerConfig;
use crate::disk::{BlockSubsystem, Disk, DiskSubsystem};
use crate::env::{EnvStore, Environment};
use crate::error::{DiskResultExt, EnumerationSnafu, NoDeviceSetSnafu, Result};
use crate::guard::ResolutionGuard;
use crate::partition::{PartitionEntry, PartitionStack};

/// Network transport slot of a device. No network devices exist yet, so
/// this type has no values and the slot is always empty.
#[derive(Debug)]
pub enum Net {}

/// An open device.
///
/// Releases its disk when closed or dropped. [`Device::close`] consumes the
/// handle, so a device cannot be closed twice.
pub struct Device<'a> {
    disk: Option<Disk>,
    net: Option<Net>,
    disks: &'a dyn DiskSubsystem,
}

impl<'a> Device<'a> {
    fn new(disk: Disk, disks: &'a dyn DiskSubsystem) -> Self {
        Self {
            disk: Some(disk),
            net: None,
            disks,
        }
    }

    /// The owned disk resource.
    pub fn disk(&self) -> Option<&Disk> {
        self.disk.as_ref()
    }

    /// Name the device was opened by.
    pub fn name(&self) -> Option<&str> {
        self.disk.as_ref().map(|d| d.name.as_str())
    }

    /// Returns true if the device is a disk with partitions.
    pub fn has_partitions(&self) -> bool {
        self.disk.as_ref().is_some_and(Disk::has_partitions)
    }

    /// Returns true if the device is network-backed. Always false for now.
    pub fn is_network(&self) -> bool {
        self.net.is_some()
    }

    /// Releases the disk and the handle.
    ///
    /// The disk is released even when the subsystem reports an error. Such an
    /// error is the subsystem's own release failure, returned wrapped in
    /// [`Error::CloseFailed`] with the [`DiskError`] as its source; closing
    /// adds no failure of its own.
    ///
    /// [`Error::CloseFailed`]: crate::error::Error::CloseFailed
    /// [`DiskError`]: crate::error::DiskError
    pub fn close(mut self) -> Result<()> {
        self.release()
    }

    fn release(&mut self) -> Result<()> {
        match self.disk.take() {
            Some(disk) => {
                let name = disk.name.clone();
                self.disks.close(disk).release_context(name)
            }
            None => Ok(()),
        }
    }
}

impl Drop for Device<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!(error = %e, "failed to release dropped device");
        }
    }
}

impl fmt::Debug for Device<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("disk", &self.disk)
            .field("net", &self.net)
            .finish_non_exhaustive()
    }
}

/// Resolves device names and enumerates devices.
#[derive(Debug)]
pub struct DeviceManager<S, E = EnvStore> {
    subsystem: S,
    env: E,
    config: ManagerConfig,
}

impl<S: BlockSubsystem, E: Environment> DeviceManager<S, E> {
    /// Creates a manager with the default configuration.
    pub fn new(subsystem: S, env: E) -> Self {
        Self::with_config(subsystem, env, ManagerConfig::default())
    }

    pub fn with_config(subsystem: S, env: E, config: ManagerConfig) -> Self {
        Self {
            subsystem,
            env,
            config,
        }
    }

    pub fn subsystem(&self) -> &S {
        &self.subsystem
    }

    pub fn environment(&self) -> &E {
        &self.env
    }

    pub fn environment_mut(&mut self) -> &mut E {
        &mut self.env
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Opens the device called `name`.
    ///
    /// Without a name, the device named by the root variable is opened. If
    /// that variable is empty the call fails with [`Error::NoDeviceSet`].
    /// Nothing is left open when this returns an error.
    ///
    /// [`Error::NoDeviceSet`]: crate::error::Error::NoDeviceSet
    pub fn open(&self, name: Option<&str>) -> Result<Device<'_>> {
        let name = match name {
            Some(name) => Cow::Borrowed(name),
            None => {
                let root = self.env.get(&self.config.root_variable);
                ensure!(!root.is_empty(), NoDeviceSetSnafu);
                Cow::Owned(root)
            }
        };

        let disk = self.subsystem.open(&name).open_context(name.as_ref())?;
        Ok(Device::new(disk, &self.subsystem))
    }

    /// Closes a device. See [`Device::close`].
    pub fn close(&self, device: Device<'_>) -> Result<()> {
        device.close()
    }

    /// Hands every reachable device name to `hook`.
    ///
    /// Disks come in enumerator order. A disk matching `guard` is skipped
    /// without calling the hook or opening it. Otherwise the hook sees the
    /// disk name first; `Break` there ends the whole walk. The disk is then
    /// opened and, if it has partitions, their `"<disk>,<partition>"` names
    /// are collected, the disk is closed, and the names are replayed to the
    /// hook (last discovered first, unless configured otherwise). A `Break`
    /// during replay stops that disk's replay only.
    ///
    /// Disks that fail to open and partitions whose names cannot be built are
    /// skipped. Returns `Ok(true)` if any hook call returned `Break`, and an
    /// error only if the disk enumerator itself fails. An enumerator error
    /// takes priority over stops recorded earlier in the walk.
    pub fn iterate<F>(&self, guard: &ResolutionGuard, mut hook: F) -> Result<bool>
    where
        F: FnMut(&str) -> ControlFlow<()>,
    {
        debug!(guard = ?guard.current(), "iterating devices");

        let mut partition_stop = false;
        let flow = self
            .subsystem
            .iterate_disks(&mut |disk_name| {
                self.iterate_disk(guard, disk_name, &mut hook, &mut partition_stop)
            })
            .context(EnumerationSnafu)?;

        Ok(flow.is_break() || partition_stop)
    }

    fn iterate_disk(
        &self,
        guard: &ResolutionGuard,
        disk_name: &str,
        hook: &mut dyn FnMut(&str) -> ControlFlow<()>,
        partition_stop: &mut bool,
    ) -> ControlFlow<()> {
        // Breaks self-referential resolution loops.
        if guard.matches(disk_name) {
            debug!(disk = disk_name, "skipping device being resolved");
            return ControlFlow::Continue(());
        }

        if hook(disk_name).is_break() {
            return ControlFlow::Break(());
        }

        let device = match self.open(Some(disk_name)) {
            Ok(device) => device,
            Err(e) => {
                debug!(disk = disk_name, error = %e, "skipping disk");
                return ControlFlow::Continue(());
            }
        };

        let partitions = match device.disk() {
            Some(disk) if disk.has_partitions() => self.collect_partitions(disk),
            _ => PartitionStack::new(),
        };

        if let Err(e) = device.close() {
            warn!(disk = disk_name, error = %e, "failed to close disk");
        }

        if partitions
            .replay(self.config.replay_order, hook)
            .is_break()
        {
            *partition_stop = true;
        }

        ControlFlow::Continue(())
    }

    fn collect_partitions(&self, disk: &Disk) -> PartitionStack {
        let mut partitions = PartitionStack::new();

        let result = self.subsystem.iterate_partitions(disk, &mut |disk, partition| {
            let entry = self
                .subsystem
                .format_name(partition)
                .map_err(|e| e.to_string())
                .and_then(|name| PartitionEntry::new(&disk.name, &name).map_err(|e| e.to_string()));

            match entry {
                Ok(entry) => partitions.push(entry),
                Err(e) => warn!(
                    disk = %disk.name,
                    number = partition.number,
                    error = %e,
                    "skipping partition"
                ),
            }
            ControlFlow::Continue(())
        });

        if let Err(e) = result {
            warn!(disk = %disk.name, error = %e, "partition enumeration failed");
        }

        debug!(disk = %disk.name, count = partitions.len(), "collected partitions");
        partitions
    }
}
