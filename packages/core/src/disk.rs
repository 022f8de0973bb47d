//! Disk and partition subsystem interfaces.
//!
//! The device manager never talks to hardware itself. It drives a
//! [`DiskSubsystem`] (open, close, enumerate disks) and a
//! [`PartitionSubsystem`] (enumerate partitions, format their names).
//! [`LsblkDisks`] implements both on top of `lsblk` JSON output.

use std::cell::Cell;
use std::ops::ControlFlow;
use std::process::Command;

use serde::{Deserialize, Serialize};
use snafu::{OptionExt, ResultExt, ensure};
use tracing::debug;

use crate::error::{
    CommandExecutionSnafu, DiskError, ReleaseSnafu, UnknownDiskSnafu, UnknownPartitionSnafu,
};

/// A partition on a disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Partition {
    /// Partition number within its table (1-based).
    pub number: u32,
    /// Table scheme prefix used when naming the partition (e.g. "gpt", "msdos").
    pub scheme: Option<String>,
    /// Volume label, if set.
    pub label: Option<String>,
    /// Filesystem type, if detected.
    pub fstype: Option<String>,
    /// Size in bytes.
    pub size: u64,
}

impl Partition {
    /// Creates a partition with only its number and table scheme set.
    pub fn new(number: u32, scheme: Option<&str>) -> Self {
        Self {
            number,
            scheme: scheme.map(str::to_string),
            label: None,
            fstype: None,
            size: 0,
        }
    }

    /// Sets the volume label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// An opened disk resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Disk {
    /// Name the disk was opened by (e.g. "sda" or "sda,gpt2").
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// Whether the disk carries a partition table with entries.
    pub has_partitions: bool,
    /// The partition this disk is restricted to, if opened by composite name.
    pub partition: Option<Partition>,
}

impl Disk {
    /// Creates a whole-disk resource without partitions.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: 0,
            has_partitions: false,
            partition: None,
        }
    }

    /// Marks whether the disk has partitions.
    pub fn with_partitions(mut self, has_partitions: bool) -> Self {
        self.has_partitions = has_partitions;
        self
    }

    /// Returns true if the disk reports a partition table with entries.
    pub fn has_partitions(&self) -> bool {
        self.has_partitions
    }

    /// Returns true if this resource is a single partition of a disk.
    pub fn is_partition(&self) -> bool {
        self.partition.is_some()
    }
}

/// Visitor invoked with each disk name. `Break` stops the enumeration.
pub type DiskVisitor<'a> = dyn FnMut(&str) -> ControlFlow<()> + 'a;

/// Visitor invoked with each partition of a disk. `Break` stops the enumeration.
pub type PartitionVisitor<'a> = dyn FnMut(&Disk, &Partition) -> ControlFlow<()> + 'a;

/// Opens, closes and enumerates disks.
pub trait DiskSubsystem {
    /// Opens the disk with the given name.
    fn open(&self, name: &str) -> Result<Disk, DiskError>;

    /// Releases a disk previously returned by [`DiskSubsystem::open`].
    ///
    /// The resource is consumed even when an error is returned.
    fn close(&self, disk: Disk) -> Result<(), DiskError>;

    /// Calls `visitor` with each disk name until it returns `Break`.
    ///
    /// Returns `Break` if the visitor stopped the walk.
    fn iterate_disks(&self, visitor: &mut DiskVisitor<'_>) -> Result<ControlFlow<()>, DiskError>;
}

/// Enumerates partitions on an open disk.
pub trait PartitionSubsystem {
    /// Calls `visitor` with each partition of `disk` until it returns `Break`.
    fn iterate_partitions(
        &self,
        disk: &Disk,
        visitor: &mut PartitionVisitor<'_>,
    ) -> Result<ControlFlow<()>, DiskError>;

    /// Formats the name of a single partition (without the disk prefix).
    fn format_name(&self, partition: &Partition) -> Result<String, DiskError>;
}

/// A subsystem providing both disks and partitions.
pub trait BlockSubsystem: DiskSubsystem + PartitionSubsystem {}

impl<T: DiskSubsystem + PartitionSubsystem + ?Sized> BlockSubsystem for T {}

/// Formats a partition name as `<scheme><number>`, or just the number when
/// the table scheme is unknown.
pub fn partition_name(partition: &Partition) -> String {
    match &partition.scheme {
        Some(scheme) => format!("{}{}", scheme, partition.number),
        None => partition.number.to_string(),
    }
}

/// Maps an lsblk PTTYPE to the scheme prefix used in partition names.
fn table_scheme(pttype: &str) -> Option<&'static str> {
    match pttype {
        "gpt" => Some("gpt"),
        "dos" => Some("msdos"),
        _ => None,
    }
}

/// Raw JSON structure from lsblk output.
#[derive(Debug, Deserialize)]
struct LsblkOutput {
    blockdevices: Vec<LsblkDevice>,
}

#[derive(Debug, Deserialize)]
struct LsblkDevice {
    name: String,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    fstype: Option<String>,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default)]
    pttype: Option<String>,
    #[serde(default)]
    partn: Option<u32>,
    #[serde(rename = "type")]
    device_type: Option<String>,
    #[serde(default)]
    children: Option<Vec<LsblkDevice>>,
}

#[derive(Debug, Clone)]
struct DiskRecord {
    name: String,
    size: u64,
    partitions: Vec<Partition>,
}

/// Disk and partition subsystem backed by `lsblk` output.
///
/// The device list is captured once, at construction. Opens are tracked so
/// that callers can check every disk was released.
#[derive(Debug)]
pub struct LsblkDisks {
    disks: Vec<DiskRecord>,
    open: Cell<usize>,
}

impl LsblkDisks {
    /// Runs `lsblk --json --bytes` and captures the disks it reports.
    pub fn scan() -> Result<Self, DiskError> {
        let output = Command::new("lsblk")
            .args([
                "--json",
                "--bytes",
                "--output",
                "NAME,LABEL,FSTYPE,SIZE,PTTYPE,PARTN,TYPE",
            ])
            .output()
            .context(CommandExecutionSnafu { command: "lsblk" })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            return Err(DiskError::CommandExit {
                command: "lsblk".to_string(),
                code: output.status.code().unwrap_or(-1),
                stderr,
            });
        }

        Self::from_json(&String::from_utf8_lossy(&output.stdout))
    }

    /// Builds the subsystem from previously captured lsblk JSON.
    pub fn from_json(json: &str) -> Result<Self, DiskError> {
        let lsblk_output: LsblkOutput =
            serde_json::from_str(json).map_err(|e| DiskError::LsblkParse {
                message: e.to_string(),
            })?;

        let mut disks = Vec::new();
        collect_disks(&lsblk_output.blockdevices, &mut disks);
        debug!(count = disks.len(), "captured disks from lsblk");

        Ok(Self {
            disks,
            open: Cell::new(0),
        })
    }

    /// Returns the names of all captured disks, in lsblk order.
    pub fn disk_names(&self) -> impl Iterator<Item = &str> {
        self.disks.iter().map(|d| d.name.as_str())
    }

    /// Number of disks opened and not yet closed.
    pub fn open_count(&self) -> usize {
        self.open.get()
    }

    fn find(&self, name: &str) -> Option<&DiskRecord> {
        self.disks.iter().find(|d| d.name == name)
    }
}

/// Collects whole disks from lsblk output, with their partitions.
fn collect_disks(lsblk_devices: &[LsblkDevice], disks: &mut Vec<DiskRecord>) {
    for dev in lsblk_devices {
        if dev.device_type.as_deref() != Some("disk") {
            continue;
        }

        let scheme = dev.pttype.as_deref().and_then(table_scheme);
        let partitions = dev
            .children
            .iter()
            .flatten()
            .filter(|child| child.device_type.as_deref() == Some("part"))
            .enumerate()
            .map(|(index, child)| Partition {
                // Older lsblk releases lack PARTN; fall back to table order.
                number: child.partn.unwrap_or(index as u32 + 1),
                scheme: scheme.map(str::to_string),
                label: child.label.clone(),
                fstype: child.fstype.clone(),
                size: child.size.unwrap_or(0),
            })
            .collect();

        disks.push(DiskRecord {
            name: dev.name.clone(),
            size: dev.size.unwrap_or(0),
            partitions,
        });
    }
}

impl DiskSubsystem for LsblkDisks {
    fn open(&self, name: &str) -> Result<Disk, DiskError> {
        let (disk_name, partition_spec) = match name.split_once(',') {
            Some((disk, partition)) => (disk, Some(partition)),
            None => (name, None),
        };

        let record = self
            .find(disk_name)
            .context(UnknownDiskSnafu { name: disk_name })?;

        let disk = match partition_spec {
            None => Disk {
                name: record.name.clone(),
                size: record.size,
                has_partitions: !record.partitions.is_empty(),
                partition: None,
            },
            Some(spec) => {
                let partition = record
                    .partitions
                    .iter()
                    .find(|p| partition_name(p) == spec || p.number.to_string() == spec)
                    .context(UnknownPartitionSnafu {
                        disk: disk_name,
                        partition: spec,
                    })?;
                Disk {
                    name: name.to_string(),
                    size: partition.size,
                    has_partitions: false,
                    partition: Some(partition.clone()),
                }
            }
        };

        self.open.set(self.open.get() + 1);
        debug!(disk = %disk.name, "opened disk");
        Ok(disk)
    }

    fn close(&self, disk: Disk) -> Result<(), DiskError> {
        let open = self.open.get();
        ensure!(
            open > 0,
            ReleaseSnafu {
                name: &disk.name,
                message: "disk is not open",
            }
        );
        self.open.set(open - 1);
        debug!(disk = %disk.name, "closed disk");
        Ok(())
    }

    fn iterate_disks(&self, visitor: &mut DiskVisitor<'_>) -> Result<ControlFlow<()>, DiskError> {
        for record in &self.disks {
            if visitor(&record.name).is_break() {
                return Ok(ControlFlow::Break(()));
            }
        }
        Ok(ControlFlow::Continue(()))
    }
}

impl PartitionSubsystem for LsblkDisks {
    fn iterate_partitions(
        &self,
        disk: &Disk,
        visitor: &mut PartitionVisitor<'_>,
    ) -> Result<ControlFlow<()>, DiskError> {
        // A partition device has no nested table.
        if disk.is_partition() {
            return Ok(ControlFlow::Continue(()));
        }

        let record = self
            .find(&disk.name)
            .context(UnknownDiskSnafu { name: &disk.name })?;

        for partition in &record.partitions {
            if visitor(disk, partition).is_break() {
                return Ok(ControlFlow::Break(()));
            }
        }
        Ok(ControlFlow::Continue(()))
    }

    fn format_name(&self, partition: &Partition) -> Result<String, DiskError> {
        Ok(partition_name(partition))
    }
}
