//! In-memory disk subsystem for unit tests.
//!
//! Records every open, visit and release so tests can assert on what the
//! device manager touched and that nothing was left open.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::ops::ControlFlow;

use crate::disk::{Disk, DiskSubsystem, DiskVisitor, Partition, PartitionSubsystem, PartitionVisitor};
use crate::error::DiskError;

#[derive(Debug, Default)]
pub(crate) struct FakeDisks {
    disks: Vec<(String, Vec<String>)>,
    failing_opens: HashSet<String>,
    failing_closes: HashSet<String>,
    failing_names: HashSet<String>,
    failing_enumeration: bool,
    failing_enumeration_after_walk: bool,
    failing_partitions: HashSet<String>,
    opened: RefCell<Vec<String>>,
    visited: RefCell<Vec<String>>,
    outstanding: Cell<usize>,
}

impl FakeDisks {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Adds a disk with the given partition names, in discovery order.
    pub(crate) fn with_disk(mut self, name: &str, partitions: &[&str]) -> Self {
        self.disks.push((
            name.to_string(),
            partitions.iter().map(|p| p.to_string()).collect(),
        ));
        self
    }

    pub(crate) fn failing_open(mut self, name: &str) -> Self {
        self.failing_opens.insert(name.to_string());
        self
    }

    pub(crate) fn failing_close(mut self, name: &str) -> Self {
        self.failing_closes.insert(name.to_string());
        self
    }

    /// Makes `format_name` fail for the partition with this name.
    pub(crate) fn failing_name(mut self, partition: &str) -> Self {
        self.failing_names.insert(partition.to_string());
        self
    }

    /// Makes partition enumeration on `disk` fail after every partition
    /// has been visited.
    pub(crate) fn failing_partitions(mut self, disk: &str) -> Self {
        self.failing_partitions.insert(disk.to_string());
        self
    }

    pub(crate) fn failing_enumeration(mut self) -> Self {
        self.failing_enumeration = true;
        self
    }

    /// Makes disk enumeration fail after every disk has been visited.
    pub(crate) fn failing_enumeration_after_walk(mut self) -> Self {
        self.failing_enumeration_after_walk = true;
        self
    }

    /// Names passed to `open`, including failed attempts.
    pub(crate) fn opened(&self) -> Vec<String> {
        self.opened.borrow().clone()
    }

    /// Names handed to the disk visitor.
    pub(crate) fn visited(&self) -> Vec<String> {
        self.visited.borrow().clone()
    }

    /// Disks opened and not yet closed.
    pub(crate) fn outstanding(&self) -> usize {
        self.outstanding.get()
    }
}

impl DiskSubsystem for FakeDisks {
    fn open(&self, name: &str) -> Result<Disk, DiskError> {
        self.opened.borrow_mut().push(name.to_string());

        if self.failing_opens.contains(name) {
            return Err(DiskError::UnknownDisk {
                name: name.to_string(),
            });
        }

        let (_, partitions) = self
            .disks
            .iter()
            .find(|(disk, _)| disk == name)
            .ok_or_else(|| DiskError::UnknownDisk {
                name: name.to_string(),
            })?;

        self.outstanding.set(self.outstanding.get() + 1);
        Ok(Disk::new(name).with_partitions(!partitions.is_empty()))
    }

    fn close(&self, disk: Disk) -> Result<(), DiskError> {
        self.outstanding.set(self.outstanding.get() - 1);

        if self.failing_closes.contains(&disk.name) {
            return Err(DiskError::Release {
                name: disk.name,
                message: "injected failure".to_string(),
            });
        }
        Ok(())
    }

    fn iterate_disks(&self, visitor: &mut DiskVisitor<'_>) -> Result<ControlFlow<()>, DiskError> {
        if self.failing_enumeration {
            return Err(DiskError::CommandExit {
                command: "enumerate".to_string(),
                code: 1,
                stderr: "injected failure".to_string(),
            });
        }

        for (name, _) in &self.disks {
            self.visited.borrow_mut().push(name.clone());
            if visitor(name).is_break() {
                return Ok(ControlFlow::Break(()));
            }
        }
        if self.failing_enumeration_after_walk {
            return Err(DiskError::CommandExit {
                command: "enumerate".to_string(),
                code: 1,
                stderr: "injected failure".to_string(),
            });
        }
        Ok(ControlFlow::Continue(()))
    }
}

impl PartitionSubsystem for FakeDisks {
    fn iterate_partitions(
        &self,
        disk: &Disk,
        visitor: &mut PartitionVisitor<'_>,
    ) -> Result<ControlFlow<()>, DiskError> {
        let (_, partitions) = self
            .disks
            .iter()
            .find(|(name, _)| *name == disk.name)
            .ok_or_else(|| DiskError::UnknownDisk {
                name: disk.name.clone(),
            })?;

        for (index, label) in partitions.iter().enumerate() {
            let partition = Partition::new(index as u32 + 1, None).with_label(label.as_str());
            if visitor(disk, &partition).is_break() {
                return Ok(ControlFlow::Break(()));
            }
        }
        if self.failing_partitions.contains(&disk.name) {
            return Err(DiskError::CommandExit {
                command: "partitions".to_string(),
                code: 1,
                stderr: "injected failure".to_string(),
            });
        }
        Ok(ControlFlow::Continue(()))
    }

    fn format_name(&self, partition: &Partition) -> Result<String, DiskError> {
        match partition.label.as_deref() {
            Some(label) if !self.failing_names.contains(label) => Ok(label.to_string()),
            _ => Err(DiskError::PartitionName {
                message: format!("partition {} has no usable name", partition.number),
            }),
        }
    }
}
