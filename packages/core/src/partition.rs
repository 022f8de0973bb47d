//! Transient partition entries collected while scanning one disk.

use std::ops::ControlFlow;

use crate::config::ReplayOrder;
use crate::error::{Error, Result};

/// Builds the composite device name `"<disk>,<partition>"`.
///
/// Fails with [`Error::AllocationFailed`] if the string cannot be reserved.
pub fn composite_name(disk_name: &str, partition_name: &str) -> Result<String> {
    let mut name = String::new();
    name.try_reserve_exact(disk_name.len() + 1 + partition_name.len())
        .map_err(|e| Error::AllocationFailed {
            message: e.to_string(),
        })?;

    name.push_str(disk_name);
    name.push(',');
    name.push_str(partition_name);
    Ok(name)
}

/// A partition discovered during a disk scan, named by its composite name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionEntry {
    composite_name: String,
}

impl PartitionEntry {
    /// Creates an entry for partition `partition_name` of `disk_name`.
    pub fn new(disk_name: &str, partition_name: &str) -> Result<Self> {
        Ok(Self {
            composite_name: composite_name(disk_name, partition_name)?,
        })
    }

    /// The `"<disk>,<partition>"` name.
    pub fn name(&self) -> &str {
        &self.composite_name
    }
}

/// LIFO buffer of the partitions found on one disk.
///
/// Lives for a single disk's scan-and-replay cycle. [`PartitionStack::replay`]
/// consumes it, so no entry outlives its replay.
#[derive(Debug, Default)]
pub struct PartitionStack {
    entries: Vec<PartitionEntry>,
}

impl PartitionStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes an entry on top of the stack.
    pub fn push(&mut self, entry: PartitionEntry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Hands each entry's name to `hook` until it returns `Break`.
    ///
    /// Entries after the stop are still drained and dropped, but the hook is
    /// not called for them. With [`ReplayOrder::Reverse`] the most recently
    /// pushed entry comes first.
    pub fn replay(
        mut self,
        order: ReplayOrder,
        hook: &mut dyn FnMut(&str) -> ControlFlow<()>,
    ) -> ControlFlow<()> {
        let mut flow = ControlFlow::Continue(());
        let mut visit = |entry: PartitionEntry| {
            if flow.is_continue() {
                flow = hook(entry.name());
            }
        };

        match order {
            ReplayOrder::Reverse => {
                while let Some(entry) = self.entries.pop() {
                    visit(entry);
                }
            }
            ReplayOrder::Discovery => self.entries.drain(..).for_each(visit),
        }

        flow
    }
}
