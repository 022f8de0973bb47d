//! Subcommand implementations.

use std::error::Error;
use std::fs;
use std::ops::ControlFlow;
use std::path::PathBuf;

use bootdev_core::{
    DeviceManager, EnvStore, LsblkDisks, ManagerConfig, Partition, ResolutionGuard,
};
use serde::Serialize;
use tracing::info;

pub type CommandResult = Result<(), Box<dyn Error>>;

/// Settings shared by all subcommands.
pub struct Options {
    pub lsblk_json: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub env: Vec<(String, String)>,
}

impl Options {
    fn manager(&self) -> Result<DeviceManager<LsblkDisks>, Box<dyn Error>> {
        let disks = match &self.lsblk_json {
            Some(path) => LsblkDisks::from_json(&fs::read_to_string(path)?)?,
            None => LsblkDisks::scan()?,
        };

        let config = match &self.config {
            Some(path) => ManagerConfig::load(path)?,
            None => ManagerConfig::default(),
        };

        let env: EnvStore = self.env.iter().cloned().collect();
        Ok(DeviceManager::with_config(disks, env, config))
    }
}

/// Description of an opened device.
#[derive(Debug, Serialize)]
struct DeviceReport<'a> {
    name: &'a str,
    size: u64,
    has_partitions: bool,
    network: bool,
    partition: Option<&'a Partition>,
}

/// Prints every device name the manager enumerates.
pub fn list(options: &Options, skip: Option<&str>, stop_at: Option<&str>) -> CommandResult {
    let manager = options.manager()?;

    let mut guard = ResolutionGuard::new();
    guard.set_current(skip);

    let stopped = manager.iterate(&guard, |name| {
        println!("{}", name);
        if stop_at == Some(name) {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    })?;

    if stopped {
        info!("enumeration stopped early");
    }
    Ok(())
}

/// Opens a device, prints its description and closes it.
pub fn open(options: &Options, name: Option<&str>, json: bool) -> CommandResult {
    let manager = options.manager()?;
    let device = manager.open(name)?;

    if let Some(disk) = device.disk() {
        let report = DeviceReport {
            name: &disk.name,
            size: disk.size,
            has_partitions: disk.has_partitions(),
            network: device.is_network(),
            partition: disk.partition.as_ref(),
        };

        if json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            println!("name:           {}", report.name);
            println!("size:           {} bytes", report.size);
            println!("has partitions: {}", report.has_partitions);
            if let Some(partition) = report.partition {
                println!("partition:      {}", partition.number);
                if let Some(label) = &partition.label {
                    println!("label:          {}", label);
                }
                if let Some(fstype) = &partition.fstype {
                    println!("fstype:         {}", fstype);
                }
            }
        }
    }

    manager.close(device)?;
    Ok(())
}
