//! Linux data sources.
//!
//! Each source reads procfs or sysfs and plugs into a reader. File parsing
//! is kept in free functions so it can be tested against fixtures.

#![allow(dead_code, unused_imports)]

mod battery;
mod cpu;
mod data;
mod disk;
mod memory;
mod network;
mod processes;
mod thermal;

pub use battery::{BatterySource, BatteryUsage, ChargeState};
pub use cpu::{CpuLoad, CpuSource};
pub use data::{format_bytes, format_rate, Reading};
pub use disk::{DiskActivity, DiskActivitySource, DiskSpace, DiskSpaceSource};
pub use memory::{MemorySource, MemoryUsage};
pub use network::{NetworkSource, NetworkUsage};
pub use processes::{ProcessSource, ProcessUsage};
pub use thermal::{Temperature, ThermalSource};
