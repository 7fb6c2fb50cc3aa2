//! Disk space and disk I/O sources.

use pulsebar_engine::{Error, Result, Source};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use sysinfo::Disks;
use tracing::{debug, info};

/// Sectors in /proc/diskstats are always 512 bytes.
const SECTOR_SIZE: u64 = 512;

/// Capacity of one mounted filesystem, in bytes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DiskSpace {
    pub mount: PathBuf,
    pub total: u64,
    /// Free space usable by unprivileged users.
    pub available: u64,
}

impl DiskSpace {
    pub fn used(&self) -> u64 {
        self.total.saturating_sub(self.available)
    }

    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        100.0 * self.used() as f64 / self.total as f64
    }
}

/// Picks `mount` out of (mount point, total, available) entries.
pub fn find_mount<'a, I>(disks: I, mount: &Path) -> Option<DiskSpace>
where
    I: IntoIterator<Item = (&'a Path, u64, u64)>,
{
    disks
        .into_iter()
        .find(|(point, _, _)| *point == mount)
        .map(|(point, total, available)| DiskSpace {
            mount: point.to_path_buf(),
            total,
            available,
        })
}

/// Samples filesystem capacity of one mount point.
pub struct DiskSpaceSource {
    name: String,
    mount: PathBuf,
    disks: Disks,
}

impl DiskSpaceSource {
    pub fn new(mount: impl Into<PathBuf>) -> Self {
        let mount = mount.into();
        Self {
            name: format!("disk_space_{}", mount.display()),
            mount,
            disks: Disks::new_with_refreshed_list(),
        }
    }

    fn lookup(&self) -> Option<DiskSpace> {
        find_mount(
            self.disks
                .iter()
                .map(|d| (d.mount_point(), d.total_space(), d.available_space())),
            &self.mount,
        )
    }
}

impl Source for DiskSpaceSource {
    type Output = DiskSpace;

    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&mut self) -> Result<Option<DiskSpace>> {
        self.disks.refresh();
        let space = match self.lookup() {
            Some(space) => space,
            None => {
                // Mounted after start-up
                debug!("Rescanning disks for {}", self.mount.display());
                self.disks.refresh_list();
                self.lookup().ok_or_else(|| {
                    Error::Unavailable(format!("mount point {}", self.mount.display()))
                })?
            }
        };
        if space.total == 0 {
            return Ok(None);
        }
        Ok(Some(space))
    }
}

/// I/O throughput of one block device. Rates are bytes/second.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DiskActivity {
    pub device: String,
    pub read_rate: f64,
    pub write_rate: f64,
    pub total_read: u64,
    pub total_written: u64,
}

/// Finds (sectors_read, sectors_written) for `device` in /proc/diskstats.
///
/// Fields: major minor name reads_completed reads_merged sectors_read time_reading
///         writes_completed writes_merged sectors_written ...
pub fn parse_diskstats(content: &str, device: &str) -> Option<(u64, u64)> {
    content.lines().find_map(|line| {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() >= 10 && parts[2] == device {
            Some((parts[5].parse().ok()?, parts[9].parse().ok()?))
        } else {
            None
        }
    })
}

/// Samples sector counters from /proc/diskstats.
pub struct DiskActivitySource {
    name: String,
    device: String,
    last: Option<(u64, u64, Instant)>,
    last_read_rate: f64,
    last_write_rate: f64,
}

impl DiskActivitySource {
    /// Creates a source for a specific device (e.g. "sda", "nvme0n1").
    pub fn new(device: &str) -> Self {
        Self {
            name: format!("disk_{}", device),
            device: device.to_string(),
            last: None,
            last_read_rate: 0.0,
            last_write_rate: 0.0,
        }
    }

    pub fn auto() -> Self {
        let device = Self::detect_primary_disk().unwrap_or_else(|| "sda".to_string());
        info!("Disk activity source using device: {}", device);
        Self::new(&device)
    }

    fn detect_primary_disk() -> Option<String> {
        ["nvme0n1", "sda", "vda", "xvda", "mmcblk0"]
            .into_iter()
            .find(|candidate| Path::new(&format!("/sys/block/{}", candidate)).exists())
            .map(str::to_string)
    }

    pub fn device(&self) -> &str {
        &self.device
    }
}

impl Source for DiskActivitySource {
    type Output = DiskActivity;

    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&mut self) -> Result<Option<DiskActivity>> {
        let content = fs::read_to_string("/proc/diskstats")?;
        let Some((read_sectors, write_sectors)) = parse_diskstats(&content, &self.device) else {
            return Err(Error::Unavailable(format!("block device {}", self.device)));
        };
        let now = Instant::now();

        if let Some((last_read, last_write, last_time)) = self.last {
            let elapsed = now.duration_since(last_time).as_secs_f64();
            if elapsed > 0.0 {
                let read_delta = read_sectors.saturating_sub(last_read) * SECTOR_SIZE;
                let write_delta = write_sectors.saturating_sub(last_write) * SECTOR_SIZE;
                self.last_read_rate = read_delta as f64 / elapsed;
                self.last_write_rate = write_delta as f64 / elapsed;
            }
        }
        self.last = Some((read_sectors, write_sectors, now));

        Ok(Some(DiskActivity {
            device: self.device.clone(),
            read_rate: self.last_read_rate,
            write_rate: self.last_write_rate,
            total_read: read_sectors * SECTOR_SIZE,
            total_written: write_sectors * SECTOR_SIZE,
        }))
    }
}
