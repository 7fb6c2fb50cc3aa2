//! Battery source. Optional: most desktops have no battery.

use pulsebar_engine::{Result, Source};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

const POWER_SUPPLY: &str = "/sys/class/power_supply";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChargeState {
    Charging,
    Discharging,
    Full,
    NotCharging,
    #[default]
    Unknown,
}

impl ChargeState {
    pub fn parse(status: &str) -> Self {
        match status.trim() {
            "Charging" => Self::Charging,
            "Discharging" => Self::Discharging,
            "Full" => Self::Full,
            "Not charging" => Self::NotCharging,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for ChargeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Charging => "charging",
            Self::Discharging => "discharging",
            Self::Full => "full",
            Self::NotCharging => "not charging",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BatteryUsage {
    pub name: String,
    /// Charge level (0-100).
    pub level: u8,
    pub state: ChargeState,
    /// Present draw or charge power, when the driver reports it.
    pub power_watts: Option<f64>,
}

fn read_trimmed(dir: &Path, attribute: &str) -> Option<String> {
    fs::read_to_string(dir.join(attribute))
        .ok()
        .map(|s| s.trim().to_string())
}

/// Reads one power supply directory. `None` unless it is a present battery.
pub fn read_battery(dir: &Path) -> Option<BatteryUsage> {
    if read_trimmed(dir, "type")? != "Battery" {
        return None;
    }
    if read_trimmed(dir, "present").is_some_and(|present| present == "0") {
        return None;
    }
    let level = read_trimmed(dir, "capacity")?.parse::<u8>().ok()?.min(100);
    let state = read_trimmed(dir, "status")
        .map(|s| ChargeState::parse(&s))
        .unwrap_or_default();
    // power_now is in microwatts
    let power_watts = read_trimmed(dir, "power_now")
        .and_then(|s| s.parse::<u64>().ok())
        .map(|uw| uw as f64 / 1_000_000.0);

    Some(BatteryUsage {
        name: dir.file_name()?.to_string_lossy().to_string(),
        level,
        state,
        power_watts,
    })
}

pub struct BatterySource {
    name: String,
    root: PathBuf,
}

impl BatterySource {
    pub fn new() -> Self {
        Self::with_root(POWER_SUPPLY)
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            name: "battery".to_string(),
            root: root.into(),
        }
    }
}

impl Default for BatterySource {
    fn default() -> Self {
        Self::new()
    }
}

impl Source for BatterySource {
    type Output = BatteryUsage;

    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&mut self) -> Result<Option<BatteryUsage>> {
        let Ok(entries) = fs::read_dir(&self.root) else {
            return Ok(None);
        };
        let mut dirs: Vec<PathBuf> = entries.flatten().map(|entry| entry.path()).collect();
        dirs.sort();
        Ok(dirs.iter().find_map(|dir| read_battery(dir)))
    }
}
