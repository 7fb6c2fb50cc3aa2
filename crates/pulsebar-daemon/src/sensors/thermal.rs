//! Thermal zone temperatures. Optional: many VMs expose none.

use pulsebar_engine::{Result, Source};
use std::fs;
use std::path::{Path, PathBuf};

const THERMAL: &str = "/sys/class/thermal";

#[derive(Debug, Clone, PartialEq)]
pub struct Temperature {
    pub label: String,
    pub celsius: f64,
}

/// Reads `type` and `temp` (millidegrees) from one thermal zone directory.
pub fn read_zone(dir: &Path) -> Option<Temperature> {
    let label = fs::read_to_string(dir.join("type")).ok()?.trim().to_string();
    let millis: i64 = fs::read_to_string(dir.join("temp")).ok()?.trim().parse().ok()?;
    Some(Temperature {
        label,
        celsius: millis as f64 / 1000.0,
    })
}

pub struct ThermalSource {
    name: String,
    root: PathBuf,
}

impl ThermalSource {
    pub fn new() -> Self {
        Self::with_root(THERMAL)
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            name: "thermal_zones".to_string(),
            root: root.into(),
        }
    }
}

impl Default for ThermalSource {
    fn default() -> Self {
        Self::new()
    }
}

impl Source for ThermalSource {
    type Output = Vec<Temperature>;

    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&mut self) -> Result<Option<Vec<Temperature>>> {
        let Ok(entries) = fs::read_dir(&self.root) else {
            return Ok(None);
        };
        let mut zones: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .is_some_and(|name| name.to_string_lossy().starts_with("thermal_zone"))
            })
            .collect();
        zones.sort();

        let temperatures: Vec<Temperature> = zones.iter().filter_map(|zone| read_zone(zone)).collect();
        if temperatures.is_empty() {
            return Ok(None);
        }
        Ok(Some(temperatures))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(name: &str) -> PathBuf {
        let root = std::env::temp_dir().join(format!(
            "pulsebar-thermal-{}-{}",
            name,
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&root);
        fs::create_dir_all(&root).unwrap();
        root
    }

    #[test]
    fn test_reads_zones_in_order() {
        let root = fixture("zones");
        for (zone, label, temp) in [
            ("thermal_zone1", "x86_pkg_temp", "55000"),
            ("thermal_zone0", "acpitz", "41500"),
        ] {
            let dir = root.join(zone);
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join("type"), format!("{}\n", label)).unwrap();
            fs::write(dir.join("temp"), format!("{}\n", temp)).unwrap();
        }
        fs::create_dir_all(root.join("cooling_device0")).unwrap();

        let temps = ThermalSource::with_root(&root).fetch().unwrap().unwrap();
        assert_eq!(temps.len(), 2);
        assert_eq!(temps[0].label, "acpitz");
        assert!((temps[0].celsius - 41.5).abs() < 1e-9);
        assert_eq!(temps[1].label, "x86_pkg_temp");
        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_no_zones_is_nil() {
        let root = fixture("empty");
        assert_eq!(ThermalSource::with_root(&root).fetch().unwrap(), None);
        fs::remove_dir_all(&root).unwrap();
    }
}
