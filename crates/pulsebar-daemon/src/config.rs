//! Configuration management.

#![allow(dead_code)]

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Path of the preference store (intervals, enabled modules)
    #[serde(default = "default_store")]
    pub store: String,

    /// Network interface to watch, auto-detected when unset
    #[serde(default)]
    pub network_interface: Option<String>,

    /// Mount point reported by the disk space reader
    #[serde(default = "default_disk_mount")]
    pub disk_mount: String,

    /// Block device for disk activity, auto-detected when unset
    #[serde(default)]
    pub disk_device: Option<String>,

    /// Number of processes listed in the memory popup
    #[serde(default = "default_process_count")]
    pub process_count: usize,

    /// Per-module defaults
    #[serde(default)]
    pub modules: ModulesConfig,
}

/// Defaults for one module. The preference store overrides both fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Update interval in seconds, per-module default when unset
    #[serde(default)]
    pub interval: Option<f64>,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            interval: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ModulesConfig {
    #[serde(default)]
    pub cpu: ModuleConfig,

    #[serde(default)]
    pub ram: ModuleConfig,

    #[serde(default)]
    pub disk: ModuleConfig,

    #[serde(default)]
    pub network: ModuleConfig,

    #[serde(default)]
    pub battery: ModuleConfig,

    #[serde(default)]
    pub sensors: ModuleConfig,
}

impl ModulesConfig {
    /// Looks up a module by its display name (e.g. "CPU").
    pub fn get(&self, module: &str) -> Option<&ModuleConfig> {
        match module {
            "CPU" => Some(&self.cpu),
            "RAM" => Some(&self.ram),
            "Disk" => Some(&self.disk),
            "Network" => Some(&self.network),
            "Battery" => Some(&self.battery),
            "Sensors" => Some(&self.sensors),
            _ => None,
        }
    }

    pub fn enabled(&self, module: &str) -> bool {
        self.get(module).map_or(default_enabled(), |m| m.enabled)
    }

    /// Configured interval, or the module's built-in default.
    pub fn interval(&self, module: &str) -> f64 {
        self.get(module)
            .and_then(|m| m.interval)
            .unwrap_or_else(|| default_interval(module))
    }
}

// Default value functions
fn default_store() -> String {
    "pulsebar-state.toml".to_string()
}

fn default_disk_mount() -> String {
    "/".to_string()
}

fn default_process_count() -> usize {
    5
}

fn default_enabled() -> bool {
    true
}

// Slow-changing values are sampled less often
fn default_interval(module: &str) -> f64 {
    match module {
        "Disk" | "Battery" | "Sensors" => 5.0,
        _ => 1.0,
    }
}

impl Config {
    /// Loads configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content =
            std::fs::read_to_string(path.as_ref()).context("Failed to read configuration file")?;
        let config: Config = toml::from_str(&content).context("Failed to parse configuration")?;
        Ok(config)
    }

    /// Saves configuration to a TOML file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;
        std::fs::write(path.as_ref(), content).context("Failed to write configuration file")?;
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: default_store(),
            network_interface: None,
            disk_mount: default_disk_mount(),
            disk_device: None,
            process_count: default_process_count(),
            modules: ModulesConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.modules.interval("Disk"), 5.0);
        assert_eq!(config.modules.interval("CPU"), 1.0);
        assert!(config.modules.enabled("Network"));
    }

    #[test]
    fn test_partial_module_section() {
        let config: Config = toml::from_str(
            r#"
            network_interface = "wlan0"

            [modules.cpu]
            interval = 2.5

            [modules.battery]
            enabled = false
            "#,
        )
        .unwrap();
        assert_eq!(config.network_interface.as_deref(), Some("wlan0"));
        assert_eq!(config.modules.interval("CPU"), 2.5);
        assert!(config.modules.enabled("CPU"));
        assert!(!config.modules.enabled("Battery"));
        assert_eq!(config.modules.interval("Battery"), 5.0);
        assert_eq!(config.modules.interval("Sensors"), 5.0);
    }

    #[test]
    fn test_module_lookup() {
        let config = Config::default();
        assert!(config.modules.get("RAM").is_some());
        assert!(config.modules.get("GPU").is_none());
        assert_eq!(config.modules.interval("GPU"), 1.0);
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("pulsebar-config-{}.toml", std::process::id()));
        let mut config = Config::default();
        config.disk_device = Some("sda".to_string());
        config.modules.ram.interval = Some(2.0);
        config.save(&path).unwrap();
        assert_eq!(Config::load(&path).unwrap(), config);
        std::fs::remove_file(&path).unwrap();
    }
}
