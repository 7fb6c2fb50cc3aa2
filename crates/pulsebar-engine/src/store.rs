//! Key/value preference store.
//!
//! The engine reads a handful of per-module settings from it:
//! `<module>_updateInterval` (seconds), `<module>_popupMode` and
//! `<module>_state` (enabled flag).

use crate::Result;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use tracing::warn;

/// String-valued preference store shared by all modules.
pub trait ConfigStore: Send + Sync {
    /// Returns the stored value or `default` when the key is missing.
    fn get(&self, key: &str, default: &str) -> String;

    /// Stores a value.
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

pub fn interval_key(module: &str) -> String {
    format!("{}_updateInterval", module)
}

pub fn popup_key(module: &str) -> String {
    format!("{}_popupMode", module)
}

pub fn state_key(module: &str) -> String {
    format!("{}_state", module)
}

/// Reads a number, falling back to `default` on missing or malformed values.
pub fn get_f64(store: &dyn ConfigStore, key: &str, default: f64) -> f64 {
    let raw = store.get(key, &default.to_string());
    match raw.trim().parse() {
        Ok(value) => value,
        Err(_) => {
            warn!("Ignoring malformed value for {}: {:?}", key, raw);
            default
        }
    }
}

/// Reads a boolean, falling back to `default` on missing or malformed values.
pub fn get_bool(store: &dyn ConfigStore, key: &str, default: bool) -> bool {
    let raw = store.get(key, if default { "true" } else { "false" });
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => true,
        "false" | "0" | "no" | "off" => false,
        _ => {
            warn!("Ignoring malformed value for {}: {:?}", key, raw);
            default
        }
    }
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `values`.
    pub fn with_values<K, V>(values: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: RwLock::new(
                values
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    /// Returns a copy of every stored entry.
    pub fn entries(&self) -> HashMap<String, String> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ConfigStore for MemoryStore {
    fn get(&self, key: &str, default: &str) -> String {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys() {
        assert_eq!(interval_key("CPU"), "CPU_updateInterval");
        assert_eq!(popup_key("RAM"), "RAM_popupMode");
        assert_eq!(state_key("Disk"), "Disk_state");
    }

    #[test]
    fn test_get_default_and_set() {
        let store = MemoryStore::new();
        assert_eq!(store.get("missing", "fallback"), "fallback");
        store.set("CPU_updateInterval", "2").unwrap();
        assert_eq!(store.get("CPU_updateInterval", "1"), "2");
        assert_eq!(store.entries().len(), 1);
    }

    #[test]
    fn test_typed_getters() {
        let store = MemoryStore::with_values([
            ("a", "2.5"),
            ("b", "nonsense"),
            ("c", "Yes"),
            ("d", "maybe"),
        ]);
        assert_eq!(get_f64(&store, "a", 1.0), 2.5);
        assert_eq!(get_f64(&store, "b", 1.0), 1.0);
        assert_eq!(get_f64(&store, "missing", 3.0), 3.0);
        assert!(get_bool(&store, "c", false));
        assert!(get_bool(&store, "d", true));
        assert!(!get_bool(&store, "missing", false));
    }
}
