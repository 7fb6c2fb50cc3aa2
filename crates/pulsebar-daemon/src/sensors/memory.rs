//! Memory usage source.

use pulsebar_engine::{Error, Result, Source};
use std::fs;

/// Memory and swap usage in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemoryUsage {
    pub total: u64,
    pub available: u64,
    pub used: u64,
    pub swap_total: u64,
    pub swap_used: u64,
}

impl MemoryUsage {
    /// Used memory as a percentage (0-100).
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        100.0 * self.used as f64 / self.total as f64
    }
}

fn meminfo_kb(content: &str, key: &str) -> Option<u64> {
    content.lines().find_map(|line| {
        let rest = line.strip_prefix(key)?.strip_prefix(':')?;
        rest.split_whitespace().next()?.parse().ok()
    })
}

/// Parses /proc/meminfo.
pub fn parse_meminfo(content: &str) -> Option<MemoryUsage> {
    let total = meminfo_kb(content, "MemTotal")? * 1024;
    let available = meminfo_kb(content, "MemAvailable")? * 1024;
    let swap_total = meminfo_kb(content, "SwapTotal").unwrap_or(0) * 1024;
    let swap_free = meminfo_kb(content, "SwapFree").unwrap_or(0) * 1024;
    if total == 0 {
        return None;
    }
    Some(MemoryUsage {
        total,
        available,
        used: total.saturating_sub(available),
        swap_total,
        swap_used: swap_total.saturating_sub(swap_free),
    })
}

/// Samples memory usage from /proc/meminfo.
pub struct MemorySource {
    name: String,
}

impl MemorySource {
    pub fn new() -> Self {
        Self {
            name: "memory".to_string(),
        }
    }
}

impl Default for MemorySource {
    fn default() -> Self {
        Self::new()
    }
}

impl Source for MemorySource {
    type Output = MemoryUsage;

    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&mut self) -> Result<Option<MemoryUsage>> {
        let content = fs::read_to_string("/proc/meminfo")?;
        parse_meminfo(&content)
            .map(Some)
            .ok_or_else(|| Error::parse("/proc/meminfo", "missing MemTotal or MemAvailable"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MEMINFO: &str = "\
MemTotal:        8000000 kB
MemFree:         1000000 kB
MemAvailable:    6000000 kB
Buffers:          100000 kB
SwapTotal:       2000000 kB
SwapFree:        1500000 kB
";

    #[test]
    fn test_parse_meminfo() {
        let usage = parse_meminfo(MEMINFO).unwrap();
        assert_eq!(usage.total, 8_000_000 * 1024);
        assert_eq!(usage.available, 6_000_000 * 1024);
        assert_eq!(usage.used, 2_000_000 * 1024);
        assert_eq!(usage.swap_used, 500_000 * 1024);
        assert!((usage.percent() - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_meminfo_missing_fields() {
        assert!(parse_meminfo("MemTotal: 100 kB\n").is_none());
        assert!(parse_meminfo("").is_none());
    }

    #[test]
    fn test_prefix_must_match_whole_key() {
        let content = "MemTotalish: 5 kB\nMemTotal: 10 kB\nMemAvailable: 5 kB\n";
        assert_eq!(parse_meminfo(content).unwrap().total, 10 * 1024);
    }
}
