//! CPU load source.

use pulsebar_engine::{Error, Result, Source};
use std::fs;

/// CPU load over the last sampling period, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CpuLoad {
    /// user + system
    pub total: f64,
    pub user: f64,
    pub system: f64,
    pub idle: f64,
}

/// Aggregate jiffy counters from the first line of /proc/stat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CpuTimes {
    pub user: u64,
    pub system: u64,
    pub idle: u64,
    pub other: u64,
}

impl CpuTimes {
    fn total(&self) -> u64 {
        self.user + self.system + self.idle + self.other
    }
}

/// Parses the aggregate `cpu` line of /proc/stat.
///
/// Fields: user nice system idle iowait irq softirq steal ...
pub fn parse_cpu_times(content: &str) -> Option<CpuTimes> {
    let line = content.lines().find(|line| line.starts_with("cpu "))?;
    let parts: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .filter_map(|s| s.parse().ok())
        .collect();

    if parts.len() < 4 {
        return None;
    }
    let field = |i: usize| parts.get(i).copied().unwrap_or(0);
    Some(CpuTimes {
        user: field(0) + field(1),
        system: field(2) + field(5) + field(6),
        idle: field(3) + field(4),
        other: field(7),
    })
}

/// Load between two counter snapshots, or `None` if no time passed.
pub fn load_between(previous: &CpuTimes, current: &CpuTimes) -> Option<CpuLoad> {
    let total_delta = current.total().saturating_sub(previous.total());
    if total_delta == 0 {
        return None;
    }
    let percent = |now: u64, then: u64| 100.0 * now.saturating_sub(then) as f64 / total_delta as f64;
    let user = percent(current.user, previous.user);
    let system = percent(current.system, previous.system);
    Some(CpuLoad {
        total: user + system,
        user,
        system,
        idle: percent(current.idle, previous.idle),
    })
}

/// Samples CPU load from /proc/stat tick deltas.
pub struct CpuSource {
    name: String,
    last_times: Option<CpuTimes>,
    last_load: Option<CpuLoad>,
}

impl CpuSource {
    pub fn new() -> Self {
        Self {
            name: "cpu_load".to_string(),
            last_times: None,
            last_load: None,
        }
    }
}

impl Default for CpuSource {
    fn default() -> Self {
        Self::new()
    }
}

impl Source for CpuSource {
    type Output = CpuLoad;

    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&mut self) -> Result<Option<CpuLoad>> {
        let content = fs::read_to_string("/proc/stat")?;
        let times =
            parse_cpu_times(&content).ok_or_else(|| Error::parse("/proc/stat", "missing cpu line"))?;

        // First sample reports the average since boot
        let previous = self.last_times.unwrap_or_default();
        if let Some(load) = load_between(&previous, &times) {
            self.last_load = Some(load);
        }
        self.last_times = Some(times);
        Ok(self.last_load)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STAT: &str = "cpu  100 20 50 800 10 5 5 10 0 0\ncpu0 50 10 25 400 5 2 3 5 0 0\nintr 1234\n";

    #[test]
    fn test_parse_cpu_times() {
        let times = parse_cpu_times(STAT).unwrap();
        assert_eq!(times.user, 120);
        assert_eq!(times.system, 60);
        assert_eq!(times.idle, 810);
        assert_eq!(times.other, 10);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_cpu_times("intr 1 2 3").is_none());
        assert!(parse_cpu_times("cpu  1 2").is_none());
    }

    #[test]
    fn test_load_between() {
        let previous = CpuTimes {
            user: 100,
            system: 50,
            idle: 800,
            other: 50,
        };
        let current = CpuTimes {
            user: 130,
            system: 60,
            idle: 860,
            other: 50,
        };
        let load = load_between(&previous, &current).unwrap();
        assert!((load.user - 30.0).abs() < 1e-9);
        assert!((load.system - 10.0).abs() < 1e-9);
        assert!((load.total - 40.0).abs() < 1e-9);
        assert!((load.idle - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_elapsed_ticks() {
        let times = parse_cpu_times(STAT).unwrap();
        assert!(load_between(&times, &times).is_none());
    }
}
