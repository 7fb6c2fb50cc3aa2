//! Top memory consumers. Sampled only while the popup is shown.

use pulsebar_engine::{Result, Source};
use std::fs;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessUsage {
    pub pid: u32,
    pub name: String,
    /// Resident set size in bytes.
    pub rss: u64,
}

/// Extracts `(Name, VmRSS bytes)` from /proc/<pid>/status. Kernel threads
/// have no VmRSS line and are skipped.
pub fn parse_status(content: &str) -> Option<(String, u64)> {
    let mut name = None;
    let mut rss = None;
    for line in content.lines() {
        if let Some(value) = line.strip_prefix("Name:") {
            name = Some(value.trim().to_string());
        } else if let Some(value) = line.strip_prefix("VmRSS:") {
            rss = value
                .split_whitespace()
                .next()
                .and_then(|kb| kb.parse::<u64>().ok())
                .map(|kb| kb * 1024);
        }
    }
    Some((name?, rss?))
}

/// Keeps the `limit` largest processes, biggest first.
pub fn top_by_rss(mut processes: Vec<ProcessUsage>, limit: usize) -> Vec<ProcessUsage> {
    processes.sort_by(|a, b| b.rss.cmp(&a.rss).then(a.pid.cmp(&b.pid)));
    processes.truncate(limit);
    processes
}

pub struct ProcessSource {
    name: String,
    limit: usize,
}

impl ProcessSource {
    pub fn new(limit: usize) -> Self {
        Self {
            name: "top_processes".to_string(),
            limit,
        }
    }
}

impl Source for ProcessSource {
    type Output = Vec<ProcessUsage>;

    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&mut self) -> Result<Option<Vec<ProcessUsage>>> {
        let mut processes = Vec::new();
        for entry in fs::read_dir("/proc")?.flatten() {
            let Ok(pid) = entry.file_name().to_string_lossy().parse::<u32>() else {
                continue;
            };
            // Processes may exit between listing and reading
            let Ok(status) = fs::read_to_string(entry.path().join("status")) else {
                continue;
            };
            if let Some((name, rss)) = parse_status(&status) {
                processes.push(ProcessUsage { pid, name, rss });
            }
        }

        if processes.is_empty() {
            return Ok(None);
        }
        Ok(Some(top_by_rss(processes, self.limit)))
    }
}
