//! Network throughput source.

use pulsebar_engine::{Error, Result, Source};
use std::fs;
use std::time::Instant;
use tracing::info;

/// Throughput of one interface. Rates are bytes/second.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NetworkUsage {
    pub interface: String,
    pub rx_rate: f64,
    pub tx_rate: f64,
    pub total_rx: u64,
    pub total_tx: u64,
}

/// Samples rx/tx byte counters from /sys/class/net.
pub struct NetworkSource {
    name: String,
    interface: String,
    last: Option<(u64, u64, Instant)>,
    last_rx_rate: f64,
    last_tx_rate: f64,
}

fn is_virtual(name: &str) -> bool {
    name == "lo" || name.starts_with("veth") || name.starts_with("docker")
}

fn has_stats(name: &str) -> bool {
    fs::metadata(format!("/sys/class/net/{}/statistics/rx_bytes", name)).is_ok()
}

/// Finds the interface carrying the default route in /proc/net/route content.
pub fn parse_default_route(content: &str) -> Option<String> {
    content.lines().skip(1).find_map(|line| {
        let mut fields = line.split_whitespace();
        let iface = fields.next()?;
        // Default route has destination 00000000
        (fields.next()? == "00000000").then(|| iface.to_string())
    })
}

impl NetworkSource {
    pub fn new(interface: &str) -> Self {
        Self {
            name: format!("network_{}", interface),
            interface: interface.to_string(),
            last: None,
            last_rx_rate: 0.0,
            last_tx_rate: 0.0,
        }
    }

    /// Uses the default-route interface, falling back to the first real one.
    pub fn auto() -> Self {
        let interface = Self::detect_interface().unwrap_or_else(|| "eth0".to_string());
        info!("Network source using interface: {}", interface);
        Self::new(&interface)
    }

    /// Lists interfaces with statistics, excluding loopback and virtual ones.
    pub fn list_interfaces() -> Vec<String> {
        let mut interfaces: Vec<String> = fs::read_dir("/sys/class/net")
            .map(|entries| {
                entries
                    .flatten()
                    .map(|entry| entry.file_name().to_string_lossy().to_string())
                    .filter(|name| !is_virtual(name) && has_stats(name))
                    .collect()
            })
            .unwrap_or_default();
        interfaces.sort();
        interfaces
    }

    pub fn detect_interface() -> Option<String> {
        fs::read_to_string("/proc/net/route")
            .ok()
            .and_then(|content| parse_default_route(&content))
            .or_else(|| Self::list_interfaces().into_iter().next())
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    fn read_counter(&self, which: &str) -> Result<u64> {
        let path = format!("/sys/class/net/{}/statistics/{}", self.interface, which);
        let raw = fs::read_to_string(&path)?;
        raw.trim()
            .parse()
            .map_err(|e| Error::parse("interface statistics", format!("{}: {}", path, e)))
    }
}

impl Source for NetworkSource {
    type Output = NetworkUsage;

    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&mut self) -> Result<Option<NetworkUsage>> {
        let rx = self.read_counter("rx_bytes")?;
        let tx = self.read_counter("tx_bytes")?;
        let now = Instant::now();

        if let Some((last_rx, last_tx, last_time)) = self.last {
            let elapsed = now.duration_since(last_time).as_secs_f64();
            if elapsed > 0.0 {
                self.last_rx_rate = rx.saturating_sub(last_rx) as f64 / elapsed;
                self.last_tx_rate = tx.saturating_sub(last_tx) as f64 / elapsed;
            }
        }
        self.last = Some((rx, tx, now));

        Ok(Some(NetworkUsage {
            interface: self.interface.clone(),
            rx_rate: self.last_rx_rate,
            tx_rate: self.last_tx_rate,
            total_rx: rx,
            total_tx: tx,
        }))
    }
}
