//! Readings delivered to the host and their formatting.

use super::battery::BatteryUsage;
use super::cpu::CpuLoad;
use super::disk::{DiskActivity, DiskSpace};
use super::memory::MemoryUsage;
use super::network::NetworkUsage;
use super::processes::ProcessUsage;
use super::thermal::Temperature;
use std::fmt;

/// Every value any module can deliver.
#[derive(Debug, Clone, PartialEq)]
pub enum Reading {
    Cpu(CpuLoad),
    Memory(MemoryUsage),
    Processes(Vec<ProcessUsage>),
    DiskSpace(DiskSpace),
    DiskActivity(DiskActivity),
    Network(NetworkUsage),
    Battery(BatteryUsage),
    Temperatures(Vec<Temperature>),
}

macro_rules! reading_from {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(
            impl From<$ty> for Reading {
                fn from(value: $ty) -> Self {
                    Reading::$variant(value)
                }
            }
        )*
    };
}

reading_from!(
    Cpu(CpuLoad),
    Memory(MemoryUsage),
    Processes(Vec<ProcessUsage>),
    DiskSpace(DiskSpace),
    DiskActivity(DiskActivity),
    Network(NetworkUsage),
    Battery(BatteryUsage),
    Temperatures(Vec<Temperature>),
);

/// Formats a byte rate as a human-readable string (e.g., "1.2 MB/s")
pub fn format_rate(bytes_per_sec: f64) -> String {
    if bytes_per_sec >= 1_000_000_000.0 {
        format!("{:.1} GB/s", bytes_per_sec / 1_000_000_000.0)
    } else if bytes_per_sec >= 1_000_000.0 {
        format!("{:.1} MB/s", bytes_per_sec / 1_000_000.0)
    } else if bytes_per_sec >= 1_000.0 {
        format!("{:.1} KB/s", bytes_per_sec / 1_000.0)
    } else {
        format!("{:.0} B/s", bytes_per_sec)
    }
}

/// Formats a byte count (e.g., "3.4 GB")
pub fn format_bytes(bytes: u64) -> String {
    let bytes = bytes as f64;
    if bytes >= 1_000_000_000_000.0 {
        format!("{:.1} TB", bytes / 1_000_000_000_000.0)
    } else if bytes >= 1_000_000_000.0 {
        format!("{:.1} GB", bytes / 1_000_000_000.0)
    } else if bytes >= 1_000_000.0 {
        format!("{:.1} MB", bytes / 1_000_000.0)
    } else if bytes >= 1_000.0 {
        format!("{:.1} KB", bytes / 1_000.0)
    } else {
        format!("{:.0} B", bytes)
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reading::Cpu(load) => write!(
                f,
                "cpu {:.1}% (user {:.1}%, system {:.1}%)",
                load.total, load.user, load.system
            ),
            Reading::Memory(mem) => write!(
                f,
                "ram {:.1}% ({} of {}, swap {})",
                mem.percent(),
                format_bytes(mem.used),
                format_bytes(mem.total),
                format_bytes(mem.swap_used)
            ),
            Reading::Processes(processes) => {
                write!(f, "top")?;
                for process in processes {
                    write!(f, " {}={}", process.name, format_bytes(process.rss))?;
                }
                Ok(())
            }
            Reading::DiskSpace(space) => write!(
                f,
                "{} {:.1}% used ({} free)",
                space.mount.display(),
                space.percent(),
                format_bytes(space.available)
            ),
            Reading::DiskActivity(io) => write!(
                f,
                "{} read {} write {}",
                io.device,
                format_rate(io.read_rate),
                format_rate(io.write_rate)
            ),
            Reading::Network(net) => write!(
                f,
                "{} down {} up {}",
                net.interface,
                format_rate(net.rx_rate),
                format_rate(net.tx_rate)
            ),
            Reading::Battery(battery) => {
                write!(f, "{} {}% {}", battery.name, battery.level, battery.state)?;
                if let Some(watts) = battery.power_watts {
                    write!(f, " {:.1} W", watts)?;
                }
                Ok(())
            }
            Reading::Temperatures(temps) => {
                write!(f, "temps")?;
                for temp in temps {
                    write!(f, " {}={:.1}°C", temp.label, temp.celsius)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_rate() {
        assert_eq!(format_rate(512.0), "512 B/s");
        assert_eq!(format_rate(1_500.0), "1.5 KB/s");
        assert_eq!(format_rate(2_340_000.0), "2.3 MB/s");
        assert_eq!(format_rate(3_000_000_000.0), "3.0 GB/s");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(999), "999 B");
        assert_eq!(format_bytes(4_200_000_000), "4.2 GB");
        assert_eq!(format_bytes(1_000_000_000_000), "1.0 TB");
    }

    #[test]
    fn test_display_reading() {
        let reading = Reading::from(NetworkUsage {
            interface: "eth0".to_string(),
            rx_rate: 1_500.0,
            tx_rate: 100.0,
            ..Default::default()
        });
        assert_eq!(reading.to_string(), "eth0 down 1.5 KB/s up 100 B/s");

        let cpu = Reading::from(CpuLoad {
            total: 12.5,
            user: 10.0,
            system: 2.5,
            idle: 87.5,
        });
        assert_eq!(cpu.to_string(), "cpu 12.5% (user 10.0%, system 2.5%)");
    }

    #[test]
    fn test_from_vectors() {
        let reading = Reading::from(vec![Temperature {
            label: "acpitz".to_string(),
            celsius: 40.0,
        }]);
        assert!(matches!(reading, Reading::Temperatures(ref t) if t.len() == 1));
        assert_eq!(reading.to_string(), "temps acpitz=40.0°C");
    }
}
