//! Data structures for the published snapshot and the raw collaborator readings.
//!
//! The snapshot fields are serialized in camelCase because that is what the
//! dashboard reads.

use serde::{Deserialize, Serialize};

use crate::history::WINDOW_LENGTH;

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;
const BYTES_PER_TB: f64 = BYTES_PER_GB * 1024.0;

/// Number of entries in the top-process list.
pub const TOP_PROCESS_COUNT: usize = 3;

/// A complete snapshot of system metrics at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemSnapshot {
    /// Timestamp when this snapshot was composed (Unix timestamp in milliseconds)
    pub timestamp: i64,
    pub cpu: CpuInfo,
    pub memory: MemoryInfo,
    pub disk: DiskInfo,
    pub network: NetworkRates,
    pub processes: ProcessSummary,
    pub temperature: TemperatureInfo,
    pub traffic_history: TrafficHistory,
}

/// CPU usage and topology.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuInfo {
    /// Busy percentage across all cores (0.0 to 100.0)
    pub percent: f64,
    pub cores: u32,
    #[serde(rename = "speedGHz")]
    pub speed_ghz: f64,
}

/// Memory usage in gigabytes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryInfo {
    #[serde(rename = "totalGB")]
    pub total_gb: f64,
    #[serde(rename = "usedGB")]
    pub used_gb: f64,
    #[serde(rename = "freeGB")]
    pub free_gb: f64,
    pub used_percent: f64,
}

/// Usage of the monitored disk in terabytes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskInfo {
    /// Mount point or drive label shown on the dashboard
    pub label: String,
    #[serde(rename = "totalTB")]
    pub total_tb: f64,
    #[serde(rename = "usedTB")]
    pub used_tb: f64,
    #[serde(rename = "freeTB")]
    pub free_tb: f64,
    pub used_percent: f64,
}

/// Current network throughput in megabits per second.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkRates {
    pub up_mbps: f64,
    pub down_mbps: f64,
}

/// Process count and the heaviest CPU consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessSummary {
    pub total: u64,
    pub top: Vec<TopProcess>,
}

/// One entry of the top-process list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopProcess {
    pub name: String,
    pub cpu_label: String,
}

/// Temperature reading, if the host exposes one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemperatureInfo {
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub celsius: Option<f64>,
}

/// The 7-day window of daily mean download rates, oldest first.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficHistory {
    pub week: [f64; WINDOW_LENGTH],
}

/// Raw disk reading in bytes, as returned by the disk collaborator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskUsage {
    pub size: u64,
    pub free: u64,
    pub used: u64,
}

/// Raw memory reading in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryUsage {
    pub total: u64,
    pub used: u64,
    pub free: u64,
}

/// Cumulative byte counters summed over all non-loopback interfaces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkCounters {
    pub received: u64,
    pub sent: u64,
}

impl SystemSnapshot {
    /// The snapshot served before the first tick completes.
    pub fn placeholder(timestamp: i64, cores: u32, disk_label: &str, week: [f64; WINDOW_LENGTH]) -> Self {
        Self {
            timestamp,
            cpu: CpuInfo {
                cores,
                ..CpuInfo::default()
            },
            memory: MemoryInfo::default(),
            disk: DiskInfo {
                label: disk_label.to_string(),
                ..DiskInfo::default()
            },
            network: NetworkRates::default(),
            processes: ProcessSummary::unavailable(),
            temperature: TemperatureInfo::unavailable(),
            traffic_history: TrafficHistory { week },
        }
    }
}

impl ProcessSummary {
    /// Zero processes and a padded list of `-` entries.
    pub fn unavailable() -> Self {
        Self {
            total: 0,
            top: vec![TopProcess::placeholder(); TOP_PROCESS_COUNT],
        }
    }

    /// Build a summary, truncating or padding `top` to exactly three entries.
    pub fn new(total: u64, mut top: Vec<TopProcess>) -> Self {
        top.truncate(TOP_PROCESS_COUNT);
        top.resize(TOP_PROCESS_COUNT, TopProcess::placeholder());
        Self { total, top }
    }
}

impl Default for ProcessSummary {
    fn default() -> Self {
        Self::unavailable()
    }
}

impl TopProcess {
    pub fn new(name: impl Into<String>, cpu_percent: f64) -> Self {
        Self {
            name: name.into(),
            cpu_label: format!("{:.1}%", cpu_percent),
        }
    }

    pub fn placeholder() -> Self {
        Self {
            name: "-".to_string(),
            cpu_label: "-".to_string(),
        }
    }
}

impl TemperatureInfo {
    pub fn unavailable() -> Self {
        Self {
            available: false,
            celsius: None,
        }
    }

    pub fn celsius(value: f64) -> Self {
        if value.is_finite() {
            Self {
                available: true,
                celsius: Some(value),
            }
        } else {
            Self::unavailable()
        }
    }
}

impl MemoryInfo {
    pub fn from_usage(usage: &MemoryUsage) -> Self {
        let used_percent = if usage.total > 0 {
            usage.used as f64 / usage.total as f64 * 100.0
        } else {
            0.0
        };
        Self {
            total_gb: usage.total as f64 / BYTES_PER_GB,
            used_gb: usage.used as f64 / BYTES_PER_GB,
            free_gb: usage.free as f64 / BYTES_PER_GB,
            used_percent,
        }
    }
}

impl DiskInfo {
    pub fn from_usage(label: &str, usage: &DiskUsage) -> Self {
        let used_percent = if usage.size > 0 {
            usage.used as f64 / usage.size as f64 * 100.0
        } else {
            0.0
        };
        Self {
            label: label.to_string(),
            total_tb: usage.size as f64 / BYTES_PER_TB,
            used_tb: usage.used as f64 / BYTES_PER_TB,
            free_tb: usage.free as f64 / BYTES_PER_TB,
            used_percent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_summary_is_padded_and_truncated() {
        let short = ProcessSummary::new(12, vec![TopProcess::new("sshd", 1.26)]);
        assert_eq!(short.top.len(), TOP_PROCESS_COUNT);
        assert_eq!(short.top[0].cpu_label, "1.3%");
        assert_eq!(short.top[2], TopProcess::placeholder());

        let long = ProcessSummary::new(5, (0..6).map(|i| TopProcess::new(format!("p{i}"), 1.0)).collect());
        assert_eq!(long.top.len(), TOP_PROCESS_COUNT);
        assert_eq!(long.top[2].name, "p2");
    }

    #[test]
    fn test_disk_percentages() {
        let usage = DiskUsage {
            size: 4 * 1024 * 1024 * 1024 * 1024,
            free: 3 * 1024 * 1024 * 1024 * 1024,
            used: 1024 * 1024 * 1024 * 1024,
        };
        let disk = DiskInfo::from_usage("/", &usage);
        assert_eq!(disk.total_tb, 4.0);
        assert_eq!(disk.used_tb, 1.0);
        assert_eq!(disk.used_percent, 25.0);

        let empty = DiskInfo::from_usage("C:", &DiskUsage::default());
        assert_eq!(empty.used_percent, 0.0);
    }

    #[test]
    fn test_non_finite_temperature_is_unavailable() {
        assert_eq!(TemperatureInfo::celsius(f64::NAN), TemperatureInfo::unavailable());
        assert_eq!(TemperatureInfo::celsius(42.0).celsius, Some(42.0));
    }
}
