//! Sampling, flushing and cache configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SystemError};
use crate::history::WINDOW_LENGTH;

/// Default sampling tick in milliseconds.
pub const DEFAULT_SAMPLE_INTERVAL_MS: u64 = 10_000;

/// Default persistence flush interval in milliseconds.
pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 60_000;

/// Configuration for the monitor's two timers and its caches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// How often a sampling tick fires
    pub sample_interval_ms: u64,
    /// How often the history is written to disk
    pub flush_interval_ms: u64,
    /// Number of day buckets; only 7 is accepted
    pub window_length: usize,
    /// File the rolling history is persisted to
    pub history_path: PathBuf,
    pub disk_ttl_ms: u64,
    pub process_ttl_ms: u64,
    pub temperature_ttl_ms: u64,
    /// Mount point (or drive label) of the disk to report
    pub disk_label: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: DEFAULT_SAMPLE_INTERVAL_MS,
            flush_interval_ms: DEFAULT_FLUSH_INTERVAL_MS,
            window_length: WINDOW_LENGTH,
            history_path: PathBuf::from("data").join("traffic-db.json"),
            disk_ttl_ms: 60_000,
            process_ttl_ms: 30_000,
            temperature_ttl_ms: 30_000,
            disk_label: "/".to_string(),
        }
    }
}

impl MonitorConfig {
    /// Set the sampling interval.
    pub fn with_sample_interval_ms(mut self, interval_ms: u64) -> Self {
        self.sample_interval_ms = interval_ms;
        self
    }

    /// Set the flush interval.
    pub fn with_flush_interval_ms(mut self, interval_ms: u64) -> Self {
        self.flush_interval_ms = interval_ms;
        self
    }

    /// Set the history file path.
    pub fn with_history_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.history_path = path.into();
        self
    }

    /// Set the disk to report.
    pub fn with_disk_label(mut self, label: impl Into<String>) -> Self {
        self.disk_label = label.into();
        self
    }

    /// Set the three cache TTLs.
    pub fn with_cache_ttls_ms(mut self, disk: u64, processes: u64, temperature: u64) -> Self {
        self.disk_ttl_ms = disk;
        self.process_ttl_ms = processes;
        self.temperature_ttl_ms = temperature;
        self
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    /// Reject settings the monitor cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.sample_interval_ms == 0 {
            return Err(SystemError::config_error("sample interval must be positive"));
        }
        if self.flush_interval_ms == 0 {
            return Err(SystemError::config_error("flush interval must be positive"));
        }
        if self.window_length != WINDOW_LENGTH {
            return Err(SystemError::config_error(format!(
                "window length is fixed at {WINDOW_LENGTH}, got {}",
                self.window_length
            )));
        }
        Ok(())
    }
}
