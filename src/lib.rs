//! # trafficdash - system dashboard with a 7-day traffic history
//!
//! Samples CPU, memory, disk, network, process and temperature readings on a
//! fixed tick and serves the latest composed snapshot to a browser dashboard.
//!
//! The interesting part is the history engine: cumulative network byte
//! counters become download rates, the rates are folded into a running daily
//! mean, and the last seven daily means are kept in a rolling window that is
//! persisted to disk and survives restarts and multi-day downtime.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use trafficdash::{default_sources, start_web_server, JsonFileStore, Monitor, MonitorConfig, WebConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = MonitorConfig::default();
//!     let store = Arc::new(JsonFileStore::new(&config.history_path));
//!     let sources = default_sources(config.disk_label.clone());
//!     let monitor = Monitor::start(config, sources, store).await?;
//!
//!     let snapshots = monitor.subscribe();
//!     tokio::spawn(monitor.run(std::future::pending()));
//!     start_web_server(WebConfig::default(), snapshots, std::future::pending()).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod history;
pub mod metrics;
pub mod monitor;
pub mod web;

// Re-export public API
pub use config::{MonitorConfig, DEFAULT_FLUSH_INTERVAL_MS, DEFAULT_SAMPLE_INTERVAL_MS};
pub use error::{Result, SystemError};
pub use history::{
    CounterSample, DayAccumulator, HistoryStore, JsonFileStore, PersistedState, RateMeasurement,
    RollingHistory, WINDOW_LENGTH,
};
pub use metrics::{
    data::{CpuInfo, DiskInfo, MemoryInfo, NetworkRates, ProcessSummary, TemperatureInfo},
    default_sources, SampleSource, SampleSources, SystemSnapshot,
};
pub use monitor::{Monitor, SnapshotReceiver};
pub use web::{start_web_server, WebConfig};

/// The default web server port
pub const DEFAULT_WEB_PORT: u16 = 8080;
