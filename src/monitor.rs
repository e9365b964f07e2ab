//! The sampling scheduler.
//!
//! A [`Monitor`] owns every piece of mutable state (caches, counter baselines,
//! the rolling history) and is driven from a single task by two timers: a fast
//! sampling tick and a slower persistence flush. Because only that task mutates
//! the history, no lock is needed around it.
//!
//! Collaborator calls within one tick run concurrently and settle
//! independently; a failing or slow collaborator only affects its own field.
//! There is no timeout on a collaborator call, so a hung call delays the tick
//! it belongs to.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::MonitorConfig;
use crate::error::Result;
use crate::history::{
    cpu_usage_percent, spawn_flush, CounterSample, CpuTicks, HistoryStore, RateTracker,
    RollingHistory, BYTES_TO_MEGABITS,
};
use crate::metrics::cache::MetricCaches;
use crate::metrics::data::{
    CpuInfo, DiskInfo, MemoryInfo, NetworkRates, SystemSnapshot, TrafficHistory,
};
use crate::metrics::source::SampleSources;

/// Receiving end for published snapshots.
pub type SnapshotReceiver = watch::Receiver<Arc<SystemSnapshot>>;

/// Scheduler context: sources, caches, baselines and history.
pub struct Monitor {
    config: MonitorConfig,
    sources: SampleSources,
    caches: MetricCaches,
    cpu_previous: Option<CpuTicks>,
    download: RateTracker,
    upload: RateTracker,
    history: RollingHistory,
    store: Arc<dyn HistoryStore>,
    publisher: watch::Sender<Arc<SystemSnapshot>>,
}

impl Monitor {
    /// Load the persisted history, bring it up to today and take the CPU baseline.
    pub async fn start(
        config: MonitorConfig,
        sources: SampleSources,
        store: Arc<dyn HistoryStore>,
    ) -> Result<Self> {
        config.validate()?;
        let now_ms = Utc::now().timestamp_millis();

        let state = store.load(now_ms).await;
        let mut history = RollingHistory::from_persisted(&state);
        let rolled = history.reconcile(now_ms);
        info!(
            days_rolled = rolled,
            week = ?history.snapshot(),
            "Loaded traffic history"
        );

        let cpu_previous = match sources.cpu_ticks.sample().await {
            Ok(ticks) => Some(ticks),
            Err(e) => {
                warn!("Initial CPU sample failed: {}", e);
                None
            }
        };
        let cores = sources
            .cpu_topology
            .sample()
            .await
            .map(|topology| topology.cores)
            .unwrap_or_default();

        let placeholder =
            SystemSnapshot::placeholder(now_ms, cores, &config.disk_label, history.snapshot());
        let (publisher, _) = watch::channel(Arc::new(placeholder));

        let caches = MetricCaches::new(
            std::time::Duration::from_millis(config.disk_ttl_ms),
            std::time::Duration::from_millis(config.process_ttl_ms),
            std::time::Duration::from_millis(config.temperature_ttl_ms),
        );

        Ok(Self {
            config,
            sources,
            caches,
            cpu_previous,
            download: RateTracker::new(BYTES_TO_MEGABITS),
            upload: RateTracker::new(BYTES_TO_MEGABITS),
            history,
            store,
            publisher,
        })
    }

    /// Subscribe to published snapshots.
    pub fn subscribe(&self) -> SnapshotReceiver {
        self.publisher.subscribe()
    }

    /// The most recently published snapshot.
    pub fn latest(&self) -> Arc<SystemSnapshot> {
        self.publisher.borrow().clone()
    }

    pub fn history(&self) -> &RollingHistory {
        &self.history
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Run one sampling cycle and publish the composed snapshot.
    ///
    /// `now_wall` drives rates and day buckets; `now` drives cache expiry.
    pub async fn tick(&mut self, now_wall: DateTime<Utc>, now: Instant) -> Arc<SystemSnapshot> {
        let sources = &self.sources;
        let caches = &self.caches;

        let (cpu_ticks, topology, memory, disk, network, processes, temperature) = futures_util::join!(
            sources.cpu_ticks.sample(),
            sources.cpu_topology.sample(),
            sources.memory.sample(),
            caches.disk.get_or_refresh(now, || sources.disk.sample()),
            sources.network.sample(),
            caches.processes.get_or_refresh(now, || sources.processes.sample()),
            caches.temperature.get_or_refresh(now, || sources.temperature.sample()),
        );

        let cpu_percent = match cpu_ticks {
            Ok(current) => {
                let percent = self
                    .cpu_previous
                    .map(|previous| cpu_usage_percent(&previous, &current))
                    .unwrap_or(0.0);
                self.cpu_previous = Some(current);
                percent
            }
            Err(e) => {
                warn!("CPU counters unavailable: {}", e);
                0.0
            }
        };

        let topology = topology.unwrap_or_else(|e| {
            warn!("CPU topology unavailable: {}", e);
            Default::default()
        });

        let memory = memory.unwrap_or_else(|e| {
            warn!("Memory usage unavailable: {}", e);
            Default::default()
        });

        let network = match network {
            Ok(counters) => NetworkRates {
                down_mbps: self
                    .download
                    .observe(CounterSample::new(counters.received as f64, now_wall))
                    .value(),
                up_mbps: self
                    .upload
                    .observe(CounterSample::new(counters.sent as f64, now_wall))
                    .value(),
            },
            Err(e) => {
                warn!("Network counters unavailable: {}", e);
                NetworkRates::default()
            }
        };

        self.history
            .record_at(now_wall.timestamp_millis(), network.down_mbps);

        let snapshot = Arc::new(SystemSnapshot {
            timestamp: now_wall.timestamp_millis(),
            cpu: CpuInfo {
                percent: cpu_percent,
                cores: topology.cores,
                speed_ghz: topology.speed_ghz,
            },
            memory: MemoryInfo::from_usage(&memory),
            disk: DiskInfo::from_usage(&self.config.disk_label, &disk),
            network,
            processes,
            temperature,
            traffic_history: TrafficHistory {
                week: self.history.snapshot(),
            },
        });

        debug!(
            cpu = cpu_percent,
            down_mbps = network.down_mbps,
            up_mbps = network.up_mbps,
            "Published snapshot"
        );
        self.publisher.send_replace(snapshot.clone());
        snapshot
    }

    /// Write the current history on a background task that nobody awaits.
    pub fn flush(&self) -> JoinHandle<()> {
        spawn_flush(self.store.clone(), self.history.to_persisted())
    }

    /// Write the current history and wait for the result.
    pub async fn flush_now(&self) -> Result<()> {
        self.store.save(&self.history.to_persisted()).await
    }

    /// Drive sampling and flushing until `shutdown` resolves, then flush once more.
    pub async fn run<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut sample_timer = time::interval(self.config.sample_interval());
        sample_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let flush_interval = self.config.flush_interval();
        let mut flush_timer = time::interval_at(time::Instant::now() + flush_interval, flush_interval);
        flush_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            sample_interval_ms = self.config.sample_interval_ms,
            flush_interval_ms = self.config.flush_interval_ms,
            "Monitor running"
        );

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = sample_timer.tick() => {
                    self.tick(Utc::now(), Instant::now()).await;
                }
                _ = flush_timer.tick() => {
                    self.flush();
                }
            }
        }

        info!("Monitor stopping, flushing traffic history");
        if let Err(e) = self.flush_now().await {
            warn!("Final traffic history flush failed: {}", e);
        }
    }
}
