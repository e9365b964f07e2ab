//! Time-to-live caches for the expensive collaborators.
//!
//! Each metric kind owns an independent [`TtlCache`] slot with its own TTL. A
//! failed refresh returns the kind's "unavailable" value and leaves the slot
//! untouched, so the next tick tries again instead of waiting out the TTL.

use std::fmt;
use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::Result;
use crate::metrics::data::{DiskUsage, ProcessSummary, TemperatureInfo};

/// Which metric a cache slot holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKind {
    Disk,
    Processes,
    Temperature,
}

impl fmt::Display for CacheKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CacheKind::Disk => "disk",
            CacheKind::Processes => "processes",
            CacheKind::Temperature => "temperature",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
struct CachedEntry<T> {
    value: T,
    refreshed_at: Instant,
}

/// A single cached value that expires `ttl` after its last successful refresh.
///
/// The slot is behind a mutex that is never held across an `.await`, so
/// overlapping refreshes are allowed; whichever completes last wins.
#[derive(Debug)]
pub struct TtlCache<T> {
    kind: CacheKind,
    ttl: Duration,
    unavailable: T,
    entry: Mutex<Option<CachedEntry<T>>>,
}

impl<T: Clone> TtlCache<T> {
    /// Create an empty slot; `unavailable` is returned whenever a refresh fails.
    pub fn new(kind: CacheKind, ttl: Duration, unavailable: T) -> Self {
        Self {
            kind,
            ttl,
            unavailable,
            entry: Mutex::new(None),
        }
    }

    pub fn kind(&self) -> CacheKind {
        self.kind
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The cached value if it is still fresh at `now`.
    pub fn get(&self, now: Instant) -> Option<T> {
        let guard = self.entry.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard
            .as_ref()
            .filter(|entry| now.saturating_duration_since(entry.refreshed_at) < self.ttl)
            .map(|entry| entry.value.clone())
    }

    /// Return the cached value, or run `compute` and cache its result.
    ///
    /// On failure the kind's unavailable value is returned, not the stale one,
    /// and the refresh timestamp is not touched.
    pub async fn get_or_refresh<F, Fut>(&self, now: Instant, compute: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(value) = self.get(now) {
            debug!(kind = %self.kind, "Cache hit");
            return value;
        }

        match compute().await {
            Ok(value) => {
                let mut guard = self.entry.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                *guard = Some(CachedEntry {
                    value: value.clone(),
                    refreshed_at: now,
                });
                value
            }
            Err(e) => {
                warn!(kind = %self.kind, "Refresh failed, using unavailable default: {}", e);
                self.unavailable.clone()
            }
        }
    }

    /// Drop the cached value.
    pub fn invalidate(&self) {
        let mut guard = self.entry.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = None;
    }
}

/// The three independent cache slots used by the monitor.
#[derive(Debug)]
pub struct MetricCaches {
    pub disk: TtlCache<DiskUsage>,
    pub processes: TtlCache<ProcessSummary>,
    pub temperature: TtlCache<TemperatureInfo>,
}

impl MetricCaches {
    pub fn new(disk_ttl: Duration, process_ttl: Duration, temperature_ttl: Duration) -> Self {
        Self {
            disk: TtlCache::new(CacheKind::Disk, disk_ttl, DiskUsage::default()),
            processes: TtlCache::new(CacheKind::Processes, process_ttl, ProcessSummary::unavailable()),
            temperature: TtlCache::new(
                CacheKind::Temperature,
                temperature_ttl,
                TemperatureInfo::unavailable(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SystemError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn disk(size: u64) -> DiskUsage {
        DiskUsage {
            size,
            free: size / 2,
            used: size / 2,
        }
    }

    #[tokio::test]
    async fn test_hit_within_ttl_skips_collaborator() {
        let cache = TtlCache::new(CacheKind::Disk, Duration::from_secs(60), DiskUsage::default());
        let calls = AtomicUsize::new(0);
        let start = Instant::now();

        let compute = || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(disk(100))
        };
        assert_eq!(cache.get_or_refresh(start, compute).await, disk(100));

        let compute = || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(disk(200))
        };
        let later = start + Duration::from_secs(59);
        assert_eq!(cache.get_or_refresh(later, compute).await, disk(100));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expired_entry_is_refreshed() {
        let cache = TtlCache::new(CacheKind::Disk, Duration::from_secs(60), DiskUsage::default());
        let start = Instant::now();
        cache.get_or_refresh(start, || async { Ok(disk(100)) }).await;

        let expired = start + Duration::from_secs(60);
        assert_eq!(cache.get_or_refresh(expired, || async { Ok(disk(300)) }).await, disk(300));
    }

    #[tokio::test]
    async fn test_failure_returns_unavailable_and_retries_next_time() {
        let cache = TtlCache::new(
            CacheKind::Temperature,
            Duration::from_secs(30),
            TemperatureInfo::unavailable(),
        );
        let start = Instant::now();
        cache
            .get_or_refresh(start, || async { Ok(TemperatureInfo::celsius(50.0)) })
            .await;

        let expired = start + Duration::from_secs(31);
        let failed = cache
            .get_or_refresh(expired, || async {
                Err(SystemError::collaborator_unavailable("no sensors"))
            })
            .await;
        assert_eq!(failed, TemperatureInfo::unavailable());
        assert!(cache.get(expired).is_none());

        // Retried on the very next call, one second later
        let retry = expired + Duration::from_secs(1);
        let value = cache
            .get_or_refresh(retry, || async { Ok(TemperatureInfo::celsius(48.0)) })
            .await;
        assert_eq!(value.celsius, Some(48.0));
    }

    #[tokio::test]
    async fn test_slots_are_independent() {
        let caches = MetricCaches::new(
            Duration::from_secs(60),
            Duration::from_secs(30),
            Duration::from_secs(30),
        );
        let start = Instant::now();
        caches.disk.get_or_refresh(start, || async { Ok(disk(1)) }).await;

        assert!(caches.disk.get(start).is_some());
        assert!(caches.processes.get(start).is_none());
        assert!(caches.temperature.get(start).is_none());

        caches.disk.invalidate();
        assert!(caches.disk.get(start).is_none());
    }

    #[tokio::test]
    async fn test_overlapping_refreshes_last_completion_wins() {
        let cache = TtlCache::new(CacheKind::Processes, Duration::from_secs(30), ProcessSummary::unavailable());
        let start = Instant::now();
        let (slow_tx, slow_rx) = tokio::sync::oneshot::channel::<()>();

        let slow = cache.get_or_refresh(start, || async move {
            let _ = slow_rx.await;
            Ok(ProcessSummary::new(1, Vec::new()))
        });
        let fast = async {
            let value = cache
                .get_or_refresh(start, || async { Ok(ProcessSummary::new(2, Vec::new())) })
                .await;
            let _ = slow_tx.send(());
            value
        };

        let (slow_value, fast_value) = tokio::join!(slow, fast);
        assert_eq!(slow_value.total, 1);
        assert_eq!(fast_value.total, 2);
        assert_eq!(cache.get(start).map(|p| p.total), Some(1));
    }
}
