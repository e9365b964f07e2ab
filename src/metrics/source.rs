//! Capability interface for external metric collaborators.
//!
//! Each source wraps one OS-specific reading and reports either a value or an
//! error. How the value is obtained (syscall, `/proc`, subprocess, blocking
//! pool) stays behind the trait, so the aggregation core never sees it.

use async_trait::async_trait;

use crate::error::Result;
use crate::history::CpuTicks;
use crate::metrics::data::{DiskUsage, MemoryUsage, NetworkCounters, ProcessSummary, TemperatureInfo};

/// One external reading of type `T`.
#[async_trait]
pub trait SampleSource<T>: Send + Sync {
    /// Take one reading. Errors are recovered by the caller with a per-metric default.
    async fn sample(&self) -> Result<T>;
}

/// Static CPU facts that do not change between ticks.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CpuTopology {
    pub cores: u32,
    pub speed_ghz: f64,
}

/// The full set of collaborators a monitor samples from.
pub struct SampleSources {
    pub cpu_ticks: Box<dyn SampleSource<CpuTicks>>,
    pub cpu_topology: Box<dyn SampleSource<CpuTopology>>,
    pub memory: Box<dyn SampleSource<MemoryUsage>>,
    pub disk: Box<dyn SampleSource<DiskUsage>>,
    pub network: Box<dyn SampleSource<NetworkCounters>>,
    pub processes: Box<dyn SampleSource<ProcessSummary>>,
    pub temperature: Box<dyn SampleSource<TemperatureInfo>>,
}

#[async_trait]
impl<T, F> SampleSource<T> for F
where
    T: Send + 'static,
    F: Fn() -> Result<T> + Send + Sync,
{
    async fn sample(&self) -> Result<T> {
        self()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SystemError;

    #[tokio::test]
    async fn test_closures_are_sources() {
        let ok = || -> Result<NetworkCounters> {
            Ok(NetworkCounters {
                received: 10,
                sent: 20,
            })
        };
        assert_eq!(ok.sample().await.unwrap().sent, 20);

        let failing = || -> Result<DiskUsage> { Err(SystemError::collaborator_unavailable("df")) };
        let boxed: Box<dyn SampleSource<DiskUsage>> = Box::new(failing);
        assert!(boxed.sample().await.is_err());
    }
}
