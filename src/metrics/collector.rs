//! OS-backed sample sources using sysinfo and direct /proc and /sys access.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sysinfo::{Disks, Networks, ProcessRefreshKind, RefreshKind, System};
use tokio::process::Command;

use crate::error::{Result, SystemError};
use crate::history::CpuTicks;
use crate::metrics::data::{
    DiskUsage, MemoryUsage, NetworkCounters, ProcessSummary, TemperatureInfo, TopProcess,
    TOP_PROCESS_COUNT,
};
use crate::metrics::source::{CpuTopology, SampleSource, SampleSources};

const PROC_STAT: &str = "/proc/stat";
const THERMAL_ROOT: &str = "/sys/class/thermal";
const LOOPBACK: &str = "lo";

fn lossy<S: AsRef<OsStr> + ?Sized>(value: &S) -> String {
    value.as_ref().to_string_lossy().into_owned()
}

fn lock_system(system: &Mutex<System>) -> Result<std::sync::MutexGuard<'_, System>> {
    system
        .lock()
        .map_err(|_| SystemError::system_error("sysinfo state lock poisoned"))
}

/// Build the standard set of sources for this host.
///
/// The process scan owns its own `System` so the memory and topology reads
/// never wait behind it.
pub fn default_sources(disk_label: impl Into<String>) -> SampleSources {
    let system = Arc::new(Mutex::new(System::new_all()));
    SampleSources {
        cpu_ticks: Box::new(ProcStatSource::default()),
        cpu_topology: Box::new(CpuTopologySource::new(system.clone())),
        memory: Box::new(MemorySource::new(system)),
        disk: Box::new(DiskSource::new(disk_label)),
        network: Box::new(NetworkSource::new()),
        processes: Box::new(ProcessSource::new()),
        temperature: Box::new(TemperatureSource::default()),
    }
}

/// Aggregate CPU tick counters from `/proc/stat`.
#[derive(Debug, Clone)]
pub struct ProcStatSource {
    path: PathBuf,
}

impl Default for ProcStatSource {
    fn default() -> Self {
        Self {
            path: PathBuf::from(PROC_STAT),
        }
    }
}

impl ProcStatSource {
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

/// Parse the aggregate `cpu` line of `/proc/stat`.
///
/// Idle time includes iowait, total is the sum of every column.
pub fn parse_proc_stat(contents: &str) -> Result<CpuTicks> {
    let line = contents
        .lines()
        .find(|line| line.split_whitespace().next() == Some("cpu"))
        .ok_or_else(|| SystemError::parse_error("no aggregate cpu line in /proc/stat"))?;

    let fields = line
        .split_whitespace()
        .skip(1)
        .map(|field| {
            field
                .parse::<u64>()
                .map_err(|e| SystemError::parse_error(format!("bad /proc/stat field {field:?}: {e}")))
        })
        .collect::<Result<Vec<u64>>>()?;

    if fields.len() < 4 {
        return Err(SystemError::parse_error("too few columns in /proc/stat cpu line"));
    }

    let idle = fields[3] + fields.get(4).copied().unwrap_or(0);
    let total = fields.iter().sum();
    Ok(CpuTicks { idle, total })
}

#[async_trait]
impl SampleSource<CpuTicks> for ProcStatSource {
    async fn sample(&self) -> Result<CpuTicks> {
        let contents = tokio::fs::read_to_string(&self.path).await?;
        parse_proc_stat(&contents)
    }
}

/// Core count and nominal clock speed.
pub struct CpuTopologySource {
    system: Arc<Mutex<System>>,
}

impl CpuTopologySource {
    pub fn new(system: Arc<Mutex<System>>) -> Self {
        Self { system }
    }
}

#[async_trait]
impl SampleSource<CpuTopology> for CpuTopologySource {
    async fn sample(&self) -> Result<CpuTopology> {
        let system = lock_system(&self.system)?;
        let cpus = system.cpus();
        if cpus.is_empty() {
            return Err(SystemError::collaborator_unavailable("No CPU information available"));
        }

        Ok(CpuTopology {
            cores: cpus.len() as u32,
            speed_ghz: cpus[0].frequency() as f64 / 1000.0,
        })
    }
}

/// Physical memory usage.
pub struct MemorySource {
    system: Arc<Mutex<System>>,
}

impl MemorySource {
    pub fn new(system: Arc<Mutex<System>>) -> Self {
        Self { system }
    }
}

#[async_trait]
impl SampleSource<MemoryUsage> for MemorySource {
    async fn sample(&self) -> Result<MemoryUsage> {
        let mut system = lock_system(&self.system)?;
        system.refresh_memory();

        let total = system.total_memory();
        let free = system.available_memory();
        Ok(MemoryUsage {
            total,
            used: total.saturating_sub(free),
            free,
        })
    }
}

/// Usage of the disk mounted at `label`, or the first disk if none matches.
pub struct DiskSource {
    label: String,
}

impl DiskSource {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

#[async_trait]
impl SampleSource<DiskUsage> for DiskSource {
    async fn sample(&self) -> Result<DiskUsage> {
        let label = self.label.clone();
        tokio::task::spawn_blocking(move || -> Result<DiskUsage> {
            let disks = Disks::new_with_refreshed_list();
            let disk = disks
                .iter()
                .find(|disk| disk.mount_point() == Path::new(&label))
                .or_else(|| disks.iter().next())
                .ok_or_else(|| SystemError::collaborator_unavailable("no disks reported"))?;

            let size = disk.total_space();
            let free = disk.available_space();
            Ok(DiskUsage {
                size,
                free,
                used: size.saturating_sub(free),
            })
        })
        .await
        .map_err(|e| SystemError::system_error(format!("disk task failed: {e}")))?
    }
}

/// Cumulative received/sent bytes over all interfaces except loopback.
pub struct NetworkSource {
    networks: Mutex<Networks>,
}

impl NetworkSource {
    pub fn new() -> Self {
        Self {
            networks: Mutex::new(Networks::new_with_refreshed_list()),
        }
    }
}

impl Default for NetworkSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SampleSource<NetworkCounters> for NetworkSource {
    async fn sample(&self) -> Result<NetworkCounters> {
        let mut networks = self
            .networks
            .lock()
            .map_err(|_| SystemError::system_error("network state lock poisoned"))?;
        networks.refresh();

        let counters = networks
            .iter()
            .filter(|(name, _)| name.as_str() != LOOPBACK)
            .fold(NetworkCounters::default(), |acc, (_, data)| NetworkCounters {
                received: acc.received + data.total_received(),
                sent: acc.sent + data.total_transmitted(),
            });
        Ok(counters)
    }
}

/// Process count and the top CPU consumers.
pub struct ProcessSource {
    system: Arc<Mutex<System>>,
}

impl ProcessSource {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_specifics(process_refresh());
        Self {
            system: Arc::new(Mutex::new(system)),
        }
    }
}

impl Default for ProcessSource {
    fn default() -> Self {
        Self::new()
    }
}

fn process_refresh() -> RefreshKind {
    RefreshKind::new().with_processes(ProcessRefreshKind::everything())
}

#[async_trait]
impl SampleSource<ProcessSummary> for ProcessSource {
    async fn sample(&self) -> Result<ProcessSummary> {
        let system = self.system.clone();
        tokio::task::spawn_blocking(move || -> Result<ProcessSummary> {
            let mut system = lock_system(&system)?;
            system.refresh_specifics(process_refresh());

            let mut processes: Vec<(String, f32)> = system
                .processes()
                .values()
                .map(|process| (lossy(process.name()), process.cpu_usage()))
                .collect();
            let total = processes.len() as u64;

            processes.sort_by(|a, b| b.1.total_cmp(&a.1));
            let top = processes
                .into_iter()
                .take(TOP_PROCESS_COUNT)
                .map(|(name, cpu)| TopProcess::new(name, cpu as f64))
                .collect();

            Ok(ProcessSummary::new(total, top))
        })
        .await
        .map_err(|e| SystemError::system_error(format!("process task failed: {e}")))?
    }
}

/// First readable thermal zone, then `sensors -u`.
#[derive(Debug, Clone)]
pub struct TemperatureSource {
    thermal_root: PathBuf,
}

impl Default for TemperatureSource {
    fn default() -> Self {
        Self {
            thermal_root: PathBuf::from(THERMAL_ROOT),
        }
    }
}

impl TemperatureSource {
    pub fn with_thermal_root(root: impl Into<PathBuf>) -> Self {
        Self {
            thermal_root: root.into(),
        }
    }

    fn read_thermal_zones(&self) -> Option<f64> {
        (0..10).find_map(|zone| {
            let path = self.thermal_root.join(format!("thermal_zone{zone}")).join("temp");
            let millicelsius = fs::read_to_string(path).ok()?.trim().parse::<f64>().ok()?;
            Some(millicelsius / 1000.0).filter(|c| c.is_finite())
        })
    }

    async fn read_lm_sensors(&self) -> Result<f64> {
        let output = Command::new("sensors").arg("-u").output().await?;
        if !output.status.success() {
            return Err(SystemError::collaborator_unavailable("sensors exited with an error"));
        }
        parse_sensors_output(&String::from_utf8_lossy(&output.stdout))
            .ok_or_else(|| SystemError::collaborator_unavailable("no temperature in sensors output"))
    }
}

/// First `tempN_input: <value>` entry of `sensors -u` output.
pub fn parse_sensors_output(output: &str) -> Option<f64> {
    output.lines().find_map(|line| {
        let (key, value) = line.trim().split_once(':')?;
        let is_temp_input = key
            .strip_prefix("temp")
            .and_then(|rest| rest.strip_suffix("_input"))
            .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()));
        if !is_temp_input {
            return None;
        }
        value.trim().parse::<f64>().ok().filter(|c| c.is_finite())
    })
}

#[async_trait]
impl SampleSource<TemperatureInfo> for TemperatureSource {
    async fn sample(&self) -> Result<TemperatureInfo> {
        if let Some(celsius) = self.read_thermal_zones() {
            return Ok(TemperatureInfo::celsius(celsius));
        }
        let celsius = self.read_lm_sensors().await?;
        Ok(TemperatureInfo::celsius(celsius))
    }
}
