//! Durable storage for the rolling history.
//!
//! The on-disk record is a single JSON object:
//!
//! ```json
//! { "week": [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0], "dayStart": 1699920000000, "daySum": 0.0, "dayCount": 0 }
//! ```
//!
//! Loading never fails. A missing or unparsable file yields a fresh state, and
//! individual fields that are absent or invalid fall back to their fresh
//! defaults without discarding the rest of the record.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::store::{floor_to_day, WINDOW_LENGTH};
use crate::error::{Result, SystemError};

/// Largest count an `f64` JSON number represents exactly (2^53).
const MAX_EXACT_COUNT: f64 = 9_007_199_254_740_992.0;

/// Serialized form of the window and the day accumulator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    pub week: [f64; WINDOW_LENGTH],
    pub day_start: i64,
    pub day_sum: f64,
    pub day_count: u64,
}

impl PersistedState {
    /// Window of zeros and an empty accumulator for the day containing `now_ms`.
    pub fn fresh(now_ms: i64) -> Self {
        Self {
            week: [0.0; WINDOW_LENGTH],
            day_start: floor_to_day(now_ms),
            day_sum: 0.0,
            day_count: 0,
        }
    }

    /// Rebuild a state from an arbitrary JSON value, field by field.
    ///
    /// `week` must be an array of exactly [`WINDOW_LENGTH`] finite numbers or
    /// the whole window is reset. Every other field is validated on its own.
    /// `dayStart` must fall between the epoch and today; anything later would
    /// freeze the window until that day arrives.
    pub fn from_json_lenient(value: &Value, now_ms: i64) -> Self {
        let mut state = Self::fresh(now_ms);
        let Some(record) = value.as_object() else {
            warn!("Persisted history is not a JSON object, starting fresh");
            return state;
        };

        match record.get("week").and_then(parse_week) {
            Some(week) => state.week = week,
            None => warn!("Persisted week is missing or malformed, resetting window"),
        }

        let today = state.day_start;
        match record
            .get("dayStart")
            .and_then(finite_number)
            .filter(|start| (0.0..=today as f64).contains(start))
        {
            Some(day_start) => state.day_start = floor_to_day(day_start as i64),
            None if record.contains_key("dayStart") => {
                warn!("Persisted dayStart is out of range, using today")
            }
            None => {}
        }
        if let Some(day_sum) = record.get("daySum").and_then(finite_number) {
            state.day_sum = day_sum;
        }
        if let Some(day_count) = record
            .get("dayCount")
            .and_then(finite_number)
            .filter(|count| (0.0..=MAX_EXACT_COUNT).contains(count))
        {
            state.day_count = day_count as u64;
        }

        state
    }
}

fn finite_number(value: &Value) -> Option<f64> {
    value.as_f64().filter(|n| n.is_finite())
}

fn parse_week(value: &Value) -> Option<[f64; WINDOW_LENGTH]> {
    let items = value.as_array()?;
    if items.len() != WINDOW_LENGTH {
        return None;
    }
    let mut week = [0.0; WINDOW_LENGTH];
    for (slot, item) in week.iter_mut().zip(items) {
        *slot = finite_number(item)?;
    }
    Some(week)
}

/// Where the rolling history lives between process runs.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Load the stored state, or a fresh one for `now_ms` if there is nothing usable.
    async fn load(&self, now_ms: i64) -> PersistedState;

    /// Write `state`, replacing whatever was stored before.
    async fn save(&self, state: &PersistedState) -> Result<()>;
}

/// JSON file on local disk, replaced atomically on every save.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl HistoryStore for JsonFileStore {
    async fn load(&self, now_ms: i64) -> PersistedState {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No persisted history at {:?}, starting fresh", self.path);
                return PersistedState::fresh(now_ms);
            }
            Err(e) => {
                warn!("Failed to read persisted history {:?}: {}", self.path, e);
                return PersistedState::fresh(now_ms);
            }
        };

        match serde_json::from_str::<Value>(&contents) {
            Ok(value) => PersistedState::from_json_lenient(&value, now_ms),
            Err(e) => {
                warn!("Persisted history {:?} is not valid JSON: {}", self.path, e);
                PersistedState::fresh(now_ms)
            }
        }
    }

    async fn save(&self, state: &PersistedState) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let payload = serde_json::to_vec(state)?;
        let temp_path = self.temp_path();
        tokio::fs::write(&temp_path, payload).await?;
        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| {
                SystemError::persistence_error(format!(
                    "Failed to replace {:?}: {}",
                    self.path, e
                ))
            })?;

        debug!("Flushed traffic history to {:?}", self.path);
        Ok(())
    }
}

/// Save `state` on a detached task. Failures are logged and otherwise ignored;
/// the next flush supersedes a lost one.
pub fn spawn_flush<S>(store: std::sync::Arc<S>, state: PersistedState) -> tokio::task::JoinHandle<()>
where
    S: HistoryStore + ?Sized + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = store.save(&state).await {
            warn!("Traffic history flush failed: {}", e);
        }
    })
}
