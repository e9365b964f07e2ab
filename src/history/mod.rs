//! Time-series aggregation for the traffic history.
//!
//! Raw cumulative counters are turned into rates by [`delta`], folded into a
//! day-bucketed rolling window by [`store`], and written to durable storage by
//! [`persist`] so the window survives restarts and multi-day downtime.

pub mod delta;
pub mod persist;
pub mod store;

pub use delta::{
    cpu_usage_percent, rate, CounterSample, CpuTicks, RateMeasurement, RateTracker,
    BYTES_TO_MEGABITS,
};
pub use persist::{spawn_flush, HistoryStore, JsonFileStore, PersistedState};
pub use store::{floor_to_day, DayAccumulator, RollingHistory, DAY_MS, WINDOW_LENGTH};
