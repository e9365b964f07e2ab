//! Rate derivation from consecutive cumulative counter samples.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Multiplier turning a byte count into megabits.
pub const BYTES_TO_MEGABITS: f64 = 8.0 / 1e6;

/// Elapsed time floor used when two samples are closer than a second apart.
pub const DEFAULT_MIN_ELAPSED_SECS: f64 = 1.0;

/// One reading of a monotonically increasing counter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CounterSample {
    /// Counter value since the counter was last reset
    pub cumulative_value: f64,
    /// Wall-clock time the value was read
    pub captured_at: DateTime<Utc>,
}

impl CounterSample {
    pub fn new(cumulative_value: f64, captured_at: DateTime<Utc>) -> Self {
        Self {
            cumulative_value,
            captured_at,
        }
    }
}

/// A non-negative rate. The unit is whatever the caller's `scale` produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct RateMeasurement(f64);

impl RateMeasurement {
    pub const ZERO: Self = Self(0.0);

    /// Wrap a raw value, clamping negatives and non-finite values to zero.
    pub fn new(value: f64) -> Self {
        if value.is_finite() && value > 0.0 {
            Self(value)
        } else {
            Self::ZERO
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

/// Derive a rate from two consecutive samples of the same counter.
///
/// Returns zero when there is no `previous` baseline. A counter that went
/// backwards (interface restart, wraparound) yields zero instead of a negative
/// rate. Elapsed time is floored at `min_elapsed_secs` so that sub-second ticks
/// cannot blow the result up.
pub fn rate(
    previous: Option<&CounterSample>,
    current: &CounterSample,
    scale: f64,
    min_elapsed_secs: f64,
) -> RateMeasurement {
    let Some(previous) = previous else {
        return RateMeasurement::ZERO;
    };

    let elapsed_ms = (current.captured_at - previous.captured_at).num_milliseconds();
    let elapsed = (elapsed_ms as f64 / 1000.0).max(min_elapsed_secs);
    let delta = (current.cumulative_value - previous.cumulative_value).max(0.0);

    RateMeasurement::new(delta * scale / elapsed)
}

/// Remembers the last sample of one counter so each tick only supplies the new one.
#[derive(Debug, Clone)]
pub struct RateTracker {
    previous: Option<CounterSample>,
    scale: f64,
    min_elapsed_secs: f64,
}

impl RateTracker {
    pub fn new(scale: f64) -> Self {
        Self {
            previous: None,
            scale,
            min_elapsed_secs: DEFAULT_MIN_ELAPSED_SECS,
        }
    }

    pub fn with_min_elapsed_secs(mut self, min_elapsed_secs: f64) -> Self {
        self.min_elapsed_secs = min_elapsed_secs;
        self
    }

    /// Compute the rate against the remembered sample, then remember `current`.
    pub fn observe(&mut self, current: CounterSample) -> RateMeasurement {
        let measured = rate(
            self.previous.as_ref(),
            &current,
            self.scale,
            self.min_elapsed_secs,
        );
        self.previous = Some(current);
        measured
    }

    /// Forget the baseline, e.g. after the collaborator failed.
    pub fn reset(&mut self) {
        self.previous = None;
    }

    pub fn previous(&self) -> Option<&CounterSample> {
        self.previous.as_ref()
    }
}

/// Cumulative CPU time counters summed across all cores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuTicks {
    pub idle: u64,
    pub total: u64,
}

/// CPU busy percentage between two tick readings, clamped to `0..=100`.
pub fn cpu_usage_percent(previous: &CpuTicks, current: &CpuTicks) -> f64 {
    let total_delta = current.total as f64 - previous.total as f64;
    if total_delta <= 0.0 {
        return 0.0;
    }
    let idle_delta = current.idle as f64 - previous.idle as f64;
    let usage = (1.0 - idle_delta / total_delta) * 100.0;
    if usage.is_finite() {
        usage.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_no_previous_sample_is_zero() {
        let current = CounterSample::new(5_000.0, at(0));
        assert_eq!(rate(None, &current, 1.0, 1.0), RateMeasurement::ZERO);
    }

    #[test]
    fn test_megabit_conversion() {
        let previous = CounterSample::new(1000.0, at(0));
        let current = CounterSample::new(1400.0, at(10));
        let measured = rate(Some(&previous), &current, BYTES_TO_MEGABITS, 1.0);
        assert!((measured.value() - 0.00032).abs() < 1e-12);
    }

    #[test]
    fn test_counter_reset_never_negative() {
        let previous = CounterSample::new(9_000.0, at(0));
        let current = CounterSample::new(10.0, at(10));
        assert_eq!(rate(Some(&previous), &current, 1.0, 1.0).value(), 0.0);
    }

    #[test]
    fn test_sub_second_elapsed_is_floored() {
        let previous = CounterSample::new(0.0, at(0));
        let current = CounterSample::new(100.0, at(0) + Duration::milliseconds(200));
        assert_eq!(rate(Some(&previous), &current, 1.0, 1.0).value(), 100.0);
    }

    #[test]
    fn test_clock_going_backwards_uses_floor() {
        let previous = CounterSample::new(0.0, at(10));
        let current = CounterSample::new(50.0, at(0));
        assert_eq!(rate(Some(&previous), &current, 1.0, 1.0).value(), 50.0);
    }

    #[test]
    fn test_tracker_remembers_previous() {
        let mut tracker = RateTracker::new(1.0);
        assert_eq!(tracker.observe(CounterSample::new(100.0, at(0))).value(), 0.0);
        assert_eq!(tracker.observe(CounterSample::new(300.0, at(10))).value(), 20.0);
        assert_eq!(tracker.previous().map(|s| s.cumulative_value), Some(300.0));

        tracker.reset();
        assert!(tracker.previous().is_none());
    }

    #[test]
    fn test_cpu_usage_percent() {
        let previous = CpuTicks { idle: 100, total: 200 };
        let current = CpuTicks { idle: 150, total: 400 };
        assert!((cpu_usage_percent(&previous, &current) - 75.0).abs() < 1e-9);

        // No progress in the counters
        assert_eq!(cpu_usage_percent(&current, &current), 0.0);

        // Idle grew faster than total after a counter reset
        let odd = CpuTicks { idle: 1_000, total: 450 };
        assert_eq!(cpu_usage_percent(&current, &odd), 0.0);
    }
}
