//! Day-bucketed rolling history of an aggregated rate.
//!
//! The window holds [`WINDOW_LENGTH`] daily means, oldest first. The last slot
//! is the live mean of the day in progress and is rewritten on every
//! [`RollingHistory::record`]; it only becomes a finished value when the day
//! rolls over and [`RollingHistory::reconcile`] shifts it left.

use serde::{Deserialize, Serialize};
use tracing::info;

use super::persist::PersistedState;

/// Number of day buckets kept in the window.
pub const WINDOW_LENGTH: usize = 7;

/// Length of one day bucket in milliseconds.
pub const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Floor an epoch-millisecond timestamp to the start of its UTC day.
///
/// Saturates at `i64::MIN` instead of overflowing.
pub fn floor_to_day(ts_ms: i64) -> i64 {
    ts_ms.saturating_sub(ts_ms.rem_euclid(DAY_MS))
}

/// Running mean of the rate across the current, unfinished day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DayAccumulator {
    /// Epoch milliseconds of the day boundary this accumulator belongs to
    pub day_start: i64,
    pub sum: f64,
    pub count: u64,
}

impl DayAccumulator {
    /// An empty accumulator for the day containing `now_ms`.
    pub fn starting_at(now_ms: i64) -> Self {
        Self {
            day_start: floor_to_day(now_ms),
            sum: 0.0,
            count: 0,
        }
    }

    pub fn mean(&self) -> f64 {
        if self.count > 0 {
            self.sum / self.count as f64
        } else {
            0.0
        }
    }
}

/// The 7-slot window plus the accumulator feeding its last slot.
#[derive(Debug, Clone, PartialEq)]
pub struct RollingHistory {
    window: [f64; WINDOW_LENGTH],
    accumulator: DayAccumulator,
}

impl RollingHistory {
    /// A window of zeros with an empty accumulator for today.
    pub fn new(now_ms: i64) -> Self {
        Self {
            window: [0.0; WINDOW_LENGTH],
            accumulator: DayAccumulator::starting_at(now_ms),
        }
    }

    pub fn from_parts(window: [f64; WINDOW_LENGTH], accumulator: DayAccumulator) -> Self {
        Self {
            window,
            accumulator,
        }
    }

    pub fn from_persisted(state: &PersistedState) -> Self {
        Self::from_parts(
            state.week,
            DayAccumulator {
                day_start: state.day_start,
                sum: state.day_sum,
                count: state.day_count,
            },
        )
    }

    pub fn to_persisted(&self) -> PersistedState {
        PersistedState {
            week: self.window,
            day_start: self.accumulator.day_start,
            day_sum: self.accumulator.sum,
            day_count: self.accumulator.count,
        }
    }

    /// Bring the window up to the day containing `now_ms`.
    ///
    /// Returns the number of whole days that elapsed since the last
    /// reconciliation; zero means nothing changed. Repeated calls within the
    /// same day are no-ops. A clock that went backwards is treated as the
    /// same day.
    pub fn reconcile(&mut self, now_ms: i64) -> u64 {
        let current_day = floor_to_day(now_ms);
        if current_day <= self.accumulator.day_start {
            return 0;
        }

        let days_elapsed =
            (current_day.saturating_sub(self.accumulator.day_start) / DAY_MS) as u64;
        let shift = days_elapsed.min(WINDOW_LENGTH as u64) as usize;
        self.window.rotate_left(shift);
        self.window[WINDOW_LENGTH - shift..].fill(0.0);
        self.accumulator = DayAccumulator::starting_at(now_ms);

        info!(
            days_elapsed,
            day_start = current_day,
            "Traffic history rolled over to a new day"
        );
        days_elapsed
    }

    /// Fold one rate into today's mean and publish it in the last slot.
    ///
    /// Non-finite rates are counted as zero.
    pub fn record(&mut self, rate: f64) {
        let rate = if rate.is_finite() { rate } else { 0.0 };
        self.accumulator.sum += rate;
        self.accumulator.count = self.accumulator.count.saturating_add(1);
        self.window[WINDOW_LENGTH - 1] = self.accumulator.mean();
    }

    /// Reconcile against `now_ms`, then record. This is what a sampling tick does.
    pub fn record_at(&mut self, now_ms: i64, rate: f64) {
        self.reconcile(now_ms);
        self.record(rate);
    }

    /// Copy of the window, oldest day first.
    pub fn snapshot(&self) -> [f64; WINDOW_LENGTH] {
        self.window
    }

    pub fn accumulator(&self) -> &DayAccumulator {
        &self.accumulator
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2023-11-14T00:00:00Z
    const DAY_D: i64 = 1_699_920_000_000;

    fn seeded() -> RollingHistory {
        RollingHistory::from_parts(
            [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0],
            DayAccumulator {
                day_start: DAY_D,
                sum: 21.0,
                count: 3,
            },
        )
    }

    #[test]
    fn test_floor_to_day() {
        assert_eq!(floor_to_day(DAY_D), DAY_D);
        assert_eq!(floor_to_day(DAY_D + 5 * 3_600_000 + 17), DAY_D);
        assert_eq!(floor_to_day(DAY_D - 1), DAY_D - DAY_MS);
        assert_eq!(floor_to_day(-1), -DAY_MS);
    }

    #[test]
    fn test_two_day_gap_shifts_two_slots() {
        let mut history = seeded();
        let days = history.reconcile(DAY_D + 2 * DAY_MS + 42_000);

        assert_eq!(days, 2);
        assert_eq!(history.snapshot(), [3.0, 4.0, 5.0, 6.0, 7.0, 0.0, 0.0]);
        assert_eq!(
            *history.accumulator(),
            DayAccumulator {
                day_start: DAY_D + 2 * DAY_MS,
                sum: 0.0,
                count: 0,
            }
        );
    }

    #[test]
    fn test_gap_of_window_length_or_more_clears_everything() {
        for days in [7, 8, 30, 400] {
            let mut history = seeded();
            history.reconcile(DAY_D + days * DAY_MS);
            assert_eq!(history.snapshot(), [0.0; WINDOW_LENGTH], "gap of {days} days");
        }
    }

    #[test]
    fn test_reconcile_is_idempotent_within_a_day() {
        let mut history = seeded();
        assert_eq!(history.reconcile(DAY_D + DAY_MS + 1), 1);
        let after_first = history.clone();

        assert_eq!(history.reconcile(DAY_D + DAY_MS + 60_000), 0);
        assert_eq!(history.reconcile(DAY_D + 2 * DAY_MS - 1), 0);
        assert_eq!(history, after_first);
    }

    #[test]
    fn test_clock_moving_backwards_is_same_day() {
        let mut history = seeded();
        assert_eq!(history.reconcile(DAY_D - 3 * DAY_MS), 0);
        assert_eq!(history, seeded());
    }

    #[test]
    fn test_record_writes_running_mean() {
        let mut history = RollingHistory::new(DAY_D + 1_000);
        for rate in [2.0, 4.0, 9.0] {
            history.record(rate);
        }
        assert_eq!(history.snapshot()[WINDOW_LENGTH - 1], 5.0);
        assert_eq!(history.accumulator().count, 3);
    }

    #[test]
    fn test_non_finite_rate_counts_as_zero() {
        let mut history = RollingHistory::new(DAY_D);
        history.record(4.0);
        history.record(f64::NAN);
        history.record(f64::INFINITY);
        assert_eq!(history.accumulator().count, 3);
        assert!((history.snapshot()[WINDOW_LENGTH - 1] - 4.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_record_at_after_rollover_updates_fresh_last_slot() {
        let mut history = seeded();
        history.record_at(DAY_D + 3 * DAY_MS + 10, 8.0);
        assert_eq!(history.snapshot(), [4.0, 5.0, 6.0, 7.0, 0.0, 0.0, 8.0]);
        assert_eq!(history.accumulator().count, 1);
    }

    #[test]
    fn test_extreme_timestamps_do_not_overflow() {
        assert_eq!(floor_to_day(i64::MIN), i64::MIN);
        assert_eq!(floor_to_day(i64::MAX), i64::MAX - i64::MAX.rem_euclid(DAY_MS));

        let mut history = RollingHistory::from_parts(
            [1.0; WINDOW_LENGTH],
            DayAccumulator {
                day_start: i64::MIN,
                sum: 0.0,
                count: u64::MAX,
            },
        );
        assert!(history.reconcile(DAY_D) >= WINDOW_LENGTH as u64);
        assert_eq!(history.snapshot(), [0.0; WINDOW_LENGTH]);
        assert_eq!(history.accumulator().day_start, DAY_D);
    }

    #[test]
    fn test_saturated_count_keeps_recording() {
        let mut history = RollingHistory::from_parts(
            [0.0; WINDOW_LENGTH],
            DayAccumulator {
                day_start: DAY_D,
                sum: 0.0,
                count: u64::MAX,
            },
        );
        history.record(3.0);
        assert_eq!(history.accumulator().count, u64::MAX);
        assert!(history.snapshot()[WINDOW_LENGTH - 1].is_finite());
    }

    #[test]
    fn test_persisted_round_trip() {
        let history = seeded();
        let restored = RollingHistory::from_persisted(&history.to_persisted());
        assert_eq!(restored, history);
    }
}
