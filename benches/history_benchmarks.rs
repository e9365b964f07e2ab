use chrono::{TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::time::{Duration, Instant};
use trafficdash::{
    history::{rate, CounterSample, PersistedState, RollingHistory, BYTES_TO_MEGABITS, DAY_MS},
    metrics::{data::ProcessSummary, CacheKind, TtlCache},
    SystemError,
};

const DAY_D: i64 = 1_709_251_200_000;

/// Benchmark recording rates within a single day
fn bench_history_record(c: &mut Criterion) {
    let mut history = RollingHistory::new(DAY_D);
    let mut now = DAY_D;

    c.bench_function("history_record_same_day", |b| {
        b.iter(|| {
            now += 1;
            history.record_at(black_box(now), black_box(4.2));
        })
    });
}

/// Benchmark day rollover for increasing gaps
fn bench_history_reconcile(c: &mut Criterion) {
    for days in [1i64, 3, 8].iter() {
        c.bench_with_input(BenchmarkId::new("history_reconcile", days), days, |b, &days| {
            b.iter(|| {
                let mut history =
                    RollingHistory::from_persisted(&PersistedState::fresh(DAY_D));
                history.reconcile(black_box(DAY_D + days * DAY_MS))
            })
        });
    }
}

/// Benchmark rate computation between two counter samples
fn bench_rate(c: &mut Criterion) {
    let previous = CounterSample::new(1_000.0, Utc.timestamp_millis_opt(DAY_D).unwrap());
    let current = CounterSample::new(1_251_000.0, Utc.timestamp_millis_opt(DAY_D + 10_000).unwrap());

    c.bench_function("rate", |b| {
        b.iter(|| rate(black_box(Some(&previous)), black_box(&current), BYTES_TO_MEGABITS, 1.0))
    });
}

/// Benchmark loading persisted history from JSON
fn bench_persisted_state(c: &mut Criterion) {
    let json = serde_json::to_string(&PersistedState {
        week: [1.5, 2.5, 3.5, 4.5, 5.5, 6.5, 7.5],
        day_start: DAY_D,
        day_sum: 120.0,
        day_count: 360,
    })
    .expect("Should serialize");

    c.bench_function("persisted_state_lenient_parse", |b| {
        b.iter(|| {
            let value: serde_json::Value =
                serde_json::from_str(black_box(&json)).expect("Should parse");
            PersistedState::from_json_lenient(&value, DAY_D)
        })
    });
}

/// Benchmark the cache hit path
fn bench_cache_hit(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().expect("Should create tokio runtime");
    let cache = TtlCache::new(
        CacheKind::Processes,
        Duration::from_secs(3600),
        ProcessSummary::unavailable(),
    );
    let start = Instant::now();
    rt.block_on(cache.get_or_refresh(start, || async {
        Ok::<_, SystemError>(ProcessSummary::new(42, Vec::new()))
    }));

    c.bench_function("cache_hit", |b| {
        b.to_async(&rt).iter(|| async {
            cache
                .get_or_refresh(Instant::now(), || async {
                    Ok::<_, SystemError>(ProcessSummary::unavailable())
                })
                .await
        })
    });
}

criterion_group!(
    benches,
    bench_history_record,
    bench_history_reconcile,
    bench_rate,
    bench_persisted_state,
    bench_cache_hit
);
criterion_main!(benches);
