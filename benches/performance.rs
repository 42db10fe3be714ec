//! Performance benchmarks for the network health logger
//!
//! The hot paths here are tiny (one record per invocation), but rendering
//! and decode throughput still matter when a dashboard replays months of
//! raw payloads through the same code.

use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

use chrono::{Local, TimeZone};
use network_health_logger::models::record::{MeasurementRecord, ProbeReport};
use network_health_logger::models::{ServerList, TrialReport};
use network_health_logger::trial::backoff_delay;
use std::time::Duration;

const RESULT_JSON: &str = r#"{"type":"result","timestamp":"2025-06-01T12:30:45Z","ping":{"jitter":1.25,"latency":14.8},"download":{"bandwidth":12500000},"upload":{"bandwidth":2500000},"packetLoss":0.5,"isp":"Example Fiber","server":{"id":4242,"name":"Example City Exchange","location":"Example City"}}"#;

const SERVER_LIST_JSON: &str = r#"{"type":"serverList","servers":[
{"id":1,"name":"S1"},{"id":2,"name":"S2"},{"id":3,"name":"S3"},
{"id":4,"name":"S4"},{"id":5,"name":"S5"},{"id":6,"name":"S6"},
{"id":7,"name":"S7"},{"id":8,"name":"S8"},{"id":9,"name":"S9"},
{"id":10,"name":"S10"},{"id":11,"name":"S11"},{"id":12,"name":"S12"}
]}"#;

fn bench_record_rendering(c: &mut Criterion) {
    let timestamp = Local.with_ymd_and_hms(2025, 6, 1, 12, 30, 45).unwrap();
    let report = TrialReport::decode(RESULT_JSON).unwrap();
    let record = MeasurementRecord::success(timestamp, &report, ProbeReport::unknown());

    c.bench_function("record_to_csv_row", |b| {
        b.iter(|| black_box(&record).to_csv_row())
    });
}

fn bench_trial_decode(c: &mut Criterion) {
    c.bench_function("trial_report_decode", |b| {
        b.iter(|| TrialReport::decode(black_box(RESULT_JSON)).unwrap())
    });

    c.bench_function("server_list_decode", |b| {
        b.iter(|| ServerList::decode(black_box(SERVER_LIST_JSON)).unwrap())
    });
}

fn bench_backoff_schedule(c: &mut Criterion) {
    c.bench_function("backoff_schedule_10_attempts", |b| {
        b.iter(|| {
            let mut total = Duration::ZERO;
            for attempt in 1..=10u32 {
                total += backoff_delay(black_box(attempt), Duration::from_secs(5));
            }
            total
        })
    });
}

criterion_group!(
    benches,
    bench_record_rendering,
    bench_trial_decode,
    bench_backoff_schedule
);
criterion_main!(benches);
