//! Benchmarks for the monthly aggregation path
//!
//! Run with: cargo bench

use chrono::{Duration, NaiveDate};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use pluvio::cache::{ArtifactPath, QueryKey};
use pluvio::series::{MeasurementAggregator, YearRange};
use pluvio::station::{Station, StationId};
use pluvio::store::{RawMeasurement, Store};
use std::sync::Arc;

fn create_test_store(years: i64) -> Arc<Store> {
    let store = Store::open_in_memory().unwrap();
    store
        .upsert_stations(&[Station {
            id: "12".to_string(),
            name: "Bron".to_string(),
            longitude: 4.85,
            latitude: 45.75,
        }])
        .unwrap();

    let first = NaiveDate::from_ymd_opt(2011, 1, 1).unwrap();
    let measurements: Vec<RawMeasurement> = (0..years * 365)
        .map(|day| RawMeasurement {
            station_id: "12".to_string(),
            date: (first + Duration::days(day)).format("%d/%m/%Y").to_string(),
            value: format!("{:.1}", (day % 17) as f64 * 0.4),
            flag: (day % 31 == 0).then(|| "*".to_string()),
        })
        .collect();
    store.upsert_measurements(&measurements).unwrap();

    Arc::new(store)
}

fn bench_aggregation(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregation");
    let station = StationId::new("12");

    for years in [1, 4, 8] {
        let aggregator = MeasurementAggregator::new(create_test_store(years));
        let range = YearRange::new(2011, 2011 + years as i32 - 1);

        group.throughput(Throughput::Elements(years as u64 * 365));
        group.bench_with_input(BenchmarkId::new("build", years), &range, |b, range| {
            b.iter(|| aggregator.build(black_box(&station), *range).unwrap())
        });
    }

    group.finish();
}

fn bench_artifact_path(c: &mut Criterion) {
    let key = QueryKey::new("Saint Priest", Some("Vaulx/en/Velin".to_string()), 2012, 2016);

    c.bench_function("artifact_path_for_key", |b| {
        b.iter(|| ArtifactPath::for_key(black_box("courbes"), black_box(&key)))
    });
}

criterion_group!(benches, bench_aggregation, bench_artifact_path);
criterion_main!(benches);
