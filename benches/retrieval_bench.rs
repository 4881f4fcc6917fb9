//! Benchmarks for filter compilation, miniSEED decoding and retrieval
//!
//! Run with: cargo bench

use chrono::{TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use rusqlite::{params, Connection};
use seisarchive::client::{WaveformClient, WaveformRequest};
use seisarchive::query::{time_overlap, FilterSchema, Filters};
use seisarchive::storage::mseed::{decode_records, encode_trace};
use seisarchive::storage::types::format_index_time;
use seisarchive::storage::{Nslc, Samples, TimeWindow, Trace};
use tempfile::tempdir;

fn test_trace(station: &str, n: i32) -> Trace {
    Trace::new(
        Nslc::new("UW", station, "", "HHZ"),
        Utc.with_ymd_and_hms(2023, 3, 1, 0, 0, 0).unwrap(),
        100.0,
        Samples::Int((0..n).map(|i| (i % 2000) - 1000).collect()),
    )
}

fn bench_compile(c: &mut Criterion) {
    let schema = FilterSchema::waveform();
    let filters = Filters::new()
        .with("network", "UW,CC")
        .with("station", "MBW*,JCW,RC?")
        .with("location", "*")
        .with("channel", "?HZ");
    let window = TimeWindow::try_new(
        Utc.with_ymd_and_hms(2023, 3, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2023, 3, 1, 1, 0, 0).unwrap(),
    )
    .unwrap();

    c.bench_function("compile_waveform_filters", |b| {
        b.iter(|| {
            let predicate = schema
                .compile(black_box(&filters), time_overlap(&window))
                .unwrap();
            predicate.to_sql()
        })
    });
}

fn bench_mseed(c: &mut Criterion) {
    let mut group = c.benchmark_group("mseed");

    for size in [1_000, 10_000, 100_000] {
        let trace = test_trace("RCM", size);
        let bytes = encode_trace(&trace, 4096, 1).unwrap();

        group.throughput(Throughput::Elements(size as u64));

        group.bench_function(format!("encode_{}", size), |b| {
            b.iter(|| encode_trace(black_box(&trace), 4096, 1).unwrap())
        });

        group.bench_function(format!("decode_{}", size), |b| {
            b.iter(|| decode_records(black_box(&bytes)).unwrap())
        });
    }

    group.finish();
}

fn bench_retrieval(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let db = dir.path().join("index.sqlite");
    let conn = Connection::open(&db).unwrap();
    conn.execute_batch(
        "CREATE TABLE tsindex (
            network TEXT, station TEXT, location TEXT, channel TEXT,
            quality TEXT, version INTEGER, starttime TEXT, endtime TEXT,
            samplerate REAL, filename TEXT, byteoffset INTEGER, bytes INTEGER
        )",
    )
    .unwrap();

    let mut file_bytes = Vec::new();
    let path = dir.path().join("day.mseed");
    for station in ["RCM", "JCW", "MBW", "MBW2"] {
        let trace = test_trace(station, 360_000);
        let bytes = encode_trace(&trace, 4096, 1).unwrap();
        conn.execute(
            "INSERT INTO tsindex VALUES ('UW', ?, '', 'HHZ', 'D', 1, ?, ?, 100.0, ?, ?, ?)",
            params![
                station,
                format_index_time(trace.start),
                format_index_time(trace.end()),
                path.to_string_lossy(),
                file_bytes.len() as i64,
                bytes.len() as i64,
            ],
        )
        .unwrap();
        file_bytes.extend(bytes);
    }
    std::fs::write(&path, &file_bytes).unwrap();

    let client = WaveformClient::open(&db, "tsindex").unwrap();
    let request = WaveformRequest::new(
        "UW",
        "MBW*,JCW",
        "*",
        "HHZ",
        Utc.with_ymd_and_hms(2023, 3, 1, 0, 10, 0).unwrap(),
        Utc.with_ymd_and_hms(2023, 3, 1, 0, 20, 0).unwrap(),
    );

    c.bench_function("get_waveforms_3_channels_10min", |b| {
        b.iter(|| client.get_waveforms(black_box(&request)).unwrap())
    });
}

criterion_group!(benches, bench_compile, bench_mseed, bench_retrieval);
criterion_main!(benches);
