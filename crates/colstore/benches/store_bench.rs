//! Benchmarks for the container store engine.
//!
//! Run with: cargo bench --package colstore
//!
//! ## Benchmark Categories
//!
//! - **Write**: full-table serialization across compression settings
//! - **Read**: full-table and sliced reads
//! - **Selection**: single-column reads from a wide file

use colstore::{Store, StringEncoding, Table, TableColumn, Values};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tempfile::TempDir;

const ROWS: usize = 200_000;

/// A mixed-type table with realistic value distributions.
fn benchmark_table(rows: usize) -> Table {
    let mut table = Table::new();
    table
        .push(TableColumn::new(
            "id",
            Values::Int32((0..rows).map(|i| i as i32).collect()),
        ))
        .unwrap();
    table
        .push(TableColumn::new(
            "value",
            Values::Double(
                (0..rows)
                    .map(|i| 50.0 + (i as f64 * 0.1).sin() * 10.0)
                    .collect(),
            ),
        ))
        .unwrap();
    table
        .push(TableColumn::new(
            "label",
            Values::Character {
                values: (0..rows).map(|i| format!("item-{:07}", i % 1000)).collect(),
                encoding: StringEncoding::Utf8,
            },
        ))
        .unwrap();
    table
        .push(TableColumn::new(
            "group",
            Values::Factor {
                levels: (0..rows).map(|i| (i % 5 + 1) as i32).collect(),
                labels: (0..5).map(|i| format!("group-{}", i)).collect(),
                encoding: StringEncoding::Native,
            },
        ))
        .unwrap();
    table
}

fn bench_write(c: &mut Criterion) {
    let table = benchmark_table(ROWS);
    let temp_dir = TempDir::new().unwrap();

    let mut group = c.benchmark_group("write");
    group.throughput(Throughput::Elements(ROWS as u64));
    for compress in [0u8, 50, 100] {
        group.bench_with_input(
            BenchmarkId::from_parameter(compress),
            &compress,
            |b, &compress| {
                let store = Store::new(temp_dir.path().join(format!("w{}.col", compress)));
                b.iter(|| store.write(black_box(&table), compress).unwrap());
            },
        );
    }
    group.finish();
}

fn bench_read_full(c: &mut Criterion) {
    let table = benchmark_table(ROWS);
    let temp_dir = TempDir::new().unwrap();

    let mut group = c.benchmark_group("read_full");
    group.throughput(Throughput::Elements(ROWS as u64));
    for compress in [0u8, 50, 100] {
        let store = Store::new(temp_dir.path().join(format!("r{}.col", compress)));
        store.write(&table, compress).unwrap();
        group.bench_with_input(
            BenchmarkId::from_parameter(compress),
            &store,
            |b, store| {
                b.iter(|| black_box(store.read_table(None, 1, None).unwrap()));
            },
        );
    }
    group.finish();
}

fn bench_read_slice(c: &mut Criterion) {
    let table = benchmark_table(ROWS);
    let temp_dir = TempDir::new().unwrap();
    let store = Store::new(temp_dir.path().join("slice.col"));
    store.write(&table, 75).unwrap();

    c.bench_function("read_slice_1k_mid", |b| {
        b.iter(|| {
            black_box(
                store
                    .read_table(None, (ROWS / 2) as i64, Some((ROWS / 2 + 999) as i64))
                    .unwrap(),
            )
        });
    });
}

fn bench_read_single_column(c: &mut Criterion) {
    let table = benchmark_table(ROWS);
    let temp_dir = TempDir::new().unwrap();
    let store = Store::new(temp_dir.path().join("single.col"));
    store.write(&table, 75).unwrap();

    c.bench_function("read_single_column", |b| {
        b.iter(|| black_box(store.read_table(Some(&["value"]), 1, None).unwrap()));
    });
}

criterion_group!(
    benches,
    bench_write,
    bench_read_full,
    bench_read_slice,
    bench_read_single_column
);
criterion_main!(benches);
