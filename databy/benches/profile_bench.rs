//! Benchmarks for dataset profiling and missing-value resolution.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use databy::core::{Cell, Column, DataTable};
use databy::stages::build_data_summary;
use databy::tools::{fill_with_mean, fill_with_mode};

fn wide_table(rows: usize) -> DataTable {
    let ints: Vec<Cell> = (0..rows)
        .map(|i| if i % 7 == 0 { Cell::Null } else { Cell::Int((i % 100) as i64) })
        .collect();
    let floats: Vec<Cell> = (0..rows)
        .map(|i| if i % 11 == 0 { Cell::Null } else { Cell::Float(i as f64 * 0.5) })
        .collect();
    let text: Vec<Cell> = (0..rows)
        .map(|i| if i % 5 == 0 { Cell::Null } else { Cell::from(format!("city-{}", i % 40)) })
        .collect();

    DataTable::from_columns(vec![
        Column::infer("count", ints),
        Column::infer("amount", floats),
        Column::infer("city", text),
    ])
    .unwrap()
}

fn profile_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_data_summary");
    for rows in [100, 1_000, 10_000] {
        let table = wide_table(rows);
        group.bench_with_input(BenchmarkId::from_parameter(rows), &table, |b, table| {
            b.iter(|| build_data_summary(black_box(table)).unwrap());
        });
    }
    group.finish();
}

fn missing_values_benchmark(c: &mut Criterion) {
    let table = wide_table(10_000);
    c.bench_function("fill_with_mean", |b| {
        b.iter(|| fill_with_mean(black_box(table.clone())));
    });
    c.bench_function("fill_with_mode", |b| {
        b.iter(|| fill_with_mode(black_box(table.clone())));
    });
}

criterion_group!(benches, profile_benchmark, missing_values_benchmark);
criterion_main!(benches);
