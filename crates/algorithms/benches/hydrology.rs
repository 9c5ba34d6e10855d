//! Benchmarks for the delineation stages

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use cuenca_algorithms::delineation::{delineate, DemHandle, DelineationParams};
use cuenca_algorithms::hydrology::{
    flow_accumulation, flow_direction, priority_flood, FlowModelParams, PriorityFloodParams,
};
use cuenca_core::{Coordinate, ElevationGrid, GeoTransform, Raster};

/// Tilted valley with pseudo-random pits so filling has work to do
fn create_valley_dem(size: usize) -> Raster<f64> {
    let mut dem = Raster::new(size, size);
    dem.set_transform(GeoTransform::new(0.0, size as f64 * 10.0, 10.0, -10.0));
    let axis = size as f64 / 2.0;
    for row in 0..size {
        for col in 0..size {
            let noise = ((row * 7 + col * 13) % 17) as f64 * 0.3;
            let z = 1000.0 - row as f64 * 2.0 + (col as f64 - axis).abs() * 4.0 + noise;
            dem.set(row, col, z).unwrap();
        }
    }
    dem
}

fn bench_priority_flood(c: &mut Criterion) {
    let mut group = c.benchmark_group("hydrology/priority_flood");
    for size in [128, 256, 512, 1024] {
        let dem = create_valley_dem(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| priority_flood(black_box(&dem), PriorityFloodParams::default()).unwrap())
        });
    }
    group.finish();
}

fn bench_flow_direction(c: &mut Criterion) {
    let mut group = c.benchmark_group("hydrology/flow_direction");
    for size in [256, 512, 1024] {
        let filled = priority_flood(&create_valley_dem(size), PriorityFloodParams::default()).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| flow_direction(black_box(&filled)).unwrap())
        });
    }
    group.finish();
}

fn bench_flow_accumulation(c: &mut Criterion) {
    let mut group = c.benchmark_group("hydrology/flow_accumulation");
    for size in [256, 512, 1024] {
        let filled = priority_flood(&create_valley_dem(size), PriorityFloodParams::default()).unwrap();
        let fdir = flow_direction(&filled).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| flow_accumulation(black_box(&filled), black_box(&fdir)).unwrap())
        });
    }
    group.finish();
}

fn bench_delineate(c: &mut Criterion) {
    let mut group = c.benchmark_group("delineation/request");
    for size in [256, 512] {
        let dem = ElevationGrid::from_raster(create_valley_dem(size)).unwrap();
        let handle = DemHandle::new(dem, &FlowModelParams::default()).unwrap();
        let outlet = Coordinate::Projected {
            x: size as f64 * 5.0,
            y: 5.0,
        };
        let params = DelineationParams::default();
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| delineate(black_box(&handle), black_box(&outlet), &params).unwrap())
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_priority_flood,
    bench_flow_direction,
    bench_flow_accumulation,
    bench_delineate,
);
criterion_main!(benches);
