// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};
use glam::Vec3;
use proximity_index::{Aabb3D, Bvh, Grid, NearestParams, RayCast, Ray, SpatialIndex, Visit};

#[derive(Clone)]
struct Rng(u64);

impl Rng {
    fn new(seed: u64) -> Self {
        Self(seed)
    }
    fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }
    fn next_f32(&mut self) -> f32 {
        let v = self.next_u64() >> 40;
        (v as f32) / ((1u64 << 24) as f32)
    }
}

fn gen_random_boxes(count: usize, extent: f32, half: f32) -> Vec<Aabb3D> {
    let mut out = Vec::with_capacity(count);
    let mut rng = Rng::new(0xCAFE_F00D_DEAD_BEEF);
    for _ in 0..count {
        let c = Vec3::new(
            rng.next_f32() * extent,
            rng.next_f32() * 4.0,
            rng.next_f32() * extent,
        );
        out.push(Aabb3D::from_center_half_extents(c, Vec3::splat(half)));
    }
    out
}

fn gen_clustered_boxes(n_clusters: usize, per_cluster: usize, spread: f32) -> Vec<Aabb3D> {
    let mut out = Vec::with_capacity(n_clusters * per_cluster);
    let mut rng = Rng::new(0xC1A5_7E55_9999_ABCD);
    let mut centers = Vec::with_capacity(n_clusters);
    for _ in 0..n_clusters {
        centers.push((rng.next_f32() * 2000.0, rng.next_f32() * 2000.0));
    }
    for (cx, cz) in centers {
        for _ in 0..per_cluster {
            let dx = (rng.next_f32() - 0.5) * spread;
            let dz = (rng.next_f32() - 0.5) * spread;
            out.push(Aabb3D::from_center_half_extents(
                Vec3::new(cx + dx, 0.0, cz + dz),
                Vec3::splat(1.0),
            ));
        }
    }
    out
}

fn fill<I: SpatialIndex<u32>>(index: &mut I, boxes: &[Aabb3D]) {
    index.clear();
    for (i, b) in boxes.iter().copied().enumerate() {
        index.add(i as u32, b);
    }
    index.rebuild();
}

fn bench_backend<I, F>(c: &mut Criterion, name: &str, make: F)
where
    I: SpatialIndex<u32>,
    F: Fn() -> I + Copy,
{
    let mut group = c.benchmark_group(name);
    for &n in &[1_000_usize, 10_000, 50_000] {
        let boxes = gen_random_boxes(n, 2000.0, 1.5);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_function(format!("clear_add_rebuild_n{n}"), |b| {
            b.iter_batched(
                make,
                |mut idx| {
                    fill(&mut idx, &boxes);
                    black_box(idx.len());
                },
                BatchSize::SmallInput,
            );
        });

        let mut idx = make();
        fill(&mut idx, &boxes);
        group.bench_function(format!("nearest_n{n}"), |b| {
            let mut rng = Rng::new(0xFACE_FEED_CAFE_BABE);
            b.iter(|| {
                let origin = Vec3::new(rng.next_f32() * 2000.0, 0.0, rng.next_f32() * 2000.0);
                let mut hit = None;
                idx.visit_nearest(&NearestParams::new(origin), |h, _, _| {
                    hit = Some(h);
                    Visit::Stop
                });
                black_box(hit);
            });
        });
        group.bench_function(format!("k16_nearest_n{n}"), |b| {
            let mut rng = Rng::new(0xFACE_FEED_CAFE_BABE);
            b.iter(|| {
                let origin = Vec3::new(rng.next_f32() * 2000.0, 0.0, rng.next_f32() * 2000.0);
                let mut seen = 0;
                idx.visit_nearest(&NearestParams::new(origin), |_, _, _| {
                    seen += 1;
                    if seen == 16 { Visit::Stop } else { Visit::Continue }
                });
                black_box(seen);
            });
        });
        group.bench_function(format!("range_r50_n{n}"), |b| {
            let mut rng = Rng::new(0xBADC_F00D_1234_5678);
            b.iter(|| {
                let origin = Vec3::new(rng.next_f32() * 2000.0, 0.0, rng.next_f32() * 2000.0);
                let q = Aabb3D::from_center_half_extents(origin, Vec3::splat(50.0));
                let mut hits = 0_usize;
                idx.visit_range(&q, |_, _| {
                    hits += 1;
                    Visit::Continue
                });
                black_box(hits);
            });
        });
    }

    let boxes = gen_clustered_boxes(20, 500, 80.0);
    let mut idx = make();
    fill(&mut idx, &boxes);
    group.bench_function("nearest_clustered", |b| {
        let mut rng = Rng::new(0x1234_5678_9ABC_DEF0);
        b.iter(|| {
            let origin = Vec3::new(rng.next_f32() * 2000.0, 0.0, rng.next_f32() * 2000.0);
            let mut hit = None;
            idx.visit_nearest(&NearestParams::new(origin), |h, _, _| {
                hit = Some(h);
                Visit::Stop
            });
            black_box(hit);
        });
    });
    group.finish();
}

fn bench_bvh(c: &mut Criterion) {
    bench_backend(c, "bvh", Bvh::<u32>::default);
}

fn bench_grid(c: &mut Criterion) {
    bench_backend(c, "grid", || Grid::<u32>::new(32.0));
}

fn bench_grid_raycast(c: &mut Criterion) {
    let mut group = c.benchmark_group("grid_raycast");
    for &cell in &[8.0_f32, 32.0, 128.0] {
        let boxes = gen_random_boxes(20_000, 2000.0, 1.5);
        let mut grid = Grid::<u32>::new(cell);
        fill(&mut grid, &boxes);
        group.bench_function(format!("cell{cell}"), |b| {
            let mut rng = Rng::new(0xDEAD_BEEF_0BAD_F00D);
            b.iter(|| {
                let origin = Vec3::new(rng.next_f32() * 2000.0, 1.0, rng.next_f32() * 2000.0);
                let dir = Vec3::new(rng.next_f32() - 0.5, 0.0, rng.next_f32() - 0.5);
                let hit = grid.raycast(&Ray::new(origin, dir), 500.0, |_, _| true);
                black_box(hit);
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_bvh, bench_grid, bench_grid_raycast);
criterion_main!(benches);
