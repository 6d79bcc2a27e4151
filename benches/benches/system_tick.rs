// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use glam::{Vec2, Vec3};
use proximity_index::{Bvh, Grid, SpatialIndex};
use proximity_query::{
    ConfiguredIndex, Entity, MemoryWorld, ProximityConfig, ProximityQuery, ProximitySystem,
    QuerySubscriber, SpatialShape, TreeHandle, WorldTransform,
};

#[derive(Clone)]
struct Rng(u64);

impl Rng {
    fn new(seed: u64) -> Self {
        Self(seed)
    }
    fn next_f32(&mut self) -> f32 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        ((x >> 40) as f32) / ((1u64 << 24) as f32)
    }
}

fn populate(n: usize, trees: u8) -> (MemoryWorld, Vec<Entity>) {
    let mut rng = Rng::new(0x0DDB_A11C_AFE0_0001);
    let mut world = MemoryWorld::new();
    let mut spawned = Vec::with_capacity(n);
    for i in 0..n {
        let tree = TreeHandle((i % trees as usize) as u8);
        let shape = if i % 3 == 0 {
            SpatialShape::rect(tree, Vec2::new(2.0, 1.0))
        } else {
            SpatialShape::radius(tree, 0.75)
        };
        let at = Vec3::new(rng.next_f32() * 1000.0, 0.0, rng.next_f32() * 1000.0);
        spawned.push(world.spawn_at(WorldTransform::from_position(at), Some(shape)));
    }
    (world, spawned)
}

fn bench_tick<I>(c: &mut Criterion, name: &str)
where
    I: SpatialIndex<Entity> + ConfiguredIndex + Send + Sync,
{
    let mut group = c.benchmark_group(name);
    for &n in &[2_000_usize, 20_000] {
        let (world, spawned) = populate(n, 4);
        let mut system: ProximitySystem<I> = ProximitySystem::new(ProximityConfig {
            initial_trees: 4,
            ..ProximityConfig::default()
        });
        system.on_awake().expect("four trees fit in a forest");

        let mut subscribers: Vec<_> = spawned
            .iter()
            .step_by(4)
            .enumerate()
            .map(|(i, &e)| {
                let query = match i % 3 {
                    0 => ProximityQuery::new().range(25.0),
                    1 => ProximityQuery::new().range(40.0).nearest_count(8),
                    _ => ProximityQuery::new().range(15.0).nearest_count(0).sector(120.0),
                };
                QuerySubscriber::new(e, query, 8)
            })
            .collect();

        group.throughput(Throughput::Elements(n as u64));
        group.bench_function(format!("tick_n{n}"), |b| {
            b.iter(|| black_box(system.on_update(&world, &mut subscribers)));
        });
        for sub in &mut subscribers {
            sub.query.update_per_tick = 4;
        }
        group.bench_function(format!("tick_throttled_n{n}"), |b| {
            b.iter(|| black_box(system.on_update(&world, &mut subscribers)));
        });
    }
    group.finish();
}

fn bench_bvh_tick(c: &mut Criterion) {
    bench_tick::<Bvh<Entity>>(c, "bvh_tick");
}

fn bench_grid_tick(c: &mut Criterion) {
    bench_tick::<Grid<Entity>>(c, "grid_tick");
}

criterion_group!(benches, bench_bvh_tick, bench_grid_tick);
criterion_main!(benches);
