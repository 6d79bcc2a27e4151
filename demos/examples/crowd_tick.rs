// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A few ticks of the proximity system over a small crowd.
//!
//! This example shows how to:
//! - split entities over several trees (units and obstacles),
//! - drive nearest, k-nearest and sector-limited range queries each tick,
//! - throttle a query to every other tick,
//! - cast a ray through a grid forest.
//!
//! Run:
//! - `RUST_LOG=debug cargo run -p proximity_demos --example crowd_tick`

use glam::{Quat, Vec2, Vec3};
use log::info;
use proximity_index::{Grid, Ray, TreeMask};
use proximity_query::{
    AliveFilter, Entity, MemoryWorld, ProximityConfig, ProximityQuery, ProximitySystem, QueryFlags,
    QuerySubscriber, SpatialShape, WorldTransform,
};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut config = ProximityConfig {
        initial_trees: 2,
        ..ProximityConfig::default()
    };
    config.grid.cell_size = 4.0;
    let mut system: ProximitySystem<Grid<Entity>> = ProximitySystem::new(config);
    if let Err(err) = system.on_awake() {
        eprintln!("setup failed: {err}");
        return;
    }
    let units = proximity_index::TreeHandle(0);
    let obstacles = proximity_index::TreeHandle(1);

    let mut world = MemoryWorld::new();
    let mut crowd = Vec::new();
    for i in 0..12_u8 {
        let angle = f32::from(i) * core::f32::consts::TAU / 12.0;
        let at = Vec3::new(angle.cos() * 10.0, 0.0, angle.sin() * 10.0);
        let facing = Quat::from_rotation_y(-angle);
        let shape = SpatialShape::radius(units, 0.5).with_ignore_y(true);
        crowd.push(world.spawn_at(WorldTransform::from_position(at).with_rotation(facing), Some(shape)));
    }
    let wall = world.spawn_at(
        WorldTransform::from_position(Vec3::new(0.0, 0.0, 4.0)),
        Some(SpatialShape::rect(obstacles, Vec2::new(6.0, 0.5)).with_height(3.0)),
    );

    let mut subscribers = vec![
        QuerySubscriber::new(
            crowd[0],
            ProximityQuery::new().trees(TreeMask::single(units)),
            1,
        ),
        QuerySubscriber::new(
            crowd[3],
            ProximityQuery::new()
                .trees(TreeMask::single(units))
                .nearest_count(3)
                .update_per_tick(2),
            3,
        ),
        QuerySubscriber::new(
            crowd[6],
            ProximityQuery::new()
                .nearest_count(0)
                .range(12.0)
                .sector(90.0)
                .with_flags(QueryFlags::IGNORE_Y, true),
            8,
        ),
    ];

    for tick in 0..4 {
        if tick == 2 {
            info!("despawning {:?}", crowd[1]);
            world.despawn(crowd[1]);
        }
        let stats = system.on_update(&world, &mut subscribers);
        info!(
            "tick {}: indexed {}, ran {} queries",
            stats.tick,
            stats.pipeline.indexed(),
            stats.queries_run
        );
        for sub in &subscribers {
            info!("  {:?} sees {:?}", sub.entity, sub.results.as_slice());
        }
    }

    let ray = Ray::new(Vec3::new(0.0, 1.0, -20.0), Vec3::Z);
    let filter = AliveFilter::new(&world);
    match system.cast_ray(TreeMask::ALL, &ray, 40.0, None, &filter, true) {
        Some(hit) if hit.handle == wall => info!("ray hits the wall at {:.2}", hit.distance),
        Some(hit) => info!("ray hits {:?} at {:.2}", hit.handle, hit.distance),
        None => info!("ray hits nothing"),
    }

    system.on_destroy();
}
