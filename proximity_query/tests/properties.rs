// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! End-to-end properties of the query algorithms against both backends.

use glam::{Quat, Vec2, Vec3};
use proximity_index::{Aabb3D, Bvh, Grid, SpatialIndex, TreeHandle, TreeMask};
use proximity_query::query::{k_nearest, nearest, within_range};
use proximity_query::{
    AcceptAll, ConfiguredIndex, Entity, Forest, MemoryWorld, ProximityConfig, ProximityQuery,
    ProximitySystem, QueryFlags, QueryParams, QuerySubscriber, Sector, SpatialShape, World,
    WorldTransform, should_run,
};

/// Small deterministic generator so runs are reproducible without extra dependencies.
struct Lcg(u64);

impl Lcg {
    fn next_f32(&mut self, lo: f32, hi: f32) -> f32 {
        self.0 = self
            .0
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        let unit = (self.0 >> 40) as f32 / (1_u64 << 24) as f32;
        lo + unit * (hi - lo)
    }
}

/// Spawn `n` scattered entities split over `trees` trees, alternating shapes.
fn scattered_world(n: u32, trees: u8, seed: u64) -> MemoryWorld {
    let mut rng = Lcg(seed);
    let mut world = MemoryWorld::new();
    for i in 0..n {
        let tree = TreeHandle(u8::try_from(i % u32::from(trees)).unwrap());
        let shape = if i % 2 == 0 {
            SpatialShape::radius(tree, rng.next_f32(0.1, 3.0))
        } else {
            SpatialShape::rect(tree, Vec2::new(rng.next_f32(0.1, 6.0), rng.next_f32(0.1, 6.0)))
        };
        let position = Vec3::new(
            rng.next_f32(-60.0, 60.0),
            rng.next_f32(-2.0, 2.0),
            rng.next_f32(-60.0, 60.0),
        );
        world.spawn_at(WorldTransform::from_position(position), Some(shape));
    }
    world
}

fn system_over<I>(world: &MemoryWorld, trees: usize) -> ProximitySystem<I>
where
    I: SpatialIndex<Entity> + ConfiguredIndex + Send + Sync,
{
    let mut config = ProximityConfig {
        initial_trees: trees,
        ..ProximityConfig::default()
    };
    config.grid.cell_size = 7.0;
    config.bvh.max_leaf = 4;
    let mut system = ProximitySystem::new(config);
    system.on_awake().unwrap();
    system.on_update(world, &mut []);
    system
}

/// Point of a box the sector is judged against.
fn sector_anchor(aabb: &Aabb3D, origin: Vec3) -> Vec3 {
    let y = if aabb.min.y.is_finite() && aabb.max.y.is_finite() {
        0.5 * (aabb.min.y + aabb.max.y)
    } else {
        origin.y
    };
    Vec3::new(aabb.horizontal_center(0), y, aabb.horizontal_center(2))
}

/// Every qualifying candidate with its distance, by linear scan.
fn brute_force<F>(world: &MemoryWorld, params: &QueryParams, filter: &F) -> Vec<(f32, Entity)>
where
    F: Fn(Entity, &Aabb3D) -> bool,
{
    let mut all: Vec<(f32, Entity)> = world
        .spatial_entities()
        .iter()
        .filter(|s| params.trees.contains(s.shape.tree))
        .filter(|s| !(params.ignore_self && params.self_entity == Some(s.entity)))
        .filter_map(|s| {
            let position = world.transform(s.entity)?.position;
            let aabb = s.shape.aabb(position);
            if !filter(s.entity, &aabb) {
                return None;
            }
            let anchor = sector_anchor(&aabb, params.origin);
            if params.sector.is_some_and(|sector| !sector.contains(anchor)) {
                return None;
            }
            let d = aabb.distance_squared_to_point(params.origin, params.ignore_y);
            (d >= params.min_range_squared && d <= params.range_squared).then_some((d, s.entity))
        })
        .collect();
    all.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    all
}

fn check_against_brute_force<I>()
where
    I: SpatialIndex<Entity> + ConfiguredIndex + Send + Sync,
{
    let world = scattered_world(300, 3, 7);
    let system: ProximitySystem<I> = system_over(&world, 3);
    let mut rng = Lcg(99);
    let everyone = |_: Entity, _: &Aabb3D| true;
    let skip_thirds = |e: Entity, _: &Aabb3D| e.index % 3 != 0;

    for round in 0..60 {
        let origin = Vec3::new(rng.next_f32(-70.0, 70.0), 0.0, rng.next_f32(-70.0, 70.0));
        let mut params = QueryParams::new(origin);
        params.range_squared = rng.next_f32(4.0, 900.0);
        params.ignore_y = round % 3 == 0;
        if round % 4 == 0 {
            params.trees = TreeMask::single(TreeHandle(1)).with(TreeHandle(2));
        }
        if round % 5 == 1 {
            params.min_range_squared = rng.next_f32(0.0, params.range_squared * 0.5);
        }
        if round % 2 == 1 {
            let yaw = rng.next_f32(0.0, std::f32::consts::TAU);
            let degrees = rng.next_f32(20.0, 300.0);
            let forward = Quat::from_rotation_y(yaw) * Vec3::Z;
            params.sector = Sector::new(origin, forward, degrees, params.ignore_y);
        }
        // Pick one of two predicates so both the plain and the filtered paths run.
        let picky = round % 3 == 1;
        let filter: &(dyn Fn(Entity, &Aabb3D) -> bool + Sync) =
            if picky { &skip_thirds } else { &everyone };
        let expected = brute_force(&world, &params, &filter);

        let got = nearest(system.forest(), &params, &filter);
        assert_eq!(got.map(|n| n.entity), expected.first().map(|e| e.1), "round {round}");

        for k in [2, 5, 40] {
            let mut out = Vec::new();
            k_nearest(system.forest(), &params, &filter, k, &mut out);
            let want: Vec<Entity> = expected.iter().take(k).map(|e| e.1).collect();
            assert_eq!(out, want, "round {round}, k {k}");
        }

        let mut out = Vec::new();
        within_range(system.forest(), &params, &filter, &mut out);
        let want: Vec<Entity> = expected.iter().map(|e| e.1).collect();
        assert_eq!(out, want, "round {round}");
    }
}

#[test]
fn tree_matches_linear_scan() {
    check_against_brute_force::<Bvh<Entity>>();
}

#[test]
fn grid_matches_linear_scan() {
    check_against_brute_force::<Grid<Entity>>();
}

fn three_tree_scenario<I>()
where
    I: SpatialIndex<Entity> + ConfiguredIndex + Send + Sync,
{
    let mut world = MemoryWorld::new();
    let me = world.spawn_at(WorldTransform::IDENTITY, None);
    // Box surfaces sit at 1, 5 and 9 from the origin, one entity per tree.
    let mut at = |x: f32, tree: u8| {
        world.spawn_at(
            WorldTransform::from_position(Vec3::new(x + 0.5, 0.0, 0.0)),
            Some(SpatialShape::radius(TreeHandle(tree), 0.5)),
        )
    };
    let nine = at(9.0, 0);
    let one = at(1.0, 1);
    let five = at(5.0, 2);

    let mut system: ProximitySystem<I> = ProximitySystem::new(ProximityConfig {
        initial_trees: 3,
        ..ProximityConfig::default()
    });
    system.on_awake().unwrap();

    let base = ProximityQuery::new().trees(TreeMask::ALL).range(10.0);
    let mut subs = vec![
        QuerySubscriber::new(me, base.nearest_count(1), 2),
        QuerySubscriber::new(me, base.nearest_count(2), 2),
        QuerySubscriber::new(me, base.nearest_count(0), 2),
    ];
    system.on_update(&world, &mut subs);
    assert_eq!(subs[0].results.as_slice(), [one]);
    assert_eq!(subs[1].results.as_slice(), [one, five]);
    assert_eq!(subs[2].results.as_slice(), [one, five, nine]);
}

#[test]
fn three_tree_scenario_on_trees() {
    three_tree_scenario::<Bvh<Entity>>();
}

#[test]
fn three_tree_scenario_on_grids() {
    three_tree_scenario::<Grid<Entity>>();
}

#[test]
fn wide_boxes_are_reported_once() {
    let mut forest: Forest<Grid<Entity>> = Forest::new();
    let t = forest
        .add_tree_with(Grid::new(1.0))
        .expect("empty forest has room");
    let wide = Entity::new(0, 0);
    let small = Entity::new(1, 0);
    let tree = forest.get_mut(t).unwrap();
    tree.add(wide, Aabb3D::new(Vec3::new(-10.0, -1.0, -10.0), Vec3::new(10.0, 1.0, 10.0)));
    tree.add(small, Aabb3D::from_center_half_extents(Vec3::new(3.0, 0.0, 0.0), Vec3::splat(0.2)));
    tree.rebuild();

    let mut params = QueryParams::new(Vec3::ZERO);
    params.range_squared = 25.0;
    for sorted in [true, false] {
        params.sorted = sorted;
        let mut out = Vec::new();
        within_range(&forest, &params, &AcceptAll, &mut out);
        out.sort();
        assert_eq!(out, [wide, small]);
    }
}

#[test]
fn self_is_never_reported_in_any_mode() {
    let world = scattered_world(60, 2, 3);
    let system: ProximitySystem<Grid<Entity>> = system_over(&world, 2);
    let me = world.spatial_entities()[10].entity;
    let position = world.transform(me).unwrap().position;
    let frame = WorldTransform::from_position(position);

    for count in [0, 1, 3, 100] {
        for sorted in [true, false] {
            let query = ProximityQuery::new()
                .nearest_count(count)
                .with_flags(QueryFlags::IGNORE_SORTING, !sorted);
            let mut results = Default::default();
            system.fill_nearest(&query, &frame, Some(me), &AcceptAll, &mut results);
            assert!(!results.as_slice().contains(&me), "count {count} sorted {sorted}");
        }
    }
}

#[test]
fn sector_answers_are_repeatable() {
    let world = scattered_world(200, 1, 11);
    let system: ProximitySystem<Bvh<Entity>> = system_over(&world, 1);
    let frame = WorldTransform::IDENTITY.with_rotation(Quat::from_rotation_y(0.7));
    let query = ProximityQuery::new().nearest_count(0).range(40.0).sector(75.0);

    let sector = Sector::new(frame.position, frame.forward(), 75.0, false).unwrap();
    let mut first = Default::default();
    system.fill_all(&query, &frame, None, &AcceptAll, &mut first);
    assert!(!first.is_empty());
    for _ in 0..5 {
        let mut again = Default::default();
        system.fill_all(&query, &frame, None, &AcceptAll, &mut again);
        assert_eq!(again, first);
    }
    for entity in &first {
        let shape = world.shape(*entity).unwrap();
        let aabb = shape.aabb(world.transform(*entity).unwrap().position);
        let center = Vec3::new(
            aabb.horizontal_center(0),
            0.5 * (aabb.min.y + aabb.max.y),
            aabb.horizontal_center(2),
        );
        assert!(sector.contains(center));
    }
}

#[test]
fn throttled_queries_fire_once_per_period() {
    let period = 4;
    let mut fired = [0_u32; 4];
    for id in 0..4_u32 {
        for tick in 0..u64::from(period) * 10 {
            if should_run(tick, id, period) {
                fired[id as usize] += 1;
                assert_eq!((tick + u64::from(id)) % u64::from(period), 0);
            }
        }
    }
    assert_eq!(fired, [10; 4]);

    let first = |id: u32| (0..u64::from(period)).find(|&t| should_run(t, id, period));
    assert_ne!(first(5), first(6));
}
