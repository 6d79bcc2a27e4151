// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Proximity algorithms over a [`Forest`].
//!
//! Every algorithm walks the trees selected by [`QueryParams::trees`] in handle
//! order and composes three candidate checks, cheapest first:
//!
//! 1. the caller's [`SubFilter`],
//! 2. self-exclusion,
//! 3. the [`Sector`], if one applies.
//!
//! Sorted results are merged across trees with a min-heap keyed by distance, then
//! by [`Entity`] so equal distances always come out in the same order.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use glam::Vec3;
use hashbrown::HashSet;
use proximity_index::{
    Aabb3D, Forest, NearestParams, OrdF32, Ray, RayCast, RayHit, SpatialIndex, TreeMask, Visit,
};

use crate::descriptor::{ProximityQuery, QueryFlags};
use crate::filter::SubFilter;
use crate::sector::Sector;
use crate::world::Entity;

/// A candidate and its squared box-to-point distance.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Neighbor {
    /// The candidate.
    pub entity: Entity,
    /// Squared distance from the candidate's box to the query origin.
    pub distance_squared: f32,
}

/// Fully resolved inputs of one query run.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct QueryParams {
    /// Trees to search.
    pub trees: TreeMask,
    /// Query origin.
    pub origin: Vec3,
    /// The querying entity, if any.
    pub self_entity: Option<Entity>,
    /// Skip `self_entity`.
    pub ignore_self: bool,
    /// Order results by distance.
    pub sorted: bool,
    /// Measure distances in the horizontal plane only.
    pub ignore_y: bool,
    /// Angular constraint, already resolved to `None` when it does not apply.
    pub sector: Option<Sector>,
    /// Lower distance bound, squared and inclusive.
    pub min_range_squared: f32,
    /// Upper distance bound, squared and inclusive.
    pub range_squared: f32,
}

impl QueryParams {
    /// Unbounded, sorted query at `origin` over every tree.
    pub fn new(origin: Vec3) -> Self {
        Self {
            trees: TreeMask::ALL,
            origin,
            self_entity: None,
            ignore_self: false,
            sorted: true,
            ignore_y: false,
            sector: None,
            min_range_squared: 0.0,
            range_squared: f32::INFINITY,
        }
    }

    /// Resolve a descriptor against the querying entity's origin and sector axis.
    pub fn from_query(
        query: &ProximityQuery,
        origin: Vec3,
        forward: Vec3,
        self_entity: Option<Entity>,
    ) -> Self {
        let ignore_y = query.flags.contains(QueryFlags::IGNORE_Y);
        Self {
            trees: query.trees,
            origin,
            self_entity,
            ignore_self: query.flags.contains(QueryFlags::IGNORE_SELF),
            sorted: query.sorted(),
            ignore_y,
            sector: Sector::new(origin, forward, query.sector_degrees, ignore_y),
            min_range_squared: query.min_range_squared,
            range_squared: query.range_squared,
        }
    }

    fn nearest_params(&self) -> NearestParams {
        NearestParams::new(self.origin)
            .with_min_distance_squared(self.min_range_squared)
            .with_max_distance_squared(self.range_squared)
            .with_ignore_y(self.ignore_y)
    }

    /// Box enclosing every point within range of the origin.
    pub fn range_box(&self) -> Aabb3D {
        let r = self.range_squared.max(0.0).sqrt();
        let mut aabb = Aabb3D::from_center_half_extents(self.origin, Vec3::splat(r));
        if self.ignore_y {
            aabb.min.y = f32::NEG_INFINITY;
            aabb.max.y = f32::INFINITY;
        }
        aabb
    }

    #[inline]
    fn admits<F>(&self, filter: &F, entity: Entity, aabb: &Aabb3D) -> bool
    where
        F: SubFilter<Entity> + ?Sized,
    {
        if !filter.accept(entity, aabb) {
            return false;
        }
        if self.ignore_self && self.self_entity == Some(entity) {
            return false;
        }
        match &self.sector {
            Some(sector) => sector.contains(anchor(aabb, self.origin)),
            None => true,
        }
    }
}

/// Representative position of a candidate box for the sector test.
///
/// Infinitely tall boxes take the query height so they are judged horizontally.
fn anchor(aabb: &Aabb3D, origin: Vec3) -> Vec3 {
    let y = if aabb.min.y.is_finite() && aabb.max.y.is_finite() {
        0.5 * (aabb.min.y + aabb.max.y)
    } else {
        origin.y
    };
    Vec3::new(aabb.horizontal_center(0), y, aabb.horizontal_center(2))
}

type MergeHeap = BinaryHeap<Reverse<(OrdF32, Entity)>>;

/// The nearest qualifying candidate, or `None`.
///
/// Each tree contributes its nearest accepted candidate. Sorted queries merge
/// those winners; unsorted queries return the first one found.
pub fn nearest<I, F>(forest: &Forest<I>, params: &QueryParams, filter: &F) -> Option<Neighbor>
where
    I: SpatialIndex<Entity>,
    F: SubFilter<Entity> + ?Sized,
{
    let np = params.nearest_params();
    let single = params.trees.count() == 1;
    let mut heap = MergeHeap::new();
    for (_, tree) in forest.iter_masked(params.trees) {
        let mut found: Option<Neighbor> = None;
        tree.visit_nearest(&np, |entity, aabb, d| {
            // Keep scanning candidates tied with the winner so the smallest entity wins.
            if found.is_some_and(|w| d > w.distance_squared) {
                return Visit::Stop;
            }
            if params.admits(filter, entity, aabb) && found.is_none_or(|w| entity < w.entity) {
                found = Some(Neighbor {
                    entity,
                    distance_squared: d,
                });
            }
            Visit::Continue
        });
        let Some(winner) = found else {
            continue;
        };
        if single || !params.sorted {
            return Some(winner);
        }
        if heap.capacity() == 0 {
            heap.reserve(params.trees.count() as usize);
        }
        heap.push(Reverse((OrdF32(winner.distance_squared), winner.entity)));
    }
    heap.pop().map(|Reverse((d, entity))| Neighbor {
        entity,
        distance_squared: d.get(),
    })
}

/// Up to `k` nearest qualifying candidates, written into `out`.
///
/// Sorted queries produce `min(k, qualifying)` entities in ascending distance.
/// Unsorted queries append each tree's candidates as found, so the result may
/// hold up to `k` per tree.
pub fn k_nearest<I, F>(
    forest: &Forest<I>,
    params: &QueryParams,
    filter: &F,
    k: usize,
    out: &mut Vec<Entity>,
) where
    I: SpatialIndex<Entity>,
    F: SubFilter<Entity> + ?Sized,
{
    if k == 0 {
        return;
    }
    let np = params.nearest_params();
    let mut heap = MergeHeap::new();
    let mut scratch: HashSet<Entity> = HashSet::new();
    for (_, tree) in forest.iter_masked(params.trees) {
        scratch.clear();
        // Sized by what the tree can yield, not by the requested count.
        let cap = k.min(tree.len());
        scratch.reserve(cap);
        if params.sorted {
            heap.reserve(cap);
        }
        // Distance of this tree's k-th candidate; ties with it are still collected.
        let mut cutoff: Option<f32> = None;
        tree.visit_nearest(&np, |entity, aabb, d| {
            if cutoff.is_some_and(|c| d > c) {
                return Visit::Stop;
            }
            if !params.admits(filter, entity, aabb) || !scratch.insert(entity) {
                return Visit::Continue;
            }
            if !params.sorted {
                out.push(entity);
                return if scratch.len() >= k {
                    Visit::Stop
                } else {
                    Visit::Continue
                };
            }
            heap.push(Reverse((OrdF32(d), entity)));
            if scratch.len() == k {
                cutoff = Some(d);
            }
            Visit::Continue
        });
    }
    drain_sorted(heap, k, out);
}

/// Every qualifying candidate within range, written into `out`.
///
/// A candidate qualifies when its box overlaps [`QueryParams::range_box`] and its
/// distance lies in `[min_range_squared, range_squared]`, both ends inclusive.
pub fn within_range<I, F>(forest: &Forest<I>, params: &QueryParams, filter: &F, out: &mut Vec<Entity>)
where
    I: SpatialIndex<Entity>,
    F: SubFilter<Entity> + ?Sized,
{
    let query_box = params.range_box();
    let np = params.nearest_params();
    let mut heap = MergeHeap::new();
    let mut scratch: HashSet<Entity> = HashSet::new();
    for (_, tree) in forest.iter_masked(params.trees) {
        scratch.clear();
        tree.visit_range(&query_box, |entity, aabb| {
            let d = np.distance_squared(aabb);
            if np.accepts(d) && params.admits(filter, entity, aabb) && scratch.insert(entity) {
                if params.sorted {
                    heap.push(Reverse((OrdF32(d), entity)));
                } else {
                    out.push(entity);
                }
            }
            Visit::Continue
        });
    }
    let all = heap.len();
    drain_sorted(heap, all, out);
}

fn drain_sorted(mut heap: MergeHeap, limit: usize, out: &mut Vec<Entity>) {
    let n = limit.min(heap.len());
    out.reserve(n);
    for _ in 0..n {
        let Some(Reverse((_, entity))) = heap.pop() else {
            break;
        };
        out.push(entity);
    }
}

/// Closest ray hit across the selected trees.
///
/// `exclude` is never reported. Unsorted casts return the first tree's hit.
pub fn raycast<I, F>(
    forest: &Forest<I>,
    trees: TreeMask,
    ray: &Ray,
    max_distance: f32,
    exclude: Option<Entity>,
    filter: &F,
    sorted: bool,
) -> Option<RayHit<Entity>>
where
    I: RayCast<Entity>,
    F: SubFilter<Entity> + ?Sized,
{
    let mut best: Option<RayHit<Entity>> = None;
    for (_, tree) in forest.iter_masked(trees) {
        let hit = tree.raycast(ray, max_distance, |entity, aabb| {
            exclude != Some(entity) && filter.accept(entity, aabb)
        });
        let Some(hit) = hit else {
            continue;
        };
        if !sorted {
            return Some(hit);
        }
        let closer = match &best {
            None => true,
            Some(b) => (OrdF32(hit.distance), hit.handle) < (OrdF32(b.distance), b.handle),
        };
        if closer {
            best = Some(hit);
        }
    }
    best
}
