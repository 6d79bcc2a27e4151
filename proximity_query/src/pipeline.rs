// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The per-tick indexing pipeline.
//!
//! `ClearAll → {CollectRadius ∥ CollectRect} → RebuildAll`
//!
//! Each phase is a rayon task graph joined before the next one starts. Collection
//! folds the world's spatial entities into per-tree staging buckets, so every tree
//! is written by exactly one task during the rebuild.

use log::{debug, trace};
use proximity_index::{Aabb3D, Forest, SpatialIndex};
use rayon::iter::{
    IndexedParallelIterator, IntoParallelIterator, IntoParallelRefIterator, ParallelIterator,
};

use crate::world::{Entity, SpatialEntity, World};

/// Counters from one pipeline run.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Trees cleared and rebuilt.
    pub trees: usize,
    /// Radius-shaped entities indexed.
    pub radius_shaped: usize,
    /// Rectangle-shaped entities indexed.
    pub rect_shaped: usize,
    /// Entities skipped because their transform was not computed.
    pub skipped: usize,
}

impl PipelineStats {
    /// Entities indexed in total.
    pub fn indexed(&self) -> usize {
        self.radius_shaped + self.rect_shaped
    }
}

/// Staging buckets produced by one collection pass.
struct Collected {
    buckets: Vec<Vec<(Entity, Aabb3D)>>,
    indexed: usize,
    skipped: usize,
}

impl Collected {
    fn new(trees: usize) -> Self {
        Self {
            buckets: (0..trees).map(|_| Vec::new()).collect(),
            indexed: 0,
            skipped: 0,
        }
    }

    fn push<W: World + ?Sized>(mut self, world: &W, spatial: &SpatialEntity) -> Self {
        let slot = spatial.shape.tree.index();
        debug_assert!(
            slot < self.buckets.len(),
            "{:?} references unregistered tree {:?}",
            spatial.entity,
            spatial.shape.tree
        );
        let Some(bucket) = self.buckets.get_mut(slot) else {
            return self;
        };
        match world.transform(spatial.entity) {
            Some(transform) => {
                bucket.push((spatial.entity, spatial.shape.aabb(transform.position)));
                self.indexed += 1;
            }
            None => self.skipped += 1,
        }
        self
    }

    fn merge(mut self, other: Self) -> Self {
        for (mine, theirs) in self.buckets.iter_mut().zip(other.buckets) {
            if mine.is_empty() {
                *mine = theirs;
            } else {
                mine.extend(theirs);
            }
        }
        self.indexed += other.indexed;
        self.skipped += other.skipped;
        self
    }
}

/// Collect the entities of one shape family into per-tree buckets, preserving world order.
fn collect<W: World + ?Sized>(world: &W, trees: usize, radius: bool) -> Collected {
    world
        .spatial_entities()
        .par_iter()
        .filter(|spatial| spatial.shape.is_radius() == radius)
        .fold(|| Collected::new(trees), |acc, spatial| acc.push(world, spatial))
        .reduce(|| Collected::new(trees), Collected::merge)
}

/// Drives one maintenance cycle over a [`Forest`].
#[derive(Copy, Clone, Debug, Default)]
pub struct IndexingPipeline;

impl IndexingPipeline {
    /// Clear every tree, collect every spatial entity with a resolved transform
    /// into its tree, and rebuild.
    ///
    /// Entities without a transform this tick are skipped silently. An entity
    /// assigned to an unregistered tree is a programming error: debug builds
    /// assert, release builds skip it.
    pub fn run<I, W>(forest: &mut Forest<I>, world: &W) -> PipelineStats
    where
        I: SpatialIndex<Entity> + Send,
        W: World + ?Sized,
    {
        let trees = forest.len();

        forest.par_trees_mut().for_each(|tree| tree.clear());

        let (radius, rect) = rayon::join(
            || collect(world, trees, true),
            || collect(world, trees, false),
        );

        let stats = PipelineStats {
            trees,
            radius_shaped: radius.indexed,
            rect_shaped: rect.indexed,
            skipped: radius.skipped + rect.skipped,
        };

        forest
            .par_trees_mut()
            .zip(radius.buckets.into_par_iter().zip(rect.buckets))
            .enumerate()
            .for_each(|(slot, (tree, (radius, rect)))| {
                for (entity, aabb) in radius.into_iter().chain(rect) {
                    tree.add(entity, aabb);
                }
                tree.rebuild();
                trace!("rebuilt tree {slot} with {} entries", tree.len());
            });

        debug!(
            "indexed {} entities into {} trees ({} radius, {} rect, {} skipped)",
            stats.indexed(),
            stats.trees,
            stats.radius_shaped,
            stats.rect_shaped,
            stats.skipped
        );
        stats
    }
}
