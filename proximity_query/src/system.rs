// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The per-tick proximity system and its lifecycle hooks.

use glam::{Quat, Vec3};
use log::{debug, info, warn};
use proximity_index::{
    Forest, ForestError, Ray, RayCast, RayHit, SpatialIndex, TreeHandle, TreeMask,
};
use rayon::iter::{IntoParallelRefMutIterator, ParallelIterator};

use crate::config::{ConfiguredIndex, ProximityConfig};
use crate::descriptor::{ProximityQuery, ProximityResults, QueryFlags, QueryMode};
use crate::filter::{AliveFilter, SubFilter};
use crate::pipeline::{IndexingPipeline, PipelineStats};
use crate::query::{self, QueryParams};
use crate::throttle::should_run;
use crate::world::{Entity, World, WorldTransform};

/// Errors raised by the lifecycle hooks.
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SystemError {
    /// A tree could not be registered.
    #[error("could not register a tree")]
    Forest(#[from] ForestError),
    /// `on_awake` ran twice without an `on_destroy` in between.
    #[error("proximity system is already awake")]
    AlreadyAwake,
}

/// A querying entity, its descriptor and the result list it owns.
#[derive(Clone, Debug, PartialEq)]
pub struct QuerySubscriber {
    /// The querying entity.
    pub entity: Entity,
    /// What it looks for.
    pub query: ProximityQuery,
    /// Where its results go.
    pub results: ProximityResults,
}

impl QuerySubscriber {
    /// A subscriber with an empty result list of the given capacity.
    pub fn new(entity: Entity, query: ProximityQuery, capacity: usize) -> Self {
        Self {
            entity,
            query,
            results: ProximityResults::with_capacity(capacity),
        }
    }
}

/// Counters from one tick.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TickStats {
    /// The tick that ran.
    pub tick: u64,
    /// Indexing counters.
    pub pipeline: PipelineStats,
    /// Subscribers whose query executed.
    pub queries_run: usize,
}

/// Owns a [`Forest`] of one index kind and runs the per-tick cycle over it.
///
/// A tick is the indexing pipeline followed by the query fan-out; the pipeline
/// always completes before the first query reads the forest.
#[derive(Debug)]
pub struct ProximitySystem<I> {
    config: ProximityConfig,
    forest: Forest<I>,
    tick: u64,
    awake: bool,
}

impl<I> ProximitySystem<I>
where
    I: SpatialIndex<Entity> + ConfiguredIndex + Send + Sync,
{
    /// Create a system. No tree exists until [`on_awake`](Self::on_awake) or
    /// [`add_tree`](Self::add_tree).
    pub fn new(config: ProximityConfig) -> Self {
        Self {
            config,
            forest: Forest::new(),
            tick: 0,
            awake: false,
        }
    }

    /// The configuration this system was built with.
    pub fn config(&self) -> &ProximityConfig {
        &self.config
    }

    /// The indexes, as of the last completed pipeline run.
    pub fn forest(&self) -> &Forest<I> {
        &self.forest
    }

    /// The next tick to run.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// One-time setup: allocate the configured number of trees.
    pub fn on_awake(&mut self) -> Result<(), SystemError> {
        if self.awake {
            return Err(SystemError::AlreadyAwake);
        }
        for _ in 0..self.config.initial_trees {
            self.add_tree()?;
        }
        self.awake = true;
        info!("proximity system awake with {} trees", self.forest.len());
        Ok(())
    }

    /// Register one more tree built from the configuration.
    pub fn add_tree(&mut self) -> Result<TreeHandle, ForestError> {
        self.add_tree_with(I::from_config(&self.config))
    }

    /// Register a custom-built tree.
    pub fn add_tree_with(&mut self, index: I) -> Result<TreeHandle, ForestError> {
        self.forest.add_tree_with(index).inspect_err(|err| {
            warn!("{err}");
        })
    }

    /// Run one tick: rebuild every tree from `world`, then run the queries of
    /// every subscriber whose throttle fires.
    pub fn on_update<W>(&mut self, world: &W, subscribers: &mut [QuerySubscriber]) -> TickStats
    where
        W: World + ?Sized,
    {
        let pipeline = IndexingPipeline::run(&mut self.forest, world);
        let queries_run = self.run_queries(world, subscribers);
        let stats = TickStats {
            tick: self.tick,
            pipeline,
            queries_run,
        };
        debug!("tick {} ran {queries_run} of {} queries", self.tick, subscribers.len());
        self.tick = self.tick.wrapping_add(1);
        stats
    }

    /// Run the due queries against the current forest, in parallel over subscribers.
    ///
    /// Returns how many queries executed. Subscribers skipped by the throttle or
    /// lacking a transform keep their previous results.
    pub fn run_queries<W>(&self, world: &W, subscribers: &mut [QuerySubscriber]) -> usize
    where
        W: World + ?Sized,
    {
        let registered = self.forest.mask();
        let filter = AliveFilter::new(world);
        subscribers
            .par_iter_mut()
            .filter(|sub| should_run(self.tick, sub.entity.id(), sub.query.update_per_tick))
            .map(|sub| {
                let Some(transform) = world.transform(sub.entity) else {
                    return 0;
                };
                if sub.query.trees.0 & registered.0 == 0 {
                    warn!("{:?} queries no registered tree ({:?})", sub.entity, sub.query.trees);
                    sub.results.clear();
                    return 1;
                }
                let frame = sector_frame(world, sub.entity, &transform, &sub.query);
                let me = Some(sub.entity);
                match sub.query.mode() {
                    QueryMode::Range => {
                        self.fill_all(&sub.query, &frame, me, &filter, &mut sub.results);
                    }
                    QueryMode::Nearest | QueryMode::KNearest(_) => {
                        self.fill_nearest(&sub.query, &frame, me, &filter, &mut sub.results);
                    }
                }
                1
            })
            .sum()
    }

    /// Teardown: drop every tree and reset the tick counter.
    pub fn on_destroy(&mut self) {
        info!("proximity system destroyed after {} ticks", self.tick);
        self.forest.reset();
        self.tick = 0;
        self.awake = false;
    }

    /// Run a nearest-first or k-nearest query for one entity.
    ///
    /// `frame` supplies the origin and the sector axis. A descriptor in range
    /// mode is answered as [`fill_all`](Self::fill_all) would.
    pub fn fill_nearest<F>(
        &self,
        query: &ProximityQuery,
        frame: &WorldTransform,
        self_entity: Option<Entity>,
        filter: &F,
        results: &mut ProximityResults,
    ) where
        F: SubFilter<Entity> + ?Sized,
    {
        let params = QueryParams::from_query(query, frame.position, frame.forward(), self_entity);
        results.replace_with(|out| match query.mode() {
            QueryMode::Nearest => {
                out.extend(query::nearest(&self.forest, &params, filter).map(|n| n.entity));
            }
            QueryMode::KNearest(k) => query::k_nearest(&self.forest, &params, filter, k, out),
            QueryMode::Range => query::within_range(&self.forest, &params, filter, out),
        });
    }

    /// Collect every qualifying entity within range, regardless of `nearest_count`.
    pub fn fill_all<F>(
        &self,
        query: &ProximityQuery,
        frame: &WorldTransform,
        self_entity: Option<Entity>,
        filter: &F,
        results: &mut ProximityResults,
    ) where
        F: SubFilter<Entity> + ?Sized,
    {
        let params = QueryParams::from_query(query, frame.position, frame.forward(), self_entity);
        results.replace_with(|out| query::within_range(&self.forest, &params, filter, out));
    }

    /// Cast a ray through the selected trees.
    pub fn cast_ray<F>(
        &self,
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
        query::raycast(&self.forest, trees, ray, max_distance, exclude, filter, sorted)
    }
}

/// Origin of `entity` with the rotation its sector is measured against.
fn sector_frame<W: World + ?Sized>(
    world: &W,
    entity: Entity,
    transform: &WorldTransform,
    query: &ProximityQuery,
) -> WorldTransform {
    if !query.flags.contains(QueryFlags::USE_PARENT_ROTATION) {
        return *transform;
    }
    match world.parent(entity).and_then(|parent| world.transform(parent)) {
        Some(parent) => transform.with_rotation(parent.rotation),
        None => *transform,
    }
}

/// Direction helper for ad-hoc queries: a frame at `position` looking along `forward`.
pub fn frame_looking_at(position: Vec3, forward: Vec3) -> WorldTransform {
    let forward = forward.normalize_or_zero();
    if forward == Vec3::ZERO {
        return WorldTransform::from_position(position);
    }
    WorldTransform::from_position(position).with_rotation(Quat::from_rotation_arc(Vec3::Z, forward))
}
