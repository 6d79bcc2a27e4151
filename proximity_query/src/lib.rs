// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=proximity_query --heading-base-level=0

//! Proximity Query: per-tick "what is near me" answers for many entities at once.
//!
//! This crate sits on top of [`proximity_index`] and turns its rebuild-every-cycle
//! indexes into a game-style system:
//!
//! - Entities carrying a [`SpatialShape`] are collected into a [`Forest`] of indexes
//!   every tick by the [`IndexingPipeline`] (`ClearAll → {CollectRadius ∥ CollectRect} → RebuildAll`).
//! - Entities carrying a [`ProximityQuery`] then run one of four algorithms against the
//!   rebuilt forest: nearest-first, bounded k-nearest, unbounded range, or ray cast.
//! - Every algorithm composes a caller [`SubFilter`], self-exclusion and an angular [`Sector`].
//! - Queries can be throttled to every `N` ticks, staggered by entity id.
//!
//! Entity storage is not part of this crate. Implement [`World`] for your store, or use
//! [`MemoryWorld`] in tests and tools.
//!
//! # Example
//!
//! ```rust
//! use glam::Vec3;
//! use proximity_index::{Bvh, TreeHandle};
//! use proximity_query::{
//!     Entity, MemoryWorld, ProximityConfig, ProximityQuery, ProximitySystem, QuerySubscriber,
//!     SpatialShape, WorldTransform,
//! };
//!
//! let mut system: ProximitySystem<Bvh<Entity>> = ProximitySystem::new(ProximityConfig::default());
//! system.on_awake().unwrap();
//!
//! let mut world = MemoryWorld::new();
//! let shape = SpatialShape::radius(TreeHandle(0), 0.5);
//! let me = world.spawn_at(WorldTransform::IDENTITY, Some(shape));
//! let friend = world.spawn_at(WorldTransform::from_position(Vec3::new(2.0, 0.0, 0.0)), Some(shape));
//!
//! let mut subscribers = [QuerySubscriber::new(me, ProximityQuery::new().range(10.0), 4)];
//! system.on_update(&world, &mut subscribers);
//! assert_eq!(subscribers[0].results.first(), Some(friend));
//! ```
//!
//! ## Result ordering
//!
//! Sorted results are in ascending squared box-to-point distance. Candidates at equal
//! distance are ordered by [`Entity`]. Unsorted results (`QueryFlags::IGNORE_SORTING`)
//! skip the merge and may differ from the sorted answer when several trees hold
//! qualifying candidates.
//!
//! ## Features
//!
//! - `serde`: `Serialize`/`Deserialize` for descriptors, shapes and configuration.

mod config;
mod descriptor;
mod filter;
mod pipeline;
pub mod query;
mod sector;
mod shape;
mod system;
mod throttle;
mod world;

pub use config::{ConfiguredIndex, ProximityConfig};
pub use descriptor::{ProximityQuery, ProximityResults, QueryFlags, QueryMode};
pub use filter::{AcceptAll, AliveFilter, SubFilter};
pub use pipeline::{IndexingPipeline, PipelineStats};
pub use query::{Neighbor, QueryParams};
pub use sector::Sector;
pub use shape::{ShapeKind, SpatialShape};
pub use system::{ProximitySystem, QuerySubscriber, SystemError, TickStats, frame_looking_at};
pub use throttle::should_run;
pub use world::{Entity, MemoryWorld, SpatialEntity, World, WorldTransform};

pub use proximity_index::{Forest, TreeHandle, TreeMask};
