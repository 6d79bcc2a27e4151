// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=proximity_index --heading-base-level=0

//! Proximity Index: rebuild-every-cycle 3D AABB indexes.
//!
//! Proximity Index is the storage half of a per-tick proximity engine.
//!
//! - Stage axis-aligned bounding boxes (AABBs) tagged with an opaque handle, then rebuild.
//! - Visit candidates nearest-first (box-to-point distance), or every box overlapping a range.
//! - Cast rays against the uniform grid backend.
//! - Group several independent indexes in a [`Forest`] and address them with a [`TreeMask`].
//!
//! Every index follows the same cycle: [`SpatialIndex::clear`], any number of
//! [`SpatialIndex::add`], then [`SpatialIndex::rebuild`]. Nothing staged is visible
//! before the rebuild, and nothing survives a clear.
//!
//! Distances are squared distances from the box surface to the query point. Boxes may be
//! flattened to an infinite vertical extent; both backends only partition the horizontal
//! X/Z plane, so such boxes are handled without producing NaNs.
//!
//! ## Features
//!
//! - `rayon` *(default)*: [`Forest::par_trees_mut`] for per-tree parallel phases.
//! - `serde`: `Serialize`/`Deserialize` for the geometry and configuration types.
//!
//! # Example
//!
//! ```rust
//! use glam::Vec3;
//! use proximity_index::{Aabb3D, Bvh, NearestParams, SpatialIndex, Visit};
//!
//! let mut tree: Bvh<u32> = Bvh::default();
//! tree.clear();
//! tree.add(1, Aabb3D::from_center_half_extents(Vec3::new(5.0, 0.0, 0.0), Vec3::ONE));
//! tree.add(2, Aabb3D::from_center_half_extents(Vec3::new(2.0, 0.0, 0.0), Vec3::ONE));
//! tree.rebuild();
//!
//! // The first visit is the nearest candidate.
//! let mut nearest = None;
//! tree.visit_nearest(&NearestParams::new(Vec3::ZERO), |handle, _, distance_squared| {
//!     nearest = Some((handle, distance_squared));
//!     Visit::Stop
//! });
//! assert_eq!(nearest, Some((2, 1.0)));
//! ```
//!
//! The grid backend answers the same queries and can also cast rays:
//!
//! ```rust
//! use glam::Vec3;
//! use proximity_index::{Aabb3D, Grid, RayCast, Ray, SpatialIndex};
//!
//! let mut grid: Grid<u32> = Grid::new(8.0);
//! grid.add(7, Aabb3D::from_center_half_extents(Vec3::new(0.0, 0.0, 20.0), Vec3::ONE));
//! grid.rebuild();
//!
//! let hit = grid.raycast(&Ray::new(Vec3::ZERO, Vec3::Z), 50.0, |_, _| true);
//! assert_eq!(hit.map(|h| (h.handle, h.distance)), Some((7, 19.0)));
//! ```
//!
//! ## Choosing a backend
//!
//! - [`Bvh`]: binary hierarchy with SAH-like splits. A good general-purpose choice when the
//!   distribution is irregular or query radii vary widely.
//! - [`Grid`]: uniform grid with configurable cell size. A good fit when density is roughly
//!   uniform and query radii are small compared to the world extent. Required for ray casts.
//!   See the [`backends`] docs for a brief SAH overview.
//!
//! ### Float semantics
//!
//! This crate assumes no NaNs in coordinates. Debug builds may assert.
//! SAH metrics use widened accumulators to reduce precision pitfalls.

mod backend;
pub mod backends;
mod forest;
mod types;

pub use backend::{NearestParams, RayCast, RayHit, SpatialIndex, Visit};
pub use backends::{Bvh, BvhConfig, Grid, GridConfig};
pub use forest::{Forest, ForestError, TreeHandle, TreeMask};
pub use types::{Aabb3D, OrdF32, Ray};
