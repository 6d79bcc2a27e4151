// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Capability traits shared by every spatial backend.

use glam::Vec3;

use crate::types::{Aabb3D, Ray};

/// Visitor verdict controlling traversal.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Visit {
    /// Keep visiting candidates.
    Continue,
    /// Stop the traversal; no further candidates are visited.
    Stop,
}

/// Bounds for a nearest-first traversal.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct NearestParams {
    /// Query point.
    pub origin: Vec3,
    /// Candidates closer than this (squared) distance are skipped.
    pub min_distance_squared: f32,
    /// Candidates farther than this (squared) distance are never visited.
    pub max_distance_squared: f32,
    /// Measure distances in the horizontal plane only.
    pub ignore_y: bool,
}

impl NearestParams {
    /// Unbounded traversal around `origin`.
    pub const fn new(origin: Vec3) -> Self {
        Self {
            origin,
            min_distance_squared: 0.0,
            max_distance_squared: f32::INFINITY,
            ignore_y: false,
        }
    }

    /// Set the maximum squared distance.
    pub const fn with_max_distance_squared(mut self, max: f32) -> Self {
        self.max_distance_squared = max;
        self
    }

    /// Set the minimum squared distance.
    pub const fn with_min_distance_squared(mut self, min: f32) -> Self {
        self.min_distance_squared = min;
        self
    }

    /// Ignore the vertical axis when measuring distances.
    pub const fn with_ignore_y(mut self, ignore_y: bool) -> Self {
        self.ignore_y = ignore_y;
        self
    }

    /// Distance from a box to the query origin under these parameters.
    #[inline]
    pub fn distance_squared(&self, aabb: &Aabb3D) -> f32 {
        aabb.distance_squared_to_point(self.origin, self.ignore_y)
    }

    /// Whether a squared distance lies inside `[min, max]` (both inclusive).
    #[inline]
    pub fn accepts(&self, distance_squared: f32) -> bool {
        distance_squared >= self.min_distance_squared && distance_squared <= self.max_distance_squared
    }
}

/// Closest hit of a ray query.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RayHit<H> {
    /// Handle of the box that was hit.
    pub handle: H,
    /// Distance along the ray to the entry point.
    pub distance: f32,
    /// World-space entry point.
    pub point: Vec3,
}

/// A rebuild-every-cycle spatial index over boxes tagged with handles.
///
/// The lifecycle of one cycle is `clear` → any number of `add` → `rebuild`;
/// queries only observe what the last `rebuild` committed.
pub trait SpatialIndex<H: Copy> {
    /// Discard every staged and committed entry.
    fn clear(&mut self);

    /// Stage a candidate. It becomes visible to queries after [`rebuild`](Self::rebuild).
    fn add(&mut self, handle: H, aabb: Aabb3D);

    /// Commit staged candidates into the queryable structure.
    fn rebuild(&mut self);

    /// Number of committed (queryable) entries.
    fn len(&self) -> usize;

    /// Whether no entries are queryable.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Visit candidates within the bounds of `params` in ascending distance order.
    ///
    /// The visitor receives the handle, its box and its squared distance to the
    /// query origin. Equal distances are visited in insertion order.
    fn visit_nearest<F>(&self, params: &NearestParams, f: F)
    where
        F: FnMut(H, &Aabb3D, f32) -> Visit;

    /// Visit every candidate whose box overlaps `query`, in unspecified order.
    ///
    /// Each candidate is visited at most once.
    fn visit_range<F>(&self, query: &Aabb3D, f: F)
    where
        F: FnMut(H, &Aabb3D) -> Visit;
}

/// Ray casting support, provided by the grid backend only.
pub trait RayCast<H: Copy>: SpatialIndex<H> {
    /// Find the closest box hit by `ray` within `max_distance` whose handle
    /// passes `accept`.
    fn raycast<F>(&self, ray: &Ray, max_distance: f32, accept: F) -> Option<RayHit<H>>
    where
        F: FnMut(H, &Aabb3D) -> bool;
}
