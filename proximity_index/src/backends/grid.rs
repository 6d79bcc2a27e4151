// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Uniform grid backend (spatial hash) for 3D AABBs.
//!
//! This backend buckets AABBs into fixed-size cells over the horizontal X/Z
//! plane and answers queries by touching only the cells around the query
//! primitive. The vertical axis is never bucketed, so boxes flattened to an
//! infinite height are as cheap as any other. It is intended for workloads with:
//! - moderately uniform horizontal density (units on a map, crowds),
//! - full rebuilds every cycle, and
//! - query radii that are small compared to the full world extent.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fmt::Debug;

use hashbrown::{HashMap, HashSet};
use smallvec::SmallVec;

use crate::backend::{NearestParams, RayCast, RayHit, SpatialIndex, Visit};
use crate::types::{Aabb3D, OrdF32, Ray};

/// Tuning knobs for [`Grid`].
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GridConfig {
    /// Edge length of a square cell in world units.
    pub cell_size: f32,
    /// World X coordinate of the corner of cell `(0, 0)`.
    pub origin_x: f32,
    /// World Z coordinate of the corner of cell `(0, 0)`.
    pub origin_z: f32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            cell_size: 16.0,
            origin_x: 0.0,
            origin_z: 0.0,
        }
    }
}

/// Map a coordinate to a grid coordinate along one axis.
///
/// Rounds towards negative infinity and saturates to the `i32` range.
#[allow(
    clippy::cast_possible_truncation,
    reason = "Grid cell indices are intentionally i32; out-of-range values are saturated."
)]
#[inline]
pub fn cell_coord(value: f32, origin: f32, cell_size: f32) -> i32 {
    debug_assert!(cell_size > 0.0, "grid cell_size must be strictly positive");
    let t = (value - origin) / cell_size;
    let coord = t as i32;

    // Round towards -∞ (the cast above has already truncated).
    if t < 0.0 && (coord as f32) > t {
        coord.saturating_sub(1)
    } else {
        coord
    }
}

/// Inclusive rectangle of cell coordinates.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct CellRect {
    min_x: i64,
    min_z: i64,
    max_x: i64,
    max_z: i64,
}

impl CellRect {
    fn contains(&self, x: i64, z: i64) -> bool {
        self.min_x <= x && x <= self.max_x && self.min_z <= z && z <= self.max_z
    }

    fn include(&mut self, other: &Self) {
        self.min_x = self.min_x.min(other.min_x);
        self.min_z = self.min_z.min(other.min_z);
        self.max_x = self.max_x.max(other.max_x);
        self.max_z = self.max_z.max(other.max_z);
    }

    fn clip(&self, other: &Self) -> Option<Self> {
        let r = Self {
            min_x: self.min_x.max(other.min_x),
            min_z: self.min_z.max(other.min_z),
            max_x: self.max_x.min(other.max_x),
            max_z: self.max_z.min(other.max_z),
        };
        (r.min_x <= r.max_x && r.min_z <= r.max_z).then_some(r)
    }

    fn cell_count(&self) -> u64 {
        (self.max_x - self.min_x + 1)
            .unsigned_abs()
            .saturating_mul((self.max_z - self.min_z + 1).unsigned_abs())
    }

    /// Chebyshev distance from a cell to this rectangle, zero if inside.
    fn ring_distance(&self, x: i64, z: i64) -> i64 {
        let gap = |v: i64, lo: i64, hi: i64| (lo - v).max(v - hi).max(0);
        gap(x, self.min_x, self.max_x).max(gap(z, self.min_z, self.max_z))
    }

    /// Chebyshev distance from a cell to the farthest corner of this rectangle.
    fn ring_extent(&self, x: i64, z: i64) -> i64 {
        (x - self.min_x)
            .abs()
            .max((self.max_x - x).abs())
            .max((z - self.min_z).abs())
            .max((self.max_z - z).abs())
    }
}

#[derive(Default)]
struct Cell {
    slots: SmallVec<[u32; 8]>,
}

/// Uniform grid backend with fixed cell size over handles of type `H`.
pub struct Grid<H> {
    cell_size: f32,
    origin_x: f32,
    origin_z: f32,
    staged: Vec<(H, Aabb3D)>,
    entries: Vec<(H, Aabb3D)>,
    cells: HashMap<(i32, i32), Cell>,
    occupied: Option<CellRect>,
}

impl<H> Debug for Grid<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Grid")
            .field("cell_size", &self.cell_size)
            .field("origin_x", &self.origin_x)
            .field("origin_z", &self.origin_z)
            .field("entries", &self.entries.len())
            .field("staged", &self.staged.len())
            .field("cells", &self.cells.len())
            .finish_non_exhaustive()
    }
}

impl<H> Default for Grid<H> {
    fn default() -> Self {
        Self::with_config(GridConfig::default())
    }
}

impl<H> Grid<H> {
    /// Create a new grid backend with the given cell size and origin at (0, 0).
    pub fn new(cell_size: f32) -> Self {
        Self::with_config(GridConfig {
            cell_size,
            ..GridConfig::default()
        })
    }

    /// Create a new grid backend from a full configuration.
    pub fn with_config(config: GridConfig) -> Self {
        debug_assert!(
            config.cell_size > 0.0,
            "cell_size must be strictly positive"
        );
        Self {
            cell_size: config.cell_size,
            origin_x: config.origin_x,
            origin_z: config.origin_z,
            staged: Vec::new(),
            entries: Vec::new(),
            cells: HashMap::new(),
            occupied: None,
        }
    }

    /// Number of non-empty cells.
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    fn cell_of(&self, x: f32, z: f32) -> (i64, i64) {
        (
            i64::from(cell_coord(x, self.origin_x, self.cell_size)),
            i64::from(cell_coord(z, self.origin_z, self.cell_size)),
        )
    }

    fn covered_cells(&self, aabb: &Aabb3D) -> CellRect {
        let (min_x, min_z) = self.cell_of(aabb.min.x, aabb.min.z);
        let (max_x, max_z) = self.cell_of(aabb.max.x, aabb.max.z);
        CellRect {
            min_x: min_x.min(max_x),
            min_z: min_z.min(max_z),
            max_x: min_x.max(max_x),
            max_z: min_z.max(max_z),
        }
    }

    #[allow(
        clippy::cast_possible_truncation,
        reason = "Cell coordinates originate from i32 values and stay in range."
    )]
    fn cell(&self, x: i64, z: i64) -> Option<&Cell> {
        self.cells.get(&(x as i32, z as i32))
    }

    /// World-space horizontal distance from `p` to the outside of the block of
    /// cells within Chebyshev ring `r` of `(cx, cz)`.
    #[allow(
        clippy::cast_precision_loss,
        reason = "Cell coordinates are small enough to be exact in f32 for realistic worlds."
    )]
    fn ring_bound(&self, cx: i64, cz: i64, r: i64, x: f32, z: f32) -> f32 {
        let cs = self.cell_size;
        let lo_x = self.origin_x + (cx - r) as f32 * cs;
        let hi_x = self.origin_x + (cx + r + 1) as f32 * cs;
        let lo_z = self.origin_z + (cz - r) as f32 * cs;
        let hi_z = self.origin_z + (cz + r + 1) as f32 * cs;
        (x - lo_x).min(hi_x - x).min(z - lo_z).min(hi_z - z).max(0.0)
    }

    /// Visit the cells of Chebyshev ring `r` around `(cx, cz)` that lie in `clip`.
    fn for_each_ring_cell(&self, cx: i64, cz: i64, r: i64, clip: &CellRect, mut f: impl FnMut(&Cell)) {
        let mut visit = |x: i64, z: i64| {
            if clip.contains(x, z)
                && let Some(cell) = self.cell(x, z)
            {
                f(cell);
            }
        };
        if r == 0 {
            visit(cx, cz);
            return;
        }
        let x0 = (cx - r).max(clip.min_x);
        let x1 = (cx + r).min(clip.max_x);
        for z in [cz - r, cz + r] {
            if clip.min_z <= z && z <= clip.max_z {
                for x in x0..=x1 {
                    visit(x, z);
                }
            }
        }
        let z0 = (cz - r + 1).max(clip.min_z);
        let z1 = (cz + r - 1).min(clip.max_z);
        for x in [cx - r, cx + r] {
            if clip.min_x <= x && x <= clip.max_x {
                for z in z0..=z1 {
                    visit(x, z);
                }
            }
        }
    }
}

impl<H: Copy> SpatialIndex<H> for Grid<H> {
    fn clear(&mut self) {
        self.staged.clear();
        self.entries.clear();
        self.cells.clear();
        self.occupied = None;
    }

    fn add(&mut self, handle: H, aabb: Aabb3D) {
        debug_assert!(!aabb.is_empty(), "inverted AABB staged into the grid");
        debug_assert!(
            aabb.min.x.is_finite()
                && aabb.max.x.is_finite()
                && aabb.min.z.is_finite()
                && aabb.max.z.is_finite(),
            "grid entries need a finite horizontal footprint"
        );
        self.staged.push((handle, aabb));
    }

    fn rebuild(&mut self) {
        assert!(
            self.entries.len() + self.staged.len() < u32::MAX as usize,
            "too many entries for one grid"
        );
        let first_new = self.entries.len();
        self.entries.append(&mut self.staged);
        for i in first_new..self.entries.len() {
            let rect = self.covered_cells(&self.entries[i].1);
            match &mut self.occupied {
                Some(occ) => occ.include(&rect),
                None => self.occupied = Some(rect),
            }
            #[allow(
                clippy::cast_possible_truncation,
                reason = "Slot count is asserted to fit in u32 and cell coordinates come from i32."
            )]
            for x in rect.min_x..=rect.max_x {
                for z in rect.min_z..=rect.max_z {
                    self.cells
                        .entry((x as i32, z as i32))
                        .or_default()
                        .slots
                        .push(i as u32);
                }
            }
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn visit_nearest<F>(&self, params: &NearestParams, mut f: F)
    where
        F: FnMut(H, &Aabb3D, f32) -> Visit,
    {
        let Some(occ) = self.occupied else {
            return;
        };
        let (x, z) = (params.origin.x, params.origin.z);
        let (cx, cz) = self.cell_of(x, z);
        let first_ring = occ.ring_distance(cx, cz);
        let last_ring = occ.ring_extent(cx, cz);

        let mut seen: HashSet<u32> = HashSet::new();
        let mut pending: BinaryHeap<Reverse<(OrdF32, u32)>> = BinaryHeap::new();
        for r in first_ring..=last_ring {
            self.for_each_ring_cell(cx, cz, r, &occ, |cell| {
                for &slot in &cell.slots {
                    if !seen.insert(slot) {
                        continue;
                    }
                    let d = params.distance_squared(&self.entries[slot as usize].1);
                    if params.accepts(d) {
                        pending.push(Reverse((OrdF32(d), slot)));
                    }
                }
            });

            // Everything not yet discovered lies outside the visited block.
            let bound = self.ring_bound(cx, cz, r, x, z);
            let bound_sq = bound * bound;
            while let Some(Reverse((d, slot))) = pending.peek().copied() {
                if d.get() >= bound_sq {
                    break;
                }
                pending.pop();
                let (handle, aabb) = &self.entries[slot as usize];
                if f(*handle, aabb, d.get()) == Visit::Stop {
                    return;
                }
            }
            if bound_sq > params.max_distance_squared {
                break;
            }
        }
        while let Some(Reverse((d, slot))) = pending.pop() {
            let (handle, aabb) = &self.entries[slot as usize];
            if f(*handle, aabb, d.get()) == Visit::Stop {
                return;
            }
        }
    }

    fn visit_range<F>(&self, query: &Aabb3D, mut f: F)
    where
        F: FnMut(H, &Aabb3D) -> Visit,
    {
        let Some(occ) = self.occupied else {
            return;
        };
        let Some(rect) = self.covered_cells(query).clip(&occ) else {
            return;
        };

        let mut seen: HashSet<u32> = HashSet::new();
        let mut visit_cell = |cell: &Cell| -> Visit {
            for &slot in &cell.slots {
                if !seen.insert(slot) {
                    continue;
                }
                let (handle, aabb) = &self.entries[slot as usize];
                if aabb.overlaps(query) && f(*handle, aabb) == Visit::Stop {
                    return Visit::Stop;
                }
            }
            Visit::Continue
        };

        // Sparse grids: walking the occupied cells is cheaper than the rectangle.
        if rect.cell_count() > self.cells.len() as u64 {
            for (&(x, z), cell) in &self.cells {
                if rect.contains(i64::from(x), i64::from(z)) && visit_cell(cell) == Visit::Stop {
                    return;
                }
            }
            return;
        }
        for x in rect.min_x..=rect.max_x {
            for z in rect.min_z..=rect.max_z {
                if let Some(cell) = self.cell(x, z)
                    && visit_cell(cell) == Visit::Stop
                {
                    return;
                }
            }
        }
    }
}

impl<H: Copy> RayCast<H> for Grid<H> {
    #[allow(
        clippy::cast_precision_loss,
        reason = "Cell coordinates are small enough to be exact in f32 for realistic worlds."
    )]
    fn raycast<F>(&self, ray: &Ray, max_distance: f32, mut accept: F) -> Option<RayHit<H>>
    where
        F: FnMut(H, &Aabb3D) -> bool,
    {
        let occ = self.occupied?;
        if ray.direction == glam::Vec3::ZERO {
            return None;
        }
        let cs = self.cell_size;

        // Clip the ray to the occupied columns.
        let world = Aabb3D::new(
            glam::Vec3::new(
                self.origin_x + occ.min_x as f32 * cs,
                f32::NEG_INFINITY,
                self.origin_z + occ.min_z as f32 * cs,
            ),
            glam::Vec3::new(
                self.origin_x + (occ.max_x + 1) as f32 * cs,
                f32::INFINITY,
                self.origin_z + (occ.max_z + 1) as f32 * cs,
            ),
        );
        let t_start = ray.intersect_aabb(&world, max_distance)?;

        let start = ray.at(t_start);
        let (sx, sz) = self.cell_of(start.x, start.z);
        let mut cell = (
            sx.clamp(occ.min_x, occ.max_x),
            sz.clamp(occ.min_z, occ.max_z),
        );

        let (dx, dz) = (ray.direction.x, ray.direction.z);
        let step_x: i64 = if dx > 0.0 { 1 } else if dx < 0.0 { -1 } else { 0 };
        let step_z: i64 = if dz > 0.0 { 1 } else if dz < 0.0 { -1 } else { 0 };
        let next_boundary = |c: i64, step: i64, origin: f32| -> f32 {
            if step > 0 {
                origin + (c + 1) as f32 * cs
            } else {
                origin + c as f32 * cs
            }
        };
        let mut t_max_x = if step_x != 0 {
            (next_boundary(cell.0, step_x, self.origin_x) - ray.origin.x) / dx
        } else {
            f32::INFINITY
        };
        let mut t_max_z = if step_z != 0 {
            (next_boundary(cell.1, step_z, self.origin_z) - ray.origin.z) / dz
        } else {
            f32::INFINITY
        };
        let t_delta_x = if step_x != 0 { cs / dx.abs() } else { f32::INFINITY };
        let t_delta_z = if step_z != 0 { cs / dz.abs() } else { f32::INFINITY };

        let mut best: Option<(f32, u32)> = None;
        let mut tested: HashSet<u32> = HashSet::new();
        let mut t_curr = t_start;
        while occ.contains(cell.0, cell.1) && t_curr <= max_distance {
            // Boxes not tested yet are first entered at or after `t_curr`.
            if best.is_some_and(|(t, _)| t < t_curr) {
                break;
            }
            if let Some(c) = self.cell(cell.0, cell.1) {
                for &slot in &c.slots {
                    if !tested.insert(slot) {
                        continue;
                    }
                    let (handle, aabb) = &self.entries[slot as usize];
                    let Some(t) = ray.intersect_aabb(aabb, max_distance) else {
                        continue;
                    };
                    let closer = match best {
                        None => true,
                        Some((bt, bs)) => t < bt || (t == bt && slot < bs),
                    };
                    if closer && accept(*handle, aabb) {
                        best = Some((t, slot));
                    }
                }
            }
            if step_x == 0 && step_z == 0 {
                break;
            }
            if t_max_x < t_max_z {
                cell.0 += step_x;
                t_curr = t_max_x;
                t_max_x += t_delta_x;
            } else {
                cell.1 += step_z;
                t_curr = t_max_z;
                t_max_z += t_delta_z;
            }
        }

        best.map(|(distance, slot)| RayHit {
            handle: self.entries[slot as usize].0,
            distance,
            point: ray.at(distance),
        })
    }
}
