// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Primitive geometry types and helpers.

use std::cmp::Ordering;

use glam::Vec3;

/// Axis-aligned bounding box in 3D.
///
/// The vertical axis is `y`. Boxes flattened for 2D proximity carry an infinite
/// vertical extent; every operation here stays NaN-free for such boxes as long as
/// the horizontal extents are finite.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Aabb3D {
    /// Minimum corner.
    pub min: Vec3,
    /// Maximum corner.
    pub max: Vec3,
}

impl Aabb3D {
    /// Create a new AABB from min/max corners.
    #[inline(always)]
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Create an AABB centered on `center` with the given half extents.
    #[inline]
    pub fn from_center_half_extents(center: Vec3, half_extents: Vec3) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    /// A degenerate AABB containing exactly one point.
    #[inline]
    pub const fn from_point(point: Vec3) -> Self {
        Self {
            min: point,
            max: point,
        }
    }

    /// Whether this AABB contains the point (edges inclusive).
    #[inline]
    pub fn contains_point(&self, p: Vec3) -> bool {
        self.min.cmple(p).all() && p.cmple(self.max).all()
    }

    /// Determines whether this AABB overlaps with another in any way.
    ///
    /// The faces of the AABB are considered to be part of it, so two AABBs that
    /// only touch are considered to overlap.
    ///
    /// # Examples
    ///
    /// ```
    /// use glam::Vec3;
    /// use proximity_index::Aabb3D;
    ///
    /// let a = Aabb3D::new(Vec3::ZERO, Vec3::splat(10.0));
    /// let b = Aabb3D::new(Vec3::new(10.0, 0.0, 0.0), Vec3::new(20.0, 10.0, 10.0));
    /// assert!(a.overlaps(&b));
    ///
    /// let c = Aabb3D::new(Vec3::new(11.0, 0.0, 0.0), Vec3::new(20.0, 10.0, 10.0));
    /// assert!(!a.overlaps(&c));
    /// ```
    #[inline]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.min.cmple(other.max).all() && self.max.cmpge(other.min).all()
    }

    /// Horizontal (X/Z) overlap only; the vertical extents are ignored.
    #[inline]
    pub fn overlaps_horizontal(&self, other: &Self) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// The smallest AABB enclosing two AABBs.
    #[inline]
    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Return true if the AABB is inverted along any axis. Assumes no NaN.
    ///
    /// Unlike area-based emptiness, flat boxes (zero thickness along an axis)
    /// are not empty: a rectangle on the ground is a valid proximity shape.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.max.cmplt(self.min).any()
    }

    /// Horizontal centroid along X (`axis == 0`) or Z (any other value).
    ///
    /// Only horizontal axes are used for ordering since vertical extents may be infinite.
    #[inline]
    pub fn horizontal_center(&self, axis: usize) -> f32 {
        if axis == 0 {
            0.5 * (self.min.x + self.max.x)
        } else {
            0.5 * (self.min.z + self.max.z)
        }
    }

    /// Half perimeter of the horizontal footprint, widened to `f64`.
    ///
    /// Used as the SAH-like split metric.
    #[inline]
    pub fn horizontal_metric(&self) -> f64 {
        let w = f64::from((self.max.x - self.min.x).max(0.0));
        let d = f64::from((self.max.z - self.min.z).max(0.0));
        w + d
    }

    /// Squared distance from the box to `point`, zero when the point is inside.
    ///
    /// With `ignore_y` the vertical separation does not contribute, so only the
    /// horizontal proximity is measured.
    #[inline]
    pub fn distance_squared_to_point(&self, point: Vec3, ignore_y: bool) -> f32 {
        let dx = axis_gap(point.x, self.min.x, self.max.x);
        let dz = axis_gap(point.z, self.min.z, self.max.z);
        let dy = if ignore_y {
            0.0
        } else {
            axis_gap(point.y, self.min.y, self.max.y)
        };
        dx * dx + dy * dy + dz * dz
    }
}

#[inline]
fn axis_gap(v: f32, min: f32, max: f32) -> f32 {
    if v < min {
        min - v
    } else if v > max {
        v - max
    } else {
        0.0
    }
}

/// Half-line used for ray queries.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Ray {
    /// Start point of the ray.
    pub origin: Vec3,
    /// Direction of the ray, normalized on construction.
    pub direction: Vec3,
}

impl Ray {
    /// Create a ray. The direction is normalized; a zero direction yields a ray
    /// that never hits anything.
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }

    /// Point at distance `t` along the ray.
    #[inline]
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Slab test against an AABB.
    ///
    /// Returns the distance along the ray at which it enters the box (zero when
    /// the origin is inside), or `None` when the box is missed or entered beyond
    /// `max_distance`.
    pub fn intersect_aabb(&self, aabb: &Aabb3D, max_distance: f32) -> Option<f32> {
        if self.direction == Vec3::ZERO {
            return None;
        }
        let mut t_min = 0.0_f32;
        let mut t_max = max_distance;
        for axis in 0..3 {
            let o = self.origin[axis];
            let d = self.direction[axis];
            let (lo, hi) = (aabb.min[axis], aabb.max[axis]);
            if d == 0.0 {
                if o < lo || o > hi {
                    return None;
                }
                continue;
            }
            let inv = 1.0 / d;
            let mut t0 = (lo - o) * inv;
            let mut t1 = (hi - o) * inv;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            // Infinite slabs produce +-inf here, which min/max handle.
            t_min = t_min.max(t0);
            t_max = t_max.min(t1);
            if t_min > t_max {
                return None;
            }
        }
        Some(t_min)
    }
}

/// A `f32` wrapper that implements `Ord` using `total_cmp`, for use as a heap key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrdF32(pub f32);

impl Eq for OrdF32 {}

impl PartialOrd for OrdF32 {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrdF32 {
    #[inline]
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl OrdF32 {
    /// The wrapped value.
    #[inline]
    pub const fn get(self) -> f32 {
        self.0
    }
}
