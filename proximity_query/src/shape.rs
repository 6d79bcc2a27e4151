// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Spatial shapes: how an indexed entity turns into a box.

use glam::{Vec2, Vec3};
use proximity_index::{Aabb3D, TreeHandle};

/// Horizontal footprint of a shape.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ShapeKind {
    /// A square footprint enclosing a circle of this radius.
    Radius(f32),
    /// A rectangle with these half extents over X (`x`) and Z (`y`).
    Rect(Vec2),
}

/// Shape and tree assignment of an indexable entity.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpatialShape {
    /// Forest slot the entity is indexed into.
    pub tree: TreeHandle,
    /// Horizontal footprint.
    pub kind: ShapeKind,
    /// Vertical extrusion upward from the entity position.
    pub height: Option<f32>,
    /// Flatten to an infinitely tall box so only horizontal proximity matters.
    pub ignore_y: bool,
}

impl SpatialShape {
    /// A radius-shaped entity in `tree`.
    pub const fn radius(tree: TreeHandle, radius: f32) -> Self {
        Self {
            tree,
            kind: ShapeKind::Radius(radius),
            height: None,
            ignore_y: false,
        }
    }

    /// A rectangle-shaped entity in `tree`.
    pub const fn rect(tree: TreeHandle, half_extents: Vec2) -> Self {
        Self {
            tree,
            kind: ShapeKind::Rect(half_extents),
            height: None,
            ignore_y: false,
        }
    }

    /// Extrude upward by `height`.
    #[must_use]
    pub const fn with_height(mut self, height: f32) -> Self {
        self.height = Some(height);
        self
    }

    /// Flatten the vertical axis.
    #[must_use]
    pub const fn with_ignore_y(mut self, ignore_y: bool) -> Self {
        self.ignore_y = ignore_y;
        self
    }

    /// Whether the footprint is a radius.
    pub const fn is_radius(&self) -> bool {
        matches!(self.kind, ShapeKind::Radius(_))
    }

    /// World-space box of this shape at `position`.
    ///
    /// The vertical extent is `[-inf, +inf]` with `ignore_y`, `[y, y + height]`
    /// with a height, and otherwise `[y - r, y + r]` for a radius or `[y, y]`
    /// for a rectangle.
    pub fn aabb(&self, position: Vec3) -> Aabb3D {
        let (half_x, half_z, below, above) = match self.kind {
            ShapeKind::Radius(r) => (r, r, r, r),
            ShapeKind::Rect(half) => (half.x, half.y, 0.0, 0.0),
        };
        let (min_y, max_y) = if self.ignore_y {
            (f32::NEG_INFINITY, f32::INFINITY)
        } else if let Some(h) = self.height {
            (position.y, position.y + h)
        } else {
            (position.y - below, position.y + above)
        };
        Aabb3D::new(
            Vec3::new(position.x - half_x, min_y, position.z - half_z),
            Vec3::new(position.x + half_x, max_y, position.z + half_z),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: TreeHandle = TreeHandle(0);

    #[test]
    fn radius_box_is_a_cube() {
        let b = SpatialShape::radius(T, 2.0).aabb(Vec3::new(1.0, 1.0, 1.0));
        assert_eq!(b.min, Vec3::new(-1.0, -1.0, -1.0));
        assert_eq!(b.max, Vec3::new(3.0, 3.0, 3.0));
    }

    #[test]
    fn rect_box_is_flat_unless_extruded() {
        let shape = SpatialShape::rect(T, Vec2::new(1.0, 3.0));
        let flat = shape.aabb(Vec3::new(0.0, 5.0, 0.0));
        assert_eq!(flat.min, Vec3::new(-1.0, 5.0, -3.0));
        assert_eq!(flat.max, Vec3::new(1.0, 5.0, 3.0));
        assert!(!flat.is_empty());

        let tall = shape.with_height(2.0).aabb(Vec3::new(0.0, 5.0, 0.0));
        assert_eq!(tall.min.y, 5.0);
        assert_eq!(tall.max.y, 7.0);
    }

    #[test]
    fn ignore_y_wins_over_height() {
        let b = SpatialShape::radius(T, 1.0)
            .with_height(4.0)
            .with_ignore_y(true)
            .aabb(Vec3::new(0.0, 100.0, 0.0));
        assert_eq!(b.min.y, f32::NEG_INFINITY);
        assert_eq!(b.max.y, f32::INFINITY);
        assert_eq!(b.distance_squared_to_point(Vec3::new(3.0, -50.0, 0.0), false), 4.0);
    }
}
