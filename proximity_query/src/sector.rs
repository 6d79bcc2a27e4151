// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Angular sector constraint around a query origin.

use glam::Vec3;

/// A cone around `forward`, opening `half_angle` to each side.
///
/// Construction decides once per query whether a sector applies at all, so the
/// per-candidate test is a dot product against a cached cosine.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Sector {
    center: Vec3,
    forward: Vec3,
    cos_half_angle: f32,
    ignore_y: bool,
}

impl Sector {
    /// Build a sector from its full angle in degrees.
    ///
    /// Returns `None` when the angle places no constraint (`0`, `360`, or anything
    /// outside `(0, 360)`) or when `forward` has no usable direction.
    pub fn new(center: Vec3, forward: Vec3, degrees: f32, ignore_y: bool) -> Option<Self> {
        if !(degrees > 0.0 && degrees < 360.0) {
            return None;
        }
        let forward = if ignore_y {
            Vec3::new(forward.x, 0.0, forward.z)
        } else {
            forward
        }
        .try_normalize()?;
        Some(Self {
            center,
            forward,
            cos_half_angle: (degrees * 0.5).to_radians().cos(),
            ignore_y,
        })
    }

    /// Normalized axis of the sector.
    pub fn forward(&self) -> Vec3 {
        self.forward
    }

    /// Whether `point` lies inside the sector.
    ///
    /// The boundary angle is included and the center itself is always inside.
    pub fn contains(&self, point: Vec3) -> bool {
        let mut offset = point - self.center;
        if self.ignore_y {
            offset.y = 0.0;
        }
        let len = offset.length();
        if len <= f32::EPSILON {
            return true;
        }
        offset.dot(self.forward) >= self.cos_half_angle * len
    }
}
