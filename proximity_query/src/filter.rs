// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Caller-supplied candidate predicates.
//!
//! A sub-filter runs before self-exclusion and the sector test, so cheap
//! rejections (dead candidates, wrong team) skip the geometry entirely.

use proximity_index::Aabb3D;

use crate::world::{Entity, World};

/// Predicate over a candidate handle and its indexed box.
///
/// Any `Fn(H, &Aabb3D) -> bool + Sync` closure is a sub-filter.
pub trait SubFilter<H>: Sync {
    /// Whether the candidate may appear in results.
    fn accept(&self, handle: H, aabb: &Aabb3D) -> bool;
}

impl<H, F> SubFilter<H> for F
where
    F: Fn(H, &Aabb3D) -> bool + Sync,
{
    #[inline]
    fn accept(&self, handle: H, aabb: &Aabb3D) -> bool {
        self(handle, aabb)
    }
}

/// Accepts every candidate.
#[derive(Copy, Clone, Debug, Default)]
pub struct AcceptAll;

impl<H> SubFilter<H> for AcceptAll {
    #[inline(always)]
    fn accept(&self, _: H, _: &Aabb3D) -> bool {
        true
    }
}

/// The default sub-filter: accepts candidates that are still alive.
#[derive(Debug)]
pub struct AliveFilter<'w, W: ?Sized> {
    world: &'w W,
}

impl<W: ?Sized> Clone for AliveFilter<'_, W> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<W: ?Sized> Copy for AliveFilter<'_, W> {}

impl<'w, W: World + ?Sized> AliveFilter<'w, W> {
    /// Filter against `world`.
    pub fn new(world: &'w W) -> Self {
        Self { world }
    }
}

impl<W: World + ?Sized> SubFilter<Entity> for AliveFilter<'_, W> {
    #[inline]
    fn accept(&self, handle: Entity, _: &Aabb3D) -> bool {
        self.world.is_alive(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::MemoryWorld;
    use glam::Vec3;

    fn check<F: SubFilter<Entity>>(filter: &F, entity: Entity) -> bool {
        filter.accept(entity, &Aabb3D::from_point(Vec3::ZERO))
    }

    #[test]
    fn closures_are_filters() {
        let even = |e: Entity, _: &Aabb3D| e.index % 2 == 0;
        assert!(check(&even, Entity::new(2, 0)));
        assert!(!check(&even, Entity::new(3, 0)));
        assert!(check(&AcceptAll, Entity::new(3, 0)));
    }

    #[test]
    fn alive_filter_rejects_despawned() {
        let mut world = MemoryWorld::new();
        let a = world.spawn();
        let b = world.spawn();
        world.despawn(b);
        let filter = AliveFilter::new(&world);
        assert!(check(&filter, a));
        assert!(!check(&filter, b));
    }
}
