// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The boundary to entity storage and transform lookup.
//!
//! The proximity engine never owns entities. It reads liveness, world transforms,
//! parents and spatial shapes through [`World`], which any entity store can implement.
//! [`MemoryWorld`] is a small vector-backed store for tests, demos and benches.

use glam::{Quat, Vec3};

use crate::shape::SpatialShape;

/// Opaque candidate handle: a slot index plus a generation counter.
///
/// Ordering is by index, then generation. Sorted result merges use it to break ties
/// between candidates at equal distance.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Entity {
    /// Slot index.
    pub index: u32,
    /// Generation of the slot when this handle was issued.
    pub generation: u32,
}

impl Entity {
    /// Create a handle from its parts.
    #[inline]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Identity used to stagger throttled queries.
    #[inline]
    pub const fn id(self) -> u32 {
        self.index
    }
}

/// World-space placement of an entity.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WorldTransform {
    /// World position.
    pub position: Vec3,
    /// World orientation.
    pub rotation: Quat,
}

impl Default for WorldTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl WorldTransform {
    /// Origin, no rotation.
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    /// An unrotated transform at `position`.
    #[inline]
    pub const fn from_position(position: Vec3) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
        }
    }

    /// Set the rotation.
    #[inline]
    #[must_use]
    pub const fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    /// Facing direction: local `+Z` rotated into world space.
    #[inline]
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::Z
    }
}

/// An entity that takes part in indexing.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SpatialEntity {
    /// The entity.
    pub entity: Entity,
    /// Its shape and tree assignment.
    pub shape: SpatialShape,
}

/// Read access to entity storage and transforms.
///
/// Implementations are shared across worker threads while a tick runs, so they
/// must be `Sync`. None of the methods block.
pub trait World: Sync {
    /// Whether `entity` still refers to a live entity.
    fn is_alive(&self, entity: Entity) -> bool;

    /// Resolved world transform of `entity`.
    ///
    /// `None` means the transform has not been computed yet this tick (or the
    /// entity is gone). Such entities are skipped for indexing and querying.
    fn transform(&self, entity: Entity) -> Option<WorldTransform>;

    /// Parent of `entity` in the transform hierarchy, if any.
    fn parent(&self, entity: Entity) -> Option<Entity>;

    /// Every entity that carries a spatial shape.
    fn spatial_entities(&self) -> &[SpatialEntity];
}

#[derive(Clone, Debug, Default)]
struct Slot {
    generation: u32,
    alive: bool,
    transform: Option<WorldTransform>,
    parent: Option<Entity>,
    // Position in `MemoryWorld::spatial`.
    spatial: Option<usize>,
}

/// Vector-backed [`World`] with slot reuse.
#[derive(Clone, Debug, Default)]
pub struct MemoryWorld {
    slots: Vec<Slot>,
    free: Vec<u32>,
    spatial: Vec<SpatialEntity>,
}

impl MemoryWorld {
    /// Create an empty world.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entities.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Whether no entity is alive.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Create an entity without a transform.
    pub fn spawn(&mut self) -> Entity {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.alive = true;
            return Entity::new(index, slot.generation);
        }
        let index = u32::try_from(self.slots.len()).expect("entity slots exhausted");
        self.slots.push(Slot {
            alive: true,
            ..Slot::default()
        });
        Entity::new(index, 0)
    }

    /// Create an entity with a transform and, optionally, a spatial shape.
    pub fn spawn_at(&mut self, transform: WorldTransform, shape: Option<SpatialShape>) -> Entity {
        let entity = self.spawn();
        self.set_transform(entity, transform);
        if let Some(shape) = shape {
            self.set_shape(entity, shape);
        }
        entity
    }

    /// Destroy `entity`. Returns `false` if it was already gone.
    pub fn despawn(&mut self, entity: Entity) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        self.remove_shape(entity);
        let slot = &mut self.slots[entity.index as usize];
        slot.alive = false;
        slot.generation = slot.generation.wrapping_add(1);
        slot.transform = None;
        slot.parent = None;
        self.free.push(entity.index);
        true
    }

    fn slot_mut(&mut self, entity: Entity) -> Option<&mut Slot> {
        self.slots
            .get_mut(entity.index as usize)
            .filter(|slot| slot.alive && slot.generation == entity.generation)
    }

    /// Set the resolved world transform.
    pub fn set_transform(&mut self, entity: Entity, transform: WorldTransform) {
        if let Some(slot) = self.slot_mut(entity) {
            slot.transform = Some(transform);
        }
    }

    /// Mark every transform as not computed, as at the start of a tick.
    pub fn invalidate_transforms(&mut self) {
        for slot in &mut self.slots {
            slot.transform = None;
        }
    }

    /// Mark one transform as not computed.
    pub fn invalidate_transform(&mut self, entity: Entity) {
        if let Some(slot) = self.slot_mut(entity) {
            slot.transform = None;
        }
    }

    /// Set or clear the parent of `entity`.
    pub fn set_parent(&mut self, entity: Entity, parent: Option<Entity>) {
        if let Some(slot) = self.slot_mut(entity) {
            slot.parent = parent;
        }
    }

    /// Attach or replace the spatial shape of `entity`.
    pub fn set_shape(&mut self, entity: Entity, shape: SpatialShape) {
        let len = self.spatial.len();
        let Some(slot) = self.slot_mut(entity) else {
            return;
        };
        match slot.spatial {
            Some(at) => self.spatial[at].shape = shape,
            None => {
                slot.spatial = Some(len);
                self.spatial.push(SpatialEntity { entity, shape });
            }
        }
    }

    /// Detach the spatial shape of `entity`, if any.
    pub fn remove_shape(&mut self, entity: Entity) {
        let Some(at) = self.slot_mut(entity).and_then(|slot| slot.spatial.take()) else {
            return;
        };
        self.spatial.swap_remove(at);
        if let Some(moved) = self.spatial.get(at) {
            self.slots[moved.entity.index as usize].spatial = Some(at);
        }
    }

    /// The spatial shape of `entity`, if any.
    pub fn shape(&self, entity: Entity) -> Option<&SpatialShape> {
        let slot = self.slots.get(entity.index as usize)?;
        if !slot.alive || slot.generation != entity.generation {
            return None;
        }
        slot.spatial.map(|at| &self.spatial[at].shape)
    }
}

impl World for MemoryWorld {
    fn is_alive(&self, entity: Entity) -> bool {
        self.slots
            .get(entity.index as usize)
            .is_some_and(|slot| slot.alive && slot.generation == entity.generation)
    }

    fn transform(&self, entity: Entity) -> Option<WorldTransform> {
        if !self.is_alive(entity) {
            return None;
        }
        self.slots[entity.index as usize].transform
    }

    fn parent(&self, entity: Entity) -> Option<Entity> {
        if !self.is_alive(entity) {
            return None;
        }
        self.slots[entity.index as usize].parent
    }

    fn spatial_entities(&self) -> &[SpatialEntity] {
        &self.spatial
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proximity_index::TreeHandle;

    #[test]
    fn despawn_bumps_generation() {
        let mut world = MemoryWorld::new();
        let a = world.spawn();
        assert!(world.is_alive(a));
        assert!(world.despawn(a));
        assert!(!world.despawn(a));
        let b = world.spawn();
        assert_eq!(b.index, a.index);
        assert_ne!(b.generation, a.generation);
        assert!(!world.is_alive(a));
        assert!(world.is_alive(b));
        assert_eq!(world.len(), 1);
    }

    #[test]
    fn stale_handles_do_not_write() {
        let mut world = MemoryWorld::new();
        let a = world.spawn();
        world.despawn(a);
        let b = world.spawn();
        world.set_transform(a, WorldTransform::from_position(Vec3::ONE));
        assert_eq!(world.transform(b), None);
        assert_eq!(world.transform(a), None);
    }

    #[test]
    fn shapes_stay_dense() {
        let mut world = MemoryWorld::new();
        let shape = SpatialShape::radius(TreeHandle(0), 1.0);
        let a = world.spawn_at(WorldTransform::IDENTITY, Some(shape));
        let b = world.spawn_at(WorldTransform::IDENTITY, Some(shape));
        let c = world.spawn_at(WorldTransform::IDENTITY, Some(shape));
        world.despawn(a);
        let listed: Vec<_> = world.spatial_entities().iter().map(|s| s.entity).collect();
        assert_eq!(listed, [c, b]);
        world.remove_shape(c);
        assert_eq!(world.spatial_entities().len(), 1);
        assert!(world.shape(b).is_some());
        assert!(world.shape(c).is_none());
    }

    #[test]
    fn transforms_can_be_invalidated() {
        let mut world = MemoryWorld::new();
        let a = world.spawn_at(WorldTransform::from_position(Vec3::X), None);
        assert_eq!(world.transform(a).map(|t| t.position), Some(Vec3::X));
        world.invalidate_transforms();
        assert_eq!(world.transform(a), None);
    }

    #[test]
    fn forward_follows_rotation() {
        let t = WorldTransform::IDENTITY.with_rotation(Quat::from_rotation_y(std::f32::consts::FRAC_PI_2));
        assert!((t.forward() - Vec3::X).length() < 1e-6);
        assert_eq!(WorldTransform::IDENTITY.forward(), Vec3::Z);
    }
}
