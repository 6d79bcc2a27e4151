// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Query descriptors and per-entity result lists.

use proximity_index::TreeMask;

use crate::world::Entity;

bitflags::bitflags! {
    /// Behavior switches of a [`ProximityQuery`].
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct QueryFlags: u8 {
        /// Never report the querying entity itself.
        const IGNORE_SELF         = 0b0000_0001;
        /// Trade result ordering for speed.
        const IGNORE_SORTING      = 0b0000_0010;
        /// Take the sector axis from the parent transform instead of self.
        const USE_PARENT_ROTATION = 0b0000_0100;
        /// Measure distances in the horizontal plane only.
        const IGNORE_Y            = 0b0000_1000;
    }
}

/// Which algorithm a query runs, derived from [`ProximityQuery::nearest_count`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum QueryMode {
    /// Every qualifying candidate within range (`nearest_count == 0`).
    Range,
    /// The single nearest qualifying candidate (`nearest_count == 1`).
    Nearest,
    /// Up to this many nearest candidates (`nearest_count > 1`).
    KNearest(usize),
}

/// What a querying entity wants to find each tick.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProximityQuery {
    /// Trees to search.
    pub trees: TreeMask,
    /// Upper distance bound, squared and inclusive.
    pub range_squared: f32,
    /// Lower distance bound, squared and inclusive.
    pub min_range_squared: f32,
    /// Full sector angle in degrees. `0` or `360` disables sector filtering.
    pub sector_degrees: f32,
    /// `0` for a range query, `1` for nearest, `N` for the `N` nearest.
    pub nearest_count: u32,
    /// Run every `N` ticks, staggered per entity. `0` runs every tick.
    pub update_per_tick: u32,
    /// Behavior switches.
    pub flags: QueryFlags,
}

impl Default for ProximityQuery {
    fn default() -> Self {
        Self {
            trees: TreeMask::ALL,
            range_squared: f32::INFINITY,
            min_range_squared: 0.0,
            sector_degrees: 360.0,
            nearest_count: 1,
            update_per_tick: 0,
            flags: QueryFlags::IGNORE_SELF,
        }
    }
}

impl ProximityQuery {
    /// Nearest-first query over every tree, excluding self.
    pub fn new() -> Self {
        Self::default()
    }

    /// Select the trees to search.
    #[must_use]
    pub fn trees(mut self, trees: TreeMask) -> Self {
        self.trees = trees;
        self
    }

    /// Set the maximum distance (not squared).
    #[must_use]
    pub fn range(mut self, range: f32) -> Self {
        self.range_squared = range * range;
        self
    }

    /// Set the minimum distance (not squared).
    #[must_use]
    pub fn min_range(mut self, min_range: f32) -> Self {
        self.min_range_squared = min_range * min_range;
        self
    }

    /// Set the full sector angle in degrees.
    #[must_use]
    pub fn sector(mut self, degrees: f32) -> Self {
        self.sector_degrees = degrees;
        self
    }

    /// Set the result count, which selects the [`QueryMode`].
    #[must_use]
    pub fn nearest_count(mut self, count: u32) -> Self {
        self.nearest_count = count;
        self
    }

    /// Set the throttle cadence.
    #[must_use]
    pub fn update_per_tick(mut self, ticks: u32) -> Self {
        self.update_per_tick = ticks;
        self
    }

    /// Replace the flags.
    #[must_use]
    pub fn flags(mut self, flags: QueryFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Set or unset some flags.
    #[must_use]
    pub fn with_flags(mut self, flags: QueryFlags, value: bool) -> Self {
        self.flags.set(flags, value);
        self
    }

    /// The algorithm this descriptor selects.
    pub fn mode(&self) -> QueryMode {
        match self.nearest_count {
            0 => QueryMode::Range,
            1 => QueryMode::Nearest,
            n => QueryMode::KNearest(n as usize),
        }
    }

    /// Whether results are ordered by distance.
    pub fn sorted(&self) -> bool {
        !self.flags.contains(QueryFlags::IGNORE_SORTING)
    }
}

/// Per-entity result list, fully replaced every time the query runs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProximityResults {
    entities: Vec<Entity>,
}

impl ProximityResults {
    /// An empty list with room for `capacity` entities.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entities: Vec::with_capacity(capacity),
        }
    }

    /// Replace the contents with what `fill` writes into a cleared buffer.
    ///
    /// The buffer keeps its allocation between runs.
    pub fn replace_with<R>(&mut self, fill: impl FnOnce(&mut Vec<Entity>) -> R) -> R {
        self.entities.clear();
        fill(&mut self.entities)
    }

    /// Remove every entity.
    pub fn clear(&mut self) {
        self.entities.clear();
    }

    /// The current results.
    pub fn as_slice(&self) -> &[Entity] {
        &self.entities
    }

    /// The first (nearest, when sorted) result.
    pub fn first(&self) -> Option<Entity> {
        self.entities.first().copied()
    }

    /// Number of results.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether there are no results.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Iterate the results.
    pub fn iter(&self) -> std::slice::Iter<'_, Entity> {
        self.entities.iter()
    }
}

impl<'a> IntoIterator for &'a ProximityResults {
    type Item = &'a Entity;
    type IntoIter = std::slice::Iter<'a, Entity>;

    fn into_iter(self) -> Self::IntoIter {
        self.entities.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proximity_index::TreeHandle;

    #[test]
    fn mode_follows_nearest_count() {
        let q = ProximityQuery::new();
        assert_eq!(q.mode(), QueryMode::Nearest);
        assert_eq!(q.nearest_count(0).mode(), QueryMode::Range);
        assert_eq!(q.nearest_count(5).mode(), QueryMode::KNearest(5));
    }

    #[test]
    fn builder_squares_ranges() {
        let q = ProximityQuery::new()
            .trees(TreeMask::single(TreeHandle(2)))
            .range(10.0)
            .min_range(2.0)
            .with_flags(QueryFlags::IGNORE_SORTING | QueryFlags::IGNORE_Y, true)
            .with_flags(QueryFlags::IGNORE_SELF, false);
        assert_eq!(q.range_squared, 100.0);
        assert_eq!(q.min_range_squared, 4.0);
        assert!(!q.sorted());
        assert!(q.flags.contains(QueryFlags::IGNORE_Y));
        assert!(!q.flags.contains(QueryFlags::IGNORE_SELF));
        assert_eq!(q.trees.count(), 1);
    }

    #[test]
    fn results_are_replaced_not_appended() {
        let mut results = ProximityResults::with_capacity(4);
        results.replace_with(|out| out.extend([Entity::new(1, 0), Entity::new(2, 0)]));
        assert_eq!(results.len(), 2);
        results.replace_with(|out| out.push(Entity::new(3, 0)));
        assert_eq!(results.as_slice(), [Entity::new(3, 0)]);
        assert_eq!(results.first(), Some(Entity::new(3, 0)));
        results.replace_with(|_| ());
        assert!(results.is_empty());
    }
}
