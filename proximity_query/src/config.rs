// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Construction-time configuration.

use proximity_index::{Bvh, BvhConfig, Grid, GridConfig};

/// Settings for a [`ProximitySystem`](crate::ProximitySystem).
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ProximityConfig {
    /// Trees allocated by `on_awake`.
    pub initial_trees: usize,
    /// Capacity hint for freshly created result lists.
    pub result_capacity: usize,
    /// Settings for bounding-box tree forests.
    pub bvh: BvhConfig,
    /// Settings for grid forests.
    pub grid: GridConfig,
}

impl Default for ProximityConfig {
    fn default() -> Self {
        Self {
            initial_trees: 1,
            result_capacity: 16,
            bvh: BvhConfig::default(),
            grid: GridConfig::default(),
        }
    }
}

/// An index kind that can be built from a [`ProximityConfig`].
pub trait ConfiguredIndex {
    /// Build an empty index.
    fn from_config(config: &ProximityConfig) -> Self;
}

impl<H> ConfiguredIndex for Bvh<H> {
    fn from_config(config: &ProximityConfig) -> Self {
        Self::with_config(config.bvh)
    }
}

impl<H> ConfiguredIndex for Grid<H> {
    fn from_config(config: &ProximityConfig) -> Self {
        Self::with_config(config.grid)
    }
}
