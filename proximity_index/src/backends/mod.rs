// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Backend implementations for different spatial strategies.
//!
//! - `bvh`: bounding-box tree with an SAH-like split, rebuilt top-down every cycle.
//! - `grid`: uniform grid over the horizontal plane with configurable cell size.
//!   The only backend that implements [`RayCast`](crate::RayCast).
//!
//! SAH note
//! --------
//! The tree uses an SAH-like split heuristic.
//! For a split point `k` along a sorted axis we minimize:
//!
//! `cost(k) = metric(LB_k) * k + metric(RB_k) * (n - k)`
//!
//! where `LB_k` and `RB_k` are the bounding boxes of the first `k` and remaining `n - k` items,
//! and `metric` is the half perimeter of the horizontal (X/Z) footprint.
//! We evaluate all `k` in O(n) per axis using prefix/suffix bounding boxes, and pick the lowest cost.
//! Accumulators are widened to `f64` for robust comparisons.

pub(crate) mod bvh;
pub(crate) mod grid;

pub use bvh::{Bvh, BvhConfig};
pub use grid::{Grid, GridConfig, cell_coord};
