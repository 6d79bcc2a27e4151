// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Bounding-box tree backend: a binary hierarchy rebuilt top-down with SAH-like splits.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fmt::Debug;

use crate::backend::{NearestParams, SpatialIndex, Visit};
use crate::types::{Aabb3D, OrdF32};

/// Tuning knobs for [`Bvh`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BvhConfig {
    /// Maximum number of entries stored in a leaf before it is split.
    pub max_leaf: usize,
}

impl Default for BvhConfig {
    fn default() -> Self {
        Self { max_leaf: 8 }
    }
}

/// A bounding-box tree over handles of type `H`.
///
/// Entries are staged with [`SpatialIndex::add`] and the whole hierarchy is
/// rebuilt by [`SpatialIndex::rebuild`]; there is no incremental update path
/// because every cycle starts from a [`SpatialIndex::clear`].
pub struct Bvh<H> {
    max_leaf: usize,
    staged: Vec<(H, Aabb3D)>,
    entries: Vec<(H, Aabb3D)>,
    // Permutation of `entries`; leaves own contiguous ranges of it.
    order: Vec<u32>,
    arena: Vec<Node>,
    root: Option<NodeIdx>,
}

#[derive(Clone, Debug)]
enum Kind {
    Leaf { start: u32, end: u32 },
    Internal { left: NodeIdx, right: NodeIdx },
}

#[derive(Clone, Debug)]
struct Node {
    bbox: Aabb3D,
    kind: Kind,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
struct NodeIdx(u32);

impl NodeIdx {
    #[allow(
        clippy::cast_possible_truncation,
        reason = "Arena sizes are bounded by the entry count, which is kept below u32::MAX."
    )]
    const fn new(i: usize) -> Self {
        Self(i as u32)
    }

    const fn get(self) -> usize {
        self.0 as usize
    }
}

// Heap items sort nodes before entries at equal distance so that entry ties
// come out in insertion order.
const NODE: u8 = 0;
const ENTRY: u8 = 1;

type HeapItem = Reverse<(OrdF32, u8, u32)>;

impl<H> Default for Bvh<H> {
    fn default() -> Self {
        Self::with_config(BvhConfig::default())
    }
}

impl<H> Bvh<H> {
    /// Create an empty tree with the given configuration.
    pub fn with_config(config: BvhConfig) -> Self {
        debug_assert!(config.max_leaf > 0, "max_leaf must be at least 1");
        Self {
            max_leaf: config.max_leaf.max(1),
            staged: Vec::new(),
            entries: Vec::new(),
            order: Vec::new(),
            arena: Vec::new(),
            root: None,
        }
    }

    /// Number of nodes in the committed hierarchy.
    pub fn node_count(&self) -> usize {
        self.arena.len()
    }

    /// Number of entries staged since the last rebuild.
    pub fn staged_len(&self) -> usize {
        self.staged.len()
    }

    fn bbox_of(entries: &[(H, Aabb3D)], items: &[u32]) -> Aabb3D {
        let mut it = items.iter();
        let first = it
            .next()
            .map(|&i| entries[i as usize].1)
            .expect("BVH invariant violated: bounding an empty item range");
        it.fold(first, |acc, &i| acc.union(&entries[i as usize].1))
    }

    fn sort_by_axis(entries: &[(H, Aabb3D)], items: &mut [u32], axis: usize) {
        items.sort_by(|&a, &b| {
            let ca = entries[a as usize].1.horizontal_center(axis);
            let cb = entries[b as usize].1.horizontal_center(axis);
            ca.total_cmp(&cb).then(a.cmp(&b))
        });
    }

    /// SAH-like split: sort along each horizontal axis, precompute prefix/suffix
    /// bounds, and choose `k` minimizing `metric(LB_k) * k + metric(RB_k) * (n - k)`.
    ///
    /// Leaves `items` sorted along the winning axis and returns `k`.
    fn split_sah(entries: &[(H, Aabb3D)], items: &mut [u32]) -> usize {
        let n = items.len();
        debug_assert!(n >= 2, "cannot split fewer than two items");
        // (cost, imbalance, axis, k)
        let mut best: Option<(f64, usize, usize, usize)> = None;
        let mut prefix: Vec<f64> = Vec::with_capacity(n);
        let mut suffix: Vec<f64> = vec![0.0; n];
        for axis in [0_usize, 2] {
            Self::sort_by_axis(entries, items, axis);

            prefix.clear();
            let mut acc = entries[items[0] as usize].1;
            prefix.push(acc.horizontal_metric());
            for &i in &items[1..] {
                acc = acc.union(&entries[i as usize].1);
                prefix.push(acc.horizontal_metric());
            }
            let mut acc = entries[items[n - 1] as usize].1;
            suffix[n - 1] = acc.horizontal_metric();
            for j in (0..n - 1).rev() {
                acc = acc.union(&entries[items[j] as usize].1);
                suffix[j] = acc.horizontal_metric();
            }

            for k in 1..n {
                #[allow(
                    clippy::cast_precision_loss,
                    reason = "Split weights only need to be approximately proportional."
                )]
                let cost = prefix[k - 1] * k as f64 + suffix[k] * (n - k) as f64;
                let imbalance = (n / 2).abs_diff(k);
                let better = match best {
                    None => true,
                    Some((bc, bi, _, _)) => cost < bc || (cost == bc && imbalance < bi),
                };
                if better {
                    best = Some((cost, imbalance, axis, k));
                }
            }
        }
        let (_, _, axis, k) = best.expect("BVH split requires at least 2 items");
        if axis != 2 {
            Self::sort_by_axis(entries, items, axis);
        }
        k
    }

    fn build(&mut self) {
        self.arena.clear();
        self.root = None;
        let n = self.entries.len();
        self.order.clear();
        #[allow(
            clippy::cast_possible_truncation,
            reason = "Entry counts are asserted to fit in u32."
        )]
        self.order.extend((0..n).map(|i| i as u32));
        if n == 0 {
            return;
        }

        let root_bbox = Self::bbox_of(&self.entries, &self.order);
        self.arena.push(Node {
            bbox: root_bbox,
            kind: Kind::Leaf { start: 0, end: 0 },
        });
        self.root = Some(NodeIdx::new(0));

        // (node, start, end) ranges still to be laid out.
        let mut work = vec![(0_usize, 0_usize, n)];
        while let Some((node, start, end)) = work.pop() {
            let len = end - start;
            if len <= self.max_leaf {
                #[allow(
                    clippy::cast_possible_truncation,
                    reason = "Entry counts are asserted to fit in u32."
                )]
                let kind = Kind::Leaf {
                    start: start as u32,
                    end: end as u32,
                };
                self.arena[node].kind = kind;
                continue;
            }
            let k = Self::split_sah(&self.entries, &mut self.order[start..end]);
            let mid = start + k;
            let left_bbox = Self::bbox_of(&self.entries, &self.order[start..mid]);
            let right_bbox = Self::bbox_of(&self.entries, &self.order[mid..end]);
            let left = self.arena.len();
            self.arena.push(Node {
                bbox: left_bbox,
                kind: Kind::Leaf { start: 0, end: 0 },
            });
            let right = self.arena.len();
            self.arena.push(Node {
                bbox: right_bbox,
                kind: Kind::Leaf { start: 0, end: 0 },
            });
            self.arena[node].kind = Kind::Internal {
                left: NodeIdx::new(left),
                right: NodeIdx::new(right),
            };
            work.push((left, start, mid));
            work.push((right, mid, end));
        }
    }

    fn leaf_items(&self, start: u32, end: u32) -> &[u32] {
        &self.order[start as usize..end as usize]
    }
}

impl<H: Copy> SpatialIndex<H> for Bvh<H> {
    fn clear(&mut self) {
        self.staged.clear();
        self.entries.clear();
        self.order.clear();
        self.arena.clear();
        self.root = None;
    }

    fn add(&mut self, handle: H, aabb: Aabb3D) {
        debug_assert!(!aabb.is_empty(), "inverted AABB staged into the tree");
        self.staged.push((handle, aabb));
    }

    fn rebuild(&mut self) {
        assert!(
            self.entries.len() + self.staged.len() < u32::MAX as usize,
            "too many entries for one tree"
        );
        self.entries.append(&mut self.staged);
        self.build();
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn visit_nearest<F>(&self, params: &NearestParams, mut f: F)
    where
        F: FnMut(H, &Aabb3D, f32) -> Visit,
    {
        let Some(root) = self.root else {
            return;
        };
        let mut heap: BinaryHeap<HeapItem> = BinaryHeap::new();
        let root_dist = params.distance_squared(&self.arena[root.get()].bbox);
        if root_dist <= params.max_distance_squared {
            heap.push(Reverse((OrdF32(root_dist), NODE, root.0)));
        }
        while let Some(Reverse((dist, kind, idx))) = heap.pop() {
            if kind == ENTRY {
                let (handle, aabb) = &self.entries[idx as usize];
                if f(*handle, aabb, dist.get()) == Visit::Stop {
                    return;
                }
                continue;
            }
            match &self.arena[idx as usize].kind {
                Kind::Leaf { start, end } => {
                    for &i in self.leaf_items(*start, *end) {
                        let d = params.distance_squared(&self.entries[i as usize].1);
                        if params.accepts(d) {
                            heap.push(Reverse((OrdF32(d), ENTRY, i)));
                        }
                    }
                }
                Kind::Internal { left, right } => {
                    for child in [*left, *right] {
                        let d = params.distance_squared(&self.arena[child.get()].bbox);
                        if d <= params.max_distance_squared {
                            heap.push(Reverse((OrdF32(d), NODE, child.0)));
                        }
                    }
                }
            }
        }
    }

    fn visit_range<F>(&self, query: &Aabb3D, mut f: F)
    where
        F: FnMut(H, &Aabb3D) -> Visit,
    {
        let Some(root) = self.root else {
            return;
        };
        let mut stack = vec![root];
        while let Some(i) = stack.pop() {
            let n = &self.arena[i.get()];
            if !n.bbox.overlaps(query) {
                continue;
            }
            match &n.kind {
                Kind::Leaf { start, end } => {
                    for &e in self.leaf_items(*start, *end) {
                        let (handle, aabb) = &self.entries[e as usize];
                        if aabb.overlaps(query) && f(*handle, aabb) == Visit::Stop {
                            return;
                        }
                    }
                }
                Kind::Internal { left, right } => {
                    stack.push(*left);
                    stack.push(*right);
                }
            }
        }
    }
}

impl<H> Debug for Bvh<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bvh")
            .field("max_leaf", &self.max_leaf)
            .field("arena_nodes", &self.arena.len())
            .field("entries", &self.entries.len())
            .field("staged", &self.staged.len())
            .field("has_root", &self.root.is_some())
            .finish_non_exhaustive()
    }
}
