// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! An ordered collection of spatial indexes addressed by bitmask.
use std::fmt;

use crate::backend::SpatialIndex;

/// Stable handle of one index inside a [`Forest`].
///
/// Handles are issued in order by [`Forest::add_tree`] and are never reused.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TreeHandle(pub u8);

impl TreeHandle {
    /// Slot position of this handle.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Selection of trees, one bit per [`TreeHandle`].
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TreeMask(pub u64);

impl TreeMask {
    /// Every tree.
    pub const ALL: Self = Self(u64::MAX);
    /// No tree.
    pub const NONE: Self = Self(0);

    /// The bit of `tree`; zero for handles beyond the 64 addressable slots.
    #[inline]
    const fn bit(tree: TreeHandle) -> u64 {
        debug_assert!(tree.0 < 64, "tree handle out of mask range");
        match 1_u64.checked_shl(tree.0 as u32) {
            Some(bit) => bit,
            None => 0,
        }
    }

    /// A mask selecting a single tree.
    #[inline]
    pub const fn single(tree: TreeHandle) -> Self {
        Self(Self::bit(tree))
    }

    /// This mask with `tree` added.
    #[inline]
    #[must_use]
    pub const fn with(self, tree: TreeHandle) -> Self {
        Self(self.0 | Self::bit(tree))
    }

    /// Whether `tree` is selected.
    #[inline]
    pub const fn contains(self, tree: TreeHandle) -> bool {
        self.0 & Self::bit(tree) != 0
    }

    /// Number of selected trees.
    #[inline]
    pub const fn count(self) -> u32 {
        self.0.count_ones()
    }

    /// Whether no tree is selected.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Selected trees in ascending handle order.
    pub fn iter(self) -> impl Iterator<Item = TreeHandle> {
        let mut bits = self.0;
        std::iter::from_fn(move || {
            if bits == 0 {
                return None;
            }
            #[allow(
                clippy::cast_possible_truncation,
                reason = "trailing_zeros of a non-zero u64 is below 64."
            )]
            let slot = bits.trailing_zeros() as u8;
            bits &= bits - 1;
            Some(TreeHandle(slot))
        })
    }
}

impl fmt::Debug for TreeMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TreeMask({:#b})", self.0)
    }
}

impl std::ops::BitOr for TreeMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl FromIterator<TreeHandle> for TreeMask {
    fn from_iter<T: IntoIterator<Item = TreeHandle>>(iter: T) -> Self {
        iter.into_iter().fold(Self::NONE, Self::with)
    }
}

/// Errors raised while configuring a [`Forest`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ForestError {
    /// All tree slots are taken.
    #[error("forest is full: at most {max} trees can be registered")]
    Full {
        /// The slot limit that was hit.
        max: usize,
    },
}

/// Ordered, append-only list of spatial indexes of one kind.
///
/// Queries and inserts target a subset of the forest selected by a [`TreeMask`].
/// Every index is owned independently, so phases can run per tree in parallel.
pub struct Forest<I> {
    trees: Vec<I>,
}

impl<I> fmt::Debug for Forest<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Forest")
            .field("trees", &self.trees.len())
            .finish_non_exhaustive()
    }
}

impl<I> Default for Forest<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I> Forest<I> {
    /// Maximum number of trees a forest can hold (one bit each in a [`TreeMask`]).
    pub const MAX_TREES: usize = 64;

    /// Create an empty forest.
    pub const fn new() -> Self {
        Self { trees: Vec::new() }
    }

    /// Append a default-constructed index and return its handle.
    pub fn add_tree(&mut self) -> Result<TreeHandle, ForestError>
    where
        I: Default,
    {
        self.add_tree_with(I::default())
    }

    /// Append `index` and return its handle.
    pub fn add_tree_with(&mut self, index: I) -> Result<TreeHandle, ForestError> {
        if self.trees.len() >= Self::MAX_TREES {
            return Err(ForestError::Full {
                max: Self::MAX_TREES,
            });
        }
        #[allow(
            clippy::cast_possible_truncation,
            reason = "The length is checked against MAX_TREES above."
        )]
        let handle = TreeHandle(self.trees.len() as u8);
        self.trees.push(index);
        Ok(handle)
    }

    /// Number of registered trees.
    pub fn len(&self) -> usize {
        self.trees.len()
    }

    /// Whether no tree has been registered.
    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }

    /// Mask selecting every registered tree.
    pub fn mask(&self) -> TreeMask {
        if self.trees.len() >= Self::MAX_TREES {
            TreeMask::ALL
        } else {
            TreeMask((1_u64 << self.trees.len()) - 1)
        }
    }

    /// Borrow a tree by handle.
    pub fn get(&self, tree: TreeHandle) -> Option<&I> {
        self.trees.get(tree.index())
    }

    /// Mutably borrow a tree by handle.
    pub fn get_mut(&mut self, tree: TreeHandle) -> Option<&mut I> {
        self.trees.get_mut(tree.index())
    }

    /// All trees with their handles.
    pub fn iter(&self) -> impl Iterator<Item = (TreeHandle, &I)> {
        self.iter_masked(self.mask())
    }

    /// Trees selected by `mask`, in ascending handle order.
    ///
    /// Bits naming unregistered trees are a programming error. They trip a
    /// debug assertion and are skipped in release builds.
    pub fn iter_masked(&self, mask: TreeMask) -> impl Iterator<Item = (TreeHandle, &I)> {
        let valid = self.mask();
        debug_assert!(
            mask == TreeMask::ALL || mask.0 & !valid.0 == 0,
            "tree mask {mask:?} selects unregistered trees (forest holds {})",
            self.trees.len()
        );
        TreeMask(mask.0 & valid.0)
            .iter()
            .map(|tree| (tree, &self.trees[tree.index()]))
    }

    /// Mutable access to every tree, in handle order.
    pub fn trees_mut(&mut self) -> &mut [I] {
        &mut self.trees
    }

    /// Clear every tree.
    pub fn clear_all<H: Copy>(&mut self)
    where
        I: SpatialIndex<H>,
    {
        for tree in &mut self.trees {
            tree.clear();
        }
    }

    /// Rebuild every tree.
    pub fn rebuild_all<H: Copy>(&mut self)
    where
        I: SpatialIndex<H>,
    {
        for tree in &mut self.trees {
            tree.rebuild();
        }
    }

    /// Drop every tree. Handles issued so far become dangling.
    pub fn reset(&mut self) {
        self.trees.clear();
    }

    /// Parallel iterator over the trees, each visited by exactly one task.
    #[cfg(feature = "rayon")]
    pub fn par_trees_mut(&mut self) -> rayon::slice::IterMut<'_, I>
    where
        I: Send,
    {
        use rayon::iter::IntoParallelRefMutIterator;
        self.trees.par_iter_mut()
    }
}
