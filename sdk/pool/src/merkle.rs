//! Merkle Accumulator
//!
//! Append-only, fixed-depth binary hash tree over commitments.
//!
//! ```text
//!                    Root
//!                   /    \
//!                 H01    H23
//!                /  \   /   \
//!               H0  H1 H2   H3
//!               |   |   |    |
//!              C0  C1  z0   z0   (leaves, zero-padded)
//! ```
//!
//! Dense level-array layout: every filled node at every level is stored, and
//! unfilled positions fall back to the per-level zero value
//! (`zeros[0] = 0`, `zeros[l] = H(zeros[l-1], zeros[l-1])`). The root is
//! always computed over exactly `next_index` real leaves plus zero padding,
//! never over a coincidentally sized slice.
//!
//! The accumulator is not internally synchronized; callers serialize writes.
//! It also keeps no historical roots — a path is only valid against the root
//! current at the time it was extracted, and tracking older roots is the
//! root-history collaborator's job.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::commitment::Commitment;
use crate::error::PoolError;
use crate::hash::FieldHasher;

/// Depth ceiling; capacity is 2^levels leaves
pub const MAX_LEVELS: u8 = 32;

/// A membership path proving inclusion of a leaf
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MerklePath {
    /// Sibling hashes from leaf to root
    pub siblings: Vec<[u8; 32]>,
    /// Direction bits (true = current node is the right child)
    pub directions: Vec<bool>,
    /// The leaf index this path was extracted for
    pub index: u64,
}

impl MerklePath {
    /// Replay the path from `leaf` up to a root.
    pub fn compute_root(&self, leaf: &[u8; 32], hasher: &dyn FieldHasher) -> [u8; 32] {
        let mut current = *leaf;
        for (sibling, is_right) in self.siblings.iter().zip(self.directions.iter()) {
            current = if *is_right {
                hasher.hash_pair(sibling, &current)
            } else {
                hasher.hash_pair(&current, sibling)
            };
        }
        current
    }

    /// Verify that this path proves inclusion of `leaf` under `root`.
    pub fn verify(&self, leaf: &Commitment, root: &[u8; 32], hasher: &dyn FieldHasher) -> bool {
        &self.compute_root(&leaf.0, hasher) == root
    }
}

/// Append-only commitment tree
pub struct MerkleAccumulator {
    levels: u8,
    /// Precomputed zero value per level, 0..=levels
    zeros: Vec<[u8; 32]>,
    /// Filled nodes per level; nodes[0] are the leaves, nodes[levels] the root
    nodes: Vec<Vec<[u8; 32]>>,
    hasher: Arc<dyn FieldHasher>,
}

impl MerkleAccumulator {
    /// Allocate a tree of the given depth.
    ///
    /// Panics on a zero or out-of-range depth; that is a construction-time
    /// programming error, not a runtime condition.
    pub fn new(levels: u8, hasher: Arc<dyn FieldHasher>) -> Self {
        assert!(
            levels > 0 && levels <= MAX_LEVELS,
            "tree depth must be in 1..={MAX_LEVELS}"
        );

        let mut zeros = vec![[0u8; 32]];
        for level in 0..levels as usize {
            let z = zeros[level];
            zeros.push(hasher.hash_pair(&z, &z));
        }

        Self {
            levels,
            zeros,
            nodes: vec![Vec::new(); levels as usize + 1],
            hasher,
        }
    }

    pub fn levels(&self) -> u8 {
        self.levels
    }

    /// Fixed capacity in leaves
    pub fn capacity(&self) -> u64 {
        1u64 << self.levels
    }

    /// Index the next insertion will occupy
    pub fn next_index(&self) -> u64 {
        self.nodes[0].len() as u64
    }

    /// The zero value used at `level` for unfilled positions
    pub fn zero(&self, level: usize) -> [u8; 32] {
        self.zeros[level]
    }

    /// Current root; the empty tree's root is the top-level zero.
    pub fn root(&self) -> [u8; 32] {
        self.nodes[self.levels as usize]
            .first()
            .copied()
            .unwrap_or(self.zeros[self.levels as usize])
    }

    /// Leaf value at `index`, if inserted
    pub fn leaf(&self, index: u64) -> Option<Commitment> {
        self.nodes[0].get(index as usize).map(|h| Commitment(*h))
    }

    /// Append a commitment at the next index.
    ///
    /// Refuses with `CapacityExceeded` once full; a refused insert leaves all
    /// existing nodes untouched.
    pub fn insert(&mut self, leaf: Commitment) -> Result<u64, PoolError> {
        let index = self.next_index();
        if index == self.capacity() {
            return Err(PoolError::CapacityExceeded {
                capacity: self.capacity(),
            });
        }

        self.nodes[0].push(leaf.0);

        // Recompute the ancestor chain of the new leaf.
        let mut node_index = index as usize;
        for level in 0..self.levels as usize {
            let parent = node_index / 2;
            let left = self.node_or_zero(level, parent * 2);
            let right = self.node_or_zero(level, parent * 2 + 1);
            let digest = self.hasher.hash_pair(&left, &right);

            let row = &mut self.nodes[level + 1];
            if parent == row.len() {
                row.push(digest);
            } else {
                row[parent] = digest;
            }
            node_index = parent;
        }

        Ok(index)
    }

    /// Extract the membership path for an inserted leaf.
    pub fn path(&self, index: u64) -> Result<MerklePath, PoolError> {
        if index >= self.next_index() {
            return Err(PoolError::IndexOutOfRange {
                index,
                next_index: self.next_index(),
            });
        }

        let mut siblings = Vec::with_capacity(self.levels as usize);
        let mut directions = Vec::with_capacity(self.levels as usize);
        let mut node_index = index as usize;

        for level in 0..self.levels as usize {
            let is_right = node_index & 1 == 1;
            directions.push(is_right);
            siblings.push(self.node_or_zero(level, node_index ^ 1));
            node_index /= 2;
        }

        Ok(MerklePath {
            siblings,
            directions,
            index,
        })
    }

    fn node_or_zero(&self, level: usize, index: usize) -> [u8; 32] {
        self.nodes[level]
            .get(index)
            .copied()
            .unwrap_or(self.zeros[level])
    }
}
