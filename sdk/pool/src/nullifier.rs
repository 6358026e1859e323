//! Nullifier Set
//!
//! Tracks consumed nullifier hashes so a commitment can be spent at most
//! once. This in-memory set is a client-side cache only; in any multi-party
//! deployment the authoritative set lives in on-chain account state, which
//! serializes spends through transaction ordering. Like the accumulator, the
//! set is not internally synchronized.

use std::collections::HashSet;

use crate::commitment::NullifierHash;
use crate::error::PoolError;

/// Spent-tag set with check-then-insert semantics
#[derive(Debug, Default)]
pub struct NullifierSet {
    spent: HashSet<NullifierHash>,
}

impl NullifierSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_spent(&self, hash: &NullifierHash) -> bool {
        self.spent.contains(hash)
    }

    /// Mark a hash spent. The second call for the same hash always fails;
    /// a double spend is never silently ignored.
    pub fn mark_spent(&mut self, hash: NullifierHash) -> Result<(), PoolError> {
        if !self.spent.insert(hash) {
            return Err(PoolError::AlreadySpent);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.spent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spent.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_spent_once() {
        let mut set = NullifierSet::new();
        let hash = NullifierHash([1u8; 32]);

        assert!(!set.is_spent(&hash));
        set.mark_spent(hash).unwrap();
        assert!(set.is_spent(&hash));
    }

    #[test]
    fn test_second_spend_always_fails() {
        let mut set = NullifierSet::new();
        let hash = NullifierHash([2u8; 32]);

        set.mark_spent(hash).unwrap();
        assert_eq!(set.mark_spent(hash).unwrap_err(), PoolError::AlreadySpent);
        // and keeps failing
        assert_eq!(set.mark_spent(hash).unwrap_err(), PoolError::AlreadySpent);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_distinct_hashes_independent() {
        let mut set = NullifierSet::new();
        set.mark_spent(NullifierHash([1u8; 32])).unwrap();
        set.mark_spent(NullifierHash([2u8; 32])).unwrap();

        assert_eq!(set.len(), 2);
        assert!(!set.is_spent(&NullifierHash([3u8; 32])));
    }
}
