//! Root history collaborator
//!
//! The accumulator itself keeps no historical roots; this collaborator
//! tracks recent roots so slightly stale proofs can still be recognized and
//! drift detected before committing to a submission.

use std::sync::Mutex;

use crate::rescue::error::RescueError;

pub trait RootHistory: Send + Sync {
    /// The root proofs should currently be built against.
    fn current_root(&self) -> Result<[u8; 32], RescueError>;

    /// Whether a root is the current one or a recent predecessor.
    fn is_known_root(&self, root: &[u8; 32]) -> Result<bool, RescueError>;
}

/// Bounded in-memory history, most recent first
pub struct InMemoryRootHistory {
    roots: Mutex<Vec<[u8; 32]>>,
    max_size: usize,
}

impl InMemoryRootHistory {
    pub fn new(max_size: usize) -> Self {
        Self {
            roots: Mutex::new(Vec::new()),
            max_size,
        }
    }

    pub fn push(&self, root: [u8; 32]) {
        let mut roots = self.roots.lock().unwrap();
        roots.insert(0, root);
        if roots.len() > self.max_size {
            roots.pop();
        }
    }
}

impl RootHistory for InMemoryRootHistory {
    fn current_root(&self) -> Result<[u8; 32], RescueError> {
        self.roots
            .lock()
            .unwrap()
            .first()
            .copied()
            .ok_or_else(|| RescueError::Internal("root history is empty".to_string()))
    }

    fn is_known_root(&self, root: &[u8; 32]) -> Result<bool, RescueError> {
        Ok(self.roots.lock().unwrap().contains(root))
    }
}
