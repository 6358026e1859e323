//! Proof backend collaborator
//!
//! The engine treats the prover as opaque: it hands over circuit inputs and
//! embeds the returned bytes in the deposit instruction. Witness secrets stay
//! inside [`CircuitInputs`] for exactly one attempt.

use std::fmt;
use std::sync::Mutex;

use lifeboat_pool::{Commitment, NullifierHash};

use crate::rescue::error::RescueError;

/// Inputs for one membership/validity proof
#[derive(Clone)]
pub struct CircuitInputs {
    /// Accumulator root the proof is built against
    pub root: [u8; 32],
    pub commitment: Commitment,
    pub nullifier_hash: NullifierHash,
    pub amount: u64,
    /// Private witness: the spend secret
    pub secret: [u8; 32],
}

impl fmt::Debug for CircuitInputs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // witness stays out of logs
        f.debug_struct("CircuitInputs")
            .field("root", &hex::encode(self.root))
            .field("commitment", &self.commitment)
            .field("nullifier_hash", &self.nullifier_hash)
            .field("amount", &self.amount)
            .finish_non_exhaustive()
    }
}

/// An opaque proof
#[derive(Debug, Clone)]
pub struct Proof {
    pub bytes: Vec<u8>,
}

pub trait ProofBackend: Send + Sync {
    fn prove(&self, inputs: &CircuitInputs) -> Result<Proof, RescueError>;
}

/// Mock backend: deterministic fake proof bytes, records every request so
/// tests can assert how many commitments were proven and that none was
/// reused across attempts.
#[derive(Default)]
pub struct MockProofBackend {
    requests: Mutex<Vec<CircuitInputs>>,
}

impl MockProofBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<CircuitInputs> {
        self.requests.lock().unwrap().clone()
    }
}

impl ProofBackend for MockProofBackend {
    fn prove(&self, inputs: &CircuitInputs) -> Result<Proof, RescueError> {
        self.requests.lock().unwrap().push(inputs.clone());

        let mut hasher = blake3::Hasher::new();
        hasher.update(&inputs.root);
        hasher.update(inputs.commitment.as_bytes());
        hasher.update(inputs.nullifier_hash.as_bytes());
        hasher.update(&inputs.amount.to_le_bytes());

        Ok(Proof {
            bytes: hasher.finalize().as_bytes().to_vec(),
        })
    }
}
