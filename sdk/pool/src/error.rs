//! Pool error taxonomy
//!
//! The pool layer never catches-and-suppresses; every fault surfaces to the
//! caller, which decides retry-vs-fatal.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolError {
    /// Accumulator is full; fatal, a new pool must be provisioned.
    #[error("accumulator full: all {capacity} leaves in use")]
    CapacityExceeded { capacity: u64 },

    /// Requested a path for a leaf that was never inserted.
    #[error("leaf index {index} out of range (next index is {next_index})")]
    IndexOutOfRange { index: u64, next_index: u64 },

    /// Second spend attempt for the same nullifier hash.
    #[error("nullifier hash already marked spent")]
    AlreadySpent,

    /// Randomness source kept failing the entropy screen.
    #[error("randomness failed the entropy screen {attempts} times; check the CSPRNG")]
    LowEntropy { attempts: u32 },

    /// Envelope ciphertext failed authentication or framing.
    #[error("sealed record rejected: wrong passphrase or tampered ciphertext")]
    EnvelopeRejected,
}
