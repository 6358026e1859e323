//! Lifeboat Pool SDK
//!
//! Shielded-pool primitives for the rescue engine.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                       Shielded Pool                            │
//! │  ┌──────────────┐  ┌──────────────────┐  ┌──────────────────┐ │
//! │  │ Commitments  │  │ Merkle           │  │ Nullifier Set    │ │
//! │  │ H(s, n, amt) │  │ Accumulator      │  │ (spent tags)     │ │
//! │  └──────────────┘  └──────────────────┘  └──────────────────┘ │
//! │         │                   │                     │            │
//! │         └─────────┬─────────┘                     │            │
//! │                   ▼                               ▼            │
//! │  ┌─────────────────────────────────────────────────────────┐  │
//! │  │          FieldHasher (injected Poseidon capability)     │  │
//! │  │  • no ambient global hash state                         │  │
//! │  │  • path replay reproduces root exactly                  │  │
//! │  └─────────────────────────────────────────────────────────┘  │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Secret material never touches durable storage in plaintext; the
//! [`envelope`] module is the only persistence path.

pub mod commitment;
pub mod envelope;
pub mod error;
pub mod hash;
pub mod merkle;
pub mod nullifier;

pub use commitment::{Commitment, CommitmentScheme, NullifierHash, SecretMaterial};
pub use envelope::{SealedRecord, open, seal};
pub use error::PoolError;
pub use hash::{FieldHasher, PoseidonHasher, bytes_to_field, field_to_bytes};
pub use merkle::{MAX_LEVELS, MerkleAccumulator, MerklePath};
pub use nullifier::NullifierSet;
