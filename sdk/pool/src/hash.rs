//! Field hash capability
//!
//! The accumulator and commitment scheme take a hash function as an explicit
//! dependency injected at construction; there is no module-global hashing
//! backend. The concrete instantiation is the arkworks Poseidon sponge over
//! BLS12-381 Fr with the standard parameter search (255-bit field, rate 2,
//! 8 full / 57 partial rounds, alpha 5).

use ark_bls12_381::Fr;
use ark_crypto_primitives::sponge::{
    CryptographicSponge,
    poseidon::{PoseidonConfig, PoseidonSponge, find_poseidon_ark_and_mds},
};
use ark_ff::{BigInteger, PrimeField};

/// Fixed-arity field hash used by the pool.
///
/// All inputs are reduced into the hash's field; arithmetic is modular, never
/// native integer wraparound.
pub trait FieldHasher: Send + Sync {
    /// Hash two 32-byte values interpreted as field elements (merkle node).
    fn hash_pair(&self, left: &[u8; 32], right: &[u8; 32]) -> [u8; 32];

    /// Hash a sequence of field elements (commitments, nullifier tags).
    fn hash_fields(&self, inputs: &[Fr]) -> [u8; 32];
}

/// Serialize a field element to 32 little-endian bytes.
pub fn field_to_bytes(f: Fr) -> [u8; 32] {
    let bytes = f.into_bigint().to_bytes_le();
    let mut arr = [0u8; 32];
    arr[..bytes.len()].copy_from_slice(&bytes);
    arr
}

/// Reduce 32 bytes into a field element.
pub fn bytes_to_field(bytes: &[u8; 32]) -> Fr {
    Fr::from_le_bytes_mod_order(bytes)
}

/// Poseidon hasher over BLS12-381 Fr
pub struct PoseidonHasher {
    config: PoseidonConfig<Fr>,
}

impl PoseidonHasher {
    pub fn new() -> Self {
        Self {
            config: poseidon_config(),
        }
    }
}

impl Default for PoseidonHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldHasher for PoseidonHasher {
    fn hash_pair(&self, left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
        self.hash_fields(&[bytes_to_field(left), bytes_to_field(right)])
    }

    fn hash_fields(&self, inputs: &[Fr]) -> [u8; 32] {
        let mut sponge = PoseidonSponge::new(&self.config);
        for input in inputs {
            sponge.absorb(input);
        }
        let result: Fr = sponge.squeeze_field_elements(1)[0];
        field_to_bytes(result)
    }
}

/// Poseidon configuration for Lifeboat
///
/// Field: BLS12-381 Fr (255 bits)
/// Rate: 2, Capacity: 1
/// Security: 128 bits
fn poseidon_config() -> PoseidonConfig<Fr> {
    let prime_bits: u64 = 255;
    let rate: usize = 2;
    let capacity: usize = 1;
    let full_rounds: u64 = 8;
    let partial_rounds: u64 = 57;
    let alpha: u64 = 5;
    let skip_matrices: u64 = 0;

    let (ark, mds) = find_poseidon_ark_and_mds::<Fr>(
        prime_bits,
        rate,
        full_rounds,
        partial_rounds,
        skip_matrices,
    );

    PoseidonConfig::new(
        full_rounds as usize,
        partial_rounds as usize,
        alpha,
        mds,
        ark,
        rate,
        capacity,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_pair_deterministic() {
        let hasher = PoseidonHasher::new();
        let a = [1u8; 32];
        let b = [2u8; 32];

        assert_eq!(hasher.hash_pair(&a, &b), hasher.hash_pair(&a, &b));
    }

    #[test]
    fn test_hash_pair_order_matters() {
        let hasher = PoseidonHasher::new();
        let a = [1u8; 32];
        let b = [2u8; 32];

        assert_ne!(
            hasher.hash_pair(&a, &b),
            hasher.hash_pair(&b, &a),
            "swapping children must change the parent"
        );
    }

    #[test]
    fn test_hash_fields_arity_sensitive() {
        let hasher = PoseidonHasher::new();
        let x = Fr::from(7u64);

        assert_ne!(hasher.hash_fields(&[x]), hasher.hash_fields(&[x, x]));
    }
}
