//! Encrypted envelope
//!
//! The only path by which spend material may reach durable storage.
//!
//! ```text
//! Flow:
//! 1. key   = blake3_derive_key("lifeboat-envelope-v1", passphrase || salt)
//! 2. salt  = 16 random bytes per seal, nonce = 12 random bytes per seal
//! 3. body  = ChaCha20-Poly1305(key, nonce, plaintext)   (tag appended)
//! 4. record = { salt, nonce, ciphertext }
//! ```
//!
//! Records serialize with hex fields, one JSON record per line in the audit
//! log. Opening verifies the authentication tag; any tamper or wrong
//! passphrase is rejected.

use chacha20poly1305::{
    ChaCha20Poly1305, Nonce,
    aead::{Aead, KeyInit},
};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::error::PoolError;

const KEY_CONTEXT: &str = "lifeboat-envelope-v1";

/// One authenticated-encryption record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SealedRecord {
    #[serde(with = "hex::serde")]
    pub salt: [u8; 16],
    #[serde(with = "hex::serde")]
    pub nonce: [u8; 12],
    /// Ciphertext with the Poly1305 tag appended
    #[serde(with = "hex::serde")]
    pub ciphertext: Vec<u8>,
}

/// Seal `plaintext` under a passphrase-derived key.
///
/// Salt and nonce are drawn fresh from `rng` on every call; sealing the same
/// plaintext twice yields unrelated records.
pub fn seal<R: RngCore + CryptoRng>(
    passphrase: &str,
    plaintext: &[u8],
    rng: &mut R,
) -> SealedRecord {
    let mut salt = [0u8; 16];
    rng.fill_bytes(&mut salt);
    let mut nonce_bytes = [0u8; 12];
    rng.fill_bytes(&mut nonce_bytes);

    let key = derive_envelope_key(passphrase, &salt);
    let cipher = ChaCha20Poly1305::new_from_slice(&key).expect("valid key length");

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .expect("encryption should not fail");

    SealedRecord {
        salt,
        nonce: nonce_bytes,
        ciphertext,
    }
}

/// Open a sealed record; fails on a wrong passphrase or tampered ciphertext.
pub fn open(passphrase: &str, record: &SealedRecord) -> Result<Vec<u8>, PoolError> {
    let key = derive_envelope_key(passphrase, &record.salt);
    let cipher =
        ChaCha20Poly1305::new_from_slice(&key).map_err(|_| PoolError::EnvelopeRejected)?;

    cipher
        .decrypt(Nonce::from_slice(&record.nonce), record.ciphertext.as_slice())
        .map_err(|_| PoolError::EnvelopeRejected)
}

fn derive_envelope_key(passphrase: &str, salt: &[u8; 16]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_derive_key(KEY_CONTEXT);
    hasher.update(passphrase.as_bytes());
    hasher.update(salt);
    *hasher.finalize().as_bytes()
}
