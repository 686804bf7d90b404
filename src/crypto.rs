//! Hashing helpers
//!
//! Every layer fingerprint is a lowercase hex SHA-256 digest.

use sha2::{Digest, Sha256};

/// SHA-256 of raw bytes, hex encoded.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// SHA-256 over several string parts. Each part is prefixed with its byte
/// length (u64 little-endian), so no choice of part contents can collide
/// with a different split.
pub fn hash_parts<S: AsRef<str>>(parts: &[S]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        let bytes = part.as_ref().as_bytes();
        hasher.update((bytes.len() as u64).to_le_bytes());
        hasher.update(bytes);
    }
    hex::encode(hasher.finalize())
}

/// SHA-256 of a float sample, using little-endian f32 bytes.
pub fn hash_f32_sample(sample: &[f32]) -> String {
    let mut hasher = Sha256::new();
    for value in sample {
        hasher.update(value.to_le_bytes());
    }
    hex::encode(hasher.finalize())
}
