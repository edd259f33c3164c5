//! BLAKE2b-256 hashing, shared by the state-key constructor and the
//! Merklization dictionary (§4.3, §4.4). Spec.md is explicit that the state
//! key shapes use BLAKE2b, not BLAKE3 — picking the wrong hash function here
//! would silently break bit-exact agreement with a reference implementation.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};

use crate::Hash;

type Blake2b256 = Blake2b<U32>;

/// `blake2b_256(x)` — a 32-byte BLAKE2b digest of `x`.
pub fn blake2b_256(data: &[u8]) -> Hash {
    let mut hasher = Blake2b256::new();
    hasher.update(data);
    let out = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&out);
    hash
}
