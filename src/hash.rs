//! Hash function abstraction for the Cartesian Merkle Tree.
//!
//! Two derived quantities drive the whole structure:
//!
//! - **Priority**: `priority(key) = H(key)`, a pure function of the key.
//!   Because priorities come out of a cryptographic digest they are
//!   indistinguishable from random, which keeps the treap balanced in
//!   expectation.
//! - **Node hash**: `node_hash(key, lh, rh) = H(key || min(lh, rh) || max(lh, rh))`.
//!   Sorting the child hashes before digesting makes the commitment
//!   independent of which side a lone child hangs on, and lets a verifier
//!   recombine hashes without knowing left/right placement. Combined with
//!   key-derived priorities, which pin the tree to one canonical shape per
//!   key set, this makes the root a function of the key set alone.
//!
//! All values are [`U256`] words compared by integer magnitude. `U256::ZERO`
//! is reserved as the hash of an absent subtree; `node_hash` of a real node
//! never collides with it except with negligible probability.
//!
//! This module provides a trait abstraction so different digests can be
//! used. [`Blake3Hasher`] is the default; [`Sha256Hasher`] is provided for
//! hosts standardized on SHA-256.

use alloy_primitives::U256;
use sha2::{Digest, Sha256};

/// Trait for hash functions used by the tree.
///
/// Implementations supply the raw digest calls; `priority` and `node_hash`
/// are derived and must not be overridden, since every realization of the
/// tree (boxed, arena, proof verifier) has to agree on them bit for bit.
///
/// # Thread Safety
///
/// The trait is `Send + Sync` so a hasher can be shared with verifiers on
/// other threads. Mutating tree operations themselves are single-threaded.
pub trait Hasher: Clone + Default + Send + Sync {
    /// Digest a single 32-byte word.
    fn hash_word(&self, x: U256) -> U256;

    /// Digest three 32-byte words in order.
    fn hash_words(&self, a: U256, b: U256, c: U256) -> U256;

    /// Deterministic priority of a key: `H(key)`.
    fn priority(&self, key: U256) -> U256 {
        self.hash_word(key)
    }

    /// Canonical node hash: `H(key || min(lh, rh) || max(lh, rh))`.
    ///
    /// Symmetric in `lh` and `rh` by construction. Absent children
    /// contribute `U256::ZERO`.
    fn node_hash(&self, key: U256, left_hash: U256, right_hash: U256) -> U256 {
        let (lo, hi) = if left_hash <= right_hash {
            (left_hash, right_hash)
        } else {
            (right_hash, left_hash)
        };
        self.hash_words(key, lo, hi)
    }
}

/// BLAKE3-based hasher (default).
#[derive(Clone, Copy, Debug, Default)]
pub struct Blake3Hasher;

impl Hasher for Blake3Hasher {
    fn hash_word(&self, x: U256) -> U256 {
        U256::from_be_slice(blake3::hash(&x.to_be_bytes::<32>()).as_bytes())
    }

    fn hash_words(&self, a: U256, b: U256, c: U256) -> U256 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&a.to_be_bytes::<32>());
        hasher.update(&b.to_be_bytes::<32>());
        hasher.update(&c.to_be_bytes::<32>());
        U256::from_be_slice(hasher.finalize().as_bytes())
    }
}

/// SHA-256-based hasher.
#[derive(Clone, Copy, Debug, Default)]
pub struct Sha256Hasher;

impl Hasher for Sha256Hasher {
    fn hash_word(&self, x: U256) -> U256 {
        U256::from_be_slice(&Sha256::digest(x.to_be_bytes::<32>()))
    }

    fn hash_words(&self, a: U256, b: U256, c: U256) -> U256 {
        let mut hasher = Sha256::new();
        hasher.update(a.to_be_bytes::<32>());
        hasher.update(b.to_be_bytes::<32>());
        hasher.update(c.to_be_bytes::<32>());
        U256::from_be_slice(&hasher.finalize())
    }
}
