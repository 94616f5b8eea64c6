//! Membership and non-membership proofs.
//!
//! A proof authenticates one key against a single root hash. Verification
//! is a pure function of `(proof, expected_root, key)` and a hasher; no
//! tree access is needed.
//!
//! # Wire format
//!
//! The layout is public so that storage-backed realizations and RPC
//! surfaces serialize identically:
//!
//! ```text
//! root:               32 bytes, big-endian
//! existence:          1 byte (0 or 1)
//! key:                32 bytes
//! non_existence_key:  32 bytes (zero when existence = 1 or tree empty)
//! direction_bits:     32 bytes (nonnegative integer, bits consumed LSB-first)
//! siblings_length:    4 bytes, big-endian u32
//! siblings:           siblings_length * 32 bytes
//!     [ leaf_left_h, leaf_right_h,
//!       anc1_key, anc1_sib_h,
//!       anc2_key, anc2_sib_h, ... ]
//! ```
//!
//! An empty-tree proof has `siblings_length == 0` and `existence == 0`.

use alloy_primitives::U256;

use crate::{CmtError, Hasher, Result};

/// Fixed-size prefix of the wire encoding: root, existence flag, key,
/// non-existence key, direction bits, sibling count.
const HEADER_LEN: usize = 32 + 1 + 32 + 32 + 32 + 4;

/// A succinct proof of membership or non-membership.
///
/// Produced by [`CartesianMerkleTree::prove`](crate::CartesianMerkleTree::prove)
/// and [`ArenaTree::prove`](crate::ArenaTree::prove); both emit identical
/// proofs for identical key sets.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Proof {
    /// Root hash the proof was minted under.
    pub root: U256,
    /// `true` for membership, `false` for non-membership.
    pub existence: bool,
    /// The queried key.
    pub key: U256,
    /// For non-membership: the key of the node where descent found the
    /// required child absent. Zero for membership proofs and for the
    /// empty tree.
    pub non_existence_key: U256,
    /// Per-level swap bits recorded by the builder; see [`Proof::verify`].
    pub direction_bits: U256,
    /// Flat sibling sequence: the leaf-context pair first, then one
    /// `(ancestor_key, sibling_hash)` pair per level toward the root.
    pub siblings: Vec<U256>,
}

impl Proof {
    /// The wire-format sibling count.
    pub fn siblings_length(&self) -> u32 {
        self.siblings.len() as u32
    }

    /// Verify this proof against `expected_root` for `key`.
    ///
    /// Returns `false` when the proof was minted under a different root,
    /// or when the reconstructed root does not match. The direction bits
    /// steer which argument slot the running hash occupies at each level;
    /// under the canonically symmetric node hash both placements digest
    /// identically, but builder and verifier still consume the bits in
    /// lockstep so the format survives any future asymmetric hash.
    ///
    /// # Panics
    ///
    /// Panics on a structurally malformed proof: a nonzero sibling count
    /// that is odd or less than 2. Proofs decoded by [`Proof::from_bytes`]
    /// are never malformed; only hand-built values can trip this.
    pub fn verify<H: Hasher>(&self, hasher: &H, expected_root: U256, key: U256) -> bool {
        if self.root != expected_root {
            return false;
        }
        if self.siblings.is_empty() {
            // Only the empty tree mints sibling-free proofs.
            return !self.existence;
        }
        assert!(
            self.siblings.len() >= 2 && self.siblings.len() % 2 == 0,
            "malformed proof: sibling count {} (need an even count >= 2)",
            self.siblings.len()
        );

        let leaf_key = if self.existence {
            key
        } else {
            self.non_existence_key
        };
        let mut acc = hasher.node_hash(leaf_key, self.siblings[0], self.siblings[1]);

        let mut bits = self.direction_bits;
        let two = U256::from(2u8);
        for pair in self.siblings[2..].chunks_exact(2) {
            let (ancestor_key, sibling_hash) = (pair[0], pair[1]);
            let (rest, bit) = bits.div_rem(two);
            bits = rest;
            acc = if bit.is_zero() {
                hasher.node_hash(ancestor_key, acc, sibling_hash)
            } else {
                hasher.node_hash(ancestor_key, sibling_hash, acc)
            };
        }

        acc == expected_root
    }

    /// Serialize into the wire format.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + 32 * self.siblings.len());
        out.extend_from_slice(&self.root.to_be_bytes::<32>());
        out.push(u8::from(self.existence));
        out.extend_from_slice(&self.key.to_be_bytes::<32>());
        out.extend_from_slice(&self.non_existence_key.to_be_bytes::<32>());
        out.extend_from_slice(&self.direction_bits.to_be_bytes::<32>());
        out.extend_from_slice(&self.siblings_length().to_be_bytes());
        for sibling in &self.siblings {
            out.extend_from_slice(&sibling.to_be_bytes::<32>());
        }
        out
    }

    /// Deserialize from the wire format.
    ///
    /// Rejects truncated input, invalid existence tags, odd sibling
    /// counts, and trailing bytes, so a successfully decoded proof always
    /// satisfies the structural preconditions of [`Proof::verify`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(CmtError::Truncated {
                expected: HEADER_LEN,
                actual: bytes.len(),
            });
        }
        let root = U256::from_be_slice(&bytes[0..32]);
        let existence = match bytes[32] {
            0 => false,
            1 => true,
            tag => return Err(CmtError::InvalidExistenceTag(tag)),
        };
        let key = U256::from_be_slice(&bytes[33..65]);
        let non_existence_key = U256::from_be_slice(&bytes[65..97]);
        let direction_bits = U256::from_be_slice(&bytes[97..129]);
        let count = u32::from_be_bytes([bytes[129], bytes[130], bytes[131], bytes[132]]);
        if count % 2 != 0 {
            return Err(CmtError::OddSiblingCount(count));
        }
        let expected = HEADER_LEN + 32 * count as usize;
        if bytes.len() < expected {
            return Err(CmtError::Truncated {
                expected,
                actual: bytes.len(),
            });
        }
        if bytes.len() > expected {
            return Err(CmtError::TrailingBytes(bytes.len() - expected));
        }
        let siblings = bytes[HEADER_LEN..]
            .chunks_exact(32)
            .map(U256::from_be_slice)
            .collect();
        Ok(Self {
            root,
            existence,
            key,
            non_existence_key,
            direction_bits,
            siblings,
        })
    }
}
