//! # Cartesian Merkle Tree (CMT)
//!
//! An authenticated dynamic set over 256-bit keys that keeps three
//! invariants on every node simultaneously:
//!
//! - **BST ordering** on keys (duplicates tie-break to the right)
//! - **Max-heap ordering** on priorities derived as `H(key)`
//! - **Merkle commitment** on each subtree via a canonically symmetric
//!   node hash
//!
//! Because priorities are a pure function of the key and the node hash is
//! order-independent in its two child arguments, any permutation of the
//! same key set produces the same root hash. The tree supports insertion,
//! deletion, membership queries, and succinct proofs of membership or
//! non-membership verified against a single root.
//!
//! ## Realizations
//!
//! - [`CartesianMerkleTree`]: the transient engine over heap-allocated,
//!   uniquely owned nodes.
//! - [`ArenaTree`]: the same engine over an index-keyed node table with a
//!   free list of reclaimed slots, the shape a storage host persists.
//!   Roots and proofs are bit-identical between the two.
//!
//! ## Hash Function
//!
//! The digest is pluggable through the [`Hasher`] trait; [`Blake3Hasher`]
//! is the default and [`Sha256Hasher`] is provided as an alternative. All
//! keys, priorities, and hashes are [`U256`] words compared by integer
//! magnitude, with zero reserved for the empty subtree.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod arena;
mod error;
mod hash;
mod node;
mod proof;
mod tree;

pub use arena::{ArenaNode, ArenaTree};
pub use error::{CmtError, Result};
pub use hash::{Blake3Hasher, Hasher, Sha256Hasher};
pub use proof::Proof;
pub use tree::CartesianMerkleTree;

/// Re-export the field-element word type for convenience.
pub use alloy_primitives::U256;
