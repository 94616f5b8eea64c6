//! The transient (heap-allocated) tree engine.
//!
//! [`CartesianMerkleTree`] keeps three invariants on every node at once:
//!
//! - **BST order** on keys: left subtree `< key`, right subtree `>= key`
//!   (duplicate keys tie-break to the right and are stored as separate
//!   nodes).
//! - **Max-heap order** on priorities, where `priority = H(key)`.
//! - **Merkle consistency**: every node's hash commits to its subtree via
//!   the canonical [`Hasher::node_hash`].
//!
//! Together these make the root hash a function of the key multiset alone:
//! any insertion order of the same keys converges on the same shape, and
//! the symmetric node hash erases the remaining left/right freedom.
//!
//! # Recursion depth
//!
//! Insert, remove, and proving recurse to tree depth. With hash-derived
//! priorities the depth is O(log n) with overwhelming probability for any
//! key distribution an adversary can feasibly produce, but the worst case
//! is O(n); callers running on shallow stacks should bound their key-set
//! size or reserve stack quota accordingly.

use alloy_primitives::U256;
use std::cmp::Ordering;

use crate::node::{rotate_left, rotate_right, Link, Node};
use crate::{Blake3Hasher, Hasher, Proof};

/// A Cartesian Merkle Tree over [`U256`] keys.
///
/// # Example
///
/// ```
/// use cmt::{Blake3Hasher, CartesianMerkleTree, U256};
///
/// let mut tree: CartesianMerkleTree<Blake3Hasher> = CartesianMerkleTree::new();
/// tree.insert(U256::from(50u64));
/// tree.insert(U256::from(30u64));
/// tree.insert(U256::from(70u64));
///
/// let root = tree.root_hash();
/// let proof = tree.prove(U256::from(30u64));
/// assert!(proof.existence);
/// assert!(proof.verify(tree.hasher(), root, U256::from(30u64)));
/// ```
#[derive(Clone, Debug)]
pub struct CartesianMerkleTree<H: Hasher = Blake3Hasher> {
    root: Link,
    hasher: H,
    size: usize,
}

impl<H: Hasher> Default for CartesianMerkleTree<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: Hasher> CartesianMerkleTree<H> {
    /// Create a new empty tree.
    pub fn new() -> Self {
        Self {
            root: None,
            hasher: H::default(),
            size: 0,
        }
    }

    /// Create a new empty tree around a specific hasher value.
    pub fn with_hasher(hasher: H) -> Self {
        Self {
            root: None,
            hasher,
            size: 0,
        }
    }

    /// The hasher this tree digests with.
    pub fn hasher(&self) -> &H {
        &self.hasher
    }

    /// Number of nodes in the tree. Duplicate keys each count once.
    pub fn len(&self) -> usize {
        self.size
    }

    /// Check if the tree is empty.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// The Merkle root: zero for an empty tree, the root node's hash
    /// otherwise.
    pub fn root_hash(&self) -> U256 {
        self.root.as_ref().map_or(U256::ZERO, |node| node.hash)
    }

    /// Insert a key.
    ///
    /// Inserting a key that is already present creates a second node for
    /// it (tie-break to the right); the root hash changes accordingly.
    pub fn insert(&mut self, key: U256) {
        let root = self.root.take();
        self.root = Some(Self::insert_node(root, key, &self.hasher));
        self.size += 1;
    }

    /// Insert every key from an iterator; returns how many were inserted.
    ///
    /// Equivalent to calling [`insert`](Self::insert) in iteration order.
    /// The resulting root does not depend on that order.
    pub fn insert_batch<I>(&mut self, keys: I) -> usize
    where
        I: IntoIterator<Item = U256>,
    {
        let mut inserted = 0;
        for key in keys {
            self.insert(key);
            inserted += 1;
        }
        inserted
    }

    /// Returns `true` if `key` is present.
    pub fn search(&self, key: U256) -> bool {
        let mut current = self.root.as_deref();
        while let Some(node) = current {
            match key.cmp(&node.key) {
                Ordering::Less => current = node.left.as_deref(),
                Ordering::Greater => current = node.right.as_deref(),
                Ordering::Equal => return true,
            }
        }
        false
    }

    /// Remove one occurrence of `key`.
    ///
    /// Returns `true` iff a node was removed. Removing an absent key
    /// leaves the tree untouched.
    pub fn remove(&mut self, key: U256) -> bool {
        let (root, removed) = Self::remove_node(self.root.take(), key, &self.hasher);
        self.root = root;
        if removed {
            self.size -= 1;
        }
        removed
    }

    fn insert_node(node: Link, key: U256, hasher: &H) -> Box<Node> {
        match node {
            None => Box::new(Node::new(key, hasher)),
            Some(mut parent) => {
                if key < parent.key {
                    let child = Self::insert_node(parent.left.take(), key, hasher);
                    let lift = child.priority > parent.priority;
                    parent.left = Some(child);
                    if lift {
                        // Exactly one rotation per level restores the heap.
                        return rotate_right(parent, hasher);
                    }
                    parent.refresh_hash(hasher);
                    parent
                } else {
                    let child = Self::insert_node(parent.right.take(), key, hasher);
                    let lift = child.priority > parent.priority;
                    parent.right = Some(child);
                    if lift {
                        return rotate_left(parent, hasher);
                    }
                    parent.refresh_hash(hasher);
                    parent
                }
            }
        }
    }

    fn remove_node(node: Link, key: U256, hasher: &H) -> (Link, bool) {
        let Some(mut node) = node else {
            return (None, false);
        };
        match key.cmp(&node.key) {
            Ordering::Less => {
                let (new_left, removed) = Self::remove_node(node.left.take(), key, hasher);
                node.left = new_left;
                if removed {
                    node.refresh_hash(hasher);
                }
                (Some(node), removed)
            }
            Ordering::Greater => {
                let (new_right, removed) = Self::remove_node(node.right.take(), key, hasher);
                node.right = new_right;
                if removed {
                    node.refresh_hash(hasher);
                }
                (Some(node), removed)
            }
            Ordering::Equal => {
                if node.left.is_none() {
                    return (node.right.take(), true);
                }
                if node.right.is_none() {
                    return (node.left.take(), true);
                }
                // Two children: rotate the higher-priority child up and
                // chase the target one level down until it sheds a child.
                let left_priority = node.left.as_ref().map_or(U256::ZERO, |n| n.priority);
                let right_priority = node.right.as_ref().map_or(U256::ZERO, |n| n.priority);
                if left_priority > right_priority {
                    node = rotate_right(node, hasher);
                    let (new_right, removed) = Self::remove_node(node.right.take(), key, hasher);
                    node.right = new_right;
                    node.refresh_hash(hasher);
                    (Some(node), removed)
                } else {
                    node = rotate_left(node, hasher);
                    let (new_left, removed) = Self::remove_node(node.left.take(), key, hasher);
                    node.left = new_left;
                    node.refresh_hash(hasher);
                    (Some(node), removed)
                }
            }
        }
    }

    /// Build a membership or non-membership proof for `key`.
    ///
    /// A single descent finds either a node holding `key` (membership) or
    /// the node where the required child is absent (non-membership; that
    /// node's key becomes [`Proof::non_existence_key`]). The terminating
    /// node contributes its two child hashes as the leaf-context pair and
    /// is not re-recorded among the ancestors.
    ///
    /// On the empty tree this returns a non-membership proof with no
    /// siblings that verifies against root zero.
    pub fn prove(&self, key: U256) -> Proof {
        let Some(root) = self.root.as_deref() else {
            return Proof {
                root: U256::ZERO,
                existence: false,
                key,
                non_existence_key: U256::ZERO,
                direction_bits: U256::ZERO,
                siblings: Vec::new(),
            };
        };

        let mut path: Vec<&Node> = Vec::new();
        let mut current = root;
        let (existence, terminal) = loop {
            match key.cmp(&current.key) {
                Ordering::Equal => break (true, current),
                Ordering::Less => match current.left.as_deref() {
                    Some(child) => {
                        path.push(current);
                        current = child;
                    }
                    None => break (false, current),
                },
                Ordering::Greater => match current.right.as_deref() {
                    Some(child) => {
                        path.push(current);
                        current = child;
                    }
                    None => break (false, current),
                },
            }
        };

        let mut siblings = Vec::with_capacity(2 + 2 * path.len());
        siblings.push(terminal.left_hash());
        siblings.push(terminal.right_hash());
        // One swap bit per recorded pair, leaf-side first: the leaf-context
        // pair sets the low bit without shifting, every ancestor pair
        // shifts then sets.
        let mut direction_bits = U256::ZERO;
        if terminal.left_hash() > terminal.right_hash() {
            direction_bits |= U256::from(1u8);
        }
        for ancestor in path.iter().rev() {
            let sibling_hash = if key < ancestor.key {
                ancestor.right_hash()
            } else {
                ancestor.left_hash()
            };
            siblings.push(ancestor.key);
            siblings.push(sibling_hash);
            direction_bits <<= 1;
            if ancestor.left_hash() > ancestor.right_hash() {
                direction_bits |= U256::from(1u8);
            }
        }

        Proof {
            root: self.root_hash(),
            existence,
            key,
            non_existence_key: if existence { U256::ZERO } else { terminal.key },
            direction_bits,
            siblings,
        }
    }

    #[cfg(test)]
    pub(crate) fn assert_invariants(&self) {
        fn walk<H: Hasher>(node: &Node, lo: Option<U256>, hi: Option<U256>, hasher: &H) {
            if let Some(lo) = lo {
                assert!(node.key >= lo, "BST violated: {} < bound {}", node.key, lo);
            }
            if let Some(hi) = hi {
                assert!(node.key < hi, "BST violated: {} >= bound {}", node.key, hi);
            }
            assert_eq!(node.priority, hasher.priority(node.key), "stale priority");
            assert_eq!(
                node.hash,
                hasher.node_hash(node.key, node.left_hash(), node.right_hash()),
                "stale merkle hash at key {}",
                node.key
            );
            if let Some(left) = node.left.as_deref() {
                assert!(left.priority <= node.priority, "heap violated");
                walk(left, lo, Some(node.key), hasher);
            }
            if let Some(right) = node.right.as_deref() {
                assert!(right.priority <= node.priority, "heap violated");
                walk(right, Some(node.key), hi, hasher);
            }
        }
        if let Some(root) = self.root.as_deref() {
            walk(root, None, None, &self.hasher);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree_of(keys: &[u64]) -> CartesianMerkleTree<Blake3Hasher> {
        let mut tree = CartesianMerkleTree::new();
        for &k in keys {
            tree.insert(U256::from(k));
        }
        tree
    }

    #[test]
    fn test_empty_tree() {
        let tree: CartesianMerkleTree<Blake3Hasher> = CartesianMerkleTree::new();
        assert!(tree.is_empty());
        assert_eq!(tree.root_hash(), U256::ZERO);
        assert!(!tree.search(U256::from(1u64)));
    }

    #[test]
    fn test_insert_and_search() {
        let tree = tree_of(&[50, 30, 70]);
        assert_eq!(tree.len(), 3);
        for k in [50u64, 30, 70] {
            assert!(tree.search(U256::from(k)));
        }
        assert!(!tree.search(U256::from(100u64)));
        assert_ne!(tree.root_hash(), U256::ZERO);
        tree.assert_invariants();
    }

    #[test]
    fn test_remove_changes_root() {
        let mut tree = tree_of(&[50, 30, 70]);
        let root_before = tree.root_hash();
        assert!(tree.remove(U256::from(70u64)));
        assert!(!tree.search(U256::from(70u64)));
        assert_ne!(tree.root_hash(), root_before);
        tree.assert_invariants();
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let mut tree = tree_of(&[50, 30, 70]);
        let root_before = tree.root_hash();
        assert!(!tree.remove(U256::from(100u64)));
        assert_eq!(tree.root_hash(), root_before);
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn test_remove_everything() {
        let mut tree = tree_of(&[5, 3, 8, 1, 4, 7, 9, 2, 6]);
        for k in [1u64, 2, 3, 4, 5, 6, 7, 8, 9] {
            assert!(tree.remove(U256::from(k)));
            tree.assert_invariants();
        }
        assert!(tree.is_empty());
        assert_eq!(tree.root_hash(), U256::ZERO);
    }

    #[test]
    fn test_insertion_order_independence() {
        let a = tree_of(&[50, 30, 70]);
        let b = tree_of(&[30, 70, 50]);
        assert_eq!(a.root_hash(), b.root_hash());
    }

    #[test]
    fn test_insert_batch_matches_sequential() {
        let mut batched: CartesianMerkleTree<Blake3Hasher> = CartesianMerkleTree::new();
        let inserted = batched.insert_batch((0u64..32).map(U256::from));
        assert_eq!(inserted, 32);
        let sequential = tree_of(&(0u64..32).collect::<Vec<_>>());
        assert_eq!(batched.root_hash(), sequential.root_hash());
    }

    #[test]
    fn test_single_node_tree() {
        let tree = tree_of(&[42]);
        assert_eq!(
            tree.root_hash(),
            tree.hasher()
                .node_hash(U256::from(42u64), U256::ZERO, U256::ZERO)
        );
        let proof = tree.prove(U256::from(42u64));
        assert!(proof.existence);
        assert_eq!(proof.siblings, vec![U256::ZERO, U256::ZERO]);
        assert!(proof.verify(tree.hasher(), tree.root_hash(), U256::from(42u64)));
    }

    #[test]
    fn test_duplicate_insert() {
        let mut tree = tree_of(&[50]);
        let single_root = tree.root_hash();
        tree.insert(U256::from(50u64));
        assert_eq!(tree.len(), 2);
        assert_ne!(tree.root_hash(), single_root);
        assert!(tree.search(U256::from(50u64)));
        tree.assert_invariants();

        // Removing one occurrence restores the single-node commitment.
        assert!(tree.remove(U256::from(50u64)));
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.root_hash(), single_root);
        assert!(tree.search(U256::from(50u64)));
    }

    #[test]
    fn test_membership_proof_verifies() {
        let tree = tree_of(&[50, 30, 70, 20, 40, 60, 80]);
        let root = tree.root_hash();
        for k in [50u64, 30, 70, 20, 40, 60, 80] {
            let proof = tree.prove(U256::from(k));
            assert!(proof.existence, "key {k} should be present");
            assert!(proof.verify(tree.hasher(), root, U256::from(k)));
        }
    }

    #[test]
    fn test_non_membership_proof() {
        let tree = tree_of(&[50, 30, 70]);
        let proof = tree.prove(U256::from(40u64));
        assert!(!proof.existence);
        let vantage: u64 = proof.non_existence_key.to::<u64>();
        assert!([30u64, 50, 70].contains(&vantage));
        assert!(proof.verify(tree.hasher(), tree.root_hash(), U256::from(40u64)));
    }

    #[test]
    fn test_proof_binding_across_mutation() {
        let mut tree = tree_of(&[50, 30, 70]);
        let old_root = tree.root_hash();
        let old_proof = tree.prove(U256::from(30u64));

        tree.insert(U256::from(20u64));
        let new_root = tree.root_hash();

        assert!(old_proof.verify(tree.hasher(), old_root, U256::from(30u64)));
        assert!(!old_proof.verify(tree.hasher(), new_root, U256::from(30u64)));

        let fresh = tree.prove(U256::from(30u64));
        assert!(fresh.verify(tree.hasher(), new_root, U256::from(30u64)));
    }

    #[test]
    fn test_empty_tree_proof() {
        let tree: CartesianMerkleTree<Blake3Hasher> = CartesianMerkleTree::new();
        let proof = tree.prove(U256::from(42u64));
        assert!(!proof.existence);
        assert_eq!(proof.siblings_length(), 0);
        assert_eq!(proof.non_existence_key, U256::ZERO);
        assert!(proof.verify(tree.hasher(), U256::ZERO, U256::from(42u64)));
    }

    #[test]
    fn test_direction_bits_redundant_under_symmetric_hash() {
        // The bits are part of the format, not of the math: wiping them
        // must not affect verification while node_hash stays symmetric.
        let tree = tree_of(&[9, 4, 17, 2, 6, 12, 25, 1, 3]);
        let root = tree.root_hash();
        for k in [9u64, 1, 25, 6] {
            let mut proof = tree.prove(U256::from(k));
            assert_ne!(proof.siblings_length(), 0);
            proof.direction_bits = U256::ZERO;
            assert!(proof.verify(tree.hasher(), root, U256::from(k)));
        }
    }

    #[test]
    fn test_tampered_sibling_rejected() {
        let tree = tree_of(&[50, 30, 70, 20]);
        let root = tree.root_hash();
        let mut proof = tree.prove(U256::from(20u64));
        let last = proof.siblings.len() - 1;
        proof.siblings[last] ^= U256::from(1u8);
        assert!(!proof.verify(tree.hasher(), root, U256::from(20u64)));
    }

    #[test]
    fn test_remove_then_insert_restores_root() {
        let mut tree = tree_of(&[13, 7, 21, 3, 11, 17, 29]);
        let root = tree.root_hash();
        assert!(tree.remove(U256::from(11u64)));
        assert_ne!(tree.root_hash(), root);
        tree.insert(U256::from(11u64));
        assert_eq!(tree.root_hash(), root);
    }

    #[test]
    fn test_invariants_after_heavy_churn() {
        let mut tree: CartesianMerkleTree<Blake3Hasher> = CartesianMerkleTree::new();
        for i in 0u64..200 {
            tree.insert(U256::from(i.wrapping_mul(0x9e37_79b9_7f4a_7c15)));
            if i % 3 == 0 {
                tree.remove(U256::from((i / 2).wrapping_mul(0x9e37_79b9_7f4a_7c15)));
            }
        }
        tree.assert_invariants();
    }
}
