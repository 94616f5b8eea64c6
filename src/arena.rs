//! The index-addressed persistent variant.
//!
//! [`ArenaTree`] re-implements the engine over a table of numbered slots
//! instead of owned boxes, the layout a host-storage realization persists
//! directly: one scalar slot per field (`root_index`, `next_node_index`,
//! `deleted_indices_head`), one `nodes` mapping, and one `deleted_indices`
//! mapping forming a singly-linked free-list stack (`0` terminates).
//!
//! Index `0` means "no child" everywhere, so live indices start at 1.
//! Allocation pops the free list when non-empty and otherwise
//! post-increments the counter, which keeps the table dense across churn
//! and allocation O(1).
//!
//! Every comparison, rotation, and hash refresh mirrors
//! [`CartesianMerkleTree`](crate::CartesianMerkleTree) exactly, so the two
//! variants produce bit-identical roots and proofs for the same key
//! sequence; the parity is property-tested. Recursion depth matches the
//! transient variant: O(log n) expected, O(n) worst case.

use alloy_primitives::U256;
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::{Blake3Hasher, Hasher, Proof};

/// Sentinel index for "no child" / "empty list".
const NIL: u64 = 0;

/// A node slot in the arena.
///
/// The same record a storage host would keep under `nodes[index]`.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ArenaNode {
    /// The stored key.
    pub key: U256,
    /// `H(key)`.
    pub priority: U256,
    /// Merkle commitment of the subtree rooted at this slot.
    pub merkle_hash: U256,
    /// Slot index of the left child, 0 when absent.
    pub left_index: u64,
    /// Slot index of the right child, 0 when absent.
    pub right_index: u64,
}

/// A Cartesian Merkle Tree backed by an index-keyed node table with
/// free-list slot reuse.
#[derive(Clone, Debug)]
pub struct ArenaTree<H: Hasher = Blake3Hasher> {
    root_index: u64,
    next_node_index: u64,
    nodes: HashMap<u64, ArenaNode>,
    deleted_indices_head: u64,
    deleted_indices: HashMap<u64, u64>,
    hasher: H,
}

impl<H: Hasher> Default for ArenaTree<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: Hasher> ArenaTree<H> {
    /// Create a new empty tree.
    pub fn new() -> Self {
        Self::with_hasher(H::default())
    }

    /// Create a new empty tree around a specific hasher value.
    pub fn with_hasher(hasher: H) -> Self {
        Self {
            root_index: NIL,
            next_node_index: 1,
            nodes: HashMap::new(),
            deleted_indices_head: NIL,
            deleted_indices: HashMap::new(),
            hasher,
        }
    }

    /// The hasher this tree digests with.
    pub fn hasher(&self) -> &H {
        &self.hasher
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the tree is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of slots ever handed out by the index counter. Stays flat
    /// while the free list can satisfy allocations.
    pub fn allocated_slots(&self) -> u64 {
        self.next_node_index - 1
    }

    /// Number of reclaimed slots currently awaiting reuse.
    pub fn free_list_len(&self) -> usize {
        self.deleted_indices.len()
    }

    /// The Merkle root: zero for an empty tree.
    pub fn root_hash(&self) -> U256 {
        self.subtree_hash(self.root_index)
    }

    /// Insert a key. Duplicates create a second node, as in the transient
    /// variant.
    pub fn insert(&mut self, key: U256) {
        let root = self.root_index;
        self.root_index = self.insert_at(root, key);
    }

    /// Insert every key from an iterator; returns how many were inserted.
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
        let mut current = self.root_index;
        while current != NIL {
            let node = self.node(current);
            match key.cmp(&node.key) {
                Ordering::Less => current = node.left_index,
                Ordering::Greater => current = node.right_index,
                Ordering::Equal => return true,
            }
        }
        false
    }

    /// Remove one occurrence of `key`; its slot goes onto the free list.
    pub fn remove(&mut self, key: U256) -> bool {
        let root = self.root_index;
        let (new_root, removed) = self.remove_at(root, key);
        self.root_index = new_root;
        removed
    }

    /// Build a membership or non-membership proof for `key`.
    ///
    /// Identical output to
    /// [`CartesianMerkleTree::prove`](crate::CartesianMerkleTree::prove)
    /// for the same key sequence.
    pub fn prove(&self, key: U256) -> Proof {
        if self.root_index == NIL {
            return Proof {
                root: U256::ZERO,
                existence: false,
                key,
                non_existence_key: U256::ZERO,
                direction_bits: U256::ZERO,
                siblings: Vec::new(),
            };
        }

        let mut path: Vec<u64> = Vec::new();
        let mut current = self.root_index;
        let (existence, terminal) = loop {
            let node = self.node(current);
            match key.cmp(&node.key) {
                Ordering::Equal => break (true, current),
                Ordering::Less => {
                    if node.left_index != NIL {
                        path.push(current);
                        current = node.left_index;
                    } else {
                        break (false, current);
                    }
                }
                Ordering::Greater => {
                    if node.right_index != NIL {
                        path.push(current);
                        current = node.right_index;
                    } else {
                        break (false, current);
                    }
                }
            }
        };

        let terminal_node = self.node(terminal);
        let leaf_left = self.subtree_hash(terminal_node.left_index);
        let leaf_right = self.subtree_hash(terminal_node.right_index);

        let mut siblings = Vec::with_capacity(2 + 2 * path.len());
        siblings.push(leaf_left);
        siblings.push(leaf_right);
        let mut direction_bits = U256::ZERO;
        if leaf_left > leaf_right {
            direction_bits |= U256::from(1u8);
        }
        for &ancestor_index in path.iter().rev() {
            let ancestor = self.node(ancestor_index);
            let left_hash = self.subtree_hash(ancestor.left_index);
            let right_hash = self.subtree_hash(ancestor.right_index);
            let sibling_hash = if key < ancestor.key {
                right_hash
            } else {
                left_hash
            };
            siblings.push(ancestor.key);
            siblings.push(sibling_hash);
            direction_bits <<= 1;
            if left_hash > right_hash {
                direction_bits |= U256::from(1u8);
            }
        }

        Proof {
            root: self.root_hash(),
            existence,
            key,
            non_existence_key: if existence {
                U256::ZERO
            } else {
                terminal_node.key
            },
            direction_bits,
            siblings,
        }
    }

    fn node(&self, index: u64) -> &ArenaNode {
        self.nodes
            .get(&index)
            .expect("node index points at a live slot")
    }

    fn node_mut(&mut self, index: u64) -> &mut ArenaNode {
        self.nodes
            .get_mut(&index)
            .expect("node index points at a live slot")
    }

    fn subtree_hash(&self, index: u64) -> U256 {
        if index == NIL {
            U256::ZERO
        } else {
            self.node(index).merkle_hash
        }
    }

    fn refresh_hash(&mut self, index: u64) {
        let node = self.node(index);
        let (key, left, right) = (node.key, node.left_index, node.right_index);
        let hash = self
            .hasher
            .node_hash(key, self.subtree_hash(left), self.subtree_hash(right));
        self.node_mut(index).merkle_hash = hash;
    }

    /// Take a slot: pop the free list if possible, else advance the
    /// counter. The popped slot's stale link is cleared by removal from
    /// the `deleted_indices` map.
    fn alloc(&mut self, key: U256) -> u64 {
        let index = if self.deleted_indices_head != NIL {
            let index = self.deleted_indices_head;
            self.deleted_indices_head = self
                .deleted_indices
                .remove(&index)
                .expect("free-list slot holds its successor");
            index
        } else {
            let index = self.next_node_index;
            self.next_node_index += 1;
            index
        };
        let priority = self.hasher.priority(key);
        let merkle_hash = self.hasher.node_hash(key, U256::ZERO, U256::ZERO);
        self.nodes.insert(
            index,
            ArenaNode {
                key,
                priority,
                merkle_hash,
                left_index: NIL,
                right_index: NIL,
            },
        );
        index
    }

    /// Push a vacated slot onto the free-list stack.
    fn free(&mut self, index: u64) {
        self.nodes.remove(&index);
        self.deleted_indices.insert(index, self.deleted_indices_head);
        self.deleted_indices_head = index;
    }

    fn insert_at(&mut self, index: u64, key: U256) -> u64 {
        if index == NIL {
            return self.alloc(key);
        }
        let (node_key, node_priority) = {
            let node = self.node(index);
            (node.key, node.priority)
        };
        if key < node_key {
            let left = self.node(index).left_index;
            let new_left = self.insert_at(left, key);
            self.node_mut(index).left_index = new_left;
            if self.node(new_left).priority > node_priority {
                return self.rotate_right(index);
            }
            self.refresh_hash(index);
            index
        } else {
            let right = self.node(index).right_index;
            let new_right = self.insert_at(right, key);
            self.node_mut(index).right_index = new_right;
            if self.node(new_right).priority > node_priority {
                return self.rotate_left(index);
            }
            self.refresh_hash(index);
            index
        }
    }

    fn remove_at(&mut self, index: u64, key: U256) -> (u64, bool) {
        if index == NIL {
            return (NIL, false);
        }
        let node_key = self.node(index).key;
        match key.cmp(&node_key) {
            Ordering::Less => {
                let left = self.node(index).left_index;
                let (new_left, removed) = self.remove_at(left, key);
                self.node_mut(index).left_index = new_left;
                if removed {
                    self.refresh_hash(index);
                }
                (index, removed)
            }
            Ordering::Greater => {
                let right = self.node(index).right_index;
                let (new_right, removed) = self.remove_at(right, key);
                self.node_mut(index).right_index = new_right;
                if removed {
                    self.refresh_hash(index);
                }
                (index, removed)
            }
            Ordering::Equal => {
                let (left, right) = {
                    let node = self.node(index);
                    (node.left_index, node.right_index)
                };
                if left == NIL {
                    self.free(index);
                    return (right, true);
                }
                if right == NIL {
                    self.free(index);
                    return (left, true);
                }
                let left_priority = self.node(left).priority;
                let right_priority = self.node(right).priority;
                if left_priority > right_priority {
                    let risen = self.rotate_right(index);
                    let target = self.node(risen).right_index;
                    let (new_right, removed) = self.remove_at(target, key);
                    self.node_mut(risen).right_index = new_right;
                    self.refresh_hash(risen);
                    (risen, removed)
                } else {
                    let risen = self.rotate_left(index);
                    let target = self.node(risen).left_index;
                    let (new_left, removed) = self.remove_at(target, key);
                    self.node_mut(risen).left_index = new_left;
                    self.refresh_hash(risen);
                    (risen, removed)
                }
            }
        }
    }

    /// In-place index rewiring; refreshes the sinking slot first, then the
    /// rising one. Panics if the required child is absent.
    fn rotate_right(&mut self, index: u64) -> u64 {
        let left = self.node(index).left_index;
        assert!(left != NIL, "rotate_right requires a left child");
        let middle = self.node(left).right_index;
        self.node_mut(index).left_index = middle;
        self.refresh_hash(index);
        self.node_mut(left).right_index = index;
        self.refresh_hash(left);
        left
    }

    fn rotate_left(&mut self, index: u64) -> u64 {
        let right = self.node(index).right_index;
        assert!(right != NIL, "rotate_left requires a right child");
        let middle = self.node(right).left_index;
        self.node_mut(index).right_index = middle;
        self.refresh_hash(index);
        self.node_mut(right).left_index = index;
        self.refresh_hash(right);
        right
    }

    #[cfg(test)]
    pub(crate) fn assert_invariants(&self) {
        use std::collections::HashSet;

        fn walk<H: Hasher>(
            tree: &ArenaTree<H>,
            index: u64,
            lo: Option<U256>,
            hi: Option<U256>,
            seen: &mut HashSet<u64>,
        ) {
            let node = tree.node(index);
            assert!(seen.insert(index), "slot {index} reachable twice");
            if let Some(lo) = lo {
                assert!(node.key >= lo, "BST violated at slot {index}");
            }
            if let Some(hi) = hi {
                assert!(node.key < hi, "BST violated at slot {index}");
            }
            assert_eq!(node.priority, tree.hasher.priority(node.key));
            assert_eq!(
                node.merkle_hash,
                tree.hasher.node_hash(
                    node.key,
                    tree.subtree_hash(node.left_index),
                    tree.subtree_hash(node.right_index)
                ),
                "stale merkle hash at slot {index}"
            );
            if node.left_index != NIL {
                assert!(tree.node(node.left_index).priority <= node.priority);
                walk(tree, node.left_index, lo, Some(node.key), seen);
            }
            if node.right_index != NIL {
                assert!(tree.node(node.right_index).priority <= node.priority);
                walk(tree, node.right_index, Some(node.key), hi, seen);
            }
        }

        let mut seen = HashSet::new();
        if self.root_index != NIL {
            walk(self, self.root_index, None, None, &mut seen);
        }
        assert_eq!(seen.len(), self.nodes.len(), "unreachable live slots");

        // Free list is acyclic, disjoint from live slots, and fully linked.
        let mut free = HashSet::new();
        let mut cursor = self.deleted_indices_head;
        while cursor != NIL {
            assert!(free.insert(cursor), "free-list cycle at slot {cursor}");
            assert!(!self.nodes.contains_key(&cursor), "freed slot still live");
            cursor = *self
                .deleted_indices
                .get(&cursor)
                .expect("free-list slot holds its successor");
        }
        assert_eq!(free.len(), self.deleted_indices.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CartesianMerkleTree;

    fn keys(raw: &[u64]) -> Vec<U256> {
        raw.iter().copied().map(U256::from).collect()
    }

    #[test]
    fn test_empty_tree() {
        let tree: ArenaTree<Blake3Hasher> = ArenaTree::new();
        assert!(tree.is_empty());
        assert_eq!(tree.root_hash(), U256::ZERO);
        assert_eq!(tree.allocated_slots(), 0);
        let proof = tree.prove(U256::from(42u64));
        assert!(!proof.existence);
        assert!(proof.verify(tree.hasher(), U256::ZERO, U256::from(42u64)));
    }

    #[test]
    fn test_root_parity_with_boxed() {
        let sequence = keys(&[50, 30, 70, 20, 40, 60, 80, 35, 45]);
        let mut boxed: CartesianMerkleTree<Blake3Hasher> = CartesianMerkleTree::new();
        let mut arena: ArenaTree<Blake3Hasher> = ArenaTree::new();
        for &k in &sequence {
            boxed.insert(k);
            arena.insert(k);
            assert_eq!(boxed.root_hash(), arena.root_hash());
        }
        for &k in &sequence[3..6] {
            assert_eq!(boxed.remove(k), arena.remove(k));
            assert_eq!(boxed.root_hash(), arena.root_hash());
        }
        arena.assert_invariants();
    }

    #[test]
    fn test_proof_parity_with_boxed() {
        let sequence = keys(&[9, 4, 17, 2, 6, 12, 25]);
        let mut boxed: CartesianMerkleTree<Blake3Hasher> = CartesianMerkleTree::new();
        let mut arena: ArenaTree<Blake3Hasher> = ArenaTree::new();
        for &k in &sequence {
            boxed.insert(k);
            arena.insert(k);
        }
        for probe in keys(&[9, 2, 25, 5, 13, 100]) {
            let a = boxed.prove(probe);
            let b = arena.prove(probe);
            assert_eq!(a, b);
            assert_eq!(a.to_bytes(), b.to_bytes());
        }
    }

    #[test]
    fn test_slot_reuse_after_remove() {
        let mut tree: ArenaTree<Blake3Hasher> = ArenaTree::new();
        for k in keys(&[10, 20, 30]) {
            tree.insert(k);
        }
        assert_eq!(tree.allocated_slots(), 3);
        assert_eq!(tree.free_list_len(), 0);

        assert!(tree.remove(U256::from(20u64)));
        assert_eq!(tree.free_list_len(), 1);

        tree.insert(U256::from(40u64));
        // The vacated slot satisfied the allocation; the counter did not move.
        assert_eq!(tree.allocated_slots(), 3);
        assert_eq!(tree.free_list_len(), 0);
        tree.assert_invariants();
    }

    #[test]
    fn test_free_list_is_lifo() {
        let mut tree: ArenaTree<Blake3Hasher> = ArenaTree::new();
        for k in keys(&[1, 2, 3, 4, 5]) {
            tree.insert(k);
        }
        tree.remove(U256::from(2u64));
        tree.remove(U256::from(4u64));
        assert_eq!(tree.free_list_len(), 2);

        tree.insert(U256::from(6u64));
        tree.insert(U256::from(7u64));
        assert_eq!(tree.free_list_len(), 0);
        assert_eq!(tree.allocated_slots(), 5);
        tree.assert_invariants();
    }

    #[test]
    fn test_heavy_churn_keeps_table_dense() {
        let mut tree: ArenaTree<Blake3Hasher> = ArenaTree::new();
        for i in 0u64..64 {
            tree.insert(U256::from(i));
        }
        for i in 0u64..64 {
            if i % 2 == 0 {
                assert!(tree.remove(U256::from(i)));
            }
        }
        for i in 100u64..132 {
            tree.insert(U256::from(i));
        }
        // 32 removals then 32 inserts: every allocation came off the free list.
        assert_eq!(tree.allocated_slots(), 64);
        assert_eq!(tree.free_list_len(), 0);
        assert_eq!(tree.len(), 64);
        tree.assert_invariants();
    }

    #[test]
    fn test_duplicate_keys() {
        let mut tree: ArenaTree<Blake3Hasher> = ArenaTree::new();
        tree.insert(U256::from(5u64));
        let single_root = tree.root_hash();
        tree.insert(U256::from(5u64));
        assert_eq!(tree.len(), 2);
        assert_ne!(tree.root_hash(), single_root);
        assert!(tree.remove(U256::from(5u64)));
        assert_eq!(tree.root_hash(), single_root);
        tree.assert_invariants();
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let mut tree: ArenaTree<Blake3Hasher> = ArenaTree::new();
        tree.insert_batch(keys(&[50, 30, 70]));
        let root = tree.root_hash();
        assert!(!tree.remove(U256::from(99u64)));
        assert_eq!(tree.root_hash(), root);
        assert_eq!(tree.free_list_len(), 0);
    }
}
