//! Tree nodes and the two rotation transforms.
//!
//! A node owns its children exclusively through [`Link`]s; rotations move
//! ownership by local rewiring and can neither share a subtree nor form a
//! cycle.

use alloy_primitives::U256;

use crate::Hasher;

/// An owned, possibly absent child.
pub(crate) type Link = Option<Box<Node>>;

/// A single tree node.
///
/// Three invariants tie the fields together between public operations:
/// keys are BST-ordered (duplicates to the right), `priority` is max-heap
/// ordered toward the root, and `hash` commits to the subtree via
/// [`Hasher::node_hash`].
#[derive(Clone, Debug)]
pub(crate) struct Node {
    /// The stored key.
    pub(crate) key: U256,
    /// `H(key)`; determines the node's depth via the heap property.
    pub(crate) priority: U256,
    /// Merkle commitment of the subtree rooted here.
    pub(crate) hash: U256,
    /// Left child (keys `< key`).
    pub(crate) left: Link,
    /// Right child (keys `>= key`).
    pub(crate) right: Link,
}

impl Node {
    /// Create a childless node with its hash already computed.
    pub(crate) fn new<H: Hasher>(key: U256, hasher: &H) -> Self {
        let priority = hasher.priority(key);
        let hash = hasher.node_hash(key, U256::ZERO, U256::ZERO);
        Self {
            key,
            priority,
            hash,
            left: None,
            right: None,
        }
    }

    /// Hash of the left subtree, `U256::ZERO` when absent.
    pub(crate) fn left_hash(&self) -> U256 {
        self.left.as_ref().map_or(U256::ZERO, |child| child.hash)
    }

    /// Hash of the right subtree, `U256::ZERO` when absent.
    pub(crate) fn right_hash(&self) -> U256 {
        self.right.as_ref().map_or(U256::ZERO, |child| child.hash)
    }

    /// Recompute `self.hash` from the key and current children.
    pub(crate) fn refresh_hash<H: Hasher>(&mut self, hasher: &H) {
        self.hash = hasher.node_hash(self.key, self.left_hash(), self.right_hash());
    }
}

/// Rotate the subtree rooted at `node` to the right.
///
/// ```text
///     X              Y
///    / \            / \
///   Y   C   -->    A   X
///  / \                / \
/// A   B              B   C
/// ```
///
/// Refreshes the sinking node's hash first, then the rising node's.
/// Panics if `node` has no left child; callers only rotate toward an
/// existing child.
pub(crate) fn rotate_right<H: Hasher>(mut node: Box<Node>, hasher: &H) -> Box<Node> {
    let mut left = node
        .left
        .take()
        .expect("rotate_right requires a left child");
    node.left = left.right.take();
    node.refresh_hash(hasher);
    left.right = Some(node);
    left.refresh_hash(hasher);
    left
}

/// Rotate the subtree rooted at `node` to the left.
///
/// ```text
///   X                Y
///  / \              / \
/// A   Y    -->     X   C
///    / \          / \
///   B   C        A   B
/// ```
///
/// Mirror of [`rotate_right`]; panics if `node` has no right child.
pub(crate) fn rotate_left<H: Hasher>(mut node: Box<Node>, hasher: &H) -> Box<Node> {
    let mut right = node
        .right
        .take()
        .expect("rotate_left requires a right child");
    node.right = right.left.take();
    node.refresh_hash(hasher);
    right.left = Some(node);
    right.refresh_hash(hasher);
    right
}
