#![no_main]

use libfuzzer_sys::fuzz_target;
use cmt::{ArenaTree, Blake3Hasher, CartesianMerkleTree, U256};

/// Fuzz arbitrary op sequences on both realizations.
/// Tests that no sequence panics and that roots and answers never diverge.
fuzz_target!(|data: &[u8]| {
    let mut boxed: CartesianMerkleTree<Blake3Hasher> = CartesianMerkleTree::new();
    let mut arena: ArenaTree<Blake3Hasher> = ArenaTree::new();

    // Interpret data as a sequence of (op, key) records. A single key byte
    // keeps the universe small enough for removes and duplicates to land.
    let mut i = 0;
    while i + 2 <= data.len() {
        let op = data[i];
        let key = U256::from(data[i + 1]);

        match op % 4 {
            0 | 3 => {
                boxed.insert(key);
                arena.insert(key);
            }
            1 => {
                assert_eq!(boxed.remove(key), arena.remove(key));
            }
            2 => {
                assert_eq!(boxed.search(key), arena.search(key));
            }
            _ => unreachable!(),
        }
        assert_eq!(boxed.root_hash(), arena.root_hash());

        i += 2;
    }

    // Proofs for a fixed probe must agree and verify at the end.
    let probe = U256::from(7u64);
    let proof = boxed.prove(probe);
    assert_eq!(proof, arena.prove(probe));
    assert!(proof.verify(boxed.hasher(), boxed.root_hash(), probe));
});
