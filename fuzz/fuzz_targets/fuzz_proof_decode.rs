#![no_main]

use libfuzzer_sys::fuzz_target;
use cmt::{Blake3Hasher, Proof, U256};

/// Fuzz the proof wire decoder.
/// Any input either fails to decode with a typed error or yields a proof
/// that re-encodes to the same bytes and verifies without panicking.
fuzz_target!(|data: &[u8]| {
    let Ok(proof) = Proof::from_bytes(data) else {
        return;
    };

    // Decoding is strict, so encoding must be its exact inverse.
    assert_eq!(proof.to_bytes(), data);

    // A decoded proof is structurally well-formed; verify must not panic
    // whatever the verdict.
    let _ = proof.verify(&Blake3Hasher, proof.root, proof.key);
    let _ = proof.verify(&Blake3Hasher, U256::ZERO, proof.key);
});
