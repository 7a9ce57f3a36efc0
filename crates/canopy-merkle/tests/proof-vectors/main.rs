//! Structural reference vectors and end-to-end consistency properties for
//! the accumulator's proof family.

use rand::{
    rngs::StdRng,
    Rng as _,
    SeedableRng as _,
};

mod roundtrip;
mod structure;

/// Returns `n` deterministic pseudo-random 32-byte elements.
fn elements(n: usize) -> Vec<[u8; 32]> {
    let mut rng = StdRng::seed_from_u64(0xff);
    (0..n).map(|_| rng.gen()).collect()
}

/// Returns `n` deterministic replacement elements distinct from the ones
/// produced by [`elements`].
fn replacements(n: usize) -> Vec<[u8; 32]> {
    let mut rng = StdRng::seed_from_u64(0xff00);
    (0..n).map(|_| rng.gen()).collect()
}
