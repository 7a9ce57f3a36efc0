//! End-to-end consistency: every proof generated from a tree verifies
//! against that tree's root, and every state transition a proof derives
//! agrees with a tree rebuilt from scratch.

use canopy_merkle::{
    minimum_combined_proof_index,
    HashOrder,
    Tree,
};
use rand::{
    rngs::StdRng,
    SeedableRng as _,
};

use super::{
    elements,
    replacements,
};

const ORDERS: [HashOrder; 2] = [HashOrder::Ordered, HashOrder::Sorted];

fn proved(elements: &[[u8; 32]], indices: &[usize]) -> Vec<[u8; 32]> {
    indices.iter().map(|&i| elements[i]).collect()
}

/// Draws up to `k` distinct ascending indices below `n`.
fn sample_indices(rng: &mut StdRng, n: usize, k: usize) -> Vec<usize> {
    let mut indices = rand::seq::index::sample(rng, n, k.min(n)).into_vec();
    indices.sort_unstable();
    indices
}

#[test]
fn single_proofs_round_trip_for_every_index() {
    for order in ORDERS {
        for n in 1..=32 {
            let elements = elements(n);
            let tree = Tree::from_elements(&elements, order).unwrap();
            let root = tree.root();
            for i in 0..n {
                let proof = tree.construct_proof(i).unwrap();
                proof.verify(&elements[i], root).unwrap();
            }
        }
    }
}

#[test]
fn multi_proofs_round_trip_over_sampled_index_sets() {
    let mut rng = StdRng::seed_from_u64(1);
    for order in ORDERS {
        for n in [1, 2, 3, 9, 27, 64, 100, 365] {
            let elements = elements(n);
            let tree = Tree::from_elements(&elements, order).unwrap();
            let root = tree.root();
            for k in [1, 2, n / 2 + 1, n] {
                let indices = sample_indices(&mut rng, n, k);
                let proof = tree.construct_multi_proof(&indices).unwrap();
                proof.verify(&proved(&elements, &indices), root).unwrap();
            }
        }
    }
}

#[test]
fn multi_proof_updates_agree_with_rebuilt_trees() {
    let mut rng = StdRng::seed_from_u64(2);
    for order in ORDERS {
        for n in [1, 5, 12, 100, 365] {
            let elements = elements(n);
            let tree = Tree::from_elements(&elements, order).unwrap();
            let root = tree.root();
            let indices = sample_indices(&mut rng, n, (n / 3).max(1));
            let replacements = replacements(indices.len());
            let proof = tree.construct_multi_proof(&indices).unwrap();
            let new_root = proof
                .apply_update(&proved(&elements, &indices), &replacements, root)
                .unwrap();
            let oracle = tree.updated(&indices, &replacements).unwrap();
            assert_eq!(oracle.root(), new_root);
        }
    }
}

#[test]
fn append_proofs_agree_with_rebuilt_trees() {
    for order in ORDERS {
        for n in [0, 1, 2, 3, 8, 15, 64, 100, 365] {
            let elements = elements(n);
            let tree = Tree::from_elements(&elements, order).unwrap();
            let root = tree.root();
            let proof = tree.construct_append_proof();
            proof.verify(root).unwrap();

            let single = replacements(1)[0];
            let oracle = tree.appended(&[single]).unwrap();
            assert_eq!(
                oracle.root(),
                proof.apply_single_append(single, root).unwrap()
            );

            for a in [1, 2, 7, 40] {
                let appended = replacements(a);
                let oracle = tree.appended(&appended).unwrap();
                assert_eq!(oracle.root(), proof.apply_append(&appended, root).unwrap());
            }
        }
    }
}

#[test]
fn combined_proofs_agree_with_rebuilt_trees() {
    let mut rng = StdRng::seed_from_u64(3);
    for order in ORDERS {
        for n in [1, 3, 48, 100, 365, 384] {
            let elements = elements(n);
            let tree = Tree::from_elements(&elements, order).unwrap();
            let root = tree.root();
            let minimum = minimum_combined_proof_index(n);
            let eligible = n - minimum;
            let offsets = sample_indices(&mut rng, eligible, (eligible / 2).max(1));
            let indices: Vec<usize> = offsets.into_iter().map(|o| minimum + o).collect();
            let replacements = replacements(indices.len());
            let proof = tree.construct_combined_proof(&indices).unwrap();
            for a in [1, 5, 33] {
                let appended = elements_from_seed(n as u64, a);
                let new_root = proof
                    .apply_update_and_append(
                        &proved(&elements, &indices),
                        &replacements,
                        &appended,
                        root,
                    )
                    .unwrap();
                let oracle = tree
                    .updated(&indices, &replacements)
                    .unwrap()
                    .appended(&appended)
                    .unwrap();
                assert_eq!(oracle.root(), new_root);
            }
        }
    }
}

#[test]
fn size_proofs_round_trip() {
    for order in ORDERS {
        for n in [0, 1, 2, 11, 48, 365] {
            let tree = Tree::from_elements(&elements(n), order).unwrap();
            let root = tree.root();
            tree.construct_size_proof().verify(root).unwrap();
            if n > 0 {
                tree.construct_simple_size_proof()
                    .unwrap()
                    .verify(root)
                    .unwrap();
            }
        }
    }
}

#[test]
fn inferred_indices_invert_generation() {
    let mut rng = StdRng::seed_from_u64(4);
    for n in [1, 2, 9, 50, 365] {
        let tree = Tree::from_elements(&elements(n), HashOrder::Ordered).unwrap();
        for k in [1, 2, (n / 2).max(1), n] {
            let indices = sample_indices(&mut rng, n, k);
            let proof = tree.construct_multi_proof(&indices).unwrap();
            assert_eq!(indices, proof.infer_indices().unwrap());
        }
    }
}

#[test]
fn compact_and_boolean_proofs_agree() {
    let mut rng = StdRng::seed_from_u64(5);
    for order in ORDERS {
        for n in [1, 7, 29, 64] {
            let elements = elements(n);
            let tree = Tree::from_elements(&elements, order).unwrap();
            let root = tree.root();
            let indices = sample_indices(&mut rng, n, (n / 2).max(1));
            let proved = proved(&elements, &indices);
            let replacements = replacements(indices.len());

            let proof = tree.construct_multi_proof(&indices).unwrap();
            let compact = proof.clone().into_compact().unwrap();
            assert_eq!(proof, compact.expand().unwrap());

            proof.verify(&proved, root).unwrap();
            compact.verify(&proved, root).unwrap();
            assert_eq!(
                proof.apply_update(&proved, &replacements, root).unwrap(),
                compact.apply_update(&proved, &replacements, root).unwrap(),
            );

            let decoded = canopy_merkle::CompactMultiProof::from_bytes(
                &compact.to_bytes(),
                order,
            )
            .unwrap();
            assert_eq!(compact, decoded);
        }
    }
}

/// Returns `count` deterministic elements from an arbitrary seed, for append
/// payloads that must differ from the committed ones.
fn elements_from_seed(seed: u64, count: usize) -> Vec<[u8; 32]> {
    use rand::Rng as _;
    let mut rng = StdRng::seed_from_u64(seed.wrapping_mul(0x9e37_79b9_7f4a_7c15));
    (0..count).map(|_| rng.gen()).collect()
}
