//! Assertions over proof *structure*: bit streams, compact words, depths and
//! decommitment identities that are fixed by the tree shape alone.

use canopy_merkle::{
    minimum_combined_proof_index,
    HashOrder,
    Tree,
};
use hex_literal::hex;

use super::elements;

struct MultiProofStreams {
    element_count: usize,
    indices: &'static [usize],
    flags: &'static [u8],
    skips: &'static [u8],
    orders: &'static [u8],
    decommitments: usize,
}

const MULTI_PROOF_STREAMS: &[MultiProofStreams] = &[
    MultiProofStreams {
        element_count: 12,
        indices: &[2, 3, 8, 11],
        flags: &[0, 0, 1, 1, 0, 0, 0, 1],
        skips: &[0, 0, 0, 0, 0, 1, 0, 0],
        orders: &[0, 1, 1, 1, 0, 1, 1, 1],
        decommitments: 4,
    },
    MultiProofStreams {
        element_count: 8,
        indices: &[1, 4, 5],
        flags: &[1, 0, 0, 0, 1],
        skips: &[0, 0, 0, 0, 0],
        orders: &[1, 0, 1, 1, 1],
        decommitments: 3,
    },
];

fn bits(bytes: &[u8]) -> Vec<bool> {
    bytes.iter().map(|bit| *bit == 1).collect()
}

#[test]
fn multi_proof_streams_match_known_vectors() {
    for case in MULTI_PROOF_STREAMS {
        let tree =
            Tree::from_elements(&elements(case.element_count), HashOrder::Ordered).unwrap();
        let proof = tree.construct_multi_proof(case.indices).unwrap();
        assert_eq!(bits(case.flags), proof.flags());
        assert_eq!(bits(case.skips), proof.skips());
        assert_eq!(Some(&bits(case.orders)[..]), proof.orders());
        assert_eq!(case.decommitments, proof.decommitments().len());
    }
}

#[test]
fn compact_words_match_known_vectors() {
    // the three element proof over an eight element tree packs into single
    // low bytes, with stop bits on flags and skips but not orders
    let tree = Tree::from_elements(&elements(8), HashOrder::Ordered).unwrap();
    let compact = tree
        .construct_multi_proof(&[1, 4, 5])
        .unwrap()
        .into_compact()
        .unwrap();

    assert_eq!(
        &hex!("0000000000000000000000000000000000000000000000000000000000000031"),
        compact.flags_word(),
    );
    assert_eq!(
        &hex!("0000000000000000000000000000000000000000000000000000000000000020"),
        compact.skips_word(),
    );
    assert_eq!(
        Some(&hex!(
            "000000000000000000000000000000000000000000000000000000000000001d"
        )),
        compact.orders_word(),
    );
}

#[test]
fn tree_depths_match_known_vectors() {
    for (element_count, depth) in [(8, 3), (1, 0), (9, 4)] {
        let tree = Tree::from_elements(&elements(element_count), HashOrder::Ordered).unwrap();
        assert_eq!(depth, tree.depth());
    }
}

#[test]
fn the_ninth_element_decommits_the_eight_element_root() {
    // in a nine element tree, the proof for element 8 carries exactly one
    // decommitment: the element root of the tree over the first eight
    let nine = Tree::from_elements(&elements(9), HashOrder::Ordered).unwrap();
    let eight = Tree::from_elements(&elements(9)[..8], HashOrder::Ordered).unwrap();
    let proof = nine.construct_proof(8).unwrap();
    assert_eq!(proof.decommitments(), &[eight.element_root().unwrap()]);
}

#[test]
fn minimum_combined_proof_indices_match_known_vectors() {
    for (element_count, minimum) in
        [(1, 0), (2, 0), (3, 2), (48, 32), (365, 364), (384, 256), (1792, 1536)]
    {
        assert_eq!(minimum, minimum_combined_proof_index(element_count));
    }
}

#[test]
fn append_decommitment_counts_follow_the_set_count_bits() {
    for element_count in [1_usize, 2, 3, 7, 8, 12, 48, 365] {
        let tree = Tree::from_elements(&elements(element_count), HashOrder::Ordered).unwrap();
        let proof = tree.construct_append_proof();
        assert_eq!(
            element_count.count_ones() as usize,
            proof.decommitments().len()
        );
    }
}
