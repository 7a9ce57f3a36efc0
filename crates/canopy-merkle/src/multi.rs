//! Proving that a set of elements is part of a tree.
//!
//! A multi-proof replaces per-element sibling paths with three per-step bit
//! streams driving a single streaming fold:
//!
//! + `flags`: the step hashes two previously computed values;
//! + `skips`: the step hashes nothing and promotes a value unchanged (the
//!   right sibling is absent in an unbalanced tree);
//! + `orders`: the computed value is the left operand of the pair (ordered
//!   hashing only).
//!
//! Steps are emitted walking the interior nodes bottom-up and right-to-left,
//! which is why verification consumes the proved leaf images rightmost-first
//! through a circular buffer: values are read and written strictly forward,
//! wrapping modulo the number of proved elements. The wrap-around is
//! load-bearing; the buffer must not be replaced by a stack.

use crate::{
    bind_count,
    hash_leaf,
    HashOrder,
    ProofError,
    Tree,
};

impl Tree {
    /// Constructs one proof of existence for the elements at `indices`.
    ///
    /// `indices` must be strictly ascending. The verifier must later supply
    /// the proved elements in the same order.
    ///
    /// # Errors
    ///
    /// Returns an error if `indices` is empty, not strictly ascending, or
    /// names an index outside the tree.
    pub fn construct_multi_proof(&self, indices: &[usize]) -> Result<MultiProof, ProofError> {
        let element_count = self.element_count();
        if indices.is_empty() {
            return Err(ProofError::no_elements());
        }
        for pair in indices.windows(2) {
            if pair[0] >= pair[1] {
                return Err(ProofError::unsorted_indices());
            }
        }
        if let Some(&last) = indices.last() {
            if last >= element_count {
                return Err(ProofError::index_outside_tree(last, element_count));
            }
        }

        let width = self.width();
        let mut known = vec![false; 2 * width];
        for &index in indices {
            known[width + index] = true;
        }

        let mut flags = Vec::new();
        let mut skips = Vec::new();
        let mut orders = Vec::new();
        let mut decommitments = Vec::new();
        for i in (1..width).rev() {
            let left_known = known[2 * i];
            let right_known = known[2 * i + 1];
            if !left_known && !right_known {
                continue;
            }
            if left_known != right_known {
                // the unknown sibling is a decommitment if it exists at all;
                // an absent right sibling turns the step into a skip instead
                let unknown = if left_known { 2 * i + 1 } else { 2 * i };
                if let Some(sibling) = self.node(unknown) {
                    decommitments.push(sibling);
                }
            }
            flags.push(left_known && right_known);
            skips.push(self.node(2 * i + 1).is_none());
            orders.push(left_known);
            known[i] = true;
        }

        let order = self.hash_order();
        Ok(MultiProof {
            flags,
            skips,
            orders: order.is_ordered().then_some(orders),
            decommitments,
            element_count,
            order,
        })
    }
}

/// The proof that a set of elements is committed to by a root.
///
/// Existence checks, updates and combined proofs all replay the same fold;
/// see the [module documentation](self) for the stream semantics. The boolean
/// representation has no step limit; converting to a
/// [`CompactMultiProof`](crate::CompactMultiProof) caps the step count at 255.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MultiProof {
    flags: Vec<bool>,
    skips: Vec<bool>,
    orders: Option<Vec<bool>>,
    pub(crate) decommitments: Vec<[u8; 32]>,
    element_count: usize,
    order: HashOrder,
}

/// One executed step of the fold, recorded for the combined proof engine.
pub(crate) struct FoldStep {
    /// The value this step wrote into the replacement buffer.
    pub(crate) new_hash: [u8; 32],
    /// The decommitment this step consumed, if any.
    pub(crate) decommitment: Option<[u8; 32]>,
}

/// The outcome of running the fold over a proof's streams.
pub(crate) struct Fold {
    pub(crate) root: [u8; 32],
    pub(crate) new_root: Option<[u8; 32]>,
    /// Per-step trace; only populated when a replacement buffer runs.
    pub(crate) steps: Vec<FoldStep>,
}

impl MultiProof {
    pub(crate) fn from_parts(
        flags: Vec<bool>,
        skips: Vec<bool>,
        orders: Option<Vec<bool>>,
        decommitments: Vec<[u8; 32]>,
        element_count: usize,
        order: HashOrder,
    ) -> Self {
        Self {
            flags,
            skips,
            orders,
            decommitments,
            element_count,
            order,
        }
    }

    #[must_use]
    #[inline]
    pub fn flags(&self) -> &[bool] {
        &self.flags
    }

    #[must_use]
    #[inline]
    pub fn skips(&self) -> &[bool] {
        &self.skips
    }

    /// Returns the `orders` stream, or `None` for a sorted-hash proof.
    #[must_use]
    #[inline]
    pub fn orders(&self) -> Option<&[bool]> {
        self.orders.as_deref()
    }

    #[must_use]
    #[inline]
    pub fn decommitments(&self) -> &[[u8; 32]] {
        &self.decommitments
    }

    /// Returns the element count of the tree this proof was derived from.
    #[must_use]
    #[inline]
    pub fn element_count(&self) -> usize {
        self.element_count
    }

    /// Returns the number of fold steps.
    #[must_use]
    #[inline]
    pub fn hash_count(&self) -> usize {
        self.flags.len()
    }

    #[must_use]
    #[inline]
    pub fn hash_order(&self) -> HashOrder {
        self.order
    }

    /// Checks that `elements`, in ascending index order, are committed to by
    /// `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if an element is not exactly 32 bytes, if the proof
    /// streams are inconsistent with each other or with the number of
    /// supplied elements, or if the derived root differs from `root`.
    pub fn verify(
        &self,
        elements: &[impl AsRef<[u8]>],
        root: [u8; 32],
    ) -> Result<(), ProofError> {
        let images = images_of(elements)?;
        let fold = self.fold(&images, None)?;
        if bind_count(self.element_count as u64, &fold.root) != root {
            return Err(ProofError::root_mismatch());
        }
        Ok(())
    }

    /// Checks that `elements` are committed to by `root`, and derives the
    /// root of the tree in which they are replaced by `replacements`,
    /// pairwise.
    ///
    /// Both folds run in lockstep over one pass, consuming each decommitment
    /// once: an unchanged sibling is the same in the old and the new tree.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`MultiProof::verify`], plus a count
    /// mismatch if `replacements` and `elements` differ in length.
    pub fn apply_update(
        &self,
        elements: &[impl AsRef<[u8]>],
        replacements: &[impl AsRef<[u8]>],
        root: [u8; 32],
    ) -> Result<[u8; 32], ProofError> {
        if elements.len() != replacements.len() {
            return Err(ProofError::element_count_mismatch(
                elements.len(),
                replacements.len(),
            ));
        }
        let images = images_of(elements)?;
        let new_images = images_of(replacements)?;
        let fold = self.fold(&images, Some(&new_images))?;
        let element_count = self.element_count as u64;
        if bind_count(element_count, &fold.root) != root {
            return Err(ProofError::root_mismatch());
        }
        let new_root = fold
            .new_root
            .expect("the fold returns a new root whenever replacement images are supplied");
        Ok(bind_count(element_count, &new_root))
    }

    /// Runs the circular-buffer fold over the proof's streams.
    ///
    /// `images` are the proved leaf images in ascending index order; they are
    /// consumed rightmost-first. When `new_images` is supplied, a second
    /// buffer runs in lockstep and a per-step trace is recorded.
    pub(crate) fn fold(
        &self,
        images: &[[u8; 32]],
        new_images: Option<&[[u8; 32]]>,
    ) -> Result<Fold, ProofError> {
        self.check_shape(images.len())?;

        let m = images.len();
        let mut hashes: Vec<[u8; 32]> = images.iter().rev().copied().collect();
        let mut new_hashes: Option<Vec<[u8; 32]>> =
            new_images.map(|new_images| new_images.iter().rev().copied().collect());
        let mut steps = Vec::new();

        let mut read = 0;
        let mut write = 0;
        let mut decommitment_index = 0;
        for s in 0..self.hash_count() {
            let consumed = if self.skips[s] {
                hashes[write] = hashes[read];
                if let Some(new_hashes) = new_hashes.as_mut() {
                    new_hashes[write] = new_hashes[read];
                }
                read = (read + 1) % m;
                None
            } else if self.flags[s] {
                let first = read;
                let second = (read + 1) % m;
                read = (read + 2) % m;
                // the first value popped is the right operand unless the
                // order bit says otherwise
                let (left, right) = if self.order_bit(s) {
                    (second, first)
                } else {
                    (first, second)
                };
                let combined = self.order.combine(&hashes[left], &hashes[right]);
                hashes[write] = combined;
                if let Some(new_hashes) = new_hashes.as_mut() {
                    let combined = self.order.combine(&new_hashes[left], &new_hashes[right]);
                    new_hashes[write] = combined;
                }
                None
            } else {
                let decommitment = self.decommitments[decommitment_index];
                decommitment_index += 1;
                let computed = read;
                read = (read + 1) % m;
                let combined = self.pair(s, &hashes[computed], &decommitment);
                hashes[write] = combined;
                if let Some(new_hashes) = new_hashes.as_mut() {
                    let combined = self.pair(s, &new_hashes[computed], &decommitment);
                    new_hashes[write] = combined;
                }
                Some(decommitment)
            };
            if let Some(new_hashes) = new_hashes.as_ref() {
                steps.push(FoldStep {
                    new_hash: new_hashes[write],
                    decommitment: consumed,
                });
            }
            write = (write + 1) % m;
        }

        let root_slot = if write == 0 { m - 1 } else { write - 1 };
        Ok(Fold {
            root: hashes[root_slot],
            new_root: new_hashes.map(|new_hashes| new_hashes[root_slot]),
            steps,
        })
    }

    /// Validates the stream lengths, the element count implied by the flag
    /// bits, and the decommitment count implied by the flag and skip bits.
    pub(crate) fn check_shape(&self, supplied_elements: usize) -> Result<(), ProofError> {
        let hash_count = self.hash_count();
        let skips = self.skips.len();
        let orders = self.orders.as_ref().map_or(hash_count, Vec::len);
        if skips != hash_count || orders != hash_count {
            return Err(ProofError::stream_length_mismatch(hash_count, skips, orders));
        }

        let expected_elements = self.flags.iter().filter(|flag| **flag).count() + 1;
        if supplied_elements == 0 {
            return Err(ProofError::no_elements());
        }
        if supplied_elements != expected_elements {
            return Err(ProofError::wrong_element_count(
                expected_elements,
                supplied_elements,
            ));
        }

        let required_decommitments = self
            .flags
            .iter()
            .zip(&self.skips)
            .filter(|(flag, skip)| !**flag && !**skip)
            .count();
        if required_decommitments != self.decommitments.len() {
            return Err(ProofError::decommitment_count_mismatch(
                required_decommitments,
                self.decommitments.len(),
            ));
        }
        Ok(())
    }

    /// Returns the order bit of step `s`; a sorted-hash proof reads as all
    /// ones since operand order is irrelevant there.
    fn order_bit(&self, s: usize) -> bool {
        self.orders.as_ref().map_or(true, |orders| orders[s])
    }

    fn pair(&self, s: usize, computed: &[u8; 32], decommitment: &[u8; 32]) -> [u8; 32] {
        if self.order_bit(s) {
            self.order.combine(computed, decommitment)
        } else {
            self.order.combine(decommitment, computed)
        }
    }
}

/// Hashes proof-input elements into leaf images, validating their length.
pub(crate) fn images_of(elements: &[impl AsRef<[u8]>]) -> Result<Vec<[u8; 32]>, ProofError> {
    elements
        .iter()
        .map(|element| {
            let element = element.as_ref();
            if element.len() != 32 {
                return Err(ProofError::element_length(element.len()));
            }
            Ok(hash_leaf(element))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::test_elements;

    fn proved(elements: &[[u8; 32]], indices: &[usize]) -> Vec<[u8; 32]> {
        indices.iter().map(|&i| elements[i]).collect()
    }

    #[test]
    fn unbalanced_twelve_element_proof_has_the_expected_streams() {
        let elements = test_elements(12);
        let tree = Tree::from_elements(&elements, HashOrder::Ordered).unwrap();
        let proof = tree.construct_multi_proof(&[2, 3, 8, 11]).unwrap();
        let f = false;
        let t = true;
        assert_eq!(proof.flags(), &[f, f, t, t, f, f, f, t]);
        assert_eq!(proof.skips(), &[f, f, f, f, f, t, f, f]);
        assert_eq!(proof.orders(), Some(&[f, t, t, t, f, t, t, t][..]));
        assert_eq!(4, proof.decommitments().len());
        proof
            .verify(&proved(&elements, &[2, 3, 8, 11]), tree.root())
            .unwrap();
    }

    #[test]
    fn proofs_verify_across_counts_and_index_sets() {
        for order in [HashOrder::Ordered, HashOrder::Sorted] {
            for n in 1..=16 {
                let elements = test_elements(n);
                let tree = Tree::from_elements(&elements, order).unwrap();
                let root = tree.root();
                let full: Vec<usize> = (0..n).collect();
                let evens: Vec<usize> = (0..n).step_by(2).collect();
                let ends = if n == 1 { vec![0] } else { vec![0, n - 1] };
                for indices in [full, evens, ends] {
                    let proof = tree.construct_multi_proof(&indices).unwrap();
                    proof.verify(&proved(&elements, &indices), root).unwrap();
                }
                for i in 0..n {
                    let proof = tree.construct_multi_proof(&[i]).unwrap();
                    proof.verify(&proved(&elements, &[i]), root).unwrap();
                }
            }
        }
    }

    #[test]
    fn generation_rejects_bad_index_sets() {
        let tree = Tree::from_elements(&test_elements(8), HashOrder::Ordered).unwrap();
        assert!(tree.construct_multi_proof(&[]).is_err());
        assert!(tree.construct_multi_proof(&[3, 3]).is_err());
        assert!(tree.construct_multi_proof(&[5, 2]).is_err());
        assert!(tree.construct_multi_proof(&[0, 8]).is_err());
    }

    #[test]
    fn verification_rejects_wrong_inputs() {
        let elements = test_elements(10);
        let tree = Tree::from_elements(&elements, HashOrder::Ordered).unwrap();
        let root = tree.root();
        let proof = tree.construct_multi_proof(&[1, 4, 7]).unwrap();

        // wrong number of elements for the proof shape
        assert!(proof.verify(&proved(&elements, &[1, 4]), root).is_err());
        // elements in the wrong order derive the wrong root
        assert!(proof.verify(&proved(&elements, &[4, 1, 7]), root).is_err());
        // wrong root
        assert!(proof.verify(&proved(&elements, &[1, 4, 7]), [9; 32]).is_err());
    }

    #[test]
    fn tampered_streams_are_rejected() {
        let elements = test_elements(10);
        let tree = Tree::from_elements(&elements, HashOrder::Ordered).unwrap();
        let root = tree.root();
        let elements = proved(&elements, &[1, 4, 7]);

        let mut proof = tree.construct_multi_proof(&[1, 4, 7]).unwrap();
        proof.decommitments.pop();
        assert!(proof.verify(&elements, root).is_err());

        let mut proof = tree.construct_multi_proof(&[1, 4, 7]).unwrap();
        proof.skips.pop();
        assert!(proof.verify(&elements, root).is_err());

        let mut proof = tree.construct_multi_proof(&[1, 4, 7]).unwrap();
        if let Some(orders) = proof.orders.as_mut() {
            orders[0] = !orders[0];
        }
        assert!(proof.verify(&elements, root).is_err());
    }

    #[test]
    fn sorted_proofs_carry_no_orders_stream() {
        let elements = test_elements(9);
        let tree = Tree::from_elements(&elements, HashOrder::Sorted).unwrap();
        let proof = tree.construct_multi_proof(&[0, 5, 8]).unwrap();
        assert!(proof.orders().is_none());
        proof
            .verify(&proved(&elements, &[0, 5, 8]), tree.root())
            .unwrap();
    }

    #[test]
    fn update_derives_the_replaced_tree_root() {
        for order in [HashOrder::Ordered, HashOrder::Sorted] {
            for n in [3, 7, 9, 12, 16] {
                let elements = test_elements(n);
                let tree = Tree::from_elements(&elements, order).unwrap();
                let indices = [0, n / 2, n - 1];
                let replacements: Vec<[u8; 32]> = (0..3).map(|i| [0xc0 + i as u8; 32]).collect();
                let proof = tree.construct_multi_proof(&indices).unwrap();
                let new_root = proof
                    .apply_update(&proved(&elements, &indices), &replacements, tree.root())
                    .unwrap();
                let oracle = tree.updated(&indices, &replacements).unwrap();
                assert_eq!(oracle.root(), new_root);
            }
        }
    }

    #[test]
    fn update_rejects_mismatched_replacement_count() {
        let elements = test_elements(6);
        let tree = Tree::from_elements(&elements, HashOrder::Ordered).unwrap();
        let proof = tree.construct_multi_proof(&[1, 3]).unwrap();
        let result = proof.apply_update(
            &proved(&elements, &[1, 3]),
            &[[0xaa_u8; 32]],
            tree.root(),
        );
        assert!(result.is_err());
    }
}
