//! Proving an update and an append in one pass.
//!
//! A combined proof authorizes replacing committed elements *and* appending
//! new ones against a single root. It is an unmodified multi-proof over the
//! update indices: provided the smallest updated index does not fall below
//! [`minimum_combined_proof_index`], the frontier siblings the append fold
//! needs are exactly the decommitments the update fold consumes on its way
//! up the right spine, plus the freshly updated frontier subtree root the
//! fold computes anyway. Nothing extra ships.
//!
//! The minimum exists because indices below it sit inside the filled part of
//! the tree, whose proof paths cross sibling subtrees the append frontier
//! never touches; serving them would require decommitments present in
//! neither proof.

use crate::{
    append::fold_append,
    bind_count,
    leaf_slot_count,
    multi::images_of,
    HashOrder,
    MultiProof,
    ProofError,
    Tree,
    MAX_ELEMENT_COUNT,
};

/// Returns the smallest index updatable by a combined proof for a tree of
/// `element_count` elements: the count with its lowest set bit cleared.
///
/// Elements at or above this index live in the rightmost frontier subtree;
/// their proof paths and the append frontier coincide.
///
/// # Examples
/// ```
/// use canopy_merkle::minimum_combined_proof_index;
/// assert_eq!(0, minimum_combined_proof_index(2));
/// assert_eq!(2, minimum_combined_proof_index(3));
/// assert_eq!(32, minimum_combined_proof_index(48));
/// assert_eq!(1536, minimum_combined_proof_index(1792));
/// ```
#[must_use]
pub fn minimum_combined_proof_index(element_count: usize) -> usize {
    element_count & element_count.wrapping_sub(1)
}

impl Tree {
    /// Constructs one proof for updating the elements at `indices` and
    /// appending arbitrarily many new elements.
    ///
    /// `indices` must be strictly ascending and start at or above
    /// [`minimum_combined_proof_index`]. The appended elements are chosen at
    /// application time; see [`CombinedProof::apply_update_and_append`].
    ///
    /// # Errors
    ///
    /// Returns the generation errors of [`Tree::construct_multi_proof`],
    /// plus a minimum index violation.
    pub fn construct_combined_proof(
        &self,
        indices: &[usize],
    ) -> Result<CombinedProof, ProofError> {
        let multi = self.construct_multi_proof(indices)?;
        let minimum = minimum_combined_proof_index(self.element_count());
        let first = indices[0];
        if first < minimum {
            return Err(ProofError::minimum_index_violation(first, minimum));
        }
        Ok(CombinedProof {
            multi,
        })
    }
}

/// The proof that a set of elements can be replaced and new elements appended
/// against one root.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CombinedProof {
    multi: MultiProof,
}

impl CombinedProof {
    /// Returns the underlying update multi-proof.
    #[must_use]
    #[inline]
    pub fn multi_proof(&self) -> &MultiProof {
        &self.multi
    }

    #[must_use]
    #[inline]
    pub fn element_count(&self) -> usize {
        self.multi.element_count()
    }

    #[must_use]
    #[inline]
    pub fn hash_order(&self) -> HashOrder {
        self.multi.hash_order()
    }

    /// Checks that `elements`, in ascending index order, are committed to by
    /// `root`.
    ///
    /// # Errors
    ///
    /// Returns the verification errors of [`MultiProof::verify`].
    pub fn verify(
        &self,
        elements: &[impl AsRef<[u8]>],
        root: [u8; 32],
    ) -> Result<(), ProofError> {
        self.multi.verify(elements, root)
    }

    /// Checks that `elements` are committed to by `root` and derives the root
    /// of the tree in which they are replaced by `replacements`, pairwise,
    /// and `appended` is appended after the committed sequence.
    ///
    /// The update fold runs once, with a step trace; the trace yields the
    /// updated frontier subtree root and the untouched frontier siblings,
    /// and the append fold finishes from there.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`MultiProof::apply_update`], plus capacity
    /// errors for the appended elements and a frontier mismatch if the proof
    /// does not isolate the append frontier.
    pub fn apply_update_and_append(
        &self,
        elements: &[impl AsRef<[u8]>],
        replacements: &[impl AsRef<[u8]>],
        appended: &[impl AsRef<[u8]>],
        root: [u8; 32],
    ) -> Result<[u8; 32], ProofError> {
        let element_count = self.multi.element_count();
        if element_count == 0 {
            return Err(ProofError::no_elements());
        }
        if elements.len() != replacements.len() {
            return Err(ProofError::element_count_mismatch(
                elements.len(),
                replacements.len(),
            ));
        }
        if appended.is_empty() {
            return Err(ProofError::no_elements());
        }
        let new_count = element_count as u64 + appended.len() as u64;
        if new_count > MAX_ELEMENT_COUNT {
            return Err(ProofError::element_count_exceeds_capacity(new_count));
        }
        let images = images_of(elements)?;
        let new_images = images_of(replacements)?;
        let appended_images = images_of(appended)?;

        // the frontier subtree holds the elements from the minimum index up;
        // everything above it is the spine, one step per level
        let frontier_level = element_count.trailing_zeros();
        let depth = leaf_slot_count(element_count).trailing_zeros();
        let spine_len = (depth - frontier_level) as usize;
        let hash_count = self.multi.hash_count();
        let Some(subtree_steps) = hash_count.checked_sub(spine_len) else {
            return Err(ProofError::frontier_mismatch());
        };

        let fold = self.multi.fold(&images, Some(&new_images))?;
        if bind_count(element_count as u64, &fold.root) != root {
            return Err(ProofError::root_mismatch());
        }

        // walk the spine steps bottom-up: a level whose bit is set in the
        // minimum index merges with an untouched frontier sibling, any other
        // level promotes past an absent right sibling
        let minimum = minimum_combined_proof_index(element_count);
        let mut frontier = Vec::with_capacity(element_count.count_ones() as usize);
        for (offset, level) in (frontier_level..depth).enumerate() {
            let step_index = subtree_steps + offset;
            let merges = minimum & (1 << level) != 0;
            if self.multi.flags()[step_index] || self.multi.skips()[step_index] == merges {
                return Err(ProofError::frontier_mismatch());
            }
            if merges {
                let decommitment = fold.steps[step_index]
                    .decommitment
                    .expect("steps that neither flag nor skip always consume a decommitment");
                frontier.push(decommitment);
            }
        }
        frontier.reverse();
        let updated_subtree_root = if subtree_steps == 0 {
            // the frontier subtree is the single leaf below the count
            *new_images
                .last()
                .expect("the fold rejects proofs over zero elements")
        } else {
            fold.steps[subtree_steps - 1].new_hash
        };
        frontier.push(updated_subtree_root);

        let interior = fold_append(
            element_count,
            &frontier,
            appended_images,
            self.multi.hash_order(),
        );
        Ok(bind_count(new_count, &interior))
    }
}
