//! Proving that a single element is part of a tree.

use std::num::NonZeroUsize;

use crate::{
    bind_count,
    combine,
    combine_sorted,
    hash_leaf,
    leaf_slot_count,
    HashOrder,
    ProofError,
    Tree,
};

impl Tree {
    /// Constructs the inclusion proof for element `leaf_index`.
    ///
    /// Returns `None` if `leaf_index` is outside the tree.
    ///
    /// # Examples
    /// ```
    /// use canopy_merkle::{
    ///     HashOrder,
    ///     Tree,
    /// };
    /// let elements: Vec<[u8; 32]> = (0u8..9).map(|i| [i; 32]).collect();
    /// let tree = Tree::from_elements(&elements, HashOrder::Ordered).unwrap();
    /// let proof = tree.construct_proof(8).expect("element 8 is inside the tree");
    /// assert!(proof.verify(&elements[8], tree.root()).is_ok());
    /// assert!(tree.construct_proof(9).is_none());
    /// ```
    #[must_use]
    pub fn construct_proof(&self, leaf_index: usize) -> Option<InclusionProof> {
        let element_count = NonZeroUsize::new(self.element_count())?;
        if leaf_index >= element_count.get() {
            return None;
        }
        let mut decommitments = Vec::new();
        let mut i = self.width() + leaf_index;
        while i > 1 {
            // an even node's right sibling can be absent in an unbalanced
            // tree; the node is then promoted and the level leaves no trace
            // in the proof
            if let Some(sibling) = self.node(i ^ 1) {
                decommitments.push(sibling);
            }
            i >>= 1;
        }
        decommitments.reverse();
        Some(InclusionProof {
            decommitments,
            leaf_index,
            element_count,
            order: self.hash_order(),
        })
    }
}

/// The proof that one element is committed to by a root.
///
/// Decommitments are stored top-down: the sibling closest to the root comes
/// first. Verification walks them back-to-front, pairing the growing hash
/// with each sibling and skipping the levels where an unbalanced tree has no
/// right sibling to pair with.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InclusionProof {
    decommitments: Vec<[u8; 32]>,
    leaf_index: usize,
    element_count: NonZeroUsize,
    order: HashOrder,
}

impl InclusionProof {
    /// Returns the sibling hashes of the proof, top-down.
    #[must_use]
    #[inline]
    pub fn decommitments(&self) -> &[[u8; 32]] {
        &self.decommitments
    }

    #[must_use]
    #[inline]
    pub fn leaf_index(&self) -> usize {
        self.leaf_index
    }

    /// Returns the element count of the tree this proof was derived from.
    #[must_use]
    #[inline]
    pub fn element_count(&self) -> NonZeroUsize {
        self.element_count
    }

    #[must_use]
    #[inline]
    pub fn hash_order(&self) -> HashOrder {
        self.order
    }

    /// Checks that `element` is committed to by `root` at this proof's index.
    ///
    /// # Errors
    ///
    /// Returns an error if `element` is not exactly 32 bytes, if the
    /// decommitment count does not match the path shape implied by the
    /// element count, or if the derived root differs from `root`.
    pub fn verify(&self, element: impl AsRef<[u8]>, root: [u8; 32]) -> Result<(), ProofError> {
        let image = leaf_image_of(element.as_ref())?;
        let (derived, _) = self.reconstruct(image, None)?;
        if bind_count(self.element_count.get() as u64, &derived) != root {
            return Err(ProofError::root_mismatch());
        }
        Ok(())
    }

    /// Checks that `element` is committed to by `root` at this proof's index,
    /// and derives the root of the tree in which it is replaced by
    /// `replacement`.
    ///
    /// Both folds share the proof's decommitments, so the old-root check and
    /// the new-root computation cost a single pass.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`InclusionProof::verify`], plus an element
    /// length error for `replacement`.
    pub fn apply_update(
        &self,
        element: impl AsRef<[u8]>,
        replacement: impl AsRef<[u8]>,
        root: [u8; 32],
    ) -> Result<[u8; 32], ProofError> {
        let image = leaf_image_of(element.as_ref())?;
        let new_image = leaf_image_of(replacement.as_ref())?;
        let (derived, new_derived) = self.reconstruct(image, Some(new_image))?;
        let element_count = self.element_count.get() as u64;
        if bind_count(element_count, &derived) != root {
            return Err(ProofError::root_mismatch());
        }
        let new_derived =
            new_derived.expect("the fold returns a new root whenever a new image is supplied");
        Ok(bind_count(element_count, &new_derived))
    }

    /// Folds the leaf image (and optionally a replacement image) up to the
    /// interior root.
    ///
    /// The path shape is derived from the element count: at each level the
    /// occupied slot count is halved rounding up, and a sibling exists iff
    /// its slot is below that count.
    fn reconstruct(
        &self,
        mut hash: [u8; 32],
        mut new_hash: Option<[u8; 32]>,
    ) -> Result<([u8; 32], Option<[u8; 32]>), ProofError> {
        let element_count = self.element_count.get();
        let depth = leaf_slot_count(element_count).trailing_zeros();

        let mut required = 0;
        let mut position = self.leaf_index;
        let mut level_count = element_count;
        for _ in 0..depth {
            if position ^ 1 < level_count {
                required += 1;
            }
            position >>= 1;
            level_count = (level_count + 1) / 2;
        }
        if required != self.decommitments.len() {
            return Err(ProofError::decommitment_count_mismatch(
                required,
                self.decommitments.len(),
            ));
        }

        let mut decommitments = self.decommitments.iter().rev();
        let mut position = self.leaf_index;
        let mut level_count = element_count;
        for _ in 0..depth {
            if position ^ 1 < level_count {
                let sibling = decommitments
                    .next()
                    .expect("the decommitment count was checked against the path shape");
                let node_is_right = position & 1 == 1;
                hash = self.pair(&hash, sibling, node_is_right);
                new_hash = new_hash.map(|h| self.pair(&h, sibling, node_is_right));
            }
            position >>= 1;
            level_count = (level_count + 1) / 2;
        }
        Ok((hash, new_hash))
    }

    fn pair(&self, node: &[u8; 32], sibling: &[u8; 32], node_is_right: bool) -> [u8; 32] {
        match self.order {
            HashOrder::Ordered => {
                if node_is_right {
                    combine(sibling, node)
                } else {
                    combine(node, sibling)
                }
            }
            HashOrder::Sorted => combine_sorted(node, sibling),
        }
    }
}

fn leaf_image_of(element: &[u8]) -> Result<[u8; 32], ProofError> {
    if element.len() != 32 {
        return Err(ProofError::element_length(element.len()));
    }
    Ok(hash_leaf(element))
}
