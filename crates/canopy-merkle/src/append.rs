//! Proving that elements can be appended to a tree.
//!
//! Appending only touches the right edge of the tree, so the proof is the
//! frontier: the roots of the perfect subtrees covering the committed
//! elements, one per set bit of the element count, most significant first.
//! Folding them alone reproduces the old root; folding the appended leaf
//! images into them produces the new one.

use crate::{
    bind_count,
    compact::{
        count_word,
        parse_count_word,
        split_words,
    },
    multi::images_of,
    HashOrder,
    ProofError,
    Tree,
    MAX_ELEMENT_COUNT,
};

impl Tree {
    /// Constructs the proof that elements can be appended to this tree.
    ///
    /// The proof is independent of how many elements will be appended; one
    /// proof supports [`AppendProof::apply_single_append`] and
    /// [`AppendProof::apply_append`] alike.
    #[must_use]
    pub fn construct_append_proof(&self) -> AppendProof {
        let element_count = self.element_count();
        let width = self.width();
        let mut decommitments = Vec::new();
        if element_count > 0 {
            let mut covered = 0;
            for b in (0..=element_count.ilog2()).rev() {
                if element_count & (1 << b) != 0 {
                    let subtree_root = self
                        .node((width + covered) >> b)
                        .expect("frontier subtree roots cover committed elements and exist");
                    decommitments.push(subtree_root);
                    covered += 1 << b;
                }
            }
        }
        AppendProof {
            element_count,
            decommitments,
            order: self.hash_order(),
        }
    }
}

/// The proof that new elements can be appended to the tree committed to by a
/// root, carrying everything needed to derive the successor root.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AppendProof {
    element_count: usize,
    decommitments: Vec<[u8; 32]>,
    order: HashOrder,
}

impl AppendProof {
    /// Returns the frontier subtree roots, most significant subtree first.
    ///
    /// There is exactly one per set bit of the element count.
    #[must_use]
    #[inline]
    pub fn decommitments(&self) -> &[[u8; 32]] {
        &self.decommitments
    }

    #[must_use]
    #[inline]
    pub fn element_count(&self) -> usize {
        self.element_count
    }

    #[must_use]
    #[inline]
    pub fn hash_order(&self) -> HashOrder {
        self.order
    }

    /// Checks that this proof's frontier matches `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the decommitment count differs from the set bits
    /// of the element count, or if the derived root differs from `root`.
    pub fn verify(&self, root: [u8; 32]) -> Result<(), ProofError> {
        self.check_root(root)
    }

    /// Checks the frontier against `root` and derives the root of the tree
    /// with `element` appended.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`AppendProof::verify`], plus element
    /// length and capacity errors.
    pub fn apply_single_append(
        &self,
        element: impl AsRef<[u8]>,
        root: [u8; 32],
    ) -> Result<[u8; 32], ProofError> {
        let images = images_of(&[element.as_ref()])?;
        self.check_capacity(1)?;
        self.check_root(root)?;
        // the appended leaf pairs with the deepest frontier subtree first,
        // then rides the promotions up through the remaining ones
        let mut hash = images[0];
        for decommitment in self.decommitments.iter().rev() {
            hash = self.order.combine(decommitment, &hash);
        }
        Ok(bind_count(self.element_count as u64 + 1, &hash))
    }

    /// Checks the frontier against `root` and derives the root of the tree
    /// with `elements` appended, in order.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`AppendProof::verify`], plus element
    /// length and capacity errors, and an error if `elements` is empty.
    pub fn apply_append(
        &self,
        elements: &[impl AsRef<[u8]>],
        root: [u8; 32],
    ) -> Result<[u8; 32], ProofError> {
        if elements.is_empty() {
            return Err(ProofError::no_elements());
        }
        let images = images_of(elements)?;
        self.check_capacity(images.len() as u64)?;
        self.check_root(root)?;
        let new_count = self.element_count as u64 + images.len() as u64;
        let interior = fold_append(self.element_count, &self.decommitments, images, self.order);
        Ok(bind_count(new_count, &interior))
    }

    /// Serializes the proof into the wire form `N || decommitments*`, one
    /// 32-byte word per field.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(32 * (1 + self.decommitments.len()));
        bytes.extend_from_slice(&count_word(self.element_count));
        for decommitment in &self.decommitments {
            bytes.extend_from_slice(decommitment);
        }
        bytes
    }

    /// Deserializes a proof from the wire form produced by
    /// [`AppendProof::to_bytes`].
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer is not a whole number of 32-byte words,
    /// is empty, carries an element count outside the u32 range, or carries a
    /// decommitment count differing from the set bits of the element count.
    pub fn from_bytes(bytes: &[u8], order: HashOrder) -> Result<Self, ProofError> {
        let words = split_words(bytes)?;
        let Some((count, decommitments)) = words.split_first() else {
            return Err(ProofError::truncated_buffer(0));
        };
        let element_count = parse_count_word(count)?;
        let required = element_count.count_ones() as usize;
        if required != decommitments.len() {
            return Err(ProofError::decommitment_count_mismatch(
                required,
                decommitments.len(),
            ));
        }
        Ok(Self {
            element_count,
            decommitments: decommitments.to_vec(),
            order,
        })
    }

    fn check_capacity(&self, appended: u64) -> Result<(), ProofError> {
        let new_count = self.element_count as u64 + appended;
        if new_count > MAX_ELEMENT_COUNT {
            return Err(ProofError::element_count_exceeds_capacity(new_count));
        }
        Ok(())
    }

    fn check_root(&self, root: [u8; 32]) -> Result<(), ProofError> {
        let required = self.element_count.count_ones() as usize;
        if required != self.decommitments.len() {
            return Err(ProofError::decommitment_count_mismatch(
                required,
                self.decommitments.len(),
            ));
        }
        let derived = if self.element_count == 0 {
            [0; 32]
        } else {
            bind_count(
                self.element_count as u64,
                &fold_frontier(&self.decommitments, self.order),
            )
        };
        if derived != root {
            return Err(ProofError::root_mismatch());
        }
        Ok(())
    }
}

/// Folds a nonempty frontier alone back into the interior root, deepest
/// subtree first.
pub(crate) fn fold_frontier(decommitments: &[[u8; 32]], order: HashOrder) -> [u8; 32] {
    let (deepest, rest) = decommitments
        .split_last()
        .expect("the caller checked one decommitment per set count bit, and the count is nonzero");
    let mut hash = *deepest;
    for decommitment in rest.iter().rev() {
        hash = order.combine(decommitment, &hash);
    }
    hash
}

/// Folds appended leaf images into a frontier, level by level, yielding the
/// interior root of the extended tree.
///
/// At each level the region of new nodes spans `lower..upper`; an odd lower
/// bound merges the first hash with one frontier decommitment on its left,
/// interior pairs combine, and a dangling hash at the upper bound promotes
/// one level unchanged.
pub(crate) fn fold_append(
    element_count: usize,
    decommitments: &[[u8; 32]],
    images: Vec<[u8; 32]>,
    order: HashOrder,
) -> [u8; 32] {
    let mut hashes = images;
    let mut lower = element_count;
    let mut upper = element_count + hashes.len();
    let mut decommitment_index = decommitments.len();
    while lower != 0 || upper != 1 {
        let mut next = Vec::with_capacity(hashes.len() / 2 + 1);
        let mut i = 0;
        if lower & 1 == 1 {
            decommitment_index -= 1;
            next.push(order.combine(&decommitments[decommitment_index], &hashes[0]));
            i = 1;
        }
        while i + 1 < hashes.len() {
            next.push(order.combine(&hashes[i], &hashes[i + 1]));
            i += 2;
        }
        if i < hashes.len() {
            next.push(hashes[i]);
        }
        hashes = next;
        lower >>= 1;
        upper = (upper + 1) >> 1;
    }
    hashes[0]
}
