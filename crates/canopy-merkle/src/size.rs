//! Proving the element count committed to by a root.
//!
//! The count is not derivable from the root alone; it is bound in by the
//! final `keccak256(count || element_root)`. A size proof therefore either
//! reveals the frontier (enough decommitments to rebuild the element root
//! from the left spine, reusing the append proof's decommitment set), or
//! reveals the element root itself and lets the verifier redo the binding
//! hash directly.

use crate::{
    append::fold_frontier,
    bind_count,
    compact::{
        count_word,
        parse_count_word,
        split_words,
    },
    HashOrder,
    ProofError,
    Tree,
};

impl Tree {
    /// Constructs the proof of this tree's element count from its frontier.
    #[must_use]
    pub fn construct_size_proof(&self) -> SizeProof {
        let append = self.construct_append_proof();
        SizeProof {
            element_count: self.element_count(),
            witness: SizeWitness::Frontier {
                decommitments: append.decommitments().to_vec(),
            },
            order: self.hash_order(),
        }
    }

    /// Constructs the proof of this tree's element count that simply reveals
    /// the element root.
    ///
    /// Returns `None` for an empty tree, which has no element root.
    #[must_use]
    pub fn construct_simple_size_proof(&self) -> Option<SizeProof> {
        let element_root = self.element_root()?;
        Some(SizeProof {
            element_count: self.element_count(),
            witness: SizeWitness::ElementRoot {
                element_root,
            },
            order: self.hash_order(),
        })
    }
}

/// The material a [`SizeProof`] rebuilds the element root from.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SizeWitness {
    /// The frontier subtree roots, one per set bit of the element count, most
    /// significant first.
    Frontier { decommitments: Vec<[u8; 32]> },
    /// The element root itself.
    ElementRoot { element_root: [u8; 32] },
}

/// The proof that a root commits to a specific element count.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SizeProof {
    element_count: usize,
    witness: SizeWitness,
    order: HashOrder,
}

impl SizeProof {
    #[must_use]
    #[inline]
    pub fn element_count(&self) -> usize {
        self.element_count
    }

    #[must_use]
    #[inline]
    pub fn witness(&self) -> &SizeWitness {
        &self.witness
    }

    #[must_use]
    #[inline]
    pub fn hash_order(&self) -> HashOrder {
        self.order
    }

    /// Checks that `root` commits to exactly this proof's element count.
    ///
    /// # Errors
    ///
    /// Returns an error if a frontier witness has a decommitment count
    /// differing from the set bits of the element count, or if the derived
    /// root differs from `root`.
    pub fn verify(&self, root: [u8; 32]) -> Result<(), ProofError> {
        let derived = match &self.witness {
            SizeWitness::Frontier {
                decommitments,
            } => {
                let required = self.element_count.count_ones() as usize;
                if required != decommitments.len() {
                    return Err(ProofError::decommitment_count_mismatch(
                        required,
                        decommitments.len(),
                    ));
                }
                if self.element_count == 0 {
                    [0; 32]
                } else {
                    bind_count(
                        self.element_count as u64,
                        &fold_frontier(decommitments, self.order),
                    )
                }
            }
            SizeWitness::ElementRoot {
                element_root,
            } => bind_count(self.element_count as u64, element_root),
        };
        if derived != root {
            return Err(ProofError::root_mismatch());
        }
        Ok(())
    }

    /// Serializes the proof into the wire form `N || witness words`.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = count_word(self.element_count).to_vec();
        bytes.extend_from_slice(&self.witness_bytes());
        bytes
    }

    /// Serializes only the witness words, for callers that transport the
    /// element count themselves.
    #[must_use]
    pub fn to_compact_bytes(&self) -> Vec<u8> {
        self.witness_bytes()
    }

    /// Deserializes a proof from the wire form produced by
    /// [`SizeProof::to_bytes`].
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer is not a whole number of 32-byte words,
    /// is empty, carries an element count outside the u32 range, or carries a
    /// word count fitting neither witness form.
    pub fn from_bytes(bytes: &[u8], order: HashOrder) -> Result<Self, ProofError> {
        let words = split_words(bytes)?;
        let Some((count, witness)) = words.split_first() else {
            return Err(ProofError::truncated_buffer(0));
        };
        let element_count = parse_count_word(count)?;
        Self::from_witness_words(element_count, witness, order)
    }

    /// Deserializes a proof from the compact wire form, with the element
    /// count supplied by the caller.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`SizeProof::from_bytes`].
    pub fn from_compact_bytes(
        element_count: usize,
        bytes: &[u8],
        order: HashOrder,
    ) -> Result<Self, ProofError> {
        let words = split_words(bytes)?;
        Self::from_witness_words(element_count, &words, order)
    }

    fn from_witness_words(
        element_count: usize,
        words: &[[u8; 32]],
        order: HashOrder,
    ) -> Result<Self, ProofError> {
        let frontier_words = element_count.count_ones() as usize;
        let witness = if words.len() == frontier_words {
            SizeWitness::Frontier {
                decommitments: words.to_vec(),
            }
        } else if words.len() == 1 {
            // for counts with a single set bit the frontier is the element
            // root itself, so the one-word forms agree
            SizeWitness::ElementRoot {
                element_root: words[0],
            }
        } else {
            return Err(ProofError::truncated_buffer(words.len()));
        };
        Ok(Self {
            element_count,
            witness,
            order,
        })
    }

    fn witness_bytes(&self) -> Vec<u8> {
        match &self.witness {
            SizeWitness::Frontier {
                decommitments,
            } => decommitments.concat(),
            SizeWitness::ElementRoot {
                element_root,
            } => element_root.to_vec(),
        }
    }
}
