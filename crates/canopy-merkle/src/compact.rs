//! The compact multi-proof representation and the proof wire format.
//!
//! In compact form each bit stream of a [`MultiProof`] occupies one 32-byte
//! word read as a 256-bit big-endian integer, bit `i` holding step `i`. The
//! `flags` and `skips` words additionally carry a stop bit one position above
//! the last real step: since a step can never hash two computed values *and*
//! promote (a skip), the coincidence of set bits in both words is reserved as
//! the end-of-stream marker, and a verifier needs no separate length field.
//! The `orders` word carries no stop bit; the other two already terminate the
//! stream.
//!
//! On the wire a proof is the word sequence
//! `element_count || flags || skips || [orders] || decommitments*`, the `orders`
//! word present only for ordered-hash proofs, and the element count
//! left-padded into the last four bytes of its word.

use crate::{
    HashOrder,
    MultiProof,
    ProofError,
};

/// The longest stream a compact proof can hold: bit 255 is the highest
/// possible stop bit position.
pub const MAX_COMPACT_HASH_COUNT: usize = 255;

impl MultiProof {
    /// Packs this proof into its compact one-word-per-stream form.
    ///
    /// # Errors
    ///
    /// Returns an error if the proof has more than
    /// [`MAX_COMPACT_HASH_COUNT`] steps.
    pub fn into_compact(self) -> Result<CompactMultiProof, ProofError> {
        let hash_count = self.hash_count();
        if hash_count > MAX_COMPACT_HASH_COUNT {
            return Err(ProofError::hash_count_exceeds_capacity(hash_count));
        }
        let mut flags = [0; 32];
        let mut skips = [0; 32];
        for (i, flag) in self.flags().iter().enumerate() {
            if *flag {
                set_bit(&mut flags, i);
            }
        }
        for (i, skip) in self.skips().iter().enumerate() {
            if *skip {
                set_bit(&mut skips, i);
            }
        }
        set_bit(&mut flags, hash_count);
        set_bit(&mut skips, hash_count);
        let orders = self.orders().map(|orders| {
            let mut word = [0; 32];
            for (i, order) in orders.iter().enumerate() {
                if *order {
                    set_bit(&mut word, i);
                }
            }
            word
        });
        let element_count = self.element_count();
        let decommitments = self.into_decommitments();
        Ok(CompactMultiProof {
            element_count,
            flags,
            skips,
            orders,
            decommitments,
        })
    }

    fn into_decommitments(self) -> Vec<[u8; 32]> {
        let Self {
            decommitments, ..
        } = self;
        decommitments
    }
}

/// A [`MultiProof`] with its bit streams packed into one 32-byte word each.
///
/// See the [module documentation](self) for the layout and the stop-bit
/// encoding.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CompactMultiProof {
    element_count: usize,
    flags: [u8; 32],
    skips: [u8; 32],
    orders: Option<[u8; 32]>,
    decommitments: Vec<[u8; 32]>,
}

impl CompactMultiProof {
    #[must_use]
    #[inline]
    pub fn element_count(&self) -> usize {
        self.element_count
    }

    #[must_use]
    #[inline]
    pub fn flags_word(&self) -> &[u8; 32] {
        &self.flags
    }

    #[must_use]
    #[inline]
    pub fn skips_word(&self) -> &[u8; 32] {
        &self.skips
    }

    /// Returns the `orders` word, or `None` for a sorted-hash proof.
    #[must_use]
    #[inline]
    pub fn orders_word(&self) -> Option<&[u8; 32]> {
        self.orders.as_ref()
    }

    #[must_use]
    #[inline]
    pub fn decommitments(&self) -> &[[u8; 32]] {
        &self.decommitments
    }

    #[must_use]
    pub fn hash_order(&self) -> HashOrder {
        if self.orders.is_some() {
            HashOrder::Ordered
        } else {
            HashOrder::Sorted
        }
    }

    /// Unpacks the bit streams back into a boolean-stream [`MultiProof`].
    ///
    /// The stream length is recovered by scanning for the lowest step at
    /// which `flags` and `skips` are both set.
    ///
    /// # Errors
    ///
    /// Returns an error if no stop bit exists, or if any stream carries set
    /// bits above it.
    pub fn expand(&self) -> Result<MultiProof, ProofError> {
        let hash_count = (0..=MAX_COMPACT_HASH_COUNT)
            .find(|&i| get_bit(&self.flags, i) && get_bit(&self.skips, i))
            .ok_or_else(ProofError::missing_stop_bit)?;
        for i in (hash_count + 1)..=MAX_COMPACT_HASH_COUNT {
            if get_bit(&self.flags, i) || get_bit(&self.skips, i) {
                return Err(ProofError::bits_above_stop());
            }
        }
        if let Some(orders) = &self.orders {
            if (hash_count..=MAX_COMPACT_HASH_COUNT).any(|i| get_bit(orders, i)) {
                return Err(ProofError::bits_above_stop());
            }
        }
        let flags = (0..hash_count).map(|i| get_bit(&self.flags, i)).collect();
        let skips = (0..hash_count).map(|i| get_bit(&self.skips, i)).collect();
        let orders = self
            .orders
            .map(|orders| (0..hash_count).map(|i| get_bit(&orders, i)).collect());
        Ok(MultiProof::from_parts(
            flags,
            skips,
            orders,
            self.decommitments.clone(),
            self.element_count,
            self.hash_order(),
        ))
    }

    /// Checks that `elements`, in ascending index order, are committed to by
    /// `root`.
    ///
    /// # Errors
    ///
    /// Returns the stream errors of [`CompactMultiProof::expand`] and the
    /// verification errors of [`MultiProof::verify`].
    pub fn verify(
        &self,
        elements: &[impl AsRef<[u8]>],
        root: [u8; 32],
    ) -> Result<(), ProofError> {
        self.expand()?.verify(elements, root)
    }

    /// Checks that `elements` are committed to by `root` and derives the root
    /// with them replaced by `replacements`, pairwise.
    ///
    /// # Errors
    ///
    /// Returns the stream errors of [`CompactMultiProof::expand`] and the
    /// verification errors of [`MultiProof::apply_update`].
    pub fn apply_update(
        &self,
        elements: &[impl AsRef<[u8]>],
        replacements: &[impl AsRef<[u8]>],
        root: [u8; 32],
    ) -> Result<[u8; 32], ProofError> {
        self.expand()?.apply_update(elements, replacements, root)
    }

    /// Recovers the proved leaf indices from the bit streams.
    ///
    /// # Errors
    ///
    /// Returns the stream errors of [`CompactMultiProof::expand`] and the
    /// inference errors of [`MultiProof::infer_indices`].
    pub fn infer_indices(&self) -> Result<Vec<usize>, ProofError> {
        self.expand()?.infer_indices()
    }

    /// Serializes the proof into its wire form.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let words = 3 + usize::from(self.orders.is_some()) + self.decommitments.len();
        let mut bytes = Vec::with_capacity(32 * words);
        bytes.extend_from_slice(&count_word(self.element_count));
        bytes.extend_from_slice(&self.flags);
        bytes.extend_from_slice(&self.skips);
        if let Some(orders) = &self.orders {
            bytes.extend_from_slice(orders);
        }
        for decommitment in &self.decommitments {
            bytes.extend_from_slice(decommitment);
        }
        bytes
    }

    /// Deserializes a proof from the wire form produced by
    /// [`CompactMultiProof::to_bytes`].
    ///
    /// Whether an `orders` word is expected follows from `order`; the wire
    /// form does not encode the hash variant.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer is not a whole number of 32-byte words,
    /// is shorter than the fixed words, carries an element count outside the
    /// u32 range, or carries malformed bit streams.
    pub fn from_bytes(bytes: &[u8], order: HashOrder) -> Result<Self, ProofError> {
        let words = split_words(bytes)?;
        let fixed = 3 + usize::from(order.is_ordered());
        if words.len() < fixed {
            return Err(ProofError::truncated_buffer(words.len()));
        }
        let element_count = parse_count_word(&words[0])?;
        let proof = Self {
            element_count,
            flags: words[1],
            skips: words[2],
            orders: order.is_ordered().then(|| words[3]),
            decommitments: words[fixed..].to_vec(),
        };
        // reject streams without a stop bit (or with trailing garbage) at the
        // boundary rather than at first use
        proof.expand()?;
        Ok(proof)
    }
}

#[inline]
fn get_bit(word: &[u8; 32], i: usize) -> bool {
    word[31 - i / 8] >> (i % 8) & 1 == 1
}

#[inline]
fn set_bit(word: &mut [u8; 32], i: usize) {
    word[31 - i / 8] |= 1 << (i % 8);
}

/// Renders an element count as a left-padded 32-byte big-endian word.
pub(crate) fn count_word(element_count: usize) -> [u8; 32] {
    let mut word = [0; 32];
    word[28..].copy_from_slice(&(element_count as u32).to_be_bytes());
    word
}

/// Parses an element count word, rejecting values outside the u32 range.
pub(crate) fn parse_count_word(word: &[u8; 32]) -> Result<usize, ProofError> {
    if word[..28].iter().any(|byte| *byte != 0) {
        return Err(ProofError::oversized_count_word());
    }
    let count = u32::from_be_bytes(word[28..].try_into().expect("the slice is four bytes"));
    Ok(count as usize)
}

/// Splits a byte buffer into 32-byte words.
pub(crate) fn split_words(bytes: &[u8]) -> Result<Vec<[u8; 32]>, ProofError> {
    if bytes.len() % 32 != 0 {
        return Err(ProofError::ragged_buffer(bytes.len()));
    }
    Ok(bytes
        .chunks_exact(32)
        .map(|chunk| chunk.try_into().expect("the chunk is 32 bytes"))
        .collect())
}
