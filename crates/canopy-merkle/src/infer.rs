//! Recovering proved leaf indices from a multi-proof's bit streams.
//!
//! An ordered-hash proof pins every operand to a side, so the step streams
//! betray exactly which leaves were proved: each leaf's final computed path
//! spells out its index bottom-up, one bit per level. Replaying the fold and
//! noting, at every step, whether a value acted as a left operand (bit 0) or
//! a right operand (bit 1) therefore rebuilds each index LSB-first.
//!
//! Sorted-hash proofs erase sides by construction and carry no `orders`
//! stream; their indices are unrecoverable.

use crate::{
    MultiProof,
    ProofError,
};

impl MultiProof {
    /// Recovers the proved leaf indices from the bit streams alone, in the
    /// ascending order the elements were supplied to generation.
    ///
    /// # Errors
    ///
    /// Returns an error if this is a sorted-hash proof, or if the streams are
    /// inconsistent with each other.
    pub fn infer_indices(&self) -> Result<Vec<usize>, ProofError> {
        if !self.hash_order().is_ordered() {
            return Err(ProofError::uninferable_indices());
        }
        let leaf_count = self.flags().iter().filter(|flag| **flag).count() + 1;
        self.check_shape(leaf_count)?;
        let orders = self
            .orders()
            .expect("ordered proofs carry an orders stream");

        // leaf records sit in buffer order (rightmost leaf first); the fold
        // only ever merges consecutively popped values, so every buffer slot
        // is a contiguous circular run of records
        let m = leaf_count;
        let mut indices = vec![0_usize; m];
        let mut bits_pushed = vec![0_u32; m];
        let mut slots: Vec<(usize, usize)> = (0..m).map(|record| (record, 1)).collect();

        let mut read = 0;
        let mut write = 0;
        for s in 0..self.hash_count() {
            if self.skips()[s] {
                // a promoted node is a left child with no right sibling
                let run = slots[read];
                read = (read + 1) % m;
                push_bit(&mut indices, &mut bits_pushed, run, false)?;
                slots[write] = run;
            } else if self.flags()[s] {
                let first = slots[read];
                read = (read + 1) % m;
                let second = slots[read];
                read = (read + 1) % m;
                // the first value popped is the right operand unless the
                // order bit says otherwise
                push_bit(&mut indices, &mut bits_pushed, first, orders[s])?;
                push_bit(&mut indices, &mut bits_pushed, second, !orders[s])?;
                slots[write] = (first.0, first.1 + second.1);
            } else {
                // the computed value paired with a decommitment; the order
                // bit says the computed value sat on the left
                let run = slots[read];
                read = (read + 1) % m;
                push_bit(&mut indices, &mut bits_pushed, run, !orders[s])?;
                slots[write] = run;
            }
            write = (write + 1) % m;
        }

        indices.reverse();
        if indices.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(ProofError::unsorted_indices());
        }
        Ok(indices)
    }
}

/// Appends one path bit to every leaf record in `run`, LSB-first.
fn push_bit(
    indices: &mut [usize],
    bits_pushed: &mut [u32],
    (start, len): (usize, usize),
    bit: bool,
) -> Result<(), ProofError> {
    let m = indices.len();
    for r in start..start + len {
        let record = r % m;
        if bits_pushed[record] >= 32 {
            return Err(ProofError::path_too_deep());
        }
        if bit {
            indices[record] |= 1 << bits_pushed[record];
        }
        bits_pushed[record] += 1;
    }
    Ok(())
}
