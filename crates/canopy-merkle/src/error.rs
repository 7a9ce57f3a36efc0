//! Typed errors for tree construction and proof handling.

/// Failure to construct or derive a [`crate::Tree`].
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct TreeError(pub(crate) TreeErrorKind);

impl TreeError {
    pub(crate) fn element_length(len: usize) -> Self {
        Self(TreeErrorKind::ElementLength {
            len,
        })
    }

    pub(crate) fn capacity_exceeded(element_count: u64) -> Self {
        Self(TreeErrorKind::CapacityExceeded {
            element_count,
        })
    }

    pub(crate) fn index_outside_tree(index: usize, element_count: usize) -> Self {
        Self(TreeErrorKind::IndexOutsideTree {
            index,
            element_count,
        })
    }

    pub(crate) fn count_mismatch(indices: usize, replacements: usize) -> Self {
        Self(TreeErrorKind::CountMismatch {
            indices,
            replacements,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum TreeErrorKind {
    #[error("element must be exactly 32 bytes, but was {len} bytes")]
    ElementLength { len: usize },
    #[error("element count {element_count} exceeds the 2^32 - 1 capacity bound")]
    CapacityExceeded { element_count: u64 },
    #[error("index {index} falls outside a tree of {element_count} elements")]
    IndexOutsideTree {
        index: usize,
        element_count: usize,
    },
    #[error("got {indices} update indices but {replacements} replacement elements")]
    CountMismatch {
        indices: usize,
        replacements: usize,
    },
}

/// Failure to generate, decode, verify, or apply a proof.
///
/// Verifiers treat every variant the same way: the proof is rejected and no
/// state transition takes place. The kinds exist so callers can report what
/// was wrong with the input.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct ProofError(pub(crate) ProofErrorKind);

impl ProofError {
    pub(crate) fn unsorted_indices() -> Self {
        Self(ProofErrorKind::UnsortedIndices)
    }

    pub(crate) fn no_elements() -> Self {
        Self(ProofErrorKind::NoElements)
    }

    pub(crate) fn index_outside_tree(index: usize, element_count: usize) -> Self {
        Self(ProofErrorKind::IndexOutsideTree {
            index,
            element_count,
        })
    }

    pub(crate) fn element_length(len: usize) -> Self {
        Self(ProofErrorKind::ElementLength {
            len,
        })
    }

    pub(crate) fn element_count_mismatch(elements: usize, replacements: usize) -> Self {
        Self(ProofErrorKind::ElementCountMismatch {
            elements,
            replacements,
        })
    }

    pub(crate) fn stream_length_mismatch(flags: usize, skips: usize, orders: usize) -> Self {
        Self(ProofErrorKind::StreamLengthMismatch {
            flags,
            skips,
            orders,
        })
    }

    pub(crate) fn wrong_element_count(expected: usize, actual: usize) -> Self {
        Self(ProofErrorKind::WrongElementCount {
            expected,
            actual,
        })
    }

    pub(crate) fn decommitment_count_mismatch(required: usize, actual: usize) -> Self {
        Self(ProofErrorKind::DecommitmentCountMismatch {
            required,
            actual,
        })
    }

    pub(crate) fn missing_stop_bit() -> Self {
        Self(ProofErrorKind::MissingStopBit)
    }

    pub(crate) fn bits_above_stop() -> Self {
        Self(ProofErrorKind::BitsAboveStop)
    }

    pub(crate) fn hash_count_exceeds_capacity(hash_count: usize) -> Self {
        Self(ProofErrorKind::HashCountExceedsCapacity {
            hash_count,
        })
    }

    pub(crate) fn element_count_exceeds_capacity(element_count: u64) -> Self {
        Self(ProofErrorKind::ElementCountExceedsCapacity {
            element_count,
        })
    }

    pub(crate) fn root_mismatch() -> Self {
        Self(ProofErrorKind::RootMismatch)
    }

    pub(crate) fn minimum_index_violation(index: usize, minimum: usize) -> Self {
        Self(ProofErrorKind::MinimumIndexViolation {
            index,
            minimum,
        })
    }

    pub(crate) fn frontier_mismatch() -> Self {
        Self(ProofErrorKind::FrontierMismatch)
    }

    pub(crate) fn uninferable_indices() -> Self {
        Self(ProofErrorKind::UninferableIndices)
    }

    pub(crate) fn path_too_deep() -> Self {
        Self(ProofErrorKind::PathTooDeep)
    }

    pub(crate) fn ragged_buffer(len: usize) -> Self {
        Self(ProofErrorKind::RaggedBuffer {
            len,
        })
    }

    pub(crate) fn truncated_buffer(words: usize) -> Self {
        Self(ProofErrorKind::TruncatedBuffer {
            words,
        })
    }

    pub(crate) fn oversized_count_word() -> Self {
        Self(ProofErrorKind::OversizedCountWord)
    }
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum ProofErrorKind {
    #[error("indices must be strictly ascending")]
    UnsortedIndices,
    #[error("a proof over zero elements is undefined")]
    NoElements,
    #[error("index {index} falls outside a tree of {element_count} elements")]
    IndexOutsideTree {
        index: usize,
        element_count: usize,
    },
    #[error("element must be exactly 32 bytes, but was {len} bytes")]
    ElementLength { len: usize },
    #[error("got {elements} elements but {replacements} replacement elements")]
    ElementCountMismatch {
        elements: usize,
        replacements: usize,
    },
    #[error(
        "proof bit streams disagree in length: {flags} flags, {skips} skips, {orders} orders"
    )]
    StreamLengthMismatch {
        flags: usize,
        skips: usize,
        orders: usize,
    },
    #[error("proof shape requires {expected} elements, but {actual} were supplied")]
    WrongElementCount { expected: usize, actual: usize },
    #[error("proof shape requires {required} decommitments, but carries {actual}")]
    DecommitmentCountMismatch { required: usize, actual: usize },
    #[error("compact proof bit streams carry no stop bit")]
    MissingStopBit,
    #[error("compact proof bit streams carry stray bits above the stop bit")]
    BitsAboveStop,
    #[error("hash count {hash_count} exceeds the 255-step compact stream capacity")]
    HashCountExceedsCapacity { hash_count: usize },
    #[error("element count {element_count} exceeds the 2^32 - 1 capacity bound")]
    ElementCountExceedsCapacity { element_count: u64 },
    #[error("derived root does not match the claimed root")]
    RootMismatch,
    #[error(
        "update index {index} is below the minimum combined proof index {minimum} for this tree"
    )]
    MinimumIndexViolation { index: usize, minimum: usize },
    #[error("combined proof does not isolate the append frontier of the tree")]
    FrontierMismatch,
    #[error("leaf indices cannot be inferred from a sorted-hash proof")]
    UninferableIndices,
    #[error("inferred leaf path exceeds the 32-bit index range")]
    PathTooDeep,
    #[error("proof buffer length {len} is not a whole number of 32-byte words")]
    RaggedBuffer { len: usize },
    #[error("proof buffer of {words} words is too short for this proof kind")]
    TruncatedBuffer { words: usize },
    #[error("element count word has nonzero bytes above the u32 range")]
    OversizedCountWord,
}
