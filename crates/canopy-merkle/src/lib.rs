//! A Merkle accumulator over 32-byte elements with compact authenticated proofs.
//!
//! The accumulator commits to an ordered sequence of elements and hands out
//! proofs that let a verifier holding only the root (and element count) check
//! membership, replace committed elements, or extend the sequence, each time
//! reconstructing the successor root without access to the full tree:
//!
//! + [`InclusionProof`]: membership of a single element, with an update mode;
//! + [`MultiProof`]: existence of a set of elements, driven by bit-packed
//!   `flags`/`skips`/`orders` streams, with an update mode;
//! + [`AppendProof`]: extension of the sequence by one or more elements;
//! + [`CombinedProof`]: simultaneous update and append in one proof;
//! + [`SizeProof`]: the element count itself.
//!
//! Only `keccak256` hashing is supported, and thus only 32-byte node hashes.
//! Elements must themselves be exactly 32 bytes; they enter the tree as leaf
//! images `keccak256(0^32 || element)` so that bare elements never collide with
//! interior nodes.
//!
//! # Usage and examples
//!
//! ```
//! use canopy_merkle::{
//!     HashOrder,
//!     Tree,
//! };
//! let elements: Vec<[u8; 32]> = (0u8..12).map(|i| [i; 32]).collect();
//! let tree = Tree::from_elements(&elements, HashOrder::Ordered).unwrap();
//! let root = tree.root();
//!
//! // Prove that elements 2, 3, 8 and 11 are part of the committed sequence.
//! let proof = tree.construct_multi_proof(&[2, 3, 8, 11]).unwrap();
//! let proved = [elements[2], elements[3], elements[8], elements[11]];
//! assert!(proof.verify(&proved, root).is_ok());
//! ```
//!
//! # Indexing scheme
//!
//! The tree is stored as a flat array over the smallest power of two `W` of
//! leaf slots holding at least the element count `N`. Index 1 is the interior
//! root, the children of node `i` are `2i` and `2i + 1`, and the image of
//! element `i` sits at `W + i`:
//!
//! ```text
//!                 1
//!         2               3
//!     4       5       6       7
//!   8   9  10  11  12  13  14  15     <-- leaf images for W = 8
//! ```
//!
//! Slots whose subtree contains no element are absent. An interior node with
//! only a left child takes that child's value unchanged, so every element
//! count yields one canonical root. The published root additionally binds the
//! element count: `root = keccak256(N as 32 bytes || node[1])`, with the
//! all-zero word reserved for the empty tree. Without the binding, a tree of
//! three elements and its four-element extension with a duplicated third leaf
//! would commit to the same value.
//!
//! # Hash order
//!
//! Interior hashing comes in two variants, chosen per tree and recorded in
//! every proof. [`HashOrder::Ordered`] concatenates children left-to-right and
//! preserves positional information, which is what makes
//! [`MultiProof::infer_indices`] possible. [`HashOrder::Sorted`] concatenates
//! the smaller operand first, making sibling order irrelevant and shrinking
//! multi-proofs by their `orders` stream. The variants are not interchangeable
//! at runtime; a proof only verifies against a tree built with the same
//! variant.

use sha3::{
    Digest as _,
    Keccak256,
};

pub mod append;
pub mod combined;
pub mod compact;
mod error;
pub mod inclusion;
pub mod infer;
pub mod multi;
pub mod size;

pub use append::AppendProof;
pub use combined::{
    minimum_combined_proof_index,
    CombinedProof,
};
pub use compact::CompactMultiProof;
pub use error::{
    ProofError,
    TreeError,
};
pub use inclusion::InclusionProof;
pub use multi::MultiProof;
pub use size::{
    SizeProof,
    SizeWitness,
};

/// The maximum number of elements a tree can commit to.
///
/// The element count is bound into the root as a 32-byte word but transported
/// as a u32 on the wire.
pub const MAX_ELEMENT_COUNT: u64 = u32::MAX as u64;

/// Calculates the leaf image `keccak256(0^32 || element)`.
///
/// The zero word acts as a domain tag separating leaves from interior nodes.
#[must_use]
pub fn hash_leaf(element: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update([0_u8; 32]);
    hasher.update(element);
    hasher.finalize().into()
}

/// Calculates `keccak256(left || right)`.
#[must_use]
pub fn combine(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

/// Calculates `keccak256(min(a, b) || max(a, b))`, comparing the operands as
/// big-endian integers.
#[must_use]
pub fn combine_sorted(a: &[u8; 32], b: &[u8; 32]) -> [u8; 32] {
    if a <= b {
        combine(a, b)
    } else {
        combine(b, a)
    }
}

/// Binds an element count into an interior root, yielding the published root
/// `keccak256(element_count as 32-byte big-endian word || element_root)`.
///
/// The count word is hashed in plain concatenation order for both hash
/// variants.
#[must_use]
pub fn bind_count(element_count: u64, element_root: &[u8; 32]) -> [u8; 32] {
    let mut word = [0_u8; 32];
    word[24..].copy_from_slice(&element_count.to_be_bytes());
    combine(&word, element_root)
}

/// The interior hashing variant a tree and its proofs are built with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum HashOrder {
    /// Children are hashed left-to-right; proofs carry an `orders` stream and
    /// support index inference.
    Ordered,
    /// Children are hashed smaller-operand-first; sibling order is irrelevant
    /// and proofs carry no `orders` stream.
    Sorted,
}

impl HashOrder {
    #[must_use]
    pub fn is_ordered(self) -> bool {
        matches!(self, HashOrder::Ordered)
    }

    pub(crate) fn combine(self, left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
        match self {
            HashOrder::Ordered => combine(left, right),
            HashOrder::Sorted => combine_sorted(left, right),
        }
    }
}

/// Returns the number of leaf slots backing a tree of `element_count`
/// elements: the smallest power of two holding at least one slot per element.
pub(crate) fn leaf_slot_count(element_count: usize) -> usize {
    element_count.max(1).next_power_of_two()
}

/// A Merkle accumulator over an ordered sequence of 32-byte elements.
///
/// Trees are immutable; [`Tree::updated`] and [`Tree::appended`] derive new
/// trees rather than mutating in place. Proof construction lives with each
/// proof type: [`Tree::construct_proof`], [`Tree::construct_multi_proof`],
/// [`Tree::construct_append_proof`], [`Tree::construct_combined_proof`] and
/// [`Tree::construct_size_proof`].
pub struct Tree {
    /// 1-indexed node array of length `2 * W`; index 0 is unused, leaf image
    /// `i` sits at `W + i`, absent subtrees are `None`.
    nodes: Vec<Option<[u8; 32]>>,
    element_count: usize,
    order: HashOrder,
}

impl Tree {
    /// Constructs a tree committing to `elements` in iteration order.
    ///
    /// # Errors
    ///
    /// Returns an error if an element is not exactly 32 bytes, or if the
    /// element count exceeds [`MAX_ELEMENT_COUNT`].
    ///
    /// # Examples
    /// ```
    /// use canopy_merkle::{
    ///     HashOrder,
    ///     Tree,
    /// };
    /// let tree = Tree::from_elements(&[[1_u8; 32], [2; 32], [3; 32]], HashOrder::Ordered).unwrap();
    /// assert_eq!(3, tree.element_count());
    /// assert_eq!(2, tree.depth());
    /// ```
    pub fn from_elements<I, B>(elements: I, order: HashOrder) -> Result<Self, TreeError>
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        let mut images = Vec::new();
        for element in elements {
            let element = element.as_ref();
            if element.len() != 32 {
                return Err(TreeError::element_length(element.len()));
            }
            images.push(hash_leaf(element));
        }
        Self::from_images(images, order)
    }

    pub(crate) fn from_images(images: Vec<[u8; 32]>, order: HashOrder) -> Result<Self, TreeError> {
        let element_count = images.len();
        if element_count as u64 > MAX_ELEMENT_COUNT {
            return Err(TreeError::capacity_exceeded(element_count as u64));
        }
        let width = leaf_slot_count(element_count);
        let mut nodes = vec![None; 2 * width];
        for (i, image) in images.into_iter().enumerate() {
            nodes[width + i] = Some(image);
        }
        for i in (1..width).rev() {
            nodes[i] = match (nodes[2 * i], nodes[2 * i + 1]) {
                (Some(left), Some(right)) => Some(order.combine(&left, &right)),
                (Some(left), None) => Some(left),
                (None, _) => None,
            };
        }
        Ok(Self {
            nodes,
            element_count,
            order,
        })
    }

    /// Returns the published root: the interior root with the element count
    /// bound in, or the all-zero word for an empty tree.
    #[must_use]
    pub fn root(&self) -> [u8; 32] {
        match self.element_root() {
            Some(element_root) => bind_count(self.element_count as u64, &element_root),
            None => [0; 32],
        }
    }

    /// Returns the interior root over the leaf images, before the element
    /// count is bound in.
    ///
    /// Returns `None` for an empty tree.
    #[must_use]
    pub fn element_root(&self) -> Option<[u8; 32]> {
        self.nodes[1]
    }

    #[must_use]
    #[inline]
    pub fn element_count(&self) -> usize {
        self.element_count
    }

    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.element_count == 0
    }

    /// Returns the depth of the backing perfect tree: the number of hops from
    /// a leaf slot to the interior root.
    #[must_use]
    pub fn depth(&self) -> u32 {
        self.width().trailing_zeros()
    }

    #[must_use]
    #[inline]
    pub fn hash_order(&self) -> HashOrder {
        self.order
    }

    /// Returns the leaf image of element `i`, or `None` if `i` falls outside
    /// the tree.
    #[must_use]
    pub fn leaf_image(&self, i: usize) -> Option<[u8; 32]> {
        if i < self.element_count {
            self.nodes[self.width() + i]
        } else {
            None
        }
    }

    /// Derives a new tree with the elements at `indices` replaced by
    /// `replacements`, pairwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the two slices differ in length, an index falls
    /// outside the tree, or a replacement is not exactly 32 bytes.
    pub fn updated<B>(&self, indices: &[usize], replacements: &[B]) -> Result<Self, TreeError>
    where
        B: AsRef<[u8]>,
    {
        if indices.len() != replacements.len() {
            return Err(TreeError::count_mismatch(indices.len(), replacements.len()));
        }
        let mut images = self.images();
        for (&index, replacement) in indices.iter().zip(replacements) {
            let replacement = replacement.as_ref();
            if replacement.len() != 32 {
                return Err(TreeError::element_length(replacement.len()));
            }
            if index >= self.element_count {
                return Err(TreeError::index_outside_tree(index, self.element_count));
            }
            images[index] = hash_leaf(replacement);
        }
        Self::from_images(images, self.order)
    }

    /// Derives a new tree with `elements` appended after the committed
    /// sequence.
    ///
    /// # Errors
    ///
    /// Returns an error if an element is not exactly 32 bytes or the combined
    /// count exceeds [`MAX_ELEMENT_COUNT`].
    pub fn appended<I, B>(&self, elements: I) -> Result<Self, TreeError>
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        let mut images = self.images();
        for element in elements {
            let element = element.as_ref();
            if element.len() != 32 {
                return Err(TreeError::element_length(element.len()));
            }
            images.push(hash_leaf(element));
        }
        Self::from_images(images, self.order)
    }

    /// Returns the number of leaf slots, i.e. half the node array.
    #[inline]
    pub(crate) fn width(&self) -> usize {
        self.nodes.len() / 2
    }

    /// Returns the hash at node index `i`, or `None` if the slot is absent.
    ///
    /// # Panics
    ///
    /// Panics if `i` is outside the node array, i.e. if `i >= 2 * W`.
    #[inline]
    pub(crate) fn node(&self, i: usize) -> Option<[u8; 32]> {
        self.nodes[i]
    }

    fn images(&self) -> Vec<[u8; 32]> {
        let width = self.width();
        self.nodes[width..width + self.element_count]
            .iter()
            .map(|node| node.expect("leaf slots below the element count are always occupied"))
            .collect()
    }
}
