//! Index arithmetic for the implicit tree embedded in the slot array.
//!
//! Node `0` is the root and node `i`'s children occupy the contiguous run
//! starting at `(i << log_base) + 1`, the classic implicit heap layout
//! generalized to a `2^log_base`-ary tree. No pointers are stored anywhere;
//! every relationship is computed from indices.

/// Shape of an implicit `2^log_base`-ary tree laid out over `[0, len)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TreeShape {
    log_base: u32,
}

impl TreeShape {
    /// Returns the shape of a tree with branching factor `1 << log_base`.
    pub fn new(log_base: u32) -> Self {
        debug_assert!(log_base >= 1 && log_base < usize::BITS);
        Self { log_base }
    }

    /// Number of children per node.
    pub fn branching(&self) -> usize {
        1 << self.log_base
    }

    /// Index of the first child of `index`.
    ///
    /// The result may lie at or beyond `len` for nodes near the end of the
    /// array, in which case the node has no children.
    pub fn child_start(&self, index: usize) -> usize {
        (index << self.log_base) + 1
    }

    /// One past the index of the last child of `index` in a tree over
    /// `[0, len)`.
    pub fn child_end(&self, index: usize, len: usize) -> usize {
        (self.child_start(index) + self.branching()).min(len)
    }

    /// Index of the parent of `index`. The caller guarantees `index > 0`.
    pub fn parent(&self, index: usize) -> usize {
        debug_assert!(index > 0);
        (index - 1) >> self.log_base
    }

    /// Whether `index` is the root of the tree.
    pub fn is_root(&self, index: usize) -> bool {
        index == 0
    }
}
