//! Sections and chunk grids for the `sectio` crate.
//!
//! A [`Section`] is a hyper-rectangular, possibly strided, selection of a variable's elements.
//! A [`RegularChunkGrid`] tiles a variable's shape with equally sized chunks and reconciles a
//! [`Section`] against that tiling.
//! [`iterators::ContiguousRuns`] turns a selection into maximal runs of elements that are
//! contiguous both in the addressed storage and in the destination.
//!
//! ## Licence
//! `sectio_section` is licensed under either of
//!  - the Apache License, Version 2.0 <http://www.apache.org/licenses/LICENSE-2.0> or
//!  - the MIT license <http://opensource.org/licenses/MIT>, at your option.

mod chunk_grid;
pub mod iterators;
mod section;

pub use chunk_grid::{ChunkIntersection, ChunkIntersections, RegularChunkGrid};
pub use section::{LocalRange, Section, SectionError, SectionRange};

use std::num::NonZeroU64;

/// An ND index to an element in a variable or chunk.
pub type ArrayIndices = Vec<u64>;

/// An ND index to an element in a variable or chunk.
/// Uses [`TinyVec`](tinyvec::TinyVec) for stack allocation up to 4 dimensions.
pub type ArrayIndicesTinyVec = tinyvec::TinyVec<[u64; 4]>;

/// The shape of a variable.
pub type ArrayShape = Vec<u64>;

/// The shape of a chunk. All dimensions must be non-zero.
pub type ChunkShape = Vec<NonZeroU64>;

/// An incompatible dimensionality error.
#[derive(Copy, Clone, Debug, thiserror::Error)]
#[error("incompatible dimensionality {0}, expected {1}")]
pub struct IncompatibleDimensionalityError(usize, usize);

impl IncompatibleDimensionalityError {
    /// Create a new incompatible dimensionality error.
    #[must_use]
    pub const fn new(got: usize, expected: usize) -> Self {
        Self(got, expected)
    }
}

/// Ravel ND indices to a linearised index in C-contiguous order.
///
/// Returns [`None`] if any index is out of bounds of `shape` or the dimensionality differs.
#[must_use]
pub fn ravel_indices(indices: &[u64], shape: &[u64]) -> Option<u64> {
    if indices.len() != shape.len() {
        return None;
    }
    let mut index: u64 = 0;
    let mut count = 1;
    for (i, s) in std::iter::zip(indices, shape).rev() {
        if i >= s {
            return None;
        }
        index += i * count;
        count *= s;
    }
    Some(index)
}

/// Return the C-contiguous element strides of `shape`.
#[must_use]
pub fn c_order_strides(shape: &[u64]) -> ArrayIndicesTinyVec {
    let mut strides: ArrayIndicesTinyVec = std::iter::repeat(1).take(shape.len()).collect();
    for i in (0..shape.len().saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * shape[i + 1];
    }
    strides
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ravel() {
        assert_eq!(ravel_indices(&[1, 2], &[4, 4]), Some(6));
        assert_eq!(ravel_indices(&[3, 3], &[4, 4]), Some(15));
        assert_eq!(ravel_indices(&[4, 0], &[4, 4]), None);
        assert_eq!(ravel_indices(&[0], &[4, 4]), None);
        assert_eq!(ravel_indices(&[], &[]), Some(0));
    }

    #[test]
    fn strides() {
        assert_eq!(c_order_strides(&[2, 3, 4]).as_slice(), &[12, 4, 1]);
        assert_eq!(c_order_strides(&[5]).as_slice(), &[1]);
        assert!(c_order_strides(&[]).is_empty());
    }
}
