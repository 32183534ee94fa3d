//! Sections.
//!
//! A [`Section`] is an ordered list of per-dimension [`SectionRange`]s, each a `(start, stride, count)` triple.
//! Sections are immutable once constructed and can be shared read-only between concurrent requests.

use std::fmt::Display;
use std::num::NonZeroU64;
use std::ops::Range;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{ArrayShape, IncompatibleDimensionalityError};

/// A section error.
#[derive(Clone, Debug, Error)]
pub enum SectionError {
    /// The section dimensionality does not match the variable rank.
    #[error(transparent)]
    IncompatibleDimensionality(#[from] IncompatibleDimensionalityError),
    /// A section range selects elements outside of the variable shape.
    #[error("section range {range} in dimension {dimension} is out-of-bounds of length {length}")]
    OutOfBounds {
        /// The dimension index.
        dimension: usize,
        /// The offending range.
        range: SectionRange,
        /// The variable length in that dimension.
        length: u64,
    },
    /// A range relative to an addressed extent exceeds the extent or the destination.
    #[error("local range {range:?} in dimension {dimension} exceeds source length {source_length} or output length {output_length}")]
    LocalOutOfBounds {
        /// The dimension index.
        dimension: usize,
        /// The offending range.
        range: LocalRange,
        /// The source length in that dimension.
        source_length: u64,
        /// The output length in that dimension.
        output_length: u64,
    },
    /// A section range was created with a zero stride.
    #[error("section range stride must be non-zero")]
    ZeroStride,
}

/// A strided range of indices in one dimension.
///
/// Selects the indices `start, start + stride, ..., start + (count - 1) * stride`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct SectionRange {
    start: u64,
    stride: NonZeroU64,
    count: u64,
}

impl Display for SectionRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.stride.get() == 1 {
            write!(f, "{}..{}", self.start, self.start + self.count)
        } else {
            write!(f, "{}:{}:{}", self.start, self.stride, self.count)
        }
    }
}

impl SectionRange {
    /// Create a new section range.
    ///
    /// # Errors
    /// Returns [`SectionError::ZeroStride`] if `stride` is zero.
    pub fn new(start: u64, stride: u64, count: u64) -> Result<Self, SectionError> {
        let stride = NonZeroU64::new(stride).ok_or(SectionError::ZeroStride)?;
        Ok(Self {
            start,
            stride,
            count,
        })
    }

    /// Create a new section range with a unit stride.
    #[must_use]
    pub const fn contiguous(start: u64, count: u64) -> Self {
        Self {
            start,
            stride: NonZeroU64::MIN,
            count,
        }
    }

    /// Return the first selected index.
    #[must_use]
    pub const fn start(&self) -> u64 {
        self.start
    }

    /// Return the stride.
    #[must_use]
    pub const fn stride(&self) -> u64 {
        self.stride.get()
    }

    /// Return the number of selected indices.
    #[must_use]
    pub const fn count(&self) -> u64 {
        self.count
    }

    /// Return the `j`th selected index.
    #[must_use]
    pub const fn element(&self, j: u64) -> u64 {
        self.start + j * self.stride.get()
    }

    /// Return the last selected index, or [`None`] if the range is empty or the index overflows.
    #[must_use]
    pub fn last(&self) -> Option<u64> {
        let steps = self.count.checked_sub(1)?;
        steps
            .checked_mul(self.stride.get())
            .and_then(|span| span.checked_add(self.start))
    }

    /// Returns true if the range selects only indices below `length`.
    ///
    /// An empty range is in bounds if its start does not exceed `length`.
    #[must_use]
    pub fn inbounds(&self, length: u64) -> bool {
        if self.count == 0 {
            self.start <= length
        } else {
            self.last().is_some_and(|last| last < length)
        }
    }

    /// Restrict the range to the indices within `origin..origin + extent`.
    ///
    /// The returned [`LocalRange`] is expressed relative to `origin`, and records the position of its
    /// first selected index within this range as its output offset.
    /// Returns [`None`] if no selected index lies within the extent.
    #[must_use]
    pub fn localise(&self, origin: u64, extent: u64) -> Option<LocalRange> {
        let last = self.last()?;
        let end = origin.checked_add(extent)?;
        if extent == 0 || last < origin || self.start >= end {
            return None;
        }
        let stride = self.stride.get();
        // first selected index at or after origin
        let j0 = if self.start >= origin {
            0
        } else {
            (origin - self.start).div_ceil(stride)
        };
        // last selected index before end
        let j1 = std::cmp::min((end - 1 - self.start) / stride, self.count - 1);
        if j0 > j1 {
            return None;
        }
        Some(LocalRange {
            start: self.element(j0) - origin,
            stride,
            count: j1 - j0 + 1,
            output_offset: j0,
        })
    }
}

/// A strided range relative to the origin of an addressed extent (a chunk or a whole variable).
///
/// `output_offset` is the index in the destination dimension receiving the first selected element.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct LocalRange {
    /// The first selected index relative to the extent origin.
    pub start: u64,
    /// The stride.
    pub stride: u64,
    /// The number of selected indices.
    pub count: u64,
    /// The destination index of the first selected element.
    pub output_offset: u64,
}

impl From<&SectionRange> for LocalRange {
    fn from(range: &SectionRange) -> Self {
        Self {
            start: range.start,
            stride: range.stride.get(),
            count: range.count,
            output_offset: 0,
        }
    }
}

/// A section of a variable.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Default, Serialize, Deserialize)]
pub struct Section {
    ranges: Vec<SectionRange>,
}

impl Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        for (i, range) in self.ranges.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{range}")?;
        }
        write!(f, "]")
    }
}

impl FromIterator<SectionRange> for Section {
    fn from_iter<T: IntoIterator<Item = SectionRange>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl Section {
    /// Create a new section from per-dimension ranges.
    #[must_use]
    pub fn new(ranges: Vec<SectionRange>) -> Self {
        Self { ranges }
    }

    /// Create a new unit stride section from a list of [`Range`]s.
    #[must_use]
    pub fn new_with_ranges(ranges: &[Range<u64>]) -> Self {
        ranges
            .iter()
            .map(|range| {
                SectionRange::contiguous(range.start, range.end.saturating_sub(range.start))
            })
            .collect()
    }

    /// Create a section covering an entire variable of `shape`.
    #[must_use]
    pub fn full(shape: &[u64]) -> Self {
        shape
            .iter()
            .map(|&length| SectionRange::contiguous(0, length))
            .collect()
    }

    /// Return the per-dimension ranges.
    #[must_use]
    pub fn ranges(&self) -> &[SectionRange] {
        &self.ranges
    }

    /// Return the dimensionality of the section.
    #[must_use]
    pub fn dimensionality(&self) -> usize {
        self.ranges.len()
    }

    /// Return the shape of the section (the count of each range).
    #[must_use]
    pub fn shape(&self) -> ArrayShape {
        self.ranges.iter().map(SectionRange::count).collect()
    }

    /// Return the number of elements selected by the section.
    #[must_use]
    pub fn total_count(&self) -> u64 {
        self.ranges.iter().map(SectionRange::count).product()
    }

    /// Return the number of elements selected by the section as a usize.
    ///
    /// # Panics
    /// Panics if [`total_count()`](Self::total_count) is greater than [`usize::MAX`].
    #[must_use]
    pub fn total_count_usize(&self) -> usize {
        usize::try_from(self.total_count()).unwrap()
    }

    /// Returns true if the section selects no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranges.iter().any(|range| range.count == 0)
    }

    /// Validate the section against a variable of shape `variable_shape`.
    ///
    /// # Errors
    /// Returns [`SectionError`] if the dimensionality differs or any range selects an index outside the variable.
    pub fn validate(&self, variable_shape: &[u64]) -> Result<(), SectionError> {
        if self.ranges.len() != variable_shape.len() {
            return Err(IncompatibleDimensionalityError::new(
                self.ranges.len(),
                variable_shape.len(),
            )
            .into());
        }
        for (dimension, (range, &length)) in
            std::iter::zip(&self.ranges, variable_shape).enumerate()
        {
            if !range.inbounds(length) {
                return Err(SectionError::OutOfBounds {
                    dimension,
                    range: *range,
                    length,
                });
            }
        }
        Ok(())
    }

    /// Return the section as [`LocalRange`]s relative to the variable origin.
    #[must_use]
    pub fn local_ranges(&self) -> Vec<LocalRange> {
        self.ranges.iter().map(LocalRange::from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_range() {
        assert!(SectionRange::new(0, 0, 4).is_err());
        let range = SectionRange::new(1, 3, 3).unwrap();
        assert_eq!(range.last(), Some(7));
        assert_eq!(range.element(1), 4);
        assert!(range.inbounds(8));
        assert!(!range.inbounds(7));
        assert_eq!(range.to_string(), "1:3:3");
        assert_eq!(SectionRange::contiguous(2, 3).to_string(), "2..5");

        let empty = SectionRange::contiguous(4, 0);
        assert_eq!(empty.last(), None);
        assert!(empty.inbounds(4));
        assert!(!empty.inbounds(3));

        let overflow = SectionRange::new(u64::MAX - 1, u64::MAX, 2).unwrap();
        assert_eq!(overflow.last(), None);
        assert!(!overflow.inbounds(u64::MAX));
    }

    #[test]
    fn section_range_localise() {
        // selects 1, 4, 7, 10
        let range = SectionRange::new(1, 3, 4).unwrap();
        assert_eq!(
            range.localise(0, 4),
            Some(LocalRange {
                start: 1,
                stride: 3,
                count: 1,
                output_offset: 0
            })
        );
        assert_eq!(
            range.localise(4, 4),
            Some(LocalRange {
                start: 0,
                stride: 3,
                count: 2,
                output_offset: 1
            })
        );
        assert_eq!(
            range.localise(8, 4),
            Some(LocalRange {
                start: 2,
                stride: 3,
                count: 1,
                output_offset: 3
            })
        );
        assert_eq!(range.localise(12, 4), None);
        // 5 and 6 fall between selected indices
        assert_eq!(range.localise(5, 2), None);
        assert_eq!(SectionRange::contiguous(0, 0).localise(0, 4), None);
    }

    #[test]
    fn section() {
        let section = Section::new_with_ranges(&[1..3, 0..4]);
        assert_eq!(section.shape(), vec![2, 4]);
        assert_eq!(section.total_count(), 8);
        assert!(section.validate(&[3, 4]).is_ok());
        assert!(matches!(
            section.validate(&[2, 4]),
            Err(SectionError::OutOfBounds { dimension: 0, .. })
        ));
        assert!(matches!(
            section.validate(&[3, 4, 1]),
            Err(SectionError::IncompatibleDimensionality(_))
        ));
        assert_eq!(section.to_string(), "[1..3, 0..4]");

        let full = Section::full(&[8, 4]);
        assert_eq!(full.total_count(), 32);
        assert!(!full.is_empty());

        let empty = Section::new_with_ranges(&[0..0, 0..4]);
        assert!(empty.is_empty());
        assert_eq!(empty.total_count(), 0);
        assert!(empty.validate(&[3, 4]).is_ok());

        let scalar = Section::full(&[]);
        assert_eq!(scalar.total_count(), 1);
        assert!(scalar.validate(&[]).is_ok());
    }
}
