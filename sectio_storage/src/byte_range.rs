//! Byte ranges.
//!
//! A [`ByteRange`] is a run of bytes at an absolute offset within a byte source.
//! Unlike a general purpose range, both the offset and the length are always known:
//! every physical extent referenced by a storage descriptor has a declared size.

use std::ops::{Bound, Range, RangeBounds};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A byte offset.
pub type ByteOffset = u64;

/// A byte length.
pub type ByteLength = u64;

/// A byte range.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct ByteRange {
    offset: ByteOffset,
    length: ByteLength,
}

impl From<Range<u64>> for ByteRange {
    fn from(range: Range<u64>) -> Self {
        Self::new(range)
    }
}

impl ByteRange {
    /// Create a new byte range from a bounded [`RangeBounds<u64>`].
    ///
    /// An unbounded start is treated as `0`, an unbounded end as an empty range.
    pub fn new(bounds: impl RangeBounds<u64>) -> Self {
        let start = match bounds.start_bound() {
            Bound::Included(start) => *start,
            Bound::Excluded(start) => start.saturating_add(1),
            Bound::Unbounded => 0,
        };
        let end = match bounds.end_bound() {
            Bound::Included(end) => end.saturating_add(1),
            Bound::Excluded(end) => *end,
            Bound::Unbounded => start,
        };
        Self {
            offset: start,
            length: end.saturating_sub(start),
        }
    }

    /// Create a new byte range from an `offset` and `length`.
    #[must_use]
    pub const fn new_with_offset_length(offset: ByteOffset, length: ByteLength) -> Self {
        Self { offset, length }
    }

    /// Return the start of the byte range.
    #[must_use]
    pub const fn offset(&self) -> ByteOffset {
        self.offset
    }

    /// Return the length of the byte range.
    #[must_use]
    pub const fn length(&self) -> ByteLength {
        self.length
    }

    /// Return the exclusive end of the byte range.
    ///
    /// Saturates at [`u64::MAX`], a range ending past [`u64::MAX`] lies outside every byte source.
    #[must_use]
    pub const fn end(&self) -> ByteOffset {
        self.offset.saturating_add(self.length)
    }

    /// Return the exclusive end of the byte range, or [`None`] if it exceeds [`u64::MAX`].
    #[must_use]
    pub const fn checked_end(&self) -> Option<ByteOffset> {
        self.offset.checked_add(self.length)
    }

    /// Returns true if the byte range has a zero length.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Convert the byte range to a [`Range<u64>`].
    #[must_use]
    pub const fn to_range(&self) -> Range<u64> {
        self.offset..self.end()
    }

    /// Convert the byte range to a [`Range<usize>`].
    ///
    /// # Panics
    ///
    /// Panics if the byte range exceeds [`usize::MAX`].
    #[must_use]
    pub fn to_range_usize(&self) -> Range<usize> {
        usize::try_from(self.offset).unwrap()..usize::try_from(self.end()).unwrap()
    }
}

impl std::fmt::Display for ByteRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(f, "{}..{}", self.offset, self.end())
    }
}

/// An invalid byte range error.
#[derive(Copy, Clone, Debug, Error)]
#[error("invalid byte range {0} for bytes of length {1}")]
pub struct InvalidByteRangeError(ByteRange, u64);

impl InvalidByteRangeError {
    /// Create a new [`InvalidByteRangeError`].
    #[must_use]
    pub fn new(byte_range: ByteRange, bytes_len: u64) -> Self {
        Self(byte_range, bytes_len)
    }

    /// Return the offending byte range.
    #[must_use]
    pub fn byte_range(&self) -> ByteRange {
        self.0
    }
}
