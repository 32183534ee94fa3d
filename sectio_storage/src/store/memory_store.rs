//! An in-memory byte source.

use crate::byte_range::{ByteLength, ByteOffset, ByteRange, InvalidByteRangeError};
use crate::{Bytes, ReadableStorageTraits, StorageError};

/// An in-memory byte source.
///
/// Cloning is cheap, the underlying [`Bytes`] are reference counted.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    data: Bytes,
}

impl MemoryStore {
    /// Create a new memory store holding `data`.
    #[must_use]
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }
}

impl From<Vec<u8>> for MemoryStore {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl ReadableStorageTraits for MemoryStore {
    fn read_at(&self, offset: ByteOffset, length: ByteLength) -> Result<Bytes, StorageError> {
        let byte_range = ByteRange::new_with_offset_length(offset, length);
        let data_len = self.data.len() as u64;
        if byte_range.end() > data_len {
            return Err(InvalidByteRangeError::new(byte_range, data_len).into());
        }
        Ok(self.data.slice(byte_range.to_range_usize()))
    }

    fn size(&self) -> Result<u64, StorageError> {
        Ok(self.data.len() as u64)
    }
}
