use std::sync::Arc;

use auto_impl::auto_impl;

use super::{
    byte_range::{ByteLength, ByteOffset, ByteRange, InvalidByteRangeError},
    Bytes, StorageError,
};

/// Readable storage traits.
///
/// A readable storage is a positioned byte source: a file handle, an in-memory image, or a
/// network range-fetch client. Only range reads are ever issued against it.
#[auto_impl(&, Arc, Box)]
pub trait ReadableStorageTraits: Send + Sync {
    /// Read `length` bytes starting at `offset`.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if there is an underlying storage error,
    /// or [`StorageError::InvalidByteRangeError`] if the range extends past the end of the source.
    fn read_at(&self, offset: ByteOffset, length: ByteLength) -> Result<Bytes, StorageError>;

    /// Return the size in bytes of the byte source.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if there is an underlying storage error.
    fn size(&self) -> Result<u64, StorageError>;

    /// Read the bytes of a [`ByteRange`].
    ///
    /// # Errors
    /// Returns a [`StorageError`] if there is an underlying storage error.
    fn read_byte_range(&self, byte_range: ByteRange) -> Result<Bytes, StorageError> {
        self.read_at(byte_range.offset(), byte_range.length())
    }

    /// Read `out.len()` bytes starting at `offset` directly into `out`.
    ///
    /// The default implementation copies from [`read_at`](ReadableStorageTraits::read_at).
    ///
    /// # Errors
    /// Returns a [`StorageError`] if there is an underlying storage error.
    fn read_at_into(&self, offset: ByteOffset, out: &mut [u8]) -> Result<(), StorageError> {
        let bytes = self.read_at(offset, out.len() as u64)?;
        if bytes.len() != out.len() {
            return Err(InvalidByteRangeError::new(
                ByteRange::new_with_offset_length(offset, out.len() as u64),
                offset + bytes.len() as u64,
            )
            .into());
        }
        out.copy_from_slice(&bytes);
        Ok(())
    }
}

/// [`Arc`] wrapped readable storage.
pub type ReadableStorage = Arc<dyn ReadableStorageTraits>;
