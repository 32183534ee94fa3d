//! A storage adapter which records performance metrics.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::byte_range::{ByteLength, ByteOffset};
use crate::{Bytes, ReadableStorageTraits, StorageError};

/// A byte source adapter counting the reads issued to the wrapped byte source and the bytes they return.
///
/// Tests use it to check that a section read touches only the bytes it needs.
///
/// ### Example
/// ```rust
/// # use std::sync::Arc;
/// # use sectio_storage::store::MemoryStore;
/// # use sectio_storage::ReadableStorageTraits;
/// # use sectio_storage::storage_adapter::performance_metrics::PerformanceMetricsStorageAdapter;
/// let store = Arc::new(MemoryStore::new(vec![0u8; 16]));
/// let store = PerformanceMetricsStorageAdapter::new(store);
/// store.read_at(4, 8).unwrap();
/// assert_eq!(store.bytes_read(), 8);
/// assert_eq!(store.reads(), 1);
/// ```
#[derive(Debug)]
pub struct PerformanceMetricsStorageAdapter<TStorage: ?Sized> {
    storage: Arc<TStorage>,
    bytes_read: AtomicUsize,
    reads: AtomicUsize,
}

impl<TStorage: ?Sized> PerformanceMetricsStorageAdapter<TStorage> {
    /// Create a new performance metrics storage adapter.
    #[must_use]
    pub fn new(storage: Arc<TStorage>) -> Self {
        Self {
            storage,
            bytes_read: AtomicUsize::default(),
            reads: AtomicUsize::default(),
        }
    }

    /// Zero the read and byte counters.
    pub fn reset(&self) {
        self.bytes_read.store(0, Ordering::Relaxed);
        self.reads.store(0, Ordering::Relaxed);
    }

    /// Returns the number of bytes returned by the byte source.
    pub fn bytes_read(&self) -> usize {
        self.bytes_read.load(Ordering::Relaxed)
    }

    /// Returns the number of reads issued to the byte source.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }
}

impl<TStorage: ?Sized + ReadableStorageTraits> ReadableStorageTraits
    for PerformanceMetricsStorageAdapter<TStorage>
{
    fn read_at(&self, offset: ByteOffset, length: ByteLength) -> Result<Bytes, StorageError> {
        let value = self.storage.read_at(offset, length);
        let bytes_read = value.as_ref().map_or(0, Bytes::len);
        self.bytes_read.fetch_add(bytes_read, Ordering::Relaxed);
        self.reads.fetch_add(1, Ordering::Relaxed);
        value
    }

    fn size(&self) -> Result<u64, StorageError> {
        self.storage.size()
    }

    fn read_at_into(&self, offset: ByteOffset, out: &mut [u8]) -> Result<(), StorageError> {
        self.storage.read_at_into(offset, out)?;
        self.bytes_read.fetch_add(out.len(), Ordering::Relaxed);
        self.reads.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
