//! The byte source API for the `sectio` crate.
//!
//! A byte source is anything that can serve positioned range reads: a local file, an in-memory image of a file, or a remote object fetched by range.
//! The section reader never writes, appends, or lists; it only issues [`ReadableStorageTraits::read_at`] calls.
//!
//! This crate includes an in-memory byte source ([`store::MemoryStore`]), a file byte source ([`store::FileStore`]),
//! and an instrumentation adapter ([`storage_adapter::performance_metrics::PerformanceMetricsStorageAdapter`]).
//!
//! ## Licence
//! `sectio_storage` is licensed under either of
//! - the Apache License, Version 2.0 <http://www.apache.org/licenses/LICENSE-2.0> or
//! - the MIT license <http://opensource.org/licenses/MIT>, at your option.

pub mod byte_range;
pub mod storage_adapter;
mod storage_sync;
pub mod store;

use std::sync::Arc;

use thiserror::Error;

use byte_range::InvalidByteRangeError;

pub use self::storage_sync::{ReadableStorage, ReadableStorageTraits};

/// The type for bytes returned by byte source reads.
///
/// An alias for [`bytes::Bytes`].
pub type Bytes = bytes::Bytes;

/// A storage error.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// An IO error.
    #[error(transparent)]
    IOError(#[from] Arc<std::io::Error>),
    /// An invalid byte range.
    #[error("invalid byte range {0}")]
    InvalidByteRangeError(#[from] InvalidByteRangeError),
    /// Any other error.
    #[error("{0}")]
    Other(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        Self::IOError(Arc::new(err))
    }
}

impl From<&str> for StorageError {
    fn from(err: &str) -> Self {
        Self::Other(err.to_string())
    }
}

impl From<String> for StorageError {
    fn from(err: String) -> Self {
        Self::Other(err)
    }
}
