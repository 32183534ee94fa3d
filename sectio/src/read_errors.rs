use sectio_codec::{CodecError, CodecId};
use sectio_section::SectionError;
use sectio_storage::StorageError;
use thiserror::Error;

use crate::descriptor::StorageDescriptorCreateError;
use crate::record::RecordLayoutError;

/// A section read error.
///
/// A failed read leaves the destination buffer in an unspecified state.
#[derive(Clone, Debug, Error)]
#[non_exhaustive]
pub enum ReadError {
    /// The section does not match the variable rank or selects elements outside the variable shape.
    #[error(transparent)]
    InvalidSection(#[from] SectionError),
    /// The byte source failed.
    #[error(transparent)]
    StorageError(#[from] StorageError),
    /// A compressed chunk or stream is malformed or decodes to an unexpected length.
    #[error("corrupt chunk: {_0}")]
    CorruptChunk(String),
    /// The storage descriptor references a codec that is not supported.
    #[error("codec {_0} is not supported")]
    UnsupportedCodec(CodecId),
    /// A record layout is inconsistent with itself or with the storage descriptor.
    #[error(transparent)]
    CorruptStructureLayout(#[from] RecordLayoutError),
    /// The destination buffer does not have the size of the section.
    #[error("got destination buffer with size {_0}, expected {_1}")]
    InvalidDestinationSize(usize, u64),
    /// A storage descriptor could not be created.
    #[error(transparent)]
    InvalidDescriptor(#[from] StorageDescriptorCreateError),
}

impl From<CodecError> for ReadError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::UnsupportedCodec(id) => Self::UnsupportedCodec(id),
            err => Self::CorruptChunk(err.to_string()),
        }
    }
}

impl ReadError {
    /// Map an IO error raised while reading a decoded stream.
    ///
    /// Byte source failures surface as [`ReadError::StorageError`], everything else indicates a corrupt stream.
    pub(crate) fn from_decode_io(err: std::io::Error) -> Self {
        if let Some(storage_error) = err
            .get_ref()
            .and_then(|inner| inner.downcast_ref::<StorageError>())
        {
            Self::StorageError(storage_error.clone())
        } else if err.kind() == std::io::ErrorKind::UnexpectedEof {
            Self::CorruptChunk("the decoded stream ended prematurely".to_string())
        } else {
            Self::CorruptChunk(err.to_string())
        }
    }
}
