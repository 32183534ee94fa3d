//! The `none` bytes to bytes codec.
//!
//! Passes the encoded bytes through unchanged.
//! Chunks stored with this codec are still length checked against their declared uncompressed length.

use std::io::Read;
use std::sync::Arc;

use crate::{BytesToBytesCodecTraits, Codec, CodecError, CodecId, CodecPlugin, CodecTraitsId};

// Register the codec.
inventory::submit! {
    CodecPlugin::new::<NoneCodec>()
}

/// A `none` codec implementation.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoneCodec;

impl NoneCodec {
    /// Create a new `none` codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl CodecTraitsId for NoneCodec {
    fn matches_id(id: CodecId) -> bool {
        id == CodecId::NONE
    }

    fn create(_id: CodecId) -> Result<Codec, CodecError> {
        Ok(Codec::new(Arc::new(Self::new())))
    }
}

impl BytesToBytesCodecTraits for NoneCodec {
    fn id(&self) -> CodecId {
        CodecId::NONE
    }

    fn decoder<'a>(&self, encoded: Box<dyn Read + Send + 'a>) -> Box<dyn Read + Send + 'a> {
        encoded
    }

    fn decode(&self, encoded: &[u8]) -> Result<Vec<u8>, CodecError> {
        Ok(encoded.to_vec())
    }
}
