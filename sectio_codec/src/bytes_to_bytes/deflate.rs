//! The `deflate` bytes to bytes codec.
//!
//! Decodes a zlib wrapped deflate stream (RFC 1950) with [`flate2`].

use std::io::Read;
use std::sync::Arc;

use crate::{BytesToBytesCodecTraits, Codec, CodecError, CodecId, CodecPlugin, CodecTraitsId};

// Register the codec.
inventory::submit! {
    CodecPlugin::new::<DeflateCodec>()
}

/// A `deflate` codec implementation.
#[derive(Clone, Copy, Debug, Default)]
pub struct DeflateCodec;

impl DeflateCodec {
    /// Create a new `deflate` codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl CodecTraitsId for DeflateCodec {
    fn matches_id(id: CodecId) -> bool {
        id == CodecId::DEFLATE
    }

    fn create(_id: CodecId) -> Result<Codec, CodecError> {
        Ok(Codec::new(Arc::new(Self::new())))
    }
}

impl BytesToBytesCodecTraits for DeflateCodec {
    fn id(&self) -> CodecId {
        CodecId::DEFLATE
    }

    fn decoder<'a>(&self, encoded: Box<dyn Read + Send + 'a>) -> Box<dyn Read + Send + 'a> {
        Box::new(flate2::read::ZlibDecoder::new(encoded))
    }
}
