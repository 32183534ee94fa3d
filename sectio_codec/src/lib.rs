//! The codec API for the `sectio` crate.
//!
//! Chunks and segment streams may be compressed with a bytes to bytes codec identified by a numeric [`CodecId`].
//! Codecs are registered at compile time with the [`inventory`](https://docs.rs/inventory/latest/inventory/) crate
//! through a [`CodecPlugin`] and created at runtime with [`Codec::from_id`].
//!
//! Decoding is sequential and single pass: [`BytesToBytesCodecTraits::decoder`] wraps any [`Read`] with a decompression stream.
//!
//! ## Licence
//! `sectio_codec` is licensed under either of
//!  - the Apache License, Version 2.0 <http://www.apache.org/licenses/LICENSE-2.0> or
//!  - the MIT license <http://opensource.org/licenses/MIT>, at your option.

pub mod bytes_to_bytes;

use std::fmt::Debug;
use std::io::Read;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use bytes_to_bytes::deflate::DeflateCodec;
pub use bytes_to_bytes::none::NoneCodec;

/// A numeric codec identifier.
#[derive(
    Copy,
    Clone,
    Debug,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::From,
)]
#[serde(transparent)]
#[display("{_0}")]
pub struct CodecId(pub u32);

impl CodecId {
    /// No compression.
    pub const NONE: Self = Self(0);
    /// Zlib wrapped deflate.
    pub const DEFLATE: Self = Self(4);
}

/// A codec error.
#[derive(Clone, Debug, Error)]
#[non_exhaustive]
pub enum CodecError {
    /// An IO error, including malformed compressed streams.
    #[error(transparent)]
    IOError(#[from] Arc<std::io::Error>),
    /// The codec identifier is not associated with a registered codec.
    #[error("codec {_0} is not supported")]
    UnsupportedCodec(CodecId),
    /// Other
    #[error("{_0}")]
    Other(String),
}

impl From<std::io::Error> for CodecError {
    fn from(err: std::io::Error) -> Self {
        Self::IOError(Arc::new(err))
    }
}

impl From<&str> for CodecError {
    fn from(err: &str) -> Self {
        Self::Other(err.to_string())
    }
}

impl From<String> for CodecError {
    fn from(err: String) -> Self {
        Self::Other(err)
    }
}

/// Traits for bytes to bytes codecs.
pub trait BytesToBytesCodecTraits: Debug + Send + Sync {
    /// Return the codec identifier.
    fn id(&self) -> CodecId;

    /// Wrap `encoded` in a stream producing the decoded bytes.
    ///
    /// Errors in the encoded stream surface as [`std::io::Error`]s when reading from the returned stream.
    fn decoder<'a>(&self, encoded: Box<dyn Read + Send + 'a>) -> Box<dyn Read + Send + 'a>;

    /// Decode `encoded` to completion.
    ///
    /// # Errors
    /// Returns [`CodecError`] if the encoded bytes are malformed.
    fn decode(&self, encoded: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut decoded = Vec::with_capacity(encoded.len());
        self.decoder(Box::new(encoded)).read_to_end(&mut decoded)?;
        Ok(decoded)
    }
}

/// A bytes to bytes codec.
#[derive(Clone, Debug, derive_more::Deref)]
pub struct Codec(Arc<dyn BytesToBytesCodecTraits>);

impl Codec {
    /// Create a codec from a codec implementation.
    #[must_use]
    pub fn new(codec: Arc<dyn BytesToBytesCodecTraits>) -> Self {
        Self(codec)
    }

    /// Create a codec from its identifier.
    ///
    /// # Errors
    /// Returns [`CodecError::UnsupportedCodec`] if `id` is not associated with a registered codec plugin.
    pub fn from_id(id: CodecId) -> Result<Self, CodecError> {
        for plugin in inventory::iter::<CodecPlugin> {
            if plugin.match_id(id) {
                return plugin.create(id);
            }
        }
        Err(CodecError::UnsupportedCodec(id))
    }
}

/// Codec identification and creation for plugin registration.
pub trait CodecTraitsId {
    /// Returns true if `id` identifies this codec.
    fn matches_id(id: CodecId) -> bool;

    /// Create the codec.
    ///
    /// # Errors
    /// Returns [`CodecError`] if the codec cannot be created for `id`.
    fn create(id: CodecId) -> Result<Codec, CodecError>;
}

/// A codec plugin.
pub struct CodecPlugin {
    /// Tests if the identifier is a match for this plugin.
    match_id_fn: fn(id: CodecId) -> bool,
    /// Create an implementation of this plugin.
    create_fn: fn(id: CodecId) -> Result<Codec, CodecError>,
}
inventory::collect!(CodecPlugin);

impl CodecPlugin {
    /// Create a new [`CodecPlugin`] for a type implementing [`CodecTraitsId`].
    #[must_use]
    pub const fn new<T: CodecTraitsId>() -> Self {
        Self {
            match_id_fn: T::matches_id,
            create_fn: T::create,
        }
    }

    /// Returns true if this plugin is associated with `id`.
    #[must_use]
    pub fn match_id(&self, id: CodecId) -> bool {
        (self.match_id_fn)(id)
    }

    /// Create a [`Codec`] for `id`.
    ///
    /// # Errors
    /// Returns [`CodecError`] if plugin creation fails.
    pub fn create(&self, id: CodecId) -> Result<Codec, CodecError> {
        (self.create_fn)(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_id() {
        assert_eq!(CodecId::from(4), CodecId::DEFLATE);
        assert_eq!(CodecId::NONE.to_string(), "0");
        assert_eq!(serde_json::to_string(&CodecId::DEFLATE).unwrap(), "4");
        assert_eq!(serde_json::from_str::<CodecId>("0").unwrap(), CodecId::NONE);
    }

    #[test]
    fn codec_from_id() {
        assert_eq!(Codec::from_id(CodecId::NONE).unwrap().id(), CodecId::NONE);
        assert_eq!(
            Codec::from_id(CodecId::DEFLATE).unwrap().id(),
            CodecId::DEFLATE
        );
        assert!(matches!(
            Codec::from_id(CodecId(2)),
            Err(CodecError::UnsupportedCodec(CodecId(2)))
        ));
    }
}
