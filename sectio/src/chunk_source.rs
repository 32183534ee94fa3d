//! Chunk retrieval and decoding.

use std::io::{Cursor, Read};

use sectio_codec::Codec;
use sectio_storage::{byte_range::ByteRange, Bytes, ReadableStorageTraits};

use crate::descriptor::{ChunkData, CompressedChunk};
use crate::{ReadError, ReadOptions, SegmentStream};

/// The location of a chunk.
#[derive(Copy, Clone, Debug)]
pub enum ChunkLocator<'a> {
    /// An uncompressed chunk at a byte range.
    Direct(ByteRange),
    /// A compressed chunk.
    Compressed(&'a CompressedChunk),
}

/// Fetches whole chunks from a byte source.
///
/// Compressed chunks are decoded in full, compressed streams cannot be addressed randomly.
pub struct ChunkSource<'a, TStorage: ?Sized> {
    storage: &'a TStorage,
    options: &'a ReadOptions,
}

impl<'a, TStorage: ?Sized + ReadableStorageTraits> ChunkSource<'a, TStorage> {
    /// Create a new chunk source.
    #[must_use]
    pub fn new(storage: &'a TStorage, options: &'a ReadOptions) -> Self {
        Self { storage, options }
    }

    /// Fetch the bytes of a chunk.
    ///
    /// A compressed chunk is decoded to exactly its declared uncompressed length.
    ///
    /// # Errors
    /// Returns
    ///  - [`ReadError::StorageError`] if the byte source fails,
    ///  - [`ReadError::UnsupportedCodec`] if the chunk codec is not supported, or
    ///  - [`ReadError::CorruptChunk`] if the chunk is malformed, its decoded length differs from the declared length,
    ///    or the declared length exceeds [`ReadOptions::max_decoded_chunk_size`].
    pub fn fetch(&self, locator: ChunkLocator<'a>) -> Result<Bytes, ReadError> {
        match locator {
            ChunkLocator::Direct(byte_range) => Ok(self.storage.read_byte_range(byte_range)?),
            ChunkLocator::Compressed(chunk) => self.decode(chunk),
        }
    }

    fn decode(&self, chunk: &'a CompressedChunk) -> Result<Bytes, ReadError> {
        let expected = chunk.uncompressed_length;
        check_decoded_size(expected, self.options)?;
        let codec = Codec::from_id(chunk.codec)?;
        let encoded: Box<dyn Read + Send + 'a> = match &chunk.data {
            ChunkData::Contiguous(byte_range) => {
                Box::new(Cursor::new(self.storage.read_byte_range(*byte_range)?))
            }
            ChunkData::Linked(segments) => {
                Box::new(SegmentStream::new(self.storage, segments, self.options))
            }
        };

        // Read at most one byte past the declared length to detect oversized chunks
        let mut decoded = Vec::with_capacity(usize::try_from(expected).unwrap_or_default());
        codec
            .decoder(encoded)
            .take(expected + 1)
            .read_to_end(&mut decoded)
            .map_err(ReadError::from_decode_io)?;
        if decoded.len() as u64 != expected {
            return Err(ReadError::CorruptChunk(format!(
                "decoded chunk has length {}, expected {expected}",
                decoded.len()
            )));
        }
        Ok(Bytes::from(decoded))
    }
}

/// Reject a declared decoded size above the configured maximum.
pub(crate) fn check_decoded_size(
    uncompressed_length: u64,
    options: &ReadOptions,
) -> Result<(), ReadError> {
    if uncompressed_length > options.max_decoded_chunk_size() {
        Err(ReadError::CorruptChunk(format!(
            "declared uncompressed length {uncompressed_length} exceeds the maximum decoded chunk size {}",
            options.max_decoded_chunk_size()
        )))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use sectio_codec::CodecId;
    use sectio_storage::store::MemoryStore;

    use super::*;

    fn compress(bytes: &[u8]) -> Vec<u8> {
        let mut encoder =
            flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(bytes).unwrap();
        encoder.finish().unwrap()
    }

    fn chunk(data: ChunkData, uncompressed_length: u64, codec: CodecId) -> CompressedChunk {
        CompressedChunk {
            data,
            uncompressed_length,
            codec,
        }
    }

    #[test]
    fn chunk_source_direct() {
        let store = MemoryStore::new((0..32).collect::<Vec<u8>>());
        let options = ReadOptions::default();
        let source = ChunkSource::new(&store, &options);
        let bytes = source
            .fetch(ChunkLocator::Direct(ByteRange::new(4..8)))
            .unwrap();
        assert_eq!(bytes.as_ref(), &[4, 5, 6, 7]);
        assert!(matches!(
            source.fetch(ChunkLocator::Direct(ByteRange::new(30..40))),
            Err(ReadError::StorageError(_))
        ));
    }

    #[test]
    fn chunk_source_deflate() {
        let decoded: Vec<u8> = (0..64).collect();
        let encoded = compress(&decoded);
        let length = encoded.len() as u64;
        let store = MemoryStore::new(encoded);
        let options = ReadOptions::default();
        let source = ChunkSource::new(&store, &options);

        let ok = chunk(
            ChunkData::Contiguous(ByteRange::new(0..length)),
            64,
            CodecId::DEFLATE,
        );
        assert_eq!(
            source.fetch(ChunkLocator::Compressed(&ok)).unwrap().as_ref(),
            decoded.as_slice()
        );

        // the same chunk split over linked segments
        let split = length / 2;
        let linked = chunk(
            ChunkData::Linked(vec![
                ByteRange::new(0..split),
                ByteRange::new(split..split),
                ByteRange::new(split..length),
            ]),
            64,
            CodecId::DEFLATE,
        );
        assert_eq!(
            source
                .fetch(ChunkLocator::Compressed(&linked))
                .unwrap()
                .as_ref(),
            decoded.as_slice()
        );
    }

    #[test]
    fn chunk_source_length_mismatch() {
        let encoded = compress(&[7u8; 63]);
        let length = encoded.len() as u64;
        let store = MemoryStore::new(encoded);
        let options = ReadOptions::default();
        let source = ChunkSource::new(&store, &options);
        for declared in [64, 62] {
            let corrupt = chunk(
                ChunkData::Contiguous(ByteRange::new(0..length)),
                declared,
                CodecId::DEFLATE,
            );
            assert!(matches!(
                source.fetch(ChunkLocator::Compressed(&corrupt)),
                Err(ReadError::CorruptChunk(_))
            ));
        }
    }

    #[test]
    fn chunk_source_none_codec() {
        let store = MemoryStore::new((0..16).collect::<Vec<u8>>());
        let options = ReadOptions::default();
        let source = ChunkSource::new(&store, &options);
        let stored = chunk(
            ChunkData::Contiguous(ByteRange::new(8..16)),
            8,
            CodecId::NONE,
        );
        assert_eq!(
            source
                .fetch(ChunkLocator::Compressed(&stored))
                .unwrap()
                .as_ref(),
            &[8, 9, 10, 11, 12, 13, 14, 15]
        );
        let short = chunk(
            ChunkData::Contiguous(ByteRange::new(8..16)),
            9,
            CodecId::NONE,
        );
        assert!(matches!(
            source.fetch(ChunkLocator::Compressed(&short)),
            Err(ReadError::CorruptChunk(_))
        ));
    }

    #[test]
    fn chunk_source_errors() {
        let store = MemoryStore::new(vec![0u8; 16]);
        let options = ReadOptions::default().with_max_decoded_chunk_size(32);
        let source = ChunkSource::new(&store, &options);
        let unsupported = chunk(
            ChunkData::Contiguous(ByteRange::new(0..16)),
            16,
            CodecId(3),
        );
        assert!(matches!(
            source.fetch(ChunkLocator::Compressed(&unsupported)),
            Err(ReadError::UnsupportedCodec(CodecId(3)))
        ));
        let oversized = chunk(
            ChunkData::Contiguous(ByteRange::new(0..16)),
            33,
            CodecId::NONE,
        );
        assert!(matches!(
            source.fetch(ChunkLocator::Compressed(&oversized)),
            Err(ReadError::CorruptChunk(_))
        ));
        let malformed = chunk(
            ChunkData::Contiguous(ByteRange::new(0..16)),
            16,
            CodecId::DEFLATE,
        );
        assert!(matches!(
            source.fetch(ChunkLocator::Compressed(&malformed)),
            Err(ReadError::CorruptChunk(_))
        ));
    }
}
