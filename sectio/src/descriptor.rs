//! Storage descriptors.
//!
//! A [`StorageDescriptor`] describes where and how the elements of one variable are physically stored.
//! Descriptors are produced by a metadata layer, validated on construction, and immutable afterwards.

use std::collections::BTreeMap;

use sectio_codec::CodecId;
use sectio_section::{
    ArrayIndices, ArrayShape, ChunkShape, IncompatibleDimensionalityError, RegularChunkGrid,
};
use sectio_storage::byte_range::ByteRange;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::FillValue;

/// A mapping from chunk origins to chunk locations.
pub type ChunkMap<T> = BTreeMap<ArrayIndices, T>;

/// The physical location of the encoded bytes of a compressed chunk.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkData {
    /// One contiguous byte range.
    Contiguous(ByteRange),
    /// A chain of segments forming one logical byte stream.
    Linked(Vec<ByteRange>),
}

impl ChunkData {
    /// Return the total encoded length.
    #[must_use]
    pub fn encoded_length(&self) -> u64 {
        match self {
            Self::Contiguous(byte_range) => byte_range.length(),
            Self::Linked(segments) => segments.iter().map(ByteRange::length).sum(),
        }
    }
}

/// A compressed chunk.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressedChunk {
    /// The encoded bytes.
    pub data: ChunkData,
    /// The declared length of the decoded chunk in bytes.
    pub uncompressed_length: u64,
    /// The codec.
    pub codec: CodecId,
}

/// The storage layout of a variable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StorageLayout {
    /// The variable has no physical data, every element is the fill value.
    NoData,
    /// One contiguous extent starting at `base_offset`.
    Regular {
        /// The byte offset of the first element.
        base_offset: u64,
    },
    /// One compressed contiguous extent.
    Compressed {
        /// The encoded bytes.
        data: ByteRange,
        /// The length of the decoded variable in bytes.
        uncompressed_length: u64,
        /// The codec.
        codec: CodecId,
    },
    /// A chain of segments forming one logical byte stream.
    ///
    /// Zero length segments are permitted and skipped.
    Segmented {
        /// The segments in stream order.
        segments: Vec<ByteRange>,
    },
    /// Uncompressed chunks on a regular grid.
    ///
    /// Chunks absent from `chunks` read as the fill value.
    Tiled {
        /// The declared chunk shape.
        chunk_shape: ChunkShape,
        /// The byte range of each stored chunk, keyed by chunk origin.
        #[serde(with = "chunk_map")]
        chunks: ChunkMap<ByteRange>,
    },
    /// Individually compressed chunks on a regular grid.
    ///
    /// Chunks absent from `chunks` read as the fill value.
    CompressedTiled {
        /// The declared chunk shape.
        chunk_shape: ChunkShape,
        /// Each stored chunk, keyed by chunk origin.
        #[serde(with = "chunk_map")]
        chunks: ChunkMap<CompressedChunk>,
    },
    /// A chain of segments forming one compressed logical byte stream.
    CompressedSegmented {
        /// The segments in stream order.
        segments: Vec<ByteRange>,
        /// The codec.
        codec: CodecId,
        /// The length of the decoded variable in bytes.
        uncompressed_length: u64,
    },
}

impl StorageLayout {
    /// Return the name of the layout kind.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::NoData => "no_data",
            Self::Regular { .. } => "regular",
            Self::Compressed { .. } => "compressed",
            Self::Segmented { .. } => "segmented",
            Self::Tiled { .. } => "tiled",
            Self::CompressedTiled { .. } => "compressed_tiled",
            Self::CompressedSegmented { .. } => "compressed_segmented",
        }
    }

    /// Returns true if elements can be addressed individually in the byte source.
    ///
    /// This is the case for regular and uncompressed tiled layouts, and trivially for variables without data.
    #[must_use]
    pub fn is_directly_addressable(&self) -> bool {
        matches!(self, Self::NoData | Self::Regular { .. } | Self::Tiled { .. })
    }
}

/// Chunk maps are persisted as sequences of `(origin, chunk)` pairs.
mod chunk_map {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::ChunkMap;

    pub(super) fn serialize<S, T>(chunks: &ChunkMap<T>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: Serialize,
    {
        serializer.collect_seq(chunks)
    }

    pub(super) fn deserialize<'de, D, T>(deserializer: D) -> Result<ChunkMap<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        let chunks = Vec::<(Vec<u64>, T)>::deserialize(deserializer)?;
        Ok(chunks.into_iter().collect())
    }
}

/// A storage descriptor creation error.
#[derive(Clone, Debug, Error)]
#[non_exhaustive]
pub enum StorageDescriptorCreateError {
    /// The element size is zero.
    #[error("the element size must be non-zero")]
    ZeroElementSize,
    /// The fill value size does not match the element size.
    #[error("fill value has size {_0}, expected the element size {_1}")]
    InvalidFillValue(usize, usize),
    /// The size of the variable in bytes overflows.
    #[error("the variable with shape {_0:?} and element size {_1} is too large")]
    VariableTooLarge(ArrayShape, usize),
    /// The chunk shape dimensionality does not match the variable.
    #[error(transparent)]
    IncompatibleDimensionality(#[from] IncompatibleDimensionalityError),
    /// A chunk origin is not on the chunk grid or is outside the variable.
    #[error("{_0:?} is not a chunk origin of the chunk grid")]
    InvalidChunkOrigin(ArrayIndices),
    /// An uncompressed chunk byte range does not hold exactly one chunk.
    #[error("chunk {_0:?} has length {_1}, expected {_2}")]
    InvalidChunkLength(ArrayIndices, u64, u64),
    /// A declared uncompressed length does not match the size of the data it decodes to.
    #[error("declared uncompressed length {_0} does not match the expected length {_1}")]
    InvalidUncompressedLength(u64, u64),
    /// A byte range ends past the largest addressable byte offset.
    #[error(
        "byte range at offset {} with length {} ends past the largest byte offset",
        _0.offset(),
        _0.length()
    )]
    ByteRangeOverflow(ByteRange),
    /// The total length of a segment chain overflows.
    #[error("the total length of a chain of {_0} segments overflows")]
    SegmentChainOverflow(usize),
}

/// Check that every byte range of a segment chain ends within the addressable range, and so does the chain.
fn check_segments(segments: &[ByteRange]) -> Result<(), StorageDescriptorCreateError> {
    let mut length: u64 = 0;
    for byte_range in segments {
        check_byte_range(*byte_range)?;
        length = length
            .checked_add(byte_range.length())
            .ok_or(StorageDescriptorCreateError::SegmentChainOverflow(segments.len()))?;
    }
    Ok(())
}

fn check_byte_range(byte_range: ByteRange) -> Result<(), StorageDescriptorCreateError> {
    match byte_range.checked_end() {
        Some(_) => Ok(()),
        None => Err(StorageDescriptorCreateError::ByteRangeOverflow(byte_range)),
    }
}

/// A storage descriptor.
///
/// The physical layout of one variable: its shape, element size, fill value, and [`StorageLayout`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StorageDescriptorMetadata")]
pub struct StorageDescriptor {
    variable_shape: ArrayShape,
    element_size: usize,
    fill_value: Option<FillValue>,
    layout: StorageLayout,
}

#[derive(Deserialize)]
struct StorageDescriptorMetadata {
    variable_shape: ArrayShape,
    element_size: usize,
    fill_value: Option<FillValue>,
    layout: StorageLayout,
}

impl TryFrom<StorageDescriptorMetadata> for StorageDescriptor {
    type Error = StorageDescriptorCreateError;

    fn try_from(metadata: StorageDescriptorMetadata) -> Result<Self, Self::Error> {
        Self::new(
            metadata.variable_shape,
            metadata.element_size,
            metadata.fill_value,
            metadata.layout,
        )
    }
}

impl StorageDescriptor {
    /// Create a new storage descriptor.
    ///
    /// # Errors
    /// Returns [`StorageDescriptorCreateError`] if
    ///  - `element_size` is zero or does not match the fill value size,
    ///  - a chunk shape does not match the dimensionality of `variable_shape`,
    ///  - a chunk origin is not on the chunk grid or is outside the variable,
    ///  - an uncompressed chunk does not hold exactly one declared chunk,
    ///  - a declared uncompressed length does not match the size of the decoded chunk or variable, or
    ///  - a byte range, the regular extent, or the total length of a segment chain ends past [`u64::MAX`].
    pub fn new(
        variable_shape: ArrayShape,
        element_size: usize,
        fill_value: Option<FillValue>,
        layout: StorageLayout,
    ) -> Result<Self, StorageDescriptorCreateError> {
        if element_size == 0 {
            return Err(StorageDescriptorCreateError::ZeroElementSize);
        }
        if let Some(fill_value) = &fill_value {
            if fill_value.size() != element_size {
                return Err(StorageDescriptorCreateError::InvalidFillValue(
                    fill_value.size(),
                    element_size,
                ));
            }
        }
        let too_large =
            || StorageDescriptorCreateError::VariableTooLarge(variable_shape.clone(), element_size);
        let element_size_u64 = element_size as u64;
        let variable_bytes = variable_shape
            .iter()
            .try_fold(element_size_u64, |acc, &s| acc.checked_mul(s))
            .ok_or_else(too_large)?;

        match &layout {
            StorageLayout::NoData => {}
            StorageLayout::Regular { base_offset } => {
                check_byte_range(ByteRange::new_with_offset_length(*base_offset, variable_bytes))?;
            }
            StorageLayout::Segmented { segments } => check_segments(segments)?,
            StorageLayout::Compressed {
                data: byte_range,
                uncompressed_length,
                ..
            } => {
                check_byte_range(*byte_range)?;
                if *uncompressed_length != variable_bytes {
                    return Err(StorageDescriptorCreateError::InvalidUncompressedLength(
                        *uncompressed_length,
                        variable_bytes,
                    ));
                }
            }
            StorageLayout::CompressedSegmented {
                segments,
                uncompressed_length,
                ..
            } => {
                check_segments(segments)?;
                if *uncompressed_length != variable_bytes {
                    return Err(StorageDescriptorCreateError::InvalidUncompressedLength(
                        *uncompressed_length,
                        variable_bytes,
                    ));
                }
            }
            StorageLayout::Tiled {
                chunk_shape,
                chunks,
            } => {
                let grid = RegularChunkGrid::new(variable_shape.clone(), chunk_shape.clone())?;
                let chunk_bytes = grid
                    .chunk_num_elements()
                    .checked_mul(element_size_u64)
                    .ok_or_else(too_large)?;
                for (origin, byte_range) in chunks {
                    if !grid.is_chunk_origin(origin) {
                        return Err(StorageDescriptorCreateError::InvalidChunkOrigin(
                            origin.clone(),
                        ));
                    }
                    check_byte_range(*byte_range)?;
                    if byte_range.length() != chunk_bytes {
                        return Err(StorageDescriptorCreateError::InvalidChunkLength(
                            origin.clone(),
                            byte_range.length(),
                            chunk_bytes,
                        ));
                    }
                }
            }
            StorageLayout::CompressedTiled {
                chunk_shape,
                chunks,
            } => {
                let grid = RegularChunkGrid::new(variable_shape.clone(), chunk_shape.clone())?;
                let chunk_bytes = grid
                    .chunk_num_elements()
                    .checked_mul(element_size_u64)
                    .ok_or_else(too_large)?;
                for (origin, chunk) in chunks {
                    if !grid.is_chunk_origin(origin) {
                        return Err(StorageDescriptorCreateError::InvalidChunkOrigin(
                            origin.clone(),
                        ));
                    }
                    match &chunk.data {
                        ChunkData::Contiguous(byte_range) => check_byte_range(*byte_range)?,
                        ChunkData::Linked(segments) => check_segments(segments)?,
                    }
                    if chunk.uncompressed_length != chunk_bytes {
                        return Err(StorageDescriptorCreateError::InvalidUncompressedLength(
                            chunk.uncompressed_length,
                            chunk_bytes,
                        ));
                    }
                }
            }
        }

        Ok(Self {
            variable_shape,
            element_size,
            fill_value,
            layout,
        })
    }

    /// Return the variable shape.
    #[must_use]
    pub fn variable_shape(&self) -> &[u64] {
        &self.variable_shape
    }

    /// Return the size of one element in bytes.
    #[must_use]
    pub fn element_size(&self) -> usize {
        self.element_size
    }

    /// Return the fill value, if declared.
    #[must_use]
    pub fn fill_value(&self) -> Option<&FillValue> {
        self.fill_value.as_ref()
    }

    /// Return the storage layout.
    #[must_use]
    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    /// Return the number of elements in the variable.
    #[must_use]
    pub fn num_elements(&self) -> u64 {
        self.variable_shape.iter().product()
    }

    /// Return the chunk grid of a tiled layout.
    #[must_use]
    pub fn chunk_grid(&self) -> Option<RegularChunkGrid> {
        match &self.layout {
            StorageLayout::Tiled { chunk_shape, .. }
            | StorageLayout::CompressedTiled { chunk_shape, .. } => {
                RegularChunkGrid::new(self.variable_shape.clone(), chunk_shape.clone()).ok()
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU64;

    use super::*;

    fn chunk_shape(shape: &[u64]) -> ChunkShape {
        shape.iter().map(|&c| NonZeroU64::new(c).unwrap()).collect()
    }

    #[test]
    fn descriptor_regular() {
        let descriptor = StorageDescriptor::new(
            vec![4, 4],
            2,
            Some(FillValue::from([0xffu8, 0xff])),
            StorageLayout::Regular { base_offset: 16 },
        )
        .unwrap();
        assert_eq!(descriptor.variable_shape(), &[4, 4]);
        assert_eq!(descriptor.element_size(), 2);
        assert_eq!(descriptor.num_elements(), 16);
        assert_eq!(descriptor.layout().name(), "regular");
        assert!(descriptor.chunk_grid().is_none());
    }

    #[test]
    fn descriptor_invalid() {
        assert!(matches!(
            StorageDescriptor::new(vec![4], 0, None, StorageLayout::NoData),
            Err(StorageDescriptorCreateError::ZeroElementSize)
        ));
        assert!(matches!(
            StorageDescriptor::new(vec![4], 2, Some(FillValue::from([0u8])), StorageLayout::NoData),
            Err(StorageDescriptorCreateError::InvalidFillValue(1, 2))
        ));
        assert!(matches!(
            StorageDescriptor::new(vec![u64::MAX, 2], 1, None, StorageLayout::NoData),
            Err(StorageDescriptorCreateError::VariableTooLarge(..))
        ));
        assert!(matches!(
            StorageDescriptor::new(
                vec![4, 4],
                1,
                None,
                StorageLayout::Compressed {
                    data: ByteRange::new(0..10),
                    uncompressed_length: 15,
                    codec: CodecId::DEFLATE,
                }
            ),
            Err(StorageDescriptorCreateError::InvalidUncompressedLength(15, 16))
        ));
    }

    #[test]
    fn descriptor_byte_range_overflow() {
        let near_end = ByteRange::new_with_offset_length(u64::MAX - 1, 4);
        assert!(matches!(
            StorageDescriptor::new(
                vec![4],
                1,
                None,
                StorageLayout::Tiled {
                    chunk_shape: chunk_shape(&[2]),
                    chunks: ChunkMap::from([(vec![2], near_end)]),
                }
            ),
            Err(StorageDescriptorCreateError::ByteRangeOverflow(byte_range)) if byte_range == near_end
        ));
        assert!(matches!(
            StorageDescriptor::new(
                vec![4],
                2,
                None,
                StorageLayout::Regular {
                    base_offset: u64::MAX - 4
                }
            ),
            Err(StorageDescriptorCreateError::ByteRangeOverflow(_))
        ));
        assert!(
            StorageDescriptor::new(
                vec![4],
                2,
                None,
                StorageLayout::Regular {
                    base_offset: u64::MAX - 8
                }
            )
            .is_ok()
        );
        assert!(matches!(
            StorageDescriptor::new(
                vec![4],
                1,
                None,
                StorageLayout::Segmented {
                    segments: vec![ByteRange::new(0..4), near_end],
                }
            ),
            Err(StorageDescriptorCreateError::ByteRangeOverflow(_))
        ));
        let half = ByteRange::new_with_offset_length(0, u64::MAX / 2 + 1);
        assert!(matches!(
            StorageDescriptor::new(
                vec![4],
                1,
                None,
                StorageLayout::CompressedSegmented {
                    segments: vec![half, half],
                    codec: CodecId::DEFLATE,
                    uncompressed_length: 4,
                }
            ),
            Err(StorageDescriptorCreateError::SegmentChainOverflow(2))
        ));
        assert!(matches!(
            StorageDescriptor::new(
                vec![4],
                1,
                None,
                StorageLayout::CompressedTiled {
                    chunk_shape: chunk_shape(&[4]),
                    chunks: ChunkMap::from([(
                        vec![0],
                        CompressedChunk {
                            data: ChunkData::Linked(vec![near_end]),
                            uncompressed_length: 4,
                            codec: CodecId::DEFLATE,
                        }
                    )]),
                }
            ),
            Err(StorageDescriptorCreateError::ByteRangeOverflow(_))
        ));
    }

    #[test]
    fn descriptor_tiled() {
        let tiled = |chunks: ChunkMap<ByteRange>| {
            StorageDescriptor::new(
                vec![8, 4],
                1,
                None,
                StorageLayout::Tiled {
                    chunk_shape: chunk_shape(&[4, 4]),
                    chunks,
                },
            )
        };
        let descriptor = tiled(ChunkMap::from([
            (vec![0, 0], ByteRange::new(0..16)),
            (vec![4, 0], ByteRange::new(100..116)),
        ]))
        .unwrap();
        assert_eq!(descriptor.chunk_grid().unwrap().grid_shape(), vec![2, 1]);

        assert!(matches!(
            tiled(ChunkMap::from([(vec![2, 0], ByteRange::new(0..16))])),
            Err(StorageDescriptorCreateError::InvalidChunkOrigin(_))
        ));
        assert!(matches!(
            tiled(ChunkMap::from([(vec![8, 0], ByteRange::new(0..16))])),
            Err(StorageDescriptorCreateError::InvalidChunkOrigin(_))
        ));
        assert!(matches!(
            tiled(ChunkMap::from([(vec![0, 0], ByteRange::new(0..15))])),
            Err(StorageDescriptorCreateError::InvalidChunkLength(_, 15, 16))
        ));
        assert!(matches!(
            StorageDescriptor::new(
                vec![8, 4],
                1,
                None,
                StorageLayout::Tiled {
                    chunk_shape: chunk_shape(&[4]),
                    chunks: ChunkMap::new(),
                }
            ),
            Err(StorageDescriptorCreateError::IncompatibleDimensionality(_))
        ));
    }

    #[test]
    fn descriptor_compressed_tiled() {
        let chunk = |uncompressed_length| CompressedChunk {
            data: ChunkData::Linked(vec![ByteRange::new(0..10), ByteRange::new(20..25)]),
            uncompressed_length,
            codec: CodecId::DEFLATE,
        };
        assert_eq!(chunk(64).data.encoded_length(), 15);
        let create = |uncompressed_length| {
            StorageDescriptor::new(
                vec![6, 6],
                4,
                None,
                StorageLayout::CompressedTiled {
                    chunk_shape: chunk_shape(&[4, 4]),
                    chunks: ChunkMap::from([(vec![4, 4], chunk(uncompressed_length))]),
                },
            )
        };
        // edge chunks are stored with the declared chunk shape
        assert!(create(64).is_ok());
        assert!(matches!(
            create(16),
            Err(StorageDescriptorCreateError::InvalidUncompressedLength(16, 64))
        ));
    }
}
