//! Layout resolution.
//!
//! [`resolve`] reconciles a [`Section`] against a [`StorageDescriptor`] and produces a lazy sequence of
//! [`Transfer`]s. Each transfer moves a run of elements from a source into the destination:
//!  - a direct byte range of the byte source ([`TransferSource::Direct`]),
//!  - an offset into the logical (possibly decoded) byte stream of a segmented or compressed layout ([`TransferSource::Stream`]),
//!  - an offset into a decoded compressed chunk ([`TransferSource::Chunk`]), or
//!  - the fill value ([`TransferSource::Fill`]).
//!
//! The destination ranges of the transfers partition the section.
//! Regular, compressed, and segmented layouts produce transfers in C-contiguous order of the destination with
//! increasing source offsets.
//! Tiled layouts produce transfers chunk by chunk, with chunks visited in C-contiguous order of their origins.

mod linear;
mod tiled;

use sectio_section::iterators::ContiguousRuns;
use sectio_section::Section;

use crate::{ReadError, StorageDescriptor, StorageLayout};

use linear::LinearTransfers;
use tiled::TiledTransfers;

/// The source of a [`Transfer`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TransferSource<'a> {
    /// An absolute byte offset in the byte source.
    Direct(u64),
    /// A byte offset in the logical byte stream of the layout.
    ///
    /// Offsets are non-decreasing across a transfer sequence.
    Stream(u64),
    /// A byte offset in the decoded chunk at `origin`.
    Chunk {
        /// The chunk origin.
        origin: &'a [u64],
        /// The byte offset in the decoded chunk.
        offset: u64,
    },
    /// The fill value.
    Fill,
}

/// An elementary transfer of a run of elements.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Transfer<'a> {
    /// The source of the first element.
    pub source: TransferSource<'a>,
    /// The destination element offset.
    pub destination: u64,
    /// The number of elements.
    pub run_length: u64,
}

impl Transfer<'_> {
    /// Returns true if the transfer writes the fill value.
    #[must_use]
    pub fn is_fill(&self) -> bool {
        self.source == TransferSource::Fill
    }
}

enum TransfersInner<'a> {
    Empty,
    Fill(Option<Transfer<'a>>),
    Linear(LinearTransfers),
    Tiled(TiledTransfers<'a>),
}

/// A lazy sequence of [`Transfer`]s.
///
/// See [`resolve`].
pub struct Transfers<'a> {
    inner: TransfersInner<'a>,
    num_elements: u64,
}

impl Transfers<'_> {
    /// Return the total number of elements covered by the transfers.
    #[must_use]
    pub fn num_elements(&self) -> u64 {
        self.num_elements
    }
}

impl<'a> Iterator for Transfers<'a> {
    type Item = Transfer<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            TransfersInner::Empty => None,
            TransfersInner::Fill(transfer) => transfer.take(),
            TransfersInner::Linear(transfers) => transfers.next(),
            TransfersInner::Tiled(transfers) => transfers.next(),
        }
    }
}

impl std::iter::FusedIterator for Transfers<'_> {}

/// Resolve the transfers reading `section` from storage described by `descriptor`.
///
/// No I/O is performed, the transfers are produced lazily.
///
/// # Errors
/// Returns [`ReadError::InvalidSection`] if `section` does not match the variable rank or exceeds the variable shape.
pub fn resolve<'a>(
    descriptor: &'a StorageDescriptor,
    section: &Section,
) -> Result<Transfers<'a>, ReadError> {
    section.validate(descriptor.variable_shape())?;
    let num_elements = section.total_count();
    let element_size = descriptor.element_size() as u64;
    let inner = if num_elements == 0 {
        TransfersInner::Empty
    } else {
        match descriptor.layout() {
            StorageLayout::NoData => TransfersInner::Fill(Some(Transfer {
                source: TransferSource::Fill,
                destination: 0,
                run_length: num_elements,
            })),
            StorageLayout::Regular { base_offset } => TransfersInner::Linear(LinearTransfers::new(
                variable_runs(descriptor, section)?,
                TransferSource::Direct,
                *base_offset,
                element_size,
            )),
            StorageLayout::Segmented { .. }
            | StorageLayout::Compressed { .. }
            | StorageLayout::CompressedSegmented { .. } => {
                TransfersInner::Linear(LinearTransfers::new(
                    variable_runs(descriptor, section)?,
                    TransferSource::Stream,
                    0,
                    element_size,
                ))
            }
            StorageLayout::Tiled {
                chunk_shape,
                chunks,
            } => TransfersInner::Tiled(TiledTransfers::new_raw(
                descriptor,
                chunk_shape,
                chunks,
                section,
            )?),
            StorageLayout::CompressedTiled {
                chunk_shape,
                chunks,
            } => TransfersInner::Tiled(TiledTransfers::new_compressed(
                descriptor,
                chunk_shape,
                chunks,
                section,
            )?),
        }
    };
    Ok(Transfers {
        inner,
        num_elements,
    })
}

/// The runs of `section` addressed against the whole variable.
fn variable_runs(
    descriptor: &StorageDescriptor,
    section: &Section,
) -> Result<ContiguousRuns, ReadError> {
    Ok(ContiguousRuns::new(
        descriptor.variable_shape(),
        &section.local_ranges(),
        &section.shape(),
    )?)
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU64;

    use sectio_codec::CodecId;
    use sectio_section::SectionRange;
    use sectio_storage::byte_range::ByteRange;

    use super::*;
    use crate::descriptor::{ChunkData, ChunkMap, CompressedChunk};

    fn transfer(source: TransferSource<'_>, destination: u64, run_length: u64) -> Transfer<'_> {
        Transfer {
            source,
            destination,
            run_length,
        }
    }

    fn chunk_shape(shape: &[u64]) -> Vec<NonZeroU64> {
        shape.iter().map(|&c| NonZeroU64::new(c).unwrap()).collect()
    }

    #[test]
    fn resolve_regular() {
        let descriptor = StorageDescriptor::new(
            vec![4, 4],
            2,
            None,
            StorageLayout::Regular { base_offset: 100 },
        )
        .unwrap();
        let transfers: Vec<_> =
            resolve(&descriptor, &Section::new_with_ranges(&[1..3, 0..4]))
                .unwrap()
                .collect();
        assert_eq!(transfers, vec![transfer(TransferSource::Direct(108), 0, 8)]);

        let transfers: Vec<_> =
            resolve(&descriptor, &Section::new_with_ranges(&[1..3, 1..3]))
                .unwrap()
                .collect();
        assert_eq!(
            transfers,
            vec![
                transfer(TransferSource::Direct(110), 0, 2),
                transfer(TransferSource::Direct(118), 2, 2)
            ]
        );
    }

    #[test]
    fn resolve_regular_strided() {
        let descriptor = StorageDescriptor::new(
            vec![10],
            1,
            None,
            StorageLayout::Regular { base_offset: 0 },
        )
        .unwrap();
        let section = Section::new(vec![SectionRange::new(1, 3, 3).unwrap()]);
        let transfers: Vec<_> = resolve(&descriptor, &section).unwrap().collect();
        assert_eq!(
            transfers,
            vec![
                transfer(TransferSource::Direct(1), 0, 1),
                transfer(TransferSource::Direct(4), 1, 1),
                transfer(TransferSource::Direct(7), 2, 1)
            ]
        );
    }

    #[test]
    fn resolve_invalid_section() {
        let descriptor =
            StorageDescriptor::new(vec![4, 4], 1, None, StorageLayout::NoData).unwrap();
        assert!(matches!(
            resolve(&descriptor, &Section::new_with_ranges(&[0..4])),
            Err(ReadError::InvalidSection(_))
        ));
        assert!(matches!(
            resolve(&descriptor, &Section::new_with_ranges(&[0..4, 2..5])),
            Err(ReadError::InvalidSection(_))
        ));
    }

    #[test]
    fn resolve_empty_section() {
        let descriptor = StorageDescriptor::new(
            vec![4, 4],
            1,
            None,
            StorageLayout::Regular { base_offset: 0 },
        )
        .unwrap();
        let transfers = resolve(&descriptor, &Section::new_with_ranges(&[0..0, 0..4])).unwrap();
        assert_eq!(transfers.num_elements(), 0);
        assert_eq!(transfers.count(), 0);
    }

    #[test]
    fn resolve_no_data() {
        let descriptor =
            StorageDescriptor::new(vec![4, 4], 1, None, StorageLayout::NoData).unwrap();
        let transfers: Vec<_> =
            resolve(&descriptor, &Section::new_with_ranges(&[1..3, 1..3]))
                .unwrap()
                .collect();
        assert_eq!(transfers, vec![transfer(TransferSource::Fill, 0, 4)]);
        assert!(transfers[0].is_fill());
    }

    #[test]
    fn resolve_segmented() {
        let descriptor = StorageDescriptor::new(
            vec![3, 4],
            4,
            None,
            StorageLayout::Segmented {
                segments: vec![ByteRange::new(0..20), ByteRange::new(40..68)],
            },
        )
        .unwrap();
        let transfers: Vec<_> =
            resolve(&descriptor, &Section::new_with_ranges(&[1..3, 2..4]))
                .unwrap()
                .collect();
        // logical offsets, runs are not split at segment boundaries
        assert_eq!(
            transfers,
            vec![
                transfer(TransferSource::Stream(24), 0, 2),
                transfer(TransferSource::Stream(40), 2, 2)
            ]
        );
    }

    #[test]
    fn resolve_tiled() {
        // 8x4 variable, 4x4 chunks, only the first chunk is stored
        let descriptor = StorageDescriptor::new(
            vec![8, 4],
            1,
            None,
            StorageLayout::Tiled {
                chunk_shape: chunk_shape(&[4, 4]),
                chunks: ChunkMap::from([(vec![0, 0], ByteRange::new(1000..1016))]),
            },
        )
        .unwrap();
        let transfers: Vec<_> =
            resolve(&descriptor, &Section::new_with_ranges(&[2..6, 1..3]))
                .unwrap()
                .collect();
        assert_eq!(
            transfers,
            vec![
                transfer(TransferSource::Direct(1009), 0, 2),
                transfer(TransferSource::Direct(1013), 2, 2),
                transfer(TransferSource::Fill, 4, 2),
                transfer(TransferSource::Fill, 6, 2)
            ]
        );
    }

    #[test]
    fn resolve_tiled_edge_chunk() {
        // the declared chunk shape extends past the variable, stored chunks have the declared shape
        let descriptor = StorageDescriptor::new(
            vec![5, 3],
            1,
            None,
            StorageLayout::Tiled {
                chunk_shape: chunk_shape(&[4, 4]),
                chunks: ChunkMap::from([
                    (vec![0, 0], ByteRange::new(0..16)),
                    (vec![4, 0], ByteRange::new(16..32)),
                ]),
            },
        )
        .unwrap();
        let transfers: Vec<_> = resolve(&descriptor, &Section::full(&[5, 3]))
            .unwrap()
            .collect();
        assert_eq!(
            transfers,
            vec![
                transfer(TransferSource::Direct(0), 0, 3),
                transfer(TransferSource::Direct(4), 3, 3),
                transfer(TransferSource::Direct(8), 6, 3),
                transfer(TransferSource::Direct(12), 9, 3),
                transfer(TransferSource::Direct(16), 12, 3)
            ]
        );
    }

    #[test]
    fn resolve_compressed_tiled() {
        let chunk = CompressedChunk {
            data: ChunkData::Contiguous(ByteRange::new(0..10)),
            uncompressed_length: 8,
            codec: CodecId::DEFLATE,
        };
        let descriptor = StorageDescriptor::new(
            vec![4],
            2,
            None,
            StorageLayout::CompressedTiled {
                chunk_shape: chunk_shape(&[4]),
                chunks: ChunkMap::from([(vec![0], chunk)]),
            },
        )
        .unwrap();
        let transfers: Vec<_> = resolve(&descriptor, &Section::new_with_ranges(&[1..3]))
            .unwrap()
            .collect();
        assert_eq!(
            transfers,
            vec![transfer(
                TransferSource::Chunk {
                    origin: &[0],
                    offset: 2
                },
                0,
                2
            )]
        );
    }
}
