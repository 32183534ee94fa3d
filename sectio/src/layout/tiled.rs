use sectio_section::iterators::{ContiguousRuns, ContiguousRunsIntoIterator};
use sectio_section::{
    ArrayShape, ChunkIntersection, ChunkIntersections, ChunkShape, RegularChunkGrid, Section,
    SectionError,
};
use sectio_storage::byte_range::ByteRange;

use super::{Transfer, TransferSource};
use crate::descriptor::{ChunkMap, CompressedChunk};
use crate::{ReadError, StorageDescriptor};

enum StoredChunks<'a> {
    Raw(&'a ChunkMap<ByteRange>),
    Compressed(&'a ChunkMap<CompressedChunk>),
}

#[derive(Copy, Clone)]
enum ChunkRunSource<'a> {
    Direct(u64),
    Chunk(&'a [u64]),
    Fill,
}

/// Transfers of a section intersected with the chunks of a tiled layout.
///
/// Runs are addressed against the declared chunk shape, chunks on the variable edge are stored unclipped.
pub(super) struct TiledTransfers<'a> {
    chunks: StoredChunks<'a>,
    intersections: ChunkIntersections,
    chunk_shape: ArrayShape,
    output_shape: ArrayShape,
    element_size: u64,
    current: Option<(ContiguousRunsIntoIterator, ChunkRunSource<'a>)>,
}

impl<'a> TiledTransfers<'a> {
    pub(super) fn new_raw(
        descriptor: &StorageDescriptor,
        chunk_shape: &ChunkShape,
        chunks: &'a ChunkMap<ByteRange>,
        section: &Section,
    ) -> Result<Self, ReadError> {
        Self::new(descriptor, chunk_shape, StoredChunks::Raw(chunks), section)
    }

    pub(super) fn new_compressed(
        descriptor: &StorageDescriptor,
        chunk_shape: &ChunkShape,
        chunks: &'a ChunkMap<CompressedChunk>,
        section: &Section,
    ) -> Result<Self, ReadError> {
        Self::new(
            descriptor,
            chunk_shape,
            StoredChunks::Compressed(chunks),
            section,
        )
    }

    fn new(
        descriptor: &StorageDescriptor,
        chunk_shape: &ChunkShape,
        chunks: StoredChunks<'a>,
        section: &Section,
    ) -> Result<Self, ReadError> {
        let grid = RegularChunkGrid::new(descriptor.variable_shape().to_vec(), chunk_shape.clone())
            .map_err(SectionError::from)?;
        Ok(Self {
            chunks,
            intersections: grid.intersecting_chunks(section),
            chunk_shape: grid.chunk_shape_u64(),
            output_shape: section.shape(),
            element_size: descriptor.element_size() as u64,
            current: None,
        })
    }

    fn chunk_runs(
        &self,
        intersection: &ChunkIntersection,
    ) -> (ContiguousRunsIntoIterator, ChunkRunSource<'a>) {
        let source = match self.chunks {
            StoredChunks::Raw(chunks) => chunks
                .get(&intersection.origin)
                .map_or(ChunkRunSource::Fill, |byte_range| {
                    ChunkRunSource::Direct(byte_range.offset())
                }),
            StoredChunks::Compressed(chunks) => chunks
                .get_key_value(&intersection.origin)
                .map_or(ChunkRunSource::Fill, |(origin, _)| {
                    ChunkRunSource::Chunk(origin.as_slice())
                }),
        };
        let runs = ContiguousRuns::new(
            &self.chunk_shape,
            &intersection.local_ranges,
            &self.output_shape,
        )
        .expect("local ranges are within the chunk extent and the section");
        (runs.into_iter(), source)
    }
}

impl<'a> Iterator for TiledTransfers<'a> {
    type Item = Transfer<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((runs, source)) = &mut self.current {
                if let Some(run) = runs.next() {
                    let offset = run.source_index * self.element_size;
                    let source = match *source {
                        ChunkRunSource::Direct(base_offset) => {
                            TransferSource::Direct(base_offset + offset)
                        }
                        ChunkRunSource::Chunk(origin) => TransferSource::Chunk { origin, offset },
                        ChunkRunSource::Fill => TransferSource::Fill,
                    };
                    return Some(Transfer {
                        source,
                        destination: run.output_index,
                        run_length: run.length,
                    });
                }
            }
            let intersection = self.intersections.next()?;
            self.current = Some(self.chunk_runs(&intersection));
        }
    }
}
