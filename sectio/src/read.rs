//! Section reads.
//!
//! A read resolves the transfers of a section and executes them against a byte source, one request at a time.
//! All cursor state (the current decoded chunk, the logical stream position, pending coalesced reads) lives in a
//! per-request state owned by the read, so independent requests never share mutable state.

use std::io::Read;

use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use sectio_codec::Codec;
use sectio_section::Section;
use sectio_storage::{byte_range::ByteRange, Bytes, ReadableStorageTraits, StorageError};

use crate::chunk_source::{check_decoded_size, ChunkLocator, ChunkSource};
use crate::layout::{resolve, Transfer, TransferSource};
use crate::{
    fill_runs, materialize, ReadError, ReadOptions, SegmentStream, StorageDescriptor,
    StorageLayout,
};

/// Read `section` of the variable described by `descriptor`.
///
/// Returns the section elements in C-contiguous order, `section.total_count() * element_size` bytes.
///
/// # Errors
/// Returns a [`ReadError`] if the section is invalid, the byte source fails, or a chunk is corrupt or uses an
/// unsupported codec.
pub fn read_section<TStorage: ?Sized + ReadableStorageTraits>(
    storage: &TStorage,
    descriptor: &StorageDescriptor,
    section: &Section,
    options: &ReadOptions,
) -> Result<Vec<u8>, ReadError> {
    section.validate(descriptor.variable_shape())?;
    let num_elements = section.total_count_usize();
    if matches!(descriptor.layout(), StorageLayout::NoData) {
        log::debug!(
            "Reading section {section} of a variable without data ({num_elements} elements)"
        );
        return Ok(materialize(
            descriptor.element_size(),
            descriptor.fill_value(),
            num_elements,
        ));
    }
    let mut output = vec![0; num_elements * descriptor.element_size()];
    read_section_into(storage, descriptor, section, &mut output, options)?;
    Ok(output)
}

/// Read `section` of the variable described by `descriptor` into `output`.
///
/// `output` must have a length of `section.total_count() * element_size` bytes.
///
/// # Errors
/// Returns [`ReadError::InvalidDestinationSize`] if `output` has the wrong size.
/// Returns a [`ReadError`] if the section is invalid, the byte source fails, or a chunk is corrupt or uses an
/// unsupported codec. The contents of `output` are unspecified on error.
pub fn read_section_into<TStorage: ?Sized + ReadableStorageTraits>(
    storage: &TStorage,
    descriptor: &StorageDescriptor,
    section: &Section,
    output: &mut [u8],
    options: &ReadOptions,
) -> Result<(), ReadError> {
    let transfers = resolve(descriptor, section)?;
    let expected_size = transfers.num_elements() * descriptor.element_size() as u64;
    if output.len() as u64 != expected_size {
        return Err(ReadError::InvalidDestinationSize(
            output.len(),
            expected_size,
        ));
    }
    log::debug!(
        "Reading section {section} of a {} layout ({} elements)",
        descriptor.layout().name(),
        transfers.num_elements()
    );

    let mut state = ReadState::new(storage, descriptor, options);
    for transfer in transfers {
        state.execute(transfer, output)?;
    }
    state.finish(output)
}

/// Read multiple independent sections of the variable described by `descriptor` in parallel.
///
/// Each section is read as an independent request.
///
/// # Errors
/// Returns the first [`ReadError`] encountered.
pub fn read_sections<TStorage: ?Sized + ReadableStorageTraits>(
    storage: &TStorage,
    descriptor: &StorageDescriptor,
    sections: &[Section],
    options: &ReadOptions,
) -> Result<Vec<Vec<u8>>, ReadError> {
    sections
        .par_iter()
        .map(|section| read_section(storage, descriptor, section, options))
        .collect()
}

/// A direct read not yet issued.
#[derive(Copy, Clone)]
struct PendingRead {
    offset: u64,
    destination: usize,
    length: usize,
}

/// The logical byte stream of a segmented or compressed layout.
enum LogicalStream<'a, TStorage: ?Sized> {
    Raw(SegmentStream<'a, TStorage>),
    Decoded {
        reader: Box<dyn Read + Send + 'a>,
        position: u64,
        /// The declared decoded length.
        length: u64,
    },
}

impl<TStorage: ?Sized + ReadableStorageTraits> LogicalStream<'_, TStorage> {
    fn position(&self) -> u64 {
        match self {
            Self::Raw(stream) => stream.position(),
            Self::Decoded { position, .. } => *position,
        }
    }

    fn skip(&mut self, count: u64) -> Result<(), ReadError> {
        match self {
            Self::Raw(stream) => {
                if stream.skip(count) != count {
                    return Err(segments_exhausted(stream.position(), count));
                }
            }
            Self::Decoded {
                reader, position, ..
            } => {
                let skipped = std::io::copy(&mut reader.take(count), &mut std::io::sink())
                    .map_err(ReadError::from_decode_io)?;
                *position += skipped;
                if skipped != count {
                    return Err(ReadError::CorruptChunk(format!(
                        "the decoded stream ended at {position}"
                    )));
                }
            }
        }
        Ok(())
    }

    fn read_exact(&mut self, out: &mut [u8]) -> Result<(), ReadError> {
        match self {
            Self::Raw(stream) => {
                let read = stream.read_into(out)?;
                if read != out.len() {
                    return Err(segments_exhausted(stream.position(), out.len() as u64));
                }
            }
            Self::Decoded {
                reader, position, ..
            } => {
                reader.read_exact(out).map_err(ReadError::from_decode_io)?;
                *position += out.len() as u64;
            }
        }
        Ok(())
    }

    /// Check that a decoded stream ends exactly at its declared length.
    ///
    /// The unread tail of the stream is decoded and discarded.
    fn finish(&mut self) -> Result<(), ReadError> {
        let Self::Decoded {
            reader,
            position,
            length,
        } = self
        else {
            return Ok(());
        };
        // Decode at most one byte past the declared length
        let remaining = length.saturating_add(1).saturating_sub(*position);
        let drained = std::io::copy(&mut reader.take(remaining), &mut std::io::sink())
            .map_err(ReadError::from_decode_io)?;
        *position += drained;
        match (*position).cmp(length) {
            std::cmp::Ordering::Equal => Ok(()),
            std::cmp::Ordering::Less => Err(ReadError::CorruptChunk(format!(
                "the decoded stream ended at {position}, expected {length} bytes"
            ))),
            std::cmp::Ordering::Greater => Err(ReadError::CorruptChunk(format!(
                "the decoded stream is longer than the declared {length} bytes"
            ))),
        }
    }
}

fn segments_exhausted(position: u64, requested: u64) -> ReadError {
    StorageError::Other(format!(
        "segment chain ended at logical offset {position} with {requested} bytes requested"
    ))
    .into()
}

/// The state of one read request.
struct ReadState<'a, TStorage: ?Sized> {
    storage: &'a TStorage,
    descriptor: &'a StorageDescriptor,
    options: &'a ReadOptions,
    element_size: usize,
    pending: Option<PendingRead>,
    chunk: Option<(&'a [u64], Bytes)>,
    stream: Option<LogicalStream<'a, TStorage>>,
}

impl<'a, TStorage: ?Sized + ReadableStorageTraits> ReadState<'a, TStorage> {
    fn new(
        storage: &'a TStorage,
        descriptor: &'a StorageDescriptor,
        options: &'a ReadOptions,
    ) -> Self {
        Self {
            storage,
            descriptor,
            options,
            element_size: descriptor.element_size(),
            pending: None,
            chunk: None,
            stream: None,
        }
    }

    fn execute(&mut self, transfer: Transfer<'a>, output: &mut [u8]) -> Result<(), ReadError> {
        let destination = usize::try_from(transfer.destination).unwrap() * self.element_size;
        let length = usize::try_from(transfer.run_length).unwrap() * self.element_size;
        match transfer.source {
            TransferSource::Direct(offset) => self.direct(offset, destination, length, output),
            TransferSource::Stream(offset) => {
                let stream = self.stream(offset)?;
                if offset > stream.position() {
                    stream.skip(offset - stream.position())?;
                }
                stream.read_exact(&mut output[destination..destination + length])
            }
            TransferSource::Chunk { origin, offset } => {
                let chunk = self.chunk(origin)?;
                let start = usize::try_from(offset).unwrap();
                let bytes = chunk.get(start..start + length).ok_or_else(|| {
                    ReadError::CorruptChunk(format!(
                        "chunk {origin:?} is shorter than {} bytes",
                        start + length
                    ))
                })?;
                output[destination..destination + length].copy_from_slice(bytes);
                Ok(())
            }
            TransferSource::Fill => {
                fill_runs(
                    output,
                    self.element_size,
                    self.descriptor.fill_value(),
                    [(transfer.destination, transfer.run_length)],
                );
                Ok(())
            }
        }
    }

    /// Issue or coalesce a direct read.
    fn direct(
        &mut self,
        offset: u64,
        destination: usize,
        length: usize,
        output: &mut [u8],
    ) -> Result<(), ReadError> {
        if self.options.coalesce_direct_reads() {
            if let Some(pending) = &mut self.pending {
                if pending.offset + pending.length as u64 == offset
                    && pending.destination + pending.length == destination
                {
                    pending.length += length;
                    return Ok(());
                }
            }
            self.flush(output)?;
            self.pending = Some(PendingRead {
                offset,
                destination,
                length,
            });
            Ok(())
        } else {
            Ok(self
                .storage
                .read_at_into(offset, &mut output[destination..destination + length])?)
        }
    }

    /// Issue the pending direct read and check the length of a decoded stream.
    fn finish(mut self, output: &mut [u8]) -> Result<(), ReadError> {
        self.flush(output)?;
        match &mut self.stream {
            Some(stream) => stream.finish(),
            None => Ok(()),
        }
    }

    /// Issue the pending direct read.
    fn flush(&mut self, output: &mut [u8]) -> Result<(), ReadError> {
        if let Some(PendingRead {
            offset,
            destination,
            length,
        }) = self.pending.take()
        {
            self.storage
                .read_at_into(offset, &mut output[destination..destination + length])?;
        }
        Ok(())
    }

    /// Return the decoded chunk at `origin`, fetching it if it is not the current chunk.
    fn chunk(&mut self, origin: &'a [u64]) -> Result<&Bytes, ReadError> {
        let current = matches!(&self.chunk, Some((current, _)) if *current == origin);
        if !current {
            let descriptor: &'a StorageDescriptor = self.descriptor;
            let StorageLayout::CompressedTiled { chunks, .. } = descriptor.layout() else {
                return Err(ReadError::CorruptChunk(format!(
                    "chunk {origin:?} is not part of a compressed tiled layout"
                )));
            };
            let chunk = chunks.get(origin).ok_or_else(|| {
                ReadError::CorruptChunk(format!("chunk {origin:?} is not stored"))
            })?;
            log::trace!(
                "Fetching chunk {origin:?} ({} encoded bytes, codec {})",
                chunk.data.encoded_length(),
                chunk.codec
            );
            let bytes = ChunkSource::new(self.storage, self.options)
                .fetch(ChunkLocator::Compressed(chunk))?;
            self.chunk = Some((origin, bytes));
        }
        match &self.chunk {
            Some((_, bytes)) => Ok(bytes),
            None => unreachable!("the current chunk was just fetched"),
        }
    }

    /// Return the logical stream positioned at or before `offset`.
    fn stream(&mut self, offset: u64) -> Result<&mut LogicalStream<'a, TStorage>, ReadError> {
        // Streams are forward only, an earlier offset needs a fresh stream
        if self
            .stream
            .as_ref()
            .is_some_and(|stream| stream.position() > offset)
        {
            self.stream = None;
        }
        if self.stream.is_none() {
            self.stream = Some(self.open_stream()?);
        }
        match &mut self.stream {
            Some(stream) => Ok(stream),
            None => unreachable!("the stream was just opened"),
        }
    }

    fn open_stream(&self) -> Result<LogicalStream<'a, TStorage>, ReadError> {
        let descriptor: &'a StorageDescriptor = self.descriptor;
        let (segments, codec, uncompressed_length): (&'a [ByteRange], _, _) =
            match descriptor.layout() {
                StorageLayout::Segmented { segments } => {
                    log::trace!("Opening a stream over {} segments", segments.len());
                    return Ok(LogicalStream::Raw(SegmentStream::new(
                        self.storage,
                        segments,
                        self.options,
                    )));
                }
                StorageLayout::Compressed {
                    data,
                    codec,
                    uncompressed_length,
                } => (std::slice::from_ref(data), codec, uncompressed_length),
                StorageLayout::CompressedSegmented {
                    segments,
                    codec,
                    uncompressed_length,
                } => (segments.as_slice(), codec, uncompressed_length),
                layout => {
                    return Err(ReadError::CorruptChunk(format!(
                        "a {} layout has no logical stream",
                        layout.name()
                    )));
                }
            };
        check_decoded_size(*uncompressed_length, self.options)?;
        let codec = Codec::from_id(*codec)?;
        log::trace!(
            "Opening a decoded stream over {} segments (codec {}, {uncompressed_length} bytes)",
            segments.len(),
            codec.id()
        );
        let stream = SegmentStream::new(self.storage, segments, self.options);
        Ok(LogicalStream::Decoded {
            reader: codec.decoder(Box::new(stream)),
            position: 0,
            length: *uncompressed_length,
        })
    }
}
