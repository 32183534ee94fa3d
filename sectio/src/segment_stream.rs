//! A forward-only logical byte stream over a chain of segments.

use std::io::Read;

use sectio_storage::{byte_range::ByteRange, Bytes, ReadableStorageTraits, StorageError};

use crate::ReadOptions;

/// A forward-only byte stream over a chain of segments.
///
/// The segments are concatenated in order to form one logical stream.
/// Zero length segments are skipped and never signal the end of the stream.
/// A read spanning a segment boundary is stitched transparently.
///
/// Positioning is forward only, revisiting an earlier offset requires a new stream.
/// A stream carries cursor state and must not be shared between requests.
///
/// [`Read`] is implemented so that a stream can feed a decoder, each [`Read::read`] call issues at most one
/// byte source read of at most [`ReadOptions::segment_read_size`] bytes.
pub struct SegmentStream<'a, TStorage: ?Sized> {
    storage: &'a TStorage,
    segments: &'a [ByteRange],
    /// The index of the current segment.
    segment: usize,
    /// The number of bytes consumed from the current segment.
    segment_position: u64,
    position: u64,
    length: u64,
    read_size: u64,
    warned: bool,
}

impl<'a, TStorage: ?Sized + ReadableStorageTraits> SegmentStream<'a, TStorage> {
    /// Create a new segment stream positioned at the start of the first segment.
    #[must_use]
    pub fn new(storage: &'a TStorage, segments: &'a [ByteRange], options: &ReadOptions) -> Self {
        Self {
            storage,
            segments,
            segment: 0,
            segment_position: 0,
            position: 0,
            length: segments
                .iter()
                .fold(0, |length, segment| length.saturating_add(segment.length())),
            read_size: options.segment_read_size() as u64,
            warned: false,
        }
    }

    /// Return the logical position of the stream.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Return the logical length of the stream.
    #[must_use]
    pub fn length(&self) -> u64 {
        self.length
    }

    /// Move to the first segment with unconsumed bytes.
    ///
    /// Returns the remaining byte range of that segment, or [`None`] at the end of the stream.
    fn current(&mut self) -> Option<ByteRange> {
        while let Some(segment) = self.segments.get(self.segment) {
            if self.segment_position < segment.length() {
                return Some(ByteRange::new_with_offset_length(
                    segment.offset() + self.segment_position,
                    segment.length() - self.segment_position,
                ));
            }
            self.segment += 1;
            self.segment_position = 0;
        }
        None
    }

    fn consume(&mut self, length: u64) {
        self.segment_position += length;
        self.position += length;
    }

    fn end_of_stream(&mut self, requested: u64) {
        if requested > 0 && self.length == 0 && !self.segments.is_empty() && !self.warned {
            log::warn!(
                "Segment chain of {} segments holds no data. Reporting end of stream.",
                self.segments.len()
            );
            self.warned = true;
        }
    }

    /// Read up to `count` bytes.
    ///
    /// Fewer than `count` bytes are returned only at the end of the stream.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if the byte source fails.
    pub fn read(&mut self, count: u64) -> Result<Bytes, StorageError> {
        let mut parts: Vec<Bytes> = Vec::new();
        let mut remaining = count;
        while remaining > 0 {
            let Some(available) = self.current() else {
                break;
            };
            let length = std::cmp::min(available.length(), remaining);
            parts.push(self.storage.read_at(available.offset(), length)?);
            self.consume(length);
            remaining -= length;
        }
        if remaining == count {
            self.end_of_stream(count);
        }
        Ok(match parts.len() {
            0 => Bytes::new(),
            1 => parts.swap_remove(0),
            _ => Bytes::from(parts.concat()),
        })
    }

    /// Read into `out`, filling it unless the stream ends.
    ///
    /// Returns the number of bytes read.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if the byte source fails.
    pub fn read_into(&mut self, out: &mut [u8]) -> Result<usize, StorageError> {
        let mut filled = 0;
        while filled < out.len() {
            let Some(available) = self.current() else {
                break;
            };
            let length = std::cmp::min(available.length(), (out.len() - filled) as u64);
            let end = filled + usize::try_from(length).unwrap();
            self.storage
                .read_at_into(available.offset(), &mut out[filled..end])?;
            self.consume(length);
            filled = end;
        }
        if filled == 0 {
            self.end_of_stream(out.len() as u64);
        }
        Ok(filled)
    }

    /// Skip up to `count` bytes without reading them.
    ///
    /// Returns the number of bytes skipped, fewer than `count` only at the end of the stream.
    pub fn skip(&mut self, count: u64) -> u64 {
        let mut remaining = count;
        while remaining > 0 {
            let Some(available) = self.current() else {
                break;
            };
            let length = std::cmp::min(available.length(), remaining);
            self.consume(length);
            remaining -= length;
        }
        count - remaining
    }
}

impl<TStorage: ?Sized + ReadableStorageTraits> Read for SegmentStream<'_, TStorage> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let Some(available) = self.current() else {
            self.end_of_stream(buf.len() as u64);
            return Ok(0);
        };
        let length = available
            .length()
            .min(self.read_size)
            .min(buf.len() as u64);
        let length_usize = usize::try_from(length).unwrap();
        self.storage
            .read_at_into(available.offset(), &mut buf[..length_usize])
            .map_err(std::io::Error::other)?;
        self.consume(length);
        Ok(length_usize)
    }
}
