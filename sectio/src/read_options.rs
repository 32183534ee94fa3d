use crate::config::global_config;

/// Options for reading sections.
///
/// The default values are taken from the [global configuration](crate::config::Config):
/// - `segment_read_size`: `4096`
/// - `max_decoded_chunk_size`: `1073741824` (1 GiB)
/// - `coalesce_direct_reads`: `true`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOptions {
    segment_read_size: usize,
    max_decoded_chunk_size: u64,
    coalesce_direct_reads: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        let config = global_config();
        Self {
            segment_read_size: config.segment_read_size(),
            max_decoded_chunk_size: config.max_decoded_chunk_size(),
            coalesce_direct_reads: config.coalesce_direct_reads(),
        }
    }
}

impl ReadOptions {
    /// Return the segment read size.
    #[must_use]
    pub fn segment_read_size(&self) -> usize {
        self.segment_read_size
    }

    /// Set the segment read size.
    ///
    /// A size of zero is treated as one.
    pub fn set_segment_read_size(&mut self, segment_read_size: usize) -> &mut Self {
        self.segment_read_size = segment_read_size.max(1);
        self
    }

    /// Set the segment read size.
    ///
    /// A size of zero is treated as one.
    #[must_use]
    pub fn with_segment_read_size(mut self, segment_read_size: usize) -> Self {
        self.segment_read_size = segment_read_size.max(1);
        self
    }

    /// Return the maximum decoded chunk size.
    #[must_use]
    pub fn max_decoded_chunk_size(&self) -> u64 {
        self.max_decoded_chunk_size
    }

    /// Set the maximum decoded chunk size.
    pub fn set_max_decoded_chunk_size(&mut self, max_decoded_chunk_size: u64) -> &mut Self {
        self.max_decoded_chunk_size = max_decoded_chunk_size;
        self
    }

    /// Set the maximum decoded chunk size.
    #[must_use]
    pub fn with_max_decoded_chunk_size(mut self, max_decoded_chunk_size: u64) -> Self {
        self.max_decoded_chunk_size = max_decoded_chunk_size;
        self
    }

    /// Return the coalesce direct reads setting.
    #[must_use]
    pub fn coalesce_direct_reads(&self) -> bool {
        self.coalesce_direct_reads
    }

    /// Set whether or not to coalesce adjacent direct reads.
    pub fn set_coalesce_direct_reads(&mut self, coalesce_direct_reads: bool) -> &mut Self {
        self.coalesce_direct_reads = coalesce_direct_reads;
        self
    }

    /// Set whether or not to coalesce adjacent direct reads.
    #[must_use]
    pub fn with_coalesce_direct_reads(mut self, coalesce_direct_reads: bool) -> Self {
        self.coalesce_direct_reads = coalesce_direct_reads;
        self
    }
}
