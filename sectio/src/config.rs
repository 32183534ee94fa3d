//! `sectio` global configuration options.
//!
//! See [`Config`] for the list of options.

use std::sync::{LazyLock, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Global configuration options for the `sectio` crate.
///
/// Retrieve the global [`Config`] with [`global_config`] and modify it with [`global_config_mut`].
/// [`ReadOptions`](crate::ReadOptions) take their defaults from the global configuration when created.
///
/// ## Segment Read Size
/// > default: `4096`
///
/// The maximum number of bytes fetched from the byte source per physical read while a segment stream feeds a decoder.
///
/// ## Maximum Decoded Chunk Size
/// > default: `1073741824` (1 GiB)
///
/// A compressed chunk or stream with a declared uncompressed length exceeding this size is rejected as corrupt
/// before any allocation.
///
/// ## Coalesce Direct Reads
/// > default: [`true`]
///
/// Adjacent direct transfers that are contiguous in both the byte source and the destination are served by a
/// single byte source read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    segment_read_size: usize,
    max_decoded_chunk_size: u64,
    coalesce_direct_reads: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            segment_read_size: 4096,
            max_decoded_chunk_size: 1 << 30,
            coalesce_direct_reads: true,
        }
    }
}

impl Config {
    /// Get the [segment read size](#segment-read-size) configuration.
    #[must_use]
    pub fn segment_read_size(&self) -> usize {
        self.segment_read_size
    }

    /// Set the [segment read size](#segment-read-size) configuration.
    ///
    /// A size of zero is treated as one.
    pub fn set_segment_read_size(&mut self, segment_read_size: usize) -> &mut Self {
        self.segment_read_size = segment_read_size.max(1);
        self
    }

    /// Get the [maximum decoded chunk size](#maximum-decoded-chunk-size) configuration.
    #[must_use]
    pub fn max_decoded_chunk_size(&self) -> u64 {
        self.max_decoded_chunk_size
    }

    /// Set the [maximum decoded chunk size](#maximum-decoded-chunk-size) configuration.
    pub fn set_max_decoded_chunk_size(&mut self, max_decoded_chunk_size: u64) -> &mut Self {
        self.max_decoded_chunk_size = max_decoded_chunk_size;
        self
    }

    /// Get the [coalesce direct reads](#coalesce-direct-reads) configuration.
    #[must_use]
    pub fn coalesce_direct_reads(&self) -> bool {
        self.coalesce_direct_reads
    }

    /// Set the [coalesce direct reads](#coalesce-direct-reads) configuration.
    pub fn set_coalesce_direct_reads(&mut self, coalesce_direct_reads: bool) -> &mut Self {
        self.coalesce_direct_reads = coalesce_direct_reads;
        self
    }
}

static CONFIG: LazyLock<RwLock<Config>> = LazyLock::new(|| RwLock::new(Config::default()));

/// Returns a reference to the global `sectio` configuration.
///
/// # Panics
/// This function panics if the underlying lock has been poisoned and might panic if the global config is already held by the current thread.
pub fn global_config() -> RwLockReadGuard<'static, Config> {
    CONFIG.read().unwrap()
}

/// Returns a mutable reference to the global `sectio` configuration.
///
/// # Panics
/// This function panics if the underlying lock has been poisoned and might panic if the global config is already held by the current thread.
pub fn global_config_mut() -> RwLockWriteGuard<'static, Config> {
    CONFIG.write().unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = Config::default();
        assert_eq!(config.segment_read_size(), 4096);
        assert_eq!(config.max_decoded_chunk_size(), 1024 * 1024 * 1024);
        assert!(config.coalesce_direct_reads());
    }

    #[test]
    fn config_setters() {
        let mut config = Config::default();
        config
            .set_segment_read_size(0)
            .set_max_decoded_chunk_size(64)
            .set_coalesce_direct_reads(false);
        assert_eq!(config.segment_read_size(), 1);
        assert_eq!(config.max_decoded_chunk_size(), 64);
        assert!(!config.coalesce_direct_reads());
    }
}
