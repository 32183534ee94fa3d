//! `sectio` is a Rust library for reading rectangular, optionally strided, sections of multidimensional variables
//! from scientific array containers.
//!
//! A variable's elements may be stored
//! - contiguously at a base offset,
//! - as one compressed extent,
//! - as a chain of linked segments, optionally compressed as one stream, or
//! - as uniform chunks (tiles), optionally individually compressed.
//!
//! `sectio` reconciles a requested [`Section`](section::Section) against the [`StorageDescriptor`] of a variable,
//! reads exactly the bytes that hold the requested elements, and substitutes the fill value for elements that are
//! logically present but physically absent.
//!
//! Locating the bytes of a variable within a container (metadata and directory parsing) is the job of a metadata
//! layer that produces [`StorageDescriptor`]s.
//!
//! ## Reading a Section
//! ```rust
//! use sectio::section::{Section, SectionRange};
//! use sectio::storage::store::MemoryStore;
//! use sectio::{read_section, ReadOptions, StorageDescriptor, StorageLayout};
//!
//! // A 4x4 variable of u8 elements stored row-major after a 16 byte header
//! let mut bytes = vec![0xFFu8; 16];
//! bytes.extend(0..16u8);
//! let store = MemoryStore::new(bytes);
//! let descriptor = StorageDescriptor::new(
//!     vec![4, 4],
//!     1,
//!     None,
//!     StorageLayout::Regular { base_offset: 16 },
//! )?;
//!
//! // Every second row, columns 1..3
//! let section = Section::new(vec![
//!     SectionRange::new(0, 2, 2)?,
//!     SectionRange::contiguous(1, 2),
//! ]);
//! let elements = read_section(&store, &descriptor, &section, &ReadOptions::default())?;
//! assert_eq!(elements, [1, 2, 9, 10]);
//! # Ok::<_, Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Configuration
//! Process-wide defaults live in the [global configuration](config::global_config).
//! Each request takes [`ReadOptions`], which default to the global configuration.
//!
//! ## Logging
//! `sectio` logs information and warnings using the [`log`] crate.
//! A logging implementation must be enabled to capture logs.
//! See the [`log`] crate documentation for more details.
//!
//! ## Licence
//! `sectio` is licensed under either of
//!  - the Apache License, Version 2.0 <http://www.apache.org/licenses/LICENSE-2.0> or
//!  - the MIT license <http://opensource.org/licenses/MIT>, at your option.
//!
//! Unless you explicitly state otherwise, any contribution intentionally submitted for inclusion in the work by you, as defined in the Apache-2.0 license, shall be dual licensed as above, without any additional terms or conditions.

mod chunk_source;
pub mod config;
pub mod descriptor;
mod fill_value;
pub mod layout;
mod read;
mod read_errors;
mod read_options;
pub mod record;
mod segment_stream;

pub use chunk_source::{ChunkLocator, ChunkSource};
pub use descriptor::{StorageDescriptor, StorageDescriptorCreateError, StorageLayout};
pub use fill_value::{fill_runs, materialize, FillValue};
pub use layout::{resolve, Transfer, TransferSource, Transfers};
pub use read::{read_section, read_section_into, read_sections};
pub use read_errors::ReadError;
pub use read_options::ReadOptions;
pub use record::{RecordField, RecordLayout, RecordReader};
pub use segment_stream::SegmentStream;

pub use sectio_codec as codec;
pub use sectio_section as section;
pub use sectio_storage as storage;
