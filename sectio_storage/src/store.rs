//! Byte source implementations.
//!
//! - [`MemoryStore`]: an immutable in-memory image.
//! - [`FileStore`]: a file on the local file system.

mod file_store;
mod memory_store;

pub use file_store::FileStore;
pub use memory_store::MemoryStore;
